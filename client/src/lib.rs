//! Client runtime for the realtime whiteboard.
//!
//! The `canvas` crate holds all whiteboard state and logic but knows nothing
//! about sockets, HTTP or disks. This crate supplies those seams and the
//! session that joins them:
//!
//! | Module | Role |
//! |--------|------|
//! | [`transport`] | `Transport` trait, websocket client, in-process relay |
//! | [`store`] | `DocumentStore` trait, HTTP and in-memory stores |
//! | [`autosave`] | Persistence coordinator with debounced autosave |
//! | [`identity`] | Key-value store for the last used identity |
//! | [`session`] | `WhiteboardSession` binding engine, transport and store |
//! | [`shared`] | Engine handle shared between the session and autosave |
//! | [`config`] | Environment configuration |

pub mod autosave;
pub mod config;
pub mod identity;
pub mod session;
pub mod shared;
pub mod store;
pub mod transport;
