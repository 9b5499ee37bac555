//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room bookkeeping and persistence so route handlers
//! can stay focused on protocol translation.

pub mod document;
pub mod room;
