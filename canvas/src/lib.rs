//! Canvas engine for the realtime whiteboard.
//!
//! This crate owns everything a client needs to hold a shared whiteboard in
//! memory: translating pointer input into mutations, rasterizing ink,
//! keeping the vector object store, tracking presence, hit-testing, and
//! flattening the scene into an image for persistence. It has no UI toolkit
//! or network dependencies; the host (see the `client` crate) wires
//! [`engine::Action`]s to the transport and the persistence coordinator.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level [`engine::EngineCore`] and its actions |
//! | [`raster`] | Stroke rasterizer and PNG data-URI codec |
//! | [`doc`] | Text boxes, shapes, selection, ID clock |
//! | [`presence`] | Room roster and remote cursors |
//! | [`protocol`] | Typed realtime events to and from frames |
//! | [`document`] | Persisted document and notes records |
//! | [`composite`] | Flattened image for persistence |
//! | [`camera`] | Pan/zoom camera and coordinate conversions |
//! | [`input`] | Tools, brush, and the gesture state machine |
//! | [`hit`] | Hit-testing against objects and handles |
//! | [`color`] | CSS color parsing |
//! | [`consts`] | Shared numeric constants |

pub mod camera;
pub mod color;
pub mod composite;
pub mod consts;
pub mod doc;
pub mod document;
pub mod engine;
pub mod hit;
pub mod input;
pub mod presence;
pub mod protocol;
pub mod raster;
