//! Server-management panel layer
//!
//! - [`client`]: `Panel` trait consumed by the status reporter and server control
//! - [`crafty`]: Crafty Controller v2 API implementation
//! - [`payload`]: `RawPayload`, the boundary type for untyped panel responses
//! - [`normalizer`]: Maps raw payloads into [`CanonicalStatus`]
//! - [`status`]: Fetches and normalizes the current status
//! - [`control`]: Start, stop, delayed restart and console access

pub mod client;
pub mod control;
pub mod crafty;
pub mod normalizer;
pub mod payload;
pub mod status;

pub use client::{Panel, ServerAction};
pub use control::{ActionAck, ScheduledAction, ServerControl};
pub use crafty::CraftyPanel;
pub use normalizer::{CanonicalStatus, normalize};
pub use payload::RawPayload;
pub use status::StatusReporter;
