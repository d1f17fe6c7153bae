//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the player core:
//! - Logging and tracing setup with host log forwarding
//! - Generic event dispatch (weak listeners) and broadcast event bus
//!
//! ## Overview
//!
//! Nothing in here knows about playback. `core-playback` instantiates the
//! dispatch primitives with its own event type and relies on the logging
//! conventions established here.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{EventBus, EventDispatcher, EventListener, EventSeverity, EventStream, ListenerId};
