//! # Playback Module
//!
//! Turns a platform media engine into a queue player with one stable,
//! debounced playback state.
//!
//! ## Overview
//!
//! This module handles:
//! - Observing every engine property and reconciling it into a canonical
//!   [`PlaybackState`]
//! - Queue navigation and editing on top of an append/advance-only engine
//!   queue
//! - Audio session, interruptions, now-playing metadata, remote commands and
//!   background execution
//! - Typed player events for UI layers

pub mod config;
pub mod error;
pub mod events;
pub mod item;
pub mod observer;
pub mod queue;
pub mod session;
pub mod state;
pub mod timer;

pub use config::{AudioSessionConfig, PlayerConfig};
pub use error::{PlaybackError, QueueError, Result};
pub use events::{PlaybackEndReason, PlayerEvent, RecreationReason};
pub use item::{ItemId, ItemMetadata, PlayableItem};
pub use queue::RepeatMode;
pub use session::{PlaybackSession, PlaybackSessionBuilder};
pub use state::{PlaybackState, TimeStatus};
pub use timer::TimerPoll;
