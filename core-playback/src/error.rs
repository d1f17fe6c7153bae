//! # Playback Error Types
//!
//! Errors returned by session commands. Nothing in here crosses the
//! engine-callback boundary: failures discovered while processing engine
//! signals are published as [`PlayerEvent::Failure`](crate::PlayerEvent::Failure)
//! instead.

use bridge_traits::BridgeError;
use std::time::Duration;
use thiserror::Error;

use crate::item::ItemId;

/// Declined queue navigation and editing requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("No next item in the queue")]
    NoNextItem,

    #[error("No previous item in the queue")]
    NoPreviousItem,

    #[error("Invalid queue index {index} (queue length {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("No next item while repeating the current track")]
    NoNextItemUnderTrackRepeat,

    #[error("Item not found in queue: {0}")]
    ItemNotFound(ItemId),

    #[error("The current item cannot be removed; navigate away from it first")]
    CannotRemoveCurrent,

    #[error("The queue is empty")]
    EmptyQueue,
}

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Locator could not be resolved by the engine.
    #[error("Failed to load {item_id}: {message}")]
    LoadFailed { item_id: ItemId, message: String },

    // ========================================================================
    // Queue Errors
    // ========================================================================
    /// Navigation or editing request was declined.
    #[error(transparent)]
    Queue(#[from] QueueError),

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The media engine failed or could not be created.
    #[error("Media engine failure: {0}")]
    EngineFailure(String),

    /// The engine has no current item to act on.
    #[error("No item is loaded in the engine")]
    NoActiveItem,

    // ========================================================================
    // Platform Errors
    // ========================================================================
    /// Audio session activation or deactivation failed.
    #[error("Audio session error: {0}")]
    AudioSession(#[source] BridgeError),

    /// A required host capability was not provided.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    // ========================================================================
    // Argument Errors
    // ========================================================================
    /// Rate must be finite and strictly positive.
    #[error("Invalid playback rate: {0}")]
    InvalidRate(f32),

    /// Seek target lies beyond the item's duration.
    #[error("Seek position {position:?} is beyond duration {duration:?}")]
    InvalidSeekPosition {
        position: Duration,
        duration: Duration,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Invalid player configuration: {0}")]
    Config(String),
}

impl PlaybackError {
    /// Returns `true` if the request was declined rather than failed. The
    /// session is unchanged and fully usable.
    pub fn is_declined(&self) -> bool {
        matches!(self, PlaybackError::Queue(_))
    }

    /// Returns `true` if a recovery path exists without rebuilding the
    /// session (reloading, or recreating the engine).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlaybackError::LoadFailed { .. }
                | PlaybackError::EngineFailure(_)
                | PlaybackError::AudioSession(_)
                | PlaybackError::NoActiveItem
        ) || self.is_declined()
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
