//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the
//! platform's media stack. Each trait represents a capability that the core
//! requires but that must be implemented differently per platform (iOS,
//! Android, web, desktop).
//!
//! ## Traits
//!
//! ### Media Engine
//! - [`MediaEngine`](playback::MediaEngine) - Queue-based platform player with observable properties
//! - [`EngineFactory`](playback::EngineFactory) - Creates (and re-creates) engine sessions
//! - [`SignalSink`](playback::SignalSink) - Receiver for engine property signals
//!
//! ### System Media Session
//! - [`AudioSessionManager`](media_session::AudioSessionManager) - Audio session activation
//! - [`RemoteCommandCenter`](media_session::RemoteCommandCenter) - Lock-screen and headset commands
//! - [`NowPlayingSink`](media_session::NowPlayingSink) - Now-playing info surface
//!
//! ### Platform Integration
//! - [`BackgroundTaskProvider`](background::BackgroundTaskProvider) - Short background-execution grants
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! use core_playback::PlaybackError;
//!
//! let factory = self.engine_factory
//!     .ok_or_else(|| PlaybackError::CapabilityMissing {
//!         capability: "EngineFactory".to_string(),
//!         message: "No media engine factory provided. \
//!                  Inject the platform-native engine adapter.".to_string()
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for consistent
//! error handling. Platform implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Provide actionable error messages
//!
//! ## Thread Safety
//!
//! Bridge traits require [`PlatformSendSync`](platform::PlatformSendSync), which
//! is `Send + Sync` on native targets so handles can be shared behind `Arc`.
//!
//! ## Examples
//!
//! ### Implementing NowPlayingSink
//!
//! ```ignore
//! use bridge_traits::media_session::{NowPlayingInfo, NowPlayingSink};
//!
//! pub struct LockScreen {
//!     center: MPNowPlayingInfoCenter,
//! }
//!
//! impl NowPlayingSink for LockScreen {
//!     fn update(&self, info: &NowPlayingInfo) {
//!         self.center.set_now_playing_info(to_dictionary(info));
//!     }
//!
//!     fn clear(&self) {
//!         self.center.set_now_playing_info(None);
//!     }
//! }
//! ```

pub mod background;
pub mod error;
pub mod media_session;
pub mod platform;
pub mod playback;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use background::{BackgroundTaskProvider, BackgroundTaskToken, LifecycleEvent, LifecycleState};
pub use media_session::{
    AudioSessionCategory, AudioSessionEvent, AudioSessionManager, AudioSessionMode,
    AudioSessionOptions, DynamicMetadata, MediaType, NowPlayingInfo, NowPlayingSink,
    RemoteCommand, RemoteCommandCenter, RemoteCommandKind, RemoteCommandStatus, StaticMetadata,
};
pub use platform::PlatformSendSync;
pub use playback::{
    EngineFactory, EngineItem, EngineProperty, EngineSessionId, EngineSignal, EngineSnapshot,
    EntryId, ItemEndAction, ItemStatus, LoadedRange, MediaEngine, MetadataItem, ResolveOutcome,
    ResolveRequestId, SeekRequestId, SignalSink, SubscriptionId, TimeControlStatus,
};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, StderrSink, SystemClock};
