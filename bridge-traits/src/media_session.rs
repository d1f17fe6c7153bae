//! System media-session integration.
//!
//! Three collaborators live here:
//! - [`AudioSessionManager`] activates and deactivates the platform audio
//!   session (`AVAudioSession`, Android audio focus).
//! - [`RemoteCommandCenter`] registers the lock-screen / headset / car
//!   commands the core is prepared to handle.
//! - [`NowPlayingSink`] receives the complete [`NowPlayingInfo`] value on
//!   every refresh; the core never patches shared system state in place.
//!
//! System notifications (interruptions, media-services resets) flow the other
//! way, as [`AudioSessionEvent`] values the host forwards into the core.

use crate::{error::Result, platform::PlatformSendSync};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Audio session category requested on activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSessionCategory {
    Ambient,
    SoloAmbient,
    #[default]
    Playback,
    PlayAndRecord,
}

/// Audio session mode requested on activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSessionMode {
    #[default]
    Default,
    SpokenAudio,
    MoviePlayback,
}

/// Category options requested on activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioSessionOptions {
    #[serde(default)]
    pub mix_with_others: bool,
    #[serde(default)]
    pub duck_others: bool,
    #[serde(default)]
    pub allow_bluetooth: bool,
    #[serde(default)]
    pub allow_air_play: bool,
}

/// Platform audio session.
///
/// # Platform Notes
///
/// - **iOS**: `AVAudioSession.setCategory` + `setActive`
/// - **Android**: audio focus request / abandon
/// - **Web**: no-op (the browser owns the session)
pub trait AudioSessionManager: PlatformSendSync {
    fn activate(
        &self,
        category: AudioSessionCategory,
        mode: AudioSessionMode,
        options: AudioSessionOptions,
    ) -> Result<()>;

    fn deactivate(&self) -> Result<()>;
}

/// Notifications the platform raises about the audio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSessionEvent {
    /// Another audio client (phone call, alarm) took over; the engine has
    /// already been paused by the system.
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
    /// The media subsystem was torn down; every engine object is defunct.
    MediaServicesReset,
}

/// A command routed from system UI into the core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    Play,
    Pause,
    TogglePlayPause,
    Stop,
    NextTrack,
    PreviousTrack,
    SkipForward(Duration),
    SkipBackward(Duration),
    Seek(Duration),
    ChangePlaybackRate(f32),
    Like,
    Dislike,
    Bookmark,
}

impl RemoteCommand {
    pub fn kind(&self) -> RemoteCommandKind {
        match self {
            RemoteCommand::Play => RemoteCommandKind::Play,
            RemoteCommand::Pause => RemoteCommandKind::Pause,
            RemoteCommand::TogglePlayPause => RemoteCommandKind::TogglePlayPause,
            RemoteCommand::Stop => RemoteCommandKind::Stop,
            RemoteCommand::NextTrack => RemoteCommandKind::NextTrack,
            RemoteCommand::PreviousTrack => RemoteCommandKind::PreviousTrack,
            RemoteCommand::SkipForward(_) => RemoteCommandKind::SkipForward,
            RemoteCommand::SkipBackward(_) => RemoteCommandKind::SkipBackward,
            RemoteCommand::Seek(_) => RemoteCommandKind::Seek,
            RemoteCommand::ChangePlaybackRate(_) => RemoteCommandKind::ChangePlaybackRate,
            RemoteCommand::Like => RemoteCommandKind::Like,
            RemoteCommand::Dislike => RemoteCommandKind::Dislike,
            RemoteCommand::Bookmark => RemoteCommandKind::Bookmark,
        }
    }
}

/// Registration key for a [`RemoteCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteCommandKind {
    Play,
    Pause,
    TogglePlayPause,
    Stop,
    NextTrack,
    PreviousTrack,
    SkipForward,
    SkipBackward,
    Seek,
    ChangePlaybackRate,
    Like,
    Dislike,
    Bookmark,
}

/// Result reported back to the system for a handled command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommandStatus {
    Success,
    Failed,
    NoActionableItem,
    NoSuchContent,
}

/// Lock-screen / headset command registration.
pub trait RemoteCommandCenter: PlatformSendSync {
    /// Enable exactly `commands`; everything else is disabled.
    fn register(&self, commands: &[RemoteCommandKind], skip_interval: Duration);

    fn unregister_all(&self);
}

/// Kind of media surfaced to the system UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    #[default]
    Audio,
    Podcast,
    AudioBook,
    LiveStream,
}

/// Per-item metadata, refreshed whenever the current item changes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StaticMetadata {
    pub locator: String,
    pub media_type: MediaType,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artwork: Option<String>,
    pub album_artist: Option<String>,
    pub album_title: Option<String>,
}

/// Playback-progress metadata, refreshed on state and duration changes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamicMetadata {
    pub duration: Option<Duration>,
    pub position: Duration,
    pub rate: f32,
    pub default_rate: f32,
}

/// The complete now-playing value handed to the sink.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NowPlayingInfo {
    pub static_metadata: Option<StaticMetadata>,
    pub dynamic: DynamicMetadata,
}

/// System now-playing surface (lock screen, control center, media
/// notification).
pub trait NowPlayingSink: PlatformSendSync {
    /// Replace the displayed information wholesale.
    fn update(&self, info: &NowPlayingInfo);

    /// Remove the now-playing entry.
    fn clear(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_command_kinds_match_commands() {
        assert_eq!(RemoteCommand::Play.kind(), RemoteCommandKind::Play);
        assert_eq!(
            RemoteCommand::SkipForward(Duration::from_secs(15)).kind(),
            RemoteCommandKind::SkipForward
        );
        assert_eq!(
            RemoteCommand::ChangePlaybackRate(1.5).kind(),
            RemoteCommandKind::ChangePlaybackRate
        );
    }

    #[test]
    fn audio_session_options_deserialize_with_defaults() {
        let options: AudioSessionOptions =
            serde_json::from_str(r#"{"allow_bluetooth": true}"#).unwrap();
        assert!(options.allow_bluetooth);
        assert!(!options.mix_with_others);
    }

    #[test]
    fn now_playing_info_defaults_to_empty() {
        let info = NowPlayingInfo::default();
        assert!(info.static_metadata.is_none());
        assert_eq!(info.dynamic.position, Duration::ZERO);
    }
}
