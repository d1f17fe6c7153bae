//! # Player Configuration
//!
//! Configuration for a [`PlaybackSession`](crate::PlaybackSession). Every
//! field has a serde default so hosts can ship partial JSON.

use bridge_traits::media_session::{
    AudioSessionCategory, AudioSessionMode, AudioSessionOptions, RemoteCommandKind,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::queue::RepeatMode;

/// Audio session parameters used on activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSessionConfig {
    #[serde(default)]
    pub category: AudioSessionCategory,

    #[serde(default)]
    pub mode: AudioSessionMode,

    #[serde(default)]
    pub options: AudioSessionOptions,

    /// Activate the session on the first `play()`.
    ///
    /// Default: true.
    #[serde(default = "default_true")]
    pub auto_activate: bool,
}

impl Default for AudioSessionConfig {
    fn default() -> Self {
        Self {
            category: AudioSessionCategory::default(),
            mode: AudioSessionMode::default(),
            options: AudioSessionOptions::default(),
            auto_activate: true,
        }
    }
}

/// Playback session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub audio_session: AudioSessionConfig,

    /// Skip dynamic now-playing refreshes for state changes that leave the
    /// effective rate untouched.
    ///
    /// Default: false.
    #[serde(default)]
    pub dynamic_refresh_only_on_rate_change: bool,

    /// Interval used by remote skip-forward/backward commands.
    ///
    /// Default: 15 seconds.
    #[serde(default = "default_skip_interval")]
    pub skip_interval: Duration,

    /// Remote commands registered with the system at construction.
    #[serde(default = "default_remote_commands")]
    pub enabled_remote_commands: Vec<RemoteCommandKind>,

    /// Deactivate the audio session when the app enters the background
    /// without anything to play.
    ///
    /// Default: true.
    #[serde(default = "default_true")]
    pub deactivate_session_in_background_when_idle: bool,

    /// Rate used by `play()` and published as the default rate.
    ///
    /// Default: 1.0.
    #[serde(default = "default_rate")]
    pub default_rate: f32,

    /// Initial repeat mode.
    #[serde(default)]
    pub repeat_mode: RepeatMode,

    /// Capacity of the broadcast event bus.
    ///
    /// Default: 100 events.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            audio_session: AudioSessionConfig::default(),
            dynamic_refresh_only_on_rate_change: false,
            skip_interval: default_skip_interval(),
            enabled_remote_commands: default_remote_commands(),
            deactivate_session_in_background_when_idle: true,
            default_rate: default_rate(),
            repeat_mode: RepeatMode::default(),
            event_buffer_size: default_event_buffer_size(),
        }
    }
}

impl PlayerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !self.default_rate.is_finite() || self.default_rate <= 0.0 {
            return Err("default_rate must be finite and > 0".to_string());
        }

        if self.skip_interval.is_zero() {
            return Err("skip_interval must be > 0".to_string());
        }

        if self.event_buffer_size == 0 {
            return Err("event_buffer_size must be > 0".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_skip_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_remote_commands() -> Vec<RemoteCommandKind> {
    vec![
        RemoteCommandKind::Play,
        RemoteCommandKind::Pause,
        RemoteCommandKind::TogglePlayPause,
        RemoteCommandKind::Stop,
        RemoteCommandKind::NextTrack,
        RemoteCommandKind::PreviousTrack,
        RemoteCommandKind::Seek,
    ]
}

fn default_rate() -> f32 {
    1.0
}

fn default_event_buffer_size() -> usize {
    core_runtime::events::DEFAULT_EVENT_BUFFER_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_rate, 1.0);
        assert_eq!(config.skip_interval, Duration::from_secs(15));
        assert!(config.audio_session.auto_activate);
        assert_eq!(config.repeat_mode, RepeatMode::Off);
    }

    #[test]
    fn test_config_validation() {
        let mut config = PlayerConfig::default();

        config.default_rate = 0.0;
        assert!(config.validate().is_err());
        config.default_rate = f32::NAN;
        assert!(config.validate().is_err());
        config.default_rate = 1.0;

        config.skip_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.skip_interval = Duration::from_secs(10);

        config.event_buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PlayerConfig = serde_json::from_str(
            r#"{
                "repeat_mode": "queue",
                "audio_session": { "mode": "spoken_audio" },
                "enabled_remote_commands": ["play", "pause", "like"]
            }"#,
        )
        .unwrap();

        assert_eq!(config.repeat_mode, RepeatMode::Queue);
        assert_eq!(config.audio_session.mode, AudioSessionMode::SpokenAudio);
        assert!(config.audio_session.auto_activate);
        assert_eq!(config.enabled_remote_commands.len(), 3);
        assert_eq!(config.default_rate, 1.0);
    }
}
