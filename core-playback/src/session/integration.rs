//! System integration: audio session, now-playing surface, remote commands,
//! background execution and app lifecycle.

use bridge_traits::background::{
    BackgroundTaskProvider, BackgroundTaskToken, LifecycleEvent, LifecycleState,
};
use bridge_traits::media_session::{
    AudioSessionEvent, AudioSessionManager, DynamicMetadata, NowPlayingInfo, NowPlayingSink,
    RemoteCommand, RemoteCommandCenter, RemoteCommandStatus,
};
use bridge_traits::playback::EntryId;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::PlaybackSession;
use crate::config::AudioSessionConfig;
use crate::error::{PlaybackError, QueueError, Result};
use crate::events::{PlayerEvent, RecreationReason};
use crate::item::QueueEntry;
use crate::state::{PlaybackState, TimeStatus};

const BACKGROUND_TASK_NAME: &str = "playback-pending";

/// Optional host collaborators plus the bookkeeping the session keeps about
/// them.
pub(super) struct SystemServices {
    audio_session: Option<Arc<dyn AudioSessionManager>>,
    now_playing: Option<Arc<dyn NowPlayingSink>>,
    remote_commands: Option<Arc<dyn RemoteCommandCenter>>,
    background: Option<Arc<dyn BackgroundTaskProvider>>,

    audio_session_active: bool,
    background_tokens: Vec<BackgroundTaskToken>,
    lifecycle: LifecycleState,
    now_playing_info: NowPlayingInfo,
    /// Entry whose static metadata is currently displayed.
    now_playing_entry: Option<EntryId>,
}

impl SystemServices {
    pub(super) fn new(
        audio_session: Option<Arc<dyn AudioSessionManager>>,
        now_playing: Option<Arc<dyn NowPlayingSink>>,
        remote_commands: Option<Arc<dyn RemoteCommandCenter>>,
        background: Option<Arc<dyn BackgroundTaskProvider>>,
    ) -> Self {
        Self {
            audio_session,
            now_playing,
            remote_commands,
            background,
            audio_session_active: false,
            background_tokens: Vec::new(),
            lifecycle: LifecycleState::default(),
            now_playing_info: NowPlayingInfo::default(),
            now_playing_entry: None,
        }
    }

    // ------------------------------------------------------------------
    // Audio session
    // ------------------------------------------------------------------

    /// Activate the audio session unless it is already active or
    /// auto-activation is off.
    pub(super) fn activate_if_needed(&mut self, config: &AudioSessionConfig) -> Result<()> {
        if self.audio_session_active || !config.auto_activate {
            return Ok(());
        }
        let Some(manager) = &self.audio_session else {
            return Ok(());
        };

        manager
            .activate(config.category, config.mode, config.options)
            .map_err(PlaybackError::AudioSession)?;
        self.audio_session_active = true;
        debug!(category = ?config.category, mode = ?config.mode, "Audio session activated");
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        if !self.audio_session_active {
            return Ok(());
        }
        self.audio_session_active = false;
        if let Some(manager) = &self.audio_session {
            manager.deactivate().map_err(PlaybackError::AudioSession)?;
            debug!("Audio session deactivated");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Background execution
    // ------------------------------------------------------------------

    /// Hold one background grant while `state` is pending; release every
    /// grant once it settles.
    pub(super) fn sync_background_tasks(&mut self, state: PlaybackState) {
        let Some(provider) = &self.background else {
            return;
        };

        if state.is_pending() && self.lifecycle != LifecycleState::Terminating {
            if self.background_tokens.is_empty() {
                match provider.begin_task(BACKGROUND_TASK_NAME) {
                    Ok(token) => {
                        debug!(token = token.0, "Background task started");
                        self.background_tokens.push(token);
                    }
                    Err(error) => warn!(%error, "Background task unavailable"),
                }
            }
        } else {
            self.release_background_tasks();
        }
    }

    fn release_background_tasks(&mut self) {
        let Some(provider) = &self.background else {
            return;
        };
        for token in self.background_tokens.drain(..) {
            provider.end_task(token);
            debug!(token = token.0, "Background task ended");
        }
    }

    pub(super) fn background_task_count(&self) -> usize {
        self.background_tokens.len()
    }

    // ------------------------------------------------------------------
    // Now playing
    // ------------------------------------------------------------------

    /// Push now-playing information when the displayed entry changes, or
    /// when `dynamic` carries a due progress refresh.
    pub(super) fn refresh_now_playing(
        &mut self,
        entry: Option<&QueueEntry>,
        dynamic: Option<TimeStatus>,
        rate: f32,
        default_rate: f32,
    ) {
        let entry_id = entry.map(QueueEntry::entry_id);
        let static_due = entry_id != self.now_playing_entry;
        if !static_due && dynamic.is_none() {
            return;
        }

        if static_due {
            self.now_playing_entry = entry_id;
            self.now_playing_info.static_metadata = entry.map(|e| e.item().static_metadata());
        }
        if let Some(time) = dynamic {
            self.now_playing_info.dynamic = DynamicMetadata {
                duration: time.duration,
                position: time.position,
                rate,
                default_rate,
            };
        }

        let nothing_current = self.now_playing_info.static_metadata.is_none();
        if nothing_current {
            self.now_playing_info = NowPlayingInfo::default();
        }

        let Some(sink) = &self.now_playing else {
            return;
        };
        if nothing_current {
            sink.clear();
        } else {
            sink.update(&self.now_playing_info);
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub(super) fn shutdown(&mut self) -> Result<()> {
        self.release_background_tasks();
        if let Some(center) = &self.remote_commands {
            center.unregister_all();
        }
        if let Some(sink) = &self.now_playing {
            sink.clear();
        }
        self.now_playing_entry = None;
        self.now_playing_info = NowPlayingInfo::default();
        self.deactivate()
    }
}

impl PlaybackSession {
    // ========================================================================
    // Audio session notifications
    // ========================================================================

    /// Handle an audio-session notification from the platform.
    ///
    /// Errors come from reactivating the session when resuming after an
    /// interruption, or from creating a replacement engine.
    #[instrument(skip(self))]
    pub fn handle_audio_session_event(&mut self, event: AudioSessionEvent) -> Result<()> {
        match event {
            AudioSessionEvent::InterruptionBegan => {
                info!("Audio interruption began");
                // The system deactivated the session for us.
                self.services.audio_session_active = false;
                self.play_when_ready = false;
                self.engine.pause();
                self.reconcile();
                Ok(())
            }
            AudioSessionEvent::InterruptionEnded { should_resume } => {
                info!(should_resume, "Audio interruption ended");
                if should_resume && self.should_be_playing {
                    self.play()
                } else {
                    self.pause();
                    Ok(())
                }
            }
            AudioSessionEvent::MediaServicesReset => {
                warn!("Media services were reset");
                self.services.audio_session_active = false;
                self.recreate_engine(RecreationReason::MediaServicesReset, false)
            }
        }
    }

    // ========================================================================
    // App lifecycle
    // ========================================================================

    #[instrument(skip(self))]
    pub fn handle_lifecycle_event(&mut self, event: LifecycleEvent) -> Result<()> {
        self.services.lifecycle = event.resulting_state();
        match event {
            LifecycleEvent::DidEnterBackground => {
                if self.config.deactivate_session_in_background_when_idle
                    && !self.should_be_playing
                {
                    debug!("Entering background idle");
                    self.services.deactivate()?;
                }
                Ok(())
            }
            LifecycleEvent::WillTerminate => {
                self.services.release_background_tasks();
                self.services.deactivate()
            }
            LifecycleEvent::WillEnterForeground
            | LifecycleEvent::DidBecomeActive
            | LifecycleEvent::WillResignActive => Ok(()),
        }
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.services.lifecycle
    }

    pub fn is_audio_session_active(&self) -> bool {
        self.services.audio_session_active
    }

    /// Background grants currently held.
    pub fn background_task_count(&self) -> usize {
        self.services.background_task_count()
    }

    /// The information last handed to the now-playing sink.
    pub fn now_playing(&self) -> &NowPlayingInfo {
        &self.services.now_playing_info
    }

    // ========================================================================
    // Remote commands
    // ========================================================================

    /// Execute a command from the lock screen, headset or car UI.
    #[instrument(skip(self))]
    pub fn handle_remote_command(&mut self, command: RemoteCommand) -> RemoteCommandStatus {
        let kind = command.kind();
        if !self.config.enabled_remote_commands.contains(&kind) {
            warn!(?kind, "Remote command is not enabled");
            return RemoteCommandStatus::Failed;
        }

        let outcome = match command {
            RemoteCommand::Play => self.play(),
            RemoteCommand::Pause => {
                self.pause();
                Ok(())
            }
            RemoteCommand::TogglePlayPause => self.toggle_play_pause(),
            RemoteCommand::Stop => {
                self.stop();
                Ok(())
            }
            RemoteCommand::NextTrack => self.next(),
            RemoteCommand::PreviousTrack => self.previous(),
            RemoteCommand::SkipForward(interval) => {
                let interval = self.skip_interval_or_default(interval);
                self.seek_by(interval).map(|_| ())
            }
            RemoteCommand::SkipBackward(interval) => {
                let interval = self.skip_interval_or_default(interval);
                self.seek_by(-interval).map(|_| ())
            }
            RemoteCommand::Seek(position) => self.seek(position).map(|_| ()),
            RemoteCommand::ChangePlaybackRate(rate) => self.set_rate(rate),
            RemoteCommand::Like | RemoteCommand::Dislike | RemoteCommand::Bookmark => {
                match self.current_item_id() {
                    Some(item_id) => {
                        self.emit(PlayerEvent::RemoteFeedback {
                            command: kind,
                            item_id: Some(item_id),
                        });
                        Ok(())
                    }
                    None => Err(PlaybackError::NoActiveItem),
                }
            }
        };

        match outcome {
            Ok(()) => RemoteCommandStatus::Success,
            Err(error) => {
                debug!(?kind, %error, "Remote command not executed");
                remote_status_for(&error)
            }
        }
    }

    fn skip_interval_or_default(&self, interval: std::time::Duration) -> f64 {
        if interval.is_zero() {
            self.config.skip_interval.as_secs_f64()
        } else {
            interval.as_secs_f64()
        }
    }
}

fn remote_status_for(error: &PlaybackError) -> RemoteCommandStatus {
    match error {
        PlaybackError::Queue(QueueError::EmptyQueue) | PlaybackError::NoActiveItem => {
            RemoteCommandStatus::NoActionableItem
        }
        error if error.is_declined() => RemoteCommandStatus::NoSuchContent,
        _ => RemoteCommandStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::BridgeError;

    #[test]
    fn remote_status_mapping() {
        assert_eq!(
            remote_status_for(&PlaybackError::Queue(QueueError::EmptyQueue)),
            RemoteCommandStatus::NoActionableItem
        );
        assert_eq!(
            remote_status_for(&PlaybackError::NoActiveItem),
            RemoteCommandStatus::NoActionableItem
        );
        assert_eq!(
            remote_status_for(&PlaybackError::Queue(QueueError::NoNextItem)),
            RemoteCommandStatus::NoSuchContent
        );
        assert_eq!(
            remote_status_for(&PlaybackError::AudioSession(BridgeError::AudioSession(
                "busy".into()
            ))),
            RemoteCommandStatus::Failed
        );
    }
}
