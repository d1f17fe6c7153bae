use bridge_traits::background::BackgroundTaskProvider;
use bridge_traits::media_session::{AudioSessionManager, NowPlayingSink, RemoteCommandCenter};
use bridge_traits::playback::{EngineFactory, EngineSessionId};
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::events::{EventBus, EventDispatcher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use super::integration::SystemServices;
use super::PlaybackSession;
use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::observer::StateObserver;
use crate::queue::QueueController;
use crate::state::PlaybackStateMachine;
use crate::timer::DeadlineTimer;

/// Builder for [`PlaybackSession`].
///
/// Only the engine factory is required. Every system integration is
/// optional; a session without a now-playing sink simply never updates the
/// lock screen.
///
/// # Examples
///
/// ```ignore
/// use core_playback::{PlaybackSession, PlayerConfig};
///
/// let session = PlaybackSession::builder(PlayerConfig::default())
///     .engine_factory(factory)
///     .audio_session(audio_session)
///     .now_playing(now_playing)
///     .build()?;
/// ```
pub struct PlaybackSessionBuilder {
    config: PlayerConfig,
    factory: Option<Arc<dyn EngineFactory>>,
    audio_session: Option<Arc<dyn AudioSessionManager>>,
    now_playing: Option<Arc<dyn NowPlayingSink>>,
    remote_commands: Option<Arc<dyn RemoteCommandCenter>>,
    background: Option<Arc<dyn BackgroundTaskProvider>>,
    clock: Option<Arc<dyn Clock>>,
}

impl PlaybackSessionBuilder {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            factory: None,
            audio_session: None,
            now_playing: None,
            remote_commands: None,
            background: None,
            clock: None,
        }
    }

    /// Sets the engine factory. Called once now and again whenever the
    /// engine has to be replaced.
    pub fn engine_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn audio_session(mut self, manager: Arc<dyn AudioSessionManager>) -> Self {
        self.audio_session = Some(manager);
        self
    }

    pub fn now_playing(mut self, sink: Arc<dyn NowPlayingSink>) -> Self {
        self.now_playing = Some(sink);
        self
    }

    /// Sets the remote command surface. The configured commands are
    /// registered during [`build()`](Self::build).
    pub fn remote_commands(mut self, center: Arc<dyn RemoteCommandCenter>) -> Self {
        self.remote_commands = Some(center);
        self
    }

    pub fn background_tasks(mut self, provider: Arc<dyn BackgroundTaskProvider>) -> Self {
        self.background = Some(provider);
        self
    }

    /// Sets the clock used by the sleep timer. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration, create the first engine session and start
    /// observing it.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::Config`] for an invalid configuration
    /// - [`PlaybackError::CapabilityMissing`] without an engine factory
    /// - [`PlaybackError::EngineFailure`] if the factory cannot create an engine
    pub fn build(self) -> Result<PlaybackSession> {
        self.config.validate().map_err(PlaybackError::Config)?;

        let factory = self.factory.ok_or_else(|| PlaybackError::CapabilityMissing {
            capability: "EngineFactory".to_string(),
            message: "An engine factory is required. Use .engine_factory() to set it."
                .to_string(),
        })?;
        let engine = factory
            .create()
            .map_err(|error| PlaybackError::EngineFailure(error.to_string()))?;

        let (sender, signals) = mpsc::unbounded_channel();
        let engine_session = EngineSessionId::new();
        let mut observer = StateObserver::new(sender);
        observer.start_observing(Some(Arc::clone(&engine)), engine_session);

        let config = self.config;
        let mut queue = QueueController::new(config.repeat_mode);
        queue.set_repeat_mode(engine.as_ref(), config.repeat_mode);
        engine.set_rate(config.default_rate);

        if let Some(center) = &self.remote_commands {
            center.register(&config.enabled_remote_commands, config.skip_interval);
        }

        info!(
            session = %engine_session,
            remote_commands = config.enabled_remote_commands.len(),
            "Playback session created"
        );

        Ok(PlaybackSession {
            factory,
            engine,
            engine_session,
            observer,
            signals,
            machine: PlaybackStateMachine::new(),
            queue,
            should_be_playing: false,
            play_when_ready: false,
            stopped: false,
            ran_dry: false,
            rate: config.default_rate,
            published_rate: 0.0,
            pending_seek: None,
            services: SystemServices::new(
                self.audio_session,
                self.now_playing,
                self.remote_commands,
                self.background,
            ),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            sleep_timer: DeadlineTimer::new(),
            dispatcher: EventDispatcher::new(),
            bus: EventBus::new(config.event_buffer_size),
            config,
        })
    }
}
