//! # Playback Session
//!
//! The public command surface. A [`PlaybackSession`] owns exactly one live
//! engine session, the logical queue, and the play intent, and is driven from
//! a single serial context: commands, engine signals, audio-session and
//! lifecycle notifications, and timer callbacks are all handled through
//! `&mut self`, one at a time.
//!
//! ## Signal flow
//!
//! ```text
//! MediaEngine ──signal──> StateObserver ──mpsc──> process_pending_signals()
//!                                                         │
//!                          QueueController <── sync ──────┤
//!                          PlaybackStateMachine <── recompute
//!                                                         │
//!                          EventDispatcher / EventBus <── publish
//! ```
//!
//! Every command ends with the same reconcile pass as a signal, so the
//! published state never depends on whether the engine reports a change
//! synchronously, later, or twice.
//!
//! ## Intent
//!
//! `should_be_playing` is the user's intent and survives interruptions.
//! `play_when_ready` is whether the engine should currently be running. An
//! interruption clears the second but not the first, which is what lets an
//! interruption-ended-with-resume restart playback only when the user had it
//! playing.

mod builder;
mod integration;

pub use builder::PlaybackSessionBuilder;

use bridge_traits::playback::{
    EngineFactory, EngineSessionId, EngineSignal, MediaEngine, ResolveOutcome, ResolveRequestId,
    SeekRequestId,
};
use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use core_runtime::events::{EventBus, EventDispatcher, EventListener, EventStream, ListenerId};
use core_runtime::logging::redact_locator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::PlayerConfig;
use crate::error::{PlaybackError, QueueError, Result};
use crate::events::{PlaybackEndReason, PlayerEvent, RecreationReason};
use crate::item::{ItemId, PlayableItem};
use crate::observer::{ObservedSignal, StateObserver};
use crate::queue::{QueueController, QueueMove, RepeatMode, ResolveResult, SyncOutcome};
use crate::state::{MachineInputs, PlaybackState, PlaybackStateMachine, TimeStatus};
use crate::timer::{DeadlineTimer, TimerPoll};

use integration::SystemServices;

pub struct PlaybackSession {
    config: PlayerConfig,
    factory: Arc<dyn EngineFactory>,
    engine: Arc<dyn MediaEngine>,
    engine_session: EngineSessionId,
    observer: StateObserver,
    signals: UnboundedReceiver<ObservedSignal>,
    machine: PlaybackStateMachine,
    queue: QueueController,

    should_be_playing: bool,
    play_when_ready: bool,
    stopped: bool,
    /// The engine played past its last entry; consumed by the next
    /// reconcile.
    ran_dry: bool,
    rate: f32,
    published_rate: f32,
    pending_seek: Option<SeekRequestId>,

    services: SystemServices,
    clock: Arc<dyn Clock>,
    sleep_timer: DeadlineTimer,

    dispatcher: EventDispatcher<PlayerEvent>,
    bus: EventBus<PlayerEvent>,
}

impl PlaybackSession {
    pub fn builder(config: PlayerConfig) -> PlaybackSessionBuilder {
        PlaybackSessionBuilder::new(config)
    }

    // ========================================================================
    // Queue loading
    // ========================================================================

    /// Replace the queue with `items` and reset to the first one. Pending
    /// resolutions for the old queue become stale.
    ///
    /// With `start_playing`, the audio session is activated first when
    /// configured to. An activation error is returned, but the queue is
    /// loaded and playback proceeds regardless.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub fn load(&mut self, items: Vec<PlayableItem>, start_playing: bool) -> Result<()> {
        let items: Vec<Arc<PlayableItem>> = items.into_iter().map(Arc::new).collect();
        if let Some(first) = items.first() {
            info!(item_id = %first.id(), locator = %redact_locator(first.locator()), "Loading queue");
        }

        let activation = if start_playing && !items.is_empty() {
            self.should_be_playing = true;
            self.play_when_ready = true;
            self.services.activate_if_needed(&self.config.audio_session)
        } else {
            self.should_be_playing = false;
            self.play_when_ready = false;
            self.engine.pause();
            Ok(())
        };

        self.stopped = false;
        self.ran_dry = false;
        self.pending_seek = None;
        self.queue.load(self.engine.as_ref(), items);
        self.announce_move(QueueMove {
            previous_index: None,
            index: 0,
        });
        self.reconcile();
        activation
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Start or resume playback of the current item.
    ///
    /// After `stop()` or after the queue ran out, the current item is
    /// materialized again and plays from the start.
    #[instrument(skip(self))]
    pub fn play(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Err(QueueError::EmptyQueue.into());
        }

        let activation = self.services.activate_if_needed(&self.config.audio_session);
        if let Err(error) = &activation {
            warn!(%error, "Audio session activation failed, playing anyway");
        }

        self.stopped = false;
        self.should_be_playing = true;
        self.play_when_ready = true;
        if !self.queue.ensure_attached(self.engine.as_ref()) && self.queue.is_attached() {
            self.engine.set_rate(self.rate);
            self.engine.play();
        }
        self.reconcile();
        activation
    }

    #[instrument(skip(self))]
    pub fn pause(&mut self) {
        self.should_be_playing = false;
        self.play_when_ready = false;
        self.engine.pause();
        self.reconcile();
    }

    pub fn toggle_play_pause(&mut self) -> Result<()> {
        if self.should_be_playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Stop playback and empty the engine. The queue and its position are
    /// kept; `play()` restarts the current item. Repeated calls are no-ops.
    #[instrument(skip(self))]
    pub fn stop(&mut self) {
        if self.stopped || self.queue.is_empty() {
            return;
        }
        let item_id = self.current_item_id();

        self.should_be_playing = false;
        self.play_when_ready = false;
        self.stopped = true;
        self.pending_seek = None;
        self.engine.pause();
        self.queue.detach(self.engine.as_ref());
        self.reconcile();

        self.emit(PlayerEvent::PlaybackEnded {
            reason: PlaybackEndReason::PlayerStopped,
            item_id,
        });
    }

    /// Seek within the current item. Completion is reported as
    /// [`PlayerEvent::SeekCompleted`] carrying the returned request id.
    #[instrument(skip(self))]
    pub fn seek(&mut self, position: Duration) -> Result<SeekRequestId> {
        let snapshot = self.engine.snapshot();
        if !self.queue.is_attached() || snapshot.current_entry.is_none() {
            return Err(PlaybackError::NoActiveItem);
        }
        if let Some(duration) = snapshot.duration {
            if position > duration {
                return Err(PlaybackError::InvalidSeekPosition { position, duration });
            }
        }

        let request = SeekRequestId::new();
        debug!(%request, ?position, "Seeking");
        self.engine.seek(request, position);
        self.pending_seek = Some(request);
        Ok(request)
    }

    /// Seek relative to the current position, clamped to `[0, duration]`.
    pub fn seek_by(&mut self, offset_secs: f64) -> Result<SeekRequestId> {
        let snapshot = self.engine.snapshot();
        if snapshot.current_entry.is_none() {
            return Err(PlaybackError::NoActiveItem);
        }

        let mut target = snapshot.position.as_secs_f64() + offset_secs;
        if let Some(duration) = snapshot.duration {
            target = target.min(duration.as_secs_f64());
        }
        let target = Duration::try_from_secs_f64(target.max(0.0)).map_err(|_| {
            PlaybackError::InvalidSeekPosition {
                position: snapshot.position,
                duration: snapshot.duration.unwrap_or_default(),
            }
        })?;
        self.seek(target)
    }

    pub fn set_rate(&mut self, rate: f32) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PlaybackError::InvalidRate(rate));
        }
        self.rate = rate;
        self.engine.set_rate(rate);
        self.reconcile();
        Ok(())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    #[instrument(skip(self))]
    pub fn next(&mut self) -> Result<()> {
        self.follow_engine();
        let from = self.current_item_id();
        let movement = self.queue.next(self.engine.as_ref())?;
        self.after_navigation(movement, PlaybackEndReason::SkippedToNext, from);
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn previous(&mut self) -> Result<()> {
        self.follow_engine();
        let from = self.current_item_id();
        let movement = self.queue.previous(self.engine.as_ref())?;
        self.after_navigation(movement, PlaybackEndReason::SkippedToPrevious, from);
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %id))]
    pub fn jump_to_item(&mut self, id: &ItemId) -> Result<()> {
        self.follow_engine();
        let from = self.current_item_id();
        let movement = self.queue.jump_to_item(self.engine.as_ref(), id)?;
        self.after_navigation(movement, PlaybackEndReason::Jumped, from);
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn jump_to_index(&mut self, index: usize) -> Result<()> {
        self.follow_engine();
        let from = self.current_item_id();
        let movement = self.queue.jump_to_index(self.engine.as_ref(), index)?;
        self.after_navigation(movement, PlaybackEndReason::Jumped, from);
        Ok(())
    }

    fn after_navigation(
        &mut self,
        movement: QueueMove,
        reason: PlaybackEndReason,
        from: Option<ItemId>,
    ) {
        self.stopped = false;
        if self.queue.is_attached() {
            if movement.is_restart() {
                self.engine.seek(SeekRequestId::new(), Duration::ZERO);
            }
            if self.play_when_ready {
                self.engine.play();
            }
        }

        self.emit(PlayerEvent::PlaybackEnded {
            reason,
            item_id: from,
        });
        self.announce_move(movement);
        self.reconcile();
    }

    // ========================================================================
    // Queue editing
    // ========================================================================

    /// Insert `items` before `before`, or append them when `None`.
    pub fn add(&mut self, items: Vec<PlayableItem>, before: Option<usize>) -> Result<()> {
        self.follow_engine();
        let was_empty = self.queue.is_empty();
        let items = items.into_iter().map(Arc::new).collect();
        self.queue.add(self.engine.as_ref(), items, before)?;

        if was_empty {
            self.announce_move(QueueMove {
                previous_index: None,
                index: 0,
            });
        }
        self.reconcile();
        Ok(())
    }

    pub fn append(&mut self, items: Vec<PlayableItem>) -> Result<()> {
        self.add(items, None)
    }

    /// Remove the item at `index`. The current item has to be navigated away
    /// from first.
    pub fn remove_item(&mut self, index: usize) -> Result<Arc<PlayableItem>> {
        self.follow_engine();
        let removed = self.queue.remove_item(self.engine.as_ref(), index)?;
        self.reconcile();
        Ok(removed)
    }

    pub fn remove_upcoming(&mut self) {
        self.follow_engine();
        self.queue.remove_upcoming(self.engine.as_ref());
        self.reconcile();
    }

    pub fn remove_previous(&mut self) {
        self.follow_engine();
        self.queue.remove_previous();
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        debug!(?mode, "Repeat mode changed");
        self.queue.set_repeat_mode(self.engine.as_ref(), mode);
    }

    // ========================================================================
    // Sleep timer
    // ========================================================================

    /// Pause playback `after` from now. Re-arming replaces the deadline.
    pub fn set_sleep_timer(&mut self, after: Duration) -> Result<DateTime<Utc>> {
        let deadline = self.sleep_timer.arm(self.clock.as_ref(), after)?;
        info!(%deadline, "Sleep timer armed");
        Ok(deadline)
    }

    pub fn cancel_sleep_timer(&mut self) {
        self.sleep_timer.cancel();
    }

    pub fn sleep_timer_deadline(&self) -> Option<DateTime<Utc>> {
        self.sleep_timer.deadline()
    }

    /// Call when the host's scheduled sleep-timer callback runs.
    pub fn sleep_timer_fired(&mut self) -> TimerPoll {
        let poll = self.sleep_timer.poll(self.clock.as_ref());
        match poll {
            TimerPoll::Fire => {
                info!("Sleep timer elapsed");
                self.pause();
                self.emit(PlayerEvent::SleepTimerElapsed);
            }
            TimerPoll::Rearm(residual) => debug!(?residual, "Sleep timer fired early"),
            TimerPoll::Idle => {}
        }
        poll
    }

    // ========================================================================
    // Engine signals
    // ========================================================================

    /// Handle every signal queued so far. Returns how many belonged to the
    /// live engine session.
    pub fn process_pending_signals(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(observed) = self.signals.try_recv() {
            if self.handle_observed(observed) {
                handled += 1;
            }
        }
        handled
    }

    /// Wait for the next signal and handle it. The session holds a sender
    /// itself, so this only returns `false` if the channel was torn down.
    pub async fn process_next_signal(&mut self) -> bool {
        match self.signals.recv().await {
            Some(observed) => {
                self.handle_observed(observed);
                true
            }
            None => false,
        }
    }

    fn handle_observed(&mut self, observed: ObservedSignal) -> bool {
        if !self.observer.accepts(&observed) {
            trace!(session = %observed.session, "Dropping signal from replaced engine session");
            return false;
        }
        self.handle_signal(observed.signal);
        true
    }

    fn handle_signal(&mut self, signal: EngineSignal) {
        trace!(?signal, "Engine signal");
        match signal {
            EngineSignal::ResolveCompleted { request, outcome } => {
                self.on_resolved(request, outcome);
            }
            EngineSignal::PeriodicTime(_) => {
                if self.machine.published().entry.is_some() {
                    let time = self.time_status();
                    self.emit(PlayerEvent::ElapsedTime { time });
                }
            }
            EngineSignal::ItemDidPlayToEnd(entry) => {
                let is_current = self.queue.current_entry().map(|e| e.entry_id()) == Some(entry);
                if self.queue.repeat_mode() == RepeatMode::Track && is_current {
                    debug!("Repeating current track");
                    self.engine.seek(SeekRequestId::new(), Duration::ZERO);
                    if self.play_when_ready {
                        self.engine.play();
                    }
                }
            }
            EngineSignal::SeekCompleted { request, finished } => {
                if self.pending_seek == Some(request) {
                    self.pending_seek = None;
                }
                self.emit(PlayerEvent::SeekCompleted { request, finished });
            }
            EngineSignal::TimedMetadata(items) => {
                self.emit(PlayerEvent::MetadataReceived { items });
            }
            EngineSignal::Failed { message } => {
                warn!(%message, "Engine failure");
                self.emit(PlayerEvent::Failure {
                    item_id: self.current_item_id(),
                    message,
                    recoverable: true,
                });
            }
            EngineSignal::ItemStatusChanged(_)
            | EngineSignal::TimeControlChanged(_)
            | EngineSignal::RateChanged(_)
            | EngineSignal::CurrentEntryChanged(_)
            | EngineSignal::DurationChanged(_)
            | EngineSignal::LoadedRangeChanged(_) => {}
        }
        self.reconcile();
    }

    fn on_resolved(&mut self, request: ResolveRequestId, outcome: ResolveOutcome) {
        match self.queue.complete_resolve(self.engine.as_ref(), request, outcome) {
            ResolveResult::Stale => {}
            ResolveResult::Attached => {
                self.engine.set_rate(self.rate);
                if self.play_when_ready {
                    self.engine.play();
                } else {
                    self.engine.pause();
                }
            }
            ResolveResult::Failed { item, message } => {
                warn!(
                    item_id = %item.id(),
                    locator = %redact_locator(item.locator()),
                    %message,
                    "Item failed to load"
                );
                self.should_be_playing = false;
                self.play_when_ready = false;
                self.emit(PlayerEvent::Failure {
                    item_id: Some(item.id().clone()),
                    message,
                    recoverable: true,
                });
            }
        }
    }

    // ========================================================================
    // Reconcile
    // ========================================================================

    fn machine_inputs(&self) -> MachineInputs {
        MachineInputs {
            play_when_ready: self.play_when_ready,
            stopped: self.stopped,
            pending_resolve: self.queue.is_pending(),
            ran_dry: self.ran_dry,
        }
    }

    /// Catch the logical queue up with an engine that advanced or ran dry
    /// on its own. Runs before any command touches the engine's queue,
    /// since the signals announcing the move may still be queued.
    fn follow_engine(&mut self) {
        if !self.queue.is_attached() {
            return;
        }
        let current = self.engine.snapshot().current_entry;
        match self.queue.sync_with_engine(current) {
            SyncOutcome::Unchanged => {}
            SyncOutcome::Advanced(movement) => self.announce_move(movement),
            SyncOutcome::Exhausted => {
                if self.queue.repeat_mode() == RepeatMode::Queue && !self.stopped {
                    let movement = self.queue.wrap_to_start(self.engine.as_ref());
                    self.announce_move(movement);
                } else {
                    self.ran_dry = true;
                }
            }
        }
    }

    /// Bring the queue and the published state in line with the engine.
    fn reconcile(&mut self) {
        self.follow_engine();

        let snapshot = self.engine.snapshot();
        let update = self.machine.update(&snapshot, self.machine_inputs());
        self.ran_dry = false;

        if update.item_failed.is_some() {
            warn!("Engine reported the current item as failed");
            self.emit(PlayerEvent::Failure {
                item_id: self.current_item_id(),
                message: "The engine could not load the current item".to_string(),
                recoverable: true,
            });
        }

        let mut rate_changed = false;
        let mut dynamic_due = false;
        if let Some(transition) = update.transition {
            if transition.state_changed() {
                debug!(previous = %transition.previous.state, current = %transition.current.state, "State changed");
                self.emit(PlayerEvent::StateChanged {
                    previous: transition.previous.state,
                    current: transition.current.state,
                });
                self.services.sync_background_tasks(transition.current.state);
                dynamic_due = true;
            }
            if transition.duration_changed() {
                self.emit(PlayerEvent::DurationUpdated {
                    duration: transition.current.duration,
                });
                dynamic_due = true;
            }

            let rate = transition.current.state.effective_rate();
            if rate != self.published_rate {
                self.published_rate = rate;
                rate_changed = true;
                self.emit(PlayerEvent::RateUpdated { rate });
            }

            if self.config.dynamic_refresh_only_on_rate_change
                && !rate_changed
                && !transition.duration_changed()
            {
                dynamic_due = false;
            }
        }

        let logical_entry = if self.stopped {
            None
        } else {
            self.queue.current_entry().cloned()
        };
        let time = TimeStatus::from_snapshot(&snapshot);
        self.services.refresh_now_playing(
            logical_entry.as_ref(),
            dynamic_due.then_some(time),
            self.published_rate,
            self.config.default_rate,
        );

        if update.queue_finished {
            info!("Queue finished");
            self.should_be_playing = false;
            self.play_when_ready = false;
            self.emit(PlayerEvent::PlaybackEnded {
                reason: PlaybackEndReason::PlayedToEnd,
                item_id: self.current_item_id(),
            });
            self.emit(PlayerEvent::QueueFinished);
        }
    }

    fn announce_move(&self, movement: QueueMove) {
        if movement.previous_index == Some(movement.index) {
            return;
        }
        let Some(item_id) = self.current_item_id() else {
            return;
        };
        self.emit(PlayerEvent::QueueIndexChanged {
            previous_index: movement.previous_index,
            index: movement.index,
            item_id,
        });
    }

    // ========================================================================
    // Engine recovery
    // ========================================================================

    /// Replace the engine after a failure, rebuilding it from the logical
    /// queue. Playback resumes if the user had it playing.
    #[instrument(skip(self))]
    pub fn recover_engine(&mut self) -> Result<()> {
        self.recreate_engine(RecreationReason::EngineFailure, true)
    }

    /// Detach the old session, create and attach the new one within this
    /// call. Signals still queued for the old session are dropped on arrival.
    fn recreate_engine(&mut self, reason: RecreationReason, resume: bool) -> Result<()> {
        let engine = self
            .factory
            .create()
            .map_err(|error| PlaybackError::EngineFailure(error.to_string()))?;

        self.observer.stop_observing();
        self.engine = engine;
        self.engine_session = EngineSessionId::new();
        self.observer
            .start_observing(Some(Arc::clone(&self.engine)), self.engine_session);
        info!(session = %self.engine_session, ?reason, "Engine session recreated");

        if !resume {
            self.should_be_playing = false;
        }
        self.play_when_ready = self.should_be_playing;
        self.pending_seek = None;

        self.queue.engine_replaced(self.engine.as_ref());
        self.engine.set_rate(self.rate);
        if !self.stopped {
            self.queue.ensure_attached(self.engine.as_ref());
        }

        self.emit(PlayerEvent::EngineSessionRecreated { reason });
        self.reconcile();
        Ok(())
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a listener. Only a weak reference is kept; dropping the
    /// caller's `Arc` unregisters it.
    pub fn add_listener<L>(&self, listener: &Arc<L>) -> ListenerId
    where
        L: EventListener<PlayerEvent> + 'static,
    {
        self.dispatcher.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.dispatcher.remove_listener(id)
    }

    /// Async stream of every event published from now on.
    pub fn subscribe(&self) -> EventStream<PlayerEvent> {
        EventStream::new(self.bus.subscribe())
    }

    fn emit(&self, event: PlayerEvent) {
        trace!(event = %event.description(), severity = ?event.severity(), "Publishing event");
        self.dispatcher.emit(&event);
        self.bus.emit(event).ok();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> PlaybackState {
        self.machine.state()
    }

    pub fn time_status(&self) -> TimeStatus {
        if self.stopped {
            return TimeStatus::default();
        }
        TimeStatus::from_snapshot(&self.engine.snapshot())
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// The user's play intent, independent of what the engine is doing.
    pub fn should_be_playing(&self) -> bool {
        self.should_be_playing
    }

    pub fn is_seeking(&self) -> bool {
        self.pending_seek.is_some()
    }

    pub fn items(&self) -> Vec<Arc<PlayableItem>> {
        self.queue.items()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.queue.current_index()
    }

    pub fn current_item(&self) -> Option<Arc<PlayableItem>> {
        self.queue.current_item().cloned()
    }

    pub fn upcoming(&self) -> Vec<Arc<PlayableItem>> {
        self.queue.upcoming_items()
    }

    pub fn previous_items(&self) -> Vec<Arc<PlayableItem>> {
        self.queue.previous_items()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.queue.repeat_mode()
    }

    pub fn engine_session(&self) -> EngineSessionId {
        self.engine_session
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    fn current_item_id(&self) -> Option<ItemId> {
        self.queue.current_item().map(|item| item.id().clone())
    }

    /// Tear down observation and every system integration. The session
    /// stays usable but no longer talks to the system UI.
    #[instrument(skip(self))]
    pub fn shutdown(&mut self) -> Result<()> {
        self.sleep_timer.cancel();
        self.observer.stop_observing();
        self.engine.pause();
        self.services.shutdown()
    }
}
