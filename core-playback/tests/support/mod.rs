//! Deterministic in-memory collaborators for driving a `PlaybackSession`
//! through whole scenarios.
//!
//! `FakeEngine` behaves like a queue player: inserting into an empty queue
//! makes the item current (unresolved), `play()` waits until the item is
//! ready, and the test decides when the item becomes ready and when the clock
//! actually starts. Signals go out after the state lock is released.

#![allow(dead_code)]

use bridge_traits::background::{BackgroundTaskProvider, BackgroundTaskToken};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::media_session::{
    AudioSessionCategory, AudioSessionManager, AudioSessionMode, AudioSessionOptions,
    NowPlayingInfo, NowPlayingSink, RemoteCommandCenter, RemoteCommandKind,
};
use bridge_traits::playback::{
    EngineFactory, EngineItem, EngineProperty, EngineSignal, EngineSnapshot, EntryId,
    ItemEndAction, ItemStatus, MediaEngine, ResolveOutcome, ResolveRequestId, SeekRequestId,
    SignalSink, SubscriptionId, TimeControlStatus,
};
use bridge_traits::time::Clock;
use bridge_traits::BridgeError;
use chrono::{DateTime, Utc};
use core_playback::{PlayableItem, PlaybackSession, PlaybackState, PlayerConfig, PlayerEvent};
use core_runtime::EventListener;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn locator(id: &str) -> String {
    format!("https://cdn.example.com/audio/{}.mp3", id)
}

pub fn item(id: &str) -> PlayableItem {
    PlayableItem::new(id, locator(id))
        .with_title(format!("Title {}", id))
        .with_artist("Artist")
}

pub fn items(ids: &[&str]) -> Vec<PlayableItem> {
    ids.iter().map(|id| item(id)).collect()
}

// ============================================================================
// Engine
// ============================================================================

/// Knobs shared by every engine a factory creates.
#[derive(Default)]
struct EngineScript {
    durations: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashSet<String>>,
    manual_resolve: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct EngineState {
    pub entries: Vec<EngineItem>,
    pub item_status: ItemStatus,
    pub time_control: TimeControlStatus,
    pub rate: f32,
    pub rate_setting: f32,
    pub wants_play: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub end_action: ItemEndAction,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            item_status: ItemStatus::Unknown,
            time_control: TimeControlStatus::Paused,
            rate: 0.0,
            rate_setting: 1.0,
            wants_play: false,
            position: Duration::ZERO,
            duration: None,
            end_action: ItemEndAction::Advance,
        }
    }
}

impl EngineState {
    /// Reset per-item properties after the current entry changed.
    fn current_changed(&mut self, signals: &mut Vec<EngineSignal>) {
        if self.entries.is_empty() {
            self.wants_play = false;
        }
        self.item_status = ItemStatus::Unknown;
        self.position = Duration::ZERO;
        self.duration = None;
        self.rate = 0.0;
        self.time_control = if self.wants_play {
            TimeControlStatus::WaitingToPlay
        } else {
            TimeControlStatus::Paused
        };

        signals.push(EngineSignal::CurrentEntryChanged(
            self.entries.first().map(|item| item.entry),
        ));
        signals.push(EngineSignal::ItemStatusChanged(self.item_status));
        signals.push(EngineSignal::DurationChanged(None));
        signals.push(EngineSignal::TimeControlChanged(self.time_control));
        signals.push(EngineSignal::RateChanged(0.0));
    }
}

pub struct FakeEngine {
    state: Mutex<EngineState>,
    sinks: Mutex<HashMap<u64, (EngineProperty, Arc<dyn SignalSink>)>>,
    next_subscription: AtomicU64,
    script: Arc<EngineScript>,
    resolves: Mutex<Vec<(ResolveRequestId, String)>>,
    seeks: Mutex<Vec<(SeekRequestId, Duration)>>,
    mutations: AtomicUsize,
}

impl FakeEngine {
    fn new(script: Arc<EngineScript>) -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            sinks: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            script,
            resolves: Mutex::new(Vec::new()),
            seeks: Mutex::new(Vec::new()),
            mutations: AtomicUsize::new(0),
        }
    }

    /// Deliver `signal` to every sink subscribed to its property.
    pub fn emit(&self, signal: EngineSignal) {
        let sinks: Vec<Arc<dyn SignalSink>> = self
            .sinks
            .lock()
            .values()
            .filter(|(property, _)| *property == signal.property())
            .map(|(_, sink)| Arc::clone(sink))
            .collect();
        for sink in sinks {
            sink.deliver(signal.clone());
        }
    }

    fn emit_all(&self, signals: Vec<EngineSignal>) {
        for signal in signals {
            self.emit(signal);
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut EngineState, &mut Vec<EngineSignal>) -> R) -> R {
        let mut signals = Vec::new();
        let result = {
            let mut state = self.state.lock();
            f(&mut state, &mut signals)
        };
        self.emit_all(signals);
        result
    }

    // ------------------------------------------------------------------
    // Test controls
    // ------------------------------------------------------------------

    /// The current item finished loading.
    pub fn make_ready(&self) {
        let locator = self.state.lock().entries.first().map(|e| e.locator.clone());
        let Some(locator) = locator else {
            return;
        };
        let duration = self.script.durations.lock().get(&locator).copied();

        self.with_state(|state, signals| {
            state.item_status = ItemStatus::ReadyToPlay;
            state.duration = duration;
            signals.push(EngineSignal::ItemStatusChanged(ItemStatus::ReadyToPlay));
            signals.push(EngineSignal::DurationChanged(duration));
        });
    }

    /// Enough data buffered: a waiting engine starts its clock.
    pub fn begin_playback(&self) {
        self.with_state(|state, signals| {
            if state.item_status == ItemStatus::ReadyToPlay && state.wants_play {
                state.time_control = TimeControlStatus::Playing;
                state.rate = state.rate_setting;
                signals.push(EngineSignal::TimeControlChanged(TimeControlStatus::Playing));
                signals.push(EngineSignal::RateChanged(state.rate));
            }
        });
    }

    /// Ready, then playing.
    pub fn start(&self) {
        self.make_ready();
        self.begin_playback();
    }

    pub fn stall(&self) {
        self.with_state(|state, signals| {
            state.time_control = TimeControlStatus::WaitingToPlay;
            state.rate = 0.0;
            signals.push(EngineSignal::TimeControlChanged(TimeControlStatus::WaitingToPlay));
            signals.push(EngineSignal::RateChanged(0.0));
        });
    }

    pub fn tick(&self, position: Duration) {
        self.with_state(|state, signals| {
            state.position = position;
            signals.push(EngineSignal::PeriodicTime(position));
        });
    }

    /// The current item plays to its end.
    pub fn finish_current(&self) {
        self.with_state(|state, signals| {
            let Some(current) = state.entries.first().map(|e| e.entry) else {
                return;
            };
            if let Some(duration) = state.duration {
                state.position = duration;
            }
            signals.push(EngineSignal::ItemDidPlayToEnd(current));

            match state.end_action {
                ItemEndAction::Advance => {
                    state.entries.remove(0);
                    state.current_changed(signals);
                }
                ItemEndAction::Pause => {
                    state.wants_play = false;
                    state.time_control = TimeControlStatus::Paused;
                    state.rate = 0.0;
                    signals.push(EngineSignal::TimeControlChanged(TimeControlStatus::Paused));
                    signals.push(EngineSignal::RateChanged(0.0));
                }
            }
        });
    }

    pub fn fail_current(&self) {
        self.with_state(|state, signals| {
            state.item_status = ItemStatus::Failed;
            signals.push(EngineSignal::ItemStatusChanged(ItemStatus::Failed));
        });
    }

    /// Change state without telling anyone; pair with [`emit`](Self::emit).
    pub fn set_quietly(&self, f: impl FnOnce(&mut EngineState)) {
        f(&mut self.state.lock());
    }

    pub fn complete_resolve(&self, request: ResolveRequestId, outcome: ResolveOutcome) {
        self.emit(EngineSignal::ResolveCompleted { request, outcome });
    }

    pub fn resolve_requests(&self) -> Vec<ResolveRequestId> {
        self.resolves.lock().iter().map(|(request, _)| *request).collect()
    }

    pub fn last_resolve(&self) -> Option<ResolveRequestId> {
        self.resolves.lock().last().map(|(request, _)| *request)
    }

    pub fn seeks(&self) -> Vec<(SeekRequestId, Duration)> {
        self.seeks.lock().clone()
    }

    pub fn state(&self) -> EngineState {
        self.state.lock().clone()
    }

    pub fn locators(&self) -> Vec<String> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|item| item.locator.clone())
            .collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

impl MediaEngine for FakeEngine {
    fn subscribe(&self, property: EngineProperty, sink: Arc<dyn SignalSink>) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.sinks.lock().insert(id, (property, sink));
        SubscriptionId(id)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.sinks.lock().remove(&subscription.0);
    }

    fn snapshot(&self) -> EngineSnapshot {
        let state = self.state.lock();
        EngineSnapshot {
            current_entry: state.entries.first().map(|item| item.entry),
            item_status: state.item_status,
            time_control: state.time_control,
            rate: state.rate,
            duration: state.duration,
            position: state.position,
            loaded_range: None,
        }
    }

    fn resolve(&self, request: ResolveRequestId, locator: &str) {
        self.resolves.lock().push((request, locator.to_string()));
        if self.script.manual_resolve.load(Ordering::SeqCst) {
            return;
        }
        let outcome = if self.script.failing.lock().contains(locator) {
            ResolveOutcome::Failed {
                message: "resource not found".to_string(),
            }
        } else {
            ResolveOutcome::Ready
        };
        self.complete_resolve(request, outcome);
    }

    fn insert(&self, item: EngineItem, after: Option<EntryId>) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.with_state(|state, signals| {
            let index = after
                .and_then(|after| state.entries.iter().position(|e| e.entry == after))
                .map_or(state.entries.len(), |position| position + 1);
            state.entries.insert(index, item);
            if index == 0 {
                state.current_changed(signals);
            }
        });
    }

    fn remove(&self, entry: EntryId) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.with_state(|state, signals| {
            let Some(index) = state.entries.iter().position(|e| e.entry == entry) else {
                return;
            };
            state.entries.remove(index);
            if index == 0 {
                state.current_changed(signals);
            }
        });
    }

    fn remove_all(&self) {
        self.with_state(|state, signals| {
            if !state.entries.is_empty() {
                state.entries.clear();
                state.current_changed(signals);
            }
        });
    }

    fn advance_to_next(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.with_state(|state, signals| {
            if !state.entries.is_empty() {
                state.entries.remove(0);
                state.current_changed(signals);
            }
        });
    }

    fn entries(&self) -> Vec<EntryId> {
        self.state.lock().entries.iter().map(|item| item.entry).collect()
    }

    fn play(&self) {
        self.with_state(|state, signals| {
            if state.entries.is_empty() {
                return;
            }
            state.wants_play = true;
            let next = if state.item_status == ItemStatus::ReadyToPlay {
                state.rate = state.rate_setting;
                TimeControlStatus::Playing
            } else {
                TimeControlStatus::WaitingToPlay
            };
            if next != state.time_control {
                state.time_control = next;
                signals.push(EngineSignal::TimeControlChanged(next));
                signals.push(EngineSignal::RateChanged(state.rate));
            }
        });
    }

    fn pause(&self) {
        self.with_state(|state, signals| {
            state.wants_play = false;
            if state.time_control != TimeControlStatus::Paused {
                state.time_control = TimeControlStatus::Paused;
                state.rate = 0.0;
                signals.push(EngineSignal::TimeControlChanged(TimeControlStatus::Paused));
                signals.push(EngineSignal::RateChanged(0.0));
            }
        });
    }

    fn set_rate(&self, rate: f32) {
        self.with_state(|state, signals| {
            state.rate_setting = rate;
            if state.time_control == TimeControlStatus::Playing {
                state.rate = rate;
                signals.push(EngineSignal::RateChanged(rate));
            }
        });
    }

    fn seek(&self, request: SeekRequestId, position: Duration) {
        self.seeks.lock().push((request, position));
        self.with_state(|state, signals| {
            state.position = match state.duration {
                Some(duration) => position.min(duration),
                None => position,
            };
            signals.push(EngineSignal::SeekCompleted {
                request,
                finished: true,
            });
        });
    }

    fn set_item_end_action(&self, action: ItemEndAction) {
        self.state.lock().end_action = action;
    }
}

#[derive(Default)]
pub struct FakeEngineFactory {
    engines: Mutex<Vec<Arc<FakeEngine>>>,
    script: Arc<EngineScript>,
    fail_creation: AtomicBool,
}

impl FakeEngineFactory {
    pub fn set_duration(&self, id: &str, secs: u64) {
        self.script
            .durations
            .lock()
            .insert(locator(id), Duration::from_secs(secs));
    }

    pub fn fail_locator(&self, id: &str) {
        self.script.failing.lock().insert(locator(id));
    }

    /// Resolutions stay pending until the test completes them.
    pub fn manual_resolve(&self) {
        self.script.manual_resolve.store(true, Ordering::SeqCst);
    }

    pub fn fail_creation(&self, fail: bool) {
        self.fail_creation.store(fail, Ordering::SeqCst);
    }

    pub fn latest(&self) -> Arc<FakeEngine> {
        Arc::clone(self.engines.lock().last().expect("no engine created"))
    }

    pub fn created(&self) -> usize {
        self.engines.lock().len()
    }
}

impl EngineFactory for FakeEngineFactory {
    fn create(&self) -> BridgeResult<Arc<dyn MediaEngine>> {
        if self.fail_creation.load(Ordering::SeqCst) {
            return Err(BridgeError::EngineCreation("decoder unavailable".to_string()));
        }
        let engine = Arc::new(FakeEngine::new(Arc::clone(&self.script)));
        self.engines.lock().push(Arc::clone(&engine));
        Ok(engine)
    }
}

// ============================================================================
// System collaborators
// ============================================================================

#[derive(Default)]
pub struct FakeAudioSession {
    activations: AtomicUsize,
    deactivations: AtomicUsize,
    refuse: AtomicBool,
}

impl FakeAudioSession {
    pub fn refuse_activation(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn deactivations(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }
}

impl AudioSessionManager for FakeAudioSession {
    fn activate(
        &self,
        _category: AudioSessionCategory,
        _mode: AudioSessionMode,
        _options: AudioSessionOptions,
    ) -> BridgeResult<()> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(BridgeError::AudioSession("another app owns the session".into()));
        }
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn deactivate(&self) -> BridgeResult<()> {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNowPlaying {
    updates: Mutex<Vec<NowPlayingInfo>>,
    clears: AtomicUsize,
}

impl FakeNowPlaying {
    pub fn updates(&self) -> Vec<NowPlayingInfo> {
        self.updates.lock().clone()
    }

    pub fn last(&self) -> Option<NowPlayingInfo> {
        self.updates.lock().last().cloned()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl NowPlayingSink for FakeNowPlaying {
    fn update(&self, info: &NowPlayingInfo) {
        self.updates.lock().push(info.clone());
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeRemoteCenter {
    registered: Mutex<Vec<RemoteCommandKind>>,
    skip_interval: Mutex<Option<Duration>>,
    unregistered: AtomicBool,
}

impl FakeRemoteCenter {
    pub fn registered(&self) -> Vec<RemoteCommandKind> {
        self.registered.lock().clone()
    }

    pub fn skip_interval(&self) -> Option<Duration> {
        *self.skip_interval.lock()
    }

    pub fn was_unregistered(&self) -> bool {
        self.unregistered.load(Ordering::SeqCst)
    }
}

impl RemoteCommandCenter for FakeRemoteCenter {
    fn register(&self, commands: &[RemoteCommandKind], skip_interval: Duration) {
        *self.registered.lock() = commands.to_vec();
        *self.skip_interval.lock() = Some(skip_interval);
    }

    fn unregister_all(&self) {
        self.registered.lock().clear();
        self.unregistered.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeBackground {
    next: AtomicU64,
    active: Mutex<HashSet<u64>>,
    begun: AtomicUsize,
}

impl FakeBackground {
    pub fn active(&self) -> usize {
        self.active.lock().len()
    }

    pub fn begun(&self) -> usize {
        self.begun.load(Ordering::SeqCst)
    }
}

impl BackgroundTaskProvider for FakeBackground {
    fn begin_task(&self, _name: &str) -> BridgeResult<BackgroundTaskToken> {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        self.active.lock().insert(id);
        self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(BackgroundTaskToken(id))
    }

    fn end_task(&self, token: BackgroundTaskToken) {
        self.active.lock().remove(&token.0);
    }
}

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Mutex::new(Utc::now()))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock();
        *now += chrono::Duration::from_std(by).expect("duration in range");
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

// ============================================================================
// Event recording
// ============================================================================

#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<PlayerEvent>>,
}

impl EventListener<PlayerEvent> for EventRecorder {
    fn on_event(&self, event: &PlayerEvent) {
        self.events.lock().push(event.clone());
    }
}

impl EventRecorder {
    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Every published state, in order.
    pub fn states(&self) -> Vec<PlaybackState> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PlayerEvent::StateChanged { current, .. } => Some(*current),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&PlayerEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|event| predicate(event)).count()
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub session: PlaybackSession,
    pub factory: Arc<FakeEngineFactory>,
    pub audio: Arc<FakeAudioSession>,
    pub now_playing: Arc<FakeNowPlaying>,
    pub remote: Arc<FakeRemoteCenter>,
    pub background: Arc<FakeBackground>,
    pub clock: Arc<ManualClock>,
    pub events: Arc<EventRecorder>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PlayerConfig::default())
    }

    pub fn with_config(config: PlayerConfig) -> Self {
        Self::with_factory(config, Arc::new(FakeEngineFactory::default()))
    }

    pub fn with_factory(config: PlayerConfig, factory: Arc<FakeEngineFactory>) -> Self {
        let audio = Arc::new(FakeAudioSession::default());
        let now_playing = Arc::new(FakeNowPlaying::default());
        let remote = Arc::new(FakeRemoteCenter::default());
        let background = Arc::new(FakeBackground::default());
        let clock = Arc::new(ManualClock::new());

        let session = PlaybackSession::builder(config)
            .engine_factory(factory.clone())
            .audio_session(audio.clone())
            .now_playing(now_playing.clone())
            .remote_commands(remote.clone())
            .background_tasks(background.clone())
            .clock(clock.clone())
            .build()
            .expect("session builds");

        let events = Arc::new(EventRecorder::default());
        session.add_listener(&events);

        Self {
            session,
            factory,
            audio,
            now_playing,
            remote,
            background,
            clock,
            events,
        }
    }

    pub fn engine(&self) -> Arc<FakeEngine> {
        self.factory.latest()
    }

    /// Drain queued engine signals.
    pub fn pump(&mut self) -> usize {
        self.session.process_pending_signals()
    }

    /// Load `ids`, resolve the first one and let it start playing.
    pub fn load_playing(&mut self, ids: &[&str]) {
        self.session.load(items(ids), true).expect("load");
        self.pump();
        self.engine().start();
        self.pump();
        assert!(self.session.state().is_playing(), "expected playing, got {}", self.session.state());
    }

    pub fn current_id(&self) -> Option<String> {
        self.session
            .current_item()
            .map(|item| item.id().as_str().to_string())
    }

    pub fn queue_ids(&self) -> Vec<String> {
        self.session
            .items()
            .iter()
            .map(|item| item.id().as_str().to_string())
            .collect()
    }

    /// Locators the engine holds, as item ids.
    pub fn engine_ids(&self) -> Vec<String> {
        let prefix = locator("");
        let prefix = prefix.trim_end_matches(".mp3");
        self.engine()
            .locators()
            .iter()
            .map(|l| {
                l.trim_start_matches(prefix)
                    .trim_end_matches(".mp3")
                    .to_string()
            })
            .collect()
    }

    /// Ids the engine must hold while attached: current, then upcoming.
    pub fn playable_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.current_id().into_iter().collect();
        ids.extend(
            self.session
                .upcoming()
                .iter()
                .map(|item| item.id().as_str().to_string()),
        );
        ids
    }
}
