//! Media engine bridge contracts.
//!
//! The playback core never talks to a platform player directly. Hosts wrap
//! their native engine (an `AVQueuePlayer`, an `ExoPlayer`, a web audio
//! element pool) in a [`MediaEngine`] implementation and hand the core an
//! [`EngineFactory`] so a defunct engine can be replaced after a failure or a
//! media-services reset.
//!
//! ## Signals
//!
//! Engines report every independently changing property as an
//! [`EngineSignal`] pushed into the [`SignalSink`] registered for that
//! [`EngineProperty`]. Signals carry the new value for convenience, but the
//! core always re-reads a full [`EngineSnapshot`] before deciding anything, so
//! engines are free to fire signals in any order and more than once.
//!
//! ## Internal queue
//!
//! The engine owns an append/advance-only queue of [`EngineItem`]s. Inserting
//! into an empty queue makes the inserted item current. `advance_to_next`
//! drops the current item and promotes the next one. There is no way to move
//! backwards; the core materializes backward navigation by inserting fresh
//! entries ahead of the current one.

use crate::{error::Result, platform::PlatformSendSync};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Construct an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Borrow the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Identity of one playable instance inside the engine queue.
    ///
    /// Two entries for the same track (e.g. after navigating backwards) have
    /// different entry ids.
    EntryId
);

uuid_identifier!(
    /// Identity of one live engine session. A recreated engine gets a new id.
    EngineSessionId
);

uuid_identifier!(
    /// Identity of an asynchronous locator resolution.
    ResolveRequestId
);

uuid_identifier!(
    /// Identity of an asynchronous seek.
    SeekRequestId
);

/// Handle returned by [`MediaEngine::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// One entry submitted to the engine queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineItem {
    pub entry: EntryId,
    pub locator: String,
}

impl EngineItem {
    pub fn new(entry: EntryId, locator: impl Into<String>) -> Self {
        Self {
            entry,
            locator: locator.into(),
        }
    }
}

/// Readiness of the engine's current item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItemStatus {
    /// Not resolved yet.
    #[default]
    Unknown,
    ReadyToPlay,
    Failed,
}

/// What the engine's clock is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeControlStatus {
    #[default]
    Paused,
    /// Playback was requested but the engine is waiting for data.
    WaitingToPlay,
    Playing,
}

/// What the engine does when the current item plays to its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemEndAction {
    /// Promote the next queued item.
    #[default]
    Advance,
    /// Stay on the finished item, paused at its end.
    Pause,
}

/// Buffered time range of the current item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedRange {
    pub start: Duration,
    pub end: Duration,
}

/// One timed-metadata key/value pair read from a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
}

impl MetadataItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Outcome of resolving a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Ready,
    Failed { message: String },
}

/// Independently observable engine properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineProperty {
    ItemStatus,
    TimeControl,
    Rate,
    CurrentEntry,
    Duration,
    LoadedRange,
    PeriodicTime,
    EndOfMedia,
    Resolution,
    SeekCompletion,
    TimedMetadata,
    Failure,
}

impl EngineProperty {
    /// Every property, in subscription order.
    pub const ALL: [EngineProperty; 12] = [
        EngineProperty::ItemStatus,
        EngineProperty::TimeControl,
        EngineProperty::Rate,
        EngineProperty::CurrentEntry,
        EngineProperty::Duration,
        EngineProperty::LoadedRange,
        EngineProperty::PeriodicTime,
        EngineProperty::EndOfMedia,
        EngineProperty::Resolution,
        EngineProperty::SeekCompletion,
        EngineProperty::TimedMetadata,
        EngineProperty::Failure,
    ];
}

/// A raw change notification from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    ItemStatusChanged(ItemStatus),
    TimeControlChanged(TimeControlStatus),
    RateChanged(f32),
    CurrentEntryChanged(Option<EntryId>),
    DurationChanged(Option<Duration>),
    LoadedRangeChanged(Option<LoadedRange>),
    /// Periodic elapsed-time tick while the clock runs.
    PeriodicTime(Duration),
    /// The given entry played to its end.
    ItemDidPlayToEnd(EntryId),
    ResolveCompleted {
        request: ResolveRequestId,
        outcome: ResolveOutcome,
    },
    SeekCompleted {
        request: SeekRequestId,
        finished: bool,
    },
    TimedMetadata(Vec<MetadataItem>),
    /// The engine itself became unusable.
    Failed { message: String },
}

impl EngineSignal {
    /// The property this signal reports on.
    pub fn property(&self) -> EngineProperty {
        match self {
            EngineSignal::ItemStatusChanged(_) => EngineProperty::ItemStatus,
            EngineSignal::TimeControlChanged(_) => EngineProperty::TimeControl,
            EngineSignal::RateChanged(_) => EngineProperty::Rate,
            EngineSignal::CurrentEntryChanged(_) => EngineProperty::CurrentEntry,
            EngineSignal::DurationChanged(_) => EngineProperty::Duration,
            EngineSignal::LoadedRangeChanged(_) => EngineProperty::LoadedRange,
            EngineSignal::PeriodicTime(_) => EngineProperty::PeriodicTime,
            EngineSignal::ItemDidPlayToEnd(_) => EngineProperty::EndOfMedia,
            EngineSignal::ResolveCompleted { .. } => EngineProperty::Resolution,
            EngineSignal::SeekCompleted { .. } => EngineProperty::SeekCompletion,
            EngineSignal::TimedMetadata(_) => EngineProperty::TimedMetadata,
            EngineSignal::Failed { .. } => EngineProperty::Failure,
        }
    }
}

/// Point-in-time view of every engine property.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineSnapshot {
    pub current_entry: Option<EntryId>,
    pub item_status: ItemStatus,
    pub time_control: TimeControlStatus,
    pub rate: f32,
    /// `None` while unknown or for indefinite (live) streams.
    pub duration: Option<Duration>,
    pub position: Duration,
    pub loaded_range: Option<LoadedRange>,
}

/// Receiver side of an engine subscription.
///
/// Implementations must not block; the core's sink only enqueues the signal
/// for delivery on the host's main context.
pub trait SignalSink: PlatformSendSync {
    fn deliver(&self, signal: EngineSignal);
}

/// Platform media engine driven by the playback core.
///
/// All methods are non-blocking. Asynchronous work (locator resolution,
/// seeking) completes through signals.
pub trait MediaEngine: PlatformSendSync {
    /// Register `sink` for changes of `property`.
    fn subscribe(&self, property: EngineProperty, sink: Arc<dyn SignalSink>) -> SubscriptionId;

    /// Detach a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, subscription: SubscriptionId);

    /// Read every property at once.
    fn snapshot(&self) -> EngineSnapshot;

    /// Start resolving `locator`; completion arrives as
    /// [`EngineSignal::ResolveCompleted`] tagged with `request`.
    fn resolve(&self, request: ResolveRequestId, locator: &str);

    /// Insert `item` after `after`, or at the end when `after` is `None`.
    fn insert(&self, item: EngineItem, after: Option<EntryId>);

    fn remove(&self, entry: EntryId);

    fn remove_all(&self);

    fn advance_to_next(&self);

    /// Entry ids in engine order, current first.
    fn entries(&self) -> Vec<EntryId>;

    fn play(&self);

    fn pause(&self);

    fn set_rate(&self, rate: f32);

    fn seek(&self, request: SeekRequestId, position: Duration);

    fn set_item_end_action(&self, action: ItemEndAction);
}

/// Creates engine sessions. Called once at construction and again whenever
/// the core has to replace a defunct engine.
pub trait EngineFactory: PlatformSendSync {
    fn create(&self) -> Result<Arc<dyn MediaEngine>>;
}
