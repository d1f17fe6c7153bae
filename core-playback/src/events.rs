//! # Player Events
//!
//! Everything a [`PlaybackSession`](crate::PlaybackSession) tells its
//! listeners. Events are delivered synchronously through the session's
//! [`EventDispatcher`](core_runtime::EventDispatcher) and mirrored onto its
//! broadcast [`EventBus`](core_runtime::EventBus).

use bridge_traits::media_session::RemoteCommandKind;
use bridge_traits::playback::{MetadataItem, SeekRequestId};
use core_runtime::EventSeverity;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::item::ItemId;
use crate::state::{PlaybackState, TimeStatus};

/// Why playback of an item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEndReason {
    /// The last queued item played to its end.
    PlayedToEnd,
    PlayerStopped,
    SkippedToNext,
    SkippedToPrevious,
    Jumped,
}

/// Why the engine session was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecreationReason {
    MediaServicesReset,
    EngineFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    StateChanged {
        previous: PlaybackState,
        current: PlaybackState,
    },
    PlaybackEnded {
        reason: PlaybackEndReason,
        item_id: Option<ItemId>,
    },
    QueueIndexChanged {
        previous_index: Option<usize>,
        index: usize,
        item_id: ItemId,
    },
    /// The queue ran out on its own. Fired once per exhaustion.
    QueueFinished,
    ElapsedTime {
        time: TimeStatus,
    },
    DurationUpdated {
        duration: Option<Duration>,
    },
    RateUpdated {
        rate: f32,
    },
    MetadataReceived {
        items: Vec<MetadataItem>,
    },
    Failure {
        item_id: Option<ItemId>,
        message: String,
        recoverable: bool,
    },
    SeekCompleted {
        request: SeekRequestId,
        finished: bool,
    },
    EngineSessionRecreated {
        reason: RecreationReason,
    },
    /// Like, dislike and bookmark commands from the system UI.
    RemoteFeedback {
        command: RemoteCommandKind,
        item_id: Option<ItemId>,
    },
    SleepTimerElapsed,
}

impl PlayerEvent {
    pub fn description(&self) -> String {
        match self {
            PlayerEvent::StateChanged { previous, current } => {
                format!("State changed: {} -> {}", previous, current)
            }
            PlayerEvent::PlaybackEnded { reason, item_id } => match item_id {
                Some(id) => format!("Playback of {} ended: {:?}", id, reason),
                None => format!("Playback ended: {:?}", reason),
            },
            PlayerEvent::QueueIndexChanged { index, item_id, .. } => {
                format!("Queue moved to {} ({})", index, item_id)
            }
            PlayerEvent::QueueFinished => "Queue finished".to_string(),
            PlayerEvent::ElapsedTime { time } => format!("Elapsed {:?}", time.position),
            PlayerEvent::DurationUpdated { duration } => format!("Duration {:?}", duration),
            PlayerEvent::RateUpdated { rate } => format!("Rate {}", rate),
            PlayerEvent::MetadataReceived { items } => {
                format!("Received {} metadata items", items.len())
            }
            PlayerEvent::Failure { message, .. } => format!("Playback failure: {}", message),
            PlayerEvent::SeekCompleted { finished, .. } => {
                format!("Seek completed (finished: {})", finished)
            }
            PlayerEvent::EngineSessionRecreated { reason } => {
                format!("Engine session recreated: {:?}", reason)
            }
            PlayerEvent::RemoteFeedback { command, .. } => {
                format!("Remote feedback: {:?}", command)
            }
            PlayerEvent::SleepTimerElapsed => "Sleep timer elapsed".to_string(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            PlayerEvent::Failure {
                recoverable: false, ..
            } => EventSeverity::Error,
            PlayerEvent::Failure { .. } | PlayerEvent::EngineSessionRecreated { .. } => {
                EventSeverity::Warning
            }
            PlayerEvent::ElapsedTime { .. } | PlayerEvent::RateUpdated { .. } => {
                EventSeverity::Debug
            }
            _ => EventSeverity::Info,
        }
    }
}
