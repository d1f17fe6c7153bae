//! # Playback State Machine
//!
//! Turns whatever the engine currently reports into one canonical
//! [`PlaybackState`].
//!
//! Engines fire several signals for one logical change (a track switch
//! changes the current entry, the item status, the duration and the rate), in
//! no guaranteed order. The machine never patches its state from a single
//! signal. Every signal triggers a full recompute from an [`EngineSnapshot`],
//! and the result is compared against the last published
//! [`PlayerSnapshot`]; only a structural difference is published. Replaying a
//! signal, or reordering signals that describe the same end state, therefore
//! cannot produce extra or different transitions.

use bridge_traits::playback::{EngineSnapshot, EntryId, ItemStatus, TimeControlStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Canonical playback state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    /// Nothing loaded.
    #[default]
    Idle,
    /// Locator submitted and resolving, or the engine reported a recoverable
    /// item failure.
    Loading,
    /// Loaded, not started yet.
    Ready,
    /// Started, stalled waiting for data.
    Buffering,
    Paused,
    /// Always carries a non-zero rate.
    Playing { rate: f32 },
}

impl PlaybackState {
    /// Zero for every case except `Playing`.
    pub fn effective_rate(&self) -> f32 {
        match self {
            PlaybackState::Playing { rate } => *rate,
            _ => 0.0,
        }
    }

    /// Waiting on the engine: background execution must be held.
    pub fn is_pending(&self) -> bool {
        matches!(self, PlaybackState::Loading | PlaybackState::Buffering)
    }

    /// Not waiting on the engine.
    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing { .. })
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => f.write_str("idle"),
            PlaybackState::Loading => f.write_str("loading"),
            PlaybackState::Ready => f.write_str("ready"),
            PlaybackState::Buffering => f.write_str("buffering"),
            PlaybackState::Paused => f.write_str("paused"),
            PlaybackState::Playing { rate } => write!(f, "playing({})", rate),
        }
    }
}

/// Duration and position, with the position clamped into `[0, duration]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeStatus {
    /// `None` while unknown or for live streams.
    pub duration: Option<Duration>,
    pub position: Duration,
}

impl TimeStatus {
    pub fn new(duration: Option<Duration>, raw_position: Duration) -> Self {
        let position = match duration {
            Some(duration) => raw_position.min(duration),
            None => raw_position,
        };
        Self { duration, position }
    }

    pub fn from_snapshot(snapshot: &EngineSnapshot) -> Self {
        Self::new(snapshot.duration, snapshot.position)
    }
}

/// The unit of comparison for publishing: current entry, state, duration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerSnapshot {
    pub entry: Option<EntryId>,
    pub state: PlaybackState,
    pub duration: Option<Duration>,
}

/// Session-level inputs that the engine cannot know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MachineInputs {
    /// Playback was requested and should start as soon as the item allows.
    pub play_when_ready: bool,
    /// `stop()` was called and nothing has been started since.
    pub stopped: bool,
    /// A locator resolution is in flight for the logical current item.
    pub pending_resolve: bool,
    /// The engine played past its last entry since the previous update.
    /// Replacing or emptying the queue by command never sets this.
    pub ran_dry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub previous: PlayerSnapshot,
    pub current: PlayerSnapshot,
}

impl Transition {
    pub fn state_changed(&self) -> bool {
        self.previous.state != self.current.state
    }

    pub fn entry_changed(&self) -> bool {
        self.previous.entry != self.current.entry
    }

    pub fn duration_changed(&self) -> bool {
        self.previous.duration != self.current.duration
    }
}

/// Result of one recompute.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StateUpdate {
    /// Set only when the published snapshot changed.
    pub transition: Option<Transition>,
    /// The engine ran out of entries on its own. Reported once per
    /// exhaustion.
    pub queue_finished: bool,
    /// The engine reported this entry as failed. Reported once per entry.
    pub item_failed: Option<EntryId>,
}

#[derive(Debug, Default)]
pub struct PlaybackStateMachine {
    published: PlayerSnapshot,
    /// Entry that has been seen playing at a non-zero rate.
    started: Option<EntryId>,
    failure_reported: Option<EntryId>,
}

impl PlaybackStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> &PlayerSnapshot {
        &self.published
    }

    pub fn state(&self) -> PlaybackState {
        self.published.state
    }

    /// Compute the canonical state for `snapshot` without publishing.
    pub fn compute(&self, snapshot: &EngineSnapshot, inputs: MachineInputs) -> PlaybackState {
        if inputs.stopped {
            return PlaybackState::Idle;
        }
        if inputs.pending_resolve {
            return PlaybackState::Loading;
        }
        let Some(entry) = snapshot.current_entry else {
            return PlaybackState::Idle;
        };

        match snapshot.item_status {
            ItemStatus::Unknown | ItemStatus::Failed => PlaybackState::Loading,
            ItemStatus::ReadyToPlay => {
                let started = self.started == Some(entry);
                match snapshot.time_control {
                    TimeControlStatus::Playing if snapshot.rate != 0.0 => {
                        PlaybackState::Playing {
                            rate: snapshot.rate,
                        }
                    }
                    TimeControlStatus::Playing | TimeControlStatus::WaitingToPlay => {
                        if started {
                            PlaybackState::Buffering
                        } else {
                            PlaybackState::Ready
                        }
                    }
                    TimeControlStatus::Paused => {
                        if !started {
                            PlaybackState::Ready
                        } else if inputs.play_when_ready {
                            PlaybackState::Buffering
                        } else {
                            PlaybackState::Paused
                        }
                    }
                }
            }
        }
    }

    /// Recompute from `snapshot` and publish if anything changed.
    pub fn update(&mut self, snapshot: &EngineSnapshot, inputs: MachineInputs) -> StateUpdate {
        let state = self.compute(snapshot, inputs);

        if let (Some(entry), PlaybackState::Playing { .. }) = (snapshot.current_entry, state) {
            self.started = Some(entry);
        }

        let item_failed = match snapshot.current_entry {
            Some(entry)
                if snapshot.item_status == ItemStatus::Failed
                    && self.failure_reported != Some(entry) =>
            {
                self.failure_reported = Some(entry);
                Some(entry)
            }
            _ => None,
        };

        let entry = if inputs.stopped {
            None
        } else {
            snapshot.current_entry
        };
        let next = PlayerSnapshot {
            entry,
            state,
            duration: entry.and(snapshot.duration),
        };

        if next == self.published {
            return StateUpdate {
                item_failed,
                ..StateUpdate::default()
            };
        }

        let previous = std::mem::replace(&mut self.published, next);
        let queue_finished = inputs.ran_dry
            && previous.entry.is_some()
            && next.entry.is_none()
            && !inputs.stopped
            && !inputs.pending_resolve;

        StateUpdate {
            transition: Some(Transition {
                previous,
                current: next,
            }),
            queue_finished,
            item_failed,
        }
    }
}
