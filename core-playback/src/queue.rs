//! # Queue Controller
//!
//! The logical queue is `previous`, `current`, `upcoming`. The engine only
//! holds the playable tail of it, `current` followed by `upcoming`, and can
//! only append or advance. Every operation keeps the two in step:
//!
//! - forward navigation removes the skipped engine entries and advances;
//! - backward navigation inserts fresh entries for the target (and everything
//!   up to the old current item) right after the engine's current entry and
//!   advances into them.
//!
//! Both cost engine mutations proportional to the distance travelled. The
//! queue is never reloaded into the engine, except when it has to be
//! materialized from scratch (after `load`, after the engine ran dry, or
//! after an engine was replaced).
//!
//! Materializing starts with a locator resolution. The controller remembers
//! the pending [`ResolveRequestId`]; a completion carrying any other id is
//! stale and dropped. Navigation while a resolution is pending moves the
//! pointer and issues a new request, so the last command wins.

use bridge_traits::playback::{
    EntryId, ItemEndAction, MediaEngine, ResolveOutcome, ResolveRequestId,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::QueueError;
use crate::item::{ItemId, PlayableItem, QueueEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl RepeatMode {
    fn item_end_action(self) -> ItemEndAction {
        match self {
            RepeatMode::Track => ItemEndAction::Pause,
            RepeatMode::Off | RepeatMode::Queue => ItemEndAction::Advance,
        }
    }
}

/// Relationship between the logical queue and the engine's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineLink {
    /// The engine holds nothing for this queue.
    Detached,
    /// The current locator is resolving.
    Pending(ResolveRequestId),
    /// The engine holds exactly `current` followed by `upcoming`.
    Attached,
}

/// A change of the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueMove {
    pub previous_index: Option<usize>,
    pub index: usize,
}

impl QueueMove {
    /// The "move" re-selected the item that was already current.
    pub fn is_restart(&self) -> bool {
        self.previous_index == Some(self.index)
    }
}

/// Outcome of reconciling with the engine's current entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Unchanged,
    /// The engine advanced on its own (end of media).
    Advanced(QueueMove),
    /// The engine ran out of entries. The logical position is kept.
    Exhausted,
}

/// Outcome of a locator resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveResult {
    /// Superseded by a later command; ignored.
    Stale,
    Attached,
    Failed {
        item: Arc<PlayableItem>,
        message: String,
    },
}

#[derive(Debug)]
pub struct QueueController {
    previous: Vec<QueueEntry>,
    current: Option<QueueEntry>,
    upcoming: VecDeque<QueueEntry>,
    link: EngineLink,
    repeat_mode: RepeatMode,
}

impl QueueController {
    pub fn new(repeat_mode: RepeatMode) -> Self {
        Self {
            previous: Vec::new(),
            current: None,
            upcoming: VecDeque::new(),
            link: EngineLink::Detached,
            repeat_mode,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.previous.len() + usize::from(self.current.is_some()) + self.upcoming.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current.as_ref().map(|_| self.previous.len())
    }

    pub fn current_entry(&self) -> Option<&QueueEntry> {
        self.current.as_ref()
    }

    pub fn current_item(&self) -> Option<&Arc<PlayableItem>> {
        self.current.as_ref().map(QueueEntry::item)
    }

    /// Every item in queue order.
    pub fn items(&self) -> Vec<Arc<PlayableItem>> {
        self.entries().map(|entry| Arc::clone(entry.item())).collect()
    }

    pub fn previous_items(&self) -> Vec<Arc<PlayableItem>> {
        self.previous.iter().map(|e| Arc::clone(e.item())).collect()
    }

    pub fn upcoming_items(&self) -> Vec<Arc<PlayableItem>> {
        self.upcoming.iter().map(|e| Arc::clone(e.item())).collect()
    }

    /// Entry ids the engine must hold while attached: current, then upcoming.
    pub fn playable_entry_ids(&self) -> Vec<EntryId> {
        self.current
            .iter()
            .chain(self.upcoming.iter())
            .map(QueueEntry::entry_id)
            .collect()
    }

    pub fn link(&self) -> EngineLink {
        self.link
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.link, EngineLink::Pending(_))
    }

    pub fn is_attached(&self) -> bool {
        self.link == EngineLink::Attached
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    fn entries(&self) -> impl Iterator<Item = &QueueEntry> {
        self.previous
            .iter()
            .chain(self.current.iter())
            .chain(self.upcoming.iter())
    }

    // ------------------------------------------------------------------
    // Engine link
    // ------------------------------------------------------------------

    /// Replace the whole queue. The first item becomes current and starts
    /// resolving; any pending resolution is superseded.
    pub fn load(&mut self, engine: &dyn MediaEngine, items: Vec<Arc<PlayableItem>>) {
        engine.remove_all();
        self.previous.clear();
        self.upcoming = items.into_iter().map(QueueEntry::new).collect();
        self.current = self.upcoming.pop_front();
        self.link = EngineLink::Detached;

        debug!(len = self.len(), "Queue loaded");
        if self.current.is_some() {
            self.materialize(engine);
        }
    }

    /// Empty the engine and start resolving the current item.
    fn materialize(&mut self, engine: &dyn MediaEngine) {
        engine.remove_all();
        let Some(current) = &self.current else {
            self.link = EngineLink::Detached;
            return;
        };

        let request = ResolveRequestId::new();
        debug!(%request, item_id = %current.item_id(), "Resolving current item");
        engine.resolve(request, current.item().locator());
        self.link = EngineLink::Pending(request);
    }

    /// Feed a resolution result back in.
    pub fn complete_resolve(
        &mut self,
        engine: &dyn MediaEngine,
        request: ResolveRequestId,
        outcome: ResolveOutcome,
    ) -> ResolveResult {
        if self.link != EngineLink::Pending(request) {
            debug!(%request, "Ignoring stale resolution");
            return ResolveResult::Stale;
        }
        let Some(current) = &self.current else {
            self.link = EngineLink::Detached;
            return ResolveResult::Stale;
        };

        match outcome {
            ResolveOutcome::Ready => {
                for entry in self.current.iter().chain(self.upcoming.iter()) {
                    engine.insert(entry.to_engine_item(), None);
                }
                self.link = EngineLink::Attached;
                debug!(entries = self.upcoming.len() + 1, "Queue attached to engine");
                ResolveResult::Attached
            }
            ResolveOutcome::Failed { message } => {
                warn!(item_id = %current.item_id(), %message, "Locator failed to resolve");
                let item = Arc::clone(current.item());
                self.link = EngineLink::Detached;
                ResolveResult::Failed { item, message }
            }
        }
    }

    /// Materialize if the engine holds nothing for this queue. Returns
    /// `true` when a resolution was started.
    pub fn ensure_attached(&mut self, engine: &dyn MediaEngine) -> bool {
        if self.link == EngineLink::Detached && self.current.is_some() {
            self.materialize(engine);
            true
        } else {
            false
        }
    }

    /// Empty the engine, keeping the logical queue and position.
    pub fn detach(&mut self, engine: &dyn MediaEngine) {
        engine.remove_all();
        self.link = EngineLink::Detached;
    }

    /// Forget the engine link after the engine itself was replaced. The
    /// fresh engine gets the repeat configuration.
    pub fn engine_replaced(&mut self, engine: &dyn MediaEngine) {
        self.link = EngineLink::Detached;
        engine.set_item_end_action(self.repeat_mode.item_end_action());
    }

    /// Follow the engine after it advanced on its own.
    pub fn sync_with_engine(&mut self, engine_current: Option<EntryId>) -> SyncOutcome {
        if self.link != EngineLink::Attached {
            return SyncOutcome::Unchanged;
        }
        let Some(current) = &self.current else {
            return SyncOutcome::Unchanged;
        };

        let Some(engine_current) = engine_current else {
            debug!("Engine ran out of entries");
            self.link = EngineLink::Detached;
            return SyncOutcome::Exhausted;
        };
        if engine_current == current.entry_id() {
            return SyncOutcome::Unchanged;
        }

        let Some(offset) = self
            .upcoming
            .iter()
            .position(|entry| entry.entry_id() == engine_current)
        else {
            warn!(entry = %engine_current, "Engine reports an entry unknown to the queue");
            return SyncOutcome::Unchanged;
        };

        let previous_index = self.current_index();
        self.advance_pointer(offset);
        SyncOutcome::Advanced(QueueMove {
            previous_index,
            index: self.previous.len(),
        })
    }

    /// Move `current` and the first `skipped` upcoming entries into
    /// `previous`, promoting the next upcoming entry.
    fn advance_pointer(&mut self, skipped: usize) {
        if let Some(current) = self.current.take() {
            self.previous.push(current);
        }
        self.previous.extend(self.upcoming.drain(..skipped));
        self.current = self.upcoming.pop_front();
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn next(&mut self, engine: &dyn MediaEngine) -> Result<QueueMove, QueueError> {
        let index = self.current_index().ok_or(QueueError::EmptyQueue)?;

        if self.upcoming.is_empty() {
            return match self.repeat_mode {
                RepeatMode::Queue => Ok(self.wrap_to_start(engine)),
                RepeatMode::Track => Err(QueueError::NoNextItemUnderTrackRepeat),
                RepeatMode::Off => Err(QueueError::NoNextItem),
            };
        }

        self.jump_to_index(engine, index + 1)
    }

    pub fn previous(&mut self, engine: &dyn MediaEngine) -> Result<QueueMove, QueueError> {
        let index = self.current_index().ok_or(QueueError::EmptyQueue)?;
        if index == 0 {
            return Err(QueueError::NoPreviousItem);
        }
        self.jump_to_index(engine, index - 1)
    }

    /// Jump to the nearest occurrence of `id`: ahead first, then the current
    /// item, then behind.
    pub fn jump_to_item(
        &mut self,
        engine: &dyn MediaEngine,
        id: &ItemId,
    ) -> Result<QueueMove, QueueError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| QueueError::ItemNotFound(id.clone()))?;
        self.jump_to_index(engine, index)
    }

    fn index_of(&self, id: &ItemId) -> Option<usize> {
        let current = self.current_index()?;
        if let Some(offset) = self.upcoming.iter().position(|e| e.item_id() == id) {
            return Some(current + 1 + offset);
        }
        if self.current.as_ref().map(QueueEntry::item_id) == Some(id) {
            return Some(current);
        }
        self.previous.iter().rposition(|e| e.item_id() == id)
    }

    pub fn jump_to_index(
        &mut self,
        engine: &dyn MediaEngine,
        index: usize,
    ) -> Result<QueueMove, QueueError> {
        let len = self.len();
        let current = self.current_index().ok_or(QueueError::EmptyQueue)?;
        if index >= len {
            return Err(QueueError::InvalidIndex { index, len });
        }

        let movement = QueueMove {
            previous_index: Some(current),
            index,
        };
        if index == current {
            self.ensure_attached(engine);
            return Ok(movement);
        }

        if self.link != EngineLink::Attached {
            self.repoint(index);
            self.materialize(engine);
            return Ok(movement);
        }

        if index > current {
            let skipped = index - current - 1;
            for entry in self.upcoming.iter().take(skipped) {
                engine.remove(entry.entry_id());
            }
            self.advance_pointer(skipped);
            engine.advance_to_next();
        } else {
            self.step_back_to(engine, index);
        }

        debug!(from = current, to = index, "Queue position changed");
        Ok(movement)
    }

    /// Insert fresh copies of `previous[index..]` and the current entry right
    /// after the engine's current entry, then advance into the first one.
    fn step_back_to(&mut self, engine: &dyn MediaEngine, index: usize) {
        let Some(current) = self.current.take() else {
            return;
        };
        let replayed: Vec<QueueEntry> = self
            .previous
            .drain(index..)
            .chain(std::iter::once(current.clone()))
            .map(|entry| entry.fresh_copy())
            .collect();

        let mut after = current.entry_id();
        for entry in &replayed {
            engine.insert(entry.to_engine_item(), Some(after));
            after = entry.entry_id();
        }
        engine.advance_to_next();

        let mut replayed = replayed.into_iter();
        self.current = replayed.next();
        let tail: Vec<QueueEntry> = replayed.collect();
        for entry in tail.into_iter().rev() {
            self.upcoming.push_front(entry);
        }
    }

    /// Move the pointer without touching the engine.
    fn repoint(&mut self, index: usize) {
        let mut all: VecDeque<QueueEntry> = self
            .previous
            .drain(..)
            .chain(self.current.take())
            .chain(self.upcoming.drain(..))
            .collect();
        self.previous = all.drain(..index).collect();
        self.current = all.pop_front();
        self.upcoming = all;
    }

    /// Restart the queue from the first entry and materialize it.
    pub fn wrap_to_start(&mut self, engine: &dyn MediaEngine) -> QueueMove {
        let previous_index = self.current_index();
        self.repoint(0);
        self.materialize(engine);
        debug!("Queue wrapped to start");
        QueueMove {
            previous_index,
            index: 0,
        }
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Insert `items` before `before`, or append when `None`. Adding to an
    /// empty queue makes the first item current without materializing it.
    pub fn add(
        &mut self,
        engine: &dyn MediaEngine,
        items: Vec<Arc<PlayableItem>>,
        before: Option<usize>,
    ) -> Result<(), QueueError> {
        let len = self.len();
        let mut entries: VecDeque<QueueEntry> = items.into_iter().map(QueueEntry::new).collect();
        if entries.is_empty() {
            return Ok(());
        }

        let Some(current) = self.current_index() else {
            return match before {
                Some(index) if index > 0 => Err(QueueError::InvalidIndex { index, len }),
                _ => {
                    self.current = entries.pop_front();
                    self.upcoming = entries;
                    self.link = EngineLink::Detached;
                    Ok(())
                }
            };
        };

        let index = before.unwrap_or(len);
        if index > len {
            return Err(QueueError::InvalidIndex { index, len });
        }

        if index <= current {
            let tail = self.previous.split_off(index);
            self.previous.extend(entries);
            self.previous.extend(tail);
            return Ok(());
        }

        let offset = index - current - 1;
        if self.link == EngineLink::Attached {
            let mut after = if offset == 0 {
                self.current.as_ref().map(QueueEntry::entry_id)
            } else {
                self.upcoming.get(offset - 1).map(QueueEntry::entry_id)
            };
            for entry in &entries {
                engine.insert(entry.to_engine_item(), after);
                after = Some(entry.entry_id());
            }
        }
        for (position, entry) in entries.into_iter().enumerate() {
            self.upcoming.insert(offset + position, entry);
        }
        Ok(())
    }

    /// Remove the entry at `index`. The current entry cannot be removed.
    pub fn remove_item(
        &mut self,
        engine: &dyn MediaEngine,
        index: usize,
    ) -> Result<Arc<PlayableItem>, QueueError> {
        let len = self.len();
        let current = self.current_index().ok_or(QueueError::EmptyQueue)?;
        if index >= len {
            return Err(QueueError::InvalidIndex { index, len });
        }

        if index < current {
            return Ok(Arc::clone(self.previous.remove(index).item()));
        }
        if index == current {
            return Err(QueueError::CannotRemoveCurrent);
        }

        let entry = self
            .upcoming
            .remove(index - current - 1)
            .ok_or(QueueError::InvalidIndex { index, len })?;
        if self.link == EngineLink::Attached {
            engine.remove(entry.entry_id());
        }
        Ok(Arc::clone(entry.item()))
    }

    pub fn remove_upcoming(&mut self, engine: &dyn MediaEngine) {
        if self.link == EngineLink::Attached {
            for entry in &self.upcoming {
                engine.remove(entry.entry_id());
            }
        }
        self.upcoming.clear();
    }

    pub fn remove_previous(&mut self) {
        self.previous.clear();
    }

    pub fn set_repeat_mode(&mut self, engine: &dyn MediaEngine, mode: RepeatMode) {
        self.repeat_mode = mode;
        engine.set_item_end_action(mode.item_end_action());
    }
}
