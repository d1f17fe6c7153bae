//! Playable items and queue entries.

use bridge_traits::media_session::{MediaType, StaticMetadata};
use bridge_traits::playback::{EngineItem, EntryId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Caller-assigned identity of a playable item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Descriptive metadata surfaced to listeners and the now-playing sink.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album_title: Option<String>,
    pub album_artist: Option<String>,
    pub artwork: Option<String>,
    #[serde(default)]
    pub media_type: MediaType,
}

/// An immutable playable item: identity, locator and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayableItem {
    id: ItemId,
    locator: String,
    metadata: ItemMetadata,
}

impl PlayableItem {
    pub fn new(id: impl Into<ItemId>, locator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locator: locator.into(),
            metadata: ItemMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ItemMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.metadata.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.metadata.album_title = Some(album.into());
        self
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn metadata(&self) -> &ItemMetadata {
        &self.metadata
    }

    /// Static now-playing metadata for this item.
    pub fn static_metadata(&self) -> StaticMetadata {
        StaticMetadata {
            locator: self.locator.clone(),
            media_type: self.metadata.media_type,
            title: self.metadata.title.clone(),
            artist: self.metadata.artist.clone(),
            artwork: self.metadata.artwork.clone(),
            album_artist: self.metadata.album_artist.clone(),
            album_title: self.metadata.album_title.clone(),
        }
    }
}

/// One occurrence of an item in the queue.
///
/// The same item can appear under several entries (backward navigation
/// re-queues fresh copies), so the engine-facing identity is the
/// [`EntryId`], not the [`ItemId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    entry_id: EntryId,
    item: Arc<PlayableItem>,
}

impl QueueEntry {
    pub fn new(item: Arc<PlayableItem>) -> Self {
        Self {
            entry_id: EntryId::new(),
            item,
        }
    }

    /// Same item, new entry identity.
    pub fn fresh_copy(&self) -> Self {
        Self::new(Arc::clone(&self.item))
    }

    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    pub fn item(&self) -> &Arc<PlayableItem> {
        &self.item
    }

    pub fn item_id(&self) -> &ItemId {
        self.item.id()
    }

    pub fn to_engine_item(&self) -> EngineItem {
        EngineItem::new(self.entry_id, self.item.locator())
    }
}
