use serde::{Deserialize, Serialize};

use crate::entity::{Collection, CollectionItem, Environment, Workspace};
use crate::id::Id;

/// Kind of a sync event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Insert,
    Update,
    Delete,
}

/// Change notification event.
///
/// Insert and update carry the full post-state of the entity, delete carries
/// only its id. Payloads are whole-state, so a client that receives the same
/// change twice (snapshot plus live event) ends up in the same state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Change<T> {
    /// Entity was created
    Insert { data: T },
    /// Entity was modified
    Update { data: T },
    /// Entity was removed
    Delete { id: Id },
}

impl<T> Change<T> {
    pub fn event_type(&self) -> EventType {
        match self {
            Change::Insert { .. } => EventType::Insert,
            Change::Update { .. } => EventType::Update,
            Change::Delete { .. } => EventType::Delete,
        }
    }

    /// Post-state of the entity, `None` for deletes.
    pub fn data(&self) -> Option<&T> {
        match self {
            Change::Insert { data } | Change::Update { data } => Some(data),
            Change::Delete { .. } => None,
        }
    }
}

/// Batch of changes for efficient transmission
///
/// One batch becomes one frame of a server-streaming response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch<T> {
    pub items: Vec<T>,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> From<Vec<T>> for Batch<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

/// Frame of the workspace sync stream
pub type WorkspaceSyncResponse = Batch<Change<Workspace>>;

/// Frame of the collection sync stream
pub type CollectionSyncResponse = Batch<Change<Collection>>;

/// Frame of the collection item sync stream
pub type CollectionItemSyncResponse = Batch<Change<CollectionItem>>;

/// Frame of the environment sync stream
pub type EnvironmentSyncResponse = Batch<Change<Environment>>;
