use std::collections::HashSet;

use devtools_api::{Change, Collection, CollectionItem, Environment, Id, Workspace};

use super::streamer::SyncStreamer;

/// Events meant for one user, regardless of workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserTopic {
    pub user_id: Id,
}

/// Events scoped to one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkspaceTopic {
    pub workspace_id: Id,
}

/// Events scoped to one collection's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionItemTopic {
    pub workspace_id: Id,
    pub collection_id: Id,
}

pub type WorkspaceStreamer = SyncStreamer<UserTopic, Change<Workspace>>;
pub type CollectionStreamer = SyncStreamer<WorkspaceTopic, Change<Collection>>;
pub type CollectionItemStreamer = SyncStreamer<CollectionItemTopic, Change<CollectionItem>>;
pub type EnvironmentStreamer = SyncStreamer<WorkspaceTopic, Change<Environment>>;

/// Filter accepting only `user_id`'s topic.
pub fn user_filter(user_id: Id) -> impl Fn(&UserTopic) -> bool + Send + Sync + 'static {
    move |topic| topic.user_id == user_id
}

/// Filter accepting the workspaces the caller belonged to when subscribing.
pub fn workspace_filter(
    workspace_ids: HashSet<Id>,
) -> impl Fn(&WorkspaceTopic) -> bool + Send + Sync + 'static {
    move |topic| workspace_ids.contains(&topic.workspace_id)
}

/// Filter accepting a single collection.
pub fn collection_item_filter(
    collection_id: Id,
) -> impl Fn(&CollectionItemTopic) -> bool + Send + Sync + 'static {
    move |topic| topic.collection_id == collection_id
}
