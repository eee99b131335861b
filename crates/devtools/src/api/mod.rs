//! RPC handler surface.
//!
//! Every handler follows the same shape: decode the raw request ids,
//! authenticate, check workspace membership, write inside one transaction,
//! commit, then publish the change to the sync streams. Lists are plain
//! snapshots and mutations answer with minimal acknowledgements; other
//! clients learn about changes from the `*_sync` streams.
//!
//! - `context`: caller identity and cancellation of one request
//! - `convert`: lower-layer errors to `ApiError`
//! - one module per service

pub mod collection;
pub mod collection_item;
pub mod context;
pub mod convert;
pub mod endpoint;
pub mod environment;
pub mod example;
pub mod folder;
pub mod user;
pub mod workspace;

pub use collection::CollectionService;
pub use collection_item::CollectionItemService;
pub use context::RpcContext;
pub use endpoint::EndpointService;
pub use environment::EnvironmentService;
pub use example::ExampleService;
pub use folder::FolderService;
pub use user::UserService;
pub use workspace::WorkspaceService;

use std::fmt::Debug;
use std::future::Future;

use devtools_api::{ApiError, Batch, CollectionItem, Id, ItemKind};
use sqlx::SqliteConnection;

use crate::collection_items::{Scope, store};
use crate::permission::{self, PermissionError};
use crate::storage::Database;
use crate::sync::{
    BatchOptions, Event, ResponseSink, SubscribeOptions, SyncError, SyncStreamer, SyncStreams,
    stream_to_client,
};

/// Shared by every service: the process-wide pool and streamers.
#[derive(Debug, Clone)]
pub struct ServiceState {
    pub db: Database,
    pub streams: SyncStreams,
}

impl ServiceState {
    pub fn new(db: Database, streams: SyncStreams) -> Self {
        Self { db, streams }
    }
}

/// Scope named by a collection and an optional parent, where the parent may
/// be a collection item id or a legacy folder id.
pub(crate) async fn resolve_scope(
    conn: &mut SqliteConnection,
    collection_id: Id,
    parent: Option<Id>,
) -> Result<Scope, ApiError> {
    let Some(parent) = parent else {
        return Ok(Scope::root(collection_id));
    };
    let item = store::resolve(conn, parent).await.map_err(|err| {
        if err.is_not_found() {
            ApiError::not_found("parent folder not found")
        } else {
            err.into()
        }
    })?;
    if !item.is_folder() {
        return Err(ApiError::invalid_argument(format!(
            "parent {} is not a folder",
            item.id
        )));
    }
    if item.collection_id != collection_id {
        return Err(ApiError::invalid_argument(format!(
            "parent folder {} is not in collection {}",
            item.id, collection_id
        )));
    }
    Ok(Scope::folder(collection_id, item.id))
}

/// Visible item of `kind`, looked up by item id or legacy id, with its
/// workspace. Anything else is reported as a missing `entity`.
pub(crate) async fn check_item_of_kind(
    conn: &mut SqliteConnection,
    user_id: Id,
    id: Id,
    kind: ItemKind,
    entity: &str,
) -> Result<(CollectionItem, Id), ApiError> {
    match permission::check_collection_item(conn, user_id, id).await {
        Ok((item, workspace_id)) if item.kind == kind => Ok((item, workspace_id)),
        Ok(_) | Err(PermissionError::NotFound(_)) => {
            Err(ApiError::not_found(format!("{entity} not found")))
        }
        Err(err) => Err(err.into()),
    }
}

/// Serve one sync stream until the request is cancelled, the streamer shuts
/// down, or the client stops reading.
pub(crate) async fn serve_stream<T, P, F, Fut, S>(
    ctx: &RpcContext,
    streamer: &SyncStreamer<T, P>,
    filter: F,
    snapshot: Fut,
    options: BatchOptions,
    sink: S,
) -> Result<(), ApiError>
where
    T: Debug + Clone + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Event<T, P>>, ApiError>>,
    S: ResponseSink<Batch<P>>,
{
    let subscription = streamer
        .subscribe_with_snapshot(
            ctx.cancel_token().clone(),
            filter,
            SubscribeOptions::default(),
            snapshot,
        )
        .await?;
    let id = subscription.id();

    match stream_to_client(subscription, |event| Some(event.payload), options, sink).await {
        Ok(stats) => {
            tracing::debug!(
                "[Rpc] {} stream {} closed after {} items",
                streamer.name(),
                id,
                stats.items
            );
            Ok(())
        }
        Err(SyncError::SinkClosed) => {
            tracing::debug!("[Rpc] {} stream {}: client disconnected", streamer.name(), id);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
