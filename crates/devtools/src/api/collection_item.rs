//! Ordered listing, moves and the per-collection tree stream.

use devtools_api::messages::{
    CollectionItemListRequest, CollectionItemListResponse, CollectionItemMoveRequest,
    CollectionItemMoveResponse, CollectionItemSyncRequest,
};
use devtools_api::{
    ApiError, Change, CollectionItemSyncResponse, parse_id, parse_optional_id,
};

use super::{RpcContext, ServiceState, resolve_scope, serve_stream};
use crate::collection_items::CollectionItemStore;
use crate::moves::{MoveEngine, MoveOutcome, MoveRequest};
use crate::permission;
use crate::sync::{CollectionItemTopic, Event, ResponseSink, topics};

#[derive(Debug, Clone)]
pub struct CollectionItemService {
    state: ServiceState,
    items: CollectionItemStore,
    engine: MoveEngine,
}

impl CollectionItemService {
    pub fn new(state: ServiceState) -> Self {
        let items = CollectionItemStore::new(state.db.pool().clone());
        let engine = MoveEngine::new(state.db.clone());
        Self {
            state,
            items,
            engine,
        }
    }

    /// Children of one scope in linked-list order.
    pub async fn collection_item_list(
        &self,
        ctx: &RpcContext,
        request: CollectionItemListRequest,
    ) -> Result<CollectionItemListResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let collection_id = parse_id("collection_id", &request.collection_id)?;
        let parent = parse_optional_id("parent_folder_id", request.parent_folder_id.as_deref())?;

        ctx.run(async {
            let scope = {
                let mut conn = self.state.db.acquire().await?;
                permission::check_collection(&mut conn, user_id, collection_id).await?;
                resolve_scope(&mut conn, collection_id, parent).await?
            };
            let items = self.items.list_in_order(scope).await?;
            Ok(CollectionItemListResponse { items })
        })
        .await
    }

    /// Reposition an item inside its scope, into another folder, or into
    /// another collection of the same workspace.
    pub async fn collection_item_move(
        &self,
        ctx: &RpcContext,
        request: CollectionItemMoveRequest,
    ) -> Result<CollectionItemMoveResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let decoded = decode_move(request)?;

        let outcome = ctx.run(async { Ok(self.engine.execute(user_id, &decoded).await?) }).await?;
        self.publish_move(&outcome);
        Ok(CollectionItemMoveResponse {})
    }

    fn publish_move(&self, outcome: &MoveOutcome) {
        let streamer = &self.state.streams.collection_item;
        let from = CollectionItemTopic {
            workspace_id: outcome.workspace_id,
            collection_id: outcome.from.collection_id,
        };
        if outcome.crossed_collections() {
            let to = CollectionItemTopic {
                workspace_id: outcome.workspace_id,
                collection_id: outcome.item.collection_id,
            };
            streamer.publish(from, Change::Delete { id: outcome.item.id });
            streamer.publish(
                to,
                Change::Insert {
                    data: outcome.item.clone(),
                },
            );
        } else {
            streamer.publish(
                from,
                Change::Update {
                    data: outcome.item.clone(),
                },
            );
        }
    }

    /// Tree of one collection, snapshot first, then every change to it.
    pub async fn collection_item_sync<S>(
        &self,
        ctx: &RpcContext,
        request: CollectionItemSyncRequest,
        sink: S,
    ) -> Result<(), ApiError>
    where
        S: ResponseSink<CollectionItemSyncResponse>,
    {
        let user_id = ctx.user_id()?;
        let collection_id = parse_id("collection_id", &request.collection_id)?;
        let workspace_id = {
            let mut conn = self.state.db.acquire().await?;
            permission::check_collection(&mut conn, user_id, collection_id).await?
        };

        let items = self.items.clone();
        let snapshot = async move {
            let topic = CollectionItemTopic {
                workspace_id,
                collection_id,
            };
            let events = items
                .list_tree(collection_id)
                .await?
                .into_iter()
                .map(|data| Event::new(topic, Change::Insert { data }))
                .collect();
            Ok::<_, ApiError>(events)
        };
        serve_stream(
            ctx,
            &self.state.streams.collection_item,
            topics::collection_item_filter(collection_id),
            snapshot,
            self.state.streams.batch_options(),
            sink,
        )
        .await
    }
}

fn decode_move(request: CollectionItemMoveRequest) -> Result<MoveRequest, ApiError> {
    Ok(MoveRequest {
        item_id: parse_id("item_id", &request.item_id)?,
        collection_id: parse_id("collection_id", &request.collection_id)?,
        target_collection_id: parse_optional_id(
            "target_collection_id",
            request.target_collection_id.as_deref(),
        )?,
        target_parent_folder_id: parse_optional_id(
            "target_parent_folder_id",
            request.target_parent_folder_id.as_deref(),
        )?,
        target_item_id: parse_optional_id("target_item_id", request.target_item_id.as_deref())?,
        position: request.position,
        kind: request.kind,
        target_kind: request.target_kind,
    })
}
