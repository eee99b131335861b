use devtools_api::messages::{
    Ack, CollectionCreateRequest, CollectionCreateResponse, CollectionDeleteRequest,
    CollectionListRequest, CollectionListResponse, CollectionSyncRequest, CollectionUpdateRequest,
};
use devtools_api::{ApiError, Change, Collection, CollectionSyncResponse, Id, Workspace, parse_id};

use super::workspace::{member_ids, required_name, visible_workspaces};
use super::{RpcContext, ServiceState, serve_stream};
use crate::permission;
use crate::storage::{collections, now_millis, workspaces};
use crate::sync::{Event, ResponseSink, UserTopic, WorkspaceTopic, topics};

#[derive(Debug, Clone)]
pub struct CollectionService {
    state: ServiceState,
}

impl CollectionService {
    pub fn new(state: ServiceState) -> Self {
        Self { state }
    }

    fn publish(&self, workspace_id: Id, change: Change<Collection>) {
        self.state
            .streams
            .collection
            .publish(WorkspaceTopic { workspace_id }, change);
    }

    /// The collection count changed; members see the workspace update.
    fn publish_workspace(&self, members: &[Id], workspace: Workspace) {
        for user_id in members {
            self.state.streams.workspace.publish(
                UserTopic { user_id: *user_id },
                Change::Update {
                    data: workspace.clone(),
                },
            );
        }
    }

    pub async fn collection_list(
        &self,
        ctx: &RpcContext,
        request: CollectionListRequest,
    ) -> Result<CollectionListResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let workspace_id = parse_id("workspace_id", &request.workspace_id)?;

        ctx.run(async {
            let mut conn = self.state.db.acquire().await?;
            permission::check_workspace(&mut conn, user_id, workspace_id).await?;
            let items = collections::list(&mut conn, workspace_id).await?;
            Ok(CollectionListResponse { items })
        })
        .await
    }

    pub async fn collection_create(
        &self,
        ctx: &RpcContext,
        request: CollectionCreateRequest,
    ) -> Result<CollectionCreateResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let workspace_id = parse_id("workspace_id", &request.workspace_id)?;
        let name = required_name(&request.name)?;

        ctx.run(async {
            let collection = Collection {
                id: Id::new_now(),
                workspace_id,
                name,
                updated_at: now_millis(),
            };

            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            permission::check_workspace(conn, user_id, workspace_id).await?;
            collections::create(conn, &collection).await?;
            workspaces::increment_collection_count(conn, workspace_id).await?;
            let workspace = workspaces::get(conn, workspace_id).await?;
            let members = member_ids(conn, workspace_id).await?;
            tx.commit().await?;

            tracing::info!(
                "[CollectionService] Created collection {} in workspace {}",
                collection.id,
                workspace_id
            );
            let collection_id = collection.id;
            self.publish(workspace_id, Change::Insert { data: collection });
            self.publish_workspace(&members, workspace);
            Ok(CollectionCreateResponse { collection_id })
        })
        .await
    }

    pub async fn collection_update(
        &self,
        ctx: &RpcContext,
        request: CollectionUpdateRequest,
    ) -> Result<Ack, ApiError> {
        let user_id = ctx.user_id()?;
        let collection_id = parse_id("collection_id", &request.collection_id)?;
        let name = request.name.as_deref().map(required_name).transpose()?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            let workspace_id = permission::check_collection(conn, user_id, collection_id).await?;
            let mut collection = collections::get(conn, collection_id).await?;
            if let Some(name) = name {
                collection.name = name;
            }
            collection.updated_at = now_millis();
            collections::update(conn, &collection).await?;
            tx.commit().await?;

            self.publish(workspace_id, Change::Update { data: collection });
            Ok(Ack {})
        })
        .await
    }

    /// Removes the whole tree of the collection with it.
    pub async fn collection_delete(
        &self,
        ctx: &RpcContext,
        request: CollectionDeleteRequest,
    ) -> Result<Ack, ApiError> {
        let user_id = ctx.user_id()?;
        let collection_id = parse_id("collection_id", &request.collection_id)?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            let workspace_id = permission::check_collection(conn, user_id, collection_id).await?;
            collections::delete(conn, collection_id).await?;
            workspaces::decrement_collection_count(conn, workspace_id).await?;
            let workspace = workspaces::get(conn, workspace_id).await?;
            let members = member_ids(conn, workspace_id).await?;
            tx.commit().await?;

            tracing::info!("[CollectionService] Deleted collection {}", collection_id);
            self.publish(workspace_id, Change::Delete { id: collection_id });
            self.publish_workspace(&members, workspace);
            Ok(Ack {})
        })
        .await
    }

    /// Collections of every workspace the caller belongs to at subscribe time.
    pub async fn collection_sync<S>(
        &self,
        ctx: &RpcContext,
        _request: CollectionSyncRequest,
        sink: S,
    ) -> Result<(), ApiError>
    where
        S: ResponseSink<CollectionSyncResponse>,
    {
        let user_id = ctx.user_id()?;
        let workspace_ids = visible_workspaces(&self.state, user_id).await?;

        let db = self.state.db.clone();
        let ids = workspace_ids.clone();
        let snapshot = async move {
            let mut conn = db.acquire().await?;
            let mut events = Vec::new();
            for workspace_id in ids {
                let topic = WorkspaceTopic { workspace_id };
                for data in collections::list(&mut conn, workspace_id).await? {
                    events.push(Event::new(topic, Change::Insert { data }));
                }
            }
            Ok::<_, ApiError>(events)
        };
        serve_stream(
            ctx,
            &self.state.streams.collection,
            topics::workspace_filter(workspace_ids),
            snapshot,
            self.state.streams.batch_options(),
            sink,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{next_frame, state};
    use crate::testing::{Fixture, assert_invariants};
    use devtools_api::Code;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_create_and_delete_track_collection_count() {
        let fx = Fixture::new().await;
        let service = CollectionService::new(state(&fx.db));
        let ctx = RpcContext::authenticated(fx.user_id);
        let ws = fx.workspace_id.as_bytes().to_vec();

        let created = service
            .collection_create(
                &ctx,
                CollectionCreateRequest {
                    workspace_id: ws.clone(),
                    name: "Payments".into(),
                },
            )
            .await
            .unwrap();
        fx.add_endpoint_in(created.collection_id, None, "charge").await;

        let before = {
            let mut conn = fx.db.acquire().await.unwrap();
            workspaces::get(&mut conn, fx.workspace_id).await.unwrap().collection_count
        };

        service
            .collection_delete(
                &ctx,
                CollectionDeleteRequest {
                    collection_id: created.collection_id.as_bytes().to_vec(),
                },
            )
            .await
            .unwrap();

        let mut conn = fx.db.acquire().await.unwrap();
        let after = workspaces::get(&mut conn, fx.workspace_id).await.unwrap().collection_count;
        assert_eq!(after, before - 1);
        let listed = collections::list(&mut conn, fx.workspace_id).await.unwrap();
        assert!(listed.iter().all(|c| c.id != created.collection_id));
        drop(conn);
        assert_invariants(&fx.db).await;
    }

    #[tokio::test]
    async fn test_outsider_cannot_see_collections() {
        let fx = Fixture::new().await;
        let service = CollectionService::new(state(&fx.db));
        let outsider = RpcContext::authenticated(fx.add_user("eve@example.com").await);

        let err = service
            .collection_list(
                &outsider,
                CollectionListRequest {
                    workspace_id: fx.workspace_id.as_bytes().to_vec(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::NotFound);

        let err = service
            .collection_update(
                &outsider,
                CollectionUpdateRequest {
                    collection_id: fx.collection_id.as_bytes().to_vec(),
                    name: Some("mine".into()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::NotFound);

        let err = service
            .collection_create(
                &outsider,
                CollectionCreateRequest {
                    workspace_id: vec![1, 2, 3],
                    name: "x".into(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_sync_only_carries_visible_workspaces() {
        let fx = Fixture::new().await;
        let service = CollectionService::new(state(&fx.db));
        let ctx = RpcContext::authenticated(fx.user_id);

        let stranger = fx.add_user("stranger@example.com").await;
        let foreign_ws = fx.add_workspace(stranger, "Elsewhere").await;

        let (tx, mut rx) = mpsc::channel(8);
        let stream = {
            let service = service.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                service
                    .collection_sync(&ctx, CollectionSyncRequest {}, tx)
                    .await
            })
        };

        let snapshot = next_frame(&mut rx).await;
        assert_eq!(snapshot.items.len(), 1);

        // invisible to the subscriber
        service
            .collection_create(
                &RpcContext::authenticated(stranger),
                CollectionCreateRequest {
                    workspace_id: foreign_ws.as_bytes().to_vec(),
                    name: "Hidden".into(),
                },
            )
            .await
            .unwrap();
        service
            .collection_update(
                &ctx,
                CollectionUpdateRequest {
                    collection_id: fx.collection_id.as_bytes().to_vec(),
                    name: Some("Visible".into()),
                },
            )
            .await
            .unwrap();

        let live = next_frame(&mut rx).await;
        assert_eq!(live.items.len(), 1);
        assert!(matches!(
            &live.items[0],
            Change::Update { data } if data.name == "Visible"
        ));

        ctx.cancel_token().cancel();
        assert!(stream.await.unwrap().is_ok());
    }
}
