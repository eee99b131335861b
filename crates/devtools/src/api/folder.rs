use devtools_api::messages::{
    Ack, FolderCreateRequest, FolderCreateResponse, FolderDeleteRequest, FolderUpdateRequest,
};
use devtools_api::{ApiError, Change, CollectionItem, Id, ItemKind, parse_id, parse_optional_id};

use super::workspace::required_name;
use super::{RpcContext, ServiceState, check_item_of_kind, resolve_scope};
use crate::collection_items::{create, store};
use crate::permission;
use crate::storage::folders;
use crate::sync::CollectionItemTopic;

/// Folders of the collection tree. Ids may be item ids or legacy folder ids.
#[derive(Debug, Clone)]
pub struct FolderService {
    state: ServiceState,
}

impl FolderService {
    pub fn new(state: ServiceState) -> Self {
        Self { state }
    }

    fn publish(&self, workspace_id: Id, collection_id: Id, change: Change<CollectionItem>) {
        self.state.streams.collection_item.publish(
            CollectionItemTopic {
                workspace_id,
                collection_id,
            },
            change,
        );
    }

    /// New folders land at the tail of their scope.
    pub async fn folder_create(
        &self,
        ctx: &RpcContext,
        request: FolderCreateRequest,
    ) -> Result<FolderCreateResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let collection_id = parse_id("collection_id", &request.collection_id)?;
        let parent = parse_optional_id("parent_folder_id", request.parent_folder_id.as_deref())?;
        let name = required_name(&request.name)?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            let workspace_id = permission::check_collection(conn, user_id, collection_id).await?;
            let scope = resolve_scope(conn, collection_id, parent).await?;
            let (folder, item) = create::create_folder(conn, scope, &name).await?;
            tx.commit().await?;

            tracing::debug!("[FolderService] Created folder {} at {}", folder.id, scope);
            let response = FolderCreateResponse {
                folder_id: folder.id,
                collection_item_id: item.id,
            };
            self.publish(workspace_id, collection_id, Change::Insert { data: item });
            Ok(response)
        })
        .await
    }

    pub async fn folder_update(
        &self,
        ctx: &RpcContext,
        request: FolderUpdateRequest,
    ) -> Result<Ack, ApiError> {
        let user_id = ctx.user_id()?;
        let id = parse_id("folder_id", &request.folder_id)?;
        let name = request.name.as_deref().map(required_name).transpose()?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            let (item, workspace_id) =
                check_item_of_kind(conn, user_id, id, ItemKind::Folder, "folder").await?;
            let Some(name) = name else {
                return Ok(Ack {});
            };
            let folder_id = item
                .folder_id
                .ok_or_else(|| ApiError::internal("folder item without folder row"))?;
            let mut folder = folders::get(conn, folder_id).await?;
            folder.name = name;
            folders::update(conn, &folder).await?;
            let item = store::rename_by_legacy_id(conn, folder_id, &folder.name).await?;
            tx.commit().await?;

            let collection_id = item.collection_id;
            self.publish(workspace_id, collection_id, Change::Update { data: item });
            Ok(Ack {})
        })
        .await
    }

    /// Removes the folder with every descendant. Subscribers only see the
    /// folder's own delete.
    pub async fn folder_delete(
        &self,
        ctx: &RpcContext,
        request: FolderDeleteRequest,
    ) -> Result<Ack, ApiError> {
        let user_id = ctx.user_id()?;
        let id = parse_id("folder_id", &request.folder_id)?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            let (item, workspace_id) =
                check_item_of_kind(conn, user_id, id, ItemKind::Folder, "folder").await?;
            let removed = store::delete(conn, item.id).await?;
            tx.commit().await?;

            tracing::info!(
                "[FolderService] Deleted folder {} with {} descendants",
                item.id,
                removed.len().saturating_sub(1)
            );
            self.publish(workspace_id, item.collection_id, Change::Delete { id: item.id });
            Ok(Ack {})
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::state;
    use crate::testing::{Fixture, assert_invariants};
    use devtools_api::Code;

    fn bytes(id: Id) -> Vec<u8> {
        id.as_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_create_appends_to_parent_scope() {
        let fx = Fixture::new().await;
        let service = FolderService::new(state(&fx.db));
        let ctx = RpcContext::authenticated(fx.user_id);
        let parent = fx.add_folder(None, "parent").await;
        let existing = fx.add_endpoint(Some(parent.item_id), "existing").await;

        let created = service
            .folder_create(
                &ctx,
                FolderCreateRequest {
                    collection_id: bytes(fx.collection_id),
                    parent_folder_id: Some(bytes(parent.folder_id)),
                    name: "child".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            fx.list(fx.collection_id, Some(parent.item_id)).await,
            vec![existing.item_id, created.collection_item_id]
        );
        let mut conn = fx.db.acquire().await.unwrap();
        let folder = folders::get(&mut conn, created.folder_id).await.unwrap();
        assert_eq!(folder.parent_id, Some(parent.folder_id));
        drop(conn);
        assert_invariants(&fx.db).await;
    }

    #[tokio::test]
    async fn test_rename_keeps_item_name_in_step() {
        let fx = Fixture::new().await;
        let service = FolderService::new(state(&fx.db));
        let ctx = RpcContext::authenticated(fx.user_id);
        let folder = fx.add_folder(None, "old").await;

        service
            .folder_update(
                &ctx,
                FolderUpdateRequest {
                    folder_id: bytes(folder.folder_id),
                    name: Some("new".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(fx.item(folder.item_id).await.name, "new");
    }

    #[tokio::test]
    async fn test_delete_takes_descendants_and_heals_scope() {
        let fx = Fixture::new().await;
        let service = FolderService::new(state(&fx.db));
        let ctx = RpcContext::authenticated(fx.user_id);
        let a = fx.add_endpoint(None, "a").await;
        let doomed = fx.add_folder(None, "doomed").await;
        let nested = fx.add_folder(Some(doomed.item_id), "nested").await;
        fx.add_endpoint(Some(nested.item_id), "deep").await;
        let c = fx.add_endpoint(None, "c").await;

        service
            .folder_delete(
                &ctx,
                FolderDeleteRequest {
                    folder_id: bytes(doomed.item_id),
                },
            )
            .await
            .unwrap();

        assert_eq!(fx.list(fx.collection_id, None).await, vec![a.item_id, c.item_id]);
        assert_invariants(&fx.db).await;
    }

    #[tokio::test]
    async fn test_endpoint_id_is_not_a_folder() {
        let fx = Fixture::new().await;
        let service = FolderService::new(state(&fx.db));
        let ctx = RpcContext::authenticated(fx.user_id);
        let endpoint = fx.add_endpoint(None, "a").await;

        let err = service
            .folder_delete(
                &ctx,
                FolderDeleteRequest {
                    folder_id: bytes(endpoint.endpoint_id),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::NotFound);
        assert_eq!(fx.list(fx.collection_id, None).await, vec![endpoint.item_id]);
    }
}
