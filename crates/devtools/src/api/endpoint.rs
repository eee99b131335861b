use devtools_api::messages::{
    Ack, EndpointCreateRequest, EndpointCreateResponse, EndpointDeleteRequest,
    EndpointDuplicateRequest, EndpointDuplicateResponse, EndpointGetRequest, EndpointGetResponse,
    EndpointUpdateRequest,
};
use devtools_api::{ApiError, Change, CollectionItem, Id, ItemKind, parse_id, parse_optional_id};

use super::workspace::required_name;
use super::{RpcContext, ServiceState, check_item_of_kind, resolve_scope};
use crate::collection_items::{NewEndpoint, create, store};
use crate::permission;
use crate::storage::{endpoints, examples};
use crate::sync::CollectionItemTopic;

const DEFAULT_METHOD: &str = "GET";

#[derive(Debug, Clone)]
pub struct EndpointService {
    state: ServiceState,
}

impl EndpointService {
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

    pub async fn endpoint_get(
        &self,
        ctx: &RpcContext,
        request: EndpointGetRequest,
    ) -> Result<EndpointGetResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let endpoint_id = parse_id("endpoint_id", &request.endpoint_id)?;

        ctx.run(async {
            let mut conn = self.state.db.acquire().await?;
            permission::check_endpoint(&mut conn, user_id, endpoint_id).await?;
            let endpoint = endpoints::get(&mut conn, endpoint_id).await?;
            let default_example = examples::get_default(&mut conn, endpoint_id).await?;
            Ok(EndpointGetResponse {
                endpoint,
                default_example_id: default_example.id,
            })
        })
        .await
    }

    /// Creates the endpoint, its default example and its item at the tail of
    /// the scope.
    pub async fn endpoint_create(
        &self,
        ctx: &RpcContext,
        request: EndpointCreateRequest,
    ) -> Result<EndpointCreateResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let collection_id = parse_id("collection_id", &request.collection_id)?;
        let parent = parse_optional_id("parent_folder_id", request.parent_folder_id.as_deref())?;
        let name = required_name(&request.name)?;
        let method = match request.method.trim() {
            "" => DEFAULT_METHOD.to_string(),
            method => method.to_ascii_uppercase(),
        };

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            let workspace_id = permission::check_collection(conn, user_id, collection_id).await?;
            let scope = resolve_scope(conn, collection_id, parent).await?;
            let created = create::create_endpoint(
                conn,
                scope,
                NewEndpoint {
                    name: &name,
                    method: &method,
                    url: &request.url,
                },
            )
            .await?;
            tx.commit().await?;

            tracing::debug!(
                "[EndpointService] Created endpoint {} at {}",
                created.endpoint.id,
                scope
            );
            let response = EndpointCreateResponse {
                endpoint_id: created.endpoint.id,
                collection_item_id: created.item.id,
                default_example_id: created.default_example.id,
            };
            self.publish(workspace_id, collection_id, Change::Insert { data: created.item });
            Ok(response)
        })
        .await
    }

    /// Partial update. The item is republished even when only the method or
    /// url changed, so clients can refresh the row.
    pub async fn endpoint_update(
        &self,
        ctx: &RpcContext,
        request: EndpointUpdateRequest,
    ) -> Result<Ack, ApiError> {
        let user_id = ctx.user_id()?;
        let id = parse_id("endpoint_id", &request.endpoint_id)?;
        let name = request.name.as_deref().map(required_name).transpose()?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            let (item, workspace_id) =
                check_item_of_kind(conn, user_id, id, ItemKind::Endpoint, "endpoint").await?;
            let endpoint_id = item
                .endpoint_id
                .ok_or_else(|| ApiError::internal("endpoint item without endpoint row"))?;

            let mut endpoint = endpoints::get(conn, endpoint_id).await?;
            if let Some(method) = &request.method {
                endpoint.method = method.trim().to_ascii_uppercase();
            }
            if let Some(url) = &request.url {
                endpoint.url = url.clone();
            }
            let renamed = name.is_some();
            if let Some(name) = name {
                endpoint.name = name;
            }
            endpoints::update(conn, &endpoint).await?;
            let item = if renamed {
                store::rename_by_legacy_id(conn, endpoint_id, &endpoint.name).await?
            } else {
                item
            };
            tx.commit().await?;

            let collection_id = item.collection_id;
            self.publish(workspace_id, collection_id, Change::Update { data: item });
            Ok(Ack {})
        })
        .await
    }

    pub async fn endpoint_delete(
        &self,
        ctx: &RpcContext,
        request: EndpointDeleteRequest,
    ) -> Result<Ack, ApiError> {
        let user_id = ctx.user_id()?;
        let id = parse_id("endpoint_id", &request.endpoint_id)?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            let (item, workspace_id) =
                check_item_of_kind(conn, user_id, id, ItemKind::Endpoint, "endpoint").await?;
            store::delete(conn, item.id).await?;
            tx.commit().await?;

            tracing::info!("[EndpointService] Deleted endpoint item {}", item.id);
            self.publish(workspace_id, item.collection_id, Change::Delete { id: item.id });
            Ok(Ack {})
        })
        .await
    }

    /// Copy with all examples, placed directly after the original.
    pub async fn endpoint_duplicate(
        &self,
        ctx: &RpcContext,
        request: EndpointDuplicateRequest,
    ) -> Result<EndpointDuplicateResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let id = parse_id("endpoint_id", &request.endpoint_id)?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            let (item, workspace_id) =
                check_item_of_kind(conn, user_id, id, ItemKind::Endpoint, "endpoint").await?;
            let endpoint_id = item
                .endpoint_id
                .ok_or_else(|| ApiError::internal("endpoint item without endpoint row"))?;
            let created = create::duplicate_endpoint(conn, endpoint_id).await?;
            tx.commit().await?;

            let response = EndpointDuplicateResponse {
                endpoint_id: created.endpoint.id,
                collection_item_id: created.item.id,
            };
            self.publish(
                workspace_id,
                item.collection_id,
                Change::Insert { data: created.item },
            );
            Ok(response)
        })
        .await
    }
}
