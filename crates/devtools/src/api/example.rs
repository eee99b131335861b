use devtools_api::messages::{
    Ack, ExampleCreateRequest, ExampleCreateResponse, ExampleDeleteRequest, ExampleListRequest,
    ExampleListResponse, ExampleUpdateRequest, ResponseListRequest, ResponseListResponse,
};
use devtools_api::{ApiError, Example, Id, parse_id};

use super::workspace::required_name;
use super::{RpcContext, ServiceState};
use crate::permission;
use crate::storage::{endpoints, examples, responses};

/// Examples of an endpoint and their recorded responses. Examples are not
/// part of the ordered tree and publish no events.
#[derive(Debug, Clone)]
pub struct ExampleService {
    state: ServiceState,
}

impl ExampleService {
    pub fn new(state: ServiceState) -> Self {
        Self { state }
    }

    pub async fn example_list(
        &self,
        ctx: &RpcContext,
        request: ExampleListRequest,
    ) -> Result<ExampleListResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let endpoint_id = parse_id("endpoint_id", &request.endpoint_id)?;

        ctx.run(async {
            let mut conn = self.state.db.acquire().await?;
            permission::check_endpoint(&mut conn, user_id, endpoint_id).await?;
            let items = examples::list(&mut conn, endpoint_id).await?;
            Ok(ExampleListResponse { items })
        })
        .await
    }

    pub async fn example_create(
        &self,
        ctx: &RpcContext,
        request: ExampleCreateRequest,
    ) -> Result<ExampleCreateResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let endpoint_id = parse_id("endpoint_id", &request.endpoint_id)?;
        let name = required_name(&request.name)?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            permission::check_endpoint(conn, user_id, endpoint_id).await?;
            let endpoint = endpoints::get(conn, endpoint_id).await?;
            let example = Example {
                id: Id::new_now(),
                endpoint_id,
                collection_id: endpoint.collection_id,
                is_default: false,
                name,
                body: request.body.clone(),
            };
            examples::create(conn, &example).await?;
            tx.commit().await?;

            Ok(ExampleCreateResponse {
                example_id: example.id,
            })
        })
        .await
    }

    pub async fn example_update(
        &self,
        ctx: &RpcContext,
        request: ExampleUpdateRequest,
    ) -> Result<Ack, ApiError> {
        let user_id = ctx.user_id()?;
        let example_id = parse_id("example_id", &request.example_id)?;
        let name = request.name.as_deref().map(required_name).transpose()?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            permission::check_example(conn, user_id, example_id).await?;
            let mut example = examples::get(conn, example_id).await?;
            if let Some(name) = name {
                example.name = name;
            }
            if let Some(body) = &request.body {
                example.body = Some(body.clone());
            }
            examples::update(conn, &example).await?;
            tx.commit().await?;
            Ok(Ack {})
        })
        .await
    }

    /// The default example lives as long as its endpoint.
    pub async fn example_delete(
        &self,
        ctx: &RpcContext,
        request: ExampleDeleteRequest,
    ) -> Result<Ack, ApiError> {
        let user_id = ctx.user_id()?;
        let example_id = parse_id("example_id", &request.example_id)?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            permission::check_example(conn, user_id, example_id).await?;
            let example = examples::get(conn, example_id).await?;
            if example.is_default {
                return Err(ApiError::invalid_argument(
                    "the default example cannot be deleted",
                ));
            }
            examples::delete(conn, example_id).await?;
            tx.commit().await?;
            Ok(Ack {})
        })
        .await
    }

    pub async fn response_list(
        &self,
        ctx: &RpcContext,
        request: ResponseListRequest,
    ) -> Result<ResponseListResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let example_id = parse_id("example_id", &request.example_id)?;

        ctx.run(async {
            let mut conn = self.state.db.acquire().await?;
            permission::check_example(&mut conn, user_id, example_id).await?;
            let items = responses::list(&mut conn, example_id).await?;
            Ok(ResponseListResponse { items })
        })
        .await
    }
}
