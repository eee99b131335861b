use devtools_api::messages::{
    Ack, EnvironmentCreateRequest, EnvironmentCreateResponse, EnvironmentDeleteRequest,
    EnvironmentListRequest, EnvironmentListResponse, EnvironmentSyncRequest,
    EnvironmentUpdateRequest,
};
use devtools_api::{ApiError, Change, Environment, EnvironmentSyncResponse, Id, parse_id};

use super::workspace::{required_name, visible_workspaces};
use super::{RpcContext, ServiceState, serve_stream};
use crate::permission;
use crate::storage::{environments, now_millis};
use crate::sync::{Event, ResponseSink, WorkspaceTopic, topics};

#[derive(Debug, Clone)]
pub struct EnvironmentService {
    state: ServiceState,
}

impl EnvironmentService {
    pub fn new(state: ServiceState) -> Self {
        Self { state }
    }

    fn publish(&self, workspace_id: Id, change: Change<Environment>) {
        self.state
            .streams
            .environment
            .publish(WorkspaceTopic { workspace_id }, change);
    }

    pub async fn environment_list(
        &self,
        ctx: &RpcContext,
        request: EnvironmentListRequest,
    ) -> Result<EnvironmentListResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let workspace_id = parse_id("workspace_id", &request.workspace_id)?;

        ctx.run(async {
            let mut conn = self.state.db.acquire().await?;
            permission::check_workspace(&mut conn, user_id, workspace_id).await?;
            let items = environments::list(&mut conn, workspace_id).await?;
            Ok(EnvironmentListResponse { items })
        })
        .await
    }

    pub async fn environment_create(
        &self,
        ctx: &RpcContext,
        request: EnvironmentCreateRequest,
    ) -> Result<EnvironmentCreateResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let workspace_id = parse_id("workspace_id", &request.workspace_id)?;
        let name = required_name(&request.name)?;

        ctx.run(async {
            let environment = Environment {
                id: Id::new_now(),
                workspace_id,
                name,
                description: request.description.clone(),
                is_global: false,
                updated_at: now_millis(),
            };
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            permission::check_workspace(conn, user_id, workspace_id).await?;
            environments::create(conn, &environment).await?;
            tx.commit().await?;

            let environment_id = environment.id;
            self.publish(workspace_id, Change::Insert { data: environment });
            Ok(EnvironmentCreateResponse { environment_id })
        })
        .await
    }

    pub async fn environment_update(
        &self,
        ctx: &RpcContext,
        request: EnvironmentUpdateRequest,
    ) -> Result<Ack, ApiError> {
        let user_id = ctx.user_id()?;
        let environment_id = parse_id("environment_id", &request.environment_id)?;
        let name = request.name.as_deref().map(required_name).transpose()?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            let workspace_id =
                permission::check_environment(conn, user_id, environment_id).await?;
            let mut environment = environments::get(conn, environment_id).await?;
            if let Some(name) = name {
                environment.name = name;
            }
            if let Some(description) = &request.description {
                environment.description = description.clone();
            }
            environment.updated_at = now_millis();
            environments::update(conn, &environment).await?;
            tx.commit().await?;

            self.publish(workspace_id, Change::Update { data: environment });
            Ok(Ack {})
        })
        .await
    }

    /// The global environment cannot be deleted on its own.
    pub async fn environment_delete(
        &self,
        ctx: &RpcContext,
        request: EnvironmentDeleteRequest,
    ) -> Result<Ack, ApiError> {
        let user_id = ctx.user_id()?;
        let environment_id = parse_id("environment_id", &request.environment_id)?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            let workspace_id =
                permission::check_environment(conn, user_id, environment_id).await?;
            let environment = environments::get(conn, environment_id).await?;
            if environment.is_global {
                return Err(ApiError::invalid_argument(
                    "the global environment cannot be deleted",
                ));
            }
            environments::delete(conn, environment_id).await?;
            tx.commit().await?;

            self.publish(workspace_id, Change::Delete { id: environment_id });
            Ok(Ack {})
        })
        .await
    }

    pub async fn environment_sync<S>(
        &self,
        ctx: &RpcContext,
        _request: EnvironmentSyncRequest,
        sink: S,
    ) -> Result<(), ApiError>
    where
        S: ResponseSink<EnvironmentSyncResponse>,
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
                for data in environments::list(&mut conn, workspace_id).await? {
                    events.push(Event::new(topic, Change::Insert { data }));
                }
            }
            Ok::<_, ApiError>(events)
        };
        serve_stream(
            ctx,
            &self.state.streams.environment,
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
    use crate::testing::Fixture;
    use devtools_api::Code;
    use tokio::sync::mpsc;

    fn bytes(id: Id) -> Vec<u8> {
        id.as_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_global_environment_is_protected() {
        let fx = Fixture::new().await;
        let service = EnvironmentService::new(state(&fx.db));
        let ctx = RpcContext::authenticated(fx.user_id);

        let listed = service
            .environment_list(
                &ctx,
                EnvironmentListRequest {
                    workspace_id: bytes(fx.workspace_id),
                },
            )
            .await
            .unwrap();
        let global = listed.items.iter().find(|e| e.is_global).unwrap();

        let err = service
            .environment_delete(
                &ctx,
                EnvironmentDeleteRequest {
                    environment_id: bytes(global.id),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_sync_streams_create_update_delete() {
        let fx = Fixture::new().await;
        let service = EnvironmentService::new(state(&fx.db));
        let ctx = RpcContext::authenticated(fx.user_id);

        let (tx, mut rx) = mpsc::channel(8);
        let stream = {
            let service = service.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                service
                    .environment_sync(&ctx, EnvironmentSyncRequest {}, tx)
                    .await
            })
        };
        let snapshot = next_frame(&mut rx).await;
        assert_eq!(snapshot.items.len(), 1);

        let created = service
            .environment_create(
                &ctx,
                EnvironmentCreateRequest {
                    workspace_id: bytes(fx.workspace_id),
                    name: "staging".into(),
                    description: String::new(),
                },
            )
            .await
            .unwrap();
        let frame = next_frame(&mut rx).await;
        assert!(matches!(
            &frame.items[0],
            Change::Insert { data } if data.id == created.environment_id
        ));

        service
            .environment_delete(
                &ctx,
                EnvironmentDeleteRequest {
                    environment_id: bytes(created.environment_id),
                },
            )
            .await
            .unwrap();
        let frame = next_frame(&mut rx).await;
        assert_eq!(
            frame.items,
            vec![Change::Delete {
                id: created.environment_id
            }]
        );

        ctx.cancel_token().cancel();
        assert!(stream.await.unwrap().is_ok());
    }
}
