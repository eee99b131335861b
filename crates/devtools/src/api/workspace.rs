use std::collections::HashSet;

use devtools_api::messages::{
    Ack, WorkspaceCreateRequest, WorkspaceCreateResponse, WorkspaceDeleteRequest,
    WorkspaceListRequest, WorkspaceListResponse, WorkspaceMemberCreateRequest,
    WorkspaceMemberCreateResponse, WorkspaceMemberDeleteRequest, WorkspaceMemberListRequest,
    WorkspaceMemberListResponse, WorkspaceSyncRequest, WorkspaceUpdateRequest,
};
use devtools_api::{
    ApiError, Change, Environment, Id, Role, Workspace, WorkspaceMember, WorkspaceSyncResponse,
    parse_id,
};
use sqlx::SqliteConnection;

use super::{RpcContext, ServiceState, serve_stream};
use crate::permission;
use crate::storage::{StorageError, environments, now_millis, users, workspaces};
use crate::sync::{Event, ResponseSink, UserTopic, WorkspaceTopic, topics};

/// Name of the environment every workspace is created with.
pub const GLOBAL_ENVIRONMENT_NAME: &str = "Global";

/// Workspaces and their memberships.
#[derive(Debug, Clone)]
pub struct WorkspaceService {
    state: ServiceState,
}

pub(crate) async fn member_ids(
    conn: &mut SqliteConnection,
    workspace_id: Id,
) -> Result<Vec<Id>, StorageError> {
    Ok(workspaces::list_members(conn, workspace_id)
        .await?
        .into_iter()
        .map(|m| m.user_id)
        .collect())
}

pub(crate) fn required_name(name: &str) -> Result<String, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::invalid_argument("name is required"));
    }
    Ok(trimmed.to_string())
}

impl WorkspaceService {
    pub fn new(state: ServiceState) -> Self {
        Self { state }
    }

    fn publish(&self, users: &[Id], change: Change<Workspace>) {
        for user_id in users {
            self.state
                .streams
                .workspace
                .publish(UserTopic { user_id: *user_id }, change.clone());
        }
    }

    pub async fn workspace_list(
        &self,
        ctx: &RpcContext,
        _request: WorkspaceListRequest,
    ) -> Result<WorkspaceListResponse, ApiError> {
        let user_id = ctx.user_id()?;
        ctx.run(async {
            let mut conn = self.state.db.acquire().await?;
            let items = workspaces::list_by_user(&mut conn, user_id).await?;
            Ok(WorkspaceListResponse { items })
        })
        .await
    }

    /// Create a workspace owned by the caller, with its global environment.
    pub async fn workspace_create(
        &self,
        ctx: &RpcContext,
        request: WorkspaceCreateRequest,
    ) -> Result<WorkspaceCreateResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let name = required_name(&request.name)?;

        ctx.run(async {
            let now = now_millis();
            let workspace = Workspace {
                id: Id::new_now(),
                name,
                updated_at: now,
                collection_count: 0,
                flow_count: 0,
            };
            let environment = Environment {
                id: Id::new_now(),
                workspace_id: workspace.id,
                name: GLOBAL_ENVIRONMENT_NAME.to_string(),
                description: String::new(),
                is_global: true,
                updated_at: now,
            };

            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            users::get(conn, user_id).await?;
            workspaces::create(conn, &workspace).await?;
            workspaces::add_member(
                conn,
                &WorkspaceMember {
                    id: Id::new_now(),
                    workspace_id: workspace.id,
                    user_id,
                    role: Role::Owner,
                },
            )
            .await?;
            environments::create(conn, &environment).await?;
            tx.commit().await?;

            tracing::info!("[WorkspaceService] Created workspace {} for {}", workspace.id, user_id);
            let workspace_id = workspace.id;
            self.publish(&[user_id], Change::Insert { data: workspace });
            self.state.streams.environment.publish(
                WorkspaceTopic { workspace_id },
                Change::Insert { data: environment },
            );
            Ok(WorkspaceCreateResponse { workspace_id })
        })
        .await
    }

    pub async fn workspace_update(
        &self,
        ctx: &RpcContext,
        request: WorkspaceUpdateRequest,
    ) -> Result<Ack, ApiError> {
        let user_id = ctx.user_id()?;
        let workspace_id = parse_id("workspace_id", &request.workspace_id)?;
        let name = request.name.as_deref().map(required_name).transpose()?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            permission::check_workspace(conn, user_id, workspace_id).await?;
            let mut workspace = workspaces::get(conn, workspace_id).await?;
            if let Some(name) = name {
                workspace.name = name;
            }
            workspace.updated_at = now_millis();
            workspaces::update(conn, &workspace).await?;
            let members = member_ids(conn, workspace_id).await?;
            tx.commit().await?;

            self.publish(&members, Change::Update { data: workspace });
            Ok(Ack {})
        })
        .await
    }

    /// Owner only. Collections, environments and memberships go with it.
    pub async fn workspace_delete(
        &self,
        ctx: &RpcContext,
        request: WorkspaceDeleteRequest,
    ) -> Result<Ack, ApiError> {
        let user_id = ctx.user_id()?;
        let workspace_id = parse_id("workspace_id", &request.workspace_id)?;

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            permission::require_role(conn, user_id, workspace_id, Role::Owner).await?;
            let members = member_ids(conn, workspace_id).await?;
            workspaces::delete(conn, workspace_id).await?;
            tx.commit().await?;

            tracing::info!("[WorkspaceService] Deleted workspace {}", workspace_id);
            self.publish(&members, Change::Delete { id: workspace_id });
            Ok(Ack {})
        })
        .await
    }

    pub async fn workspace_member_list(
        &self,
        ctx: &RpcContext,
        request: WorkspaceMemberListRequest,
    ) -> Result<WorkspaceMemberListResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let workspace_id = parse_id("workspace_id", &request.workspace_id)?;

        ctx.run(async {
            let mut conn = self.state.db.acquire().await?;
            permission::check_workspace(&mut conn, user_id, workspace_id).await?;
            let items = workspaces::list_members(&mut conn, workspace_id).await?;
            Ok(WorkspaceMemberListResponse { items })
        })
        .await
    }

    /// Owner only. The invited user must already exist.
    pub async fn workspace_member_create(
        &self,
        ctx: &RpcContext,
        request: WorkspaceMemberCreateRequest,
    ) -> Result<WorkspaceMemberCreateResponse, ApiError> {
        let user_id = ctx.user_id()?;
        let workspace_id = parse_id("workspace_id", &request.workspace_id)?;
        let email = request.email.trim().to_string();
        if email.is_empty() {
            return Err(ApiError::invalid_argument("email is required"));
        }

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            permission::require_role(conn, user_id, workspace_id, Role::Owner).await?;
            let invitee = users::get_by_email(conn, &email).await?;
            if workspaces::member(conn, workspace_id, invitee.id).await?.is_some() {
                return Err(ApiError::invalid_argument(format!(
                    "{email} is already a member"
                )));
            }
            let member = WorkspaceMember {
                id: Id::new_now(),
                workspace_id,
                user_id: invitee.id,
                role: request.role,
            };
            workspaces::add_member(conn, &member).await?;
            let workspace = workspaces::get(conn, workspace_id).await?;
            tx.commit().await?;

            self.publish(&[invitee.id], Change::Insert { data: workspace });
            Ok(WorkspaceMemberCreateResponse {
                member_id: member.id,
            })
        })
        .await
    }

    /// Owner only. An owner cannot remove themselves.
    pub async fn workspace_member_delete(
        &self,
        ctx: &RpcContext,
        request: WorkspaceMemberDeleteRequest,
    ) -> Result<Ack, ApiError> {
        let user_id = ctx.user_id()?;
        let workspace_id = parse_id("workspace_id", &request.workspace_id)?;
        let member_id = parse_id("user_id", &request.user_id)?;
        if member_id == user_id {
            return Err(ApiError::invalid_argument(
                "owners cannot remove themselves from a workspace",
            ));
        }

        ctx.run(async {
            let mut tx = self.state.db.begin_write().await?;
            let conn = tx.conn()?;
            permission::require_role(conn, user_id, workspace_id, Role::Owner).await?;
            workspaces::remove_member(conn, workspace_id, member_id).await?;
            tx.commit().await?;

            self.publish(&[member_id], Change::Delete { id: workspace_id });
            Ok(Ack {})
        })
        .await
    }

    /// Stream of the caller's workspaces: a snapshot of every current one,
    /// then live changes.
    pub async fn workspace_sync<S>(
        &self,
        ctx: &RpcContext,
        _request: WorkspaceSyncRequest,
        sink: S,
    ) -> Result<(), ApiError>
    where
        S: ResponseSink<WorkspaceSyncResponse>,
    {
        let user_id = ctx.user_id()?;
        let db = self.state.db.clone();
        let snapshot = async move {
            let mut conn = db.acquire().await?;
            let topic = UserTopic { user_id };
            let events = workspaces::list_by_user(&mut conn, user_id)
                .await?
                .into_iter()
                .map(|data| Event::new(topic, Change::Insert { data }))
                .collect();
            Ok::<_, ApiError>(events)
        };
        serve_stream(
            ctx,
            &self.state.streams.workspace,
            topics::user_filter(user_id),
            snapshot,
            self.state.streams.batch_options(),
            sink,
        )
        .await
    }
}

/// Workspaces `user_id` belongs to right now, for stream filters.
pub(crate) async fn visible_workspaces(
    state: &ServiceState,
    user_id: Id,
) -> Result<HashSet<Id>, ApiError> {
    let mut conn = state.db.acquire().await?;
    Ok(workspaces::ids_by_user(&mut conn, user_id)
        .await?
        .into_iter()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{next_frame, state};
    use crate::storage::users as user_store;
    use crate::testing::Fixture;
    use devtools_api::Code;
    use tokio::sync::mpsc;

    async fn setup() -> (Fixture, WorkspaceService) {
        let fx = Fixture::new().await;
        let service = WorkspaceService::new(state(&fx.db));
        (fx, service)
    }

    #[tokio::test]
    async fn test_create_makes_caller_owner_with_global_environment() {
        let (fx, service) = setup().await;
        let ctx = RpcContext::authenticated(fx.user_id);

        let created = service
            .workspace_create(&ctx, WorkspaceCreateRequest { name: " Team ".into() })
            .await
            .unwrap();

        let listed = service
            .workspace_list(&ctx, WorkspaceListRequest {})
            .await
            .unwrap();
        let workspace = listed
            .items
            .iter()
            .find(|w| w.id == created.workspace_id)
            .unwrap();
        assert_eq!(workspace.name, "Team");

        let mut conn = fx.db.acquire().await.unwrap();
        let member = workspaces::member(&mut conn, created.workspace_id, fx.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(member.role, Role::Owner);
        let envs = environments::list(&mut conn, created.workspace_id).await.unwrap();
        assert_eq!(envs.len(), 1);
        assert!(envs[0].is_global);
    }

    #[tokio::test]
    async fn test_requires_authentication_and_name() {
        let (_fx, service) = setup().await;
        let err = service
            .workspace_list(&RpcContext::anonymous(), WorkspaceListRequest {})
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::Unauthenticated);

        let ctx = RpcContext::authenticated(Id::new_now());
        let err = service
            .workspace_create(&ctx, WorkspaceCreateRequest { name: "  ".into() })
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_member_management_is_owner_only() {
        let (fx, service) = setup().await;
        let owner = RpcContext::authenticated(fx.user_id);
        let bob = fx.add_user("bob@example.com").await;
        let carol = fx.add_user("carol@example.com").await;
        let ws = fx.workspace_id.as_bytes().to_vec();

        service
            .workspace_member_create(
                &owner,
                WorkspaceMemberCreateRequest {
                    workspace_id: ws.clone(),
                    email: "bob@example.com".into(),
                    role: Role::User,
                },
            )
            .await
            .unwrap();

        // duplicate invitation
        let err = service
            .workspace_member_create(
                &owner,
                WorkspaceMemberCreateRequest {
                    workspace_id: ws.clone(),
                    email: "bob@example.com".into(),
                    role: Role::Admin,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::InvalidArgument);

        // plain member cannot invite
        let err = service
            .workspace_member_create(
                &RpcContext::authenticated(bob),
                WorkspaceMemberCreateRequest {
                    workspace_id: ws.clone(),
                    email: "carol@example.com".into(),
                    role: Role::User,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::PermissionDenied);

        // outsider sees nothing
        let err = service
            .workspace_delete(
                &RpcContext::authenticated(carol),
                WorkspaceDeleteRequest { workspace_id: ws.clone() },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::NotFound);

        let err = service
            .workspace_member_delete(
                &owner,
                WorkspaceMemberDeleteRequest {
                    workspace_id: ws.clone(),
                    user_id: fx.user_id.as_bytes().to_vec(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::InvalidArgument);

        service
            .workspace_member_delete(
                &owner,
                WorkspaceMemberDeleteRequest {
                    workspace_id: ws.clone(),
                    user_id: bob.as_bytes().to_vec(),
                },
            )
            .await
            .unwrap();
        let members = service
            .workspace_member_list(&owner, WorkspaceMemberListRequest { workspace_id: ws })
            .await
            .unwrap();
        assert_eq!(members.items.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_invitee_is_not_found() {
        let (fx, service) = setup().await;
        let err = service
            .workspace_member_create(
                &RpcContext::authenticated(fx.user_id),
                WorkspaceMemberCreateRequest {
                    workspace_id: fx.workspace_id.as_bytes().to_vec(),
                    email: "nobody@example.com".into(),
                    role: Role::User,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::NotFound);
        let mut conn = fx.db.acquire().await.unwrap();
        assert!(user_store::get_by_email(&mut conn, "nobody@example.com").await.is_err());
    }

    #[tokio::test]
    async fn test_sync_sends_snapshot_then_live_changes() {
        let (fx, service) = setup().await;
        let ctx = RpcContext::authenticated(fx.user_id);
        let (tx, mut rx) = mpsc::channel(8);

        let stream = {
            let service = service.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                service
                    .workspace_sync(&ctx, WorkspaceSyncRequest {}, tx)
                    .await
            })
        };

        let snapshot = next_frame(&mut rx).await;
        assert_eq!(snapshot.items.len(), 1);
        assert!(matches!(
            &snapshot.items[0],
            Change::Insert { data } if data.id == fx.workspace_id
        ));

        service
            .workspace_update(
                &ctx,
                WorkspaceUpdateRequest {
                    workspace_id: fx.workspace_id.as_bytes().to_vec(),
                    name: Some("Renamed".into()),
                },
            )
            .await
            .unwrap();
        let live = next_frame(&mut rx).await;
        assert!(matches!(
            &live.items[0],
            Change::Update { data } if data.name == "Renamed"
        ));

        service
            .workspace_delete(
                &ctx,
                WorkspaceDeleteRequest {
                    workspace_id: fx.workspace_id.as_bytes().to_vec(),
                },
            )
            .await
            .unwrap();
        let live = next_frame(&mut rx).await;
        assert_eq!(live.items, vec![Change::Delete { id: fx.workspace_id }]);

        ctx.cancel_token().cancel();
        assert!(stream.await.unwrap().is_ok());
    }
}
