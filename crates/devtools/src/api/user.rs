use devtools_api::messages::{UserCreateRequest, UserGetRequest, UserGetResponse};
use devtools_api::ApiError;

use super::{RpcContext, ServiceState};
use crate::storage::users;

/// Profile of the calling user. Accounts are provisioned by the auth layer,
/// never through this surface.
#[derive(Debug, Clone)]
pub struct UserService {
    state: ServiceState,
}

impl UserService {
    pub fn new(state: ServiceState) -> Self {
        Self { state }
    }

    pub async fn user_get(
        &self,
        ctx: &RpcContext,
        _request: UserGetRequest,
    ) -> Result<UserGetResponse, ApiError> {
        let user_id = ctx.user_id()?;
        ctx.run(async {
            let mut conn = self.state.db.acquire().await?;
            let user = users::get(&mut conn, user_id).await?;
            Ok(UserGetResponse { user })
        })
        .await
    }

    pub async fn user_create(
        &self,
        _ctx: &RpcContext,
        _request: UserCreateRequest,
    ) -> Result<(), ApiError> {
        Err(ApiError::unimplemented("users are created by the auth service"))
    }
}
