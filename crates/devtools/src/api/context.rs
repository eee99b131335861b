use std::future::Future;

use devtools_api::{ApiError, Id};
use tokio_util::sync::CancellationToken;

/// Per-request context handed to every handler.
///
/// The auth middleware in front of the services resolves the caller and
/// fills in `user_id`; the transport cancels the token when the client goes
/// away.
#[derive(Debug, Clone, Default)]
pub struct RpcContext {
    user_id: Option<Id>,
    cancel: CancellationToken,
}

impl RpcContext {
    pub fn new(user_id: Option<Id>, cancel: CancellationToken) -> Self {
        Self { user_id, cancel }
    }

    pub fn authenticated(user_id: Id) -> Self {
        Self::new(Some(user_id), CancellationToken::new())
    }

    pub fn anonymous() -> Self {
        Self::new(None, CancellationToken::new())
    }

    /// Authenticated caller, or `Unauthenticated`.
    pub fn user_id(&self) -> Result<Id, ApiError> {
        self.user_id.ok_or_else(ApiError::unauthenticated)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `work` unless the request is cancelled first.
    ///
    /// Cancellation drops `work` where it stands, so an open write
    /// transaction inside it rolls back.
    pub async fn run<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!("[Rpc] Request cancelled before completion");
                Err(ApiError::internal("request cancelled"))
            }
            result = work => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devtools_api::Code;

    #[tokio::test]
    async fn test_anonymous_is_unauthenticated() {
        let ctx = RpcContext::anonymous();
        assert_eq!(ctx.user_id().unwrap_err().code, Code::Unauthenticated);
    }

    #[tokio::test]
    async fn test_cancelled_request_stops_work() {
        let ctx = RpcContext::authenticated(Id::new_now());
        ctx.cancel_token().cancel();
        let err = ctx
            .run(async { std::future::pending::<Result<(), ApiError>>().await })
            .await
            .unwrap_err();
        assert_eq!(err.code, Code::Internal);
    }
}
