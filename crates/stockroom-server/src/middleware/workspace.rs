//! Tenant context extraction
//!
//! Authentication happens upstream; by the time a request reaches the
//! import routes the gateway has resolved the caller and forwarded the
//! workspace and user as headers. Handlers take [`WorkspaceContext`] as an
//! extractor and never see a request without both ids.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

pub const WORKSPACE_ID_HEADER: &str = "x-workspace-id";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated workspace and user for the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceContext {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
}

fn header_uuid(parts: &Parts, name: &str) -> Option<Uuid> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .filter(|id| !id.is_nil())
}

#[async_trait]
impl<S> FromRequestParts<S> for WorkspaceContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let workspace_id = header_uuid(parts, WORKSPACE_ID_HEADER);
        let user_id = header_uuid(parts, USER_ID_HEADER);

        match (workspace_id, user_id) {
            (Some(workspace_id), Some(user_id)) => Ok(Self {
                workspace_id,
                user_id,
            }),
            _ => {
                tracing::debug!(
                    has_workspace = workspace_id.is_some(),
                    has_user = user_id.is_some(),
                    "Rejected request without workspace context"
                );
                Err(AppError::Unauthorized("workspace context required".to_string()))
            },
        }
    }
}
