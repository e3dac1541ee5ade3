use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::hash_access_token;
use crate::error::ApiError;
use crate::models::{AppState, Role};

/// Caller identity resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_access_token(authz.token());

            let session = state
                .accounts
                .find_session(&token_hash)
                .await?
                .ok_or_else(ApiError::session_expired)?;

            // best-effort
            if let Err(e) = state.accounts.touch_session(session.session_token_id).await {
                tracing::warn!(error = %e, "failed to touch session");
            }

            Ok(AuthContext {
                user_id: session.user_id,
                role: session.role,
                session_token_id: session.session_token_id,
                expires_at: session.expires_at,
            })
        }
    }
}
