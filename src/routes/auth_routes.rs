use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use chrono::{Duration, Utc};

use crate::{
    auth::{generate_access_token, hash_access_token, verify_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        ApiOk, AppState, LoginData, LoginRequest, MeData, OkData, SessionInfo, UserProfile,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<Json<ApiOk<LoginData>>, ApiError> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "username and password are required".into(),
        ));
    }

    let user = state
        .accounts
        .find_user_by_username(username)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    if !user.is_active {
        return Err(ApiError::Forbidden("FORBIDDEN", "Account is disabled".into()));
    }

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::invalid_credentials());
    }

    let access_token = generate_access_token();
    let expires_at = Utc::now() + Duration::hours(state.session_ttl_hours);

    let session = state
        .accounts
        .create_session(
            user.user_id,
            &hash_access_token(&access_token),
            req.device_name.as_deref(),
            expires_at,
        )
        .await?;

    tracing::info!(
        user_id = %session.user_id,
        session_token_id = %session.session_token_id,
        role = user.role.as_str(),
        "login"
    );

    Ok(Json(ApiOk::new(
        "Login successful",
        LoginData {
            access_token,
            expires_at: session.expires_at,
            user: UserProfile::from(&user),
        },
    )))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<MeData>>, ApiError> {
    let user = state
        .accounts
        .find_user_by_id(auth.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(ApiError::session_expired)?;

    Ok(Json(ApiOk::new(
        "Session active",
        MeData {
            user: UserProfile::from(&user),
            session: SessionInfo {
                session_token_id: auth.session_token_id,
                expires_at: auth.expires_at,
            },
        },
    )))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let revoked = state
        .accounts
        .revoke_session(auth.session_token_id, auth.user_id)
        .await?;

    if !revoked {
        return Err(ApiError::session_expired());
    }

    Ok(Json(ApiOk::new("Logged out", OkData { ok: true })))
}
