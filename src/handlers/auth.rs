use crate::{auth::Session, errors::ServiceError, ApiResponse, ApiResult, AppState};
use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

/// Login request payload
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Issued session token response
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub username: String,
    pub expires_at: String,
    pub expires_in_secs: i64,
}

impl SessionResponse {
    fn from_session(session: &Session) -> Self {
        let now = Utc::now();
        Self {
            token: session.token.clone(),
            username: session.username.clone(),
            expires_at: session.expires_at.to_rfc3339(),
            expires_in_secs: session.remaining_secs(now),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ServiceError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = ApiResponse<SessionResponse>),
        (status = 400, description = "Missing credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<SessionResponse> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    // Opportunistic cleanup so abandoned sessions do not accumulate.
    state.sessions.sweep();

    let session = state.sessions.login(&payload.username);
    info!(username = %payload.username, "User logged in");

    Ok(Json(ApiResponse::success(SessionResponse::from_session(
        &session,
    ))))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session revoked", body = ApiResponse<serde_json::Value>),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<serde_json::Value> {
    let token = bearer_token(&headers)?;
    let revoked = state.sessions.logout(token);
    Ok(Json(ApiResponse::success(json!({ "revoked": revoked }))))
}

#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Session is live", body = ApiResponse<SessionResponse>),
        (status = 401, description = "Session missing or expired", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<SessionResponse> {
    let token = bearer_token(&headers)?;
    let session = state
        .sessions
        .validate(token)
        .ok_or_else(|| ServiceError::Unauthorized("Session expired or unknown".to_string()))?;

    Ok(Json(ApiResponse::success(SessionResponse::from_session(
        &session,
    ))))
}
