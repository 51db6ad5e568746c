use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::{header, HeaderMap, HeaderValue},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        claims::Identity,
        dto::{AuthResponse, LoginRequest, MessageResponse},
        jwt::{expired_session_cookie, session_cookie, AuthUser, JwtKeys},
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn set_cookie(value: String) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&value)
        .map_err(|e| anyhow::anyhow!("invalid cookie header: {e}"))?;
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(HeaderMap, Json<AuthResponse>), AppError> {
    let Json(payload) = payload?;
    let keys = JwtKeys::from_ref(&state);
    let (user, token) =
        services::login(state.users.as_ref(), &keys, &payload.username, &payload.password).await?;

    let headers = set_cookie(session_cookie(
        &token,
        keys.ttl,
        state.config.environment.is_production(),
    ))?;
    Ok((headers, Json(AuthResponse { user, token })))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
) -> Result<(HeaderMap, Json<MessageResponse>), AppError> {
    let headers = set_cookie(expired_session_cookie(
        state.config.environment.is_production(),
    ))?;
    info!("session cookie cleared");
    Ok((
        headers,
        Json(MessageResponse {
            message: "Logged out".into(),
        }),
    ))
}

/// Identity as asserted by the token; the token is the only authority.
#[instrument(skip_all)]
pub async fn get_me(AuthUser(identity): AuthUser) -> Json<Identity> {
    Json(identity)
}
