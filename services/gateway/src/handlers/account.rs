use crate::auth::{self, AuthenticatedUser};
use crate::error::AppError;
use crate::models::{
    AuthResponse, LoginRequest, MeResponse, ProfileAsset, ProfileResponse, RegisterRequest,
};
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    Json,
};
use engine::store::AuditSink;
use engine::{accounts, assets, balance};
use serde_json::json;
use std::net::SocketAddr;
use types::prelude::*;

pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::UnprocessableEntity("name must not be empty".into()));
    }
    if !payload.email.contains('@') {
        return Err(AppError::UnprocessableEntity("email is invalid".into()));
    }
    if payload.password.len() < 8 {
        return Err(AppError::UnprocessableEntity(
            "password must be at least 8 characters".into(),
        ));
    }
    if payload.password != payload.password_confirmation {
        return Err(AppError::UnprocessableEntity(
            "password confirmation does not match".into(),
        ));
    }

    let password_hash = auth::hash_password(&payload.password);
    let user = accounts::register(&state.store, payload.name.trim(), &payload.email, &password_hash)
        .await
        .map_err(AppError::from)?;

    let token = auth::issue_token(&state.jwt_secret, user.id)?;
    state.sessions.insert(token.clone(), user.id);
    tracing::info!(user_id = %user.id, ip = %addr.ip(), "registration complete");

    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .store
        .find_user_by_email(&payload.email)
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;
    if !auth::verify_password(&payload.password, &user.password_hash) {
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let token = auth::issue_token(&state.jwt_secret, user.id)?;
    state.sessions.insert(token.clone(), user.id);

    state.store.log(AuditEntry::new(
        Some(user.id),
        AuditAction::UserLoggedIn,
        EntityKind::User,
        user.id.to_string(),
        json!({}),
        Some(addr.ip().to_string()),
        types::now_nanos(),
    ));

    Ok(Json(AuthResponse { user, token }))
}

pub async fn logout(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, AppError> {
    state.sessions.revoke(&user.token);

    state.store.log(AuditEntry::new(
        Some(user.user_id),
        AuditAction::UserLoggedOut,
        EntityKind::User,
        user.user_id.to_string(),
        json!({}),
        Some(addr.ip().to_string()),
        types::now_nanos(),
    ));

    Ok(Json(json!({ "message": "logged out" })))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<MeResponse>, AppError> {
    let user = state
        .store
        .get_user(user.user_id)
        .ok_or_else(|| AppError::Unauthorized("Unknown user".into()))?;
    Ok(Json(MeResponse { user }))
}

pub async fn profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let record = state
        .store
        .get_user(user.user_id)
        .ok_or_else(|| AppError::Unauthorized("Unknown user".into()))?;
    let balance = balance::balance_of(&state.store, user.user_id).map_err(AppError::from)?;
    let assets = assets::assets_of(&state.store, user.user_id)
        .into_iter()
        .map(ProfileAsset::from)
        .collect();

    Ok(Json(ProfileResponse {
        user: record,
        balance,
        assets,
    }))
}
