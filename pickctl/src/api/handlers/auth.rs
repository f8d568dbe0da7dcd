//! HTTP handlers for authentication endpoints.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        auth::{ChangePasswordRequest, LoginRequest, RefreshRequest, RefreshResponse, TokenResponse},
        pick_requests::MessageResponse,
        users::{CurrentUser, UserResponse},
    },
    auth::{
        password,
        session::{self, TokenKind},
    },
    db::handlers::{Repository, Users},
    db::models::users::UserUpdateDBRequest,
    errors::Error,
};

/// Log in with username and password, receiving access and refresh tokens.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account disabled"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %request.username))]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<TokenResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    let user = users
        .get_by_username(&request.username)
        .await?
        .ok_or(Error::InvalidCredentials)?;

    // Verify on a blocking thread; argon2 is deliberately expensive.
    let password_hash = user.password_hash.clone();
    let candidate = request.password.clone();
    let valid = tokio::task::spawn_blocking(move || password::verify_password(&candidate, &password_hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !valid {
        return Err(Error::InvalidCredentials);
    }

    if !user.is_active {
        return Err(Error::AccountDisabled);
    }

    let access_token = session::create_access_token(user.id, &state.config)?;
    let refresh_token = session::create_refresh_token(user.id, &state.config)?;

    tracing::info!(username = %user.username, "login successful");

    Ok(Json(TokenResponse {
        access_token,
        refresh_token,
        token_type: "bearer".to_string(),
        expires_in: state.config.access_token_ttl_minutes * 60,
        user: UserResponse::from(user),
    }))
}

/// Exchange a refresh token for a new access token.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Token refreshed", body = RefreshResponse),
        (status = 401, description = "Invalid or expired refresh token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, Json(request): Json<RefreshRequest>) -> Result<Json<RefreshResponse>, Error> {
    let user_id = session::verify_token(&request.refresh_token, TokenKind::Refresh, &state.config)?;

    // The account must still exist and be active.
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_id(user_id)
        .await?
        .ok_or(Error::TokenInvalid)?;

    if !user.is_active {
        return Err(Error::AccountDisabled);
    }

    let access_token = session::create_access_token(user.id, &state.config)?;

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.config.access_token_ttl_minutes * 60,
    }))
}

/// Get the authenticated principal.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> Result<Json<UserResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let full = Users::new(&mut conn)
        .get_by_id(user.id)
        .await?
        .ok_or(Error::TokenInvalid)?;

    Ok(Json(UserResponse::from(full)))
}

/// Change the caller's own password.
#[utoipa::path(
    post,
    path = "/auth/change-password",
    request_body = ChangePasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Current password incorrect"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %user.username))]
pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, Error> {
    if request.new_password.len() < 6 {
        return Err(Error::Validation {
            message: "Password must be at least 6 characters".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut tx);

    let stored = users.get_by_id(user.id).await?.ok_or(Error::TokenInvalid)?;
    if !password::verify_password(&request.current_password, &stored.password_hash)? {
        return Err(Error::InvalidCredentials);
    }

    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&request.new_password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    users
        .update(
            user.id,
            &UserUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(username = %user.username, "password changed");
    Ok(Json(MessageResponse {
        success: true,
        message: "Password changed".to_string(),
    }))
}
