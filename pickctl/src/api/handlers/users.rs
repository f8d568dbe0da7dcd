//! HTTP handlers for user administration (admin only).

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        pick_requests::MessageResponse,
        users::{CurrentUser, ListUsersQuery, UserCreate, UserResponse, UserUpdate},
    },
    auth::password,
    db::{
        errors::DbError,
        handlers::{Repository, Users, users::UserFilter},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::Error,
};

/// Create a user account.
#[utoipa::path(
    post,
    path = "/users",
    request_body = UserCreate,
    tag = "users",
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "Username already exists"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %request.username))]
pub async fn create_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), Error> {
    user.require_admin()?;

    if request.username.trim().is_empty() {
        return Err(Error::Validation {
            message: "Username is required".to_string(),
        });
    }
    if request.password.len() < 6 {
        return Err(Error::Validation {
            message: "Password must be at least 6 characters".to_string(),
        });
    }

    let password = request.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let created = Users::new(&mut tx)
        .create(&UserCreateDBRequest {
            username: request.username.clone(),
            password_hash,
            role: request.role,
        })
        .await
        .map_err(|err| match err {
            DbError::UniqueViolation { .. } => Error::UsernameExists {
                username: request.username.to_lowercase(),
            },
            other => Error::Database(other),
        })?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(username = %created.username, role = %created.role.as_str(), "user created");
    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

/// List user accounts.
#[utoipa::path(
    get,
    path = "/users",
    params(ListUsersQuery),
    tag = "users",
    responses(
        (status = 200, description = "Users", body = [UserResponse]),
        (status = 403, description = "Admin role required"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, Error> {
    user.require_admin()?;

    let (offset, limit) = query.pagination.clamped();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let users = Users::new(&mut conn).list(&UserFilter { offset, limit }).await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Get a user account.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    tag = "users",
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 404, description = "User not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, Error> {
    user.require_admin()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let found = Users::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::UserNotFound { id: id.to_string() })?;

    Ok(Json(UserResponse::from(found)))
}

/// Update a user's password, role, or active flag.
#[utoipa::path(
    patch,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdate,
    tag = "users",
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 404, description = "User not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UserUpdate>,
) -> Result<Json<UserResponse>, Error> {
    user.require_admin()?;

    let password_hash = match request.password {
        Some(password) => {
            if password.len() < 6 {
                return Err(Error::Validation {
                    message: "Password must be at least 6 characters".to_string(),
                });
            }
            Some(
                tokio::task::spawn_blocking(move || password::hash_password(&password))
                    .await
                    .map_err(|e| Error::Internal {
                        operation: format!("spawn password hashing task: {e}"),
                    })??,
            )
        }
        None => None,
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let updated = Users::new(&mut tx)
        .update(
            id,
            &UserUpdateDBRequest {
                password_hash,
                role: request.role,
                is_active: request.is_active,
            },
        )
        .await
        .map_err(|err| match err {
            DbError::NotFound => Error::UserNotFound { id: id.to_string() },
            other => Error::Database(other),
        })?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(UserResponse::from(updated)))
}

/// Deactivate a user account (soft delete).
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    tag = "users",
    responses(
        (status = 200, description = "User deactivated", body = MessageResponse),
        (status = 404, description = "User not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn deactivate_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, Error> {
    user.require_admin()?;

    if user.id == id {
        return Err(Error::Validation {
            message: "Cannot deactivate your own account".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let deactivated = Users::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    if !deactivated {
        return Err(Error::UserNotFound { id: id.to_string() });
    }

    Ok(Json(MessageResponse {
        success: true,
        message: "User deactivated".to_string(),
    }))
}
