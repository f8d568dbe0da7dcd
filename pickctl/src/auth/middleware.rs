//! Authentication middleware and the `CurrentUser` extractor.
//!
//! Requests to protected routes present a bearer access token. The
//! middleware verifies it, loads the principal fresh from the store (so role
//! changes and deactivation apply immediately), and attaches a
//! [`CurrentUser`] to the request extensions. WebSocket endpoints
//! authenticate the same way from a `token` query parameter via
//! [`authenticate_token`].

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use sqlx::SqlitePool;

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session::{self, TokenKind},
    config::Config,
    db::handlers::{Repository, Users},
    errors::Error,
};

/// Verify an access token and resolve it to an active principal.
pub async fn authenticate_token(pool: &SqlitePool, config: &Config, token: &str) -> Result<CurrentUser, Error> {
    let user_id = session::verify_token(token, TokenKind::Access, config)?;

    let mut conn = pool.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);
    let user = users.get_by_id(user_id).await?.ok_or(Error::TokenInvalid)?;

    if !user.is_active {
        return Err(Error::AccountDisabled);
    }

    Ok(CurrentUser::from(user))
}

/// Extract the bearer token from an `Authorization` header value.
fn bearer_token(parts: &axum::http::HeaderMap) -> Option<&str> {
    parts
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Middleware guarding the protected API routes.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, Error> {
    let token = bearer_token(request.headers()).ok_or(Error::TokenInvalid)?.to_string();

    let user = authenticate_token(&state.db, &state.config, &token).await?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CurrentUser>().cloned().ok_or(Error::TokenInvalid)
    }
}
