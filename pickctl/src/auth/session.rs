//! JWT token creation and verification.
//!
//! Two token kinds are issued: short-lived access tokens presented on every
//! request, and longer-lived refresh tokens exchangeable for a new access
//! token. Both carry only the user id; roles and the active flag are loaded
//! fresh from the store on every request so deactivation takes effect
//! immediately.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, errors::Error, types::UserId};

/// Which kind of token a set of claims represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub exp: i64,
    pub iat: i64,
    pub kind: TokenKind,
}

/// Create an access token for a user.
pub fn create_access_token(user_id: UserId, config: &Config) -> Result<String, Error> {
    create_token(user_id, TokenKind::Access, Duration::minutes(config.access_token_ttl_minutes), config)
}

/// Create a refresh token for a user.
pub fn create_refresh_token(user_id: UserId, config: &Config) -> Result<String, Error> {
    create_token(user_id, TokenKind::Refresh, Duration::days(config.refresh_token_ttl_days), config)
}

fn create_token(user_id: UserId, kind: TokenKind, ttl: Duration, config: &Config) -> Result<String, Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
        kind,
    };

    let key = EncodingKey::from_secret(config.secret_key.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verify a token of the expected kind and return the user id.
///
/// Expired tokens map to `TOKEN_EXPIRED`; every other verification failure
/// (bad signature, malformed payload, wrong kind) maps to `TOKEN_INVALID`.
pub fn verify_token(token: &str, expected: TokenKind, config: &Config) -> Result<UserId, Error> {
    let key = DecodingKey::from_secret(config.secret_key.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::TokenExpired,
        _ => Error::TokenInvalid,
    })?;

    if token_data.claims.kind != expected {
        return Err(Error::TokenInvalid);
    }

    Ok(token_data.claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_config() -> Config {
        Config {
            secret_key: "test-secret-key-for-jwt".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_verify_access_token() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let token = create_access_token(user_id, &config).unwrap();
        assert!(!token.is_empty());

        let verified = verify_token(&token, TokenKind::Access, &config).unwrap();
        assert_eq!(verified, user_id);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let refresh = create_refresh_token(user_id, &config).unwrap();
        let err = verify_token(&refresh, TokenKind::Access, &config).unwrap_err();
        assert!(matches!(err, Error::TokenInvalid));

        // And the other way around.
        let access = create_access_token(user_id, &config).unwrap();
        let err = verify_token(&access, TokenKind::Refresh, &config).unwrap_err();
        assert!(matches!(err, Error::TokenInvalid));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let config = test_config();
        let err = verify_token("not.a.token", TokenKind::Access, &config).unwrap_err();
        assert!(matches!(err, Error::TokenInvalid));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let config = test_config();
        let other = Config {
            secret_key: "a-different-secret".to_string(),
            ..Default::default()
        };

        let token = create_access_token(Uuid::new_v4(), &config).unwrap();
        assert!(verify_token(&token, TokenKind::Access, &other).is_err());
    }
}
