//! Shared helpers for repository and API tests.
//!
//! Each test gets its own migrated SQLite database in a temp directory; the
//! returned guard keeps the directory alive for the duration of the test.

use crate::api::models::users::{CurrentUser, Role};
use crate::config::Config;
use crate::db::handlers::{PickRequests, Repository, Users};
use crate::db::models::pick_requests::{ItemCreateDBRequest, PickRequestCreateDBRequest};
use crate::db::models::users::UserCreateDBRequest;
use crate::workflow::RequestPriority;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create a fresh migrated database backed by a temp file.
pub async fn test_pool() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let pool = crate::db::connect(&dir.path().join("test.db"))
        .await
        .expect("open test database");
    crate::MIGRATOR.run(&pool).await.expect("run migrations");
    (pool, dir)
}

/// Config suitable for tests: default tunables, scratch paths.
pub fn test_config() -> Config {
    Config {
        secret_key: "test-secret".to_string(),
        ..Default::default()
    }
}

/// Insert a user with an opaque password hash and return it as a principal.
pub async fn seed_user(pool: &SqlitePool, username: &str, role: Role) -> CurrentUser {
    let mut conn = pool.acquire().await.unwrap();
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            password_hash: "unused-hash".to_string(),
            role,
        })
        .await
        .unwrap();
    CurrentUser::from(user)
}

/// Create a pending request with the given `(upc, product_name, quantity)`
/// items, owned by `creator`.
pub async fn create_request(pool: &SqlitePool, name: &str, creator: &CurrentUser, items: &[(&str, &str, i64)]) {
    let mut tx = pool.begin().await.unwrap();
    PickRequests::new(&mut tx)
        .create(&PickRequestCreateDBRequest {
            name: name.to_string(),
            priority: RequestPriority::Normal,
            notes: None,
            created_by: creator.id,
            items: items
                .iter()
                .map(|(upc, product, quantity)| ItemCreateDBRequest {
                    upc: upc.to_string(),
                    product_name: product.to_string(),
                    quantity: *quantity,
                })
                .collect(),
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();
}
