//! # pickctl: Warehouse Pick-Request Coordination Service
//!
//! `pickctl` coordinates warehouse picking work. A requester assembles a
//! named **pick request** out of products and quantities; a picker claims
//! it, records what was actually retrieved (possibly with shortages), and
//! submits it; a completion record is written to disk. The service exposes a
//! REST API plus WebSocket scanning sessions, backed by a transactional
//! SQLite store.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum); persistence
//! is SQLx over SQLite. Correctness under concurrent operators rests on two
//! mechanisms: every coordinator operation runs inside a single transaction,
//! and claim acquisition is a guarded conditional UPDATE so that two pickers
//! starting the same request produce exactly one winner (see
//! [`db::handlers::pick_requests`]).
//!
//! ### Core components
//!
//! - [`workflow`]: the request state machine - the closed set of lifecycle
//!   transitions with their guards.
//! - [`db`]: the request store (repositories over SQLite), the only holder
//!   of authoritative state.
//! - [`reaper`]: the background maintenance task releasing idle claims and
//!   evicting aged completions.
//! - [`pick_log`]: the completion log writer.
//! - [`catalog`]: the read-mostly product catalog with scanned-code
//!   substring matching.
//! - [`api`] / [`ws`]: the REST and WebSocket transports; thin adapters
//!   over the coordinator operations.
//! - [`auth`]: JWT sessions, argon2 password hashing, and the request
//!   middleware supplying the authenticated principal.
//!
//! ## Quick start
//!
//! ```no_run
//! use clap::Parser;
//! use pickctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = pickctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     pickctl::telemetry::init_telemetry()?;
//!
//!     Application::new(config).await?
//!         .serve(async {
//!             tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!         })
//!         .await
//! }
//! ```

pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod pick_log;
pub mod reaper;
mod static_assets;
pub mod telemetry;
pub mod types;
pub mod validators;
pub mod workflow;
pub mod ws;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::handlers::{auth as auth_handlers, health, pick_requests as pr_handlers, products, static_assets as assets, users},
    auth::{middleware::require_auth, password},
    catalog::Catalog,
    config::Config as AppConfig,
    db::handlers::{Repository, Users},
    db::models::users::UserCreateDBRequest,
    errors::Error,
    openapi::ApiDoc,
    pick_log::PickLogWriter,
    reaper::Reaper,
};
use anyhow::Context;
use arc_swap::ArcSwapOption;
use axum::{
    Router, middleware,
    routing::{get, patch, post, put},
};
use bon::Builder;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
pub use types::UserId;

/// Database migrations, applied idempotently at startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: AppConfig,
    /// Product catalog; `None` until a successful load. Swapped atomically
    /// on reload.
    pub catalog: Arc<ArcSwapOption<Catalog>>,
    pub pick_log: PickLogWriter,
}

impl AppState {
    /// The catalog, or `CATALOG_NOT_LOADED` when absent.
    pub fn catalog(&self) -> Result<Arc<Catalog>, Error> {
        self.catalog.load_full().ok_or(Error::CatalogNotLoaded)
    }
}

/// Build the service router on top of an [`AppState`].
pub fn build_router(state: AppState) -> Router {
    let public_api = Router::new()
        .route("/health", get(health::health))
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/refresh", post(auth_handlers::refresh));

    let protected_api = Router::new()
        .route("/auth/me", get(auth_handlers::me))
        .route("/auth/change-password", post(auth_handlers::change_password))
        .route("/users", post(users::create_user).get(users::list_users))
        .route(
            "/users/{id}",
            get(users::get_user).patch(users::update_user).delete(users::deactivate_user),
        )
        .route("/products", get(products::list_products))
        .route("/products/search", get(products::search_products))
        .route("/products/categories", get(products::list_categories))
        .route("/products/lookup/{code}", get(products::lookup_product))
        .route("/products/reload", post(products::reload_catalog))
        .route("/pick-requests/validate-name", get(pr_handlers::validate_name))
        .route("/pick-requests", post(pr_handlers::create).get(pr_handlers::list))
        .route("/pick-requests/{name}", get(pr_handlers::get).delete(pr_handlers::delete))
        .route("/pick-requests/{name}/start", post(pr_handlers::start))
        .route("/pick-requests/{name}/pause", post(pr_handlers::pause))
        .route("/pick-requests/{name}/resume", post(pr_handlers::resume))
        .route("/pick-requests/{name}/release", post(pr_handlers::release))
        .route("/pick-requests/{name}/cancel", post(pr_handlers::cancel))
        .route("/pick-requests/{name}/approve", post(pr_handlers::approve))
        .route("/pick-requests/{name}/submit", post(pr_handlers::submit))
        .route("/pick-requests/{name}/shortages", get(pr_handlers::get_shortages))
        .route("/pick-requests/{name}/items/{upc}", patch(pr_handlers::update_item))
        .route(
            "/pick-requests/{name}/items/{upc}/shortage",
            put(pr_handlers::set_item_shortage),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = if state.config.cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    };

    Router::new()
        .nest("/api/v1", public_api.merge(protected_api))
        .route("/ws/picker", get(ws::picker::picker_ws))
        .route("/ws/requester", get(ws::requester::requester_ws))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .fallback(assets::serve_embedded_asset)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .with_state(state)
}

/// Create the default admin account iff no active admin exists.
pub async fn create_initial_admin_user(pool: &SqlitePool, config: &AppConfig) -> anyhow::Result<()> {
    let mut conn = pool.acquire().await?;
    let mut users = Users::new(&mut conn);

    if users.has_active_admin().await.context("check for existing admin")? {
        return Ok(());
    }

    let password_hash =
        password::hash_password(&config.admin_password).map_err(|e| anyhow::anyhow!("hash admin password: {e}"))?;

    users
        .create(&UserCreateDBRequest {
            username: config.admin_username.clone(),
            password_hash,
            role: api::models::users::Role::Admin,
        })
        .await
        .context("create initial admin user")?;

    info!(username = %config.admin_username, "initial admin user created");
    Ok(())
}

/// The assembled service: state, router, and background tasks.
///
/// 1. **Create**: [`Application::new`] opens the database, runs migrations,
///    seeds the admin, loads the catalog, and spawns the reaper.
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles
///    requests until the shutdown future resolves.
/// 3. **Shutdown**: background tasks are cancelled cooperatively and the
///    pool is closed.
pub struct Application {
    router: Router,
    config: AppConfig,
    pool: SqlitePool,
    shutdown_token: tokio_util::sync::CancellationToken,
    reaper_handle: tokio::task::JoinHandle<()>,
}

impl Application {
    /// Create a new application instance with all resources initialized.
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config.database_path)
            .await
            .context("open SQLite database")?;
        Self::new_with_pool(config, pool).await
    }

    /// Create an application on an existing pool (used by tests).
    pub async fn new_with_pool(config: AppConfig, pool: SqlitePool) -> anyhow::Result<Self> {
        MIGRATOR.run(&pool).await.context("run database migrations")?;
        create_initial_admin_user(&pool, &config).await?;

        // A missing catalog degrades product lookup but not the coordinator.
        let catalog = match Catalog::load(&config.products_file) {
            Ok(catalog) => Some(Arc::new(catalog)),
            Err(e) => {
                tracing::warn!("product catalog unavailable: {e:#}");
                None
            }
        };

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .catalog(Arc::new(ArcSwapOption::new(catalog)))
            .pick_log(PickLogWriter::new(config.log_directory.clone()))
            .build();

        let shutdown_token = tokio_util::sync::CancellationToken::new();
        let reaper_handle = Reaper::new(pool.clone(), config.clone()).spawn(shutdown_token.clone());

        Ok(Self {
            router: build_router(state),
            config,
            pool,
            shutdown_token,
            reaper_handle,
        })
    }

    /// Start serving the application until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("pickctl listening on http://{bind_addr}");

        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await;

        info!("Shutting down background services...");
        self.shutdown_token.cancel();
        if let Err(e) = self.reaper_handle.await {
            tracing::warn!("reaper task join failed: {e}");
        }

        info!("Closing database connections...");
        self.pool.close().await;

        result.map_err(Into::into)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{test_config, test_pool};
    use axum_test::TestServer;
    use serde_json::{Value, json};

    /// Spin up a test server over a scratch database with the default admin
    /// seeded. The temp dir guard also holds the completion-log directory.
    async fn spawn_server() -> (TestServer, SqlitePool, tempfile::TempDir) {
        let (pool, guard) = test_pool().await;
        let mut config = test_config();
        config.log_directory = guard.path().join("logs");

        create_initial_admin_user(&pool, &config).await.unwrap();

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .catalog(Arc::new(ArcSwapOption::new(None)))
            .pick_log(PickLogWriter::new(config.log_directory.clone()))
            .build();

        let server = TestServer::new(build_router(state)).expect("build test server");
        (server, pool, guard)
    }

    async fn login(server: &TestServer, username: &str, password: &str) -> String {
        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({ "username": username, "password": password }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["access_token"].as_str().unwrap().to_string()
    }

    /// Create a user through the admin API and log them in.
    async fn provision_user(server: &TestServer, admin_token: &str, username: &str, role: &str) -> String {
        let response = server
            .post("/api/v1/users")
            .authorization_bearer(admin_token)
            .json(&json!({ "username": username, "password": "password1", "role": role }))
            .await;
        assert_eq!(response.status_code(), 201, "{}", response.text());
        login(server, username, "password1").await
    }

    fn error_code(body: &Value) -> &str {
        body["error"]["code"].as_str().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_login_me_and_bad_credentials() {
        let (server, _pool, _guard) = spawn_server().await;

        let token = login(&server, "admin", "admin123").await;
        let me = server.get("/api/v1/auth/me").authorization_bearer(&token).await;
        me.assert_status_ok();
        assert_eq!(me.json::<Value>()["username"], "admin");

        let bad = server
            .post("/api/v1/auth/login")
            .json(&json!({ "username": "admin", "password": "wrong" }))
            .await;
        assert_eq!(bad.status_code(), 401);
        assert_eq!(error_code(&bad.json()), "INVALID_CREDENTIALS");

        let unauthenticated = server.get("/api/v1/auth/me").await;
        assert_eq!(unauthenticated.status_code(), 401);
    }

    #[tokio::test]
    async fn test_name_validation_endpoint() {
        let (server, _pool, _guard) = spawn_server().await;
        let token = login(&server, "admin", "admin123").await;

        let cases = [
            ("  Monday-Restock  ", true, None, Some("monday-restock")),
            ("1abc", false, Some("Name must start with a letter"), None),
            ("ab", false, Some("Name must be at least 3 characters"), None),
            ("a b", false, Some("Name cannot contain spaces"), None),
        ];

        for (raw, available, error, normalized) in cases {
            let response = server
                .get("/api/v1/pick-requests/validate-name")
                .add_query_param("name", raw)
                .authorization_bearer(&token)
                .await;
            response.assert_status_ok();
            let body = response.json::<Value>();
            assert_eq!(body["available"], available, "case {raw:?}: {body}");
            match error {
                Some(error) => assert_eq!(body["error"], error),
                None => assert!(body["error"].is_null()),
            }
            match normalized {
                Some(normalized) => assert_eq!(body["normalized_name"], normalized),
                None => assert!(body["normalized_name"].is_null()),
            }
        }
    }

    #[tokio::test]
    async fn test_full_happy_path_over_api() {
        let (server, _pool, guard) = spawn_server().await;
        let admin_token = login(&server, "admin", "admin123").await;
        let alice = provision_user(&server, &admin_token, "alice", "requester").await;
        let bob = provision_user(&server, &admin_token, "bob", "picker").await;

        // Alice creates the request.
        let created = server
            .post("/api/v1/pick-requests")
            .authorization_bearer(&alice)
            .json(&json!({
                "name": "Monday-Restock",
                "priority": "normal",
                "items": [
                    { "upc": "29456086", "product_name": "Big Mix", "quantity": 3 },
                    { "upc": "29377107", "product_name": "Cookies", "quantity": 2 },
                ],
            }))
            .await;
        assert_eq!(created.status_code(), 201, "{}", created.text());
        let body = created.json::<Value>();
        assert_eq!(body["name"], "monday-restock");
        assert_eq!(body["status"], "pending");

        // A picker cannot create requests.
        let forbidden = server
            .post("/api/v1/pick-requests")
            .authorization_bearer(&bob)
            .json(&json!({
                "name": "bobs-list",
                "items": [{ "upc": "29456086", "product_name": "Big Mix", "quantity": 1 }],
            }))
            .await;
        assert_eq!(forbidden.status_code(), 403);
        assert_eq!(error_code(&forbidden.json()), "FORBIDDEN");

        // Bob starts and picks everything.
        let started = server
            .post("/api/v1/pick-requests/monday-restock/start")
            .authorization_bearer(&bob)
            .await;
        started.assert_status_ok();
        assert_eq!(started.json::<Value>()["request"]["claimed_by"], "bob");

        for (upc, increment) in [("29456086", 3), ("29377107", 2)] {
            let updated = server
                .patch(&format!("/api/v1/pick-requests/monday-restock/items/{upc}"))
                .authorization_bearer(&bob)
                .json(&json!({ "increment": increment }))
                .await;
            updated.assert_status_ok();
        }

        let submitted = server
            .post("/api/v1/pick-requests/monday-restock/submit")
            .authorization_bearer(&bob)
            .json(&json!({}))
            .await;
        submitted.assert_status_ok();
        let body = submitted.json::<Value>();
        assert_eq!(body["request"]["status"], "completed");
        assert_eq!(body["request"]["total_picked"], 5);
        assert!(body["request"]["claimed_by"].is_null());
        assert_eq!(body["has_shortages"], false);

        // The completion log landed in the configured directory.
        let log_file = body["log_file"].as_str().expect("log file path in response");
        assert!(log_file.contains("pick_monday-restock_"));
        assert!(std::path::Path::new(log_file).is_file());
        assert!(guard.path().join("logs").is_dir());
    }

    #[tokio::test]
    async fn test_contention_and_shortage_flow_over_api() {
        let (server, _pool, _guard) = spawn_server().await;
        let admin_token = login(&server, "admin", "admin123").await;
        let alice = provision_user(&server, &admin_token, "alice", "requester").await;
        let bob = provision_user(&server, &admin_token, "bob", "picker").await;
        let carol = provision_user(&server, &admin_token, "carol", "picker").await;

        server
            .post("/api/v1/pick-requests")
            .authorization_bearer(&alice)
            .json(&json!({
                "name": "shared-job",
                "items": [{ "upc": "100", "product_name": "Widget", "quantity": 2 }],
            }))
            .await
            .assert_status_success();

        server
            .post("/api/v1/pick-requests/shared-job/start")
            .authorization_bearer(&bob)
            .await
            .assert_status_ok();

        // Carol runs into the claim.
        let locked = server
            .post("/api/v1/pick-requests/shared-job/start")
            .authorization_bearer(&carol)
            .await;
        assert_eq!(locked.status_code(), 423);
        let body = locked.json::<Value>();
        assert_eq!(error_code(&body), "REQUEST_LOCKED");
        assert_eq!(body["error"]["details"]["locked_by"], "bob");

        // Bob picks one of two, submit without a reason fails.
        server
            .patch("/api/v1/pick-requests/shared-job/items/100")
            .authorization_bearer(&bob)
            .json(&json!({ "picked_qty": 1 }))
            .await
            .assert_status_ok();

        let rejected = server
            .post("/api/v1/pick-requests/shared-job/submit")
            .authorization_bearer(&bob)
            .json(&json!({}))
            .await;
        assert_eq!(rejected.status_code(), 422);
        assert_eq!(error_code(&rejected.json()), "VALIDATION_ERROR");

        // Record the shortage, then submit.
        server
            .put("/api/v1/pick-requests/shared-job/items/100/shortage")
            .authorization_bearer(&bob)
            .json(&json!({ "shortage_reason": "out_of_stock" }))
            .await
            .assert_status_ok();

        let submitted = server
            .post("/api/v1/pick-requests/shared-job/submit")
            .authorization_bearer(&bob)
            .json(&json!({}))
            .await;
        submitted.assert_status_ok();
        assert_eq!(submitted.json::<Value>()["request"]["status"], "partially_completed");

        let summary = server
            .get("/api/v1/pick-requests/shared-job/shortages")
            .authorization_bearer(&alice)
            .await;
        summary.assert_status_ok();
        let body = summary.json::<Value>();
        assert_eq!(body["short_count"], 1);
        assert_eq!(body["items"][0]["missing"], 1);

        // Alice approves with a note.
        let approved = server
            .post("/api/v1/pick-requests/shared-job/approve")
            .authorization_bearer(&alice)
            .json(&json!({ "notes": "ok for now" }))
            .await;
        approved.assert_status_ok();
        let body = approved.json::<Value>();
        assert_eq!(body["request"]["status"], "completed");
        assert!(
            body["request"]["notes"]
                .as_str()
                .unwrap()
                .contains("[APPROVED by alice]: ok for now")
        );
    }

    #[tokio::test]
    async fn test_quantity_exceeded_over_api() {
        let (server, _pool, _guard) = spawn_server().await;
        let admin_token = login(&server, "admin", "admin123").await;
        let alice = provision_user(&server, &admin_token, "alice", "requester").await;
        let bob = provision_user(&server, &admin_token, "bob", "picker").await;

        server
            .post("/api/v1/pick-requests")
            .authorization_bearer(&alice)
            .json(&json!({
                "name": "widgets",
                "items": [{ "upc": "100", "product_name": "Widget", "quantity": 5 }],
            }))
            .await
            .assert_status_success();
        server
            .post("/api/v1/pick-requests/widgets/start")
            .authorization_bearer(&bob)
            .await
            .assert_status_ok();

        let exceeded = server
            .patch("/api/v1/pick-requests/widgets/items/100")
            .authorization_bearer(&bob)
            .json(&json!({ "increment": 6 }))
            .await;
        assert_eq!(exceeded.status_code(), 400);
        let body = exceeded.json::<Value>();
        assert_eq!(error_code(&body), "QUANTITY_EXCEEDED");
        assert_eq!(body["error"]["details"]["remaining"], 5);
    }

    #[tokio::test]
    async fn test_deactivated_user_is_locked_out() {
        let (server, pool, _guard) = spawn_server().await;
        let admin_token = login(&server, "admin", "admin123").await;
        let bob_token = provision_user(&server, &admin_token, "bob", "picker").await;

        // Deactivate bob.
        let bob_id: uuid::Uuid = {
            let mut conn = pool.acquire().await.unwrap();
            Users::new(&mut conn).get_by_username("bob").await.unwrap().unwrap().id
        };
        server
            .delete(&format!("/api/v1/users/{bob_id}"))
            .authorization_bearer(&admin_token)
            .await
            .assert_status_ok();

        // The still-valid token no longer authenticates.
        let me = server.get("/api/v1/auth/me").authorization_bearer(&bob_token).await;
        assert_eq!(me.status_code(), 403);
        assert_eq!(error_code(&me.json()), "ACCOUNT_DISABLED");

        // And a fresh login is refused too.
        let login_attempt = server
            .post("/api/v1/auth/login")
            .json(&json!({ "username": "bob", "password": "password1" }))
            .await;
        assert_eq!(login_attempt.status_code(), 403);
        assert_eq!(error_code(&login_attempt.json()), "ACCOUNT_DISABLED");
    }

    #[tokio::test]
    async fn test_duplicate_names_and_invalid_payloads() {
        let (server, _pool, _guard) = spawn_server().await;
        let admin_token = login(&server, "admin", "admin123").await;
        let alice = provision_user(&server, &admin_token, "alice", "requester").await;

        let create = |name: &str, items: Value| {
            server
                .post("/api/v1/pick-requests")
                .authorization_bearer(&alice)
                .json(&json!({ "name": name, "items": items }))
        };

        create("first", json!([{ "upc": "100", "product_name": "Widget", "quantity": 1 }]))
            .await
            .assert_status_success();

        // Same name, case-folded, is a conflict.
        let conflict = create("FIRST", json!([{ "upc": "100", "product_name": "Widget", "quantity": 1 }])).await;
        assert_eq!(conflict.status_code(), 409);
        assert_eq!(error_code(&conflict.json()), "REQUEST_NAME_EXISTS");

        // Duplicate UPCs are rejected before any row is written.
        let duplicate = create(
            "second",
            json!([
                { "upc": "100", "product_name": "Widget", "quantity": 1 },
                { "upc": "100", "product_name": "Widget", "quantity": 2 },
            ]),
        )
        .await;
        assert_eq!(duplicate.status_code(), 422);

        // Bad name shape.
        let bad_name = create("1abc", json!([{ "upc": "100", "product_name": "Widget", "quantity": 1 }])).await;
        assert_eq!(bad_name.status_code(), 400);
        assert_eq!(error_code(&bad_name.json()), "INVALID_REQUEST_NAME");

        // Catalog endpoints degrade cleanly with no catalog loaded.
        let products = server.get("/api/v1/products").authorization_bearer(&alice).await;
        assert_eq!(products.status_code(), 500);
        assert_eq!(error_code(&products.json()), "CATALOG_NOT_LOADED");
    }
}
