//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx over SQLite. It
//! follows the repository pattern: one repository per table, constructed on a
//! connection (usually a transaction) owned by the caller.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries & workflow enforcement)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   SQLite    │
//! └─────────────┘
//! ```
//!
//! # Transactions
//!
//! Every coordinator operation that mutates runs in a single transaction:
//! the API handler begins it, constructs the repository on it, and commits
//! after the repository call returns. On any error the transaction is
//! dropped, which rolls it back. Read-only operations may use a plain pooled
//! connection.
//!
//! ```ignore
//! let mut tx = state.db.begin().await?;
//! let request = PickRequests::new(&mut tx).start(&name, &user).await?;
//! tx.commit().await?;
//! ```
//!
//! # Migrations
//!
//! Schema creation is idempotent and runs at startup via SQLx migrations in
//! the `migrations/` directory (see [`crate::migrator`]).

pub mod errors;
pub mod handlers;
pub mod models;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

/// Open (creating if missing) the SQLite database at `path` and return a
/// pool with the settings the coordinator relies on: foreign keys enforced,
/// WAL journaling, and a busy timeout long enough to serialize contending
/// writers instead of failing them.
pub async fn connect(path: &Path) -> anyhow::Result<SqlitePool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await?;

    Ok(pool)
}
