//! Database repository for pick requests: the authoritative store plus the
//! claim, ledger, and submission logic that runs inside it.
//!
//! Every mutating method expects to run inside a transaction owned by the
//! caller; the method validates against the state machine, applies the
//! transition's side effects, and stamps `last_activity_at`, all against the
//! same connection so the commit is atomic.
//!
//! # Claim discipline
//!
//! At most one principal holds the claim on a request. Claim acquisition
//! (`start`, `resume`) is a single conditional UPDATE whose WHERE clause
//! re-checks status and claim holder, so two concurrent acquisitions cannot
//! both succeed: the loser's update matches zero rows and is classified into
//! `REQUEST_LOCKED` or `INVALID_STATUS` by a re-read. The acquisition is
//! deliberately the first statement of its transaction; a prior read would
//! pin a snapshot and turn the race into a spurious write conflict.

use crate::api::models::users::CurrentUser;
use crate::db::models::pick_requests::{
    ItemCreateDBRequest, PickItemRow, PickRequestCreateDBRequest, PickRequestDBResponse, PickRequestFilter,
    PickRequestRow, QuantityUpdate, ShortageUpdate,
};
use crate::errors::{Error, Result};
use crate::workflow::{RequestStatus, ShortageReason, WorkflowOp, check_transition};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, SqliteConnection};
use std::collections::HashMap;
use tracing::instrument;

/// Join row: a request plus its creator/claimant usernames.
#[derive(Debug, FromRow)]
struct RequestWithNames {
    #[sqlx(flatten)]
    row: PickRequestRow,
    creator_username: Option<String>,
    claimant_username: Option<String>,
}

const SELECT_WITH_NAMES: &str = r#"
    SELECT r.*, c.username AS creator_username, l.username AS claimant_username
    FROM pick_requests r
    LEFT JOIN users c ON c.id = r.created_by
    LEFT JOIN users l ON l.id = r.claimed_by
"#;

pub struct PickRequests<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> PickRequests<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Load a request with items and resolved usernames, or None.
    async fn load(&mut self, name: &str) -> Result<Option<PickRequestDBResponse>> {
        let query = format!("{SELECT_WITH_NAMES} WHERE r.name = ?");
        let Some(joined) = sqlx::query_as::<_, RequestWithNames>(&query)
            .bind(name.to_lowercase())
            .fetch_optional(&mut *self.db)
            .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, PickItemRow>(
            "SELECT * FROM pick_request_items WHERE request_name = ? ORDER BY id",
        )
        .bind(&joined.row.name)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(Some(assemble(joined, items)))
    }

    /// Fetch a request by (case-insensitive) name.
    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<PickRequestDBResponse> {
        self.load(name).await?.ok_or_else(|| Error::RequestNotFound {
            name: name.to_string(),
        })
    }

    /// Whether a canonical name is still unused.
    #[instrument(skip(self), err)]
    pub async fn name_available(&mut self, normalized: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pick_requests WHERE name = ?")
            .bind(normalized)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count == 0)
    }

    /// List requests ordered by priority (`urgent` before `normal` before
    /// `low`), then most recent first. Items are loaded eagerly in one
    /// follow-up query.
    #[instrument(skip(self, filter), err)]
    pub async fn list(&mut self, filter: &PickRequestFilter, offset: i64, limit: i64) -> Result<Vec<PickRequestDBResponse>> {
        let mut qb = QueryBuilder::new(SELECT_WITH_NAMES);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY CASE r.priority WHEN 'urgent' THEN 0 WHEN 'normal' THEN 1 ELSE 2 END, r.created_at DESC");
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);

        let joined: Vec<RequestWithNames> = qb.build_query_as().fetch_all(&mut *self.db).await?;
        if joined.is_empty() {
            return Ok(Vec::new());
        }

        let mut items_qb = QueryBuilder::new("SELECT * FROM pick_request_items WHERE request_name IN (");
        let mut separated = items_qb.separated(", ");
        for request in &joined {
            separated.push_bind(request.row.name.clone());
        }
        items_qb.push(") ORDER BY id");

        let all_items: Vec<PickItemRow> = items_qb.build_query_as().fetch_all(&mut *self.db).await?;
        let mut by_request: HashMap<String, Vec<PickItemRow>> = HashMap::new();
        for item in all_items {
            by_request.entry(item.request_name.clone()).or_default().push(item);
        }

        Ok(joined
            .into_iter()
            .map(|row| {
                let items = by_request.remove(&row.row.name).unwrap_or_default();
                assemble(row, items)
            })
            .collect())
    }

    /// Count requests matching the filter.
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &PickRequestFilter) -> Result<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM pick_requests r");
        push_filters(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    // =========================================================================
    // Create / delete
    // =========================================================================

    /// Insert a new pending request with its items. The name must already be
    /// canonical; a concurrent duplicate surfaces as `REQUEST_NAME_EXISTS`.
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn create(&mut self, request: &PickRequestCreateDBRequest) -> Result<PickRequestDBResponse> {
        let now = Utc::now();
        let inserted = sqlx::query(
            r#"
            INSERT INTO pick_requests (name, status, priority, notes, created_by, created_at, last_activity_at)
            VALUES (?, 'pending', ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.name)
        .bind(request.priority)
        .bind(request.notes.as_deref())
        .bind(request.created_by)
        .bind(now)
        .bind(now)
        .execute(&mut *self.db)
        .await;

        if let Err(err) = inserted {
            return Err(match crate::db::errors::DbError::from(err) {
                crate::db::errors::DbError::UniqueViolation { .. } => Error::RequestNameExists {
                    name: request.name.clone(),
                },
                other => Error::Database(other),
            });
        }

        for item in &request.items {
            self.insert_item(&request.name, item).await?;
        }

        tracing::info!(name = %request.name, items = request.items.len(), "pick request created");
        self.get_by_name(&request.name).await
    }

    async fn insert_item(&mut self, request_name: &str, item: &ItemCreateDBRequest) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO pick_request_items (request_name, upc, product_name, requested_qty, picked_qty)
            VALUES (?, ?, ?, ?, 0)
            "#,
        )
        .bind(request_name)
        .bind(&item.upc)
        .bind(&item.product_name)
        .bind(item.quantity)
        .execute(&mut *self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => Err(match crate::db::errors::DbError::from(err) {
                crate::db::errors::DbError::UniqueViolation { .. } => Error::Validation {
                    message: format!("Duplicate UPC '{}' in request", item.upc),
                },
                other => Error::Database(other),
            }),
        }
    }

    /// Remove a pending request. Creator or admin only; items cascade.
    #[instrument(skip(self, user), fields(username = %user.username), err)]
    pub async fn delete(&mut self, name: &str, user: &CurrentUser) -> Result<()> {
        let request = self.get_by_name(name).await?;

        if !user.is_admin() && request.created_by != Some(user.id) {
            return Err(Error::Forbidden {
                message: "Only owner or admin can delete".to_string(),
            });
        }

        check_transition(request.status, WorkflowOp::Delete)?;

        sqlx::query("DELETE FROM pick_requests WHERE name = ? AND status = 'pending'")
            .bind(&request.name)
            .execute(&mut *self.db)
            .await?;

        tracing::info!(name = %request.name, by = %user.username, "pick request deleted");
        Ok(())
    }

    // =========================================================================
    // Claim acquisition
    // =========================================================================

    /// Start picking: acquire the claim and move `pending -> in_progress`.
    ///
    /// The conditional UPDATE is the serialization point; see the module docs.
    #[instrument(skip(self, user), fields(username = %user.username), err)]
    pub async fn start(&mut self, name: &str, user: &CurrentUser) -> Result<PickRequestDBResponse> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE pick_requests
            SET status = 'in_progress',
                claimed_by = ?,
                started_at = COALESCE(started_at, ?),
                last_activity_at = ?
            WHERE name = ? AND status = 'pending' AND claimed_by IS NULL
            "#,
        )
        .bind(user.id)
        .bind(now)
        .bind(now)
        .bind(name.to_lowercase())
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.classify_acquisition_failure(name, WorkflowOp::Start).await?);
        }

        tracing::info!(name, by = %user.username, "picking started");
        self.get_by_name(name).await
    }

    /// Resume picking from `paused` (same claimant, or admin) or from
    /// `partially_completed` (any picker). Acquires the claim for the caller.
    #[instrument(skip(self, user), fields(username = %user.username), err)]
    pub async fn resume(&mut self, name: &str, user: &CurrentUser) -> Result<PickRequestDBResponse> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE pick_requests
            SET status = 'in_progress', claimed_by = ?, last_activity_at = ?
            WHERE name = ?
              AND (status = 'partially_completed'
                   OR (status = 'paused' AND (claimed_by = ? OR ?)))
            "#,
        )
        .bind(user.id)
        .bind(now)
        .bind(name.to_lowercase())
        .bind(user.id)
        .bind(user.is_admin())
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.classify_acquisition_failure(name, WorkflowOp::Resume).await?);
        }

        tracing::info!(name, by = %user.username, "picking resumed");
        self.get_by_name(name).await
    }

    /// Explain why a guarded claim acquisition matched no rows.
    async fn classify_acquisition_failure(&mut self, name: &str, op: WorkflowOp) -> Result<Error> {
        let Some(request) = self.load(name).await? else {
            return Ok(Error::RequestNotFound {
                name: name.to_string(),
            });
        };

        // A `start` that lost the race sees the winner's claim regardless of
        // the new status; other acquisitions are "locked" only when the state
        // itself was acceptable and the claim guard was what blocked them.
        let blocked_by_claim = match op {
            WorkflowOp::Start => request.claimed_by.is_some(),
            _ => op.allowed_sources().contains(&request.status) && request.claimed_by.is_some(),
        };

        if blocked_by_claim {
            Ok(Error::RequestLocked {
                locked_by: request.claimant_username.unwrap_or_else(|| "unknown".to_string()),
            })
        } else {
            Ok(Error::InvalidStatus {
                current: request.status.as_str().to_string(),
                expected: op.expected_phrase(),
            })
        }
    }

    // =========================================================================
    // Claimed-state transitions
    // =========================================================================

    /// Pause picking; the claim is kept.
    #[instrument(skip(self, user), fields(username = %user.username), err)]
    pub async fn pause(&mut self, name: &str, user: &CurrentUser) -> Result<PickRequestDBResponse> {
        let request = self.get_by_name(name).await?;
        verify_claim(&request, user)?;

        self.transition(&request.name, request.status, "paused", KeepClaim::Keep).await?;

        tracing::info!(name, by = %user.username, "picking paused");
        self.get_by_name(name).await
    }

    /// Release the claim and return the request to `pending`, preserving item
    /// progress and `started_at`. Claim holder or admin only.
    #[instrument(skip(self, user), fields(username = %user.username), err)]
    pub async fn release(&mut self, name: &str, user: &CurrentUser) -> Result<PickRequestDBResponse> {
        let request = self.get_by_name(name).await?;

        if !user.is_admin() && request.claimed_by != Some(user.id) {
            return Err(Error::Forbidden {
                message: "Only claim holder or admin can release".to_string(),
            });
        }

        check_transition(request.status, WorkflowOp::Release)?;
        self.transition(&request.name, request.status, "pending", KeepClaim::Clear).await?;

        tracing::info!(
            name,
            was_claimed_by = %request.claimant_username.as_deref().unwrap_or("unknown"),
            "claim released"
        );
        self.get_by_name(name).await
    }

    /// Cancel the request. Creator or admin only; legal from any non-terminal
    /// state.
    #[instrument(skip(self, user), fields(username = %user.username), err)]
    pub async fn cancel(&mut self, name: &str, user: &CurrentUser) -> Result<PickRequestDBResponse> {
        let request = self.get_by_name(name).await?;

        if !user.is_admin() && request.created_by != Some(user.id) {
            return Err(Error::Forbidden {
                message: "Only request creator or admin can cancel".to_string(),
            });
        }

        check_transition(request.status, WorkflowOp::Cancel)?;
        self.transition(&request.name, request.status, "cancelled", KeepClaim::Clear).await?;

        tracing::info!(name, by = %user.username, "pick request cancelled");
        self.get_by_name(name).await
    }

    /// Approve a partially completed request as complete. Creator or admin
    /// only. `completed_at` keeps its submission value. An approval note is
    /// appended to the request notes when supplied.
    #[instrument(skip(self, user, notes), fields(username = %user.username), err)]
    pub async fn approve(&mut self, name: &str, user: &CurrentUser, notes: Option<&str>) -> Result<PickRequestDBResponse> {
        let request = self.get_by_name(name).await?;

        if !user.is_admin() && request.created_by != Some(user.id) {
            return Err(Error::Forbidden {
                message: "Only request creator or admin can approve".to_string(),
            });
        }

        check_transition(request.status, WorkflowOp::Approve)?;

        let new_notes = match notes {
            Some(approval) if !approval.trim().is_empty() => {
                let existing = request.notes.as_deref().unwrap_or_default();
                Some(format!("{existing}\n[APPROVED by {}]: {approval}", user.username))
            }
            _ => request.notes.clone(),
        };

        sqlx::query(
            r#"
            UPDATE pick_requests
            SET status = 'completed', claimed_by = NULL, notes = ?, last_activity_at = ?
            WHERE name = ? AND status = 'partially_completed'
            "#,
        )
        .bind(new_notes.as_deref())
        .bind(Utc::now())
        .bind(&request.name)
        .execute(&mut *self.db)
        .await?;

        tracing::info!(name, by = %user.username, "pick request approved");
        self.get_by_name(name).await
    }

    /// Apply a plain status transition with `last_activity_at` stamping.
    async fn transition(&mut self, name: &str, from: RequestStatus, to: &str, claim: KeepClaim) -> Result<()> {
        let query = match claim {
            KeepClaim::Keep => {
                "UPDATE pick_requests SET status = ?, last_activity_at = ? WHERE name = ? AND status = ?"
            }
            KeepClaim::Clear => {
                "UPDATE pick_requests SET status = ?, claimed_by = NULL, last_activity_at = ? WHERE name = ? AND status = ?"
            }
        };

        let result = sqlx::query(query)
            .bind(to)
            .bind(Utc::now())
            .bind(name)
            .bind(from)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            // The row changed underneath us between read and write.
            let current = self
                .load(name)
                .await?
                .map(|r| r.status.as_str().to_string())
                .unwrap_or_else(|| "deleted".to_string());
            return Err(Error::InvalidStatus {
                current,
                expected: from.as_str().to_string(),
            });
        }

        Ok(())
    }

    // =========================================================================
    // Item ledger
    // =========================================================================

    /// Apply a quantity change to one item of an in-progress request held by
    /// the acting claimant. Absolute writes are never clamped; both modes
    /// fail with `QUANTITY_EXCEEDED` (carrying the pre-write remainder) when
    /// the result would exceed the requested quantity.
    #[instrument(skip(self, user, update), fields(username = %user.username), err)]
    pub async fn update_item_quantity(
        &mut self,
        name: &str,
        upc: &str,
        update: QuantityUpdate,
        user: &CurrentUser,
    ) -> Result<PickItemRow> {
        let request = self.get_by_name(name).await?;
        verify_claim(&request, user)?;

        let item = request.item(upc).ok_or_else(|| Error::ItemNotFound { upc: upc.to_string() })?;

        let new_qty = match update {
            QuantityUpdate::Absolute(qty) => {
                if qty < 0 {
                    return Err(Error::Validation {
                        message: "Picked quantity cannot be negative".to_string(),
                    });
                }
                qty
            }
            QuantityUpdate::Increment(step) => {
                if step < 1 {
                    return Err(Error::Validation {
                        message: "Increment must be at least 1".to_string(),
                    });
                }
                item.picked_qty + step
            }
        };

        if new_qty > item.requested_qty {
            return Err(Error::QuantityExceeded {
                remaining: item.remaining(),
            });
        }

        self.write_picked_qty(&request.name, item.id, new_qty).await?;

        let updated = PickItemRow {
            picked_qty: new_qty,
            ..item.clone()
        };
        tracing::info!(
            name,
            upc,
            picked = updated.picked_qty,
            requested = updated.requested_qty,
            "item quantity updated"
        );
        Ok(updated)
    }

    /// Scan-to-count convenience: bump the item by one, silently doing
    /// nothing when it is already fully picked. Returns the item and whether
    /// it changed.
    #[instrument(skip(self, user), fields(username = %user.username), err)]
    pub async fn scan_increment(&mut self, name: &str, upc: &str, user: &CurrentUser) -> Result<(PickItemRow, bool)> {
        let request = self.get_by_name(name).await?;
        verify_claim(&request, user)?;

        let item = request.item(upc).ok_or_else(|| Error::ItemNotFound { upc: upc.to_string() })?;

        if item.picked_qty >= item.requested_qty {
            return Ok((item.clone(), false));
        }

        let new_qty = item.picked_qty + 1;
        self.write_picked_qty(&request.name, item.id, new_qty).await?;

        Ok((
            PickItemRow {
                picked_qty: new_qty,
                ..item.clone()
            },
            true,
        ))
    }

    async fn write_picked_qty(&mut self, request_name: &str, item_id: i64, picked_qty: i64) -> Result<()> {
        sqlx::query("UPDATE pick_request_items SET picked_qty = ? WHERE id = ?")
            .bind(picked_qty)
            .bind(item_id)
            .execute(&mut *self.db)
            .await?;

        sqlx::query("UPDATE pick_requests SET last_activity_at = ? WHERE name = ?")
            .bind(Utc::now())
            .bind(request_name)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// Annotate an item with a shortage reason. Last write wins per item.
    #[instrument(skip(self, user, update), fields(username = %user.username), err)]
    pub async fn set_item_shortage(
        &mut self,
        name: &str,
        upc: &str,
        update: &ShortageUpdate,
        user: &CurrentUser,
    ) -> Result<PickItemRow> {
        let request = self.get_by_name(name).await?;
        verify_claim(&request, user)?;

        let item = request.item(upc).ok_or_else(|| Error::ItemNotFound { upc: upc.to_string() })?;

        if update.reason == ShortageReason::Other
            && update.notes.as_deref().map_or(true, |n| n.trim().is_empty())
        {
            return Err(Error::Validation {
                message: "Shortage notes are required when the reason is 'other'".to_string(),
            });
        }

        sqlx::query("UPDATE pick_request_items SET shortage_reason = ?, shortage_notes = ? WHERE id = ?")
            .bind(update.reason)
            .bind(update.notes.as_deref())
            .bind(item.id)
            .execute(&mut *self.db)
            .await?;

        sqlx::query("UPDATE pick_requests SET last_activity_at = ? WHERE name = ?")
            .bind(Utc::now())
            .bind(&request.name)
            .execute(&mut *self.db)
            .await?;

        tracing::info!(name, upc, reason = ?update.reason, "shortage recorded");

        Ok(PickItemRow {
            shortage_reason: Some(update.reason),
            shortage_notes: update.notes.clone(),
            ..item.clone()
        })
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit an in-progress request held by the caller.
    ///
    /// Fully picked items have any stale shortage annotation cleared first.
    /// Unless `skip_shortage_validation`, every short item must carry a
    /// reason (with notes when the reason is `other`); the first offender is
    /// named in the validation error. The final state is `completed` when
    /// nothing is short (claim cleared) or `partially_completed` otherwise
    /// (claim kept: the submitter stays accountable until approve/release).
    #[instrument(skip(self, user), fields(username = %user.username), err)]
    pub async fn submit(
        &mut self,
        name: &str,
        user: &CurrentUser,
        skip_shortage_validation: bool,
    ) -> Result<PickRequestDBResponse> {
        let request = self.get_by_name(name).await?;
        verify_claim(&request, user)?;

        // Shortage annotations on fully picked items are meaningless now.
        sqlx::query(
            r#"
            UPDATE pick_request_items
            SET shortage_reason = NULL, shortage_notes = NULL
            WHERE request_name = ? AND picked_qty >= requested_qty AND shortage_reason IS NOT NULL
            "#,
        )
        .bind(&request.name)
        .execute(&mut *self.db)
        .await?;

        let short_items: Vec<&PickItemRow> = request.items.iter().filter(|i| i.has_shortage()).collect();
        let has_shortages = !short_items.is_empty();

        if has_shortages && !skip_shortage_validation {
            for item in &short_items {
                match item.shortage_reason {
                    None => {
                        return Err(Error::Validation {
                            message: format!(
                                "Shortage reason required for '{}' (picked {}/{})",
                                item.product_name, item.picked_qty, item.requested_qty
                            ),
                        });
                    }
                    Some(ShortageReason::Other)
                        if item.shortage_notes.as_deref().map_or(true, |n| n.trim().is_empty()) =>
                    {
                        return Err(Error::Validation {
                            message: format!("Shortage notes required for '{}'", item.product_name),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        let (final_status, clear_claim) = if has_shortages {
            (RequestStatus::PartiallyCompleted, false)
        } else {
            (RequestStatus::Completed, true)
        };

        let now = Utc::now();
        let result = sqlx::query(if clear_claim {
            r#"
            UPDATE pick_requests
            SET status = ?, completed_at = ?, last_activity_at = ?, claimed_by = NULL
            WHERE name = ? AND status = 'in_progress'
            "#
        } else {
            r#"
            UPDATE pick_requests
            SET status = ?, completed_at = ?, last_activity_at = ?
            WHERE name = ? AND status = 'in_progress'
            "#
        })
        .bind(final_status)
        .bind(now)
        .bind(now)
        .bind(&request.name)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            let current = self
                .load(name)
                .await?
                .map(|r| r.status.as_str().to_string())
                .unwrap_or_else(|| "deleted".to_string());
            return Err(Error::InvalidStatus {
                current,
                expected: "in_progress".to_string(),
            });
        }

        tracing::info!(name, status = %final_status, by = %user.username, "pick request submitted");
        self.get_by_name(name).await
    }

    // =========================================================================
    // Reaper support
    // =========================================================================

    /// Release every in-progress claim idle since before `threshold`,
    /// preserving `started_at` and item progress. Returns released names.
    #[instrument(skip(self), err)]
    pub async fn release_stale(&mut self, threshold: DateTime<Utc>) -> Result<Vec<String>> {
        let stale: Vec<RequestWithNames> = sqlx::query_as(&format!(
            "{SELECT_WITH_NAMES} WHERE r.status = 'in_progress' AND r.last_activity_at < ?"
        ))
        .bind(threshold)
        .fetch_all(&mut *self.db)
        .await?;

        let mut released = Vec::with_capacity(stale.len());
        for request in stale {
            let result = sqlx::query(
                r#"
                UPDATE pick_requests
                SET status = 'pending', claimed_by = NULL, last_activity_at = ?
                WHERE name = ? AND status = 'in_progress' AND last_activity_at < ?
                "#,
            )
            .bind(Utc::now())
            .bind(&request.row.name)
            .bind(threshold)
            .execute(&mut *self.db)
            .await?;

            if result.rows_affected() > 0 {
                tracing::info!(
                    name = %request.row.name,
                    was_claimed_by = %request.claimant_username.as_deref().unwrap_or("unknown"),
                    idle_since = ?request.row.last_activity_at,
                    "stale claim released"
                );
                released.push(request.row.name);
            }
        }

        Ok(released)
    }

    /// Delete completed requests finished before `threshold`; items cascade.
    #[instrument(skip(self), err)]
    pub async fn purge_completed_before(&mut self, threshold: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM pick_requests WHERE status = 'completed' AND completed_at < ?")
            .bind(threshold)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Which side effect a plain transition applies to the claim column.
enum KeepClaim {
    Keep,
    Clear,
}

/// Verify the acting principal may mutate a claimed request: the request must
/// be in progress and the actor must be the claim holder (admins bypass the
/// identity check, never the state check).
fn verify_claim(request: &PickRequestDBResponse, user: &CurrentUser) -> Result<()> {
    if request.status != RequestStatus::InProgress {
        return Err(Error::InvalidStatus {
            current: request.status.as_str().to_string(),
            expected: "in_progress".to_string(),
        });
    }

    if request.claimed_by != Some(user.id) && !user.is_admin() {
        return Err(Error::RequestLocked {
            locked_by: request.claimant_username.clone().unwrap_or_else(|| "unknown".to_string()),
        });
    }

    Ok(())
}

fn assemble(joined: RequestWithNames, items: Vec<PickItemRow>) -> PickRequestDBResponse {
    PickRequestDBResponse {
        name: joined.row.name,
        status: joined.row.status,
        priority: joined.row.priority,
        notes: joined.row.notes,
        created_by: joined.row.created_by,
        creator_username: joined.creator_username,
        claimed_by: joined.row.claimed_by,
        claimant_username: joined.claimant_username,
        created_at: joined.row.created_at,
        started_at: joined.row.started_at,
        completed_at: joined.row.completed_at,
        last_activity_at: joined.row.last_activity_at,
        items,
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, sqlx::Sqlite>, filter: &PickRequestFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(status) = filter.status {
        qb.push(" AND r.status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND r.priority = ").push_bind(priority);
    }
    if let Some(created_by) = filter.created_by {
        qb.push(" AND r.created_by = ").push_bind(created_by);
    }
}
