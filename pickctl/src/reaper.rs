//! Background maintenance daemon: releases idle claims and evicts aged
//! completions.
//!
//! One long-running task, woken on a configurable interval. Each pass uses
//! its own short transaction; no state is shared with operator requests.
//! Missed ticks are not compensated - the next pass does as much work as is
//! needed. The task cancels cooperatively at shutdown.

use crate::config::Config;
use crate::db::handlers::PickRequests;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Result of a single maintenance pass.
#[derive(Debug, Default)]
pub struct ReaperPass {
    /// Names of requests whose stale claims were released.
    pub released: Vec<String>,
    /// Number of aged completed requests purged.
    pub purged: u64,
}

/// Background maintenance task over the request store.
#[derive(Clone)]
pub struct Reaper {
    pool: SqlitePool,
    config: Config,
}

impl Reaper {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        Self { pool, config }
    }

    /// Spawn the maintenance loop. It sleeps for the configured interval,
    /// runs a pass (unless cleanup is disabled), and repeats until the
    /// shutdown token fires.
    pub fn spawn(self, shutdown_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let interval = std::time::Duration::from_secs(self.config.cleanup_interval_minutes as u64 * 60);
            tracing::info!(
                interval_minutes = self.config.cleanup_interval_minutes,
                "reaper task started"
            );

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown_token.cancelled() => {
                        tracing::info!("shutdown signal received, stopping reaper");
                        break;
                    }
                }

                if !self.config.auto_cleanup_enabled {
                    continue;
                }

                match self.run_once().await {
                    Ok(pass) => {
                        if !pass.released.is_empty() || pass.purged > 0 {
                            tracing::info!(
                                released = pass.released.len(),
                                purged = pass.purged,
                                "cleanup pass finished"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!("cleanup pass failed: {e:#}");
                    }
                }
            }
        })
    }

    /// Run one maintenance pass: release claims idle longer than the pick
    /// timeout, then purge completions older than the retention window.
    pub async fn run_once(&self) -> anyhow::Result<ReaperPass> {
        let now = Utc::now();
        let idle_threshold = now - Duration::minutes(self.config.pick_timeout_minutes);
        let retain_threshold = now - Duration::hours(self.config.auto_cleanup_hours);

        let mut tx = self.pool.begin().await?;
        let mut repo = PickRequests::new(&mut tx);

        let released = repo.release_stale(idle_threshold).await?;
        let purged = repo.purge_completed_before(retain_threshold).await?;

        tx.commit().await?;

        Ok(ReaperPass { released, purged })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::pick_requests::QuantityUpdate;
    use crate::test_utils::{create_request, seed_user, test_config, test_pool};
    use crate::workflow::RequestStatus;
    use crate::api::models::users::Role;

    #[tokio::test]
    async fn test_idle_claim_released_with_progress_preserved() {
        let (pool, _guard) = test_pool().await;
        let alice = seed_user(&pool, "alice", Role::Requester).await;
        let bob = seed_user(&pool, "bob", Role::Picker).await;
        create_request(&pool, "idle-req", &alice, &[("100", "Widget", 5)]).await;

        {
            let mut tx = pool.begin().await.unwrap();
            let mut repo = PickRequests::new(&mut tx);
            repo.start("idle-req", &bob).await.unwrap();
            repo.update_item_quantity("idle-req", "100", QuantityUpdate::Increment(2), &bob)
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        // Backdate the activity stamp past the idle threshold.
        sqlx::query("UPDATE pick_requests SET last_activity_at = ? WHERE name = ?")
            .bind(Utc::now() - Duration::minutes(45))
            .bind("idle-req")
            .execute(&pool)
            .await
            .unwrap();

        let reaper = Reaper::new(pool.clone(), test_config());
        let pass = reaper.run_once().await.unwrap();
        assert_eq!(pass.released, vec!["idle-req".to_string()]);

        let mut conn = pool.acquire().await.unwrap();
        let request = PickRequests::new(&mut conn).get_by_name("idle-req").await.unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.claimed_by, None);
        // Progress and started_at survive the release.
        assert!(request.started_at.is_some());
        assert_eq!(request.items[0].picked_qty, 2);
    }

    #[tokio::test]
    async fn test_fresh_claim_not_released() {
        let (pool, _guard) = test_pool().await;
        let alice = seed_user(&pool, "alice", Role::Requester).await;
        let bob = seed_user(&pool, "bob", Role::Picker).await;
        create_request(&pool, "fresh-req", &alice, &[("100", "Widget", 5)]).await;

        {
            let mut tx = pool.begin().await.unwrap();
            PickRequests::new(&mut tx).start("fresh-req", &bob).await.unwrap();
            tx.commit().await.unwrap();
        }

        let reaper = Reaper::new(pool.clone(), test_config());
        let pass = reaper.run_once().await.unwrap();
        assert!(pass.released.is_empty());

        let mut conn = pool.acquire().await.unwrap();
        let request = PickRequests::new(&mut conn).get_by_name("fresh-req").await.unwrap();
        assert_eq!(request.status, RequestStatus::InProgress);
    }

    #[tokio::test]
    async fn test_aged_completion_purged_and_recent_kept() {
        let (pool, _guard) = test_pool().await;
        let alice = seed_user(&pool, "alice", Role::Requester).await;
        let bob = seed_user(&pool, "bob", Role::Picker).await;
        create_request(&pool, "old-done", &alice, &[("100", "Widget", 1)]).await;
        create_request(&pool, "new-done", &alice, &[("200", "Gadget", 1)]).await;

        for name in ["old-done", "new-done"] {
            let mut tx = pool.begin().await.unwrap();
            let mut repo = PickRequests::new(&mut tx);
            repo.start(name, &bob).await.unwrap();
            let upc = if name == "old-done" { "100" } else { "200" };
            repo.update_item_quantity(name, upc, QuantityUpdate::Increment(1), &bob)
                .await
                .unwrap();
            repo.submit(name, &bob, false).await.unwrap();
            tx.commit().await.unwrap();
        }

        sqlx::query("UPDATE pick_requests SET completed_at = ? WHERE name = 'old-done'")
            .bind(Utc::now() - Duration::hours(30))
            .execute(&pool)
            .await
            .unwrap();

        let reaper = Reaper::new(pool.clone(), test_config());
        let pass = reaper.run_once().await.unwrap();
        assert_eq!(pass.purged, 1);

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PickRequests::new(&mut conn);
        assert!(repo.get_by_name("old-done").await.is_err());
        assert!(repo.get_by_name("new-done").await.is_ok());

        // Items cascade with the purged request.
        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pick_request_items WHERE request_name = 'old-done'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_paused_requests_are_not_reaped() {
        let (pool, _guard) = test_pool().await;
        let alice = seed_user(&pool, "alice", Role::Requester).await;
        let bob = seed_user(&pool, "bob", Role::Picker).await;
        create_request(&pool, "paused-req", &alice, &[("100", "Widget", 5)]).await;

        {
            let mut tx = pool.begin().await.unwrap();
            let mut repo = PickRequests::new(&mut tx);
            repo.start("paused-req", &bob).await.unwrap();
            repo.pause("paused-req", &bob).await.unwrap();
            tx.commit().await.unwrap();
        }

        sqlx::query("UPDATE pick_requests SET last_activity_at = ? WHERE name = ?")
            .bind(Utc::now() - Duration::minutes(500))
            .bind("paused-req")
            .execute(&pool)
            .await
            .unwrap();

        let reaper = Reaper::new(pool.clone(), test_config());
        let pass = reaper.run_once().await.unwrap();
        assert!(pass.released.is_empty());

        let mut conn = pool.acquire().await.unwrap();
        let request = PickRequests::new(&mut conn).get_by_name("paused-req").await.unwrap();
        assert_eq!(request.status, RequestStatus::Paused);
        assert_eq!(request.claimed_by, Some(bob.id));
    }
}
