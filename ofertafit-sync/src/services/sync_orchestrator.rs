//! Price sync orchestrator
//!
//! The scheduled job. One run: take the cross-process lock, select eligible
//! items, poll them strictly sequentially through the rate limiter and the
//! update policy, persist every decision, finalize the run record, release
//! the lock.
//!
//! Failure containment: a single item can never abort the run. Expected
//! transport outcomes are data handled by the policy; an unexpected failure
//! (persistence write, missing provider) triggers a conservative fallback
//! write so the item is rescheduled rather than stuck, and the loop moves
//! on. Only lock acquisition and the eligibility query are run-fatal.
//!
//! Items are processed one at a time on purpose: the shared token bucket
//! assumes sequential consumption, and the inter-item jitter keeps request
//! spacing irregular on top of the bucket's rate ceiling.

use chrono::{Duration as ChronoDuration, Utc};
use ofertafit_common::config::SyncConfig;
use ofertafit_common::models::{RunCounters, RunRecord, TrackedItem};
use ofertafit_common::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::db;
use crate::services::marketplace::{FetchOutcome, ProviderRegistry};
use crate::services::notifier::Notifier;
use crate::services::rate_limiter::TokenBucketLimiter;
use crate::services::run_lock::RunLock;
use crate::services::update_policy::{self, RECHECK_BACKOFF};

/// Per-run overrides accepted by the trigger endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunOverrides {
    pub batch_size: Option<u32>,
    /// Ignore each item's schedule; paused items stay excluded
    pub force: bool,
    pub max_continuations: Option<u32>,
    pub max_runtime_ms: Option<u64>,
    pub skip_notifications: bool,
}

/// What a triggered run produced
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunReport {
    /// Run executed; statistics attached
    Completed(RunRecord),
    /// Another run holds the lock. Expected under a frequent scheduler
    /// trigger, not an error.
    LockHeld { run_id: Uuid },
}

/// The scheduled price-sync job
pub struct SyncOrchestrator {
    db: SqlitePool,
    registry: Arc<ProviderRegistry>,
    notifier: Arc<dyn Notifier>,
    config: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(
        db: SqlitePool,
        registry: Arc<ProviderRegistry>,
        notifier: Arc<dyn Notifier>,
        config: SyncConfig,
    ) -> Self {
        Self {
            db,
            registry,
            notifier,
            config,
        }
    }

    /// Execute one sync run
    pub async fn run(&self, overrides: &RunOverrides) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let holder_id = run_id.to_string();
        let lock = RunLock::new(self.db.clone(), self.config.lock_ttl_seconds);

        if !lock.acquire(&holder_id).await? {
            tracing::info!(run_id = %run_id, "Sync lock held by another run, exiting");
            return Ok(RunReport::LockHeld { run_id });
        }

        let result = self.run_locked(run_id, overrides).await;

        // Guaranteed-cleanup path: the lock is released whatever the body did
        if let Err(e) = lock.release(&holder_id).await {
            tracing::warn!(run_id = %run_id, error = %e, "Failed to release sync lock");
        }

        let record = result?;

        if !overrides.skip_notifications && !self.config.notify_recipients.is_empty() {
            let html = render_run_summary(&record);
            if let Err(e) = self
                .notifier
                .send(&html, &self.config.notify_recipients)
                .await
            {
                tracing::warn!(run_id = %run_id, error = %e, "Run summary notification failed");
            }
        }

        Ok(RunReport::Completed(record))
    }

    async fn run_locked(&self, run_id: Uuid, overrides: &RunOverrides) -> Result<RunRecord> {
        let started = Instant::now();
        let now = Utc::now();

        let mut record = RunRecord::new(run_id, now);
        db::runs::insert_run(&self.db, &record).await?;

        let batch_size = overrides.batch_size.unwrap_or(self.config.batch_size);
        let max_continuations = overrides
            .max_continuations
            .unwrap_or(self.config.max_continuations);
        let max_runtime =
            Duration::from_millis(overrides.max_runtime_ms.unwrap_or(self.config.max_runtime_ms));

        record.eligible = db::items::count_eligible(&self.db, now, overrides.force).await?;

        tracing::info!(
            run_id = %run_id,
            eligible = record.eligible,
            batch_size,
            force = overrides.force,
            "Sync run started"
        );

        // One limiter instance per run, shared by every outbound call below
        let limiter =
            TokenBucketLimiter::new(self.config.rate_per_minute, self.config.rate_capacity);
        let credential = db::settings::resolve_marketplace_token(&self.db).await?;
        let timeout = Duration::from_millis(self.config.request_timeout_ms);

        let mut continuation = 0u32;
        'batches: loop {
            let batch =
                db::items::fetch_eligible(&self.db, Utc::now(), batch_size, overrides.force)
                    .await?;
            if batch.is_empty() {
                break;
            }
            let batch_len = batch.len() as u32;

            for item in &batch {
                if started.elapsed() >= max_runtime {
                    tracing::warn!(run_id = %run_id, "Run hit its runtime budget, stopping early");
                    break 'batches;
                }

                self.poll_item(item, &limiter, credential.as_deref(), timeout, overrides, &mut record)
                    .await;

                // Irregular spacing between items, independent of the bucket
                let jitter = rand::thread_rng()
                    .gen_range(self.config.jitter_min_ms..=self.config.jitter_max_ms);
                tokio::time::sleep(Duration::from_millis(jitter)).await;
            }

            if batch_len < batch_size || continuation >= max_continuations {
                break;
            }
            continuation += 1;
        }

        record.finished_at = Some(Utc::now());
        db::runs::finalize_run(&self.db, &record).await?;

        tracing::info!(
            run_id = %run_id,
            processed = record.processed,
            skipped = record.skipped,
            updated = record.counters.updated,
            not_modified = record.counters.not_modified,
            not_found = record.counters.not_found,
            backoffs = record.counters.forbidden
                + record.counters.rate_limited
                + record.counters.timeouts,
            unknown_errors = record.counters.unknown_errors,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sync run completed"
        );

        Ok(record)
    }

    /// Poll one item; never lets a failure escape to the batch loop
    async fn poll_item(
        &self,
        item: &TrackedItem,
        limiter: &TokenBucketLimiter,
        credential: Option<&str>,
        timeout: Duration,
        overrides: &RunOverrides,
        record: &mut RunRecord,
    ) {
        // Re-verify the schedule at dequeue time: the eligibility query ran
        // earlier, and this field is the only duplicate-work guard if two
        // runs ever overlap during a lock-expiry race.
        if !overrides.force && item.next_check_at > Utc::now() {
            record.skipped += 1;
            return;
        }

        let waited_ms = limiter.consume(1).await;
        record.processed += 1;

        match self.poll_item_inner(item, credential, timeout).await {
            Ok(outcome) => {
                count_outcome(&mut record.counters, &outcome);
                tracing::debug!(
                    item_id = %item.id,
                    external_id = %item.external_id,
                    outcome = outcome.label(),
                    waited_ms,
                    "Item polled"
                );
            }
            Err(e) => {
                record.counters.unknown_errors += 1;
                tracing::warn!(
                    item_id = %item.id,
                    external_id = %item.external_id,
                    error = %e,
                    "Item poll failed, applying fallback backoff"
                );

                let now = Utc::now();
                let next = now + ChronoDuration::hours(RECHECK_BACKOFF);
                if let Err(e) = db::items::touch_backoff(&self.db, &item.id, now, next).await {
                    tracing::error!(
                        item_id = %item.id,
                        error = %e,
                        "Fallback write failed; item keeps its previous schedule"
                    );
                }
            }
        }
    }

    async fn poll_item_inner(
        &self,
        item: &TrackedItem,
        credential: Option<&str>,
        timeout: Duration,
    ) -> Result<FetchOutcome> {
        let provider = self
            .registry
            .resolve(&item.marketplace)
            .ok_or_else(|| ofertafit_common::Error::UnknownMarketplace(item.marketplace.clone()))?;

        let outcome = provider
            .fetch_item(&item.external_id, item.etag.as_deref(), credential, timeout)
            .await;

        let now = Utc::now();
        let decision = update_policy::apply(item, &outcome, now);
        db::items::apply_update(&self.db, &item.id, &decision, now).await?;

        Ok(outcome)
    }
}

/// Map one fetch outcome onto the run counters
fn count_outcome(counters: &mut RunCounters, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Fresh { price: Some(_), .. } => counters.updated += 1,
        FetchOutcome::NotModified => counters.not_modified += 1,
        FetchOutcome::Forbidden => counters.forbidden += 1,
        FetchOutcome::RateLimited => counters.rate_limited += 1,
        FetchOutcome::NotFound => counters.not_found += 1,
        FetchOutcome::Timeout => counters.timeouts += 1,
        FetchOutcome::Fresh { price: None, .. }
        | FetchOutcome::HttpError(_)
        | FetchOutcome::Transport(_) => counters.unknown_errors += 1,
    }
}

/// Minimal HTML body for the post-run notification
fn render_run_summary(record: &RunRecord) -> String {
    format!(
        "<h2>Sync run {}</h2>\
         <p>{} eligible, {} processed, {} skipped</p>\
         <ul>\
         <li>updated: {}</li>\
         <li>not modified: {}</li>\
         <li>not found: {}</li>\
         <li>forbidden: {}</li>\
         <li>rate limited: {}</li>\
         <li>timeouts: {}</li>\
         <li>unknown errors: {}</li>\
         </ul>",
        record.run_id,
        record.eligible,
        record.processed,
        record.skipped,
        record.counters.updated,
        record.counters.not_modified,
        record.counters.not_found,
        record.counters.forbidden,
        record.counters.rate_limited,
        record.counters.timeouts,
        record.counters.unknown_errors,
    )
}

/// Spawn the recurring scheduler loop
///
/// The first interval tick fires immediately and is consumed, so scheduled
/// runs start one full interval after boot. Lock contention inside `run` is
/// already handled as a normal report.
pub fn spawn_scheduler(
    orchestrator: Arc<SyncOrchestrator>,
    interval_minutes: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(interval_minutes.max(1) * 60);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            interval.tick().await;
            match orchestrator.run(&RunOverrides::default()).await {
                Ok(RunReport::Completed(record)) => {
                    tracing::info!(
                        run_id = %record.run_id,
                        processed = record.processed,
                        "Scheduled sync run finished"
                    );
                }
                Ok(RunReport::LockHeld { run_id }) => {
                    tracing::info!(run_id = %run_id, "Scheduled sync run skipped (lock held)");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Scheduled sync run failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofertafit_common::models::ListingStatus;

    #[test]
    fn test_count_outcome_maps_every_class() {
        let mut counters = RunCounters::default();

        count_outcome(
            &mut counters,
            &FetchOutcome::Fresh {
                price: Some(10.0),
                status: ListingStatus::Active,
                etag: None,
            },
        );
        count_outcome(&mut counters, &FetchOutcome::NotModified);
        count_outcome(&mut counters, &FetchOutcome::Forbidden);
        count_outcome(&mut counters, &FetchOutcome::RateLimited);
        count_outcome(&mut counters, &FetchOutcome::NotFound);
        count_outcome(&mut counters, &FetchOutcome::Timeout);
        count_outcome(&mut counters, &FetchOutcome::HttpError(500));
        count_outcome(
            &mut counters,
            &FetchOutcome::Fresh {
                price: None,
                status: ListingStatus::Active,
                etag: None,
            },
        );

        assert_eq!(counters.updated, 1);
        assert_eq!(counters.not_modified, 1);
        assert_eq!(counters.forbidden, 1);
        assert_eq!(counters.rate_limited, 1);
        assert_eq!(counters.not_found, 1);
        assert_eq!(counters.timeouts, 1);
        assert_eq!(counters.unknown_errors, 2);
    }

    #[test]
    fn test_run_summary_lists_counters() {
        let mut record = RunRecord::new(Uuid::new_v4(), Utc::now());
        record.eligible = 5;
        record.processed = 4;
        record.counters.updated = 3;
        record.counters.timeouts = 1;

        let html = render_run_summary(&record);
        assert!(html.contains("5 eligible"));
        assert!(html.contains("updated: 3"));
        assert!(html.contains("timeouts: 1"));
    }
}
