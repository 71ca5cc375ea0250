//! Sync run persistence
//!
//! One row per run: created at run start, finalized once at run end, never
//! touched again.

use chrono::{DateTime, Utc};
use ofertafit_common::models::{RunCounters, RunRecord};
use ofertafit_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

type RunRow = (
    String,                // run_id
    DateTime<Utc>,         // started_at
    Option<DateTime<Utc>>, // finished_at
    i64,                   // eligible
    i64,                   // processed
    i64,                   // skipped
    i64,                   // updated
    i64,                   // not_modified
    i64,                   // forbidden
    i64,                   // rate_limited
    i64,                   // not_found
    i64,                   // timeouts
    i64,                   // unknown_errors
);

fn run_from_row(row: RunRow) -> Result<RunRecord> {
    Ok(RunRecord {
        run_id: Uuid::parse_str(&row.0)
            .map_err(|e| Error::Internal(format!("Bad run id in sync_runs: {}", e)))?,
        started_at: row.1,
        finished_at: row.2,
        eligible: row.3 as u32,
        processed: row.4 as u32,
        skipped: row.5 as u32,
        counters: RunCounters {
            updated: row.6 as u32,
            not_modified: row.7 as u32,
            forbidden: row.8 as u32,
            rate_limited: row.9 as u32,
            not_found: row.10 as u32,
            timeouts: row.11 as u32,
            unknown_errors: row.12 as u32,
        },
    })
}

/// Create the run row at run start
pub async fn insert_run(db: &SqlitePool, record: &RunRecord) -> Result<()> {
    sqlx::query("INSERT INTO sync_runs (run_id, started_at) VALUES (?, ?)")
        .bind(record.run_id.to_string())
        .bind(record.started_at)
        .execute(db)
        .await?;
    Ok(())
}

/// Finalize the run row with its counters; the row is immutable afterwards
pub async fn finalize_run(db: &SqlitePool, record: &RunRecord) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE sync_runs SET
            finished_at = ?,
            eligible = ?,
            processed = ?,
            skipped = ?,
            updated = ?,
            not_modified = ?,
            forbidden = ?,
            rate_limited = ?,
            not_found = ?,
            timeouts = ?,
            unknown_errors = ?
        WHERE run_id = ?
        "#,
    )
    .bind(record.finished_at)
    .bind(record.eligible)
    .bind(record.processed)
    .bind(record.skipped)
    .bind(record.counters.updated)
    .bind(record.counters.not_modified)
    .bind(record.counters.forbidden)
    .bind(record.counters.rate_limited)
    .bind(record.counters.not_found)
    .bind(record.counters.timeouts)
    .bind(record.counters.unknown_errors)
    .bind(record.run_id.to_string())
    .execute(db)
    .await?;
    Ok(())
}

/// Most recent runs, newest first
pub async fn recent_runs(db: &SqlitePool, limit: u32) -> Result<Vec<RunRecord>> {
    let rows = sqlx::query_as::<_, RunRow>(
        "SELECT run_id, started_at, finished_at, eligible, processed, skipped, updated,
                not_modified, forbidden, rate_limited, not_found, timeouts, unknown_errors
         FROM sync_runs ORDER BY started_at DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db)
    .await?;

    rows.into_iter().map(run_from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofertafit_common::db::init_tables;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_insert_and_finalize_roundtrip() {
        let pool = setup_test_db().await;

        let mut record = RunRecord::new(Uuid::new_v4(), Utc::now());
        insert_run(&pool, &record).await.unwrap();

        record.eligible = 12;
        record.processed = 10;
        record.skipped = 2;
        record.counters.updated = 6;
        record.counters.not_modified = 3;
        record.counters.timeouts = 1;
        record.finished_at = Some(Utc::now());
        finalize_run(&pool, &record).await.unwrap();

        let runs = recent_runs(&pool, 5).await.unwrap();
        assert_eq!(runs.len(), 1);
        let reloaded = &runs[0];
        assert_eq!(reloaded.run_id, record.run_id);
        assert_eq!(reloaded.eligible, 12);
        assert_eq!(reloaded.processed, 10);
        assert_eq!(reloaded.skipped, 2);
        assert_eq!(reloaded.counters.updated, 6);
        assert_eq!(reloaded.counters.not_modified, 3);
        assert_eq!(reloaded.counters.timeouts, 1);
        assert!(reloaded.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_recent_runs_newest_first() {
        let pool = setup_test_db().await;
        let base = Utc::now();

        for offset in 0..3 {
            let record = RunRecord::new(
                Uuid::new_v4(),
                base - chrono::Duration::minutes(offset),
            );
            insert_run(&pool, &record).await.unwrap();
        }

        let runs = recent_runs(&pool, 2).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs[0].started_at >= runs[1].started_at);
    }
}
