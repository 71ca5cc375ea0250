//! Cross-process run lock
//!
//! A keyed row in `sync_locks` with a TTL. Acquisition is one conditional
//! upsert: the insert wins outright, and an existing row is taken over only
//! when its expiry has passed. A crashed run therefore blocks the system
//! for at most one TTL; there are no heartbeats.

use chrono::{Duration, Utc};
use ofertafit_common::Result;
use sqlx::SqlitePool;

/// Lock key used by the price sync job
pub const PRICE_SYNC_LOCK: &str = "price_sync_run";

/// TTL-guarded mutex over a `sync_locks` row
pub struct RunLock {
    db: SqlitePool,
    lock_key: String,
    ttl: Duration,
}

impl RunLock {
    pub fn new(db: SqlitePool, ttl_seconds: i64) -> Self {
        Self::with_key(db, PRICE_SYNC_LOCK, ttl_seconds)
    }

    pub fn with_key(db: SqlitePool, lock_key: &str, ttl_seconds: i64) -> Self {
        Self {
            db,
            lock_key: lock_key.to_string(),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Try to take the lock for `holder_id`
    ///
    /// Succeeds when no row exists or the existing holder's TTL has passed.
    /// One atomic statement; concurrent callers cannot both win.
    pub async fn acquire(&self, holder_id: &str) -> Result<bool> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let result = sqlx::query(
            r#"
            INSERT INTO sync_locks (lock_key, holder_id, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(lock_key) DO UPDATE
                SET holder_id = excluded.holder_id,
                    expires_at = excluded.expires_at
                WHERE sync_locks.expires_at <= ?
            "#,
        )
        .bind(&self.lock_key)
        .bind(holder_id)
        .bind(expires_at)
        .bind(now)
        .execute(&self.db)
        .await?;

        let acquired = result.rows_affected() == 1;
        if acquired {
            tracing::debug!(lock_key = %self.lock_key, holder_id = %holder_id, "Lock acquired");
        }
        Ok(acquired)
    }

    /// Release the lock held by `holder_id`
    ///
    /// Succeeds when the caller is the current holder, or when the lock is
    /// already absent. Another holder's lock is left untouched.
    pub async fn release(&self, holder_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sync_locks WHERE lock_key = ? AND holder_id = ?")
            .bind(&self.lock_key)
            .bind(holder_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 1 {
            tracing::debug!(lock_key = %self.lock_key, holder_id = %holder_id, "Lock released");
            return Ok(true);
        }

        // Absent lock counts as released; a row held by someone else does not
        let holder: Option<(String,)> =
            sqlx::query_as("SELECT holder_id FROM sync_locks WHERE lock_key = ?")
                .bind(&self.lock_key)
                .fetch_optional(&self.db)
                .await?;

        Ok(holder.is_none())
    }
}
