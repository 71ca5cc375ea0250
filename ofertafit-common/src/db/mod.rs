//! Database access for ofertafit services
//!
//! Pool initialization plus table bootstrap. Tables are created on first
//! connect; there is no separate migration tooling.

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to the shared SQLite database, creating the file and the parent
/// directory when missing, then bootstraps the engine's tables.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the engine's tables if they don't exist
///
/// Also used by tests against in-memory pools.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracked_items (
            id TEXT PRIMARY KEY,
            external_id TEXT NOT NULL,
            marketplace TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            price REAL NOT NULL DEFAULT 0,
            original_price REAL NOT NULL DEFAULT 0,
            previous_price REAL,
            discount_percentage INTEGER NOT NULL DEFAULT 0,
            detected_price REAL,
            detected_at TEXT,
            etag TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            next_check_at TEXT NOT NULL,
            last_sync TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tracked_items_eligibility
         ON tracked_items (status, next_check_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_runs (
            run_id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            eligible INTEGER NOT NULL DEFAULT 0,
            processed INTEGER NOT NULL DEFAULT 0,
            skipped INTEGER NOT NULL DEFAULT 0,
            updated INTEGER NOT NULL DEFAULT 0,
            not_modified INTEGER NOT NULL DEFAULT 0,
            forbidden INTEGER NOT NULL DEFAULT 0,
            rate_limited INTEGER NOT NULL DEFAULT 0,
            not_found INTEGER NOT NULL DEFAULT 0,
            timeouts INTEGER NOT NULL DEFAULT 0,
            unknown_errors INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_locks (
            lock_key TEXT PRIMARY KEY,
            holder_id TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_items (
            id TEXT PRIMARY KEY,
            external_id TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            brand TEXT,
            category TEXT NOT NULL,
            price REAL NOT NULL DEFAULT 0,
            score INTEGER NOT NULL DEFAULT 0,
            review_status TEXT NOT NULL DEFAULT 'published',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!(
        "Database tables initialized (tracked_items, sync_runs, sync_locks, catalog_items, settings)"
    );

    Ok(())
}
