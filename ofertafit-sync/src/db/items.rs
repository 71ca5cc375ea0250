//! Tracked-item queries
//!
//! Eligibility selection and the partial update write produced by the
//! update policy. `COALESCE` keeps untouched columns at their current
//! value, so a backoff decision only ever moves `last_sync` and
//! `next_check_at`.

use chrono::{DateTime, Utc};
use ofertafit_common::models::{ListingStatus, TrackedItem};
use ofertafit_common::Result;
use sqlx::SqlitePool;

use crate::services::update_policy::PolicyDecision;

type ItemRow = (
    String,                  // id
    String,                  // external_id
    String,                  // marketplace
    String,                  // title
    f64,                     // price
    f64,                     // original_price
    Option<f64>,             // previous_price
    i64,                     // discount_percentage
    Option<f64>,             // detected_price
    Option<DateTime<Utc>>,   // detected_at
    Option<String>,          // etag
    String,                  // status
    DateTime<Utc>,           // next_check_at
    Option<DateTime<Utc>>,   // last_sync
);

const ITEM_COLUMNS: &str = "id, external_id, marketplace, title, price, original_price, \
     previous_price, discount_percentage, detected_price, detected_at, etag, status, \
     next_check_at, last_sync";

fn item_from_row(row: ItemRow) -> Result<TrackedItem> {
    Ok(TrackedItem {
        id: row.0,
        external_id: row.1,
        marketplace: row.2,
        title: row.3,
        price: row.4,
        original_price: row.5,
        previous_price: row.6,
        discount_percentage: row.7,
        detected_price: row.8,
        detected_at: row.9,
        etag: row.10,
        status: ListingStatus::parse(&row.11)?,
        next_check_at: row.12,
        last_sync: row.13,
    })
}

/// Items due for a poll: never paused, schedule elapsed, oldest first
///
/// `force` drops the schedule filter but still excludes paused items.
pub async fn fetch_eligible(
    db: &SqlitePool,
    now: DateTime<Utc>,
    limit: u32,
    force: bool,
) -> Result<Vec<TrackedItem>> {
    let query = if force {
        format!(
            "SELECT {} FROM tracked_items WHERE status != 'paused'
             ORDER BY next_check_at ASC LIMIT ?",
            ITEM_COLUMNS
        )
    } else {
        format!(
            "SELECT {} FROM tracked_items WHERE status != 'paused' AND next_check_at <= ?
             ORDER BY next_check_at ASC LIMIT ?",
            ITEM_COLUMNS
        )
    };

    let mut q = sqlx::query_as::<_, ItemRow>(&query);
    if !force {
        q = q.bind(now);
    }
    let rows = q.bind(limit).fetch_all(db).await?;

    rows.into_iter().map(item_from_row).collect()
}

/// Count of items matching the eligibility filter
pub async fn count_eligible(db: &SqlitePool, now: DateTime<Utc>, force: bool) -> Result<u32> {
    let count: i64 = if force {
        sqlx::query_scalar("SELECT COUNT(*) FROM tracked_items WHERE status != 'paused'")
            .fetch_one(db)
            .await?
    } else {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM tracked_items WHERE status != 'paused' AND next_check_at <= ?",
        )
        .bind(now)
        .fetch_one(db)
        .await?
    };
    Ok(count.max(0) as u32)
}

/// Persist one policy decision
pub async fn apply_update(
    db: &SqlitePool,
    item_id: &str,
    decision: &PolicyDecision,
    now: DateTime<Utc>,
) -> Result<()> {
    let update = &decision.update;
    sqlx::query(
        r#"
        UPDATE tracked_items SET
            price = COALESCE(?, price),
            previous_price = COALESCE(?, previous_price),
            original_price = COALESCE(?, original_price),
            discount_percentage = COALESCE(?, discount_percentage),
            detected_price = COALESCE(?, detected_price),
            detected_at = COALESCE(?, detected_at),
            status = COALESCE(?, status),
            etag = COALESCE(?, etag),
            last_sync = ?,
            next_check_at = ?
        WHERE id = ?
        "#,
    )
    .bind(update.price)
    .bind(update.previous_price)
    .bind(update.original_price)
    .bind(update.discount_percentage)
    .bind(update.detected_price)
    .bind(update.detected_at)
    .bind(update.status.map(|s| s.as_str()))
    .bind(update.etag.as_deref())
    .bind(now)
    .bind(decision.next_check_at)
    .bind(item_id)
    .execute(db)
    .await?;

    Ok(())
}

/// Conservative fallback write after an unexpected per-item failure
///
/// Only `last_sync` and `next_check_at` move, so the item is never stuck.
pub async fn touch_backoff(
    db: &SqlitePool,
    item_id: &str,
    now: DateTime<Utc>,
    next_check_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE tracked_items SET last_sync = ?, next_check_at = ? WHERE id = ?")
        .bind(now)
        .bind(next_check_at)
        .bind(item_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Insert a freshly admitted listing
pub async fn insert_new(db: &SqlitePool, item: &TrackedItem, now: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tracked_items (
            id, external_id, marketplace, title, price, original_price, previous_price,
            discount_percentage, detected_price, detected_at, etag, status,
            next_check_at, last_sync, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&item.id)
    .bind(&item.external_id)
    .bind(&item.marketplace)
    .bind(&item.title)
    .bind(item.price)
    .bind(item.original_price)
    .bind(item.previous_price)
    .bind(item.discount_percentage)
    .bind(item.detected_price)
    .bind(item.detected_at)
    .bind(item.etag.as_deref())
    .bind(item.status.as_str())
    .bind(item.next_check_at)
    .bind(item.last_sync)
    .bind(now)
    .execute(db)
    .await?;
    Ok(())
}

/// Fetch one item by id (tests and diagnostics)
pub async fn fetch_by_id(db: &SqlitePool, item_id: &str) -> Result<Option<TrackedItem>> {
    let query = format!("SELECT {} FROM tracked_items WHERE id = ?", ITEM_COLUMNS);
    let row = sqlx::query_as::<_, ItemRow>(&query)
        .bind(item_id)
        .fetch_optional(db)
        .await?;

    row.map(item_from_row).transpose()
}
