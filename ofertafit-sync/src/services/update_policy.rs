//! Poll-outcome update policy
//!
//! Pure state machine mapping one fetch outcome to the persistence update
//! and the next check time for a tracked item. Keyed entirely on the
//! outcome:
//!
//! | Outcome                  | Action       | Next check |
//! |--------------------------|--------------|------------|
//! | 304                      | not_modified | +6h        |
//! | 200 with numeric price   | updated      | +6h        |
//! | 404                      | not_found    | +24h       |
//! | 403 / 429 / timeout      | backoff      | +12h       |
//! | anything else            | error        | +12h       |
//!
//! 6h is the healthy keep-watching cadence; 24h avoids hammering a vanished
//! listing id; 12h absorbs transient throttling or bot defense without
//! abandoning the item. `original_price` is a monotonically non-decreasing
//! ceiling over successful reads, so a discount computed against it never
//! understates savings relative to the highest observed price.
//! `detected_at` is stamped only on an actual price delta and answers "when
//! did the price last change", not "when was it last checked".

use chrono::{DateTime, Duration, Utc};
use ofertafit_common::models::{ListingStatus, TrackedItem};

use super::marketplace::FetchOutcome;

/// Healthy re-check cadence
pub const RECHECK_HEALTHY: i64 = 6;
/// Cadence for vanished listing ids
pub const RECHECK_NOT_FOUND: i64 = 24;
/// Backoff cadence for throttled/failed polls
pub const RECHECK_BACKOFF: i64 = 12;

/// Outcome class, drives run counters and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAction {
    Updated,
    NotModified,
    NotFound,
    Backoff,
    Error,
}

impl PollAction {
    pub fn label(&self) -> &'static str {
        match self {
            PollAction::Updated => "updated",
            PollAction::NotModified => "not_modified",
            PollAction::NotFound => "not_found",
            PollAction::Backoff => "backoff",
            PollAction::Error => "error",
        }
    }
}

/// Partial update to one tracked item row
///
/// `None` fields are left untouched by the persistence layer. `last_sync`
/// and `next_check_at` are always written and live on [`PolicyDecision`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    pub price: Option<f64>,
    pub previous_price: Option<f64>,
    pub original_price: Option<f64>,
    pub discount_percentage: Option<i64>,
    pub detected_price: Option<f64>,
    pub detected_at: Option<DateTime<Utc>>,
    pub status: Option<ListingStatus>,
    pub etag: Option<String>,
}

/// Result of applying the policy to one poll outcome
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    pub update: ItemUpdate,
    pub next_check_at: DateTime<Utc>,
    pub action: PollAction,
}

/// Map a fetch outcome to the item update and next check schedule
pub fn apply(item: &TrackedItem, outcome: &FetchOutcome, now: DateTime<Utc>) -> PolicyDecision {
    match outcome {
        FetchOutcome::NotModified => PolicyDecision {
            update: ItemUpdate::default(),
            next_check_at: now + Duration::hours(RECHECK_HEALTHY),
            action: PollAction::NotModified,
        },

        FetchOutcome::Fresh {
            price: Some(new_price),
            status,
            etag,
        } => {
            let new_price = *new_price;

            // Reference ceiling: never lowered by a fresh read
            let original_price = item.original_price.max(new_price);
            let discount_percentage = if original_price > 0.0 {
                let pct = ((original_price - new_price) / original_price * 100.0).round() as i64;
                pct.max(0)
            } else {
                0
            };

            let price_changed = new_price != item.price;

            // A paused item never auto-reactivates from a price poll
            let status = if item.status == ListingStatus::Paused {
                ListingStatus::Paused
            } else {
                *status
            };

            PolicyDecision {
                update: ItemUpdate {
                    price: Some(new_price),
                    previous_price: Some(item.price),
                    original_price: Some(original_price),
                    discount_percentage: Some(discount_percentage),
                    detected_price: price_changed.then_some(new_price),
                    detected_at: price_changed.then_some(now),
                    status: Some(status),
                    etag: etag.clone(),
                },
                next_check_at: now + Duration::hours(RECHECK_HEALTHY),
                action: PollAction::Updated,
            }
        }

        FetchOutcome::NotFound => PolicyDecision {
            update: ItemUpdate {
                status: Some(ListingStatus::Paused),
                ..ItemUpdate::default()
            },
            next_check_at: now + Duration::hours(RECHECK_NOT_FOUND),
            action: PollAction::NotFound,
        },

        FetchOutcome::Forbidden | FetchOutcome::RateLimited | FetchOutcome::Timeout => {
            PolicyDecision {
                update: ItemUpdate::default(),
                next_check_at: now + Duration::hours(RECHECK_BACKOFF),
                action: PollAction::Backoff,
            }
        }

        // 200 without a usable price, unknown HTTP status, transport failure
        FetchOutcome::Fresh { price: None, .. }
        | FetchOutcome::HttpError(_)
        | FetchOutcome::Transport(_) => PolicyDecision {
            update: ItemUpdate::default(),
            next_check_at: now + Duration::hours(RECHECK_BACKOFF),
            action: PollAction::Error,
        },
    }
}
