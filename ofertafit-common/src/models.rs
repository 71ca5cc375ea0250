//! Shared data models for the sync engine
//!
//! Tracked listings, run records and their counters. Rows are stored in
//! SQLite with RFC 3339 text timestamps; status columns hold the lowercase
//! string form of [`ListingStatus`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Lifecycle status of a tracked listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Listing is live and polled on the healthy cadence
    Active,
    /// Listing is paused; excluded from polling until manually reactivated
    Paused,
    /// Remote listing is closed, inactive or has zero quantity
    OutOfStock,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Paused => "paused",
            ListingStatus::OutOfStock => "out_of_stock",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "active" => Ok(ListingStatus::Active),
            "paused" => Ok(ListingStatus::Paused),
            "out_of_stock" => Ok(ListingStatus::OutOfStock),
            other => Err(Error::InvalidInput(format!(
                "Unknown listing status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked marketplace listing
///
/// Mutated only by the sync orchestrator through the update policy.
/// `next_check_at` is always advanced after a poll attempt, whatever the
/// outcome, so every item keeps making forward progress.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedItem {
    pub id: String,
    /// Marketplace-side listing id (e.g. "MLB1234567890")
    pub external_id: String,
    /// Marketplace name, resolved against the provider registry
    pub marketplace: String,
    pub title: String,
    /// Current price as of the last successful read
    pub price: f64,
    /// Reference ceiling: highest price ever observed by the poller.
    /// Monotonically non-decreasing across successful reads.
    pub original_price: f64,
    /// Price before the most recent update
    pub previous_price: Option<f64>,
    /// Discount against `original_price`, rounded percent, never negative
    pub discount_percentage: i64,
    /// Price recorded at the last actual price change
    pub detected_price: Option<f64>,
    /// When the price last actually changed (not when it was last checked)
    pub detected_at: Option<DateTime<Utc>>,
    /// Cache validator from the marketplace API
    pub etag: Option<String>,
    pub status: ListingStatus,
    /// Earliest time the poller may look at this item again
    pub next_check_at: DateTime<Utc>,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Per-outcome counters for one sync run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunCounters {
    pub updated: u32,
    pub not_modified: u32,
    pub forbidden: u32,
    pub rate_limited: u32,
    pub not_found: u32,
    pub timeouts: u32,
    pub unknown_errors: u32,
}

/// One row per sync run, immutable once finalized
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Items matching the eligibility query at run start
    pub eligible: u32,
    /// Items actually attempted (eligible minus skips)
    pub processed: u32,
    /// Items skipped at dequeue time (schedule re-check failed)
    pub skipped: u32,
    pub counters: RunCounters,
}

impl RunRecord {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: None,
            eligible: 0,
            processed: 0,
            skipped: 0,
            counters: RunCounters::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ListingStatus::Active,
            ListingStatus::Paused,
            ListingStatus::OutOfStock,
        ] {
            assert_eq!(ListingStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert!(ListingStatus::parse("closed").is_err());
        assert!(ListingStatus::parse("").is_err());
    }
}
