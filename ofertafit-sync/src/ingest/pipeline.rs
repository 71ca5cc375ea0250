//! Candidate ingestion pipeline
//!
//! One ingest run for one site category: dedupe the incoming batch, drop
//! candidates already in the catalog, score the rest through the admission
//! gate, then squeeze the allowed set through the daily quota and the
//! brand-diversity limit. Published admissions also enter `tracked_items`
//! so the price sync picks them up on its next run.

use chrono::{Datelike, Utc};
use ofertafit_common::config::IngestConfig;
use ofertafit_common::models::{ListingStatus, TrackedItem};
use ofertafit_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::db::catalog::NewCatalogItem;

use super::admission_gate::{CatalogAdmissionGate, Verdict};
use super::quota::{self, BrandLimitOpts};
use super::CandidateItem;

/// What one ingest run did with its batch
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub category: String,
    pub received: u32,
    /// Collapsed duplicate external ids within the batch
    pub duplicates: u32,
    /// Candidates already present in the catalog
    pub already_in_catalog: u32,
    pub allowed: u32,
    pub standby: u32,
    pub rejected: u32,
    /// Allowed candidates dropped by the brand-diversity cap
    pub brand_limited: u32,
    /// Allowed candidates deferred because today's quota was spent
    pub quota_deferred: u32,
    /// Today's resolved intake target for the category
    pub quota_target: u32,
    /// Rows actually written as published
    pub published: u32,
}

/// The ingestion job
pub struct IngestPipeline {
    db: SqlitePool,
    gate: CatalogAdmissionGate,
    config: IngestConfig,
    /// Marketplace new tracked items are attributed to
    marketplace: String,
}

impl IngestPipeline {
    pub fn new(db: SqlitePool, gate: CatalogAdmissionGate, config: IngestConfig) -> Self {
        Self {
            db,
            gate,
            config,
            marketplace: "mercadolivre".to_string(),
        }
    }

    /// Run the pipeline over one candidate batch
    pub async fn run(
        &self,
        category_slug: &str,
        candidates: Vec<CandidateItem>,
    ) -> Result<IngestReport> {
        let category = self
            .gate
            .category(category_slug)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown category: {}", category_slug)))?;

        let now = Utc::now();
        let received = candidates.len() as u32;

        let deduped = quota::dedupe_by_external_id(candidates);
        let duplicates = received - deduped.len() as u32;

        let batch_ids: Vec<String> = deduped.iter().map(|c| c.external_id.clone()).collect();
        let existing = db::catalog::existing_external_ids(&self.db, &batch_ids).await?;
        let fresh: Vec<CandidateItem> = deduped
            .into_iter()
            .filter(|c| !existing.contains(&c.external_id))
            .collect();
        let already_in_catalog = batch_ids.len() as u32 - fresh.len() as u32;

        let mut allowed = Vec::new();
        let mut standby = Vec::new();
        let mut rejected = 0u32;
        for candidate in fresh {
            let decision = self.gate.evaluate(category, &candidate);
            match decision.verdict {
                Verdict::Allow => allowed.push((candidate, decision)),
                Verdict::Standby => standby.push((candidate, decision)),
                Verdict::Reject => rejected += 1,
            }
        }
        let allowed_count = allowed.len() as u32;

        // Deterministic daily target: same day, same category, same number
        let range = quota::resolve_quota_range(
            self.config.quotas.get(category_slug),
            self.config.fallback_min,
            self.config.fallback_max,
        );
        let quota_target = quota::resolve_quota_value(range, now.ordinal());
        let admitted_today = db::catalog::admitted_today(&self.db, category_slug, now).await?;
        // Target is the publish ceiling; the range floor is what brand
        // diversity may be sacrificed for
        let remaining_today = quota_target.saturating_sub(admitted_today);
        let floor_remaining = range.min.saturating_sub(admitted_today);

        let scores: std::collections::HashMap<String, u32> = allowed
            .iter()
            .map(|(c, d)| (c.external_id.clone(), d.score))
            .collect();

        let opts = BrandLimitOpts {
            max_per_brand: self.config.max_per_brand,
            min_target: floor_remaining,
            initial_usage: db::catalog::brand_usage_today(&self.db, category_slug, now).await?,
        };
        let outcome =
            quota::apply_brand_daily_limit(allowed.into_iter().map(|(c, _)| c).collect(), &opts);
        let brand_limited = outcome.rejected.len() as u32;

        let mut published = 0u32;
        let mut quota_deferred = 0u32;
        for candidate in outcome.selected {
            if published >= remaining_today {
                quota_deferred += 1;
                continue;
            }
            let score = scores.get(&candidate.external_id).copied().unwrap_or(0);
            self.publish(category_slug, &candidate, score, now).await?;
            published += 1;
        }

        for (candidate, decision) in &standby {
            self.insert_catalog_row(category_slug, candidate, decision.score, "standby", now)
                .await?;
        }

        let report = IngestReport {
            category: category_slug.to_string(),
            received,
            duplicates,
            already_in_catalog,
            allowed: allowed_count,
            standby: standby.len() as u32,
            rejected,
            brand_limited,
            quota_deferred,
            quota_target,
            published,
        };

        tracing::info!(
            category = category_slug,
            received = report.received,
            published = report.published,
            standby = report.standby,
            rejected = report.rejected,
            brand_limited = report.brand_limited,
            quota_target = report.quota_target,
            "Ingest run completed"
        );

        Ok(report)
    }

    /// Write a published candidate: catalog row plus a tracked item for the
    /// price sync
    async fn publish(
        &self,
        category_slug: &str,
        candidate: &CandidateItem,
        score: u32,
        now: chrono::DateTime<Utc>,
    ) -> Result<()> {
        self.insert_catalog_row(category_slug, candidate, score, "published", now)
            .await?;

        let item = TrackedItem {
            id: Uuid::new_v4().to_string(),
            external_id: candidate.external_id.clone(),
            marketplace: self.marketplace.clone(),
            title: candidate.title.clone(),
            price: candidate.price,
            original_price: candidate.price,
            previous_price: None,
            discount_percentage: 0,
            detected_price: None,
            detected_at: None,
            etag: None,
            status: ListingStatus::Active,
            next_check_at: now,
            last_sync: None,
        };
        db::items::insert_new(&self.db, &item, now).await
    }

    async fn insert_catalog_row(
        &self,
        category_slug: &str,
        candidate: &CandidateItem,
        score: u32,
        review_status: &str,
        now: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let row = NewCatalogItem {
            id: Uuid::new_v4().to_string(),
            external_id: candidate.external_id.clone(),
            title: candidate.title.clone(),
            brand: candidate.brand.clone(),
            category: category_slug.to_string(),
            price: candidate.price,
            score: score as i64,
            review_status: review_status.to_string(),
        };
        db::catalog::insert_catalog_item(&self.db, &row, now).await
    }
}
