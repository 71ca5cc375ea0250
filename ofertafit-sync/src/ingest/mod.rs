//! Catalog admission pipeline
//!
//! Candidates arriving from marketplace discovery are transient: they are
//! normalized, scored by the admission gate, squeezed through the daily
//! quota and brand-diversity limits, and only then written to the catalog.

pub mod admission_gate;
pub mod pipeline;
pub mod quota;

pub use admission_gate::{AdmissionDecision, CatalogAdmissionGate, Verdict};
pub use pipeline::{IngestPipeline, IngestReport};

use serde::{Deserialize, Serialize};

/// A prospective catalog item, never persisted as-is
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Marketplace-side listing id
    pub external_id: String,
    pub title: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub price: f64,
    /// External marketplace category id (e.g. "MLB264586")
    #[serde(default)]
    pub category_id: Option<String>,
    /// Structured attributes from the listing (name, value)
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    /// Free-text context (description excerpt, seller tags)
    #[serde(default)]
    pub context: Option<String>,
}

impl CandidateItem {
    /// Normalized brand key for diversity accounting
    pub fn brand_key(&self) -> Option<String> {
        self.brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_lowercase)
    }
}
