//! Marketplace client abstraction
//!
//! Each supported marketplace implements the [`Marketplace`] capability
//! trait; implementations are registered once at startup in a
//! [`ProviderRegistry`] and resolved by name from the tracked item's
//! `marketplace` column. Adding a marketplace means registering a new
//! implementation, not branching in the orchestrator.
//!
//! Transport results are mapped to the closed [`FetchOutcome`] set.
//! Expected conditions (304, 403, 404, 429, timeout) are outcomes, not
//! errors; only programmer errors surface as panics and nothing is thrown
//! for ordinary transport failures.

mod mercado_livre;

pub use mercado_livre::MercadoLivreClient;

use async_trait::async_trait;
use ofertafit_common::models::ListingStatus;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Result of one conditional item fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// 304: cached ETag still valid, no body fetched
    NotModified,
    /// 200: fresh payload. `price` is `None` when the remote payload carried
    /// no usable numeric price.
    Fresh {
        price: Option<f64>,
        status: ListingStatus,
        etag: Option<String>,
    },
    /// 404: listing id no longer exists
    NotFound,
    /// 403: credential rejected or bot defense triggered
    Forbidden,
    /// 429: remote throttling
    RateLimited,
    /// Any other HTTP status
    HttpError(u16),
    /// The bounded wait elapsed before a response arrived
    Timeout,
    /// Transport-layer failure unrelated to timeout
    Transport(String),
}

impl FetchOutcome {
    /// Short label for log lines
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::NotModified => "not_modified",
            FetchOutcome::Fresh { .. } => "fresh",
            FetchOutcome::NotFound => "not_found",
            FetchOutcome::Forbidden => "forbidden",
            FetchOutcome::RateLimited => "rate_limited",
            FetchOutcome::HttpError(_) => "http_error",
            FetchOutcome::Timeout => "timeout",
            FetchOutcome::Transport(_) => "transport_error",
        }
    }
}

/// Capability interface for one external marketplace catalog API
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Registry key; matches the `marketplace` column of tracked items
    fn name(&self) -> &'static str;

    /// Conditional read of one listing
    ///
    /// Sends `If-None-Match` when an ETag is cached and a bearer credential
    /// when available. Never returns an error: every transport result maps
    /// into [`FetchOutcome`]. Pure with respect to local state.
    async fn fetch_item(
        &self,
        external_id: &str,
        etag: Option<&str>,
        credential: Option<&str>,
        timeout: Duration,
    ) -> FetchOutcome;
}

/// Registered marketplace implementations, resolved once at startup
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn Marketplace>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the marketplaces this deployment supports
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MercadoLivreClient::new()));
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn Marketplace>) {
        self.providers.insert(provider.name(), provider);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Marketplace>> {
        self.providers.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeMarket;

    #[async_trait]
    impl Marketplace for FakeMarket {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_item(
            &self,
            _external_id: &str,
            _etag: Option<&str>,
            _credential: Option<&str>,
            _timeout: Duration,
        ) -> FetchOutcome {
            FetchOutcome::NotModified
        }
    }

    #[test]
    fn test_registry_resolves_registered_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FakeMarket));

        assert!(registry.resolve("fake").is_some());
        assert!(registry.resolve("unknown").is_none());
    }

    #[test]
    fn test_default_registry_has_mercado_livre() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.resolve("mercadolivre").is_some());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(FetchOutcome::NotModified.label(), "not_modified");
        assert_eq!(FetchOutcome::Timeout.label(), "timeout");
        assert_eq!(FetchOutcome::HttpError(500).label(), "http_error");
    }
}
