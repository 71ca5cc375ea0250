//! Mercado Livre items API client
//!
//! Conditional reads against the public items endpoint. The remote listing
//! status maps onto [`ListingStatus`]: a remote `paused` stays paused, a
//! closed/inactive listing or one with zero available quantity is
//! out-of-stock, anything else is active.

use async_trait::async_trait;
use ofertafit_common::models::ListingStatus;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use super::{FetchOutcome, Marketplace};

const API_BASE_URL: &str = "https://api.mercadolibre.com";
const USER_AGENT: &str = "ofertafit/0.1.0 (+https://ofertafit.com.br)";

/// Item payload subset the sync engine cares about
#[derive(Debug, Deserialize)]
struct ItemPayload {
    price: Option<f64>,
    status: Option<String>,
    available_quantity: Option<i64>,
}

impl ItemPayload {
    fn listing_status(&self) -> ListingStatus {
        match self.status.as_deref() {
            Some("paused") => ListingStatus::Paused,
            Some("closed") | Some("inactive") => ListingStatus::OutOfStock,
            _ if self.available_quantity == Some(0) => ListingStatus::OutOfStock,
            _ => ListingStatus::Active,
        }
    }
}

/// Mercado Livre API client
pub struct MercadoLivreClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl MercadoLivreClient {
    pub fn new() -> Self {
        Self::with_base_url(API_BASE_URL.to_string())
    }

    /// Client against a non-default endpoint (tests)
    pub fn with_base_url(base_url: String) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client (system error)");

        Self {
            http_client,
            base_url,
        }
    }
}

impl Default for MercadoLivreClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Marketplace for MercadoLivreClient {
    fn name(&self) -> &'static str {
        "mercadolivre"
    }

    async fn fetch_item(
        &self,
        external_id: &str,
        etag: Option<&str>,
        credential: Option<&str>,
        timeout: Duration,
    ) -> FetchOutcome {
        let url = format!("{}/items/{}", self.base_url, external_id);

        let mut request = self.http_client.get(&url).timeout(timeout);
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(token) = credential {
            request = request.bearer_auth(token);
        }

        tracing::debug!(external_id = %external_id, conditional = etag.is_some(), "Fetching item");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return FetchOutcome::Timeout,
            Err(e) => return FetchOutcome::Transport(e.to_string()),
        };

        match response.status() {
            StatusCode::NOT_MODIFIED => FetchOutcome::NotModified,
            StatusCode::OK => {
                let etag = response
                    .headers()
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string());

                let payload: ItemPayload = match response.json().await {
                    Ok(payload) => payload,
                    Err(e) if e.is_timeout() => return FetchOutcome::Timeout,
                    Err(e) => return FetchOutcome::Transport(e.to_string()),
                };

                FetchOutcome::Fresh {
                    price: payload.price,
                    status: payload.listing_status(),
                    etag,
                }
            }
            StatusCode::FORBIDDEN => FetchOutcome::Forbidden,
            StatusCode::NOT_FOUND => FetchOutcome::NotFound,
            StatusCode::TOO_MANY_REQUESTS => FetchOutcome::RateLimited,
            other => FetchOutcome::HttpError(other.as_u16()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(status: Option<&str>, quantity: Option<i64>) -> ItemPayload {
        ItemPayload {
            price: Some(99.9),
            status: status.map(|s| s.to_string()),
            available_quantity: quantity,
        }
    }

    #[test]
    fn test_status_mapping_active() {
        assert_eq!(
            payload(Some("active"), Some(12)).listing_status(),
            ListingStatus::Active
        );
    }

    #[test]
    fn test_status_mapping_paused() {
        assert_eq!(
            payload(Some("paused"), Some(12)).listing_status(),
            ListingStatus::Paused
        );
    }

    #[test]
    fn test_status_mapping_closed_and_inactive() {
        assert_eq!(
            payload(Some("closed"), Some(3)).listing_status(),
            ListingStatus::OutOfStock
        );
        assert_eq!(
            payload(Some("inactive"), None).listing_status(),
            ListingStatus::OutOfStock
        );
    }

    #[test]
    fn test_status_mapping_zero_quantity() {
        assert_eq!(
            payload(Some("active"), Some(0)).listing_status(),
            ListingStatus::OutOfStock
        );
    }

    #[test]
    fn test_status_mapping_missing_fields_defaults_active() {
        assert_eq!(payload(None, None).listing_status(), ListingStatus::Active);
    }

    #[test]
    fn test_payload_parse() {
        let json = r#"{
            "id": "MLB123",
            "price": 149.5,
            "status": "active",
            "available_quantity": 4,
            "permalink": "https://produto.mercadolivre.com.br/MLB123"
        }"#;
        let payload: ItemPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.price, Some(149.5));
        assert_eq!(payload.listing_status(), ListingStatus::Active);
    }
}
