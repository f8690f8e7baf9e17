pub mod error;
pub mod mock;
pub mod models;

pub use error::{ListingError, ListingResult};
pub use mock::mock_listings;
pub use models::{neighborhood_id_for_zip, normalize, SaleListing};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use std::time::Duration;

use valuation_core::{is_disallowed_property_type, CollaboratorOutcome, ListingObservation, ListingSource};

pub const DEFAULT_BASE_URL: &str = "https://api.rentcast.io/v1";

const PLACEHOLDER_KEY: &str = "YOUR_API_KEY_HERE";
const RATE_LIMIT_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct ListingClientConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub city: String,
    pub state: String,
    /// Page size sent as `limit`.
    pub page_limit: u32,
    pub max_pages: u32,
    pub max_days_on_market: Option<u32>,
    pub allow_mock_fallback: bool,
    pub timeout: Duration,
    pub retry_wait: Duration,
}

impl Default for ListingClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            city: "Tampa".to_string(),
            state: "FL".to_string(),
            page_limit: 50,
            max_pages: 1,
            max_days_on_market: None,
            allow_mock_fallback: true,
            timeout: Duration::from_secs(30),
            retry_wait: Duration::from_secs(15),
        }
    }
}

/// Sale-listing client for the RentCast API.
#[derive(Clone)]
pub struct RentCastClient {
    config: ListingClientConfig,
    client: Client,
}

impl RentCastClient {
    pub fn new(config: ListingClientConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { config, client }
    }

    pub fn config(&self) -> &ListingClientConfig {
        &self.config
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && *k != PLACEHOLDER_KEY)
    }

    /// Send a request with automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> ListingResult<reqwest::Response> {
        let request = builder.build()?;

        for attempt in 0..RATE_LIMIT_RETRIES {
            let req_clone = request
                .try_clone()
                .ok_or_else(|| ListingError::InvalidResponse("cannot clone request".to_string()))?;
            let response = self.client.execute(req_clone).await?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            tracing::warn!(
                "RentCast 429 rate limited, waiting {}s before retry {}/{}",
                self.config.retry_wait.as_secs(),
                attempt + 1,
                RATE_LIMIT_RETRIES
            );
            tokio::time::sleep(self.config.retry_wait).await;
        }

        Err(ListingError::RateLimited(RATE_LIMIT_RETRIES))
    }

    async fn fetch_page(&self, api_key: &str, offset: u32) -> ListingResult<Vec<SaleListing>> {
        let url = format!("{}/listings/sale", self.config.base_url.trim_end_matches('/'));
        let limit = self.config.page_limit.to_string();
        let offset = offset.to_string();
        let response = self
            .send_request(
                self.client
                    .get(&url)
                    .header("Accept", "application/json")
                    .header("X-Api-Key", api_key)
                    .query(&[
                        ("city", self.config.city.as_str()),
                        ("state", self.config.state.as_str()),
                        ("status", "Active"),
                        ("limit", limit.as_str()),
                        ("offset", offset.as_str()),
                    ]),
            )
            .await?;

        if !response.status().is_success() {
            return Err(ListingError::Api {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ListingError::InvalidResponse(e.to_string()))
    }

    /// Fetch every active listing page and normalize it, without filtering.
    pub async fn fetch_active(&self, observed_at: NaiveDate) -> ListingResult<Vec<ListingObservation>> {
        let api_key = self.api_key().ok_or(ListingError::MissingApiKey)?;
        let mut listings = Vec::new();

        for page in 0..self.config.max_pages.max(1) {
            let offset = page * self.config.page_limit;
            let raw = self.fetch_page(api_key, offset).await?;
            let page_len = raw.len();
            let before = listings.len();
            listings.extend(raw.into_iter().filter_map(|l| normalize(l, observed_at)));
            tracing::debug!(
                "RentCast page {} returned {} listings ({} usable)",
                page,
                page_len,
                listings.len() - before
            );
            if page_len < self.config.page_limit as usize {
                break;
            }
        }
        Ok(listings)
    }

    /// Drop excluded property types and stale listings.
    pub fn filter(&self, listings: Vec<ListingObservation>) -> Vec<ListingObservation> {
        filter_listings(listings, self.config.max_days_on_market)
    }
}

pub fn filter_listings(
    listings: Vec<ListingObservation>,
    max_days_on_market: Option<u32>,
) -> Vec<ListingObservation> {
    listings
        .into_iter()
        .filter(|l| {
            if let Some(kind) = l.property_type.as_deref() {
                if is_disallowed_property_type(kind) {
                    tracing::debug!("Skipping {} ({})", l.address, kind);
                    return false;
                }
            }
            match (max_days_on_market, l.days_on_market) {
                (Some(max), Some(days)) if days > max => {
                    tracing::debug!("Skipping {} ({} days on market)", l.address, days);
                    false
                }
                _ => true,
            }
        })
        .collect()
}

#[async_trait]
impl ListingSource for RentCastClient {
    async fn fetch_listings(&self) -> CollaboratorOutcome<Vec<ListingObservation>> {
        let today = Utc::now().date_naive();
        match self.fetch_active(today).await {
            Ok(listings) => CollaboratorOutcome::Ok(self.filter(listings)),
            Err(e) if self.config.allow_mock_fallback => {
                tracing::warn!("RentCast fetch failed ({}), using mock listings", e);
                CollaboratorOutcome::Ok(self.filter(mock_listings(today)))
            }
            Err(e) => CollaboratorOutcome::failed(e.to_string()),
        }
    }

    fn source_name(&self) -> &str {
        "rentcast"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: &str, kind: Option<&str>, days: Option<u32>) -> ListingObservation {
        let mut obs = mock_listings(NaiveDate::from_ymd_opt(2026, 2, 22).unwrap())
            .into_iter()
            .next()
            .unwrap();
        obs.house_id = id.to_string();
        obs.property_type = kind.map(String::from);
        obs.days_on_market = days;
        obs
    }

    #[test]
    fn test_filters_property_types_and_stale_listings() {
        let kept = filter_listings(
            vec![
                listing("a", Some("Single Family"), Some(3)),
                listing("b", Some("Manufactured"), None),
                listing("c", Some("land"), None),
                listing("d", None, Some(400)),
                listing("e", None, None),
            ],
            Some(90),
        );
        let ids: Vec<&str> = kept.iter().map(|l| l.house_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "e"]);
    }

    #[test]
    fn test_placeholder_key_counts_as_missing() {
        let client = RentCastClient::new(ListingClientConfig {
            api_key: Some(PLACEHOLDER_KEY.into()),
            ..Default::default()
        });
        assert!(client.api_key().is_none());
    }

    #[tokio::test]
    async fn test_missing_key_falls_back_to_mock() {
        let client = RentCastClient::new(ListingClientConfig::default());
        match client.fetch_listings().await {
            CollaboratorOutcome::Ok(batch) => assert_eq!(batch.len(), 10),
            CollaboratorOutcome::Failed(reason) => panic!("unexpected failure: {reason}"),
        }
    }

    #[tokio::test]
    async fn test_missing_key_without_fallback_fails() {
        let client = RentCastClient::new(ListingClientConfig {
            allow_mock_fallback: false,
            ..Default::default()
        });
        assert!(!client.fetch_listings().await.is_ok());
    }
}
