use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use listing_client::{ListingClientConfig, DEFAULT_BASE_URL};
use notification_service::NotificationConfig;
use risk_advisor::{AdvisorConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL};

/// RentCast rejects page sizes above this.
const MAX_PAGE_LIMIT: u32 = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    // Loop
    pub scan_interval_seconds: u64,        // 300 (5 minutes)
    pub metrics_log_interval_cycles: u64,  // 12 (hourly at 5-min intervals)
    pub external_timeout_seconds: u64,     // 20

    // Paths
    pub historical_data_path: PathBuf,
    pub state_dir: PathBuf,

    // Listing search
    pub search_city: String,
    pub search_state: String,
    pub listing_limit: u32,
    pub listing_max_pages: u32,
    pub max_days_on_market: Option<u32>,
    pub rentcast_api_key: Option<String>,
    pub rentcast_base_url: String,
    pub allow_mock_fallback: bool,

    // Risk reweighting
    pub enable_risk_adjustment: bool,
    pub openai_api_key: Option<String>,
    pub risk_advisor_url: String,
    pub risk_advisor_model: String,

    // Discord notifications
    pub discord_webhook_url: Option<String>,
}

fn parsed<T, F>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("invalid value for {key}: {raw:?}"))
}

fn text<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: &str) -> String {
    optional(lookup, key).unwrap_or_else(|| default.to_string())
}

fn optional<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, then validate.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let max_days_on_market = match optional(&lookup, "MAX_DAYS_ON_MARKET") {
            Some(raw) => Some(
                raw.parse::<u32>()
                    .with_context(|| format!("invalid value for MAX_DAYS_ON_MARKET: {raw:?}"))?,
            ),
            None => None,
        };

        let config = Self {
            scan_interval_seconds: parsed(&lookup, "SCAN_INTERVAL", "300")?,
            metrics_log_interval_cycles: parsed(&lookup, "METRICS_LOG_INTERVAL", "12")?,
            external_timeout_seconds: parsed(&lookup, "EXTERNAL_TIMEOUT_SECS", "20")?,

            historical_data_path: PathBuf::from(text(
                &lookup,
                "HISTORICAL_DATA_PATH",
                "data/housing_data_tampa.csv",
            )),
            state_dir: PathBuf::from(text(&lookup, "STATE_DIR", "state")),

            search_city: text(&lookup, "SEARCH_CITY", "Tampa"),
            search_state: text(&lookup, "SEARCH_STATE", "FL"),
            listing_limit: parsed(&lookup, "LISTING_LIMIT", "50")?,
            listing_max_pages: parsed(&lookup, "LISTING_MAX_PAGES", "1")?,
            max_days_on_market,
            rentcast_api_key: optional(&lookup, "RENTCAST_API_KEY"),
            rentcast_base_url: text(&lookup, "RENTCAST_BASE_URL", DEFAULT_BASE_URL),
            allow_mock_fallback: parsed(&lookup, "ALLOW_MOCK_FALLBACK", "true")?,

            enable_risk_adjustment: parsed(&lookup, "ENABLE_RISK_ADJUSTMENT", "false")?,
            openai_api_key: optional(&lookup, "OPENAI_API_KEY"),
            risk_advisor_url: text(&lookup, "RISK_ADVISOR_URL", DEFAULT_ENDPOINT),
            risk_advisor_model: text(&lookup, "RISK_ADVISOR_MODEL", DEFAULT_MODEL),

            discord_webhook_url: optional(&lookup, "DISCORD_WEBHOOK_URL"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_interval_seconds == 0 {
            bail!("SCAN_INTERVAL must be > 0");
        }
        if self.external_timeout_seconds == 0 {
            bail!("EXTERNAL_TIMEOUT_SECS must be > 0");
        }
        if self.external_timeout_seconds >= self.scan_interval_seconds {
            bail!(
                "EXTERNAL_TIMEOUT_SECS ({}) must be shorter than SCAN_INTERVAL ({})",
                self.external_timeout_seconds,
                self.scan_interval_seconds
            );
        }
        if self.listing_limit == 0 || self.listing_limit > MAX_PAGE_LIMIT {
            bail!("LISTING_LIMIT must be between 1 and {MAX_PAGE_LIMIT}");
        }
        if self.listing_max_pages == 0 {
            bail!("LISTING_MAX_PAGES must be > 0");
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_seconds)
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external_timeout_seconds)
    }

    /// The advisor only runs when explicitly enabled and a key is present.
    pub fn risk_advisor_active(&self) -> bool {
        self.enable_risk_adjustment && self.openai_api_key.is_some()
    }

    pub fn listing_config(&self) -> ListingClientConfig {
        ListingClientConfig {
            api_key: self.rentcast_api_key.clone(),
            base_url: self.rentcast_base_url.clone(),
            city: self.search_city.clone(),
            state: self.search_state.clone(),
            page_limit: self.listing_limit,
            max_pages: self.listing_max_pages,
            max_days_on_market: self.max_days_on_market,
            allow_mock_fallback: self.allow_mock_fallback,
            timeout: self.external_timeout(),
            ..ListingClientConfig::default()
        }
    }

    pub fn advisor_config(&self) -> AdvisorConfig {
        AdvisorConfig {
            api_key: self.openai_api_key.clone(),
            endpoint: self.risk_advisor_url.clone(),
            model: self.risk_advisor_model.clone(),
            timeout: self.external_timeout(),
            ..AdvisorConfig::default()
        }
    }

    pub fn notification_config(&self) -> NotificationConfig {
        NotificationConfig {
            discord_webhook_url: self.discord_webhook_url.clone(),
            timeout: self.external_timeout(),
            ..NotificationConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.scan_interval_seconds, 300);
        assert_eq!(config.search_city, "Tampa");
        assert_eq!(config.listing_limit, 50);
        assert!(config.allow_mock_fallback);
        assert!(!config.risk_advisor_active());
        assert_eq!(config.max_days_on_market, None);
        assert_eq!(config.state_dir, PathBuf::from("state"));
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("SCAN_INTERVAL", "60"),
            ("EXTERNAL_TIMEOUT_SECS", "5"),
            ("MAX_DAYS_ON_MARKET", "30"),
            ("DISCORD_WEBHOOK_URL", "  "),
            ("ENABLE_RISK_ADJUSTMENT", "true"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();
        assert_eq!(config.scan_interval(), Duration::from_secs(60));
        assert_eq!(config.max_days_on_market, Some(30));
        assert_eq!(config.discord_webhook_url, None);
        assert!(config.risk_advisor_active());
        assert_eq!(config.listing_config().timeout, Duration::from_secs(5));
        assert_eq!(config.advisor_config().api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_risk_needs_key() {
        let config =
            AgentConfig::from_lookup(lookup(&[("ENABLE_RISK_ADJUSTMENT", "true")])).unwrap();
        assert!(!config.risk_advisor_active());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(AgentConfig::from_lookup(lookup(&[("SCAN_INTERVAL", "soon")])).is_err());
        assert!(AgentConfig::from_lookup(lookup(&[("LISTING_LIMIT", "1000")])).is_err());
        assert!(AgentConfig::from_lookup(lookup(&[
            ("SCAN_INTERVAL", "10"),
            ("EXTERNAL_TIMEOUT_SECS", "30"),
        ]))
        .is_err());
    }
}
