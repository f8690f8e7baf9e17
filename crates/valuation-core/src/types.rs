use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Property types that never enter the candidate pool. Manufactured and mobile
/// homes usually carry lot rent, and vacant land does not qualify for standard
/// residential financing.
pub const DISALLOWED_PROPERTY_TYPES: &[&str] = &["Manufactured", "Mobile", "Land"];

/// Returns true if `property_type` names one of the excluded categories (case-insensitive).
pub fn is_disallowed_property_type(property_type: &str) -> bool {
    let normalized = property_type.trim();
    DISALLOWED_PROPERTY_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(normalized))
}

/// One recorded price observation for a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingObservation {
    pub house_id: String,
    pub address: String,
    pub neighborhood_id: i64,
    pub neighborhood_name: String,
    pub sqft: f64,
    pub beds: f64,
    pub baths: f64,
    /// Monthly non-equity fee (HOA, condo association).
    #[serde(alias = "hoa_fee")]
    pub recurring_fee: f64,
    #[serde(rename = "date")]
    pub observed_at: NaiveDate,
    pub price: f64,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub days_on_market: Option<u32>,
    #[serde(default)]
    pub year_built: Option<i32>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Fully derived valuation for one candidate listing in one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvaluation {
    pub house_id: String,
    pub address: String,
    pub neighborhood_name: String,
    pub price: f64,
    pub recurring_fee: f64,
    pub predicted_price: f64,
    pub monthly_mortgage: f64,
    pub monthly_tax_ins: f64,
    pub total_monthly_cost: f64,
    pub capitalized_cost: f64,
    pub fee_adjusted_value: f64,
    pub undervaluation_amount: f64,
    pub undervaluation_pct: f64,
    #[serde(default)]
    pub risk_multiplier: Option<f64>,
    #[serde(default)]
    pub risk_reasoning: Option<String>,
    #[serde(default)]
    pub property_type: Option<String>,
}

/// Durable champion identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChampionState {
    #[serde(rename = "house_id")]
    pub champion_house_id: Option<String>,
}

impl ChampionState {
    pub fn holding(house_id: impl Into<String>) -> Self {
        Self {
            champion_house_id: Some(house_id.into()),
        }
    }
}

/// Top-N evaluations of the most recent cycle. Replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<CandidateEvaluation>,
}

impl LeaderboardSnapshot {
    pub fn new(entries: Vec<CandidateEvaluation>) -> Self {
        Self {
            generated_at: Utc::now(),
            entries,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Established,
    Overthrown,
    /// Accepted by notifiers, never produced by the champion tracker: a
    /// holding cycle is only logged.
    Holding,
}

impl EventKind {
    pub fn to_label(&self) -> &'static str {
        match self {
            EventKind::Established => "established",
            EventKind::Overthrown => "overthrown",
            EventKind::Holding => "holding",
        }
    }
}

pub const REASON_FIRST_CHAMPION: &str = "first champion established";
pub const REASON_NEW_ENTRANT: &str = "new entrant dethroned incumbent";
pub const REASON_CHAMPION_DELISTED: &str = "previous champion delisted";

/// Event handed to the notifier when the champion changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChampionEvent {
    pub kind: EventKind,
    pub candidate: CandidateEvaluation,
    pub reason: String,
    #[serde(default)]
    pub previous_champion_id: Option<String>,
}

/// Raw reply of the qualitative risk advisor. The multiplier is kept as an
/// untyped JSON value so the engine can decide how to treat malformed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRiskAssessment {
    pub risk_multiplier: serde_json::Value,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Validated risk adjustment applied to a candidate's fair value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub multiplier: f64,
    pub reasoning: String,
}

impl RiskAssessment {
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            multiplier: 1.0,
            reasoning: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disallowed_property_types() {
        assert!(is_disallowed_property_type("Manufactured"));
        assert!(is_disallowed_property_type("mobile"));
        assert!(is_disallowed_property_type(" LAND "));
        assert!(!is_disallowed_property_type("Single Family"));
        assert!(!is_disallowed_property_type("Condo"));
    }

    #[test]
    fn test_champion_state_file_shape() {
        let state = ChampionState::holding("TPA0001");
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"house_id":"TPA0001"}"#);

        let empty: ChampionState = serde_json::from_str(r#"{"house_id":null}"#).unwrap();
        assert_eq!(empty.champion_house_id, None);
    }

    #[test]
    fn test_observation_accepts_hoa_fee_alias() {
        let json = r#"{
            "house_id": "TPA0002", "address": "100 Bayshore Blvd",
            "neighborhood_id": 1, "neighborhood_name": "South Tampa",
            "sqft": 1500.0, "beds": 3.0, "baths": 2.0, "hoa_fee": 250.0,
            "date": "2025-06-01", "price": 420000.0
        }"#;
        let obs: ListingObservation = serde_json::from_str(json).unwrap();
        assert_eq!(obs.recurring_fee, 250.0);
        assert_eq!(obs.observed_at, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert!(obs.property_type.is_none());
    }

    #[test]
    fn test_event_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&EventKind::Overthrown).unwrap(),
            r#""overthrown""#
        );
        assert_eq!(EventKind::Established.to_label(), "established");
    }
}
