use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::financial::FinancialCostModel;
use crate::pipeline::rank;
use valuation_core::{
    CandidateEvaluation, CollaboratorOutcome, ListingObservation, RawRiskAssessment, RiskAdvisor,
    RiskAssessment,
};

pub const NO_ADJUSTMENT: &str = "no adjustment applied";

/// Reweights the fair value of the best-ranked candidates with a bounded
/// multiplier from the external risk advisor.
#[derive(Debug, Clone)]
pub struct RiskAdjuster {
    min: f64,
    max: f64,
    timeout: Duration,
}

impl RiskAdjuster {
    pub fn new(min: f64, max: f64, timeout: Duration) -> Self {
        Self { min, max, timeout }
    }

    pub fn from_config(config: &EngineConfig, timeout: Duration) -> Self {
        Self::new(config.risk_multiplier_min, config.risk_multiplier_max, timeout)
    }

    /// Accepts finite JSON numbers and numeric strings.
    pub fn parse_multiplier(value: &Value) -> Option<f64> {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|v| v.is_finite())
    }

    /// Turn an advisor outcome into a bounded assessment. Never fails.
    pub fn interpret(&self, outcome: CollaboratorOutcome<RawRiskAssessment>) -> RiskAssessment {
        match outcome {
            CollaboratorOutcome::Ok(raw) => match Self::parse_multiplier(&raw.risk_multiplier) {
                Some(m) => RiskAssessment {
                    multiplier: m.clamp(self.min, self.max),
                    reasoning: raw
                        .reasoning
                        .filter(|r| !r.trim().is_empty())
                        .unwrap_or_else(|| "no rationale provided".to_string()),
                },
                None => {
                    tracing::warn!(
                        "Risk advisor returned non-numeric multiplier {}",
                        raw.risk_multiplier
                    );
                    RiskAssessment::neutral(format!("{NO_ADJUSTMENT}: malformed multiplier"))
                }
            },
            CollaboratorOutcome::Failed(reason) => {
                tracing::warn!("Risk assessment failed: {}", reason);
                RiskAssessment::neutral(format!("{NO_ADJUSTMENT}: {reason}"))
            }
        }
    }

    pub async fn assess(
        &self,
        advisor: Option<&dyn RiskAdvisor>,
        listing: &ListingObservation,
    ) -> RiskAssessment {
        let Some(advisor) = advisor else {
            return RiskAssessment::neutral(format!("{NO_ADJUSTMENT}: risk advisor disabled"));
        };
        let outcome = match tokio::time::timeout(self.timeout, advisor.assess(listing)).await {
            Ok(outcome) => outcome,
            Err(_) => CollaboratorOutcome::failed(format!(
                "{} timed out after {:?}",
                advisor.advisor_name(),
                self.timeout
            )),
        };
        self.interpret(outcome)
    }

    /// Adjust the first `k` entries of an already ranked list, then re-rank it.
    pub async fn adjust_top(
        &self,
        ranked: &mut Vec<CandidateEvaluation>,
        k: usize,
        listings: &[ListingObservation],
        advisor: Option<&dyn RiskAdvisor>,
        cost_model: &FinancialCostModel,
    ) {
        let by_id: HashMap<&str, &ListingObservation> =
            listings.iter().map(|l| (l.house_id.as_str(), l)).collect();

        for evaluation in ranked.iter_mut().take(k) {
            let assessment = match by_id.get(evaluation.house_id.as_str()) {
                Some(listing) => self.assess(advisor, listing).await,
                None => RiskAssessment::neutral(format!("{NO_ADJUSTMENT}: listing not found")),
            };
            tracing::debug!(
                house_id = %evaluation.house_id,
                multiplier = assessment.multiplier,
                "Risk assessment applied"
            );
            evaluation.predicted_price *= assessment.multiplier;
            evaluation.risk_multiplier = Some(assessment.multiplier);
            evaluation.risk_reasoning = Some(assessment.reasoning);
            cost_model.rescore(evaluation);
        }
        rank(ranked);
    }
}
