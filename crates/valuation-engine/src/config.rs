use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use valuation_core::ValuationError;

/// Tunables consumed by the valuation pipeline and champion tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // Financing
    pub annual_interest_rate: f64,      // 0.06
    pub tax_insurance_rate: f64,        // annual fraction of price, 0.0 = not modeled
    pub amortization_months: u32,       // 360

    // Ranking
    pub top_n: usize,                   // 10
    pub gem_threshold_pct: f64,         // 10.0

    // Model composition
    pub min_cluster_size: usize,        // 5
    pub blend_global_weight: f64,       // 0.3
    pub blend_local_weight: f64,        // 0.7

    // Scoring
    pub fee_capitalization_multiplier: f64, // 150

    // Risk reweighting bounds
    pub risk_multiplier_min: f64,       // 0.5
    pub risk_multiplier_max: f64,       // 1.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            annual_interest_rate: 0.06,
            tax_insurance_rate: 0.0,
            amortization_months: 360,
            top_n: 10,
            gem_threshold_pct: 10.0,
            min_cluster_size: 5,
            blend_global_weight: 0.3,
            blend_local_weight: 0.7,
            fee_capitalization_multiplier: 150.0,
            risk_multiplier_min: 0.5,
            risk_multiplier_max: 1.0,
        }
    }
}

pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ValuationError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| ValuationError::Config(format!("{key}={raw}: {e}"))),
        _ => Ok(default),
    }
}

impl EngineConfig {
    /// Load from environment variables, falling back to defaults, then validate.
    pub fn from_env() -> Result<Self, ValuationError> {
        let defaults = Self::default();
        let config = Self {
            annual_interest_rate: env_or("MORTGAGE_INTEREST_RATE", defaults.annual_interest_rate)?,
            tax_insurance_rate: env_or("TAX_INSURANCE_RATE", defaults.tax_insurance_rate)?,
            amortization_months: defaults.amortization_months,
            top_n: env_or("TOP_N", defaults.top_n)?,
            gem_threshold_pct: env_or("GEM_THRESHOLD_PCT", defaults.gem_threshold_pct)?,
            min_cluster_size: env_or("MIN_CLUSTER_SIZE", defaults.min_cluster_size)?,
            blend_global_weight: env_or("BLEND_GLOBAL_WEIGHT", defaults.blend_global_weight)?,
            blend_local_weight: env_or("BLEND_LOCAL_WEIGHT", defaults.blend_local_weight)?,
            fee_capitalization_multiplier: env_or(
                "FEE_CAPITALIZATION_MULTIPLIER",
                defaults.fee_capitalization_multiplier,
            )?,
            risk_multiplier_min: env_or("RISK_MULTIPLIER_MIN", defaults.risk_multiplier_min)?,
            risk_multiplier_max: env_or("RISK_MULTIPLIER_MAX", defaults.risk_multiplier_max)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValuationError> {
        if !(self.annual_interest_rate >= 0.0 && self.annual_interest_rate < 1.0) {
            return Err(ValuationError::Config(
                "annual_interest_rate must be in [0, 1)".into(),
            ));
        }
        if self.tax_insurance_rate < 0.0 {
            return Err(ValuationError::Config("tax_insurance_rate must be >= 0".into()));
        }
        if self.amortization_months == 0 {
            return Err(ValuationError::Config("amortization_months must be > 0".into()));
        }
        if self.top_n == 0 {
            return Err(ValuationError::Config("top_n must be > 0".into()));
        }
        if self.min_cluster_size == 0 {
            return Err(ValuationError::Config("min_cluster_size must be > 0".into()));
        }
        if self.blend_global_weight < 0.0 || self.blend_local_weight < 0.0 {
            return Err(ValuationError::Config("blend weights must be non-negative".into()));
        }
        if ((self.blend_global_weight + self.blend_local_weight) - 1.0).abs() > 1e-9 {
            return Err(ValuationError::Config(format!(
                "blend weights must sum to 1.0 (got {} + {})",
                self.blend_global_weight, self.blend_local_weight
            )));
        }
        if self.fee_capitalization_multiplier < 0.0 {
            return Err(ValuationError::Config(
                "fee_capitalization_multiplier must be >= 0".into(),
            ));
        }
        if !(self.risk_multiplier_min > 0.0 && self.risk_multiplier_min <= self.risk_multiplier_max)
        {
            return Err(ValuationError::Config(
                "risk multiplier bounds must satisfy 0 < min <= max".into(),
            ));
        }
        Ok(())
    }
}
