//! Buyer-side affordability checks over ranked candidates.
//!
//! Lenders cap total monthly debt at 43% of gross income. FHA loans need
//! 3.5% down and conventional first-time-buyer loans 3%.

use serde::{Deserialize, Serialize};

use crate::config::env_or;
use valuation_core::{is_disallowed_property_type, CandidateEvaluation, ValuationError};

pub const MAX_DTI_RATIO: f64 = 0.43;
pub const FHA_DOWN_PAYMENT_RATE: f64 = 0.035;
pub const CONVENTIONAL_DOWN_PAYMENT_RATE: f64 = 0.03;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerProfile {
    pub yearly_salary: f64,
    /// Cash on hand available for the down payment.
    pub max_down_payment: f64,
    pub price_cap: f64,
    pub monthly_savings: f64,
}

impl Default for BuyerProfile {
    fn default() -> Self {
        Self {
            yearly_salary: 70_000.0,
            max_down_payment: 3_000.0,
            price_cap: 110_000.0,
            monthly_savings: 875.0,
        }
    }
}

impl BuyerProfile {
    pub fn from_env() -> Result<Self, ValuationError> {
        let defaults = Self::default();
        let profile = Self {
            yearly_salary: env_or("BUYER_YEARLY_SALARY", defaults.yearly_salary)?,
            max_down_payment: env_or("BUYER_MAX_DOWN_PAYMENT", defaults.max_down_payment)?,
            price_cap: env_or("BUYER_PRICE_CAP", defaults.price_cap)?,
            monthly_savings: env_or("BUYER_MONTHLY_SAVINGS", defaults.monthly_savings)?,
        };
        if profile.yearly_salary <= 0.0 {
            return Err(ValuationError::Config("BUYER_YEARLY_SALARY must be > 0".into()));
        }
        if profile.max_down_payment < 0.0 || profile.monthly_savings < 0.0 {
            return Err(ValuationError::Config(
                "down payment and savings must be non-negative".into(),
            ));
        }
        Ok(profile)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affordability {
    pub gross_monthly_income: f64,
    pub max_allowable_dti_payment: f64,
    pub fha_down_payment: f64,
    pub conv_down_payment: f64,
    pub can_afford_down_fha: bool,
    pub can_afford_down_conv: bool,
}

pub fn check_affordability(price: f64, yearly_salary: f64, max_down_payment: f64) -> Affordability {
    let gross_monthly_income = yearly_salary / 12.0;
    let fha_down_payment = price * FHA_DOWN_PAYMENT_RATE;
    let conv_down_payment = price * CONVENTIONAL_DOWN_PAYMENT_RATE;
    Affordability {
        gross_monthly_income,
        max_allowable_dti_payment: gross_monthly_income * MAX_DTI_RATIO,
        fha_down_payment,
        conv_down_payment,
        can_afford_down_fha: fha_down_payment <= max_down_payment,
        can_afford_down_conv: conv_down_payment <= max_down_payment,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ViableHome {
    pub house_id: String,
    pub address: String,
    pub property_type: Option<String>,
    pub price: f64,
    pub undervaluation_amount: f64,
    pub undervaluation_pct: f64,
    pub total_monthly_cost: f64,
    pub conv_down_payment: f64,
    /// Carrying cost as a percentage of gross monthly income.
    pub dti_pct: f64,
}

fn excluded(evaluation: &CandidateEvaluation) -> bool {
    evaluation
        .property_type
        .as_deref()
        .map(is_disallowed_property_type)
        .unwrap_or(false)
}

/// Candidates under the price cap whose carrying cost fits the DTI limit, best score first.
pub fn viable_homes(evaluations: &[CandidateEvaluation], profile: &BuyerProfile) -> Vec<ViableHome> {
    let mut homes: Vec<ViableHome> = evaluations
        .iter()
        .filter(|e| {
            if excluded(e) {
                tracing::debug!("Skipping {} ({:?})", e.address, e.property_type);
                return false;
            }
            true
        })
        .filter_map(|e| {
            let stats = check_affordability(e.price, profile.yearly_salary, profile.max_down_payment);
            if e.price > profile.price_cap || e.total_monthly_cost > stats.max_allowable_dti_payment {
                return None;
            }
            Some(ViableHome {
                house_id: e.house_id.clone(),
                address: e.address.clone(),
                property_type: e.property_type.clone(),
                price: e.price,
                undervaluation_amount: e.undervaluation_amount,
                undervaluation_pct: e.undervaluation_pct,
                total_monthly_cost: e.total_monthly_cost,
                conv_down_payment: stats.conv_down_payment,
                dti_pct: e.total_monthly_cost / stats.gross_monthly_income * 100.0,
            })
        })
        .collect();
    homes.sort_by(|a, b| b.undervaluation_pct.total_cmp(&a.undervaluation_pct));
    homes
}

#[derive(Debug, Clone, Serialize)]
pub struct SavingsTarget {
    pub house_id: String,
    pub address: String,
    pub property_type: Option<String>,
    pub price: f64,
    pub required_down: f64,
    pub shortfall: f64,
    pub months_to_save: f64,
    pub undervaluation_amount: f64,
    pub undervaluation_pct: f64,
    /// Instant equity as a percentage of the cash put down.
    pub return_on_cash_pct: f64,
}

/// How long until each candidate's FHA down payment is covered, soonest first.
pub fn savings_timeline(evaluations: &[CandidateEvaluation], profile: &BuyerProfile) -> Vec<SavingsTarget> {
    let mut targets: Vec<SavingsTarget> = evaluations
        .iter()
        .filter(|e| !excluded(e))
        .map(|e| {
            let required_down = e.price * FHA_DOWN_PAYMENT_RATE;
            let shortfall = (required_down - profile.max_down_payment).max(0.0);
            let months_to_save = if shortfall > 0.0 {
                if profile.monthly_savings > 0.0 {
                    shortfall / profile.monthly_savings
                } else {
                    f64::INFINITY
                }
            } else {
                0.0
            };
            let return_on_cash_pct = if required_down > 0.0 {
                e.undervaluation_amount / required_down * 100.0
            } else {
                0.0
            };
            SavingsTarget {
                house_id: e.house_id.clone(),
                address: e.address.clone(),
                property_type: e.property_type.clone(),
                price: e.price,
                required_down,
                shortfall,
                months_to_save,
                undervaluation_amount: e.undervaluation_amount,
                undervaluation_pct: e.undervaluation_pct,
                return_on_cash_pct,
            }
        })
        .collect();
    targets.sort_by(|a, b| a.months_to_save.total_cmp(&b.months_to_save));
    targets
}
