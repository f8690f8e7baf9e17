use crate::config::EngineConfig;
use valuation_core::{CandidateEvaluation, ListingObservation};

/// Converts a predicted price and the listing's carrying costs into a
/// comparable undervaluation score.
#[derive(Debug, Clone)]
pub struct FinancialCostModel {
    annual_interest_rate: f64,
    tax_insurance_rate: f64,
    amortization_months: u32,
    fee_capitalization_multiplier: f64,
}

impl Default for FinancialCostModel {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl FinancialCostModel {
    pub fn new(
        annual_interest_rate: f64,
        tax_insurance_rate: f64,
        amortization_months: u32,
        fee_capitalization_multiplier: f64,
    ) -> Self {
        Self {
            annual_interest_rate,
            tax_insurance_rate,
            amortization_months: amortization_months.max(1),
            fee_capitalization_multiplier,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.annual_interest_rate,
            config.tax_insurance_rate,
            config.amortization_months,
            config.fee_capitalization_multiplier,
        )
    }

    /// Fixed-rate fully amortizing payment on the full price.
    pub fn monthly_mortgage(&self, price: f64) -> f64 {
        let n = self.amortization_months as f64;
        let monthly_rate = self.annual_interest_rate / 12.0;
        if monthly_rate == 0.0 {
            return price / n;
        }
        let growth = (1.0 + monthly_rate).powf(n);
        price * (monthly_rate * growth) / (growth - 1.0)
    }

    pub fn monthly_tax_insurance(&self, price: f64) -> f64 {
        price * self.tax_insurance_rate / 12.0
    }

    pub fn capitalized_cost(&self, recurring_fee: f64) -> f64 {
        recurring_fee * self.fee_capitalization_multiplier
    }

    pub fn evaluate(&self, obs: &ListingObservation, predicted_price: f64) -> CandidateEvaluation {
        let monthly_mortgage = self.monthly_mortgage(obs.price);
        let monthly_tax_ins = self.monthly_tax_insurance(obs.price);
        let mut evaluation = CandidateEvaluation {
            house_id: obs.house_id.clone(),
            address: obs.address.clone(),
            neighborhood_name: obs.neighborhood_name.clone(),
            price: obs.price,
            recurring_fee: obs.recurring_fee,
            predicted_price,
            monthly_mortgage,
            monthly_tax_ins,
            total_monthly_cost: monthly_mortgage + obs.recurring_fee + monthly_tax_ins,
            capitalized_cost: self.capitalized_cost(obs.recurring_fee),
            fee_adjusted_value: 0.0,
            undervaluation_amount: 0.0,
            undervaluation_pct: 0.0,
            risk_multiplier: None,
            risk_reasoning: None,
            property_type: obs.property_type.clone(),
        };
        self.rescore(&mut evaluation);
        evaluation
    }

    /// Recompute the value-derived fields after `predicted_price` changed.
    pub fn rescore(&self, evaluation: &mut CandidateEvaluation) {
        evaluation.fee_adjusted_value = evaluation.predicted_price - evaluation.capitalized_cost;
        evaluation.undervaluation_amount = evaluation.fee_adjusted_value - evaluation.price;
        evaluation.undervaluation_pct =
            undervaluation_pct(evaluation.undervaluation_amount, evaluation.price);
    }
}

/// Percentage of the listed price; a zero price scores zero.
pub fn undervaluation_pct(amount: f64, price: f64) -> f64 {
    if price == 0.0 {
        0.0
    } else {
        amount / price * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::tests::observation;
    use approx::assert_relative_eq;

    #[test]
    fn test_mortgage_payment() {
        let model = FinancialCostModel::default();
        assert_relative_eq!(model.monthly_mortgage(300_000.0), 1798.65, epsilon = 1.0);
    }

    #[test]
    fn test_zero_rate_mortgage_is_straight_line() {
        let model = FinancialCostModel::new(0.0, 0.0, 360, 150.0);
        assert_relative_eq!(model.monthly_mortgage(360_000.0), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_evaluation_fields() {
        let model = FinancialCostModel::default();
        let obs = observation("H1", 1, 1500.0, 200.0, (2025, 3, 1), 300_000.0);
        let e = model.evaluate(&obs, 360_000.0);

        assert_eq!(e.capitalized_cost, 30_000.0);
        assert_eq!(e.fee_adjusted_value, 330_000.0);
        assert_eq!(e.undervaluation_amount, 30_000.0);
        assert_relative_eq!(e.undervaluation_pct, 10.0, epsilon = 1e-12);
        assert_relative_eq!(
            e.undervaluation_pct,
            (e.fee_adjusted_value - e.price) / e.price * 100.0,
            epsilon = 1e-12
        );
        assert_eq!(e.monthly_tax_ins, 0.0);
        assert_relative_eq!(e.total_monthly_cost, e.monthly_mortgage + 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tax_and_insurance_included_in_carrying_cost() {
        let model = FinancialCostModel::new(0.06, 0.024, 360, 150.0);
        let obs = observation("H1", 1, 1500.0, 0.0, (2025, 3, 1), 300_000.0);
        let e = model.evaluate(&obs, 300_000.0);
        assert_relative_eq!(e.monthly_tax_ins, 600.0, epsilon = 1e-9);
        assert_relative_eq!(e.total_monthly_cost, e.monthly_mortgage + 600.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_price_scores_zero() {
        let model = FinancialCostModel::default();
        let obs = observation("FREE", 1, 1500.0, 0.0, (2025, 3, 1), 0.0);
        let e = model.evaluate(&obs, 250_000.0);
        assert_eq!(e.undervaluation_pct, 0.0);
        assert_eq!(e.monthly_mortgage, 0.0);
    }

    #[test]
    fn test_rescore_after_prediction_change() {
        let model = FinancialCostModel::default();
        let obs = observation("H1", 1, 1500.0, 100.0, (2025, 3, 1), 200_000.0);
        let mut e = model.evaluate(&obs, 260_000.0);
        e.predicted_price *= 0.5;
        model.rescore(&mut e);
        assert_eq!(e.fee_adjusted_value, 130_000.0 - 15_000.0);
        assert_relative_eq!(e.undervaluation_pct, -42.5, epsilon = 1e-9);
    }
}
