use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::training::{baseline_features, local_features, TrainedModelSet};
use valuation_core::{ListingObservation, ValuationError};

/// Components of a single fair-value estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendedValuation {
    pub base: f64,
    pub trend: f64,
    /// `None` when the neighborhood had too few observations for a local model.
    pub local: Option<f64>,
    pub predicted: f64,
}

/// Combines the global baseline, the time-trend correction and the
/// neighborhood-local model into one predicted price.
pub struct ValuationBlender {
    models: TrainedModelSet,
    global_weight: f64,
    local_weight: f64,
}

impl ValuationBlender {
    pub fn new(models: TrainedModelSet, global_weight: f64, local_weight: f64) -> Self {
        Self {
            models,
            global_weight,
            local_weight,
        }
    }

    pub fn from_config(models: TrainedModelSet, config: &EngineConfig) -> Self {
        Self::new(models, config.blend_global_weight, config.blend_local_weight)
    }

    pub fn models(&self) -> &TrainedModelSet {
        &self.models
    }

    pub fn weights(&self) -> (f64, f64) {
        (self.global_weight, self.local_weight)
    }

    pub fn value(&self, obs: &ListingObservation) -> Result<BlendedValuation, ValuationError> {
        let hood = self.models.resolve_neighborhood(obs);
        if hood.id() != obs.neighborhood_id {
            tracing::debug!(
                house_id = %obs.house_id,
                listed = obs.neighborhood_id,
                resolved = ?hood,
                "Listing placed onto corpus neighborhood"
            );
        }

        let days = self.models.days_since_start(obs.observed_at);
        let base = self
            .models
            .baseline()
            .predict_one(&baseline_features(obs, hood.id()))?;
        let trend = self.models.time_trend().predict_one(&[days as f64])?;
        let global = base + trend;

        let local = match hood.local_id().and_then(|id| self.models.local_model(id)) {
            Some(model) => Some(model.predict_one(&local_features(obs, days))?),
            None => None,
        };
        let predicted = match local {
            Some(local) => self.global_weight * global + self.local_weight * local,
            None => global,
        };

        if !predicted.is_finite() {
            return Err(ValuationError::CalculationError(format!(
                "non-finite prediction for {}",
                obs.house_id
            )));
        }

        Ok(BlendedValuation {
            base,
            trend,
            local,
            predicted,
        })
    }
}
