use std::time::Duration;

use crate::blender::ValuationBlender;
use crate::config::EngineConfig;
use crate::corpus::HistoricalCorpus;
use crate::financial::FinancialCostModel;
use crate::risk::RiskAdjuster;
use crate::training::TrainedModelSet;
use valuation_core::{CandidateEvaluation, ListingObservation, RiskAdvisor, ValuationError};

/// Order by undervaluation descending, ties by `house_id`.
pub fn rank(evaluations: &mut [CandidateEvaluation]) {
    evaluations.sort_by(|a, b| {
        b.undervaluation_pct
            .total_cmp(&a.undervaluation_pct)
            .then_with(|| a.house_id.cmp(&b.house_id))
    });
}

pub fn gems(evaluations: &[CandidateEvaluation], threshold_pct: f64) -> Vec<CandidateEvaluation> {
    evaluations
        .iter()
        .filter(|e| e.undervaluation_pct >= threshold_pct)
        .cloned()
        .collect()
}

/// Blender + cost model + risk reweighting, applied to a batch of listings.
pub struct ValuationPipeline {
    blender: ValuationBlender,
    cost_model: FinancialCostModel,
    risk: RiskAdjuster,
}

impl ValuationPipeline {
    pub fn new(blender: ValuationBlender, cost_model: FinancialCostModel, risk: RiskAdjuster) -> Self {
        Self {
            blender,
            cost_model,
            risk,
        }
    }

    pub fn from_config(models: TrainedModelSet, config: &EngineConfig, risk_timeout: Duration) -> Self {
        Self::new(
            ValuationBlender::from_config(models, config),
            FinancialCostModel::from_config(config),
            RiskAdjuster::from_config(config, risk_timeout),
        )
    }

    /// Train the model set on `corpus` and wire up the pipeline.
    pub fn train(
        corpus: &HistoricalCorpus,
        config: &EngineConfig,
        risk_timeout: Duration,
    ) -> Result<Self, ValuationError> {
        let models = TrainedModelSet::train(corpus, config.min_cluster_size)?;
        Ok(Self::from_config(models, config, risk_timeout))
    }

    pub fn blender(&self) -> &ValuationBlender {
        &self.blender
    }

    pub fn cost_model(&self) -> &FinancialCostModel {
        &self.cost_model
    }

    /// Evaluate and rank every listing. Listings the models cannot value are
    /// logged and left out.
    pub fn rank_all(&self, batch: &[ListingObservation]) -> Vec<CandidateEvaluation> {
        let mut evaluations = Vec::with_capacity(batch.len());
        for obs in batch {
            match self.blender.value(obs) {
                Ok(valuation) => evaluations.push(self.cost_model.evaluate(obs, valuation.predicted)),
                Err(e) => tracing::warn!("Skipping {}: {}", obs.house_id, e),
            }
        }
        rank(&mut evaluations);
        evaluations
    }

    pub fn evaluate(&self, batch: &[ListingObservation], top_n: usize) -> Vec<CandidateEvaluation> {
        let mut ranked = self.rank_all(batch);
        ranked.truncate(top_n);
        ranked
    }

    /// Full ranked pool with the first `top_k` entries risk-adjusted.
    pub async fn rank_all_with_risk(
        &self,
        batch: &[ListingObservation],
        top_k: usize,
        advisor: Option<&dyn RiskAdvisor>,
    ) -> Vec<CandidateEvaluation> {
        let mut ranked = self.rank_all(batch);
        self.risk
            .adjust_top(&mut ranked, top_k, batch, advisor, &self.cost_model)
            .await;
        ranked
    }

    pub async fn evaluate_with_risk(
        &self,
        batch: &[ListingObservation],
        top_n: usize,
        advisor: Option<&dyn RiskAdvisor>,
    ) -> Vec<CandidateEvaluation> {
        let mut ranked = self.rank_all_with_risk(batch, top_n, advisor).await;
        ranked.truncate(top_n);
        ranked
    }

    /// Score the most recent observation of every house in the training corpus.
    pub fn evaluate_history(&self, corpus: &HistoricalCorpus, top_n: usize) -> Vec<CandidateEvaluation> {
        let latest = corpus.latest_per_house();
        tracing::info!("Evaluating {} houses from historical data", latest.len());
        self.evaluate(&latest, top_n)
    }
}
