use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::corpus::HistoricalCorpus;
use crate::models::{KernelRegressor, NearestNeighborRegressor, Regressor, RidgeRegressor};
use valuation_core::{ListingObservation, ValuationError};

pub type RegressorFactory = fn() -> Box<dyn Regressor>;

/// Which model implementation backs each stage of the valuation stack.
#[derive(Clone, Copy)]
pub struct RegressorSuite {
    pub baseline: RegressorFactory,
    pub time_trend: RegressorFactory,
    pub local: RegressorFactory,
}

impl Default for RegressorSuite {
    fn default() -> Self {
        Self {
            baseline: || Box::new(RidgeRegressor::default()),
            time_trend: || Box::new(KernelRegressor::new()),
            local: || Box::new(NearestNeighborRegressor::default()),
        }
    }
}

/// Listings farther than this from every corpus centroid stay unresolved.
pub const MAX_CENTROID_DISTANCE_KM: f64 = 25.0;

const KM_PER_DEGREE: f64 = 111.32;

/// Global structural features: sqft, beds, baths, neighborhood id, recurring fee.
///
/// `neighborhood_id` must be a corpus id; see [`TrainedModelSet::resolve_neighborhood`].
pub fn baseline_features(obs: &ListingObservation, neighborhood_id: i64) -> Vec<f64> {
    vec![
        obs.sqft,
        obs.beds,
        obs.baths,
        neighborhood_id as f64,
        obs.recurring_fee,
    ]
}

/// How a listing was placed onto a corpus neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborhoodMatch {
    /// The listing already carries a corpus neighborhood id.
    Known(i64),
    /// Nearest corpus centroid by latitude/longitude.
    Nearest(i64),
    /// Nothing matched. The id is in range for the baseline only, no local model applies.
    Unresolved(i64),
}

impl NeighborhoodMatch {
    pub fn id(&self) -> i64 {
        match self {
            Self::Known(id) | Self::Nearest(id) | Self::Unresolved(id) => *id,
        }
    }

    /// Id whose local model may be consulted.
    pub fn local_id(&self) -> Option<i64> {
        match self {
            Self::Known(id) | Self::Nearest(id) => Some(*id),
            Self::Unresolved(_) => None,
        }
    }
}

/// Where the corpus neighborhoods sit, used to place listings from outside the corpus.
#[derive(Debug, Clone, Default)]
pub struct NeighborhoodIndex {
    known: BTreeSet<i64>,
    centroids: BTreeMap<i64, (f64, f64)>,
    fallback: i64,
}

impl NeighborhoodIndex {
    /// Mean coordinates per neighborhood; the fallback is the most populous one.
    pub fn from_corpus(corpus: &HistoricalCorpus) -> Self {
        let mut known = BTreeSet::new();
        let mut fallback = (0i64, 0usize);
        let mut centroids = BTreeMap::new();
        for (neighborhood_id, members) in corpus.clusters() {
            known.insert(neighborhood_id);
            if members.len() > fallback.1 {
                fallback = (neighborhood_id, members.len());
            }
            let located: Vec<(f64, f64)> = members
                .iter()
                .filter_map(|o| Some((o.latitude?, o.longitude?)))
                .filter(|(lat, long)| lat.is_finite() && long.is_finite())
                .collect();
            if located.is_empty() {
                continue;
            }
            let n = located.len() as f64;
            let lat = located.iter().map(|p| p.0).sum::<f64>() / n;
            let long = located.iter().map(|p| p.1).sum::<f64>() / n;
            centroids.insert(neighborhood_id, (lat, long));
        }
        Self {
            known,
            centroids,
            fallback: fallback.0,
        }
    }

    pub fn new(known: impl IntoIterator<Item = i64>, centroids: BTreeMap<i64, (f64, f64)>) -> Self {
        let known: BTreeSet<i64> = known.into_iter().chain(centroids.keys().copied()).collect();
        let fallback = known.iter().next().copied().unwrap_or(0);
        Self {
            known,
            centroids,
            fallback,
        }
    }

    pub fn centroid(&self, neighborhood_id: i64) -> Option<(f64, f64)> {
        self.centroids.get(&neighborhood_id).copied()
    }

    pub fn fallback(&self) -> i64 {
        self.fallback
    }

    pub fn resolve(&self, obs: &ListingObservation) -> NeighborhoodMatch {
        if self.known.contains(&obs.neighborhood_id) {
            return NeighborhoodMatch::Known(obs.neighborhood_id);
        }
        let (Some(lat), Some(long)) = (obs.latitude, obs.longitude) else {
            return NeighborhoodMatch::Unresolved(self.fallback);
        };
        if !lat.is_finite() || !long.is_finite() {
            return NeighborhoodMatch::Unresolved(self.fallback);
        }

        // Equirectangular distance is plenty at metro scale. Ties go to the lower id.
        let mut best: Option<(i64, f64)> = None;
        for (&id, &(c_lat, c_long)) in &self.centroids {
            let d_lat = lat - c_lat;
            let d_long = (long - c_long) * ((lat + c_lat) / 2.0).to_radians().cos();
            let km = KM_PER_DEGREE * (d_lat * d_lat + d_long * d_long).sqrt();
            if best.map_or(true, |(_, d)| km < d) {
                best = Some((id, km));
            }
        }
        match best {
            Some((id, km)) if km <= MAX_CENTROID_DISTANCE_KM => NeighborhoodMatch::Nearest(id),
            _ => NeighborhoodMatch::Unresolved(self.fallback),
        }
    }
}

/// Neighborhood-local features: sqft, beds, baths, days since corpus start, recurring fee.
pub fn local_features(obs: &ListingObservation, days_since_start: i64) -> Vec<f64> {
    vec![
        obs.sqft,
        obs.beds,
        obs.baths,
        days_since_start as f64,
        obs.recurring_fee,
    ]
}

/// Models trained once per engine instance. Immutable after training.
pub struct TrainedModelSet {
    baseline: Box<dyn Regressor>,
    time_trend: Box<dyn Regressor>,
    local_models: BTreeMap<i64, Box<dyn Regressor>>,
    neighborhoods: NeighborhoodIndex,
    corpus_start_date: NaiveDate,
}

impl TrainedModelSet {
    pub fn train(corpus: &HistoricalCorpus, min_cluster_size: usize) -> Result<Self, ValuationError> {
        Self::train_with(corpus, min_cluster_size, RegressorSuite::default())
    }

    pub fn train_with(
        corpus: &HistoricalCorpus,
        min_cluster_size: usize,
        suite: RegressorSuite,
    ) -> Result<Self, ValuationError> {
        if corpus.is_empty() {
            return Err(ValuationError::InsufficientData(
                "cannot train on an empty corpus".into(),
            ));
        }
        let observations = corpus.observations();
        let labels: Vec<f64> = observations.iter().map(|o| o.price).collect();

        tracing::info!("Training baseline valuator on {} observations", observations.len());
        let struct_rows: Vec<Vec<f64>> = observations
            .iter()
            .map(|o| baseline_features(o, o.neighborhood_id))
            .collect();
        let mut baseline = (suite.baseline)();
        baseline.fit(&struct_rows, &labels)?;

        // Trend is fit on baseline residuals so structural mix shifts over
        // time do not leak into the drift estimate.
        let baseline_pred = baseline.predict(&struct_rows)?;
        let residuals: Vec<f64> = labels
            .iter()
            .zip(&baseline_pred)
            .map(|(y, p)| y - p)
            .collect();
        let day_rows: Vec<Vec<f64>> = observations
            .iter()
            .map(|o| vec![corpus.days_since_start(o.observed_at) as f64])
            .collect();

        tracing::info!("Training time trend adjuster on baseline residuals");
        let mut time_trend = (suite.time_trend)();
        time_trend.fit(&day_rows, &residuals)?;

        let mut local_models = BTreeMap::new();
        let mut skipped = 0usize;
        for (neighborhood_id, members) in corpus.clusters() {
            if members.len() < min_cluster_size {
                skipped += 1;
                tracing::debug!(
                    neighborhood_id,
                    size = members.len(),
                    "Cluster below minimum size, no local model"
                );
                continue;
            }
            let rows: Vec<Vec<f64>> = members
                .iter()
                .map(|o| local_features(o, corpus.days_since_start(o.observed_at)))
                .collect();
            let prices: Vec<f64> = members.iter().map(|o| o.price).collect();
            let mut local = (suite.local)();
            local.fit(&rows, &prices)?;
            local_models.insert(neighborhood_id, local);
        }

        tracing::info!(
            "Model training complete: baseline={}, trend={}, local models={} (skipped {} small clusters)",
            baseline.name(),
            time_trend.name(),
            local_models.len(),
            skipped
        );

        let neighborhoods = NeighborhoodIndex::from_corpus(corpus);
        tracing::debug!(
            "Indexed {} neighborhoods ({} with coordinates), fallback {}",
            neighborhoods.known.len(),
            neighborhoods.centroids.len(),
            neighborhoods.fallback
        );

        Ok(Self {
            baseline,
            time_trend,
            local_models,
            neighborhoods,
            corpus_start_date: corpus.start_date(),
        })
    }

    /// Assemble a model set from already-fitted parts. Only the local model
    /// neighborhoods are known until [`Self::with_neighborhoods`] says otherwise.
    pub fn from_parts(
        baseline: Box<dyn Regressor>,
        time_trend: Box<dyn Regressor>,
        local_models: BTreeMap<i64, Box<dyn Regressor>>,
        corpus_start_date: NaiveDate,
    ) -> Self {
        let neighborhoods = NeighborhoodIndex::new(local_models.keys().copied(), BTreeMap::new());
        Self {
            baseline,
            time_trend,
            local_models,
            neighborhoods,
            corpus_start_date,
        }
    }

    pub fn with_neighborhoods(mut self, neighborhoods: NeighborhoodIndex) -> Self {
        self.neighborhoods = neighborhoods;
        self
    }

    pub fn neighborhoods(&self) -> &NeighborhoodIndex {
        &self.neighborhoods
    }

    /// Place a listing onto a corpus neighborhood before it reaches the baseline.
    pub fn resolve_neighborhood(&self, obs: &ListingObservation) -> NeighborhoodMatch {
        self.neighborhoods.resolve(obs)
    }

    pub fn baseline(&self) -> &dyn Regressor {
        self.baseline.as_ref()
    }

    pub fn time_trend(&self) -> &dyn Regressor {
        self.time_trend.as_ref()
    }

    pub fn local_model(&self, neighborhood_id: i64) -> Option<&dyn Regressor> {
        self.local_models.get(&neighborhood_id).map(|m| m.as_ref())
    }

    pub fn local_model_count(&self) -> usize {
        self.local_models.len()
    }

    pub fn local_neighborhoods(&self) -> impl Iterator<Item = i64> + '_ {
        self.local_models.keys().copied()
    }

    pub fn corpus_start_date(&self) -> NaiveDate {
        self.corpus_start_date
    }

    /// Time feature for `date`, always relative to the training anchor.
    pub fn days_since_start(&self, date: NaiveDate) -> i64 {
        (date - self.corpus_start_date).num_days()
    }
}
