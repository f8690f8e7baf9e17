use nalgebra::DMatrix;

use super::{check_labels, to_matrix, Regressor, StandardScaler};
use valuation_core::ValuationError;

/// Nadaraya-Watson smoother with a Gaussian kernel.
///
/// Used for the market-drift curve: each prediction is a locally weighted mean
/// of the training labels around the query point. Bandwidth defaults to
/// Scott's rule in standardized units, `n^(-1/(d+4))`.
#[derive(Debug, Clone, Default)]
pub struct KernelRegressor {
    bandwidth: Option<f64>,
    fitted_bandwidth: f64,
    scaler: StandardScaler,
    train: Option<DMatrix<f64>>,
    labels: Vec<f64>,
}

impl KernelRegressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bandwidth(bandwidth: f64) -> Self {
        Self {
            bandwidth: Some(bandwidth),
            ..Self::default()
        }
    }

    pub fn bandwidth(&self) -> f64 {
        self.fitted_bandwidth
    }
}

impl Regressor for KernelRegressor {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[f64]) -> Result<(), ValuationError> {
        check_labels(features, labels)?;
        let x = to_matrix(features)?;
        let z = self.scaler.fit_transform(&x)?;

        let n = z.nrows() as f64;
        let d = z.ncols() as f64;
        let bandwidth = self
            .bandwidth
            .unwrap_or_else(|| n.powf(-1.0 / (d + 4.0)))
            .max(1e-6);

        self.fitted_bandwidth = bandwidth;
        self.train = Some(z);
        self.labels = labels.to_vec();
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ValuationError> {
        let train = self
            .train
            .as_ref()
            .ok_or(ValuationError::NotFitted("kernel regressor"))?;
        let query = self.scaler.transform(&to_matrix(features)?)?;
        let two_h2 = 2.0 * self.fitted_bandwidth * self.fitted_bandwidth;

        let mut out = Vec::with_capacity(query.nrows());
        for q in query.row_iter() {
            let sq_dists: Vec<f64> = train
                .row_iter()
                .map(|t| (&t - &q).norm_squared())
                .collect();
            // Shift by the nearest distance so far-away queries still get
            // non-zero weights instead of 0/0.
            let min_d = sq_dists.iter().copied().fold(f64::INFINITY, f64::min);
            let mut num = 0.0;
            let mut den = 0.0;
            for (d, y) in sq_dists.iter().zip(&self.labels) {
                let w = (-(d - min_d) / two_h2).exp();
                num += w * y;
                den += w;
            }
            out.push(num / den);
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "gaussian-kernel"
    }
}
