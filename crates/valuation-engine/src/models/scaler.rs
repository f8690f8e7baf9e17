use nalgebra::DMatrix;
use statrs::statistics::Statistics;

use valuation_core::ValuationError;

/// Per-column standardization (zero mean, unit population variance).
///
/// Constant columns keep a scale of 1 so they pass through centered rather
/// than dividing by zero.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

const MIN_SCALE: f64 = 1e-12;

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        !self.means.is_empty()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    pub fn fit(&mut self, x: &DMatrix<f64>) {
        self.means.clear();
        self.scales.clear();
        for col in x.column_iter() {
            let mean = col.iter().mean();
            let std = col.iter().population_std_dev();
            self.means.push(mean);
            self.scales
                .push(if std.is_finite() && std > MIN_SCALE { std } else { 1.0 });
        }
    }

    pub fn transform(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, ValuationError> {
        if !self.is_fitted() {
            return Err(ValuationError::NotFitted("standard scaler"));
        }
        if x.ncols() != self.means.len() {
            return Err(ValuationError::InvalidData(format!(
                "scaler fitted on {} columns, got {}",
                self.means.len(),
                x.ncols()
            )));
        }
        Ok(DMatrix::from_fn(x.nrows(), x.ncols(), |r, c| {
            (x[(r, c)] - self.means[c]) / self.scales[c]
        }))
    }

    pub fn fit_transform(&mut self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, ValuationError> {
        self.fit(x);
        self.transform(x)
    }
}
