//! Regression models behind a common `Regressor` capability.
//!
//! Every model standardizes its inputs with statistics captured at fit time and
//! reuses them verbatim at prediction time. None of them draw random numbers, so
//! predictions are reproducible bit-for-bit for a given training set.

mod kernel;
mod neighbors;
mod ridge;
mod scaler;

pub use kernel::KernelRegressor;
pub use neighbors::NearestNeighborRegressor;
pub use ridge::RidgeRegressor;
pub use scaler::StandardScaler;

use nalgebra::DMatrix;
use valuation_core::ValuationError;

/// Fit on labeled feature rows, predict on unlabeled rows.
pub trait Regressor: Send + Sync {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[f64]) -> Result<(), ValuationError>;

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ValuationError>;

    fn name(&self) -> &'static str;

    fn predict_one(&self, row: &[f64]) -> Result<f64, ValuationError> {
        self.predict(&[row.to_vec()])?
            .into_iter()
            .next()
            .ok_or_else(|| ValuationError::CalculationError(format!("{}: empty prediction", self.name())))
    }
}

/// Build a row-major matrix, rejecting ragged or non-finite input.
pub(crate) fn to_matrix(rows: &[Vec<f64>]) -> Result<DMatrix<f64>, ValuationError> {
    if rows.is_empty() {
        return Err(ValuationError::InsufficientData("empty feature table".into()));
    }
    let width = rows[0].len();
    if width == 0 {
        return Err(ValuationError::InvalidData("feature rows have no columns".into()));
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(ValuationError::InvalidData(format!(
                "row {} has {} features, expected {}",
                i,
                row.len(),
                width
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(ValuationError::InvalidData(format!("row {i} has non-finite features")));
        }
    }
    Ok(DMatrix::from_fn(rows.len(), width, |r, c| rows[r][c]))
}

pub(crate) fn check_labels(features: &[Vec<f64>], labels: &[f64]) -> Result<(), ValuationError> {
    if features.len() != labels.len() {
        return Err(ValuationError::InvalidData(format!(
            "{} feature rows but {} labels",
            features.len(),
            labels.len()
        )));
    }
    if labels.iter().any(|v| !v.is_finite()) {
        return Err(ValuationError::InvalidData("non-finite label".into()));
    }
    Ok(())
}
