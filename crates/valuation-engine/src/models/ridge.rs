use nalgebra::{DMatrix, DVector};

use super::{check_labels, to_matrix, Regressor, StandardScaler};
use valuation_core::ValuationError;

/// L2-regularized linear regression on standardized features.
///
/// Because standardized columns are zero-mean, the intercept is the label
/// mean and only the slope vector goes through the normal equations.
#[derive(Debug, Clone)]
pub struct RidgeRegressor {
    alpha: f64,
    scaler: StandardScaler,
    intercept: f64,
    coefficients: Option<DVector<f64>>,
}

impl Default for RidgeRegressor {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegressor {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.max(0.0),
            scaler: StandardScaler::new(),
            intercept: 0.0,
            coefficients: None,
        }
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> Option<&DVector<f64>> {
        self.coefficients.as_ref()
    }
}

impl Regressor for RidgeRegressor {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[f64]) -> Result<(), ValuationError> {
        check_labels(features, labels)?;
        let x = to_matrix(features)?;
        let z = self.scaler.fit_transform(&x)?;

        let n = labels.len() as f64;
        let y_mean = labels.iter().sum::<f64>() / n;
        let y_centered = DVector::from_iterator(labels.len(), labels.iter().map(|y| y - y_mean));

        let p = z.ncols();
        // A tiny floor keeps the system positive definite when alpha is 0 and
        // a column is constant.
        let ridge = self.alpha.max(1e-9);
        let gram = z.transpose() * &z + DMatrix::<f64>::identity(p, p) * ridge;
        let rhs = z.transpose() * y_centered;

        let coefficients = match gram.clone().cholesky() {
            Some(chol) => chol.solve(&rhs),
            None => gram.lu().solve(&rhs).ok_or_else(|| {
                ValuationError::CalculationError("ridge normal equations are singular".into())
            })?,
        };

        self.intercept = y_mean;
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ValuationError> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or(ValuationError::NotFitted("ridge regressor"))?;
        let z = self.scaler.transform(&to_matrix(features)?)?;
        let fitted = z * coefficients;
        Ok(fitted.iter().map(|v| v + self.intercept).collect())
    }

    fn name(&self) -> &'static str {
        "ridge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn linear_rows() -> (Vec<Vec<f64>>, Vec<f64>) {
        // price = 200 * sqft + 10_000 * beds + 50_000
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![800.0 + 75.0 * i as f64, (1 + i % 4) as f64])
            .collect();
        let labels = rows
            .iter()
            .map(|r| 200.0 * r[0] + 10_000.0 * r[1] + 50_000.0)
            .collect();
        (rows, labels)
    }

    #[test]
    fn test_recovers_linear_relationship() {
        let (rows, labels) = linear_rows();
        let mut model = RidgeRegressor::new(1e-6);
        model.fit(&rows, &labels).unwrap();

        let pred = model.predict_one(&[1500.0, 3.0]).unwrap();
        assert_relative_eq!(pred, 200.0 * 1500.0 + 30_000.0 + 50_000.0, max_relative = 1e-6);
    }

    #[test]
    fn test_regularization_shrinks_toward_mean() {
        let (rows, labels) = linear_rows();
        let mean = labels.iter().sum::<f64>() / labels.len() as f64;

        let mut heavy = RidgeRegressor::new(1e9);
        heavy.fit(&rows, &labels).unwrap();
        let pred = heavy.predict_one(&[3000.0, 4.0]).unwrap();
        assert_relative_eq!(pred, mean, max_relative = 1e-3);
    }

    #[test]
    fn test_predict_before_fit_errors() {
        let model = RidgeRegressor::default();
        assert!(matches!(
            model.predict(&[vec![1.0]]),
            Err(ValuationError::NotFitted(_))
        ));
    }

    #[test]
    fn test_constant_feature_column_is_tolerated() {
        let rows = vec![vec![1.0, 5.0], vec![2.0, 5.0], vec![3.0, 5.0]];
        let labels = vec![10.0, 20.0, 30.0];
        let mut model = RidgeRegressor::new(0.0);
        model.fit(&rows, &labels).unwrap();
        assert_relative_eq!(model.predict_one(&[2.0, 5.0]).unwrap(), 20.0, epsilon = 1e-6);
    }
}
