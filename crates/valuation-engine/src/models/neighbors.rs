use nalgebra::DMatrix;

use super::{check_labels, to_matrix, Regressor, StandardScaler};
use valuation_core::ValuationError;

/// Inverse-distance weighted k-nearest-neighbor interpolator.
///
/// High capacity by construction: a query that matches a training row exactly
/// returns that row's label, so small neighborhood samples are reproduced
/// rather than smoothed away.
#[derive(Debug, Clone)]
pub struct NearestNeighborRegressor {
    k: usize,
    power: f64,
    scaler: StandardScaler,
    train: Option<DMatrix<f64>>,
    labels: Vec<f64>,
}

const EXACT_MATCH_EPS: f64 = 1e-12;

impl Default for NearestNeighborRegressor {
    fn default() -> Self {
        Self::new(3, 2.0)
    }
}

impl NearestNeighborRegressor {
    pub fn new(k: usize, power: f64) -> Self {
        Self {
            k: k.max(1),
            power: power.max(0.0),
            scaler: StandardScaler::new(),
            train: None,
            labels: Vec::new(),
        }
    }
}

impl Regressor for NearestNeighborRegressor {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[f64]) -> Result<(), ValuationError> {
        check_labels(features, labels)?;
        let x = to_matrix(features)?;
        self.train = Some(self.scaler.fit_transform(&x)?);
        self.labels = labels.to_vec();
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ValuationError> {
        let train = self
            .train
            .as_ref()
            .ok_or(ValuationError::NotFitted("nearest-neighbor regressor"))?;
        let query = self.scaler.transform(&to_matrix(features)?)?;
        let k = self.k.min(self.labels.len());

        let mut out = Vec::with_capacity(query.nrows());
        for q in query.row_iter() {
            let mut neighbors: Vec<(f64, usize)> = train
                .row_iter()
                .enumerate()
                .map(|(i, t)| ((&t - &q).norm(), i))
                .collect();
            // Index tiebreak keeps neighbor selection deterministic
            neighbors.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let nearest = &neighbors[..k];

            let exact: Vec<f64> = nearest
                .iter()
                .filter(|(d, _)| *d <= EXACT_MATCH_EPS)
                .map(|(_, i)| self.labels[*i])
                .collect();
            if !exact.is_empty() {
                out.push(exact.iter().sum::<f64>() / exact.len() as f64);
                continue;
            }

            let mut num = 0.0;
            let mut den = 0.0;
            for (d, i) in nearest {
                let w = 1.0 / d.powf(self.power);
                num += w * self.labels[*i];
                den += w;
            }
            out.push(num / den);
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "idw-knn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cluster() -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows = vec![
            vec![1200.0, 2.0, 1.0, 10.0, 0.0],
            vec![1500.0, 3.0, 2.0, 40.0, 150.0],
            vec![1800.0, 3.0, 2.0, 90.0, 150.0],
            vec![2100.0, 4.0, 3.0, 200.0, 300.0],
            vec![2600.0, 5.0, 3.0, 300.0, 0.0],
        ];
        let labels = vec![310_000.0, 365_000.0, 410_000.0, 520_000.0, 640_000.0];
        (rows, labels)
    }

    #[test]
    fn test_reproduces_training_labels() {
        let (rows, labels) = cluster();
        let mut model = NearestNeighborRegressor::default();
        model.fit(&rows, &labels).unwrap();

        let preds = model.predict(&rows).unwrap();
        for (p, y) in preds.iter().zip(&labels) {
            assert_relative_eq!(*p, *y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_interpolates_between_neighbors() {
        let (rows, labels) = cluster();
        let mut model = NearestNeighborRegressor::default();
        model.fit(&rows, &labels).unwrap();

        let pred = model
            .predict_one(&[1650.0, 3.0, 2.0, 65.0, 150.0])
            .unwrap();
        assert!(pred > 300_000.0 && pred < 560_000.0);
    }

    #[test]
    fn test_k_larger_than_sample() {
        let rows = vec![vec![1.0], vec![3.0]];
        let labels = vec![10.0, 30.0];
        let mut model = NearestNeighborRegressor::new(10, 1.0);
        model.fit(&rows, &labels).unwrap();
        // Equidistant from both training points
        assert_relative_eq!(model.predict_one(&[2.0]).unwrap(), 20.0, epsilon = 1e-9);
    }
}
