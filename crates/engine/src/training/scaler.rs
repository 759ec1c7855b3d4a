//! Per-feature standardization

use crate::models::NUM_FEATURES;
use serde::{Deserialize, Serialize};

/// Zero-mean, unit-variance transform fitted on training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: [f64; NUM_FEATURES],
    scale: [f64; NUM_FEATURES],
}

impl Standardizer {
    /// Fit on rows using the population standard deviation.
    ///
    /// Constant features get a scale of 1 so they pass through centered.
    /// An empty input yields the identity transform.
    pub fn fit(rows: &[[f64; NUM_FEATURES]]) -> Self {
        if rows.is_empty() {
            return Self::identity();
        }
        let n = rows.len() as f64;
        let mut mean = [0.0; NUM_FEATURES];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut scale = [0.0; NUM_FEATURES];
        for row in rows {
            for j in 0..NUM_FEATURES {
                scale[j] += (row[j] - mean[j]).powi(2);
            }
        }
        for s in scale.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std < f64::EPSILON { 1.0 } else { std };
        }

        Self { mean, scale }
    }

    pub fn identity() -> Self {
        Self {
            mean: [0.0; NUM_FEATURES],
            scale: [1.0; NUM_FEATURES],
        }
    }

    pub fn transform(&self, row: &[f64; NUM_FEATURES]) -> [f64; NUM_FEATURES] {
        let mut out = [0.0; NUM_FEATURES];
        for j in 0..NUM_FEATURES {
            out[j] = (row[j] - self.mean[j]) / self.scale[j];
        }
        out
    }

    pub fn transform_all(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<[f64; NUM_FEATURES]> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    /// Every mean must be finite and every scale finite and positive
    pub fn validate(&self) -> Result<(), String> {
        if let Some(j) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(format!("scaler mean {} is not finite", j));
        }
        if let Some(j) = self.scale.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(format!("scaler scale {} is {}", j, self.scale[j]));
        }
        Ok(())
    }

    pub fn mean(&self) -> &[f64; NUM_FEATURES] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64; NUM_FEATURES] {
        &self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_transform_zero_mean_unit_variance() {
        let rows = vec![
            [10.0, 5.0, 1.0, 100.0],
            [20.0, 6.0, 2.0, 200.0],
            [30.0, 7.0, 3.0, 300.0],
            [40.0, 8.0, 4.0, 400.0],
        ];
        let scaler = Standardizer::fit(&rows);
        let scaled = scaler.transform_all(&rows);

        for j in 0..NUM_FEATURES {
            let mean: f64 = scaled.iter().map(|r| r[j]).sum::<f64>() / scaled.len() as f64;
            let var: f64 =
                scaled.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / scaled.len() as f64;
            assert!(mean.abs() < 1e-12, "feature {} mean {}", j, mean);
            assert!((var - 1.0).abs() < 1e-12, "feature {} var {}", j, var);
        }
    }

    #[test]
    fn test_constant_feature_keeps_unit_scale() {
        let rows = vec![[1.0, 6.5, 3.0, 4.0], [2.0, 6.5, 3.0, 5.0]];
        let scaler = Standardizer::fit(&rows);
        assert_eq!(scaler.scale()[1], 1.0);
        assert_eq!(scaler.transform(&[1.5, 6.5, 3.0, 4.5])[1], 0.0);
    }

    #[test]
    fn test_empty_fit_is_identity() {
        let scaler = Standardizer::fit(&[]);
        let row = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(scaler.transform(&row), row);
    }

    #[test]
    fn test_validate() {
        let rows = vec![[10.0, 5.0, 1.0, 100.0], [20.0, 6.0, 2.0, 200.0]];
        assert!(Standardizer::fit(&rows).validate().is_ok());
        assert!(Standardizer::identity().validate().is_ok());

        let zero_scale = Standardizer {
            mean: [0.0; NUM_FEATURES],
            scale: [0.0, 1.0, 1.0, 1.0],
        };
        assert!(zero_scale.validate().is_err());

        let negative_scale = Standardizer {
            mean: [0.0; NUM_FEATURES],
            scale: [1.0, -1.0, 1.0, 1.0],
        };
        assert!(negative_scale.validate().is_err());

        let nan_mean = Standardizer {
            mean: [f64::NAN, 0.0, 0.0, 0.0],
            scale: [1.0; NUM_FEATURES],
        };
        assert!(nan_mean.validate().is_err());
    }
}
