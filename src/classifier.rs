use std::collections::BTreeMap;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SuperpixelError};
use crate::traits::Classifier;

/// Nearest-centroid classifier.
///
/// The built-in default so the pipeline runs end to end without an external
/// learner: fit stores one mean feature vector per class, predict assigns the
/// class of the closest centroid. Any stronger model slots in through the
/// [`Classifier`] trait without touching pipeline code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NearestCentroidClassifier {
    centroids: Vec<Vec<f32>>,
    classes: Vec<u32>,
}

impl NearestCentroidClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_fitted(&self, feature_len: usize) -> Result<()> {
        if self.classes.is_empty() {
            return Err(SuperpixelError::Model {
                operation: "predict before fit".to_string(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "classifier has not been fitted",
                )),
            });
        }
        if self.centroids[0].len() != feature_len {
            return Err(SuperpixelError::Validation {
                field: "features".to_string(),
                reason: format!(
                    "{} columns do not match fitted feature length {}",
                    feature_len,
                    self.centroids[0].len()
                ),
            });
        }
        Ok(())
    }

    fn distances(&self, row: ArrayView1<'_, f32>) -> Vec<f32> {
        self.centroids
            .iter()
            .map(|centroid| {
                centroid
                    .iter()
                    .zip(row.iter())
                    .map(|(c, v)| (c - v) * (c - v))
                    .sum()
            })
            .collect()
    }
}

impl Classifier for NearestCentroidClassifier {
    fn fit(&mut self, features: ArrayView2<'_, f32>, labels: &[u32]) -> Result<()> {
        if features.nrows() != labels.len() {
            return Err(SuperpixelError::DataIntegrity {
                context: "classifier fit".to_string(),
                expected: labels.len(),
                actual: features.nrows(),
            });
        }
        if labels.is_empty() {
            return Err(SuperpixelError::Validation {
                field: "labels".to_string(),
                reason: "cannot fit on an empty training table".to_string(),
            });
        }

        // BTreeMap keeps classes() ascending, which fixes the probability
        // column order.
        let mut groups: BTreeMap<u32, (Vec<f64>, usize)> = BTreeMap::new();
        for (row, &label) in features.outer_iter().zip(labels.iter()) {
            let (sums, count) = groups
                .entry(label)
                .or_insert_with(|| (vec![0.0; features.ncols()], 0));
            for (sum, &v) in sums.iter_mut().zip(row.iter()) {
                *sum += v as f64;
            }
            *count += 1;
        }

        self.classes = groups.keys().copied().collect();
        self.centroids = groups
            .values()
            .map(|(sums, count)| sums.iter().map(|s| (s / *count as f64) as f32).collect())
            .collect();
        Ok(())
    }

    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Vec<u32>> {
        self.require_fitted(features.ncols())?;
        Ok(features
            .outer_iter()
            .map(|row| {
                let distances = self.distances(row);
                let best = distances
                    .iter()
                    .enumerate()
                    .min_by(|&(_, a), &(_, b)| a.total_cmp(b))
                    .map(|(idx, _)| idx)
                    .unwrap_or_default();
                self.classes[best]
            })
            .collect())
    }

    fn predict_probabilities(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        self.require_fitted(features.ncols())?;
        let mut probs = Array2::zeros((features.nrows(), self.classes.len()));
        for (row_idx, row) in features.outer_iter().enumerate() {
            // Inverse-distance weights normalized to sum to one.
            let weights: Vec<f32> = self
                .distances(row)
                .iter()
                .map(|d| 1.0 / (d + 1e-6))
                .collect();
            let total: f32 = weights.iter().sum();
            for (col, weight) in weights.iter().enumerate() {
                probs[[row_idx, col]] = weight / total;
            }
        }
        Ok(probs)
    }

    fn classes(&self) -> &[u32] {
        &self.classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn fitted() -> NearestCentroidClassifier {
        let mut clf = NearestCentroidClassifier::new();
        clf.fit(
            array![[0.0, 0.0], [2.0, 0.0], [10.0, 10.0], [12.0, 10.0]].view(),
            &[3, 3, 8, 8],
        )
        .unwrap();
        clf
    }

    #[test]
    fn fit_builds_per_class_centroids() {
        let clf = fitted();
        assert_eq!(clf.classes(), &[3, 8]);
        assert_eq!(clf.centroids, vec![vec![1.0, 0.0], vec![11.0, 10.0]]);
    }

    #[test]
    fn predict_assigns_nearest_centroid() {
        let clf = fitted();
        let out = clf
            .predict(array![[0.5, 0.5], [11.0, 9.0]].view())
            .unwrap();
        assert_eq!(out, vec![3, 8]);
    }

    #[test]
    fn probabilities_sum_to_one_per_row() {
        let clf = fitted();
        let probs = clf
            .predict_probabilities(array![[1.0, 0.0], [5.0, 5.0]].view())
            .unwrap();
        for row in probs.outer_iter() {
            let total: f32 = row.iter().sum();
            assert!((total - 1.0).abs() < 1e-5);
        }
        // Row on top of the class-3 centroid should favor column 0.
        assert!(probs[[0, 0]] > probs[[0, 1]]);
    }

    #[test]
    fn feature_width_mismatch_is_rejected() {
        let clf = fitted();
        assert!(clf.predict(Array2::zeros((1, 3)).view()).is_err());
    }
}
