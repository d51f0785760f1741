use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{DynamicImage, Rgb, RgbImage};
use ndarray::prelude::*;

use crate::errors::{Result, SuperpixelError};
use crate::segmentation::{Segmentation, SegmentationParams};
use crate::traits::{Classifier, FeatureExtractor, ModelStore, Segmenter};

/// Deterministic RGB test image.
pub fn synthetic_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 40) as u8, (y * 40) as u8, ((x + y) * 20) as u8])
    });
    DynamicImage::ImageRgb8(img)
}

/// Quadrant segmenter for tests: splits an even-sized image into four equal
/// superpixels (ids 0..4, row-major) with 4-neighbor adjacency.
#[derive(Debug, Clone, Copy)]
pub struct QuadSegmenter;

impl Segmenter for QuadSegmenter {
    fn segment(&self, image: &DynamicImage, _params: &SegmentationParams) -> Result<Segmentation> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        if width % 2 != 0 || height % 2 != 0 {
            return Err(SuperpixelError::Validation {
                field: "image".to_string(),
                reason: format!("quad segmenter needs even dimensions, got {}x{}", width, height),
            });
        }
        let (half_h, half_w) = (height / 2, width / 2);
        let map = Array2::from_shape_fn((height, width), |(row, col)| {
            let quad_row = (row >= half_h) as u32;
            let quad_col = (col >= half_w) as u32;
            quad_row * 2 + quad_col
        });
        Ok(Segmentation::new(map, vec![(0, 1), (0, 2), (1, 3), (2, 3)]))
    }
}

/// Feature rows `[id, pixel_count]` per non-excluded superpixel, in
/// ascending-id order. Deterministic and cheap, which is all tests need.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockFeatureExtractor;

impl FeatureExtractor for MockFeatureExtractor {
    fn compute_features(
        &self,
        _image: &DynamicImage,
        segmentation: &Segmentation,
        exclude: &[u32],
    ) -> Result<Array2<f32>> {
        let rows: Vec<[f32; 2]> = segmentation
            .superpixel_ids()
            .iter()
            .filter(|id| !exclude.contains(id))
            .map(|&id| [id as f32, segmentation.pixel_count(id) as f32])
            .collect();
        let mut features = Array2::zeros((rows.len(), 2));
        for (i, row) in rows.iter().enumerate() {
            features[[i, 0]] = row[0];
            features[[i, 1]] = row[1];
        }
        Ok(features)
    }
}

/// Memorizing test classifier: predicts the label of the nearest training
/// row. Not a real learner, but it exercises the full capability set.
#[derive(Debug, Clone, Default)]
pub struct MockClassifier {
    training_features: Array2<f32>,
    training_labels: Vec<u32>,
    classes: Vec<u32>,
}

impl MockClassifier {
    fn require_fitted(&self) -> Result<()> {
        if self.training_labels.is_empty() {
            return Err(SuperpixelError::Model {
                operation: "predict before fit".to_string(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "classifier has not been fitted",
                )),
            });
        }
        Ok(())
    }

    fn nearest_label(&self, row: ArrayView1<'_, f32>) -> u32 {
        let mut best = (f32::INFINITY, 0u32);
        for (stored, &label) in self
            .training_features
            .outer_iter()
            .zip(self.training_labels.iter())
        {
            let dist: f32 = stored
                .iter()
                .zip(row.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            if dist < best.0 {
                best = (dist, label);
            }
        }
        best.1
    }
}

impl Classifier for MockClassifier {
    fn fit(&mut self, features: ArrayView2<'_, f32>, labels: &[u32]) -> Result<()> {
        if features.nrows() != labels.len() {
            return Err(SuperpixelError::DataIntegrity {
                context: "mock classifier fit".to_string(),
                expected: labels.len(),
                actual: features.nrows(),
            });
        }
        self.training_features = features.to_owned();
        self.training_labels = labels.to_vec();
        self.classes = labels.to_vec();
        self.classes.sort_unstable();
        self.classes.dedup();
        Ok(())
    }

    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Vec<u32>> {
        self.require_fitted()?;
        Ok(features
            .outer_iter()
            .map(|row| self.nearest_label(row))
            .collect())
    }

    fn predict_probabilities(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let labels = self.predict(features)?;
        let mut probs = Array2::zeros((labels.len(), self.classes.len()));
        for (row, label) in labels.iter().enumerate() {
            let col = self
                .classes
                .iter()
                .position(|c| c == label)
                .unwrap_or_default();
            probs[[row, col]] = 1.0;
        }
        Ok(probs)
    }

    fn classes(&self) -> &[u32] {
        &self.classes
    }
}

/// In-memory model store for tests; keyed by path like a filesystem store.
#[derive(Debug, Default)]
pub struct MemoryModelStore<M> {
    saved: Mutex<HashMap<PathBuf, M>>,
}

impl<M: Clone + Send> ModelStore<M> for MemoryModelStore<M> {
    fn save(&self, model: &M, path: &Path) -> Result<()> {
        self.saved
            .lock()
            .expect("store mutex poisoned")
            .insert(path.to_path_buf(), model.clone());
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<M> {
        self.saved
            .lock()
            .expect("store mutex poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| SuperpixelError::FileSystem {
                path: path.to_path_buf(),
                operation: "load model".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no saved model"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_segmenter_covers_every_pixel() {
        let seg = QuadSegmenter
            .segment(&synthetic_image(6, 4), &SegmentationParams::default())
            .unwrap();
        assert_eq!(seg.superpixel_ids(), &[0, 1, 2, 3]);
        assert_eq!(seg.pixel_count(0) + seg.pixel_count(1) + seg.pixel_count(2) + seg.pixel_count(3), 24);
    }

    #[test]
    fn mock_extractor_honors_exclude_list() {
        let seg = QuadSegmenter
            .segment(&synthetic_image(4, 4), &SegmentationParams::default())
            .unwrap();
        let features = MockFeatureExtractor
            .compute_features(&synthetic_image(4, 4), &seg, &[1, 3])
            .unwrap();
        assert_eq!(features.nrows(), 2);
        assert_eq!(features[[0, 0]], 0.0);
        assert_eq!(features[[1, 0]], 2.0);
    }

    #[test]
    fn mock_classifier_memorizes_training_rows() {
        let mut clf = MockClassifier::default();
        clf.fit(
            ndarray::array![[0.0, 0.0], [10.0, 10.0]].view(),
            &[7, 2],
        )
        .unwrap();
        assert_eq!(clf.classes(), &[2, 7]);
        let out = clf
            .predict(ndarray::array![[0.1, 0.1], [9.0, 9.0]].view())
            .unwrap();
        assert_eq!(out, vec![7, 2]);
    }

    #[test]
    fn unfitted_classifier_refuses_to_predict() {
        let clf = MockClassifier::default();
        assert!(clf.predict(ndarray::Array2::zeros((1, 2)).view()).is_err());
    }
}
