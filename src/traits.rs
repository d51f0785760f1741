use std::path::Path;

use image::DynamicImage;
use ndarray::prelude::*;

use crate::errors::Result;
use crate::segmentation::{Segmentation, SegmentationParams};

/// Oversegmentation collaborator.
///
/// Implementations must assign every pixel exactly one superpixel identifier
/// and report every spatially touching superpixel pair in the adjacency edge
/// list. The algorithm itself (SLIC, watershed, a fixed grid) is opaque to
/// the pipeline.
pub trait Segmenter: Send + Sync {
    fn segment(&self, image: &DynamicImage, params: &SegmentationParams) -> Result<Segmentation>;
}

/// Per-superpixel appearance descriptor collaborator.
///
/// Returns one feature row per superpixel not listed in `exclude`, in the
/// segmentation's ascending-id enumeration order. Row order is load-bearing:
/// the pipeline pairs rows positionally with resolved labels and predictions.
pub trait FeatureExtractor: Send + Sync {
    fn compute_features(
        &self,
        image: &DynamicImage,
        segmentation: &Segmentation,
        exclude: &[u32],
    ) -> Result<Array2<f32>>;
}

/// Trainable multi-class classifier.
///
/// Any model satisfying this capability set (tree ensemble, linear model,
/// nearest centroid) is substitutable without touching pipeline code; this is
/// the system's key extension point. Probability rows follow `classes()`
/// column order.
pub trait Classifier: Send + Sync {
    /// Fits the model on a training table. `labels[i]` annotates feature row
    /// `i`; the caller guarantees the rows never include void examples.
    fn fit(&mut self, features: ArrayView2<'_, f32>, labels: &[u32]) -> Result<()>;

    /// One predicted label per feature row.
    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Vec<u32>>;

    /// One probability row per feature row, columns ordered by `classes()`.
    fn predict_probabilities(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>>;

    /// Class labels the model was fitted on, ascending.
    fn classes(&self) -> &[u32];
}

/// Opaque persistence collaborator for fitted model artifacts.
pub trait ModelStore<M>: Send + Sync {
    fn save(&self, model: &M, path: &Path) -> Result<()>;
    fn load(&self, path: &Path) -> Result<M>;
}
