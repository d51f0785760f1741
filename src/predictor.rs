use image::DynamicImage;
use ndarray::prelude::*;

use crate::errors::{Result, SuperpixelError};
use crate::labels::LabelSpace;
use crate::segmentation::{Segmentation, SegmentationParams};
use crate::traits::{Classifier, FeatureExtractor, Segmenter};

/// Per-superpixel classifier output for one image, before expansion.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// One label per superpixel, in the segmentation's ascending-id order.
    pub labels: Vec<u32>,
    pub segmentation: Segmentation,
    /// One probability row per superpixel when requested, columns in the
    /// classifier's `classes()` order.
    pub probabilities: Option<Array2<f32>>,
}

impl Prediction {
    /// Expands per-superpixel labels into a full-resolution label image.
    ///
    /// Every pixel receives the predicted label of its superpixel. The
    /// output never contains the void label: classifiers are never trained
    /// on void examples, so a void prediction means the classifier and the
    /// pipeline disagree about the label space and the batch must stop.
    pub fn expand_to_image(&self, space: &LabelSpace) -> Result<Array2<u32>> {
        if let Some(&void) = self.labels.iter().find(|&&l| space.is_void(l)) {
            return Err(SuperpixelError::DataIntegrity {
                context: "predicted labels contain void".to_string(),
                expected: space.void_label as usize,
                actual: void as usize,
            });
        }
        self.segmentation.expand(&self.labels)
    }
}

/// Runs the fitted classifier over one new image.
///
/// Uses the same segmentation and feature collaborators as training. No
/// exclude list applies at prediction time: without ground truth there is no
/// void-ness to determine, so every superpixel gets a feature row and a
/// prediction. Keeping `params` consistent with the training run is the
/// caller's contract; the artifact envelope records the training-time values
/// for that purpose.
pub fn predict<C, S, F>(
    classifier: &C,
    image: &DynamicImage,
    segmenter: &S,
    extractor: &F,
    params: &SegmentationParams,
    want_probabilities: bool,
) -> Result<Prediction>
where
    C: Classifier,
    S: Segmenter,
    F: FeatureExtractor,
{
    let segmentation = segmenter.segment(image, params)?;
    let features = extractor.compute_features(image, &segmentation, &[])?;
    if features.nrows() != segmentation.len() {
        return Err(SuperpixelError::DataIntegrity {
            context: "prediction feature rows".to_string(),
            expected: segmentation.len(),
            actual: features.nrows(),
        });
    }

    let labels = classifier.predict(features.view())?;
    if labels.len() != segmentation.len() {
        return Err(SuperpixelError::DataIntegrity {
            context: "predicted label count".to_string(),
            expected: segmentation.len(),
            actual: labels.len(),
        });
    }

    let probabilities = if want_probabilities {
        let probs = classifier.predict_probabilities(features.view())?;
        if probs.nrows() != segmentation.len() {
            return Err(SuperpixelError::DataIntegrity {
                context: "predicted probability rows".to_string(),
                expected: segmentation.len(),
                actual: probs.nrows(),
            });
        }
        Some(probs)
    } else {
        None
    };

    Ok(Prediction {
        labels,
        segmentation,
        probabilities,
    })
}
