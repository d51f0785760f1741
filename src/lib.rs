//! Superpixel-level semantic classification pipeline.
//!
//! Assigns a class label to each superpixel of a photograph with a trained
//! classifier. The batch workflow has four stages: resolve a majority-vote
//! label per superpixel from pixel-level ground truth, assemble a flat
//! training table over an annotated image collection, fit a classifier, and
//! expand per-superpixel predictions back into full-resolution label images.
//!
//! Segmentation, feature extraction, the classifier and artifact persistence
//! are collaborators behind the traits in [`traits`]; baseline
//! implementations live in [`collaborators`], [`classifier`] and
//! [`persistence`].

pub mod classifier;
pub mod collaborators;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod labels;
pub mod persistence;
pub mod predictor;
pub mod segmentation;
pub mod trainer;
pub mod traits;

pub mod mocks;

pub use classifier::NearestCentroidClassifier;
pub use config::Config;
pub use dataset::{
    AdjacencyStats, AnnotatedImage, AssemblyOutput, AssemblyReport, DatasetAssembler,
    SuperpixelRecord, TrainingTable,
};
pub use errors::{Result, SuperpixelError};
pub use labels::{resolve_label, LabelSpace, Resolution};
pub use persistence::{JsonModelStore, TrainedArtifact};
pub use predictor::{predict, Prediction};
pub use segmentation::{Segmentation, SegmentationParams};
pub use trainer::{model_filename, train, train_and_save, TrainingOptions};
pub use traits::*;

#[cfg(test)]
pub use mocks::*;
