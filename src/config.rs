use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::errors::{Result, SuperpixelError};
use crate::labels::LabelSpace;
use crate::segmentation::SegmentationParams;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Assemble a superpixel training table from annotated images and fit a
    /// classifier.
    Train(TrainConfig),
    /// Apply a saved classifier to new images, writing per-pixel label maps.
    Predict(PredictConfig),
}

#[derive(Args, Clone)]
pub struct TrainConfig {
    /// Dataset root containing `images/` and matching `labels/` files.
    pub data_dir: PathBuf,

    /// Directory for the saved model artifact.
    #[arg(short, long, default_value = "models")]
    pub model_dir: PathBuf,

    /// Target superpixel count per image.
    #[arg(short = 'n', long, default_value_t = 400)]
    pub num_superpixels: usize,

    /// Segmentation compactness/regularity control.
    #[arg(short, long, default_value_t = 10.0)]
    pub compactness: f32,

    /// Ensemble size forwarded to the classifier and encoded in the artifact
    /// filename.
    #[arg(short = 'e', long, default_value_t = 100)]
    pub num_estimators: usize,

    /// Minimum coverage fraction a tie candidate needs to win a superpixel.
    #[arg(long, default_value_t = 0.5)]
    pub coverage_threshold: f64,

    /// Total number of class labels, void included.
    #[arg(long, default_value_t = 14)]
    pub num_labels: u32,

    /// Reserved void ("unlabeled") class value.
    #[arg(long, default_value_t = 13)]
    pub void_label: u32,
}

impl TrainConfig {
    pub fn label_space(&self) -> Result<LabelSpace> {
        LabelSpace::new(self.num_labels, self.void_label)
    }

    pub const fn segmentation_params(&self) -> SegmentationParams {
        SegmentationParams {
            num_superpixels: self.num_superpixels,
            compactness: self.compactness,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.coverage_threshold) {
            return Err(SuperpixelError::Configuration {
                message: format!(
                    "coverage threshold {} must lie in 0..=1",
                    self.coverage_threshold
                ),
            });
        }
        if self.num_estimators == 0 {
            return Err(SuperpixelError::Configuration {
                message: "num_estimators must be at least 1".to_string(),
            });
        }
        self.label_space().map(|_| ())
    }
}

#[derive(Args, Clone)]
pub struct PredictConfig {
    /// Directory of images to classify.
    pub input_dir: PathBuf,

    #[arg(default_value = "output")]
    pub output_dir: PathBuf,

    /// Saved model artifact from a `train` run.
    #[arg(short, long)]
    pub model_path: PathBuf,

    /// Also compute per-class probability rows (logged per image).
    #[arg(short, long, default_value_t = false)]
    pub probabilities: bool,
}
