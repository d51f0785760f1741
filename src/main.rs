use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use image::{GrayImage, ImageFormat};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::info;
use ndarray::Array2;
use rayon::prelude::*;
use walkdir::WalkDir;

use superpixel_class_rs::{
    collaborators::{ColorStatFeatures, GridSegmenter},
    config::{Command, Config, PredictConfig, TrainConfig},
    predictor::predict,
    trainer::{model_filename, train, TrainingOptions},
    AnnotatedImage, DatasetAssembler, JsonModelStore, ModelStore, NearestCentroidClassifier,
    TrainedArtifact,
};

fn main() -> Result<()> {
    pretty_env_logger::init();
    let config = Config::parse();

    match config.command {
        Command::Train(train_config) => run_train(&train_config),
        Command::Predict(predict_config) => run_predict(&predict_config),
    }
}

fn run_train(config: &TrainConfig) -> Result<()> {
    config.validate()?;
    let images_dir = config.data_dir.join("images");
    let labels_dir = config.data_dir.join("labels");
    ensure!(images_dir.exists(), "Images directory does not exist");
    ensure!(labels_dir.exists(), "Labels directory does not exist");

    let image_paths = collect_image_paths(&images_dir);
    ensure!(!image_paths.is_empty(), "No training images found");

    let progress_bar = progress_bar(image_paths.len())?;
    let annotated: Vec<AnnotatedImage> = image_paths
        .par_iter()
        .progress_with(progress_bar.clone())
        .map(|path| load_annotated(path, &images_dir, &labels_dir))
        .collect::<Result<_>>()?;
    progress_bar.finish();

    let space = config.label_space()?;
    let params = config.segmentation_params();
    let segmenter = GridSegmenter;
    let extractor = ColorStatFeatures;
    let assembler = DatasetAssembler::new(&segmenter, &extractor, space, params)
        .with_coverage_threshold(config.coverage_threshold);
    let output = assembler.assemble(&annotated)?;

    info!("Total superpixels = {}", output.report.total_superpixels);
    info!("Total void superpixels = {}", output.report.void_superpixels);
    info!(
        "Total valid superpixels for training = {}",
        output.report.valid_superpixels
    );
    info!(
        "Adjacency checks = {} ({} discarded as void)",
        output.adjacency.total_checks(),
        output.adjacency.void_checks()
    );

    let fitted = train(NearestCentroidClassifier::new(), &output.table)?;
    let artifact = TrainedArtifact {
        classifier: fitted,
        segmentation: params,
        label_space: space,
    };
    let options = TrainingOptions {
        num_estimators: config.num_estimators,
    };
    let artifact_path = config.model_dir.join(model_filename(&options));
    JsonModelStore.save(&artifact, &artifact_path)?;
    info!("Classifier saved at {}", artifact_path.display());

    Ok(())
}

fn run_predict(config: &PredictConfig) -> Result<()> {
    ensure!(config.model_path.exists(), "Model path does not exist");
    ensure!(config.input_dir.exists(), "Input directory does not exist");

    let artifact: TrainedArtifact<NearestCentroidClassifier> =
        JsonModelStore.load(&config.model_path)?;
    ensure!(
        artifact.label_space.num_labels <= 256,
        "Label space too large for 8-bit label images"
    );

    let image_paths = collect_image_paths(&config.input_dir);
    ensure!(!image_paths.is_empty(), "No input images found");

    let progress_bar = progress_bar(image_paths.len())?;
    image_paths
        .par_iter()
        .progress_with(progress_bar.clone())
        .try_for_each(|path| -> Result<()> {
            let image = image::open(path)
                .with_context(|| format!("Failed to open image: {}", path.display()))?;

            let prediction = predict(
                &artifact.classifier,
                &image,
                &GridSegmenter,
                &ColorStatFeatures,
                &artifact.segmentation,
                config.probabilities,
            )?;
            if let Some(probs) = &prediction.probabilities {
                info!(
                    "{}: {} superpixels, {} probability columns",
                    path.display(),
                    probs.nrows(),
                    probs.ncols()
                );
            }

            let label_image = prediction.expand_to_image(&artifact.label_space)?;
            let output_path =
                construct_output_path(path, &config.input_dir, &config.output_dir)?;
            save_label_image(&label_image, &output_path)
                .with_context(|| format!("Failed to save labels: {}", output_path.display()))
        })?;
    progress_bar.finish();

    Ok(())
}

fn collect_image_paths(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| ImageFormat::from_path(e.path()).is_ok())
        .map(|e| e.into_path())
        .collect()
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec} {eta})",
        )?
        .progress_chars("#>-"),
    );
    Ok(bar)
}

fn load_annotated(path: &Path, images_dir: &Path, labels_dir: &Path) -> Result<AnnotatedImage> {
    let image = image::open(path)
        .with_context(|| format!("Failed to open image: {}", path.display()))?;

    let relative = path
        .strip_prefix(images_dir)
        .with_context(|| format!("Image outside images directory: {}", path.display()))?;
    let label_path = labels_dir.join(relative).with_extension("png");
    let ground_truth = load_ground_truth(&label_path)
        .with_context(|| format!("Failed to load ground truth: {}", label_path.display()))?;

    Ok(AnnotatedImage {
        name: path.display().to_string(),
        image,
        ground_truth,
    })
}

/// Ground-truth label maps are grayscale images whose pixel values are class
/// indices.
fn load_ground_truth(path: &Path) -> Result<Array2<u32>> {
    let labels = image::open(path)?.into_luma8();
    let (width, height) = labels.dimensions();
    Ok(Array2::from_shape_fn(
        (height as usize, width as usize),
        |(y, x)| labels.get_pixel(x as u32, y as u32)[0] as u32,
    ))
}

fn save_label_image(labels: &Array2<u32>, path: &Path) -> Result<()> {
    let (height, width) = labels.dim();
    let image = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        image::Luma([labels[[y as usize, x as usize]] as u8])
    });
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

fn construct_output_path(path: &Path, input_dir: &Path, output_dir: &Path) -> Result<PathBuf> {
    let relative = path
        .strip_prefix(input_dir)
        .with_context(|| format!("Input file outside input directory: {}", path.display()))?;
    let output_path = output_dir.join(relative).with_extension("png");
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(output_path)
}
