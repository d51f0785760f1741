use std::path::{Path, PathBuf};

use log::info;

use crate::dataset::TrainingTable;
use crate::errors::{Result, SuperpixelError};
use crate::traits::{Classifier, ModelStore};

/// Classifier hyperparameters threaded through the orchestrator.
///
/// `num_estimators` follows the ensemble learner it parameterizes: more
/// estimators lower variance at higher compute cost. It also names the saved
/// artifact so experiment runs stay distinguishable on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingOptions {
    pub num_estimators: usize,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            num_estimators: 100,
        }
    }
}

/// Artifact filename encoding the estimator count, for reproducibility of
/// experiment artifacts.
pub fn model_filename(options: &TrainingOptions) -> String {
    format!("superpixel_model_nest{}.json", options.num_estimators)
}

/// Fits `classifier` on the assembled training table.
///
/// Pure orchestration: the fitting mathematics belong to the classifier
/// collaborator.
pub fn train<C: Classifier>(mut classifier: C, table: &TrainingTable) -> Result<C> {
    if table.is_empty() {
        return Err(SuperpixelError::Validation {
            field: "training table".to_string(),
            reason: "contains no valid superpixel examples".to_string(),
        });
    }

    let mut represented: Vec<u32> = table.labels.clone();
    represented.sort_unstable();
    represented.dedup();
    info!(
        "Training on {} superpixel examples, classes represented: {:?}",
        table.len(),
        represented
    );

    classifier.fit(table.features.view(), &table.labels)?;
    Ok(classifier)
}

/// Fits and persists in one step, returning the fitted model and the artifact
/// path.
pub fn train_and_save<C, St>(
    classifier: C,
    table: &TrainingTable,
    store: &St,
    artifact_dir: &Path,
    options: &TrainingOptions,
) -> Result<(C, PathBuf)>
where
    C: Classifier,
    St: ModelStore<C>,
{
    let fitted = train(classifier, table)?;
    let path = artifact_dir.join(model_filename(options));
    store.save(&fitted, &path)?;
    info!("Classifier saved at {}", path.display());
    Ok((fitted, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MemoryModelStore, MockClassifier};
    use ndarray::array;

    fn table() -> TrainingTable {
        TrainingTable {
            features: array![[0.0, 1.0], [1.0, 0.0], [2.0, 2.0]],
            labels: vec![1, 2, 3],
        }
    }

    #[test]
    fn train_fits_the_classifier() {
        let fitted = train(MockClassifier::default(), &table()).unwrap();
        assert_eq!(fitted.classes(), &[1, 2, 3]);
    }

    #[test]
    fn empty_table_is_rejected() {
        let empty = TrainingTable {
            features: ndarray::Array2::zeros((0, 0)),
            labels: vec![],
        };
        assert!(matches!(
            train(MockClassifier::default(), &empty).unwrap_err(),
            SuperpixelError::Validation { .. }
        ));
    }

    #[test]
    fn artifact_name_encodes_estimator_count() {
        let options = TrainingOptions { num_estimators: 25 };
        assert_eq!(model_filename(&options), "superpixel_model_nest25.json");
    }

    #[test]
    fn train_and_save_persists_under_encoded_name() {
        let store = MemoryModelStore::default();
        let (fitted, path) = train_and_save(
            MockClassifier::default(),
            &table(),
            &store,
            Path::new("/tmp/models"),
            &TrainingOptions::default(),
        )
        .unwrap();
        assert_eq!(path, Path::new("/tmp/models/superpixel_model_nest100.json"));
        let restored = store.load(&path).unwrap();
        assert_eq!(restored.classes(), fitted.classes());
    }
}
