use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SuperpixelError};
use crate::labels::LabelSpace;
use crate::segmentation::SegmentationParams;
use crate::traits::ModelStore;

/// Saved model artifact.
///
/// Carries the segmentation parameters and label space used at training time
/// alongside the classifier, so prediction can reuse the exact training
/// configuration instead of trusting the caller to repeat it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifact<C> {
    pub classifier: C,
    pub segmentation: SegmentationParams,
    pub label_space: LabelSpace,
}

/// Filesystem model store writing JSON artifacts.
///
/// The serialized layout is whatever the classifier's serde implementation
/// produces; this store owns only the file handling.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonModelStore;

impl<M> ModelStore<M> for JsonModelStore
where
    M: Serialize + DeserializeOwned + Send + Sync,
{
    fn save(&self, model: &M, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SuperpixelError::FileSystem {
                path: parent.to_path_buf(),
                operation: "create artifact directory".to_string(),
                source: e,
            })?;
        }
        let file = File::create(path).map_err(|e| SuperpixelError::FileSystem {
            path: path.to_path_buf(),
            operation: "create artifact".to_string(),
            source: e,
        })?;
        serde_json::to_writer(BufWriter::new(file), model)?;
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<M> {
        let file = File::open(path).map_err(|e| SuperpixelError::FileSystem {
            path: path.to_path_buf(),
            operation: "open artifact".to_string(),
            source: e,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
