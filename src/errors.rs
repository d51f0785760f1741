use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for the superpixel classification pipeline.
///
/// # Why structured errors
///
/// Each variant captures context specific to its error domain (filesystem,
/// image handling, collaborator calls, data integrity), providing diagnostic
/// information without requiring callers to parse error strings. The thiserror
/// crate generates Display implementations automatically from format strings.
#[derive(Error, Debug)]
pub enum SuperpixelError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },

    /// A superpixel membership mask selected zero pixels. Indicates an
    /// upstream segmentation defect; never recoverable locally.
    #[error("Empty membership mask for superpixel {superpixel_id}")]
    EmptyMask { superpixel_id: u32 },

    /// A broken alignment invariant between feature rows, label rows, or
    /// superpixel enumerations. Always fatal: a misaligned table silently
    /// corrupts every downstream training example, so the batch must stop.
    #[error("Data integrity violation in {context}: expected {expected}, got {actual}")]
    DataIntegrity {
        context: String,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, SuperpixelError>;

/// Convert I/O errors to filesystem errors.
///
/// Some I/O errors occur without specific path/operation context. Code that
/// has context should construct SuperpixelError::FileSystem directly with the
/// specific path and operation.
impl From<std::io::Error> for SuperpixelError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

/// Convert image crate errors to image processing errors.
impl From<image::ImageError> for SuperpixelError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

/// Convert ndarray shape errors to model errors.
///
/// Shape errors occur while building feature matrices or expanding label
/// images, which are part of the model data path, so they are categorized as
/// model errors rather than a separate tensor error type.
impl From<ndarray::ShapeError> for SuperpixelError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "array shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}

/// Convert serde_json errors to model errors; JSON only appears in the
/// classifier artifact envelope.
impl From<serde_json::Error> for SuperpixelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Model {
            operation: "artifact serialization".to_string(),
            source: Box::new(err),
        }
    }
}
