use std::path::PathBuf;

use thiserror::Error;

use crate::gallery::domain::gallery_persistence::PersistenceError;
use crate::CapabilityError;

/// Failures surfaced by the collection store and the coordinators.
///
/// "No faces" and "no match" are successful, empty outcomes and never
/// appear here.
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("collection '{0}' not found")]
    NotFound(String),
    #[error("collection '{0}' already exists")]
    AlreadyExists(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to decode {}: {source}", image_label(.sample))]
    Decode {
        sample: Option<usize>,
        #[source]
        source: image::ImageError,
    },
    #[error("no face detected in image {sample}")]
    NoFaceDetected { sample: usize },
    #[error("embedding dimension mismatch in '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },
    #[error("face model failed on {}: {source}", image_label(.sample))]
    Inference {
        sample: Option<usize>,
        #[source]
        source: CapabilityError,
    },
    #[error("gallery store failure: {0}")]
    Store(#[from] PersistenceError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn image_label(sample: &Option<usize>) -> String {
    match sample {
        Some(index) => format!("image {index}"),
        None => "query image".to_string(),
    }
}
