use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gallery::domain::distance::DistanceMetric;
use crate::gallery::domain::entry::Entry;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed collection document {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable image of one collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredCollection {
    pub name: String,
    pub metric: DistanceMetric,
    /// Embedding length, fixed by the first insert.
    pub dimension: Option<usize>,
    pub entries: Vec<Entry>,
}

impl StoredCollection {
    pub fn empty(name: &str, metric: DistanceMetric) -> Self {
        Self {
            name: name.to_string(),
            metric,
            dimension: None,
            entries: Vec::new(),
        }
    }
}

/// Durable backing for the collection store.
///
/// Each call persists or removes a whole collection; the store serializes
/// calls per collection name, so implementations need no locking of their
/// own beyond being shareable across threads.
pub trait GalleryPersistence: Send + Sync {
    /// Loads every persisted collection.
    fn load_all(&self) -> Result<Vec<StoredCollection>, PersistenceError>;

    /// Replaces the durable image of `collection` (creating it if absent).
    fn save_collection(&self, collection: &StoredCollection) -> Result<(), PersistenceError>;

    /// Removes a collection's durable image. Removing an absent one succeeds.
    fn remove_collection(&self, name: &str) -> Result<(), PersistenceError>;
}
