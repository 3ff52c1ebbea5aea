use serde::{Deserialize, Serialize};

/// Identity fields attached to every stored embedding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub identity_name: String,
    /// 1-based index of the enrollment sample this embedding came from.
    pub sample_index: usize,
}

/// One stored embedding within a collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: EntryMetadata,
}

impl Entry {
    /// Builds the entry for one enrollment sample, deriving its id from
    /// `(identity_name, sample_index)` so re-enrollment overwrites in place.
    pub fn for_sample(identity_name: &str, sample_index: usize, embedding: Vec<f32>) -> Self {
        Self {
            id: entry_id(identity_name, sample_index),
            embedding,
            metadata: EntryMetadata {
                identity_name: identity_name.to_string(),
                sample_index,
            },
        }
    }
}

pub fn entry_id(identity_name: &str, sample_index: usize) -> String {
    format!("{identity_name}_{sample_index}")
}

/// A nearest-neighbor hit returned by a collection query.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
    pub entry_id: String,
    pub metadata: EntryMetadata,
    pub distance: f64,
}
