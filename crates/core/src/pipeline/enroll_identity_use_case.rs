use std::sync::Arc;

use crate::detection::domain::face_selection::primary_face;
use crate::gallery::collection_store::VectorCollectionStore;
use crate::gallery::domain::entry::Entry;
use crate::gallery::domain::gallery_error::GalleryError;
use crate::pipeline::face_analyzer::FaceAnalyzer;
use crate::shared::constants::SAMPLES_PER_IDENTITY;

/// Confirmation of a committed enrollment.
#[derive(Clone, Debug, PartialEq)]
pub struct Enrollment {
    pub collection: String,
    pub identity_name: String,
    pub entry_ids: Vec<String>,
}

/// Enrolls one identity from exactly [`SAMPLES_PER_IDENTITY`] photos.
///
/// All samples are embedded before anything is written; the entries are
/// then committed in a single batch. Any failing sample aborts the whole
/// enrollment with nothing stored.
pub struct EnrollIdentityUseCase {
    store: Arc<VectorCollectionStore>,
    analyzer: FaceAnalyzer,
}

impl EnrollIdentityUseCase {
    pub fn new(store: Arc<VectorCollectionStore>, analyzer: FaceAnalyzer) -> Self {
        Self { store, analyzer }
    }

    pub fn execute<B: AsRef<[u8]>>(
        &self,
        collection: &str,
        identity_name: &str,
        samples: &[B],
    ) -> Result<Enrollment, GalleryError> {
        let identity_name = identity_name.trim();
        if identity_name.is_empty() {
            return Err(GalleryError::InvalidArgument(
                "identity name must not be empty".into(),
            ));
        }
        if samples.len() != SAMPLES_PER_IDENTITY {
            return Err(GalleryError::InvalidArgument(format!(
                "exactly {SAMPLES_PER_IDENTITY} images required, got {}",
                samples.len()
            )));
        }
        if !self.store.contains(collection) {
            return Err(GalleryError::NotFound(collection.to_string()));
        }

        let entries = samples
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                let index = i + 1;
                let embedding = self.embed_sample(bytes.as_ref(), index)?;
                Ok(Entry::for_sample(identity_name, index, embedding))
            })
            .collect::<Result<Vec<_>, GalleryError>>()?;

        let entry_ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        self.store.add_entries(collection, entries)?;
        log::info!(
            "Enrolled '{identity_name}' in '{collection}' ({} samples)",
            entry_ids.len()
        );

        Ok(Enrollment {
            collection: collection.to_string(),
            identity_name: identity_name.to_string(),
            entry_ids,
        })
    }

    fn embed_sample(&self, bytes: &[u8], index: usize) -> Result<Vec<f32>, GalleryError> {
        let sample = Some(index);
        let frame = self.analyzer.decode(bytes, sample)?;
        let regions = self.analyzer.detect(&frame, sample)?;
        if regions.len() > 1 {
            log::debug!(
                "Sample {index}: {} faces detected, using the largest",
                regions.len()
            );
        }
        let face = primary_face(&regions, frame.width(), frame.height())
            .ok_or(GalleryError::NoFaceDetected { sample: index })?;
        self.analyzer
            .embed_region(&frame, &face, sample)?
            .ok_or(GalleryError::NoFaceDetected { sample: index })
    }
}
