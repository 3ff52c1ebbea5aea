use std::sync::Arc;

use crate::gallery::collection_store::VectorCollectionStore;
use crate::gallery::domain::entry::Neighbor;
use crate::gallery::domain::gallery_error::GalleryError;
use crate::pipeline::face_analyzer::FaceAnalyzer;
use crate::shared::region::Region;

/// Outcome for one detected face.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceMatch {
    pub region: Region,
    /// Closest gallery entry. `None` when the collection is empty or the
    /// region has no pixels inside the image.
    pub nearest: Option<Neighbor>,
    pub accepted: bool,
}

impl FaceMatch {
    /// The matched identity, only when the match was accepted.
    pub fn identity(&self) -> Option<&str> {
        if !self.accepted {
            return None;
        }
        self.nearest
            .as_ref()
            .map(|n| n.metadata.identity_name.as_str())
    }

    pub fn distance(&self) -> Option<f64> {
        self.nearest.as_ref().map(|n| n.distance)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Recognition {
    pub collection: String,
    /// One entry per detected face, in detector order.
    pub faces: Vec<FaceMatch>,
}

impl Recognition {
    /// Accepted identity names in detector order. Duplicates are kept.
    pub fn names(&self) -> Vec<String> {
        self.faces
            .iter()
            .filter_map(FaceMatch::identity)
            .map(str::to_string)
            .collect()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

/// Names every face in a query photo against one collection.
///
/// A face is accepted when its nearest entry lies within `threshold`
/// (inclusive) cosine distance.
pub struct RecognizeFacesUseCase {
    store: Arc<VectorCollectionStore>,
    analyzer: FaceAnalyzer,
}

impl RecognizeFacesUseCase {
    pub fn new(store: Arc<VectorCollectionStore>, analyzer: FaceAnalyzer) -> Self {
        Self { store, analyzer }
    }

    pub fn execute(
        &self,
        collection: &str,
        image: &[u8],
        threshold: f64,
    ) -> Result<Recognition, GalleryError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(GalleryError::InvalidArgument(format!(
                "threshold must be a non-negative number, got {threshold}"
            )));
        }
        if !self.store.contains(collection) {
            return Err(GalleryError::NotFound(collection.to_string()));
        }

        let frame = self.analyzer.decode(image, None)?;
        let regions = self.analyzer.detect(&frame, None)?;
        log::debug!("Detected {} faces in query for '{collection}'", regions.len());

        let mut faces = Vec::with_capacity(regions.len());
        for region in regions {
            let nearest = match self.analyzer.embed_region(&frame, &region, None)? {
                Some(embedding) => self
                    .store
                    .query_nearest(collection, &embedding, 1)?
                    .into_iter()
                    .next(),
                None => {
                    log::debug!("Face at ({}, {}) lies outside the image", region.x, region.y);
                    None
                }
            };
            let accepted = nearest.as_ref().is_some_and(|n| n.distance <= threshold);
            if let Some(n) = &nearest {
                log::debug!(
                    "Face at ({}, {}): nearest '{}' at {:.4} ({})",
                    region.x,
                    region.y,
                    n.metadata.identity_name,
                    n.distance,
                    if accepted { "accepted" } else { "rejected" }
                );
            }
            faces.push(FaceMatch {
                region,
                nearest,
                accepted,
            });
        }

        let recognition = Recognition {
            collection: collection.to_string(),
            faces,
        };
        log::info!(
            "Recognized {} of {} faces in '{collection}'",
            recognition.names().len(),
            recognition.face_count()
        );
        Ok(recognition)
    }
}
