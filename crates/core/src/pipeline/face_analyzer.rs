use std::sync::Arc;

use crate::detection::domain::face_detector::FaceDetector;
use crate::embedding::domain::face_embedder::FaceEmbedder;
use crate::gallery::domain::gallery_error::GalleryError;
use crate::shared::frame::Frame;
use crate::shared::image_decoder::decode_image;
use crate::shared::region::Region;

/// The image half of both coordinators: decode → detect → crop → embed.
///
/// `sample` threads the 1-based enrollment sample index (or `None` for a
/// recognition query) into every error so callers can say which upload
/// failed.
#[derive(Clone)]
pub struct FaceAnalyzer {
    detector: Arc<dyn FaceDetector>,
    embedder: Arc<dyn FaceEmbedder>,
}

impl FaceAnalyzer {
    pub fn new(detector: Arc<dyn FaceDetector>, embedder: Arc<dyn FaceEmbedder>) -> Self {
        Self { detector, embedder }
    }

    pub fn decode(&self, bytes: &[u8], sample: Option<usize>) -> Result<Frame, GalleryError> {
        decode_image(bytes).map_err(|source| GalleryError::Decode { sample, source })
    }

    pub fn detect(&self, frame: &Frame, sample: Option<usize>) -> Result<Vec<Region>, GalleryError> {
        self.detector
            .detect(frame)
            .map_err(|source| GalleryError::Inference { sample, source })
    }

    /// Crops `region`, resizes it to the embedder's input size and embeds it.
    ///
    /// Returns `Ok(None)` when the region has no pixels inside the frame.
    pub fn embed_region(
        &self,
        frame: &Frame,
        region: &Region,
        sample: Option<usize>,
    ) -> Result<Option<Vec<f32>>, GalleryError> {
        let Some(crop) = frame.crop(region) else {
            return Ok(None);
        };
        let (width, height) = self.embedder.input_size();
        let face = crop.resize(width, height);
        self.embedder
            .embed(&face)
            .map(Some)
            .map_err(|source| GalleryError::Inference { sample, source })
    }
}
