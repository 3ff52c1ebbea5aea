//! Stub capabilities for coordinator tests.
//!
//! Images are solid-color PNGs. The stub embedder returns the first pixel's
//! RGB as a 3-d vector, so color choice controls cosine distance directly.

use std::sync::Arc;

use crate::detection::domain::face_detector::FaceDetector;
use crate::embedding::domain::face_embedder::FaceEmbedder;
use crate::pipeline::face_analyzer::FaceAnalyzer;
use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::CapabilityError;

pub(crate) use crate::shared::image_decoder::encode_png as png;

/// One face covering the whole image, unless the image is pure black.
pub struct WholeImageDetector;

impl FaceDetector for WholeImageDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Region>, CapabilityError> {
        if frame.data().iter().all(|&b| b == 0) {
            return Ok(Vec::new());
        }
        Ok(vec![
            Region::new(0, 0, frame.width() as i32, frame.height() as i32).with_score(0.9),
        ])
    }
}

/// Returns the same regions for every image.
pub struct FixedRegionsDetector {
    regions: Vec<Region>,
}

impl FixedRegionsDetector {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }
}

impl FaceDetector for FixedRegionsDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<Region>, CapabilityError> {
        Ok(self.regions.clone())
    }
}

pub struct FailingDetector;

impl FaceDetector for FailingDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<Region>, CapabilityError> {
        Err("detector offline".into())
    }
}

/// Embeds a face as the RGB value of its top-left pixel.
pub struct PixelEmbedder;

impl FaceEmbedder for PixelEmbedder {
    fn input_size(&self) -> (u32, u32) {
        (8, 8)
    }

    fn embed(&self, face: &Frame) -> Result<Vec<f32>, CapabilityError> {
        assert_eq!((face.width(), face.height()), (8, 8), "crop was not resized");
        Ok(face.data()[..3].iter().map(|&v| v as f32).collect())
    }
}

pub fn analyzer() -> FaceAnalyzer {
    FaceAnalyzer::new(Arc::new(WholeImageDetector), Arc::new(PixelEmbedder))
}

/// `width x height` PNG whose left half is `left` and right half `right`.
pub fn split_png(width: u32, height: u32, left: [u8; 3], right: [u8; 3]) -> Vec<u8> {
    let mut img = image::RgbImage::new(width, height);
    for (x, _y, pixel) in img.enumerate_pixels_mut() {
        *pixel = image::Rgb(if x < width / 2 { left } else { right });
    }
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}
