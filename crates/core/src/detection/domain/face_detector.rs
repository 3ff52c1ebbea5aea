use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::CapabilityError;

/// Domain interface for locating faces in a still image.
///
/// Regions come back in the detector's ranking order (most confident
/// first). Implementations are shared by concurrent requests, hence
/// `&self` and `Sync`.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<Region>, CapabilityError>;
}
