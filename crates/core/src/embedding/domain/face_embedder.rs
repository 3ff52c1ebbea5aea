use crate::shared::frame::Frame;
use crate::CapabilityError;

/// Domain interface for turning a face crop into a fixed-length vector.
///
/// Identical input must produce identical output. Callers resize crops to
/// [`FaceEmbedder::input_size`] before calling [`FaceEmbedder::embed`].
pub trait FaceEmbedder: Send + Sync {
    /// `(width, height)` of the face image the model consumes.
    fn input_size(&self) -> (u32, u32);

    fn embed(&self, face: &Frame) -> Result<Vec<f32>, CapabilityError>;
}
