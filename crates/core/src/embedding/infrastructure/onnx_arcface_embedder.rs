/// ArcFace face embedder using ONNX Runtime.
///
/// Produces L2-normalized 512-d embeddings from 112x112 RGB face crops
/// (`w600k_r50`).
use std::path::Path;

use crate::embedding::domain::face_embedder::FaceEmbedder;
use crate::shared::frame::Frame;
use crate::shared::onnx_session::{ort_error, SharedSession};
use crate::CapabilityError;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct OnnxArcfaceEmbedder {
    session: SharedSession,
}

impl OnnxArcfaceEmbedder {
    pub fn new(model_path: &Path) -> Result<Self, CapabilityError> {
        Ok(Self {
            session: SharedSession::load(model_path)?,
        })
    }
}

impl FaceEmbedder for OnnxArcfaceEmbedder {
    fn input_size(&self) -> (u32, u32) {
        (INPUT_SIZE as u32, INPUT_SIZE as u32)
    }

    fn embed(&self, face: &Frame) -> Result<Vec<f32>, CapabilityError> {
        let tensor = preprocess(face)?;
        let input_value = ort::value::Tensor::from_array(tensor).map_err(ort_error)?;

        let mut session = self.session.lock()?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(ort_error)?;
        let embedding_array = outputs[0].try_extract_array::<f32>().map_err(ort_error)?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;

        let mut embedding = embedding_slice.to_vec();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

/// Map each channel of a 112x112 crop to [-1, 1], NCHW layout.
fn preprocess(face: &Frame) -> Result<ndarray::Array4<f32>, CapabilityError> {
    let size = (face.width() as usize, face.height() as usize);
    if size != (INPUT_SIZE, INPUT_SIZE) {
        return Err(format!(
            "Face crop must be {INPUT_SIZE}x{INPUT_SIZE}, got {}x{}",
            size.0, size.1
        )
        .into());
    }
    let src = face.as_ndarray();
    let tensor = ndarray::Array4::from_shape_fn((1, 3, INPUT_SIZE, INPUT_SIZE), |(_, c, y, x)| {
        (src[[y, x, c]] as f32 - NORM_MEAN) / NORM_STD
    });
    Ok(tensor)
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
