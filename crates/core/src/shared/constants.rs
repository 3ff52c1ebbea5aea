pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Reference samples committed per identity at enrollment.
pub const SAMPLES_PER_IDENTITY: usize = 3;

/// Maximum cosine distance at which a face is accepted as a gallery match.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Worker threads used by bulk enrollment when the caller does not choose.
pub const DEFAULT_BULK_WORKERS: usize = 4;
