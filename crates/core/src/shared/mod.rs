pub mod constants;
pub mod frame;
pub mod image_decoder;
pub mod model_resolver;
pub mod onnx_session;
pub mod region;
