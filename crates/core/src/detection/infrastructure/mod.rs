pub mod onnx_yolo_detector;
