pub mod camera;
pub mod recognizer;
pub mod rgba_converter;

pub use camera::{CameraStream, available_cameras, start_camera_stream};
pub use recognizer::{EstimatorBackend, EstimatorSettings, start_estimator};
