//! Renderer application: tick loop, camera state and output encoding

pub mod camera;
pub mod output;
pub mod renderer;

pub use camera::CameraState;
pub use output::{output_dimension, OutputEncoder, OutputStatus};
pub use renderer::{Renderer, TickOutcome};
