//! Fafnir - an external real-time voxel renderer driven by a host 3D tool

pub mod core;
pub mod math;
pub mod scene;
pub mod gpu;
pub mod voxel;
pub mod app;
