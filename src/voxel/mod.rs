//! Voxelization of registered meshes into per-mesh and scene-level grids

pub mod voxelizer;

pub use voxelizer::{VoxelizeReport, Voxelizer};
