//! Mesh geometry and density-adaptive voxel resolution

use crate::core::types::{UVec3, Vec3};
use crate::math::Aabb;
use crate::scene::decoder::{DecodeError, DecodedPrimitive};

/// Outward inflation of a mesh AABB (0.1%)
pub const MESH_AABB_INFLATION: f32 = 1.001;

/// Outward inflation of the aggregate scene AABB (10%)
pub const SCENE_AABB_INFLATION: f32 = 1.1;

/// Decoded geometry of one registry entry plus its derived grid sizing
#[derive(Debug, Clone)]
pub struct MeshGeometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Inflated bounds, strictly containing every position
    pub aabb: Aabb,
    /// `aabb.max - aabb.min`
    pub dimensions: Vec3,
    pub triangle_count: u32,
    /// Per-axis voxel grid resolution
    pub resolution: UVec3,
}

impl MeshGeometry {
    pub fn new(primitive: DecodedPrimitive, max_resolution: u32) -> Result<Self, DecodeError> {
        let DecodedPrimitive { key, positions, normals, indices } = primitive;

        let aabb = Aabb::from_points(positions.iter().copied())
            .ok_or(DecodeError::EmptyPrimitive(key))?
            .inflated(MESH_AABB_INFLATION);
        let dimensions = aabb.size();
        let triangle_count = (indices.len() / 3) as u32;
        let resolution = voxel_resolution(dimensions, triangle_count, max_resolution);

        Ok(Self {
            positions,
            normals,
            indices,
            aabb,
            dimensions,
            triangle_count,
            resolution,
        })
    }

    /// Number of cells in the voxel grid
    pub fn voxel_count(&self) -> u64 {
        self.resolution.x as u64 * self.resolution.y as u64 * self.resolution.z as u64
    }

    /// Most grid cells covered by any one triangle's bounding box
    pub fn widest_triangle_cells(&self) -> u64 {
        let res = self.resolution.as_vec3();
        let extent = self.dimensions.max(Vec3::splat(1e-6));
        let cell = |p: Vec3| {
            ((p - self.aabb.min) / extent * res)
                .floor()
                .clamp(Vec3::ZERO, res - Vec3::ONE)
                .as_uvec3()
        };

        self.indices
            .chunks_exact(3)
            .filter_map(|triangle| {
                let a = *self.positions.get(triangle[0] as usize)?;
                let b = *self.positions.get(triangle[1] as usize)?;
                let c = *self.positions.get(triangle[2] as usize)?;
                let span = cell(a.max(b).max(c)) - cell(a.min(b).min(c)) + UVec3::ONE;
                Some(u64::from(span.x) * u64::from(span.y) * u64::from(span.z))
            })
            .max()
            .unwrap_or(0)
    }
}

/// Voxels per unit length so that voxel count tracks triangle density.
///
/// `(triangles / volume)^(1/3)`; zero for an empty or zero-volume mesh.
pub fn density_factor(dimensions: Vec3, triangle_count: u32) -> f32 {
    let volume = dimensions.x * dimensions.y * dimensions.z;
    if triangle_count == 0 || volume <= 0.0 || !volume.is_finite() {
        return 0.0;
    }
    (triangle_count as f32 / volume).cbrt()
}

/// `ceil(dimensions * density)` per axis, clamped to `[1, max_resolution]`
pub fn voxel_resolution(dimensions: Vec3, triangle_count: u32, max_resolution: u32) -> UVec3 {
    let density = density_factor(dimensions, triangle_count);
    let axis = |d: f32| {
        let cells = (d * density).ceil();
        if cells.is_finite() {
            (cells as u32).clamp(1, max_resolution.max(1))
        } else {
            1
        }
    };
    UVec3::new(axis(dimensions.x), axis(dimensions.y), axis(dimensions.z))
}
