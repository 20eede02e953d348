//! GPU-side struct layouts (must match the WGSL structs exactly)

use bytemuck::{Pod, Zeroable};

use crate::core::types::{Mat4, UVec3};
use crate::math::Aabb;
use crate::scene::Mesh;

/// Bytes of one voxel cell: `count: atomic<u32>, head: atomic<u32>`
pub const VOXEL_CELL_BYTES: u64 = 8;

/// Bytes of one overflow-list pair: `vec2<u32>(reference, next)`
pub const LIST_ENTRY_BYTES: u64 = 8;

/// Grid uniform shared by the clear, voxelize and preview kernels (64 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GridParams {
    pub aabb_min: [f32; 4],
    pub aabb_max: [f32; 4],
    /// xyz = cells per axis, w = items binned (triangles or meshes)
    pub resolution: [u32; 4],
    pub list_capacity: u32,
    pub _pad: [u32; 3],
}

impl GridParams {
    pub fn new(bounds: &Aabb, resolution: UVec3, items: u32, list_capacity: u32) -> Self {
        Self {
            aabb_min: bounds.min.extend(0.0).to_array(),
            aabb_max: bounds.max.extend(0.0).to_array(),
            resolution: resolution.extend(items).to_array(),
            list_capacity,
            _pad: [0; 3],
        }
    }
}

/// One entry of the scene's mesh table (96 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuMesh {
    /// xyz = mesh grid resolution, w = triangle count
    pub resolution: [u32; 4],
    pub aabb_min: [f32; 4],
    pub aabb_max: [f32; 4],
    /// cells, overflow list, positions, normals, indices
    pub handles: [[u32; 2]; 5],
    pub _pad: [u32; 2],
}

impl GpuMesh {
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let geometry = mesh.geometry();
        Self {
            resolution: geometry.resolution.extend(geometry.triangle_count).to_array(),
            aabb_min: geometry.aabb.min.extend(0.0).to_array(),
            aabb_max: geometry.aabb.max.extend(0.0).to_array(),
            handles: mesh.resources().handle_words(),
            _pad: [0; 2],
        }
    }
}

/// Preview kernel uniform (112 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PreviewParams {
    pub inv_view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    /// x = width, y = height, z = mesh count
    pub size: [u32; 4],
    pub clear_color: [f32; 4],
}

impl PreviewParams {
    pub fn new(view: Mat4, projection: Mat4, width: u32, height: u32, mesh_count: u32, clear: f32) -> Self {
        let camera_position = view.inverse().w_axis;
        Self {
            inv_view_proj: (projection * view).inverse().to_cols_array_2d(),
            camera_position: camera_position.to_array(),
            size: [width, height, mesh_count, 0],
            clear_color: [clear, clear, clear, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;

    #[test]
    fn test_sizes_match_shaders() {
        assert_eq!(std::mem::size_of::<GridParams>(), 64);
        assert_eq!(std::mem::size_of::<GpuMesh>(), 96);
        assert_eq!(std::mem::size_of::<PreviewParams>(), 112);
    }

    #[test]
    fn test_grid_params_pack_item_count() {
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::splat(2.0));
        let params = GridParams::new(&bounds, UVec3::new(4, 5, 6), 12, 1024);
        assert_eq!(params.resolution, [4, 5, 6, 12]);
        assert_eq!(params.aabb_max, [2.0, 2.0, 2.0, 0.0]);
        assert_eq!(params.list_capacity, 1024);
    }

    #[test]
    fn test_camera_position_from_view() {
        let eye = Vec3::new(3.0, 4.0, 5.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let params = PreviewParams::new(view, Mat4::IDENTITY, 8, 8, 0, 0.2);
        let p = params.camera_position;
        assert!((Vec3::new(p[0], p[1], p[2]) - eye).length() < 1e-4);
        assert_eq!(params.size, [8, 8, 0, 0]);
    }
}
