//! Backend seams between the engine and a GPU implementation

use crate::core::types::{Mat4, Result};
use crate::gpu::handle::BindlessHandle;
use crate::math::Aabb;
use crate::scene::{Mesh, MeshGeometry};

/// GPU resources owned by one mesh, each exposed as a bindless handle
#[derive(Debug)]
pub struct MeshResources {
    /// Per-voxel (count, head) cells
    pub voxel_cells: BindlessHandle,
    /// Fixed-capacity (reference, next) pair table
    pub overflow_list: BindlessHandle,
    pub positions: BindlessHandle,
    pub normals: BindlessHandle,
    pub indices: BindlessHandle,
}

impl MeshResources {
    /// Handles in shader-table order
    pub fn handle_words(&self) -> [[u32; 2]; 5] {
        [
            self.voxel_cells.to_words(),
            self.overflow_list.to_words(),
            self.positions.to_words(),
            self.normals.to_words(),
            self.indices.to_words(),
        ]
    }

    pub fn into_handles(self) -> [BindlessHandle; 5] {
        [self.voxel_cells, self.overflow_list, self.positions, self.normals, self.indices]
    }
}

/// Memory-visibility guarantee between two compute phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierKind {
    /// Storage writes become visible to later storage and atomic access
    StorageWrites,
    /// Writes become visible to later sampling and buffer fetches
    SampledReads,
}

/// Which voxel grid a clear addresses
#[derive(Debug, Clone, Copy)]
pub enum GridTarget<'a> {
    Mesh(&'a Mesh),
    /// The shared scene-level grid
    Scene,
}

/// Camera and scene summary consumed by the render kernel
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs {
    pub view: Mat4,
    pub projection: Mat4,
    /// Inflated scene bounds, if any mesh is registered
    pub scene_bounds: Option<Aabb>,
    pub mesh_count: u32,
}

/// Voxel structure allocation and the phase commands of the voxelizer.
///
/// Phase commands are recorded in order and only take effect at `submit`.
pub trait VoxelBackend {
    /// Allocate every resource a mesh needs; nothing stays allocated on error
    fn allocate_mesh(&mut self, name: &str, geometry: &MeshGeometry) -> Result<MeshResources>;

    fn release_mesh(&mut self, resources: MeshResources);

    /// Reset the global overflow-slot allocator to zero
    fn reset_slot_counter(&mut self);

    fn clear_grid(&mut self, target: GridTarget<'_>);

    fn barrier(&mut self, kind: BarrierKind);

    /// One thread per triangle into the mesh's own grid
    fn voxelize_triangles(&mut self, mesh: &Mesh);

    /// One thread per mesh into the scene grid spanning `bounds`
    fn voxelize_meshes(&mut self, bounds: &Aabb, meshes: &[&Mesh]);

    fn submit(&mut self) -> Result<()>;
}

/// Double-buffered color output
pub trait FrameBackend {
    /// Reallocate both output buffers at a new size
    fn resize_output(&mut self, width: u32, height: u32) -> Result<()>;

    fn output_size(&self) -> (u32, u32);

    /// Record the render kernel into the back buffer
    fn render(&mut self, inputs: &FrameInputs) -> Result<()>;

    /// Exchange front and back buffers
    fn swap(&mut self);

    /// Read the front buffer as tightly packed RGB8, bottom row first
    fn read_output(&mut self) -> Result<Vec<u8>>;
}

/// A complete backend for the tick loop
pub trait RenderBackend: VoxelBackend + FrameBackend {}

impl<T: VoxelBackend + FrameBackend> RenderBackend for T {}
