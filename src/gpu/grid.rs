//! Voxel grid GPU resources

use crate::core::types::UVec3;
use crate::gpu::layout::{GpuMesh, GridParams, LIST_ENTRY_BYTES, VOXEL_CELL_BYTES};
use crate::gpu::pipelines::VoxelPipelines;
use crate::math::Aabb;

/// Smallest buffer created, so empty arrays still bind
const MIN_BUFFER_BYTES: u64 = 16;

/// Create a storage buffer holding `bytes`
pub fn upload_storage(device: &wgpu::Device, queue: &wgpu::Queue, label: &str, bytes: &[u8], extra: wgpu::BufferUsages) -> wgpu::Buffer {
    let buffer = storage_buffer(device, label, bytes.len() as u64, extra);
    if !bytes.is_empty() {
        queue.write_buffer(&buffer, 0, bytes);
    }
    buffer
}

/// Create a zero-initialized storage buffer of at least `size` bytes
pub fn storage_buffer(device: &wgpu::Device, label: &str, size: u64, extra: wgpu::BufferUsages) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size.max(MIN_BUFFER_BYTES).next_multiple_of(4),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | extra,
        mapped_at_creation: false,
    })
}

fn uniform_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn grid_bind_group(
    device: &wgpu::Device,
    pipelines: &VoxelPipelines,
    label: &str,
    params: &wgpu::Buffer,
    cells: &wgpu::Buffer,
    list: &wgpu::Buffer,
    slot_counter: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &pipelines.grid_layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: params.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: cells.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 2, resource: list.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 3, resource: slot_counter.as_entire_binding() },
        ],
    })
}

/// Bindings of one mesh grid; the buffers themselves live in the handle table
pub struct MeshBindings {
    /// Static grid params (bounds, resolution, triangle count), held so the
    /// bind groups keep a live buffer
    _params: wgpu::Buffer,
    pub grid_group: wgpu::BindGroup,
    pub geometry_group: wgpu::BindGroup,
    pub resolution: UVec3,
    pub triangles: u32,
}

/// Buffers referenced by a mesh's bind groups
pub struct MeshBuffers<'a> {
    pub cells: &'a wgpu::Buffer,
    pub list: &'a wgpu::Buffer,
    pub positions: &'a wgpu::Buffer,
    pub indices: &'a wgpu::Buffer,
    pub slot_counter: &'a wgpu::Buffer,
}

impl MeshBindings {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &VoxelPipelines,
        name: &str,
        grid: GridParams,
        buffers: MeshBuffers<'_>,
    ) -> Self {
        let params = uniform_buffer(device, name, std::mem::size_of::<GridParams>() as u64);
        queue.write_buffer(&params, 0, bytemuck::bytes_of(&grid));

        let grid_group = grid_bind_group(device, pipelines, name, &params, buffers.cells, buffers.list, buffers.slot_counter);
        let geometry_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(name),
            layout: &pipelines.geometry_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: buffers.positions.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: buffers.indices.as_entire_binding() },
            ],
        });

        Self {
            _params: params,
            grid_group,
            geometry_group,
            resolution: UVec3::new(grid.resolution[0], grid.resolution[1], grid.resolution[2]),
            triangles: grid.resolution[3],
        }
    }
}

/// Bytes of a grid's cell buffer
pub fn cell_bytes(resolution: UVec3) -> u64 {
    resolution.x as u64 * resolution.y as u64 * resolution.z as u64 * VOXEL_CELL_BYTES
}

/// Bytes of an overflow list
pub fn list_bytes(capacity: u32) -> u64 {
    capacity as u64 * LIST_ENTRY_BYTES
}

/// The shared scene-level grid and the mesh table it bins
pub struct SceneGrid {
    pub cells: wgpu::Buffer,
    pub list: wgpu::Buffer,
    pub params: wgpu::Buffer,
    pub grid_group: wgpu::BindGroup,
    pub resolution: UVec3,
    list_capacity: u32,
    mesh_table: wgpu::Buffer,
    mesh_table_capacity: usize,
    pub mesh_table_group: wgpu::BindGroup,
}

impl SceneGrid {
    const INITIAL_MESH_CAPACITY: usize = 64;

    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &VoxelPipelines,
        resolution: UVec3,
        list_capacity: u32,
        slot_counter: &wgpu::Buffer,
    ) -> Self {
        let cells = storage_buffer(device, "scene_voxel_cells", cell_bytes(resolution), wgpu::BufferUsages::empty());
        let list = storage_buffer(device, "scene_overflow_list", list_bytes(list_capacity), wgpu::BufferUsages::empty());
        let params = uniform_buffer(device, "scene_grid_params", std::mem::size_of::<GridParams>() as u64);
        let initial = GridParams::new(&Aabb::default(), resolution, 0, list_capacity);
        queue.write_buffer(&params, 0, bytemuck::bytes_of(&initial));
        let grid_group = grid_bind_group(device, pipelines, "scene_grid", &params, &cells, &list, slot_counter);
        let (mesh_table, mesh_table_group) = Self::create_mesh_table(device, pipelines, Self::INITIAL_MESH_CAPACITY);

        Self {
            cells,
            list,
            params,
            grid_group,
            resolution,
            list_capacity,
            mesh_table,
            mesh_table_capacity: Self::INITIAL_MESH_CAPACITY,
            mesh_table_group,
        }
    }

    fn create_mesh_table(device: &wgpu::Device, pipelines: &VoxelPipelines, capacity: usize) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = storage_buffer(
            device,
            "scene_mesh_table",
            (capacity * std::mem::size_of::<GpuMesh>()) as u64,
            wgpu::BufferUsages::empty(),
        );
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_mesh_table"),
            layout: &pipelines.mesh_table_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() }],
        });
        (buffer, group)
    }

    pub fn mesh_table(&self) -> &wgpu::Buffer {
        &self.mesh_table
    }

    /// Upload this frame's bounds and mesh table.
    ///
    /// Returns true when the table had to grow, invalidating bind groups
    /// that reference it.
    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &VoxelPipelines,
        bounds: &Aabb,
        meshes: &[GpuMesh],
    ) -> bool {
        let mut grown = false;
        if meshes.len() > self.mesh_table_capacity {
            let capacity = meshes.len().next_power_of_two();
            let (buffer, group) = Self::create_mesh_table(device, pipelines, capacity);
            self.mesh_table = buffer;
            self.mesh_table_group = group;
            self.mesh_table_capacity = capacity;
            grown = true;
        }

        let params = GridParams::new(bounds, self.resolution, meshes.len() as u32, self.list_capacity);
        queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
        if !meshes.is_empty() {
            queue.write_buffer(&self.mesh_table, 0, bytemuck::cast_slice(meshes));
        }
        grown
    }
}
