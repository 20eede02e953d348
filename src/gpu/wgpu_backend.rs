//! wgpu implementation of the voxel and frame backends
//!
//! Every phase command opens its own compute pass on a shared command
//! encoder. wgpu orders storage and sampled accesses across pass
//! boundaries, so the pass split is what realises each [`BarrierKind`].

use std::collections::HashMap;

use crate::core::config::RendererConfig;
use crate::core::error::Error;
use crate::core::types::{Result, UVec3};
use crate::gpu::backend::{
    BarrierKind, FrameBackend, FrameInputs, GridTarget, MeshResources, VoxelBackend,
};
use crate::gpu::context::GpuContext;
use crate::gpu::grid::{cell_bytes, list_bytes, upload_storage, storage_buffer, MeshBindings, MeshBuffers, SceneGrid};
use crate::gpu::handle::ResourceTable;
use crate::gpu::layout::{GpuMesh, GridParams, PreviewParams};
use crate::gpu::output::OutputTargets;
use crate::gpu::pipelines::{linear_dispatch, VoxelPipelines, CLEAR_WORKGROUP, PREVIEW_WORKGROUP, VOXELIZE_WORKGROUP};
use crate::math::Aabb;
use crate::scene::{Mesh, MeshGeometry};

pub struct WgpuBackend {
    context: GpuContext,
    pipelines: VoxelPipelines,
    /// Every mesh buffer, addressed by bindless handle
    resources: ResourceTable<wgpu::Buffer>,
    /// Bind groups of each mesh, keyed by its cell-buffer handle
    bindings: HashMap<u64, MeshBindings>,
    /// Global overflow-slot allocator
    slot_counter: wgpu::Buffer,
    scene_grid: SceneGrid,
    preview_params: wgpu::Buffer,
    preview_group: wgpu::BindGroup,
    output: OutputTargets,
    encoder: Option<wgpu::CommandEncoder>,
    overflow_capacity: u32,
    clear_color: f32,
}

impl WgpuBackend {
    pub async fn new(config: &RendererConfig, width: u32, height: u32) -> Result<Self> {
        let context = GpuContext::new().await?;
        let device = &context.device;
        let pipelines = VoxelPipelines::new(device);

        let slot_counter = storage_buffer(device, "overflow_slot_counter", 4, wgpu::BufferUsages::empty());
        let [x, y, z] = config.scene_resolution;
        let scene_grid = SceneGrid::new(
            device,
            &context.queue,
            &pipelines,
            UVec3::new(x, y, z),
            config.overflow_capacity,
            &slot_counter,
        );

        let preview_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("preview_params"),
            size: std::mem::size_of::<PreviewParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let preview_group = create_preview_group(device, &pipelines, &preview_params, &scene_grid);
        let output = OutputTargets::new(device, &pipelines, width, height);

        Ok(Self {
            context,
            pipelines,
            resources: ResourceTable::new(),
            bindings: HashMap::new(),
            slot_counter,
            scene_grid,
            preview_params,
            preview_group,
            output,
            encoder: None,
            overflow_capacity: config.overflow_capacity,
            clear_color: config.clear_color,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }
}

fn create_preview_group(
    device: &wgpu::Device,
    pipelines: &VoxelPipelines,
    preview_params: &wgpu::Buffer,
    scene_grid: &SceneGrid,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("preview_bind_group"),
        layout: &pipelines.preview_layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: preview_params.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: scene_grid.params.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 2, resource: scene_grid.cells.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 3, resource: scene_grid.list.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 4, resource: scene_grid.mesh_table().as_entire_binding() },
        ],
    })
}

fn ensure_encoder<'a>(encoder: &'a mut Option<wgpu::CommandEncoder>, device: &wgpu::Device) -> &'a mut wgpu::CommandEncoder {
    encoder.get_or_insert_with(|| {
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("voxel_frame_encoder"),
        })
    })
}

impl VoxelBackend for WgpuBackend {
    fn allocate_mesh(&mut self, name: &str, geometry: &MeshGeometry) -> Result<MeshResources> {
        let positions: &[u8] = bytemuck::cast_slice(&geometry.positions);
        let normals: &[u8] = bytemuck::cast_slice(&geometry.normals);
        let indices: &[u8] = bytemuck::cast_slice(&geometry.indices);

        // Check every size up front so a failure allocates nothing
        let limit = self.context.max_storage_binding();
        let sizes = [
            ("voxel cells", cell_bytes(geometry.resolution)),
            ("overflow list", list_bytes(self.overflow_capacity)),
            ("positions", positions.len() as u64),
            ("normals", normals.len() as u64),
            ("indices", indices.len() as u64),
        ];
        for (what, size) in sizes {
            if size > limit {
                return Err(Error::Allocation(format!(
                    "{}: {} needs {} bytes, device binding limit is {}",
                    name, what, size, limit
                )));
            }
        }

        let device = &self.context.device;
        let queue = &self.context.queue;
        let none = wgpu::BufferUsages::empty();
        let cells = storage_buffer(device, name, cell_bytes(geometry.resolution), none);
        let list = storage_buffer(device, name, list_bytes(self.overflow_capacity), none);
        let position_buffer = upload_storage(device, queue, name, positions, none);
        let normal_buffer = upload_storage(device, queue, name, normals, none);
        let index_buffer = upload_storage(device, queue, name, indices, none);

        let grid = GridParams::new(&geometry.aabb, geometry.resolution, geometry.triangle_count, self.overflow_capacity);
        let bindings = MeshBindings::new(device, queue, &self.pipelines, name, grid, MeshBuffers {
            cells: &cells,
            list: &list,
            positions: &position_buffer,
            indices: &index_buffer,
            slot_counter: &self.slot_counter,
        });

        let resources = MeshResources {
            voxel_cells: self.resources.insert(cells),
            overflow_list: self.resources.insert(list),
            positions: self.resources.insert(position_buffer),
            normals: self.resources.insert(normal_buffer),
            indices: self.resources.insert(index_buffer),
        };
        self.bindings.insert(resources.voxel_cells.raw(), bindings);
        Ok(resources)
    }

    fn release_mesh(&mut self, resources: MeshResources) {
        self.bindings.remove(&resources.voxel_cells.raw());
        for handle in resources.into_handles() {
            // Dropping defers the free until in-flight work no longer uses it
            if self.resources.remove(handle).is_none() {
                log::warn!("Released a handle that was not resident");
            }
        }
    }

    fn reset_slot_counter(&mut self) {
        let encoder = ensure_encoder(&mut self.encoder, &self.context.device);
        encoder.clear_buffer(&self.slot_counter, 0, None);
    }

    fn clear_grid(&mut self, target: GridTarget<'_>) {
        let (group, resolution) = match target {
            GridTarget::Mesh(mesh) => match self.bindings.get(&mesh.resources().voxel_cells.raw()) {
                Some(bindings) => (&bindings.grid_group, bindings.resolution),
                None => {
                    log::warn!("Mesh {} has no grid bindings", mesh.name());
                    return;
                }
            },
            GridTarget::Scene => (&self.scene_grid.grid_group, self.scene_grid.resolution),
        };

        let encoder = ensure_encoder(&mut self.encoder, &self.context.device);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("clear_voxels_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipelines.clear);
        pass.set_bind_group(0, group, &[]);
        pass.dispatch_workgroups(
            resolution.x.div_ceil(CLEAR_WORKGROUP),
            resolution.y.div_ceil(CLEAR_WORKGROUP),
            resolution.z.div_ceil(CLEAR_WORKGROUP),
        );
    }

    fn barrier(&mut self, kind: BarrierKind) {
        // The next phase opens a new pass, which is where wgpu synchronises
        log::trace!("Barrier {:?}", kind);
    }

    fn voxelize_triangles(&mut self, mesh: &Mesh) {
        let Some(bindings) = self.bindings.get(&mesh.resources().voxel_cells.raw()) else {
            log::warn!("Mesh {} has no grid bindings", mesh.name());
            return;
        };
        let (x, y) = linear_dispatch(bindings.triangles);
        if x == 0 {
            return;
        }

        let encoder = ensure_encoder(&mut self.encoder, &self.context.device);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("voxelize_mesh_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipelines.voxelize_mesh);
        pass.set_bind_group(0, &bindings.grid_group, &[]);
        pass.set_bind_group(1, &bindings.geometry_group, &[]);
        pass.dispatch_workgroups(x, y, 1);
    }

    fn voxelize_meshes(&mut self, bounds: &Aabb, meshes: &[&Mesh]) {
        let table: Vec<GpuMesh> = meshes.iter().map(|m| GpuMesh::from_mesh(m)).collect();
        let grown = self.scene_grid.update(&self.context.device, &self.context.queue, &self.pipelines, bounds, &table);
        if grown {
            self.preview_group = create_preview_group(&self.context.device, &self.pipelines, &self.preview_params, &self.scene_grid);
        }
        if table.is_empty() {
            return;
        }

        let groups = (table.len() as u32).div_ceil(VOXELIZE_WORKGROUP);
        let encoder = ensure_encoder(&mut self.encoder, &self.context.device);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("voxelize_scene_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipelines.voxelize_scene);
        pass.set_bind_group(0, &self.scene_grid.grid_group, &[]);
        pass.set_bind_group(1, &self.scene_grid.mesh_table_group, &[]);
        pass.dispatch_workgroups(groups, 1, 1);
    }

    fn submit(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(std::iter::once(encoder.finish()));
        }
        Ok(())
    }
}

impl FrameBackend for WgpuBackend {
    fn resize_output(&mut self, width: u32, height: u32) -> Result<()> {
        let max = self.context.max_texture_dimension();
        if width > max || height > max {
            return Err(Error::Allocation(format!(
                "output {}x{} exceeds the device texture limit {}",
                width, height, max
            )));
        }
        // Pending work may still reference the old targets
        self.submit()?;
        self.output = OutputTargets::new(&self.context.device, &self.pipelines, width, height);
        Ok(())
    }

    fn output_size(&self) -> (u32, u32) {
        self.output.size()
    }

    fn render(&mut self, inputs: &FrameInputs) -> Result<()> {
        let (width, height) = self.output.size();
        let mesh_count = if inputs.scene_bounds.is_some() { inputs.mesh_count } else { 0 };
        let params = PreviewParams::new(inputs.view, inputs.projection, width, height, mesh_count, self.clear_color);
        self.context.queue.write_buffer(&self.preview_params, 0, bytemuck::bytes_of(&params));

        let encoder = ensure_encoder(&mut self.encoder, &self.context.device);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("preview_trace_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipelines.preview);
        pass.set_bind_group(0, &self.preview_group, &[]);
        pass.set_bind_group(1, self.output.back_bind_group(), &[]);
        pass.dispatch_workgroups(width.div_ceil(PREVIEW_WORKGROUP), height.div_ceil(PREVIEW_WORKGROUP), 1);
        Ok(())
    }

    fn swap(&mut self) {
        self.output.swap();
    }

    fn read_output(&mut self) -> Result<Vec<u8>> {
        self.submit()?;
        self.output.read_front(&self.context.device, &self.context.queue)
    }
}
