//! Compute pipelines of the voxelizer and the preview kernel

/// Threads per workgroup of the 1D voxelize kernels
pub const VOXELIZE_WORKGROUP: u32 = 64;

/// Per-dimension workgroup limit of a dispatch
pub const MAX_WORKGROUPS_PER_DIM: u32 = 65535;

/// Cells one voxelize_mesh thread bins before giving up on its triangle
pub const MAX_CELLS_PER_ITEM: u32 = 4096;

const VOXELIZE_MESH_SOURCE: &str = include_str!("../../shaders/voxelize_mesh.wgsl");

/// Edge of the cubic clear workgroup
pub const CLEAR_WORKGROUP: u32 = 4;

/// Edge of the square preview workgroup
pub const PREVIEW_WORKGROUP: u32 = 8;

/// Bind group layouts and pipelines, created once per device
pub struct VoxelPipelines {
    /// Group 0 of clear/voxelize: grid params, cells, overflow list, slot counter
    pub grid_layout: wgpu::BindGroupLayout,
    /// Group 1 of voxelize_mesh: positions, indices
    pub geometry_layout: wgpu::BindGroupLayout,
    /// Group 1 of voxelize_scene: mesh table
    pub mesh_table_layout: wgpu::BindGroupLayout,
    /// Group 0 of preview: preview params, grid params, cells, list, mesh table
    pub preview_layout: wgpu::BindGroupLayout,
    /// Group 1 of preview: output texture
    pub output_layout: wgpu::BindGroupLayout,

    pub clear: wgpu::ComputePipeline,
    pub voxelize_mesh: wgpu::ComputePipeline,
    pub voxelize_scene: wgpu::ComputePipeline,
    pub preview: wgpu::ComputePipeline,
}

impl VoxelPipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let grid_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("voxel_grid_layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, false),
                storage_entry(2, false),
                storage_entry(3, false),
            ],
        });

        let geometry_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mesh_geometry_layout"),
            entries: &[storage_entry(0, true), storage_entry(1, true)],
        });

        let mesh_table_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mesh_table_layout"),
            entries: &[storage_entry(0, true)],
        });

        let preview_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("preview_layout"),
            entries: &[
                uniform_entry(0),
                uniform_entry(1),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, true),
            ],
        });

        let output_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("preview_output_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            }],
        });

        let clear = compute_pipeline(
            device,
            "clear_voxels",
            include_str!("../../shaders/clear_voxels.wgsl"),
            &[&grid_layout],
        );
        let voxelize_mesh = compute_pipeline(
            device,
            "voxelize_mesh",
            VOXELIZE_MESH_SOURCE,
            &[&grid_layout, &geometry_layout],
        );
        let voxelize_scene = compute_pipeline(
            device,
            "voxelize_scene",
            include_str!("../../shaders/voxelize_scene.wgsl"),
            &[&grid_layout, &mesh_table_layout],
        );
        let preview = compute_pipeline(
            device,
            "preview_trace",
            include_str!("../../shaders/preview_trace.wgsl"),
            &[&preview_layout, &output_layout],
        );

        Self {
            grid_layout,
            geometry_layout,
            mesh_table_layout,
            preview_layout,
            output_layout,
            clear,
            voxelize_mesh,
            voxelize_scene,
            preview,
        }
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    layouts: &[&wgpu::BindGroupLayout],
) -> wgpu::ComputePipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: layouts,
        immediate_size: 0,
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

/// Workgroup counts covering `threads` 1D threads, folded into a second
/// dimension once the first exceeds the per-dimension limit
pub fn linear_dispatch(threads: u32) -> (u32, u32) {
    let groups = threads.div_ceil(VOXELIZE_WORKGROUP);
    if groups == 0 {
        return (0, 0);
    }
    let x = groups.min(MAX_WORKGROUPS_PER_DIM);
    (x, groups.div_ceil(x))
}
