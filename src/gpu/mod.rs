//! GPU resources, kernels and backend implementations

pub mod backend;
pub mod context;
pub mod grid;
pub mod handle;
pub mod layout;
pub mod null;
pub mod output;
pub mod pipelines;
pub mod wgpu_backend;

pub use backend::{BarrierKind, FrameBackend, FrameInputs, GridTarget, MeshResources, RenderBackend, VoxelBackend};
pub use context::GpuContext;
pub use handle::{BindlessHandle, ResourceTable};
pub use null::{BackendEvent, NullBackend, NULL_GRAY};
pub use wgpu_backend::WgpuBackend;
