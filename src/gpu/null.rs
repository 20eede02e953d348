//! GPU-free backend
//!
//! Tracks resource residency through the same handle table as the wgpu
//! backend and records every phase command, so voxelizer sequencing and
//! resource lifetime can be observed without a device.

use crate::core::error::Error;
use crate::core::types::Result;
use crate::gpu::backend::{
    BarrierKind, FrameBackend, FrameInputs, GridTarget, MeshResources, VoxelBackend,
};
use crate::gpu::handle::ResourceTable;
use crate::math::Aabb;
use crate::scene::{Mesh, MeshGeometry};

/// Gray level of every pixel the null backend produces
pub const NULL_GRAY: u8 = 128;

/// Recorded events kept before the oldest half is discarded
const EVENT_LOG_LIMIT: usize = 4096;

/// One recorded backend command
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    Allocate(String),
    Release(String),
    ResetSlotCounter,
    ClearMesh(String),
    ClearScene,
    Barrier(BarrierKind),
    VoxelizeTriangles { mesh: String, triangles: u32 },
    VoxelizeMeshes { count: usize },
    Resize { width: u32, height: u32 },
    Render { mesh_count: u32 },
    Submit,
    Swap,
}

#[derive(Debug)]
struct NullResource {
    mesh: String,
}

#[derive(Debug, Default)]
pub struct NullBackend {
    resident: ResourceTable<NullResource>,
    events: Vec<BackendEvent>,
    releases: usize,
    /// Successful allocations left before every further one fails
    fail_after: Option<usize>,
    width: u32,
    height: u32,
}

impl NullBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Fail mesh allocation once `successes` more allocations have succeeded
    pub fn fail_after(mut self, successes: usize) -> Self {
        self.fail_after = Some(successes);
        self
    }

    pub fn events(&self) -> &[BackendEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<BackendEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of resident resources (five per mesh)
    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    /// Number of mesh resource sets released
    pub fn release_count(&self) -> usize {
        self.releases
    }

    /// Triangle-phase dispatches recorded for `mesh`
    pub fn voxelize_count(&self, mesh: &str) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, BackendEvent::VoxelizeTriangles { mesh: m, .. } if m == mesh))
            .count()
    }
}

impl NullBackend {
    fn record(&mut self, event: BackendEvent) {
        if self.events.len() >= EVENT_LOG_LIMIT {
            self.events.drain(..EVENT_LOG_LIMIT / 2);
        }
        self.events.push(event);
    }
}

impl VoxelBackend for NullBackend {
    fn allocate_mesh(&mut self, name: &str, _geometry: &MeshGeometry) -> Result<MeshResources> {
        if let Some(left) = self.fail_after.as_mut() {
            if *left == 0 {
                return Err(Error::Allocation(format!("{}: null backend allocation limit", name)));
            }
            *left -= 1;
        }

        let mut resident = || self.resident.insert(NullResource { mesh: name.to_string() });
        let resources = MeshResources {
            voxel_cells: resident(),
            overflow_list: resident(),
            positions: resident(),
            normals: resident(),
            indices: resident(),
        };
        self.record(BackendEvent::Allocate(name.to_string()));
        Ok(resources)
    }

    fn release_mesh(&mut self, resources: MeshResources) {
        let mut name = None;
        for handle in resources.into_handles() {
            if let Some(resource) = self.resident.remove(handle) {
                name = Some(resource.mesh);
            }
        }
        self.releases += 1;
        self.record(BackendEvent::Release(name.unwrap_or_default()));
    }

    fn reset_slot_counter(&mut self) {
        self.record(BackendEvent::ResetSlotCounter);
    }

    fn clear_grid(&mut self, target: GridTarget<'_>) {
        self.record(match target {
            GridTarget::Mesh(mesh) => BackendEvent::ClearMesh(mesh.name().to_string()),
            GridTarget::Scene => BackendEvent::ClearScene,
        });
    }

    fn barrier(&mut self, kind: BarrierKind) {
        self.record(BackendEvent::Barrier(kind));
    }

    fn voxelize_triangles(&mut self, mesh: &Mesh) {
        self.record(BackendEvent::VoxelizeTriangles {
            mesh: mesh.name().to_string(),
            triangles: mesh.geometry().triangle_count,
        });
    }

    fn voxelize_meshes(&mut self, _bounds: &Aabb, meshes: &[&Mesh]) {
        self.record(BackendEvent::VoxelizeMeshes { count: meshes.len() });
    }

    fn submit(&mut self) -> Result<()> {
        self.record(BackendEvent::Submit);
        Ok(())
    }
}

impl FrameBackend for NullBackend {
    fn resize_output(&mut self, width: u32, height: u32) -> Result<()> {
        self.record(BackendEvent::Resize { width, height });
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn output_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render(&mut self, inputs: &FrameInputs) -> Result<()> {
        self.record(BackendEvent::Render { mesh_count: inputs.mesh_count });
        Ok(())
    }

    fn swap(&mut self) {
        self.record(BackendEvent::Swap);
    }

    fn read_output(&mut self) -> Result<Vec<u8>> {
        Ok(vec![NULL_GRAY; self.width as usize * self.height as usize * 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{UVec3, Vec3};

    fn geometry() -> MeshGeometry {
        MeshGeometry {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: vec![Vec3::Z; 3],
            indices: vec![0, 1, 2],
            aabb: Aabb::new(Vec3::ZERO, Vec3::ONE),
            dimensions: Vec3::ONE,
            triangle_count: 1,
            resolution: UVec3::ONE,
        }
    }

    #[test]
    fn test_allocate_and_release_residency() {
        let mut backend = NullBackend::new(2, 2);
        let resources = backend.allocate_mesh("Tri_prim0", &geometry()).unwrap();
        assert_eq!(backend.resident_count(), 5);

        backend.release_mesh(resources);
        assert_eq!(backend.resident_count(), 0);
        assert_eq!(backend.release_count(), 1);
        assert_eq!(backend.events().last(), Some(&BackendEvent::Release("Tri_prim0".into())));
    }

    #[test]
    fn test_fail_after_limit() {
        let mut backend = NullBackend::new(2, 2).fail_after(1);
        assert!(backend.allocate_mesh("a", &geometry()).is_ok());
        assert!(matches!(backend.allocate_mesh("b", &geometry()), Err(Error::Allocation(_))));
        assert_eq!(backend.resident_count(), 5);
    }

    #[test]
    fn test_gray_output_matches_size() {
        let mut backend = NullBackend::new(2, 2);
        backend.resize_output(4, 2).unwrap();
        let pixels = backend.read_output().unwrap();
        assert_eq!(pixels.len(), 4 * 2 * 3);
        assert!(pixels.iter().all(|&p| p == NULL_GRAY));
    }

    #[test]
    fn test_event_log_bounded() {
        let mut backend = NullBackend::new(1, 1);
        for _ in 0..EVENT_LOG_LIMIT * 3 {
            backend.swap();
        }
        assert!(backend.events().len() <= EVENT_LOG_LIMIT);
    }
}
