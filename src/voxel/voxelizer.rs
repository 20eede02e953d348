//! Two-phase voxelizer
//!
//! Each grid is rebuilt by a clear phase followed by a binning phase:
//!
//! 1. reset the global slot counter and zero the grid's (count, head) cells
//! 2. storage barrier
//! 3. bin items (triangles for a mesh grid, meshes for the scene grid) into
//!    per-voxel linked lists in the overflow list
//! 4. sampled-read barrier, so the render kernel sees the finished lists
//!
//! Mesh grids are only rebuilt while dirty. The scene grid is rebuilt every
//! frame because its bounds follow the current mesh set.

use std::collections::HashSet;

use crate::core::types::Result;
use crate::gpu::pipelines::MAX_CELLS_PER_ITEM;
use crate::gpu::{BarrierKind, GridTarget, VoxelBackend};
use crate::math::Aabb;
use crate::scene::{Mesh, Scene};

/// What one recorded voxelization pass touched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoxelizeReport {
    /// Meshes whose grids were rebuilt
    pub voxelized: Vec<String>,
    /// Bounds of the scene grid, if any mesh is registered
    pub scene_bounds: Option<Aabb>,
    pub mesh_count: u32,
}

pub struct Voxelizer {
    overflow_capacity: u32,
    /// Meshes already warned about exceeding the overflow list, dropped once
    /// the mesh is replaced or removed
    overflow_warned: HashSet<String>,
}

impl Voxelizer {
    pub fn new(overflow_capacity: u32) -> Self {
        Self {
            overflow_capacity,
            overflow_warned: HashSet::new(),
        }
    }

    /// Record the rebuild of every dirty mesh grid and of the scene grid.
    ///
    /// Nothing is executed until the backend submits; call [`commit`] once
    /// the submit succeeded.
    ///
    /// [`commit`]: Voxelizer::commit
    pub fn record<B: VoxelBackend + ?Sized>(&mut self, backend: &mut B, scene: &Scene) -> VoxelizeReport {
        let mut report = VoxelizeReport::default();

        let registry = scene.registry();
        self.overflow_warned
            .retain(|name| registry.get(name).is_some_and(|mesh| !mesh.is_dirty()));

        for mesh in scene.registry().iter().filter(|m| m.is_dirty()) {
            self.warn_on_overflow(mesh);
            voxelize_mesh(backend, mesh);
            report.voxelized.push(mesh.name().to_string());
        }

        let meshes = scene.meshes();
        if let Some(bounds) = scene.bounds() {
            backend.reset_slot_counter();
            backend.clear_grid(GridTarget::Scene);
            backend.barrier(BarrierKind::StorageWrites);
            backend.voxelize_meshes(&bounds, &meshes);
            backend.barrier(BarrierKind::SampledReads);
            report.scene_bounds = Some(bounds);
        }
        report.mesh_count = meshes.len() as u32;

        if !report.voxelized.is_empty() {
            log::debug!("Voxelizing {} dirty meshes", report.voxelized.len());
        }
        report
    }

    /// Mark the meshes of a submitted report clean
    pub fn commit(&self, scene: &mut Scene, report: &VoxelizeReport) {
        scene.registry_mut().mark_clean(&report.voxelized);
    }

    /// Record and submit in one step
    pub fn run<B: VoxelBackend + ?Sized>(&mut self, backend: &mut B, scene: &mut Scene) -> Result<VoxelizeReport> {
        let report = self.record(backend, scene);
        backend.submit()?;
        self.commit(scene, &report);
        Ok(report)
    }

    fn warn_on_overflow(&mut self, mesh: &Mesh) {
        let triangles = mesh.geometry().triangle_count;
        let widest = mesh.geometry().widest_triangle_cells();
        let list_full = triangles > self.overflow_capacity;
        let walk_capped = widest > u64::from(MAX_CELLS_PER_ITEM);
        if !(list_full || walk_capped) || !self.overflow_warned.insert(mesh.name().to_string()) {
            return;
        }
        if list_full {
            log::warn!(
                "Mesh {} has {} triangles but the overflow list holds {}; excess references are dropped",
                mesh.name(),
                triangles,
                self.overflow_capacity
            );
        }
        if walk_capped {
            log::warn!(
                "Mesh {} has a triangle covering {} cells; only the first {} are binned",
                mesh.name(),
                widest,
                MAX_CELLS_PER_ITEM
            );
        }
    }
}

fn voxelize_mesh<B: VoxelBackend + ?Sized>(backend: &mut B, mesh: &Mesh) {
    backend.reset_slot_counter();
    backend.clear_grid(GridTarget::Mesh(mesh));
    backend.barrier(BarrierKind::StorageWrites);
    backend.voxelize_triangles(mesh);
    backend.barrier(BarrierKind::SampledReads);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{UVec3, Vec3};
    use crate::gpu::{BackendEvent, NullBackend};
    use crate::scene::MeshGeometry;

    fn cube(offset: f32, triangles: u32) -> MeshGeometry {
        let min = Vec3::splat(offset);
        let max = min + Vec3::ONE;
        MeshGeometry {
            positions: vec![min, max, Vec3::new(max.x, min.y, min.z)],
            normals: vec![Vec3::Z; 3],
            indices: vec![0, 1, 2],
            aabb: Aabb::new(min, max),
            dimensions: Vec3::ONE,
            triangle_count: triangles,
            resolution: UVec3::splat(2),
        }
    }

    fn scene_with(backend: &mut NullBackend, keys: &[&str]) -> Scene {
        let mut scene = Scene::new(UVec3::splat(8));
        for (i, key) in keys.iter().enumerate() {
            scene.registry_mut().upsert(backend, key.to_string(), cube(i as f32 * 2.0, 1)).unwrap();
        }
        backend.take_events();
        scene
    }

    #[test]
    fn test_phase_order_per_mesh() {
        let mut backend = NullBackend::new(4, 4);
        let mut scene = scene_with(&mut backend, &["Cube_prim0"]);
        let mut voxelizer = Voxelizer::new(64);

        voxelizer.run(&mut backend, &mut scene).unwrap();

        assert_eq!(backend.events(), &[
            BackendEvent::ResetSlotCounter,
            BackendEvent::ClearMesh("Cube_prim0".into()),
            BackendEvent::Barrier(BarrierKind::StorageWrites),
            BackendEvent::VoxelizeTriangles { mesh: "Cube_prim0".into(), triangles: 1 },
            BackendEvent::Barrier(BarrierKind::SampledReads),
            BackendEvent::ResetSlotCounter,
            BackendEvent::ClearScene,
            BackendEvent::Barrier(BarrierKind::StorageWrites),
            BackendEvent::VoxelizeMeshes { count: 1 },
            BackendEvent::Barrier(BarrierKind::SampledReads),
            BackendEvent::Submit,
        ]);
    }

    #[test]
    fn test_static_mesh_voxelized_once() {
        let mut backend = NullBackend::new(4, 4);
        let mut scene = scene_with(&mut backend, &["A_prim0", "B_prim0"]);
        let mut voxelizer = Voxelizer::new(64);

        let first = voxelizer.run(&mut backend, &mut scene).unwrap();
        assert_eq!(first.voxelized, vec!["A_prim0".to_string(), "B_prim0".to_string()]);
        assert!(scene.registry().dirty_keys().is_empty());

        let second = voxelizer.run(&mut backend, &mut scene).unwrap();
        assert!(second.voxelized.is_empty());
        assert_eq!(second.mesh_count, 2);
        assert_eq!(backend.voxelize_count("A_prim0"), 1);
        assert_eq!(backend.voxelize_count("B_prim0"), 1);
    }

    #[test]
    fn test_scene_grid_rebuilt_every_frame() {
        let mut backend = NullBackend::new(4, 4);
        let mut scene = scene_with(&mut backend, &["A_prim0"]);
        let mut voxelizer = Voxelizer::new(64);

        voxelizer.run(&mut backend, &mut scene).unwrap();
        voxelizer.run(&mut backend, &mut scene).unwrap();

        let scene_passes = backend
            .events()
            .iter()
            .filter(|e| matches!(e, BackendEvent::VoxelizeMeshes { .. }))
            .count();
        assert_eq!(scene_passes, 2);
    }

    #[test]
    fn test_replaced_mesh_voxelized_again() {
        let mut backend = NullBackend::new(4, 4);
        let mut scene = scene_with(&mut backend, &["A_prim0"]);
        let mut voxelizer = Voxelizer::new(64);
        voxelizer.run(&mut backend, &mut scene).unwrap();

        scene.registry_mut().upsert(&mut backend, "A_prim0".into(), cube(5.0, 1)).unwrap();
        let report = voxelizer.run(&mut backend, &mut scene).unwrap();

        assert_eq!(report.voxelized, vec!["A_prim0".to_string()]);
        assert_eq!(backend.voxelize_count("A_prim0"), 2);
    }

    #[test]
    fn test_empty_scene_skips_scene_grid() {
        let mut backend = NullBackend::new(4, 4);
        let mut scene = Scene::new(UVec3::splat(8));
        let mut voxelizer = Voxelizer::new(64);

        let report = voxelizer.run(&mut backend, &mut scene).unwrap();

        assert!(report.scene_bounds.is_none());
        assert_eq!(backend.events(), &[BackendEvent::Submit]);
    }

    #[test]
    fn test_uncommitted_record_keeps_dirty() {
        let mut backend = NullBackend::new(4, 4);
        let scene = scene_with(&mut backend, &["A_prim0"]);
        let mut voxelizer = Voxelizer::new(64);

        let report = voxelizer.record(&mut backend, &scene);

        assert_eq!(report.voxelized.len(), 1);
        assert_eq!(scene.registry().dirty_keys(), vec!["A_prim0".to_string()]);
    }

    #[test]
    fn test_scene_bounds_inflated() {
        let mut backend = NullBackend::new(4, 4);
        let mut scene = scene_with(&mut backend, &["A_prim0"]);
        let mut voxelizer = Voxelizer::new(64);

        let report = voxelizer.run(&mut backend, &mut scene).unwrap();
        let bounds = report.scene_bounds.unwrap();
        assert!(bounds.min.x < 0.0 && bounds.max.x > 1.0);
    }

    #[test]
    fn test_overflow_warning_once() {
        let mut backend = NullBackend::new(4, 4);
        let mut scene = Scene::new(UVec3::splat(8));
        scene.registry_mut().upsert(&mut backend, "Big_prim0".into(), cube(0.0, 100)).unwrap();
        let mut voxelizer = Voxelizer::new(10);

        voxelizer.run(&mut backend, &mut scene).unwrap();
        voxelizer.run(&mut backend, &mut scene).unwrap();

        assert_eq!(voxelizer.overflow_warned.len(), 1);
    }

    #[test]
    fn test_overflow_warning_forgotten_on_replace_and_remove() {
        let mut backend = NullBackend::new(4, 4);
        let mut scene = Scene::new(UVec3::splat(8));
        scene.registry_mut().upsert(&mut backend, "Big_prim0".into(), cube(0.0, 100)).unwrap();
        scene.registry_mut().upsert(&mut backend, "Other_prim0".into(), cube(2.0, 100)).unwrap();
        let mut voxelizer = Voxelizer::new(10);
        voxelizer.run(&mut backend, &mut scene).unwrap();
        assert_eq!(voxelizer.overflow_warned.len(), 2);

        scene.registry_mut().upsert(&mut backend, "Big_prim0".into(), cube(0.0, 1)).unwrap();
        scene.registry_mut().remove_mesh(&mut backend, "Other");
        voxelizer.run(&mut backend, &mut scene).unwrap();
        assert!(voxelizer.overflow_warned.is_empty());

        scene.registry_mut().upsert(&mut backend, "Big_prim0".into(), cube(0.0, 100)).unwrap();
        voxelizer.run(&mut backend, &mut scene).unwrap();
        assert!(voxelizer.overflow_warned.contains("Big_prim0"));
    }

    #[test]
    fn test_wide_triangle_warned() {
        let mut backend = NullBackend::new(4, 4);
        let mut scene = Scene::new(UVec3::splat(8));
        let mut wide = cube(0.0, 1);
        wide.resolution = UVec3::splat(32);
        scene.registry_mut().upsert(&mut backend, "Wide_prim0".into(), wide).unwrap();
        scene.registry_mut().upsert(&mut backend, "Small_prim0".into(), cube(2.0, 1)).unwrap();
        let mut voxelizer = Voxelizer::new(64);

        voxelizer.run(&mut backend, &mut scene).unwrap();

        assert!(voxelizer.overflow_warned.contains("Wide_prim0"));
        assert!(!voxelizer.overflow_warned.contains("Small_prim0"));
    }
}
