//! Name-keyed mesh store owning each mesh's GPU resources

use std::collections::BTreeMap;

use crate::core::types::Result;
use crate::gpu::{MeshResources, VoxelBackend};
use crate::scene::mesh::MeshGeometry;

/// A registered mesh: geometry, its GPU resources and a rebuild flag
#[derive(Debug)]
pub struct Mesh {
    name: String,
    geometry: MeshGeometry,
    resources: MeshResources,
    dirty: bool,
}

impl Mesh {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &MeshGeometry {
        &self.geometry
    }

    pub fn resources(&self) -> &MeshResources {
        &self.resources
    }

    /// Whether the voxel grid must be rebuilt before it is next read
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Upsert store of meshes keyed `<meshName>_prim<index>`
#[derive(Debug, Default)]
pub struct MeshRegistry {
    meshes: BTreeMap<String, Mesh>,
}

impl MeshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or wholesale replace the mesh at `key`.
    ///
    /// The new resources are allocated first. If allocation fails the
    /// registry is unchanged; otherwise any previous entry's resources are
    /// released before the new mesh is installed.
    pub fn upsert<B: VoxelBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        key: String,
        geometry: MeshGeometry,
    ) -> Result<()> {
        let resources = backend.allocate_mesh(&key, &geometry)?;

        if let Some(previous) = self.meshes.remove(&key) {
            backend.release_mesh(previous.resources);
        }

        log::info!(
            "Mesh {}: {} triangles, {}x{}x{} voxels",
            key,
            geometry.triangle_count,
            geometry.resolution.x,
            geometry.resolution.y,
            geometry.resolution.z
        );

        self.meshes.insert(key.clone(), Mesh {
            name: key,
            geometry,
            resources,
            dirty: true,
        });
        Ok(())
    }

    /// Remove one entry, releasing its resources
    pub fn remove<B: VoxelBackend + ?Sized>(&mut self, backend: &mut B, key: &str) -> bool {
        match self.meshes.remove(key) {
            Some(mesh) => {
                backend.release_mesh(mesh.resources);
                true
            }
            None => false,
        }
    }

    /// Remove every primitive entry of mesh `name`; returns how many went
    pub fn remove_mesh<B: VoxelBackend + ?Sized>(&mut self, backend: &mut B, name: &str) -> usize {
        let keys: Vec<String> = self
            .meshes
            .keys()
            .filter(|key| is_primitive_of(key, name))
            .cloned()
            .collect();
        for key in &keys {
            self.remove(backend, key);
        }
        keys.len()
    }

    /// Release everything
    pub fn clear<B: VoxelBackend + ?Sized>(&mut self, backend: &mut B) {
        for (_, mesh) in std::mem::take(&mut self.meshes) {
            backend.release_mesh(mesh.resources);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Mesh> {
        self.meshes.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mesh> {
        self.meshes.values()
    }

    pub fn dirty_keys(&self) -> Vec<String> {
        self.meshes.values().filter(|m| m.dirty).map(|m| m.name.clone()).collect()
    }

    /// Clear the dirty flag of each key still present
    pub fn mark_clean(&mut self, keys: &[String]) {
        for key in keys {
            if let Some(mesh) = self.meshes.get_mut(key) {
                mesh.dirty = false;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

/// `Cube_prim3` belongs to mesh `Cube`; `Cube_2_prim0` does not
fn is_primitive_of(key: &str, name: &str) -> bool {
    key.strip_prefix(name)
        .and_then(|rest| rest.strip_prefix("_prim"))
        .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}
