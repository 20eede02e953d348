//! Scene: the mesh registry plus its aggregate bounds

use crate::core::types::UVec3;
use crate::math::Aabb;
use crate::scene::mesh::SCENE_AABB_INFLATION;
use crate::scene::registry::{Mesh, MeshRegistry};

/// All registered meshes and the fixed-resolution scene grid sizing
#[derive(Debug)]
pub struct Scene {
    registry: MeshRegistry,
    resolution: UVec3,
}

impl Scene {
    pub fn new(resolution: UVec3) -> Self {
        Self {
            registry: MeshRegistry::new(),
            resolution,
        }
    }

    pub fn registry(&self) -> &MeshRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MeshRegistry {
        &mut self.registry
    }

    /// Resolution of the scene-level grid
    pub fn resolution(&self) -> UVec3 {
        self.resolution
    }

    /// Union of every mesh AABB, before inflation
    pub fn raw_bounds(&self) -> Option<Aabb> {
        Aabb::union_all(self.registry.iter().map(|m| &m.geometry().aabb))
    }

    /// Scene grid bounds, recomputed from the current mesh set
    pub fn bounds(&self) -> Option<Aabb> {
        self.raw_bounds().map(|aabb| aabb.inflated(SCENE_AABB_INFLATION))
    }

    pub fn meshes(&self) -> Vec<&Mesh> {
        self.registry.iter().collect()
    }
}
