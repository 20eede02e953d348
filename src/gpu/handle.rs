//! Bindless resource handles
//!
//! A [`BindlessHandle`] is an opaque 64-bit token naming one GPU-resident
//! resource. Handles are neither `Clone` nor `Copy`: exactly one owner holds
//! each handle, and giving it back to the [`ResourceTable`] is the only way
//! to release the resource.

use std::collections::HashMap;

/// Opaque, uniquely owned reference to a resident GPU resource
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct BindlessHandle(u64);

impl BindlessHandle {
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// The handle as the `vec2<u32>` (low, high) pair shaders receive
    pub fn to_words(&self) -> [u32; 2] {
        [self.0 as u32, (self.0 >> 32) as u32]
    }
}

/// Resident resources keyed by handle
#[derive(Debug)]
pub struct ResourceTable<R> {
    resources: HashMap<u64, R>,
    next_id: u64,
}

impl<R> ResourceTable<R> {
    pub fn new() -> Self {
        Self {
            resources: HashMap::new(),
            // Zero stays free so an all-zero shader record never names a resource
            next_id: 1,
        }
    }

    /// Make a resource resident and hand out its handle
    pub fn insert(&mut self, resource: R) -> BindlessHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.resources.insert(id, resource);
        BindlessHandle(id)
    }

    pub fn get(&self, handle: &BindlessHandle) -> Option<&R> {
        self.resources.get(&handle.0)
    }

    /// Release a resource, consuming its handle
    pub fn remove(&mut self, handle: BindlessHandle) -> Option<R> {
        self.resources.remove(&handle.0)
    }

    pub fn is_resident(&self, handle: &BindlessHandle) -> bool {
        self.resources.contains_key(&handle.0)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl<R> Default for ResourceTable<R> {
    fn default() -> Self {
        Self::new()
    }
}
