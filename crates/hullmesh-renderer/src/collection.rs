//! Scene Collection
//!
//! Placed geometry instances and the collection that holds everything that
//! is currently drawn.

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use glam::Mat4;
use hullmesh_core::Aabb;

use crate::mesh::SharedMesh;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one placed instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A placement of shared geometry in world space
#[derive(Debug, Clone)]
pub struct GeometryInstance {
    id: InstanceId,
    representation: SharedMesh,
    matrix: Mat4,
}

impl GeometryInstance {
    /// Create an instance of `representation` at the identity placement
    pub fn new(representation: SharedMesh) -> Self {
        Self {
            id: InstanceId::next(),
            representation,
            matrix: Mat4::IDENTITY,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// World matrix
    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn set_matrix(&mut self, matrix: Mat4) {
        self.matrix = matrix;
    }

    /// Geometry this instance draws
    pub fn representation(&self) -> &SharedMesh {
        &self.representation
    }

    /// Bounds of the geometry placed at this instance's matrix
    pub fn world_bounds(&self) -> Aabb {
        self.representation.write().bounds().transform(self.matrix)
    }
}

/// The set of instances the scene draws.
///
/// Adding an instance records its current placement. A moved instance has to
/// be reinserted before the collection sees the new matrix.
pub trait SceneCollection {
    /// Check whether an instance is present
    fn contains(&self, id: InstanceId) -> bool;

    /// Add or replace an instance
    fn add(&mut self, instance: &GeometryInstance);

    /// Remove an instance, returning whether it was present
    fn remove(&mut self, id: InstanceId) -> bool;

    /// Remove and add again so the new placement is picked up
    fn reinsert(&mut self, instance: &GeometryInstance) {
        self.remove(instance.id());
        self.add(instance);
    }
}

/// Hash-map backed collection
#[derive(Debug, Default)]
pub struct InstanceCollection {
    instances: AHashMap<InstanceId, GeometryInstance>,
}

impl InstanceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// The placed copy of an instance
    pub fn get(&self, id: InstanceId) -> Option<&GeometryInstance> {
        self.instances.get(&id)
    }

    /// Iterate over all placed instances
    pub fn iter(&self) -> impl Iterator<Item = &GeometryInstance> {
        self.instances.values()
    }

    /// Bounds of everything placed in the collection
    pub fn bounds(&self) -> Aabb {
        self.instances
            .values()
            .fold(Aabb::EMPTY, |bounds, instance| bounds.merge(&instance.world_bounds()))
    }

    /// Identifiers of all instances, sorted
    pub fn ids(&self) -> Vec<InstanceId> {
        let mut ids: Vec<InstanceId> = self.instances.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl SceneCollection for InstanceCollection {
    fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    fn add(&mut self, instance: &GeometryInstance) {
        self.instances.insert(instance.id(), instance.clone());
    }

    fn remove(&mut self, id: InstanceId) -> bool {
        self.instances.remove(&id).is_some()
    }
}
