//! Mesh and Geometry
//!
//! Raw fragments produced by a mesh generator, the accumulator that merges
//! fragments of several LOD levels into one buffer, and the renderable mesh
//! the merged buffer is written into.

use std::sync::Arc;

use glam::Vec3;
use hullmesh_core::Aabb;
use parking_lot::RwLock;

use crate::material::{Material, SourceKind};

/// One triangle of a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    /// Vertex indices into the fragment's vertex list
    pub indices: [u32; 3],
    /// Smoothing group the triangle belongs to
    pub smoothing_group: u32,
}

/// Result of one generation pass at one LOD level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshFragment {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub triangles: Vec<Triangle>,
    /// Declared number of smoothing groups (zero is read as one)
    pub smoothing_groups: u32,
}

impl MeshFragment {
    /// Fragment without any triangles
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if the fragment has no triangles
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Index list for one (smoothing group, LOD) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexList {
    pub lod: u32,
    pub indices: Vec<u32>,
}

/// Receives merged geometry
pub trait MeshSink {
    /// Replace vertex positions and normals (flat `xyz` arrays)
    fn set_vertices(&mut self, positions: &[f32], normals: &[f32]);

    /// Add one group of triangles drawn with `material` at `lod`
    fn add_triangles(&mut self, material: Material, indices: &[u32], lod: u32);
}

/// Merges mesh fragments of any number of LOD levels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshAccumulator {
    positions: Vec<f32>,
    normals: Vec<f32>,
    index_lists: Vec<IndexList>,
}

impl MeshAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment tagged with `lod`.
    ///
    /// A fragment without triangles still leaves one degenerate triangle
    /// behind so that the level shows up in the result.
    pub fn append(&mut self, fragment: &MeshFragment, lod: u32) {
        let first_vertex = self.vertex_count() as u32;

        if fragment.is_empty() {
            self.positions.extend_from_slice(&[0.0; 3]);
            self.normals.extend_from_slice(&[0.0; 3]);
            self.index_lists.push(IndexList {
                lod,
                indices: vec![first_vertex; 3],
            });
            return;
        }

        let groups = fragment.smoothing_groups.max(1) as usize;
        let first_group = self.index_lists.len();
        self.index_lists.extend((0..groups).map(|_| IndexList {
            lod,
            indices: Vec::new(),
        }));

        for (i, vertex) in fragment.vertices.iter().enumerate() {
            self.positions.extend_from_slice(&vertex.to_array());
            let normal = fragment.normals.get(i).copied().unwrap_or(Vec3::ZERO);
            self.normals.extend_from_slice(&normal.to_array());
        }

        for triangle in &fragment.triangles {
            // Out-of-range groups land in the last declared one
            let group = (triangle.smoothing_group as usize).min(groups - 1);
            let list = &mut self.index_lists[first_group + group].indices;
            list.extend(triangle.indices.iter().map(|i| i + first_vertex));
        }
    }

    /// Write the merged buffers into `sink`, one group per non-empty index list
    pub fn finalize(&self, sink: &mut dyn MeshSink, source: SourceKind) {
        sink.set_vertices(&self.positions, &self.normals);

        let material = source.material();
        for list in self.index_lists.iter().filter(|l| !l.indices.is_empty()) {
            sink.add_triangles(material, &list.indices, list.lod);
        }
    }

    /// Reset all buffers for reuse
    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.index_lists.clear();
    }

    /// Number of merged vertices
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Flat vertex positions
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    /// Flat vertex normals
    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    /// Index lists in append order
    pub fn index_lists(&self) -> &[IndexList] {
        &self.index_lists
    }

    /// Distinct LOD tags present, ascending
    pub fn lod_levels(&self) -> Vec<u32> {
        let mut levels: Vec<u32> = self.index_lists.iter().map(|l| l.lod).collect();
        levels.sort_unstable();
        levels.dedup();
        levels
    }

    /// Check if nothing has been appended
    pub fn is_empty(&self) -> bool {
        self.index_lists.is_empty()
    }
}

/// Group of triangles sharing one material and LOD
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleGroup {
    pub material: Material,
    pub lod: u32,
    pub indices: Vec<u32>,
}

/// Renderable geometry shared by a base instance and its replicas
#[derive(Debug, Clone, Default)]
pub struct RenderMesh {
    positions: Vec<f32>,
    normals: Vec<f32>,
    groups: Vec<TriangleGroup>,
    bounds: Option<Aabb>,
}

/// Geometry handle shared between instances
pub type SharedMesh = Arc<RwLock<RenderMesh>>;

impl RenderMesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mesh behind a shared handle
    pub fn shared() -> SharedMesh {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Remove all geometry
    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.groups.clear();
        self.bounds = None;
    }

    /// Replace the contents with an accumulator's result
    pub fn rebuild_from(&mut self, accumulator: &MeshAccumulator, source: SourceKind) {
        self.clear();
        accumulator.finalize(self, source);
    }

    /// Drop the cached bounding box so it is recomputed on next use
    pub fn clear_bounds(&mut self) {
        self.bounds = None;
    }

    /// Bounding box of all vertices, cached until the geometry changes
    pub fn bounds(&mut self) -> Aabb {
        *self
            .bounds
            .get_or_insert_with(|| Aabb::from_flat_points(&self.positions))
    }

    /// Check if a bounding box is currently cached
    pub fn has_cached_bounds(&self) -> bool {
        self.bounds.is_some()
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of triangles over all groups and LODs
    pub fn triangle_count(&self) -> usize {
        self.groups.iter().map(|g| g.indices.len() / 3).sum()
    }

    /// Number of triangles in one LOD
    pub fn lod_triangle_count(&self, lod: u32) -> usize {
        self.groups
            .iter()
            .filter(|g| g.lod == lod)
            .map(|g| g.indices.len() / 3)
            .sum()
    }

    /// Distinct LOD tags present, ascending
    pub fn lod_levels(&self) -> Vec<u32> {
        let mut levels: Vec<u32> = self.groups.iter().map(|g| g.lod).collect();
        levels.sort_unstable();
        levels.dedup();
        levels
    }

    /// Triangle groups
    pub fn groups(&self) -> &[TriangleGroup] {
        &self.groups
    }

    /// Flat vertex positions
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    /// Flat vertex normals
    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    /// Check if the mesh has no triangles
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl MeshSink for RenderMesh {
    fn set_vertices(&mut self, positions: &[f32], normals: &[f32]) {
        self.positions = positions.to_vec();
        self.normals = normals.to_vec();
        self.bounds = None;
    }

    fn add_triangles(&mut self, material: Material, indices: &[u32], lod: u32) {
        self.groups.push(TriangleGroup {
            material,
            lod,
            indices: indices.to_vec(),
        });
    }
}
