//! Render Nodes
//!
//! The per-object renderer: one base instance placed at the object's world
//! transform, the replicas a modifier owns, and the LOD worker producing the
//! object's mesh.

use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel::Sender;
use glam::Mat4;
use hullmesh_core::{ObjectId, RenderSettings};
use hullmesh_platform::HighResTimer;

use crate::collection::{GeometryInstance, InstanceId, SceneCollection};
use crate::generator::{GenerateOptions, MeshGenerator};
use crate::lod::{LodSignal, LodWorker};
use crate::material::SourceKind;
use crate::mesh::{MeshAccumulator, MeshFragment, RenderMesh, SharedMesh};
use crate::modifier::ReplicationPattern;
use crate::scene::{Scene, SceneEvent};
use crate::{RendererError, RendererResult};

/// Applying a merged mesh slower than this is logged
const SLOW_APPLY_MS: f64 = 50.0;

/// The base instance a replica was copied from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaSource {
    pub object: ObjectId,
    pub instance: InstanceId,
}

/// A transformed copy of some descendant's base instance
#[derive(Debug)]
pub struct ReplicaInstance {
    instance: GeometryInstance,
    source: ReplicaSource,
    transformation: Mat4,
}

impl ReplicaInstance {
    pub(crate) fn new(source: ReplicaSource, representation: SharedMesh, transformation: Mat4) -> Self {
        Self {
            instance: GeometryInstance::new(representation),
            source,
            transformation,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.instance.id()
    }

    /// The placed copy
    pub fn instance(&self) -> &GeometryInstance {
        &self.instance
    }

    pub fn source(&self) -> ReplicaSource {
        self.source
    }

    /// Replication offset relative to the modifier
    pub fn transformation(&self) -> Mat4 {
        self.transformation
    }
}

/// Renderer owned by one scene object
#[derive(Debug)]
pub struct RenderNode {
    object: ObjectId,
    instance: GeometryInstance,
    pub(crate) replicas: Vec<ReplicaInstance>,
    lod: LodWorker,
    applied_sequence: u64,
}

impl RenderNode {
    pub(crate) fn new(
        object: ObjectId,
        settings: &RenderSettings,
        generator: Arc<dyn MeshGenerator>,
        signals: Sender<LodSignal>,
    ) -> RendererResult<Self> {
        Ok(Self {
            object,
            instance: GeometryInstance::new(RenderMesh::shared()),
            replicas: Vec::new(),
            lod: LodWorker::spawn(object, settings, generator, signals)?,
            applied_sequence: 0,
        })
    }

    /// Object this node renders
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Base instance
    pub fn instance(&self) -> &GeometryInstance {
        &self.instance
    }

    /// Geometry shared by the base instance and every replica of it
    pub fn mesh(&self) -> &SharedMesh {
        self.instance.representation()
    }

    /// World matrix of the base instance
    pub fn world_matrix(&self) -> Mat4 {
        self.instance.matrix()
    }

    /// Replicas owned by this node (modifiers only)
    pub fn replicas(&self) -> &[ReplicaInstance] {
        &self.replicas
    }

    pub fn lod(&self) -> &LodWorker {
        &self.lod
    }

    pub(crate) fn lod_mut(&mut self) -> &mut LodWorker {
        &mut self.lod
    }

    /// Sequence of the last merged mesh applied to the base geometry
    pub fn applied_sequence(&self) -> u64 {
        self.applied_sequence
    }

    /// Remove every owned replica from `collection`
    fn clear_replicas(&mut self, collection: &mut impl SceneCollection) {
        for replica in self.replicas.drain(..) {
            collection.remove(replica.id());
        }
    }
}

impl<C: SceneCollection> Scene<C> {
    pub(crate) fn node_mut(&mut self, id: ObjectId) -> RendererResult<&mut RenderNode> {
        self.tree
            .renderer_mut(id)
            .ok_or(RendererError::MissingRenderNode(id))
    }

    /// Regenerate an object's geometry after its parameters changed.
    ///
    /// Plain objects get a synchronous preview mesh and a LOD request.
    /// Modifiers drop their geometry and rebuild their replica set.
    pub fn mesh_invalidated(&mut self, id: ObjectId) -> RendererResult<()> {
        let object = self.tree.object(id)?;

        if object.object_type.is_modifier() {
            let transformations = ReplicationPattern::from_state(&object.state).transformations();

            let node = self
                .tree
                .renderer_mut(id)
                .ok_or(RendererError::MissingRenderNode(id))?;
            node.mesh().write().clear();
            node.clear_replicas(&mut self.collection);

            self.add_modifier_instances(id, id, &transformations)?;
            return self.position_changed(id, false);
        }

        let snapshot = object.snapshot();
        let options = GenerateOptions::new(self.settings.preview_resolution, self.settings.min_resolution);
        let fragment = self.generator.generate(&snapshot, &options).unwrap_or_else(|e| {
            log::debug!("Preview of '{}' is empty: {}", snapshot.name, e);
            MeshFragment::empty()
        });
        let mut accumulator = MeshAccumulator::new();
        accumulator.append(&fragment, 0);

        let node = self.node_mut(id)?;
        node.lod.request_update(Instant::now());
        let mut mesh = node.mesh().write();
        mesh.rebuild_from(&accumulator, SourceKind::of(&snapshot));
        mesh.clear_bounds();
        Ok(())
    }

    /// Apply the worker's latest merged mesh to the base geometry
    pub fn mesh_ready(&mut self, id: ObjectId) -> RendererResult<()> {
        let timer = HighResTimer::new();
        let node = self.node_mut(id)?;

        let (sequence, vertices) = node.lod.read_result(|merged| {
            let mut mesh = node.mesh().write();
            mesh.rebuild_from(&merged.accumulator, merged.kind);
            mesh.clear_bounds();
            (merged.sequence, mesh.vertex_count())
        });
        node.applied_sequence = sequence;

        self.events.push(SceneEvent::MeshReady(id));
        self.events.push(SceneEvent::Repaint);

        let elapsed = timer.elapsed_millis();
        if elapsed > SLOW_APPLY_MS {
            let name = self.tree.get(id).map(|o| o.name.as_str()).unwrap_or_default();
            log::debug!("Applying mesh of '{}' took {:.1} ms ({} vertices)", name, elapsed, vertices);
        }
        Ok(())
    }

    /// Recompute world transforms after `id` moved.
    ///
    /// Descends into children unless `travel_up` is set, then always walks up
    /// to the parent so ancestor modifiers re-place their replicas.
    pub fn position_changed(&mut self, id: ObjectId, travel_up: bool) -> RendererResult<()> {
        let object = self.tree.object(id)?;
        let local = object.state.local_matrix();
        let parent = object.parent();
        let parent_world = parent
            .and_then(|p| self.tree.renderer(p))
            .map_or(Mat4::IDENTITY, RenderNode::world_matrix);

        let node = self
            .tree
            .renderer_mut(id)
            .ok_or(RendererError::MissingRenderNode(id))?;
        node.instance.set_matrix(parent_world * local);
        self.collection.reinsert(&node.instance);

        if !travel_up {
            for child in self.tree.children(id).to_vec() {
                self.position_changed(child, false)?;
            }
        }

        if let Some(parent) = parent {
            if self.tree.renderer(parent).is_some() {
                self.position_changed(parent, true)?;
            }
        }

        self.place_replicas(id)
    }

    /// Place every replica at `M * X * M^-1 * B`
    fn place_replicas(&mut self, id: ObjectId) -> RendererResult<()> {
        let node = self.tree.renderer(id).ok_or(RendererError::MissingRenderNode(id))?;
        if node.replicas.is_empty() {
            return Ok(());
        }

        let modifier = node.world_matrix();
        let inverse = modifier.inverse();
        let placements: Vec<Mat4> = node
            .replicas
            .iter()
            .map(|replica| {
                let base = match self.tree.renderer(replica.source.object) {
                    Some(source) => source.world_matrix(),
                    None => {
                        log::warn!("Replica source {} has no render node", replica.source.object);
                        Mat4::IDENTITY
                    }
                };
                modifier * replica.transformation * inverse * base
            })
            .collect();

        let node = self
            .tree
            .renderer_mut(id)
            .ok_or(RendererError::MissingRenderNode(id))?;
        for (replica, matrix) in node.replicas.iter_mut().zip(placements) {
            replica.instance.set_matrix(matrix);
            self.collection.reinsert(&replica.instance);
        }
        Ok(())
    }

    /// Tear down the render node of `id`.
    ///
    /// Stops the worker, strips replicas of this node's base instance from
    /// every ancestor, and removes everything it owned from the collection.
    pub(crate) fn destroy_node(&mut self, id: ObjectId) {
        let Some(mut node) = self.tree.detach_renderer(id) else {
            return;
        };
        node.lod.stop();

        let base = node.instance.id();
        for ancestor in self.tree.ancestors(id) {
            let Some(ancestor_node) = self.tree.renderer_mut(ancestor) else {
                continue;
            };
            let collection = &mut self.collection;
            ancestor_node.replicas.retain(|replica| {
                if replica.source.instance == base {
                    collection.remove(replica.id());
                    false
                } else {
                    true
                }
            });
        }

        self.collection.remove(base);
        node.clear_replicas(&mut self.collection);
    }
}
