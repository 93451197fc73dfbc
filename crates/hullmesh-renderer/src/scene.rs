//! Scene
//!
//! Owns the object tree (and through it every render node), the scene
//! collection and the completion channel shared by all LOD workers. All
//! mutation happens on the thread that owns the scene; [`Scene::pump`]
//! forwards debounced snapshots to workers and applies finished meshes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use glam::{Quat, Vec3};
use hullmesh_core::{ObjectId, ObjectState, ObjectTree, ObjectType, RenderSettings};

use crate::collection::{InstanceCollection, SceneCollection};
use crate::generator::MeshGenerator;
use crate::lod::LodSignal;
use crate::node::RenderNode;
use crate::{RendererError, RendererResult};

/// Notifications for whoever draws the scene
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// An object's LOD mesh was applied
    MeshReady(ObjectId),
    /// Transient progress text
    Status(String),
    /// The view should be redrawn
    Repaint,
}

/// Renderable scene
pub struct Scene<C: SceneCollection = InstanceCollection> {
    pub(crate) tree: ObjectTree<RenderNode>,
    pub(crate) collection: C,
    pub(crate) settings: RenderSettings,
    pub(crate) generator: Arc<dyn MeshGenerator>,
    signal_tx: Sender<LodSignal>,
    signal_rx: Receiver<LodSignal>,
    pub(crate) events: Vec<SceneEvent>,
}

impl Scene<InstanceCollection> {
    /// Create an empty scene with an in-memory collection
    pub fn new(settings: RenderSettings, generator: Arc<dyn MeshGenerator>) -> RendererResult<Self> {
        Self::with_collection(settings, generator, InstanceCollection::new())
    }
}

impl<C: SceneCollection> Scene<C> {
    /// Create an empty scene drawing into `collection`
    pub fn with_collection(
        settings: RenderSettings,
        generator: Arc<dyn MeshGenerator>,
        collection: C,
    ) -> RendererResult<Self> {
        settings.validate()?;
        let (signal_tx, signal_rx) = channel::unbounded();

        log::info!(
            "Scene created: {} LOD levels{}",
            settings.lod_count(),
            if settings.disable_lods { " (disabled)" } else { "" }
        );

        Ok(Self {
            tree: ObjectTree::new(),
            collection,
            settings,
            generator,
            signal_tx,
            signal_rx,
            events: Vec::new(),
        })
    }

    /// Add an object with default state
    pub fn add_object(
        &mut self,
        parent: Option<ObjectId>,
        name: impl Into<String>,
        object_type: ObjectType,
    ) -> RendererResult<ObjectId> {
        self.add_object_with_state(parent, name, object_type, ObjectState::new())
    }

    /// Add an object, create its render node and place it
    pub fn add_object_with_state(
        &mut self,
        parent: Option<ObjectId>,
        name: impl Into<String>,
        object_type: ObjectType,
        state: ObjectState,
    ) -> RendererResult<ObjectId> {
        let id = self.tree.insert(parent, name, object_type)?;
        self.tree.object_mut(id)?.state = state;

        let node = RenderNode::new(
            id,
            &self.settings,
            Arc::clone(&self.generator),
            self.signal_tx.clone(),
        )?;
        self.collection.add(node.instance());
        self.tree.attach_renderer(id, node)?;

        self.object_edited(id)?;
        self.position_changed(id, false)?;
        Ok(id)
    }

    /// Remove an object and its whole subtree
    pub fn remove_object(&mut self, id: ObjectId) -> RendererResult<()> {
        let parent = self.tree.object(id)?.parent();

        let doomed = self.tree.post_order(id);
        for object in &doomed {
            self.destroy_node(*object);
        }
        for object in &doomed {
            self.tree.remove(*object)?;
        }

        match parent {
            Some(parent) => self.structure_changed(parent),
            None => Ok(()),
        }
    }

    /// Move `child` under `parent` (or make it a root)
    pub fn set_parent(&mut self, child: ObjectId, parent: Option<ObjectId>) -> RendererResult<()> {
        let old_parent = self.tree.object(child)?.parent();
        self.tree.set_parent(child, parent)?;

        if let Some(old_parent) = old_parent {
            self.structure_changed(old_parent)?;
        }
        self.structure_changed(child)?;
        self.position_changed(child, false)
    }

    /// Set a numeric variable
    pub fn set_variable(&mut self, id: ObjectId, name: &str, value: f64) -> RendererResult<()> {
        self.tree.object_mut(id)?.state.set_variable(name, value);
        self.object_edited(id)
    }

    /// Set a string variable
    pub fn set_string(&mut self, id: ObjectId, name: &str, value: &str) -> RendererResult<()> {
        self.tree.object_mut(id)?.state.set_string(name, value);
        self.object_edited(id)
    }

    /// Move an object relative to its parent
    pub fn set_position(&mut self, id: ObjectId, position: Vec3) -> RendererResult<()> {
        self.tree.object_mut(id)?.state.position = position;
        self.position_changed(id, false)
    }

    /// Rotate an object relative to its parent
    pub fn set_orientation(&mut self, id: ObjectId, orientation: Quat) -> RendererResult<()> {
        self.tree.object_mut(id)?.state.orientation = orientation;
        self.position_changed(id, false)
    }

    /// Regenerate after a parameter edit.
    ///
    /// The outermost enclosing modifier is rebuilt as well; its recursion
    /// covers a modifier edited further down.
    fn object_edited(&mut self, id: ObjectId) -> RendererResult<()> {
        let outer = self.outermost_modifier(id, false);
        let is_modifier = self.tree.object(id)?.object_type.is_modifier();

        if !is_modifier || outer.is_none() {
            self.mesh_invalidated(id)?;
        }
        match outer {
            Some(outer) => self.mesh_invalidated(outer),
            None => Ok(()),
        }
    }

    /// Rebuild the outermost modifier at or above `id`
    fn structure_changed(&mut self, id: ObjectId) -> RendererResult<()> {
        match self.outermost_modifier(id, true) {
            Some(modifier) => self.mesh_invalidated(modifier),
            None => Ok(()),
        }
    }

    fn outermost_modifier(&self, id: ObjectId, include_self: bool) -> Option<ObjectId> {
        let is_modifier = |id: ObjectId| self.tree.get(id).is_some_and(|o| o.object_type.is_modifier());

        let mut outermost = (include_self && is_modifier(id)).then_some(id);
        for ancestor in self.tree.ancestors(id) {
            if is_modifier(ancestor) {
                outermost = Some(ancestor);
            }
        }
        outermost
    }

    /// Process debounce timers and worker signals.
    ///
    /// Returns the events raised since the last pump.
    pub fn pump(&mut self) -> RendererResult<Vec<SceneEvent>> {
        self.pump_at(Instant::now())
    }

    /// [`pump`](Self::pump) with an explicit clock
    pub fn pump_at(&mut self, now: Instant) -> RendererResult<Vec<SceneEvent>> {
        for id in self.tree.ids() {
            let due = self
                .tree
                .renderer_mut(id)
                .is_some_and(|node| node.lod_mut().poll_debounce(now));
            if due {
                self.submit_snapshot(id);
            }
        }

        while let Ok(signal) = self.signal_rx.try_recv() {
            self.handle_signal(signal)?;
        }

        Ok(std::mem::take(&mut self.events))
    }

    /// Fire every armed debounce immediately
    pub fn flush_lod_requests(&mut self) {
        for id in self.tree.ids() {
            let due = self
                .tree
                .renderer_mut(id)
                .is_some_and(|node| node.lod_mut().flush_debounce());
            if due {
                self.submit_snapshot(id);
            }
        }
    }

    fn submit_snapshot(&mut self, id: ObjectId) {
        let Some(snapshot) = self.tree.snapshot(id) else {
            return;
        };
        if let Some(node) = self.tree.renderer(id) {
            node.lod().submit(snapshot);
        }
    }

    fn handle_signal(&mut self, signal: LodSignal) -> RendererResult<()> {
        match signal {
            LodSignal::Started { object, levels, .. } => {
                if let Some(name) = self.tree.get(object).map(|o| o.name.clone()) {
                    self.events
                        .push(SceneEvent::Status(format!("Generating {levels} LODs for '{name}'...")));
                }
                Ok(())
            }
            LodSignal::Ready { object, sequence } => {
                let Some(applied) = self.tree.renderer(object).map(RenderNode::applied_sequence) else {
                    log::debug!("Dropping LOD result for removed object {}", object);
                    return Ok(());
                };
                if sequence > applied {
                    self.mesh_ready(object)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Whether no edits are debouncing, no worker is busy and no signal waits
    pub fn is_idle(&self) -> bool {
        // Workers settle after sending their signal, so check them first
        self.tree
            .iter()
            .filter_map(|o| o.renderer())
            .all(|node| node.lod().is_idle())
            && self.signal_rx.is_empty()
    }

    /// Flush pending requests and pump until every worker has settled
    pub fn settle(&mut self, timeout: Duration) -> RendererResult<Vec<SceneEvent>> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();

        loop {
            self.flush_lod_requests();
            events.extend(self.pump()?);
            if self.is_idle() {
                return Ok(events);
            }
            if Instant::now() >= deadline {
                return Err(RendererError::SettleTimeout(timeout));
            }
            std::thread::sleep(self.settings.poll_interval());
        }
    }

    /// Stop every LOD worker
    pub fn shutdown(&mut self) {
        let ids = self.tree.ids();
        log::debug!("Stopping {} LOD workers", ids.len());
        for id in ids {
            if let Some(node) = self.tree.renderer_mut(id) {
                node.lod_mut().stop();
            }
        }
    }

    /// Render node of an object
    pub fn node(&self, id: ObjectId) -> Option<&RenderNode> {
        self.tree.renderer(id)
    }

    pub fn tree(&self) -> &ObjectTree<RenderNode> {
        &self.tree
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }
}

impl<C: SceneCollection> Drop for Scene<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
