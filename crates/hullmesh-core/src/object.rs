//! Object Tree
//!
//! Hierarchical vehicle object model with:
//! - Generation-checked object handles
//! - Typed numeric and string variables
//! - Deep snapshots for background work
//! - An owned per-object renderer slot

use std::fmt;

use glam::{Mat4, Quat, Vec3};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{CoreError, CoreResult};

/// Object identifier with generation counter for stable handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    /// Slot index
    index: u32,
    /// Generation counter to detect stale handles
    generation: u32,
}

impl ObjectId {
    /// Create a new handle with the given index and generation
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Get the slot index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Get the generation
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Semantic object type tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObjectType {
    /// Replicates its children instead of rendering geometry of its own
    Modifier,
    /// Propellant tank, colored by what it holds
    FuelTank,
    /// Any other type, kept by name
    Other(String),
}

impl ObjectType {
    /// Type name as used in scene descriptions
    pub fn name(&self) -> &str {
        match self {
            Self::Modifier => "modifier",
            Self::FuelTank => "fuel_tank",
            Self::Other(name) => name,
        }
    }

    /// Whether objects of this type replicate their children
    pub fn is_modifier(&self) -> bool {
        matches!(self, Self::Modifier)
    }
}

impl From<&str> for ObjectType {
    fn from(name: &str) -> Self {
        match name {
            "modifier" => Self::Modifier,
            "fuel_tank" => Self::FuelTank,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ObjectType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<ObjectType> for String {
    fn from(object_type: ObjectType) -> Self {
        object_type.name().to_string()
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Numeric state of an object: placement plus named variables
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectState {
    /// Position relative to the parent
    pub position: Vec3,
    /// Orientation relative to the parent
    pub orientation: Quat,
    variables: IndexMap<String, f64>,
    strings: IndexMap<String, String>,
}

impl ObjectState {
    /// Create a state at the origin with no variables
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            variables: IndexMap::new(),
            strings: IndexMap::new(),
        }
    }

    /// Read a numeric variable; unset variables read as zero
    pub fn variable(&self, name: &str) -> f64 {
        self.variables.get(name).copied().unwrap_or(0.0)
    }

    /// Check whether a numeric variable is set
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Set a numeric variable
    pub fn set_variable(&mut self, name: impl Into<String>, value: f64) {
        self.variables.insert(name.into(), value);
    }

    /// Read a string variable
    pub fn string(&self, name: &str) -> Option<&str> {
        self.strings.get(name).map(String::as_str)
    }

    /// Set a string variable
    pub fn set_string(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.strings.insert(name.into(), value.into());
    }

    /// Iterate numeric variables in insertion order
    pub fn variables(&self) -> impl Iterator<Item = (&str, f64)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Iterate string variables in insertion order
    pub fn strings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.strings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Local placement matrix: rotate first, then translate
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_quat(self.orientation)
    }
}

impl Default for ObjectState {
    fn default() -> Self {
        Self::new()
    }
}

/// Independent deep copy of one object, decoupled from the live tree
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSnapshot {
    pub name: String,
    pub object_type: ObjectType,
    pub state: ObjectState,
}

impl ObjectSnapshot {
    /// Whether this is a tank holding oxidizer rather than fuel
    pub fn is_oxidizer_tank(&self) -> bool {
        self.object_type == ObjectType::FuelTank && self.state.variable("is_oxidizer") > 0.5
    }
}

/// Node in the object tree
#[derive(Debug)]
pub struct SceneObject<R> {
    id: ObjectId,
    /// Display name
    pub name: String,
    /// Semantic type
    pub object_type: ObjectType,
    /// Numeric state
    pub state: ObjectState,
    parent: Option<ObjectId>,
    children: SmallVec<[ObjectId; 8]>,
    renderer: Option<R>,
}

impl<R> SceneObject<R> {
    fn new(id: ObjectId, name: String, object_type: ObjectType) -> Self {
        Self {
            id,
            name,
            object_type,
            state: ObjectState::new(),
            parent: None,
            children: SmallVec::new(),
            renderer: None,
        }
    }

    /// Handle of this object
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Parent handle, if any
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// Child handles in order
    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    /// The renderer owned by this object
    pub fn renderer(&self) -> Option<&R> {
        self.renderer.as_ref()
    }

    /// Deep copy of this object's own state
    pub fn snapshot(&self) -> ObjectSnapshot {
        ObjectSnapshot {
            name: self.name.clone(),
            object_type: self.object_type.clone(),
            state: self.state.clone(),
        }
    }
}

struct Slot<R> {
    generation: u32,
    object: Option<SceneObject<R>>,
}

/// Object tree owning every object and, through them, their renderers
pub struct ObjectTree<R> {
    slots: Vec<Slot<R>>,
    free: Vec<u32>,
    roots: Vec<ObjectId>,
}

impl<R> ObjectTree<R> {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Insert a new object under `parent` (or as a root)
    pub fn insert(
        &mut self,
        parent: Option<ObjectId>,
        name: impl Into<String>,
        object_type: ObjectType,
    ) -> CoreResult<ObjectId> {
        if let Some(parent) = parent {
            if !self.contains(parent) {
                return Err(CoreError::ObjectNotFound(parent));
            }
        }

        let id = match self.free.pop() {
            Some(index) => ObjectId::new(index, self.slots[index as usize].generation),
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot { generation: 0, object: None });
                ObjectId::new(index, 0)
            }
        };

        let mut object = SceneObject::new(id, name.into(), object_type);
        object.parent = parent;
        self.slots[id.index as usize].object = Some(object);

        match parent.and_then(|p| self.get_mut(p)) {
            Some(parent_object) => parent_object.children.push(id),
            None => self.roots.push(id),
        }

        Ok(id)
    }

    /// Remove an object; its children become roots
    pub fn remove(&mut self, id: ObjectId) -> CoreResult<SceneObject<R>> {
        if !self.contains(id) {
            return Err(CoreError::ObjectNotFound(id));
        }

        let slot = &mut self.slots[id.index as usize];
        let object = slot.object.take().ok_or(CoreError::ObjectNotFound(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        if let Some(parent) = object.parent.and_then(|p| self.get_mut(p)) {
            parent.children.retain(|c| *c != id);
        }
        self.roots.retain(|r| *r != id);

        for child in &object.children {
            if let Some(child_object) = self.get_mut(*child) {
                child_object.parent = None;
                self.roots.push(*child);
            }
        }

        Ok(object)
    }

    /// Check whether a handle refers to a live object
    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Get an object by handle
    pub fn get(&self, id: ObjectId) -> Option<&SceneObject<R>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    /// Get a mutable object by handle
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject<R>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_mut())
    }

    /// Get an object or report it missing
    pub fn object(&self, id: ObjectId) -> CoreResult<&SceneObject<R>> {
        self.get(id).ok_or(CoreError::ObjectNotFound(id))
    }

    /// Get a mutable object or report it missing
    pub fn object_mut(&mut self, id: ObjectId) -> CoreResult<&mut SceneObject<R>> {
        self.get_mut(id).ok_or(CoreError::ObjectNotFound(id))
    }

    /// Parent of an object
    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.get(id).and_then(|o| o.parent)
    }

    /// Children of an object (empty for unknown handles)
    pub fn children(&self, id: ObjectId) -> &[ObjectId] {
        self.get(id).map(|o| o.children()).unwrap_or(&[])
    }

    /// Move `child` under `parent` (or make it a root)
    pub fn set_parent(&mut self, child: ObjectId, parent: Option<ObjectId>) -> CoreResult<()> {
        if !self.contains(child) {
            return Err(CoreError::ObjectNotFound(child));
        }
        if let Some(parent) = parent {
            if !self.contains(parent) {
                return Err(CoreError::ObjectNotFound(parent));
            }
            if parent == child || self.ancestors(parent).contains(&child) {
                return Err(CoreError::CyclicParent { child, parent });
            }
        }

        // Detach from old parent
        if let Some(old_parent) = self.parent(child).and_then(|p| self.get_mut(p)) {
            old_parent.children.retain(|c| *c != child);
        }
        self.roots.retain(|r| *r != child);

        match parent.and_then(|p| self.get_mut(p)) {
            Some(parent_object) => parent_object.children.push(child),
            None => self.roots.push(child),
        }

        if let Some(child_object) = self.get_mut(child) {
            child_object.parent = parent;
        }
        Ok(())
    }

    /// Ancestors from the parent upward to the root
    pub fn ancestors(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut result = Vec::new();
        let mut current = self.parent(id);
        while let Some(ancestor) = current {
            result.push(ancestor);
            current = self.parent(ancestor);
        }
        result
    }

    /// The object and all descendants, children before parents
    pub fn post_order(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut result = Vec::new();
        if self.contains(id) {
            self.collect_post_order(id, &mut result);
        }
        result
    }

    fn collect_post_order(&self, id: ObjectId, result: &mut Vec<ObjectId>) {
        for &child in self.children(id) {
            self.collect_post_order(child, result);
        }
        result.push(id);
    }

    /// Root handles
    pub fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    /// Iterate over all live objects
    pub fn iter(&self) -> impl Iterator<Item = &SceneObject<R>> {
        self.slots.iter().filter_map(|slot| slot.object.as_ref())
    }

    /// Handles of all live objects
    pub fn ids(&self) -> Vec<ObjectId> {
        self.iter().map(|o| o.id).collect()
    }

    /// Find an object by name
    pub fn find_by_name(&self, name: &str) -> Option<ObjectId> {
        self.iter().find(|o| o.name == name).map(|o| o.id)
    }

    /// Deep copy of one object's state
    pub fn snapshot(&self, id: ObjectId) -> Option<ObjectSnapshot> {
        self.get(id).map(SceneObject::snapshot)
    }

    /// Renderer owned by an object
    pub fn renderer(&self, id: ObjectId) -> Option<&R> {
        self.get(id).and_then(|o| o.renderer.as_ref())
    }

    /// Mutable renderer owned by an object
    pub fn renderer_mut(&mut self, id: ObjectId) -> Option<&mut R> {
        self.get_mut(id).and_then(|o| o.renderer.as_mut())
    }

    /// Give an object its renderer, returning any previous one
    pub fn attach_renderer(&mut self, id: ObjectId, renderer: R) -> CoreResult<Option<R>> {
        let object = self.object_mut(id)?;
        Ok(object.renderer.replace(renderer))
    }

    /// Take the renderer away from an object
    pub fn detach_renderer(&mut self, id: ObjectId) -> Option<R> {
        self.get_mut(id).and_then(|o| o.renderer.take())
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R> Default for ObjectTree<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> ObjectTree<u32> {
        ObjectTree::new()
    }

    #[test]
    fn test_local_matrix_rotates_then_translates() {
        let mut state = ObjectState::new();
        state.position = Vec3::new(1.0, 0.0, 0.0);
        state.orientation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);

        let point = state.local_matrix().transform_point3(Vec3::X);
        assert!((point - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_variables_default_to_zero() {
        let mut state = ObjectState::new();
        assert_eq!(state.variable("vector1.count"), 0.0);
        assert!(!state.has_variable("vector1.count"));

        state.set_variable("vector1.count", 3.0);
        state.set_string("pattern", "circular");
        assert_eq!(state.variable("vector1.count"), 3.0);
        assert_eq!(state.string("pattern"), Some("circular"));
        assert_eq!(state.string("missing"), None);
    }

    #[test]
    fn test_object_type_names() {
        assert_eq!(ObjectType::from("modifier"), ObjectType::Modifier);
        assert_eq!(ObjectType::from("fuel_tank"), ObjectType::FuelTank);
        assert_eq!(ObjectType::from("engine"), ObjectType::Other("engine".into()));
        assert!(ObjectType::Modifier.is_modifier());
        assert_eq!(String::from(ObjectType::FuelTank), "fuel_tank");
    }

    #[test]
    fn test_insert_and_parenting() {
        let mut t = tree();
        let root = t.insert(None, "Root", ObjectType::from("vessel")).unwrap();
        let child = t.insert(Some(root), "Child", ObjectType::FuelTank).unwrap();

        assert_eq!(t.len(), 2);
        assert_eq!(t.parent(child), Some(root));
        assert_eq!(t.children(root), &[child]);
        assert_eq!(t.roots(), &[root]);
    }

    #[test]
    fn test_insert_under_missing_parent_fails() {
        let mut t = tree();
        let ghost = ObjectId::new(7, 0);
        let result = t.insert(Some(ghost), "Orphan", ObjectType::FuelTank);
        assert!(matches!(result, Err(CoreError::ObjectNotFound(id)) if id == ghost));
    }

    #[test]
    fn test_stale_handle_does_not_resolve() {
        let mut t = tree();
        let first = t.insert(None, "First", ObjectType::FuelTank).unwrap();
        t.remove(first).unwrap();

        let second = t.insert(None, "Second", ObjectType::FuelTank).unwrap();
        assert_eq!(first.index(), second.index());
        assert!(!t.contains(first));
        assert_eq!(t.get(second).unwrap().name, "Second");
    }

    #[test]
    fn test_remove_orphans_children() {
        let mut t = tree();
        let root = t.insert(None, "Root", ObjectType::Modifier).unwrap();
        let child = t.insert(Some(root), "Child", ObjectType::FuelTank).unwrap();

        t.remove(root).unwrap();
        assert_eq!(t.parent(child), None);
        assert!(t.roots().contains(&child));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let mut t = tree();
        let a = t.insert(None, "A", ObjectType::Modifier).unwrap();
        let b = t.insert(Some(a), "B", ObjectType::Modifier).unwrap();
        let c = t.insert(Some(b), "C", ObjectType::FuelTank).unwrap();

        assert!(matches!(t.set_parent(a, Some(c)), Err(CoreError::CyclicParent { .. })));
        assert!(matches!(t.set_parent(a, Some(a)), Err(CoreError::CyclicParent { .. })));

        t.set_parent(c, Some(a)).unwrap();
        assert_eq!(t.children(a), &[b, c]);
        assert!(t.children(b).is_empty());
    }

    #[test]
    fn test_traversals() {
        let mut t = tree();
        let root = t.insert(None, "Root", ObjectType::Modifier).unwrap();
        let child1 = t.insert(Some(root), "Child1", ObjectType::Modifier).unwrap();
        let child2 = t.insert(Some(root), "Child2", ObjectType::FuelTank).unwrap();
        let grandchild = t.insert(Some(child1), "Grandchild", ObjectType::FuelTank).unwrap();

        assert_eq!(t.post_order(root), vec![grandchild, child1, child2, root]);
        assert_eq!(t.ancestors(grandchild), vec![child1, root]);
        assert_eq!(t.find_by_name("Child2"), Some(child2));
        assert_eq!(t.find_by_name("Nope"), None);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut t = tree();
        let tank = t.insert(None, "Tank", ObjectType::FuelTank).unwrap();
        t.get_mut(tank).unwrap().state.set_variable("is_oxidizer", 1.0);

        let snapshot = t.snapshot(tank).unwrap();
        t.get_mut(tank).unwrap().state.set_variable("is_oxidizer", 0.0);

        assert!(snapshot.is_oxidizer_tank());
        assert!(!t.snapshot(tank).unwrap().is_oxidizer_tank());
    }

    #[test]
    fn test_renderer_slot() {
        let mut t = tree();
        let id = t.insert(None, "Obj", ObjectType::FuelTank).unwrap();
        assert!(t.renderer(id).is_none());

        assert_eq!(t.attach_renderer(id, 5).unwrap(), None);
        *t.renderer_mut(id).unwrap() += 1;
        assert_eq!(t.renderer(id), Some(&6));
        assert_eq!(t.detach_renderer(id), Some(6));
        assert!(t.renderer(id).is_none());
    }
}
