//! Scene Documents
//!
//! JSON description of an object tree, used to build a [`Scene`].

use glam::{Quat, Vec3};
use hullmesh_core::{ObjectId, ObjectState, ObjectType};
use hullmesh_renderer::{RendererResult, Scene, SceneCollection};
use indexmap::IndexMap;
use serde::Deserialize;

/// A whole scene file
#[derive(Debug, Clone, Deserialize)]
pub struct SceneDocument {
    pub objects: Vec<ObjectDocument>,
}

/// One object and its children
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    #[serde(default)]
    pub position: Vec3,
    /// Quaternion as `[x, y, z, w]`; a zero quaternion reads as identity
    #[serde(default)]
    pub orientation: Quat,
    #[serde(default)]
    pub variables: IndexMap<String, f64>,
    #[serde(default)]
    pub strings: IndexMap<String, String>,
    #[serde(default)]
    pub children: Vec<ObjectDocument>,
}

impl SceneDocument {
    /// Parse a scene document
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Add every object to `scene`, parents before children
    pub fn build<C: SceneCollection>(&self, scene: &mut Scene<C>) -> RendererResult<Vec<ObjectId>> {
        let mut added = Vec::new();
        for object in &self.objects {
            object.build(scene, None, &mut added)?;
        }
        Ok(added)
    }

    /// Number of objects including nested ones
    pub fn object_count(&self) -> usize {
        self.objects.iter().map(ObjectDocument::subtree_size).sum()
    }
}

impl ObjectDocument {
    /// Initial state of this object
    pub fn state(&self) -> ObjectState {
        let mut state = ObjectState::new();
        state.position = self.position;
        state.orientation = if self.orientation.is_finite() && self.orientation.length_squared() > f32::EPSILON {
            self.orientation.normalize()
        } else {
            Quat::IDENTITY
        };
        for (name, value) in &self.variables {
            state.set_variable(name.clone(), *value);
        }
        for (name, value) in &self.strings {
            state.set_string(name.clone(), value.clone());
        }
        state
    }

    fn build<C: SceneCollection>(
        &self,
        scene: &mut Scene<C>,
        parent: Option<ObjectId>,
        added: &mut Vec<ObjectId>,
    ) -> RendererResult<()> {
        let id = scene.add_object_with_state(parent, self.name.clone(), self.object_type.clone(), self.state())?;
        added.push(id);
        for child in &self.children {
            child.build(scene, Some(id), added)?;
        }
        Ok(())
    }

    fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(Self::subtree_size).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "objects": [{
            "name": "Array",
            "type": "modifier",
            "position": [0.0, 0.0, 5.0],
            "variables": { "vector1.count": 3, "vector1.x": 2.0 },
            "children": [{
                "name": "Tank",
                "type": "fuel_tank",
                "orientation": [0.0, 0.0, 0.0, 2.0],
                "variables": { "length": 1.0, "radius": 0.25, "is_oxidizer": 1 },
                "strings": { "label": "lox" }
            }]
        }]
    }"#;

    #[test]
    fn test_parse_document() {
        let doc = SceneDocument::from_json(DOC).unwrap();
        assert_eq!(doc.object_count(), 2);

        let array = &doc.objects[0];
        assert_eq!(array.object_type, ObjectType::Modifier);
        assert_eq!(array.position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(array.orientation, Quat::IDENTITY);

        let tank = array.children[0].state();
        assert_eq!(tank.variable("radius"), 0.25);
        assert_eq!(tank.string("label"), Some("lox"));
        // Orientation is normalized on load
        assert_eq!(tank.orientation, Quat::IDENTITY);
    }

    #[test]
    fn test_zero_orientation_reads_as_identity() {
        let doc = SceneDocument::from_json(
            r#"{ "objects": [{ "name": "Tank", "type": "fuel_tank", "orientation": [0.0, 0.0, 0.0, 0.0] }] }"#,
        )
        .unwrap();
        assert_eq!(doc.objects[0].state().orientation, Quat::IDENTITY);
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let result = SceneDocument::from_json(r#"{ "objects": [{ "type": "modifier" }] }"#);
        assert!(result.is_err());
    }
}
