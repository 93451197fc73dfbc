//! # Hullmesh Core
//!
//! Core data model for the hullmesh renderable-mesh pipeline.
//!
//! This crate provides the pieces every other layer builds on:
//! - **Object Tree**: Hierarchical vehicle objects with generation-checked handles
//! - **Snapshots**: Deep copies of object state for background mesh generation
//! - **Settings**: LOD and resolution configuration passed in at construction
//! - **Math**: glam re-exports and bounding volumes

pub mod config;
pub mod math;
pub mod object;

pub use config::RenderSettings;
pub use math::Aabb;
pub use object::{ObjectId, ObjectSnapshot, ObjectState, ObjectTree, ObjectType, SceneObject};

use thiserror::Error;

/// Core errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Cannot parent {child} under {parent}: it would create a cycle")]
    CyclicParent { child: ObjectId, parent: ObjectId },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = ObjectId::new(3, 1);
        let err = CoreError::ObjectNotFound(id);
        assert_eq!(err.to_string(), "Object not found: #3v1");

        let err = CoreError::CyclicParent {
            child: ObjectId::new(1, 0),
            parent: ObjectId::new(2, 0),
        };
        assert!(err.to_string().contains("#1v0"));
    }
}
