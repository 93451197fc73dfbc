//! # Hullmesh Renderer
//!
//! Renderable-mesh pipeline for hierarchical vehicle objects.
//!
//! ## Features
//! - Mesh accumulation of several LOD levels into one merged buffer
//! - Background LOD workers with debounced, sequence-checked snapshots
//! - Render nodes placing each object's geometry in world space
//! - Modifier replication along linear and circular patterns, nested
//!   modifiers included

pub mod collection;
pub mod generator;
pub mod lod;
pub mod material;
pub mod mesh;
pub mod modifier;
pub mod node;
pub mod scene;

pub use collection::{GeometryInstance, InstanceCollection, InstanceId, SceneCollection};
pub use generator::{GenerateError, GenerateFlags, GenerateOptions, MeshGenerator, PrimitiveGenerator};
pub use lod::{LodSignal, LodState, LodWorker, MergedMesh};
pub use material::{Material, SourceKind};
pub use mesh::{MeshAccumulator, MeshFragment, MeshSink, RenderMesh, SharedMesh, Triangle};
pub use modifier::{PatternKind, ReplicationPattern};
pub use node::{RenderNode, ReplicaInstance, ReplicaSource};
pub use scene::{Scene, SceneEvent};

use std::time::Duration;

use hullmesh_core::{CoreError, ObjectId};
use hullmesh_platform::PlatformError;
use thiserror::Error;

/// Renderer errors
#[derive(Error, Debug)]
pub enum RendererError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("Object {0} has no render node")]
    MissingRenderNode(ObjectId),

    #[error("LOD workers did not settle within {0:?}")]
    SettleTimeout(Duration),
}

/// Result type for renderer operations
pub type RendererResult<T> = Result<T, RendererError>;
