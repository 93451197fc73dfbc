//! Mesh Generators
//!
//! The capability that turns an object snapshot into raw triangles, plus a
//! primitive reference implementation.

use std::f32::consts::TAU;

use bitflags::bitflags;
use glam::Vec3;
use hullmesh_core::ObjectSnapshot;
use thiserror::Error;

use crate::mesh::{MeshFragment, Triangle};

bitflags! {
    /// Generation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GenerateFlags: u32 {
        /// Subdivide long surfaces into rings of `resolution` size
        const USE_DIVISIONS = 0b0001;
    }
}

/// Options for one generation call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateOptions {
    /// Target triangle size
    pub resolution: f32,
    /// Lower bound on the triangle size
    pub min_resolution: f32,
    pub flags: GenerateFlags,
}

impl GenerateOptions {
    /// Options with divisions enabled
    pub fn new(resolution: f32, min_resolution: f32) -> Self {
        Self {
            resolution,
            min_resolution,
            flags: GenerateFlags::USE_DIVISIONS,
        }
    }
}

/// Generator errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerateError {
    #[error("Object '{0}' has no extent to mesh")]
    Degenerate(String),

    #[error("Object type '{0}' is not supported")]
    Unsupported(String),
}

/// Turns object snapshots into mesh fragments.
///
/// Implementations run on LOD worker threads and must be deterministic for a
/// given snapshot and options.
pub trait MeshGenerator: Send + Sync {
    fn generate(
        &self,
        snapshot: &ObjectSnapshot,
        options: &GenerateOptions,
    ) -> Result<MeshFragment, GenerateError>;
}

impl<F> MeshGenerator for F
where
    F: Fn(&ObjectSnapshot, &GenerateOptions) -> Result<MeshFragment, GenerateError> + Send + Sync,
{
    fn generate(
        &self,
        snapshot: &ObjectSnapshot,
        options: &GenerateOptions,
    ) -> Result<MeshFragment, GenerateError> {
        self(snapshot, options)
    }
}

const MIN_SEGMENTS: usize = 3;
const MAX_SEGMENTS: usize = 256;
const MAX_RINGS: usize = 64;

const SIDE_GROUP: u32 = 0;
const FRONT_CAP_GROUP: u32 = 1;
const BACK_CAP_GROUP: u32 = 2;

/// Tessellates every object as a capped cone frustum along +X.
///
/// Reads `length` and either `radius` or `r1`/`r2` (front/back). Resolutions
/// are scaled by `scale` before use, so the default interprets them in
/// hundredths of a scene unit.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveGenerator {
    pub scale: f32,
}

impl Default for PrimitiveGenerator {
    fn default() -> Self {
        Self { scale: 0.01 }
    }
}

impl PrimitiveGenerator {
    /// Create a generator with the default scale
    pub fn new() -> Self {
        Self::default()
    }

    fn radii(snapshot: &ObjectSnapshot) -> (f32, f32) {
        let state = &snapshot.state;
        let radius = state.variable("radius") as f32;
        let r1 = if state.has_variable("r1") { state.variable("r1") as f32 } else { radius };
        let r2 = if state.has_variable("r2") { state.variable("r2") as f32 } else { radius };
        (r1.max(0.0), r2.max(0.0))
    }
}

impl MeshGenerator for PrimitiveGenerator {
    fn generate(
        &self,
        snapshot: &ObjectSnapshot,
        options: &GenerateOptions,
    ) -> Result<MeshFragment, GenerateError> {
        if snapshot.object_type.is_modifier() {
            return Ok(MeshFragment::empty());
        }

        let length = snapshot.state.variable("length") as f32;
        let (r1, r2) = Self::radii(snapshot);
        if length <= 0.0 || (r1 <= 0.0 && r2 <= 0.0) {
            return Err(GenerateError::Degenerate(snapshot.name.clone()));
        }

        let edge = (options.resolution * self.scale).max(options.min_resolution).max(f32::EPSILON);
        let segments = ((TAU * r1.max(r2) / edge).ceil() as usize).clamp(MIN_SEGMENTS, MAX_SEGMENTS);
        let rings = if options.flags.contains(GenerateFlags::USE_DIVISIONS) {
            ((length / edge).ceil() as usize).clamp(1, MAX_RINGS)
        } else {
            1
        };

        let mut fragment = MeshFragment {
            smoothing_groups: 3,
            ..MeshFragment::default()
        };
        let slope = (r2 - r1) / length;

        // Side surface
        for ring in 0..=rings {
            let t = ring as f32 / rings as f32;
            let x = length * t;
            let r = r1 + (r2 - r1) * t;
            for segment in 0..segments {
                let angle = TAU * segment as f32 / segments as f32;
                let (sin, cos) = angle.sin_cos();
                fragment.vertices.push(Vec3::new(x, r * cos, r * sin));
                fragment.normals.push(Vec3::new(-slope, cos, sin).normalize());
            }
        }
        for ring in 0..rings {
            let a = (ring * segments) as u32;
            let b = ((ring + 1) * segments) as u32;
            for segment in 0..segments as u32 {
                let next = (segment + 1) % segments as u32;
                fragment.triangles.push(Triangle {
                    indices: [a + segment, b + segment, b + next],
                    smoothing_group: SIDE_GROUP,
                });
                fragment.triangles.push(Triangle {
                    indices: [a + segment, b + next, a + next],
                    smoothing_group: SIDE_GROUP,
                });
            }
        }

        // Caps
        for (x, r, normal, group) in [
            (0.0, r1, -Vec3::X, FRONT_CAP_GROUP),
            (length, r2, Vec3::X, BACK_CAP_GROUP),
        ] {
            if r <= 0.0 {
                continue;
            }
            let center = fragment.vertices.len() as u32;
            fragment.vertices.push(Vec3::new(x, 0.0, 0.0));
            fragment.normals.push(normal);
            for segment in 0..segments {
                let angle = TAU * segment as f32 / segments as f32;
                let (sin, cos) = angle.sin_cos();
                fragment.vertices.push(Vec3::new(x, r * cos, r * sin));
                fragment.normals.push(normal);
            }
            for segment in 0..segments as u32 {
                let current = center + 1 + segment;
                let next = center + 1 + (segment + 1) % segments as u32;
                let indices = if normal.x < 0.0 {
                    [center, next, current]
                } else {
                    [center, current, next]
                };
                fragment.triangles.push(Triangle { indices, smoothing_group: group });
            }
        }

        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hullmesh_core::{ObjectState, ObjectType};

    fn cylinder(length: f64, radius: f64) -> ObjectSnapshot {
        let mut state = ObjectState::new();
        state.set_variable("length", length);
        state.set_variable("radius", radius);
        ObjectSnapshot {
            name: "tank".into(),
            object_type: ObjectType::FuelTank,
            state,
        }
    }

    #[test]
    fn test_options_enable_divisions() {
        let options = GenerateOptions::new(0.001, 0.01);
        assert!(options.flags.contains(GenerateFlags::USE_DIVISIONS));
    }

    #[test]
    fn test_coarser_resolution_gives_fewer_triangles() {
        let generator = PrimitiveGenerator::new();
        let snapshot = cylinder(4.0, 1.0);

        let fine = generator.generate(&snapshot, &GenerateOptions::new(32.0, 0.01)).unwrap();
        let coarse = generator.generate(&snapshot, &GenerateOptions::new(192.0, 0.01)).unwrap();

        assert!(fine.triangles.len() > coarse.triangles.len());
        assert_eq!(fine.vertices.len(), fine.normals.len());
        assert_eq!(fine.smoothing_groups, 3);
    }

    #[test]
    fn test_indices_in_range() {
        let generator = PrimitiveGenerator::new();
        let fragment = generator.generate(&cylinder(2.0, 0.5), &GenerateOptions::new(50.0, 0.01)).unwrap();
        let count = fragment.vertices.len() as u32;
        assert!(fragment.triangles.iter().all(|t| t.indices.iter().all(|i| *i < count)));
    }

    #[test]
    fn test_divisions_flag_controls_rings() {
        let generator = PrimitiveGenerator::new();
        let snapshot = cylinder(10.0, 1.0);

        let mut options = GenerateOptions::new(100.0, 0.01);
        let divided = generator.generate(&snapshot, &options).unwrap();
        options.flags = GenerateFlags::empty();
        let single = generator.generate(&snapshot, &options).unwrap();

        assert!(divided.triangles.len() > single.triangles.len());
    }

    #[test]
    fn test_cone_skips_pointed_cap() {
        let generator = PrimitiveGenerator::new();
        let mut snapshot = cylinder(1.0, 0.0);
        snapshot.state.set_variable("r1", 1.0);

        let fragment = generator.generate(&snapshot, &GenerateOptions::new(100.0, 0.01)).unwrap();
        assert!(fragment.triangles.iter().all(|t| t.smoothing_group != BACK_CAP_GROUP));
        assert!(fragment.triangles.iter().any(|t| t.smoothing_group == FRONT_CAP_GROUP));
    }

    #[test]
    fn test_modifier_and_degenerate_objects() {
        let generator = PrimitiveGenerator::new();
        let options = GenerateOptions::new(32.0, 0.01);

        let mut modifier = cylinder(1.0, 1.0);
        modifier.object_type = ObjectType::Modifier;
        assert!(generator.generate(&modifier, &options).unwrap().is_empty());

        let flat = cylinder(0.0, 1.0);
        assert_eq!(
            generator.generate(&flat, &options),
            Err(GenerateError::Degenerate("tank".into()))
        );
    }

    #[test]
    fn test_closure_generator() {
        let generator = |_: &ObjectSnapshot, _: &GenerateOptions| -> Result<MeshFragment, GenerateError> {
            Ok(MeshFragment::empty())
        };
        let result = generator.generate(&cylinder(1.0, 1.0), &GenerateOptions::new(1.0, 0.01));
        assert!(result.unwrap().is_empty());
    }
}
