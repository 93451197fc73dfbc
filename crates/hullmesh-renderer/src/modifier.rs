//! Modifier Replicator
//!
//! Modifiers replicate every descendant's geometry along a linear (three
//! independent axes) or circular pattern. The replica set is rebuilt from
//! scratch on every change; nested modifiers contribute their own replicas
//! composed with the outer transformation.

use glam::{Mat4, Vec3};
use hullmesh_core::{ObjectId, ObjectState};

use crate::collection::SceneCollection;
use crate::mesh::SharedMesh;
use crate::node::{ReplicaInstance, ReplicaSource};
use crate::scene::Scene;
use crate::{RendererError, RendererResult};

/// Largest number of copies along one vector
pub const MAX_COUNT: usize = 1024;

/// Layout of the replicated copies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Offsets along up to three vectors
    Linear,
    /// Rings around an axis
    Circular,
}

/// Replication parameters of one modifier
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationPattern {
    pub kind: PatternKind,
    /// Copies along each vector, clamped to `1..=MAX_COUNT`
    pub counts: [usize; 3],
    pub vectors: [Vec3; 3],
    /// Angle between copies, in degrees
    pub step: f32,
    pub radial_step: f32,
    pub normal_step: f32,
    pub radius: f32,
    /// Total arc in degrees, used when `step` is zero
    pub arc_length: f32,
    /// Rotate circular copies around the normal
    pub rotate: bool,
}

impl ReplicationPattern {
    /// Read the pattern from a modifier's variables
    pub fn from_state(state: &ObjectState) -> Self {
        let count = |axis: usize| {
            (state.variable(&format!("vector{axis}.count")) as i64).clamp(1, MAX_COUNT as i64) as usize
        };
        let vector = |axis: usize| {
            Vec3::new(
                state.variable(&format!("vector{axis}.x")) as f32,
                state.variable(&format!("vector{axis}.y")) as f32,
                state.variable(&format!("vector{axis}.z")) as f32,
            )
        };

        let counts = [count(1), count(2), count(3)];
        let mut step = state.variable("circular.step") as f32;
        let mut arc_length = state.variable("circular.arc_length") as f32;
        if step == 0.0 {
            if arc_length == 0.0 {
                arc_length = 360.0;
            }
            step = arc_length / counts[0] as f32;
        }

        let kind = match state.string("pattern") {
            Some("circular") => PatternKind::Circular,
            _ => PatternKind::Linear,
        };

        Self {
            kind,
            counts,
            vectors: [vector(1), vector(2), vector(3)],
            step,
            radial_step: state.variable("circular.radial_step") as f32,
            normal_step: state.variable("circular.normal_step") as f32,
            radius: state.variable("circular.radius") as f32,
            arc_length,
            rotate: state.variable("circular.rotate") > 0.5,
        }
    }

    /// Transformations of every copy, excluding the original
    pub fn transformations(&self) -> Vec<Mat4> {
        let [n1, n2, n3] = self.counts;
        let mut result = Vec::new();

        for i in 0..n1 {
            for j in 0..n2 {
                for k in 0..n3 {
                    let transformation = match self.kind {
                        PatternKind::Linear => self.linear(i, j, k),
                        PatternKind::Circular => self.circular(i, j, k),
                    };
                    result.extend(transformation);
                }
            }
        }
        result
    }

    fn linear(&self, i: usize, j: usize, k: usize) -> Option<Mat4> {
        if i == 0 && j == 0 && k == 0 {
            return None;
        }
        let [v1, v2, v3] = self.vectors;
        let offset = v1 * i as f32 + v2 * j as f32 + v3 * k as f32;
        Some(Mat4::from_translation(offset))
    }

    fn circular(&self, i: usize, j: usize, k: usize) -> Option<Mat4> {
        // Zero radius keeps only the outer rings, otherwise the first angle is skipped
        if (self.radius == 0.0 && j == 0) || (self.radius != 0.0 && i == 0) {
            return None;
        }

        let normal = Self::axis(self.vectors[0], Vec3::X);
        let direction = Self::axis(self.vectors[1], Vec3::Z);
        let u = -direction;
        let v = direction.cross(normal);

        let r = self.radius + j as f32 * self.radial_step;
        let theta = (i as f32 * self.step).to_radians();
        let offset = direction * self.radius
            + u * (r * theta.cos())
            + v * (r * theta.sin())
            + normal * (self.normal_step * k as f32);

        let translation = Mat4::from_translation(offset);
        if self.rotate {
            Some(translation * Mat4::from_axis_angle(normal, theta))
        } else {
            Some(translation)
        }
    }

    fn axis(vector: Vec3, fallback: Vec3) -> Vec3 {
        if vector.length() == 0.0 {
            fallback
        } else {
            vector.normalize()
        }
    }
}

impl<C: SceneCollection> Scene<C> {
    /// Add replicas of `child` (and, recursively, its descendants) to `modifier`.
    ///
    /// Nested modifiers are rebuilt before their replica lists are copied.
    pub(crate) fn add_modifier_instances(
        &mut self,
        modifier: ObjectId,
        child: ObjectId,
        transformations: &[Mat4],
    ) -> RendererResult<()> {
        let Some(child_node) = self.tree.renderer(child) else {
            return Ok(());
        };

        let source = ReplicaSource {
            object: child,
            instance: child_node.instance().id(),
        };
        let representation = child_node.mesh().clone();

        let is_nested_modifier = child != modifier
            && self.tree.get(child).is_some_and(|o| o.object_type.is_modifier());
        let nested: Vec<(ReplicaSource, SharedMesh, Mat4)> = if is_nested_modifier {
            child_node
                .replicas()
                .iter()
                .map(|r| (r.source(), r.instance().representation().clone(), r.transformation()))
                .collect()
        } else {
            Vec::new()
        };

        let mut created = Vec::with_capacity(transformations.len() * (1 + nested.len()));
        for transformation in transformations {
            created.push(ReplicaInstance::new(source, representation.clone(), *transformation));
            for (inner_source, inner_representation, inner) in &nested {
                created.push(ReplicaInstance::new(
                    *inner_source,
                    inner_representation.clone(),
                    *transformation * *inner,
                ));
            }
        }

        for replica in &created {
            self.collection.add(replica.instance());
        }
        self.tree
            .renderer_mut(modifier)
            .ok_or(RendererError::MissingRenderNode(modifier))?
            .replicas
            .extend(created);

        for grandchild in self.tree.children(child).to_vec() {
            if self.tree.get(grandchild).is_some_and(|o| o.object_type.is_modifier()) {
                self.mesh_invalidated(grandchild)?;
            }
            self.add_modifier_instances(modifier, grandchild, transformations)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hullmesh_core::math::{matrices_approx_eq, translation_of};

    fn linear(counts: [f64; 3], v1: Vec3) -> ObjectState {
        let mut state = ObjectState::new();
        for (axis, count) in counts.iter().enumerate() {
            state.set_variable(format!("vector{}.count", axis + 1), *count);
        }
        state.set_variable("vector1.x", v1.x as f64);
        state.set_variable("vector1.y", v1.y as f64);
        state.set_variable("vector1.z", v1.z as f64);
        state
    }

    #[test]
    fn test_single_linear_copy() {
        let pattern = ReplicationPattern::from_state(&linear([2.0, 1.0, 1.0], Vec3::X));
        assert_eq!(pattern.kind, PatternKind::Linear);

        let transforms = pattern.transformations();
        assert_eq!(transforms.len(), 1);
        assert!(matrices_approx_eq(
            transforms[0],
            Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)),
            1e-6
        ));
    }

    #[test]
    fn test_counts_below_one_are_clamped() {
        let pattern = ReplicationPattern::from_state(&linear([0.0, -3.0, 0.5], Vec3::X));
        assert_eq!(pattern.counts, [1, 1, 1]);
        assert!(pattern.transformations().is_empty());
    }

    #[test]
    fn test_huge_counts_are_clamped() {
        let pattern = ReplicationPattern::from_state(&linear([3.0e6, 3.0e6, 3.0e6], Vec3::X));
        assert_eq!(pattern.counts, [MAX_COUNT; 3]);

        let pattern = ReplicationPattern::from_state(&linear([3.0e6, 1.0, 1.0], Vec3::X));
        let transforms = pattern.transformations();
        assert_eq!(transforms.len(), MAX_COUNT - 1);
        assert_eq!(translation_of(transforms[MAX_COUNT - 2]), Vec3::new((MAX_COUNT - 1) as f32, 0.0, 0.0));

        let pattern = ReplicationPattern::from_state(&linear([f64::INFINITY, f64::NAN, 1.0], Vec3::X));
        assert_eq!(pattern.counts, [MAX_COUNT, 1, 1]);
    }

    #[test]
    fn test_linear_grid_skips_origin_only() {
        let mut state = linear([2.0, 3.0, 2.0], Vec3::X);
        state.set_variable("vector2.y", 1.0);
        state.set_variable("vector3.z", 1.0);

        let transforms = ReplicationPattern::from_state(&state).transformations();
        assert_eq!(transforms.len(), 11);
        let far = Vec3::new(1.0, 2.0, 1.0);
        assert!(transforms.iter().any(|m| (translation_of(*m) - far).length() < 1e-6));
        assert!(transforms.iter().all(|m| translation_of(*m).length() > 0.0));
    }

    #[test]
    fn test_circular_zero_radius_needs_outer_ring() {
        let mut state = linear([4.0, 1.0, 1.0], Vec3::ZERO);
        state.set_string("pattern", "circular");

        let pattern = ReplicationPattern::from_state(&state);
        assert_eq!(pattern.kind, PatternKind::Circular);
        assert_eq!(pattern.step, 90.0);
        assert!(pattern.transformations().is_empty());
    }

    #[test]
    fn test_circular_ring_positions() {
        let mut state = linear([4.0, 2.0, 1.0], Vec3::ZERO);
        state.set_string("pattern", "circular");
        state.set_variable("circular.radial_step", 1.0);

        let transforms = ReplicationPattern::from_state(&state).transformations();
        let positions: Vec<Vec3> = transforms.iter().map(|m| translation_of(*m)).collect();

        // Default normal +X, direction +Z: ring lies in the YZ plane
        let expected = [
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, -1.0, 0.0),
        ];
        assert_eq!(positions.len(), 4);
        for (actual, expected) in positions.iter().zip(expected) {
            assert!((*actual - expected).length() < 1e-5, "{actual} != {expected}");
        }
    }

    #[test]
    fn test_circular_nonzero_radius_skips_first_angle() {
        let mut state = linear([4.0, 1.0, 1.0], Vec3::ZERO);
        state.set_string("pattern", "circular");
        state.set_variable("circular.radius", 2.0);

        let transforms = ReplicationPattern::from_state(&state).transformations();
        assert_eq!(transforms.len(), 3);
        // The ring is centered at direction * radius
        let center = Vec3::new(0.0, 0.0, 2.0);
        for transform in &transforms {
            assert!(((translation_of(*transform) - center).length() - 2.0).abs() < 1e-5);
        }
        assert!((translation_of(transforms[1]) - Vec3::new(0.0, 0.0, 4.0)).length() < 1e-5);
    }

    #[test]
    fn test_circular_arc_and_rotation() {
        let mut state = linear([3.0, 2.0, 1.0], Vec3::ZERO);
        state.set_string("pattern", "circular");
        state.set_variable("circular.arc_length", 180.0);
        state.set_variable("circular.radial_step", 1.0);
        state.set_variable("circular.rotate", 1.0);

        let pattern = ReplicationPattern::from_state(&state);
        assert_eq!(pattern.step, 60.0);
        assert!(pattern.rotate);

        let transforms = pattern.transformations();
        assert_eq!(transforms.len(), 3);
        let rotated = transforms[1].transform_vector3(Vec3::Y);
        let expected = Mat4::from_axis_angle(Vec3::X, 60f32.to_radians()).transform_vector3(Vec3::Y);
        assert!((rotated - expected).length() < 1e-5);
    }

    #[test]
    fn test_explicit_step_wins_over_arc() {
        let mut state = linear([2.0, 2.0, 1.0], Vec3::ZERO);
        state.set_string("pattern", "circular");
        state.set_variable("circular.step", 45.0);
        state.set_variable("circular.arc_length", 10.0);
        assert_eq!(ReplicationPattern::from_state(&state).step, 45.0);
    }
}
