//! Math utilities
//!
//! Re-exports from glam plus the bounding volume and matrix helpers the
//! mesh pipeline needs.

pub use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Create an empty AABB
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create the smallest AABB enclosing a flat `[x, y, z, x, y, z, ...]` array
    pub fn from_flat_points(coords: &[f32]) -> Self {
        let mut result = Self::EMPTY;
        for point in coords.chunks_exact(3) {
            result.expand_to_include(Vec3::new(point[0], point[1], point[2]));
        }
        result
    }

    /// Check if the AABB is empty
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand the AABB to include a point
    pub fn expand_to_include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Smallest box enclosing both
    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Box enclosing this one after `matrix` is applied to all eight corners
    pub fn transform(&self, matrix: Mat4) -> Aabb {
        if self.is_empty() {
            return *self;
        }

        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];

        let mut result = Aabb::EMPTY;
        for corner in corners {
            result.expand_to_include(matrix.transform_point3(corner));
        }
        result
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Translation part of an affine matrix
pub fn translation_of(matrix: Mat4) -> Vec3 {
    matrix.w_axis.truncate()
}

/// Element-wise comparison of two matrices within `epsilon`
pub fn matrices_approx_eq(a: Mat4, b: Mat4, epsilon: f32) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| (x - y).abs() <= epsilon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_from_flat_points() {
        let aabb = Aabb::from_flat_points(&[0.0, 1.0, 2.0, -1.0, 3.0, 0.5]);
        assert_eq!(aabb.min, Vec3::new(-1.0, 1.0, 0.5));
        assert_eq!(aabb.max, Vec3::new(0.0, 3.0, 2.0));

        assert!(Aabb::from_flat_points(&[]).is_empty());
    }

    #[test]
    fn test_aabb_transform() {
        let unit = Aabb::from_flat_points(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let moved = unit.transform(Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(moved.min, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(moved.max, Vec3::new(3.0, 1.0, 1.0));

        // A quarter turn about Z swaps the x and y extents
        let turned = unit.transform(Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2));
        assert!((turned.min.x + 1.0).abs() < 1e-5);
        assert!((turned.max.y - 1.0).abs() < 1e-5);

        assert!(Aabb::EMPTY.transform(Mat4::IDENTITY).is_empty());
    }

    #[test]
    fn test_aabb_merge() {
        let a = Aabb::from_flat_points(&[0.0, 0.0, 0.0]);
        let b = Aabb::from_flat_points(&[2.0, -1.0, 3.0]);
        let merged = a.merge(&b);
        assert_eq!(merged.min, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(merged.max, Vec3::new(2.0, 0.0, 3.0));

        // The empty box is the identity for merging
        assert_eq!(Aabb::EMPTY.merge(&a), a);
    }

    #[test]
    fn test_translation_of() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)) * Mat4::from_rotation_z(0.3);
        assert_eq!(translation_of(m), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_matrices_approx_eq() {
        let a = Mat4::from_rotation_x(0.5);
        let b = Mat4::from_rotation_x(0.5 + 1e-7);
        assert!(matrices_approx_eq(a, b, 1e-5));
        assert!(!matrices_approx_eq(a, Mat4::IDENTITY, 1e-5));
    }
}
