//! Materials
//!
//! Flat diffuse materials assigned to triangle groups. The color of a group
//! depends only on what kind of object produced it.

use hullmesh_core::ObjectSnapshot;

/// Diffuse material for one triangle group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Material {
    /// Diffuse color (sRGB, 8 bits per channel)
    pub diffuse: [u8; 3],
}

impl Material {
    /// Material used for everything without a special color
    pub const DEFAULT: Self = Self { diffuse: [204, 204, 204] };
    /// Tanks holding oxidizer
    pub const OXIDIZER: Self = Self { diffuse: [0, 0, 255] };
    /// Tanks holding fuel
    pub const FUEL: Self = Self { diffuse: [255, 255, 0] };
}

impl Default for Material {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Semantic kind of the object a mesh was generated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Propellant tank
    FuelTank { oxidizer: bool },
    #[default]
    Generic,
}

impl SourceKind {
    /// Classify a snapshot
    pub fn of(snapshot: &ObjectSnapshot) -> Self {
        match snapshot.object_type {
            hullmesh_core::ObjectType::FuelTank => Self::FuelTank {
                oxidizer: snapshot.is_oxidizer_tank(),
            },
            _ => Self::Generic,
        }
    }

    /// Material for every triangle group of this kind
    pub fn material(&self) -> Material {
        match self {
            Self::FuelTank { oxidizer: true } => Material::OXIDIZER,
            Self::FuelTank { oxidizer: false } => Material::FUEL,
            Self::Generic => Material::DEFAULT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hullmesh_core::{ObjectState, ObjectType};

    fn snapshot(object_type: ObjectType, oxidizer: f64) -> ObjectSnapshot {
        let mut state = ObjectState::new();
        state.set_variable("is_oxidizer", oxidizer);
        ObjectSnapshot {
            name: "obj".into(),
            object_type,
            state,
        }
    }

    #[test]
    fn test_tank_colors() {
        assert_eq!(SourceKind::of(&snapshot(ObjectType::FuelTank, 1.0)).material(), Material::OXIDIZER);
        assert_eq!(SourceKind::of(&snapshot(ObjectType::FuelTank, 0.0)).material(), Material::FUEL);
    }

    #[test]
    fn test_other_types_use_default() {
        // The oxidizer flag only matters on tanks
        let kind = SourceKind::of(&snapshot(ObjectType::from("engine"), 1.0));
        assert_eq!(kind, SourceKind::Generic);
        assert_eq!(kind.material(), Material::DEFAULT);
    }
}
