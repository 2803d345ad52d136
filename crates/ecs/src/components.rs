//! Engine component types and their metadata.

use glam::{IVec3, Quat, Vec3};
use worldspace_common::EntityId;

use crate::library::{ComponentLibrary, ComponentLibraryError};
use crate::metadata::ComponentMetadata;

/// Human-readable name component.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DisplayName {
    pub name: String,
    pub description: String,
}

/// World placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

/// Renderable component: references mesh and material assets by handle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Renderable {
    pub mesh: u64,
    pub material: u64,
}

/// Physics body. Velocity is simulation state and is not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    pub mass: f32,
    pub is_kinematic: bool,
    pub velocity: Vec3,
}

impl Default for RigidBody {
    fn default() -> Self {
        Self {
            mass: 1.0,
            is_kinematic: false,
            velocity: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Health {
    pub current: i32,
    pub max: i32,
    pub regen_rate: f32,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            current: 20,
            max: 20,
            regen_rate: 0.0,
        }
    }
}

/// Item entities held in slots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Inventory {
    pub slots: Vec<EntityId>,
}

/// Axis-aligned block region, inclusive bounds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockRegion {
    pub min: IVec3,
    pub max: IVec3,
}

/// Replication bookkeeping; never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkState {
    pub network_id: u32,
}

/// Register every engine component type.
pub fn register_engine_components(library: &mut ComponentLibrary) -> Result<(), ComponentLibraryError> {
    library.register(
        ComponentMetadata::builder::<DisplayName>("engine:displayName")
            .field("name", |c| &c.name, |c| &mut c.name)
            .field("description", |c| &c.description, |c| &mut c.description)
            .build(),
    )?;
    library.register(
        ComponentMetadata::builder::<Location>("engine:location")
            .field("position", |c| &c.position, |c| &mut c.position)
            .field("rotation", |c| &c.rotation, |c| &mut c.rotation)
            .field("scale", |c| &c.scale, |c| &mut c.scale)
            .build(),
    )?;
    library.register(
        ComponentMetadata::builder::<Renderable>("engine:renderable")
            .field("mesh", |c| &c.mesh, |c| &mut c.mesh)
            .field("material", |c| &c.material, |c| &mut c.material)
            .build(),
    )?;
    library.register(
        ComponentMetadata::builder::<RigidBody>("engine:rigidBody")
            .field("mass", |c| &c.mass, |c| &mut c.mass)
            .field("isKinematic", |c| &c.is_kinematic, |c| &mut c.is_kinematic)
            .transient_field("velocity", |c| &c.velocity, |c| &mut c.velocity)
            .build(),
    )?;
    library.register(
        ComponentMetadata::builder::<Health>("engine:health")
            .field("current", |c| &c.current, |c| &mut c.current)
            .field("max", |c| &c.max, |c| &mut c.max)
            .field("regenRate", |c| &c.regen_rate, |c| &mut c.regen_rate)
            .build(),
    )?;
    library.register(
        ComponentMetadata::builder::<Inventory>("engine:inventory")
            .field("slots", |c| &c.slots, |c| &mut c.slots)
            .build(),
    )?;
    library.register(
        ComponentMetadata::builder::<BlockRegion>("engine:blockRegion")
            .field("min", |c| &c.min, |c| &mut c.min)
            .field("max", |c| &c.max, |c| &mut c.max)
            .build(),
    )?;
    library.register(
        ComponentMetadata::builder::<NetworkState>("engine:network")
            .do_not_persist()
            .field("networkId", |c| &c.network_id, |c| &mut c.network_id)
            .build(),
    )?;
    Ok(())
}
