//! Component model consumed by the persistence layer.
//!
//! Components are plain Rust structs. Each component type is described by a
//! [`ComponentMetadata`] capability table (name, fields, field accessors)
//! registered in a [`ComponentLibrary`]; nothing relies on runtime reflection.
//!
//! # Invariants
//! - An entity holds at most one component per component type.
//! - Prefabs are immutable once registered.
//! - Owner references are logical only; an owner that no longer exists reads as absent.

mod component;
pub mod components;
mod entity;
mod library;
mod metadata;
mod prefab;

pub use component::{Component, ComponentMap};
pub use entity::{Entity, EntityInfo, EntityManager};
pub use library::{ComponentLibrary, ComponentLibraryError};
pub use metadata::{ComponentMetadata, ComponentMetadataBuilder, FieldError, FieldMetadata, MAX_FIELDS};
pub use prefab::{Prefab, PrefabBuilder, PrefabManager};
