//! Serialized forms of components, entities and chunks.
//!
//! These are the structures written as CBOR. Optional fields are skipped when
//! absent so a delta-encoded entity only carries what differs from its prefab.

use std::fmt;

use serde::{Deserialize, Serialize};
use worldspace_common::EntityScope;
use worldspace_kernel::ChunkData;
use worldspace_typehandling::PersistedValue;

/// Identifies a component type: a compact id from an id mapping, or its name.
///
/// Ids decode at full width; one outside the mapping's range simply fails to
/// resolve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentKey {
    Id(u64),
    Name(String),
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Identifies a field within its component: field id or field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldKey {
    Id(u64),
    Name(String),
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedField {
    pub key: FieldKey,
    pub value: PersistedValue,
}

/// One component with the fields that were written. Missing fields decode to
/// their default (or keep the prefab value when merged onto a prefab component).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedComponent {
    pub component: ComponentKey,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EncodedField>,
}

impl EncodedComponent {
    pub fn field(&self, key: &FieldKey) -> Option<&PersistedValue> {
        self.fields.iter().find(|f| &f.key == key).map(|f| &f.value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodedEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_relevant: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<EntityScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_prefab: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<EncodedComponent>,
    /// Prefab components the entity no longer has.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_components: Vec<ComponentKey>,
}

impl EncodedEntity {
    pub fn component(&self, key: &ComponentKey) -> Option<&EncodedComponent> {
        self.components.iter().find(|c| &c.component == key)
    }
}

/// A set of encoded entities plus the component table their compact ids refer to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStore {
    /// Component names indexed by component id.
    #[serde(default)]
    pub component_names: Vec<String>,
    #[serde(default)]
    pub entities: Vec<EncodedEntity>,
}

/// Block payload of one chunk together with the entities stored with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkStore {
    pub chunk: ChunkData,
    pub store: EntityStore,
}
