use std::any::TypeId;
use std::collections::HashMap;

use worldspace_ecs::{ComponentLibrary, ComponentMetadata};

use crate::error::PersistError;

/// Injective map from component type to compact integer id.
///
/// Types without an entry are encoded by name.
#[derive(Debug, Clone, Default)]
pub struct ComponentIdMapping {
    ids: HashMap<TypeId, u32>,
    types: HashMap<u32, (TypeId, &'static str)>,
}

impl ComponentIdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids assigned in library registration order, starting at 0.
    pub fn from_library(library: &ComponentLibrary) -> Self {
        let mut mapping = Self::new();
        for (id, metadata) in (0u32..).zip(library.iter()) {
            mapping.ids.insert(metadata.type_id(), id);
            mapping.types.insert(id, (metadata.type_id(), metadata.type_name()));
        }
        mapping
    }

    /// Map a component type to `id`, replacing any previous id of that type.
    ///
    /// Fails if `id` already belongs to another type; the mapping is left unchanged.
    pub fn insert(&mut self, metadata: &ComponentMetadata, id: u32) -> Result<(), PersistError> {
        let type_id = metadata.type_id();
        if let Some(&(existing, existing_name)) = self.types.get(&id) {
            if existing != type_id {
                return Err(PersistError::DuplicateComponentId {
                    id,
                    existing: existing_name,
                    rejected: metadata.type_name(),
                });
            }
        }
        if let Some(previous) = self.ids.insert(type_id, id) {
            self.types.remove(&previous);
        }
        self.types.insert(id, (type_id, metadata.type_name()));
        Ok(())
    }

    pub fn remove(&mut self, type_id: TypeId) -> Option<u32> {
        let id = self.ids.remove(&type_id)?;
        self.types.remove(&id);
        Some(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.types.clear();
    }

    pub fn id(&self, type_id: TypeId) -> Option<u32> {
        self.ids.get(&type_id).copied()
    }

    pub fn type_for(&self, id: u32) -> Option<TypeId> {
        self.types.get(&id).map(|&(type_id, _)| type_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
