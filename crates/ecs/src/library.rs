use std::any::TypeId;
use std::collections::HashMap;

use crate::component::Component;
use crate::metadata::{ComponentMetadata, MAX_FIELDS};

/// Errors from registering component types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComponentLibraryError {
    #[error("component name `{0}` is already registered")]
    DuplicateName(String),
    #[error("component type {0} is already registered")]
    DuplicateType(&'static str),
    #[error("component `{name}` declares {count} fields, at most {MAX_FIELDS} fit the field id space")]
    TooManyFields { name: String, count: usize },
}

/// Registry of component metadata, resolvable by name or by Rust type.
///
/// Iteration follows registration order, which is what compact component id
/// tables are derived from.
#[derive(Debug, Default)]
pub struct ComponentLibrary {
    metadata: Vec<ComponentMetadata>,
    by_type: HashMap<TypeId, usize>,
    by_name: HashMap<String, usize>,
    /// Unqualified name (after the `module:` prefix) to candidates.
    by_short_name: HashMap<String, Vec<usize>>,
}

impl ComponentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, metadata: ComponentMetadata) -> Result<(), ComponentLibraryError> {
        let key = metadata.name().to_ascii_lowercase();
        if self.by_name.contains_key(&key) {
            return Err(ComponentLibraryError::DuplicateName(metadata.name().to_string()));
        }
        if self.by_type.contains_key(&metadata.type_id()) {
            return Err(ComponentLibraryError::DuplicateType(metadata.type_name()));
        }
        if metadata.fields().len() > MAX_FIELDS {
            return Err(ComponentLibraryError::TooManyFields {
                name: metadata.name().to_string(),
                count: metadata.fields().len(),
            });
        }

        let index = self.metadata.len();
        if let Some((_, short)) = key.split_once(':') {
            self.by_short_name
                .entry(short.to_string())
                .or_default()
                .push(index);
        }
        self.by_name.insert(key, index);
        self.by_type.insert(metadata.type_id(), index);
        tracing::trace!(name = metadata.name(), "registered component type");
        self.metadata.push(metadata);
        Ok(())
    }

    /// Resolve a component type by name.
    ///
    /// Matching is case-insensitive. An unqualified name (`location`) resolves
    /// to a qualified one (`engine:location`) when exactly one module provides it.
    pub fn resolve(&self, name: &str) -> Option<&ComponentMetadata> {
        let key = name.to_ascii_lowercase();
        if let Some(&index) = self.by_name.get(&key) {
            return Some(&self.metadata[index]);
        }
        if key.contains(':') {
            return None;
        }
        match self.by_short_name.get(&key).map(Vec::as_slice) {
            Some([index]) => Some(&self.metadata[*index]),
            Some(candidates) if candidates.len() > 1 => {
                tracing::warn!(name, candidates = candidates.len(), "ambiguous component name");
                None
            }
            _ => None,
        }
    }

    pub fn metadata(&self, type_id: TypeId) -> Option<&ComponentMetadata> {
        self.by_type.get(&type_id).map(|&index| &self.metadata[index])
    }

    pub fn metadata_for<C: Component>(&self) -> Option<&ComponentMetadata> {
        self.metadata(TypeId::of::<C>())
    }

    pub fn metadata_of(&self, component: &dyn Component) -> Option<&ComponentMetadata> {
        self.metadata(component.component_type())
    }

    /// Deep copy of a component instance.
    pub fn copy(&self, component: &dyn Component) -> Box<dyn Component> {
        component.clone_component()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentMetadata> + '_ {
        self.metadata.iter()
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }
}
