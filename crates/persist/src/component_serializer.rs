use std::any::TypeId;
use std::sync::Arc;

use worldspace_ecs::{Component, ComponentLibrary, ComponentMetadata, FieldError, FieldMetadata};
use worldspace_typehandling::{PersistedValue, TypeHandlerLibrary};

use crate::checks::FieldSerializeCheck;
use crate::error::PersistError;
use crate::id_mapping::ComponentIdMapping;
use crate::wire::{ComponentKey, EncodedComponent, EncodedField, FieldKey};

/// Encodes single components field by field, in full or as a delta against a
/// reference instance of the same type.
#[derive(Debug, Clone)]
pub struct ComponentSerializer {
    library: Arc<ComponentLibrary>,
    handlers: Arc<TypeHandlerLibrary>,
    id_mapping: ComponentIdMapping,
    using_field_ids: bool,
}

impl ComponentSerializer {
    pub fn new(library: Arc<ComponentLibrary>, handlers: Arc<TypeHandlerLibrary>) -> Self {
        Self {
            library,
            handlers,
            id_mapping: ComponentIdMapping::new(),
            using_field_ids: false,
        }
    }

    pub fn library(&self) -> &ComponentLibrary {
        &self.library
    }

    pub fn handlers(&self) -> &TypeHandlerLibrary {
        &self.handlers
    }

    pub fn id_mapping(&self) -> &ComponentIdMapping {
        &self.id_mapping
    }

    pub fn set_id_mapping(&mut self, mapping: ComponentIdMapping) {
        self.id_mapping = mapping;
    }

    /// Map the component type described by `metadata` to a compact id.
    pub fn set_component_id(&mut self, metadata: &ComponentMetadata, id: u32) -> Result<(), PersistError> {
        self.id_mapping.insert(metadata, id)
    }

    pub fn remove_component_id(&mut self, type_id: TypeId) -> Option<u32> {
        self.id_mapping.remove(type_id)
    }

    pub fn is_using_field_ids(&self) -> bool {
        self.using_field_ids
    }

    pub fn set_using_field_ids(&mut self, using_field_ids: bool) {
        self.using_field_ids = using_field_ids;
    }

    /// Key a component type is written under: its id if mapped, else its name.
    pub fn component_key(&self, metadata: &ComponentMetadata) -> ComponentKey {
        match self.id_mapping.id(metadata.type_id()) {
            Some(id) => ComponentKey::Id(u64::from(id)),
            None => ComponentKey::Name(metadata.name().to_string()),
        }
    }

    /// Resolve a component key to its metadata.
    pub fn resolve(&self, key: &ComponentKey) -> Option<&ComponentMetadata> {
        match key {
            ComponentKey::Id(id) => u32::try_from(*id)
                .ok()
                .and_then(|id| self.id_mapping.type_for(id))
                .and_then(|type_id| self.library.metadata(type_id)),
            ComponentKey::Name(name) => self.library.resolve(name),
        }
    }

    fn metadata_of(&self, component: &dyn Component) -> Result<&ComponentMetadata, PersistError> {
        self.library
            .metadata_of(component)
            .ok_or_else(|| PersistError::UnknownComponent(format!("{component:?}")))
    }

    fn field_key(&self, field: &FieldMetadata) -> FieldKey {
        if self.using_field_ids {
            FieldKey::Id(u64::from(field.id()))
        } else {
            FieldKey::Name(field.name().to_string())
        }
    }

    /// Encode every field of `component` accepted by `check`. Absent values are omitted.
    pub fn serialize(
        &self,
        component: &dyn Component,
        check: &dyn FieldSerializeCheck,
    ) -> Result<EncodedComponent, PersistError> {
        let metadata = self.metadata_of(component)?;
        let mut fields = Vec::new();
        for field in metadata.fields() {
            if !check.should_serialize(metadata, field) {
                continue;
            }
            if let Some(value) = self.serialize_field(metadata, field, component)? {
                fields.push(EncodedField {
                    key: self.field_key(field),
                    value,
                });
            }
        }
        Ok(EncodedComponent {
            component: self.component_key(metadata),
            fields,
        })
    }

    /// Encode only the fields of `component` that differ from `base`.
    ///
    /// Returns `Ok(None)` when no field differs.
    pub fn serialize_delta(
        &self,
        base: &dyn Component,
        component: &dyn Component,
        check: &dyn FieldSerializeCheck,
    ) -> Result<Option<EncodedComponent>, PersistError> {
        let metadata = self.metadata_of(component)?;
        if !metadata.describes(base) {
            return Err(PersistError::ComponentMismatch {
                expected: metadata.name().to_string(),
                found: self
                    .library
                    .metadata_of(base)
                    .map_or_else(|| format!("{base:?}"), |m| m.name().to_string()),
            });
        }

        let mut fields = Vec::new();
        for field in metadata.fields() {
            if !check.should_serialize(metadata, field) || field.values_equal(base, component) {
                continue;
            }
            if let Some(value) = self.serialize_field(metadata, field, component)? {
                fields.push(EncodedField {
                    key: self.field_key(field),
                    value,
                });
            }
        }
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(EncodedComponent {
            component: self.component_key(metadata),
            fields,
        }))
    }

    fn serialize_field(
        &self,
        metadata: &ComponentMetadata,
        field: &FieldMetadata,
        component: &dyn Component,
    ) -> Result<Option<PersistedValue>, PersistError> {
        match field.serialize(component, &self.handlers) {
            Ok(value) => Ok(value),
            Err(FieldError::UnknownType(err)) => {
                tracing::warn!(component = metadata.name(), field = field.name(), %err, "field not serialized");
                Ok(None)
            }
            Err(FieldError::WrongComponent { expected, .. }) => Err(PersistError::ComponentMismatch {
                expected: expected.to_string(),
                found: metadata.name().to_string(),
            }),
        }
    }

    /// Build a default instance of the encoded type and apply the encoded fields.
    pub fn deserialize(
        &self,
        data: &EncodedComponent,
        check: &dyn FieldSerializeCheck,
    ) -> Result<Box<dyn Component>, PersistError> {
        let metadata = self
            .resolve(&data.component)
            .ok_or_else(|| PersistError::UnknownComponent(data.component.to_string()))?;
        let mut component = metadata.new_instance();
        self.apply_fields(metadata, &mut *component, data, check)?;
        Ok(component)
    }

    /// Overwrite the encoded fields of an existing component in place.
    /// Fields missing from `data` keep their current value.
    pub fn deserialize_onto(
        &self,
        target: &mut dyn Component,
        data: &EncodedComponent,
        check: &dyn FieldSerializeCheck,
    ) -> Result<(), PersistError> {
        let metadata = self
            .resolve(&data.component)
            .ok_or_else(|| PersistError::UnknownComponent(data.component.to_string()))?;
        if !metadata.describes(target) {
            return Err(PersistError::ComponentMismatch {
                expected: metadata.name().to_string(),
                found: format!("{target:?}"),
            });
        }
        self.apply_fields(metadata, target, data, check)
    }

    fn apply_fields(
        &self,
        metadata: &ComponentMetadata,
        target: &mut dyn Component,
        data: &EncodedComponent,
        check: &dyn FieldSerializeCheck,
    ) -> Result<(), PersistError> {
        for encoded in &data.fields {
            let field = match &encoded.key {
                FieldKey::Id(id) => u8::try_from(*id).ok().and_then(|id| metadata.field_by_id(id)),
                FieldKey::Name(name) => metadata.field(name),
            };
            let Some(field) = field else {
                tracing::warn!(component = metadata.name(), field = %encoded.key, "unknown field skipped");
                continue;
            };
            if !check.should_deserialize(metadata, field) {
                continue;
            }
            match field.deserialize_onto(target, &encoded.value, &self.handlers) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(component = metadata.name(), field = field.name(), "malformed field value, keeping default");
                }
                Err(FieldError::UnknownType(err)) => {
                    tracing::warn!(component = metadata.name(), field = field.name(), %err, "field not deserialized");
                }
                Err(FieldError::WrongComponent { expected, .. }) => {
                    return Err(PersistError::ComponentMismatch {
                        expected: expected.to_string(),
                        found: metadata.name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
