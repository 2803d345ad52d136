//! Caller-supplied filters deciding which components and fields are (de)serialized.

use worldspace_ecs::{ComponentMetadata, FieldMetadata};

/// Decides which fields of a component take part in serialization.
pub trait FieldSerializeCheck: Send + Sync {
    fn should_serialize(&self, component: &ComponentMetadata, field: &FieldMetadata) -> bool;

    fn should_deserialize(&self, component: &ComponentMetadata, field: &FieldMetadata) -> bool {
        self.should_serialize(component, field)
    }
}

/// Every field.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllFields;

impl FieldSerializeCheck for AllFields {
    fn should_serialize(&self, _: &ComponentMetadata, _: &FieldMetadata) -> bool {
        true
    }
}

/// Skips transient fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistedFields;

impl FieldSerializeCheck for PersistedFields {
    fn should_serialize(&self, _: &ComponentMetadata, field: &FieldMetadata) -> bool {
        field.is_persisted()
    }
}

/// Decides which component types are written and read at all.
pub trait ComponentSerializeCheck: Send + Sync {
    fn should_serialize(&self, component: &ComponentMetadata) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllComponents;

impl ComponentSerializeCheck for AllComponents {
    fn should_serialize(&self, _: &ComponentMetadata) -> bool {
        true
    }
}

/// Skips component types marked do-not-persist.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistedComponents;

impl ComponentSerializeCheck for PersistedComponents {
    fn should_serialize(&self, component: &ComponentMetadata) -> bool {
        component.is_persisted()
    }
}
