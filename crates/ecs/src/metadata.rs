use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

use worldspace_typehandling::{PersistedValue, TypeHandlerError, TypeHandlerLibrary};

use crate::component::Component;

/// Errors from applying a field accessor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error(transparent)]
    UnknownType(#[from] TypeHandlerError),
    #[error("field `{field}` belongs to {expected}, not to the component it was applied to")]
    WrongComponent {
        field: String,
        expected: &'static str,
    },
}

type SerializeFn =
    Box<dyn Fn(&dyn Component, &TypeHandlerLibrary) -> Result<Option<PersistedValue>, FieldError> + Send + Sync>;
type DeserializeFn =
    Box<dyn Fn(&mut dyn Component, &PersistedValue, &TypeHandlerLibrary) -> Result<bool, FieldError> + Send + Sync>;
type EqualsFn = Box<dyn Fn(&dyn Component, &dyn Component) -> bool + Send + Sync>;

/// Number of distinct field ids a component can declare.
pub const MAX_FIELDS: usize = u8::MAX as usize + 1;

/// One persisted field of a component type, with type-erased accessors.
pub struct FieldMetadata {
    name: String,
    id: u8,
    type_name: &'static str,
    persisted: bool,
    serialize: SerializeFn,
    deserialize: DeserializeFn,
    equals: EqualsFn,
}

impl FieldMetadata {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compact id, unique within the owning component.
    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// `false` for transient fields that should not be written to disk.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Encode this field of `component`. `Ok(None)` means the value is absent.
    pub fn serialize(
        &self,
        component: &dyn Component,
        handlers: &TypeHandlerLibrary,
    ) -> Result<Option<PersistedValue>, FieldError> {
        (self.serialize)(component, handlers)
    }

    /// Decode `data` into this field of `component`.
    ///
    /// Returns `Ok(false)` when the data is malformed; the field keeps its value.
    pub fn deserialize_onto(
        &self,
        component: &mut dyn Component,
        data: &PersistedValue,
        handlers: &TypeHandlerLibrary,
    ) -> Result<bool, FieldError> {
        (self.deserialize)(component, data, handlers)
    }

    /// Field-level equality between two instances of the owning component type.
    pub fn values_equal(&self, a: &dyn Component, b: &dyn Component) -> bool {
        (self.equals)(a, b)
    }
}

impl fmt::Debug for FieldMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMetadata")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("persisted", &self.persisted)
            .finish()
    }
}

/// Capability table describing a component type: identity, layout and construction.
pub struct ComponentMetadata {
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    persisted: bool,
    fields: Vec<FieldMetadata>,
    create: fn() -> Box<dyn Component>,
}

impl ComponentMetadata {
    /// Start describing component type `C` under the stable `name` (e.g. `engine:location`).
    pub fn builder<C>(name: impl Into<String>) -> ComponentMetadataBuilder<C>
    where
        C: Component + Default + Clone,
    {
        ComponentMetadataBuilder {
            name: name.into(),
            persisted: true,
            fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// `false` for component types that are never stored.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn fields(&self) -> &[FieldMetadata] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn field_by_id(&self, id: u8) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// A default-constructed instance.
    pub fn new_instance(&self) -> Box<dyn Component> {
        (self.create)()
    }

    pub fn describes(&self, component: &dyn Component) -> bool {
        component.component_type() == self.type_id
    }
}

impl fmt::Debug for ComponentMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMetadata")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("persisted", &self.persisted)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Builds a [`ComponentMetadata`] for component type `C`.
pub struct ComponentMetadataBuilder<C> {
    name: String,
    persisted: bool,
    fields: Vec<FieldMetadata>,
    _marker: PhantomData<fn() -> C>,
}

impl<C> ComponentMetadataBuilder<C>
where
    C: Component + Default + Clone,
{
    /// Mark the component type as never persisted.
    pub fn do_not_persist(mut self) -> Self {
        self.persisted = false;
        self
    }

    /// Add a persisted field of type `T`.
    pub fn field<T>(self, name: &str, get: fn(&C) -> &T, get_mut: fn(&mut C) -> &mut T) -> Self
    where
        T: PartialEq + 'static,
    {
        self.add_field(name, true, get, get_mut)
    }

    /// Add a field that is skipped by persistence-oriented field checks.
    pub fn transient_field<T>(self, name: &str, get: fn(&C) -> &T, get_mut: fn(&mut C) -> &mut T) -> Self
    where
        T: PartialEq + 'static,
    {
        self.add_field(name, false, get, get_mut)
    }

    fn add_field<T>(
        mut self,
        name: &str,
        persisted: bool,
        get: fn(&C) -> &T,
        get_mut: fn(&mut C) -> &mut T,
    ) -> Self
    where
        T: PartialEq + 'static,
    {
        // Field ids are compact u8 values assigned in declaration order.
        // Metadata past MAX_FIELDS is rejected by the library on registration.
        let id = u8::try_from(self.fields.len()).unwrap_or(u8::MAX);
        let field_name = name.to_string();

        let serialize_name = field_name.clone();
        let serialize: SerializeFn = Box::new(move |component: &dyn Component, handlers: &TypeHandlerLibrary| {
            let c = component
                .as_any()
                .downcast_ref::<C>()
                .ok_or_else(|| wrong_component::<C>(&serialize_name))?;
            Ok(handlers.serialize::<T>(get(c))?)
        });

        let deserialize_name = field_name.clone();
        let deserialize: DeserializeFn = Box::new(
            move |component: &mut dyn Component, data: &PersistedValue, handlers: &TypeHandlerLibrary| {
                let c = component
                    .as_any_mut()
                    .downcast_mut::<C>()
                    .ok_or_else(|| wrong_component::<C>(&deserialize_name))?;
                match handlers.deserialize::<T>(data)? {
                    Some(value) => {
                        *get_mut(c) = value;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            },
        );

        let equals: EqualsFn = Box::new(move |a: &dyn Component, b: &dyn Component| {
            match (
                a.as_any().downcast_ref::<C>(),
                b.as_any().downcast_ref::<C>(),
            ) {
                (Some(a), Some(b)) => get(a) == get(b),
                _ => false,
            }
        });

        self.fields.push(FieldMetadata {
            name: field_name,
            id,
            type_name: std::any::type_name::<T>(),
            persisted,
            serialize,
            deserialize,
            equals,
        });
        self
    }

    pub fn build(self) -> ComponentMetadata {
        ComponentMetadata {
            name: self.name,
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            persisted: self.persisted,
            fields: self.fields,
            create: create_default::<C>,
        }
    }
}

fn create_default<C: Component + Default>() -> Box<dyn Component> {
    Box::new(C::default())
}

fn wrong_component<C: 'static>(field: &str) -> FieldError {
    FieldError::WrongComponent {
        field: field.to_string(),
        expected: std::any::type_name::<C>(),
    }
}
