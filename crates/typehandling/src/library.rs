use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use glam::{IVec2, IVec3, Quat, Vec2, Vec3, Vec4};
use worldspace_common::EntityId;

use crate::collections::{ListHandler, OptionHandler};
use crate::math::{IVec2Handler, IVec3Handler, QuatHandler, Vec2Handler, Vec3Handler, Vec4Handler};
use crate::primitives::{
    BoolHandler, BytesHandler, EntityIdHandler, F32Handler, F64Handler, IntegerHandler,
    StringHandler, U64Handler,
};
use crate::value::PersistedValue;

/// Bidirectional mapping between a semantic type `T` and [`PersistedValue`].
///
/// `serialize` returning `None` means "absent": the field is omitted and the
/// reader keeps its default. `deserialize` returns `None` for malformed data.
/// The library is passed in so compound handlers can delegate to the
/// handlers of their element types.
pub trait TypeHandler<T>: Send + Sync {
    fn serialize(&self, value: &T, library: &TypeHandlerLibrary) -> Option<PersistedValue>;
    fn deserialize(&self, data: &PersistedValue, library: &TypeHandlerLibrary) -> Option<T>;
}

/// Errors from type handler lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeHandlerError {
    #[error("no type handler registered for {type_name}")]
    UnknownType { type_name: &'static str },
}

struct Registration {
    type_name: &'static str,
    /// Holds a `Box<dyn TypeHandler<T>>` for the registered `T`.
    handler: Box<dyn Any + Send + Sync>,
}

/// Registry of type handlers keyed by the Rust type they handle.
#[derive(Default)]
pub struct TypeHandlerLibrary {
    handlers: HashMap<TypeId, Registration>,
}

impl TypeHandlerLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a library with handlers for primitives, strings, entity ids,
    /// glam vectors and the common collections of those.
    pub fn with_defaults() -> Self {
        let mut library = Self::new();
        library
            .register::<bool, _>(BoolHandler)
            .register::<i32, _>(IntegerHandler::<i32>::new())
            .register::<i64, _>(IntegerHandler::<i64>::new())
            .register::<u8, _>(IntegerHandler::<u8>::new())
            .register::<u32, _>(IntegerHandler::<u32>::new())
            .register::<u64, _>(U64Handler)
            .register::<f32, _>(F32Handler)
            .register::<f64, _>(F64Handler)
            .register::<String, _>(StringHandler)
            .register::<Vec<u8>, _>(BytesHandler)
            .register::<EntityId, _>(EntityIdHandler)
            .register::<Vec2, _>(Vec2Handler)
            .register::<Vec3, _>(Vec3Handler)
            .register::<Vec4, _>(Vec4Handler)
            .register::<IVec2, _>(IVec2Handler)
            .register::<IVec3, _>(IVec3Handler)
            .register::<Quat, _>(QuatHandler);

        library
            .register_option::<EntityId>()
            .register_option::<String>()
            .register_option::<Vec3>()
            .register_list::<i32>()
            .register_list::<f32>()
            .register_list::<String>()
            .register_list::<EntityId>()
            .register_list::<Vec3>()
            .register_list::<IVec3>();
        library
    }

    /// Register (or replace) the handler for `T`.
    pub fn register<T, H>(&mut self, handler: H) -> &mut Self
    where
        T: 'static,
        H: TypeHandler<T> + 'static,
    {
        let boxed: Box<dyn TypeHandler<T>> = Box::new(handler);
        let type_name = std::any::type_name::<T>();
        if self
            .handlers
            .insert(
                TypeId::of::<T>(),
                Registration {
                    type_name,
                    handler: Box::new(boxed),
                },
            )
            .is_some()
        {
            tracing::debug!(type_name, "replaced type handler");
        }
        self
    }

    /// Register a handler for `Vec<T>` delegating to the handler for `T`.
    pub fn register_list<T>(&mut self) -> &mut Self
    where
        T: 'static,
    {
        self.register::<Vec<T>, _>(ListHandler::<T>::new())
    }

    /// Register a handler for `Option<T>` delegating to the handler for `T`.
    pub fn register_option<T>(&mut self) -> &mut Self
    where
        T: 'static,
    {
        self.register::<Option<T>, _>(OptionHandler::<T>::new())
    }

    /// Look up the handler for `T`.
    pub fn handler<T: 'static>(&self) -> Result<&dyn TypeHandler<T>, TypeHandlerError> {
        self.handlers
            .get(&TypeId::of::<T>())
            .and_then(|reg| reg.handler.downcast_ref::<Box<dyn TypeHandler<T>>>())
            .map(|h| &**h)
            .ok_or(TypeHandlerError::UnknownType {
                type_name: std::any::type_name::<T>(),
            })
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Encode `value` with the registered handler for `T`.
    pub fn serialize<T: 'static>(&self, value: &T) -> Result<Option<PersistedValue>, TypeHandlerError> {
        Ok(self.handler::<T>()?.serialize(value, self))
    }

    /// Decode a `T` with the registered handler; `Ok(None)` for malformed data.
    pub fn deserialize<T: 'static>(&self, data: &PersistedValue) -> Result<Option<T>, TypeHandlerError> {
        Ok(self.handler::<T>()?.deserialize(data, self))
    }
}

impl fmt::Debug for TypeHandlerLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.values().map(|r| r.type_name).collect();
        names.sort_unstable();
        f.debug_struct("TypeHandlerLibrary")
            .field("types", &names)
            .finish()
    }
}
