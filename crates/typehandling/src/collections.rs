use std::marker::PhantomData;

use crate::library::{TypeHandler, TypeHandlerLibrary};
use crate::value::PersistedValue;

/// Handler for `Vec<T>`; elements are encoded by the library's handler for `T`.
///
/// Elements that encode as absent, or fail to decode, are dropped.
pub struct ListHandler<T>(PhantomData<fn() -> T>);

impl<T> ListHandler<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for ListHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> TypeHandler<Vec<T>> for ListHandler<T> {
    fn serialize(&self, value: &Vec<T>, library: &TypeHandlerLibrary) -> Option<PersistedValue> {
        let element = match library.handler::<T>() {
            Ok(h) => h,
            Err(err) => {
                tracing::warn!(%err, "cannot serialize list elements");
                return None;
            }
        };
        Some(PersistedValue::Array(
            value
                .iter()
                .filter_map(|item| element.serialize(item, library))
                .collect(),
        ))
    }

    fn deserialize(&self, data: &PersistedValue, library: &TypeHandlerLibrary) -> Option<Vec<T>> {
        let array = data.as_array()?;
        let element = match library.handler::<T>() {
            Ok(h) => h,
            Err(err) => {
                tracing::warn!(%err, "cannot deserialize list elements");
                return None;
            }
        };
        Some(
            array
                .iter()
                .filter_map(|item| element.deserialize(item, library))
                .collect(),
        )
    }
}

/// Handler for `Option<T>`: `None` is persisted as absent.
pub struct OptionHandler<T>(PhantomData<fn() -> T>);

impl<T> OptionHandler<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for OptionHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> TypeHandler<Option<T>> for OptionHandler<T> {
    fn serialize(&self, value: &Option<T>, library: &TypeHandlerLibrary) -> Option<PersistedValue> {
        let inner = value.as_ref()?;
        library.handler::<T>().ok()?.serialize(inner, library)
    }

    fn deserialize(&self, data: &PersistedValue, library: &TypeHandlerLibrary) -> Option<Option<T>> {
        library
            .handler::<T>()
            .ok()?
            .deserialize(data, library)
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use worldspace_common::EntityId;

    #[test]
    fn numeric_list_is_number_array() {
        let library = TypeHandlerLibrary::with_defaults();
        let data = library.serialize(&vec![1i32, 2, 3]).unwrap().unwrap();
        assert!(data.as_array().unwrap().is_number_array());
        assert_eq!(library.deserialize::<Vec<i32>>(&data).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn nested_vectors_round_trip() {
        let library = TypeHandlerLibrary::with_defaults();
        let path = vec![Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0), Vec3::splat(f32::MAX)];
        let data = library.serialize(&path).unwrap().unwrap();
        assert!(!data.as_array().unwrap().is_number_array());
        assert_eq!(library.deserialize::<Vec<Vec3>>(&data).unwrap(), Some(path));
    }

    #[test]
    fn empty_list_round_trips() {
        let library = TypeHandlerLibrary::with_defaults();
        let data = library.serialize(&Vec::<String>::new()).unwrap().unwrap();
        assert_eq!(library.deserialize::<Vec<String>>(&data).unwrap(), Some(vec![]));
    }

    #[test]
    fn malformed_elements_are_dropped() {
        let library = TypeHandlerLibrary::with_defaults();
        let data = PersistedValue::Array(
            vec![
                PersistedValue::String("a".into()),
                PersistedValue::Integer(3),
                PersistedValue::String("b".into()),
            ]
            .into(),
        );
        assert_eq!(
            library.deserialize::<Vec<String>>(&data).unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn option_none_is_absent() {
        let library = TypeHandlerLibrary::with_defaults();
        assert_eq!(library.serialize(&None::<EntityId>).unwrap(), None);
        let data = library.serialize(&Some(EntityId(9))).unwrap().unwrap();
        assert_eq!(library.deserialize::<Option<EntityId>>(&data).unwrap(), Some(Some(EntityId(9))));
    }

    #[test]
    fn null_entity_keeps_its_slot() {
        let library = TypeHandlerLibrary::with_defaults();
        let slots = vec![EntityId(5), EntityId::NULL, EntityId(7)];
        let data = library.serialize(&slots).unwrap().unwrap();
        assert_eq!(library.deserialize::<Vec<EntityId>>(&data).unwrap(), Some(slots));

        let data = library.serialize(&Some(EntityId::NULL)).unwrap().unwrap();
        assert_eq!(
            library.deserialize::<Option<EntityId>>(&data).unwrap(),
            Some(Some(EntityId::NULL))
        );
    }

    #[test]
    fn list_without_element_handler_is_absent() {
        struct Opaque;
        let mut library = TypeHandlerLibrary::new();
        library.register_list::<Opaque>();
        assert_eq!(library.serialize(&vec![Opaque]).unwrap(), None);
    }
}
