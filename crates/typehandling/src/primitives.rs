use std::marker::PhantomData;

use worldspace_common::EntityId;

use crate::library::{TypeHandler, TypeHandlerLibrary};
use crate::value::PersistedValue;

pub struct BoolHandler;

impl TypeHandler<bool> for BoolHandler {
    fn serialize(&self, value: &bool, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::Bool(*value))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<bool> {
        data.as_bool()
    }
}

/// Handler for integer types that fit losslessly in an `i64`.
pub struct IntegerHandler<T>(PhantomData<fn() -> T>);

impl<T> IntegerHandler<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for IntegerHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypeHandler<T> for IntegerHandler<T>
where
    T: Copy + Into<i64> + TryFrom<i64>,
{
    fn serialize(&self, value: &T, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::Integer((*value).into()))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<T> {
        data.as_i64().and_then(|i| T::try_from(i).ok())
    }
}

/// `u64` is stored by bit pattern so the full range survives.
pub struct U64Handler;

impl TypeHandler<u64> for U64Handler {
    fn serialize(&self, value: &u64, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::Integer(*value as i64))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<u64> {
        data.as_i64().map(|i| i as u64)
    }
}

pub struct F32Handler;

impl TypeHandler<f32> for F32Handler {
    fn serialize(&self, value: &f32, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::Float(f64::from(*value)))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<f32> {
        data.as_f64().map(|f| f as f32)
    }
}

pub struct F64Handler;

impl TypeHandler<f64> for F64Handler {
    fn serialize(&self, value: &f64, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::Float(*value))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<f64> {
        data.as_f64()
    }
}

pub struct StringHandler;

impl TypeHandler<String> for StringHandler {
    fn serialize(&self, value: &String, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::String(value.clone()))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<String> {
        data.as_str().map(str::to_owned)
    }
}

pub struct BytesHandler;

impl TypeHandler<Vec<u8>> for BytesHandler {
    fn serialize(&self, value: &Vec<u8>, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::Bytes(value.clone()))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<Vec<u8>> {
        data.as_bytes().map(<[u8]>::to_vec)
    }
}

/// Entity references are stored by raw id, the null entity as `0`.
///
/// Note that ids are only stable while entity ids are being preserved by the
/// entity serializer; with ids ignored, restored references may dangle.
pub struct EntityIdHandler;

impl TypeHandler<EntityId> for EntityIdHandler {
    fn serialize(&self, value: &EntityId, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::Integer(value.0 as i64))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<EntityId> {
        data.as_i64().map(|i| EntityId(i as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T, H>(handler: &H, value: T) -> Option<T>
    where
        H: TypeHandler<T>,
    {
        let library = TypeHandlerLibrary::new();
        let data = handler.serialize(&value, &library)?;
        handler.deserialize(&data, &library)
    }

    #[test]
    fn integers_round_trip_at_bounds() {
        let h = IntegerHandler::<i32>::new();
        for v in [0, 1, -1, i32::MIN, i32::MAX] {
            assert_eq!(round_trip(&h, v), Some(v));
        }
        let h = IntegerHandler::<u32>::new();
        assert_eq!(round_trip(&h, u32::MAX), Some(u32::MAX));
        assert_eq!(round_trip(&U64Handler, u64::MAX), Some(u64::MAX));
    }

    #[test]
    fn integer_out_of_range_is_absent() {
        let library = TypeHandlerLibrary::new();
        let h = IntegerHandler::<u8>::new();
        assert_eq!(h.deserialize(&PersistedValue::Integer(300), &library), None);
        assert_eq!(h.deserialize(&PersistedValue::Integer(-1), &library), None);
    }

    #[test]
    fn floats_round_trip() {
        for v in [0.0f32, -0.5, f32::MAX, f32::MIN_POSITIVE] {
            assert_eq!(round_trip(&F32Handler, v), Some(v));
        }
        assert_eq!(round_trip(&F64Handler, f64::MAX), Some(f64::MAX));
    }

    #[test]
    fn float_accepts_integer_data() {
        let library = TypeHandlerLibrary::new();
        assert_eq!(F32Handler.deserialize(&PersistedValue::Integer(2), &library), Some(2.0));
    }

    #[test]
    fn wrong_kind_is_absent() {
        let library = TypeHandlerLibrary::new();
        assert_eq!(BoolHandler.deserialize(&PersistedValue::Integer(1), &library), None);
        assert_eq!(StringHandler.deserialize(&PersistedValue::Bool(true), &library), None);
    }

    #[test]
    fn strings_and_bytes_round_trip() {
        assert_eq!(round_trip(&StringHandler, "engine:stone".to_string()), Some("engine:stone".to_string()));
        assert_eq!(round_trip(&StringHandler, String::new()), Some(String::new()));
        assert_eq!(round_trip(&BytesHandler, vec![0u8, 255, 7]), Some(vec![0u8, 255, 7]));
    }

    #[test]
    fn entity_ids_round_trip_including_null() {
        let library = TypeHandlerLibrary::new();
        assert_eq!(
            EntityIdHandler.serialize(&EntityId::NULL, &library),
            Some(PersistedValue::Integer(0))
        );
        assert_eq!(round_trip(&EntityIdHandler, EntityId::NULL), Some(EntityId::NULL));
        assert_eq!(round_trip(&EntityIdHandler, EntityId(u64::MAX)), Some(EntityId(u64::MAX)));
    }
}
