//! Handlers for glam vector types.
//!
//! Vectors persist as number arrays. Decoding requires a number array with at
//! least as many elements as the vector has components; anything else is
//! treated as absent so the caller falls back to the field default.

use glam::{IVec2, IVec3, Quat, Vec2, Vec3, Vec4};

use crate::library::{TypeHandler, TypeHandlerLibrary};
use crate::value::PersistedValue;

fn floats(data: &PersistedValue, min_len: usize) -> Option<Vec<f32>> {
    let array = data.as_array()?;
    if array.is_number_array() && array.len() >= min_len {
        array.as_f32_array()
    } else {
        None
    }
}

fn ints(data: &PersistedValue, min_len: usize) -> Option<Vec<i32>> {
    let array = data.as_array()?;
    if array.is_number_array() && array.len() >= min_len {
        array.as_i32_array()
    } else {
        None
    }
}

pub struct Vec2Handler;

impl TypeHandler<Vec2> for Vec2Handler {
    fn serialize(&self, value: &Vec2, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::from_f32s(&value.to_array()))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<Vec2> {
        floats(data, 2).map(|f| Vec2::new(f[0], f[1]))
    }
}

pub struct Vec3Handler;

impl TypeHandler<Vec3> for Vec3Handler {
    fn serialize(&self, value: &Vec3, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::from_f32s(&value.to_array()))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<Vec3> {
        floats(data, 3).map(|f| Vec3::new(f[0], f[1], f[2]))
    }
}

pub struct Vec4Handler;

impl TypeHandler<Vec4> for Vec4Handler {
    fn serialize(&self, value: &Vec4, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::from_f32s(&value.to_array()))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<Vec4> {
        floats(data, 4).map(|f| Vec4::new(f[0], f[1], f[2], f[3]))
    }
}

/// Quaternions persist as `[x, y, z, w]`.
pub struct QuatHandler;

impl TypeHandler<Quat> for QuatHandler {
    fn serialize(&self, value: &Quat, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::from_f32s(&value.to_array()))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<Quat> {
        floats(data, 4).map(|f| Quat::from_xyzw(f[0], f[1], f[2], f[3]))
    }
}

pub struct IVec2Handler;

impl TypeHandler<IVec2> for IVec2Handler {
    fn serialize(&self, value: &IVec2, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::from_i32s(&value.to_array()))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<IVec2> {
        ints(data, 2).map(|i| IVec2::new(i[0], i[1]))
    }
}

pub struct IVec3Handler;

impl TypeHandler<IVec3> for IVec3Handler {
    fn serialize(&self, value: &IVec3, _: &TypeHandlerLibrary) -> Option<PersistedValue> {
        Some(PersistedValue::from_i32s(&value.to_array()))
    }

    fn deserialize(&self, data: &PersistedValue, _: &TypeHandlerLibrary) -> Option<IVec3> {
        ints(data, 3).map(|i| IVec3::new(i[0], i[1], i[2]))
    }
}
