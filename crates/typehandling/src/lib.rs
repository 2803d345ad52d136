//! Type handling: converts typed field values to and from [`PersistedValue`].
//!
//! # Invariants
//! - `deserialize(serialize(v)) == v` for every registered handler.
//! - Decoding malformed data yields `None`, never an error or panic.
//! - Only a missing registration is an error ([`TypeHandlerError::UnknownType`]).

mod collections;
mod library;
mod math;
mod primitives;
mod value;

pub use collections::{ListHandler, OptionHandler};
pub use library::{TypeHandler, TypeHandlerError, TypeHandlerLibrary};
pub use math::{IVec2Handler, IVec3Handler, QuatHandler, Vec2Handler, Vec3Handler, Vec4Handler};
pub use primitives::{
    BoolHandler, BytesHandler, EntityIdHandler, F32Handler, F64Handler, IntegerHandler,
    StringHandler, U64Handler,
};
pub use value::{PersistedArray, PersistedValue};
