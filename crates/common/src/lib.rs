//! Shared identifiers used across the worldspace crates.

mod types;

pub use types::{EntityId, EntityScope};
