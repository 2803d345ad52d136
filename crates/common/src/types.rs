use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an entity in the world.
///
/// Id `0` is reserved as the "null" entity and is never minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl EntityId {
    pub const NULL: EntityId = EntityId(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Relevance classification of an entity; decides which store it is persisted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityScope {
    /// Always loaded, stored in the global entity store.
    Global,
    /// Bound to a sector of chunks.
    Sector,
    /// Bound to the chunk it is located in; stored with that chunk.
    Chunk,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_entity_id() {
        assert!(EntityId::NULL.is_null());
        assert!(!EntityId(7).is_null());
    }

    #[test]
    fn entity_id_display() {
        assert_eq!(EntityId(42).to_string(), "entity#42");
    }
}
