use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compression::DEFAULT_COMPRESSION_LEVEL;
use crate::error::PersistError;

/// Settings for one serialization session.
///
/// Applied explicitly to an [`EntitySerializer`](crate::EntitySerializer);
/// independent sessions can run with different settings side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Omit entity ids when writing and mint fresh ids when reading.
    ///
    /// Component fields referencing entities keep the original ids, so
    /// references between stored entities can break.
    pub ignoring_entity_id: bool,
    /// Write field ids instead of field names.
    pub using_field_ids: bool,
    /// Write compact component ids (library registration order) instead of names.
    pub component_ids: bool,
    /// zstd compression level for chunk and entity stores.
    pub compression_level: i32,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            ignoring_entity_id: false,
            using_field_ids: false,
            component_ids: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl PersistConfig {
    pub fn from_json(text: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}
