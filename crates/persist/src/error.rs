use worldspace_kernel::ChunkError;

/// Errors from entity and chunk persistence.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("unknown component `{0}`")]
    UnknownComponent(String),
    #[error("component id {id} is already mapped to {existing}, cannot map {rejected}")]
    DuplicateComponentId {
        id: u32,
        existing: &'static str,
        rejected: &'static str,
    },
    #[error("component mismatch: expected {expected}, found {found}")]
    ComponentMismatch { expected: String, found: String },
    #[error("compression error: {0}")]
    Compression(#[source] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("chunk error: {0}")]
    Chunk(#[from] ChunkError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed for {filename}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        filename: String,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("chunk build failed: {0}")]
    BuildFailed(String),
}
