//! Persistence of entities and voxel chunks.
//!
//! Components are encoded field by field through the type handler library;
//! entities are encoded in full or as a delta against their parent prefab; a
//! chunk is stored as one zstd-compressed CBOR blob holding its block payload
//! and the entities that live in it.
//!
//! # Invariants
//! - Malformed or unresolvable data is skipped locally and never aborts an
//!   entity or a chunk.
//! - A component id mapping is injective; a conflicting id is a configuration
//!   error.
//! - A chunk builder encodes at most once and releases its snapshot exactly once.

mod builder;
mod checks;
mod component_serializer;
mod compression;
mod config;
mod entity_serializer;
mod error;
mod id_mapping;
mod storer;
mod store;
mod wire;

pub use builder::{ChunkEncoding, CompressedChunkBuilder, decode_chunk_store};
pub use checks::{
    AllComponents, AllFields, ComponentSerializeCheck, FieldSerializeCheck, PersistedComponents,
    PersistedFields,
};
pub use component_serializer::ComponentSerializer;
pub use compression::{
    DEFAULT_COMPRESSION_LEVEL, cbor_deserialize, cbor_serialize, compress, decode_compressed,
    decompress, encode_compressed,
};
pub use config::PersistConfig;
pub use entity_serializer::EntitySerializer;
pub use error::PersistError;
pub use id_mapping::ComponentIdMapping;
pub use store::{IntegrityManifest, ManifestEntry, WorldMeta, WorldStore};
pub use storer::{EntityRestorer, EntityStorer};
pub use wire::{
    ChunkStore, ComponentKey, EncodedComponent, EncodedEntity, EncodedField, EntityStore, FieldKey,
};
