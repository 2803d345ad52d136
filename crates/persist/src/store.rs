//! File-backed world persistence.
//!
//! Layout inside the store directory:
//! ```text
//! world.meta.json                  - metadata and schema versions
//! chunks/
//!   <x>.<y>.<z>.chunk.cbor.zst     - compressed chunk stores
//! entities/
//!   global.store.cbor.zst          - compressed store of global entities
//! integrity/
//!   manifest.json                  - sha256 of every written file
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use worldspace_kernel::ChunkPos;

use crate::builder::decode_chunk_store;
use crate::compression::{DEFAULT_COMPRESSION_LEVEL, decode_compressed, encode_compressed, sha256_hex};
use crate::error::PersistError;
use crate::wire::{ChunkStore, EntityStore};

const WORLD_SCHEMA_VERSION: u32 = 1;
const ENTITY_SCHEMA_VERSION: u32 = 1;

const META_FILE: &str = "world.meta.json";
const MANIFEST_FILE: &str = "manifest.json";
const GLOBAL_STORE_FILE: &str = "global.store.cbor.zst";

/// Contents of `world.meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldMeta {
    pub world_schema_version: u32,
    pub entity_schema_version: u32,
    /// Sorted positions of every saved chunk.
    pub chunks: Vec<ChunkPos>,
    pub has_global_store: bool,
}

impl WorldMeta {
    fn empty() -> Self {
        Self {
            world_schema_version: WORLD_SCHEMA_VERSION,
            entity_schema_version: ENTITY_SCHEMA_VERSION,
            chunks: Vec::new(),
            has_global_store: false,
        }
    }

    fn check_schema(&self) -> Result<(), PersistError> {
        for (file_version, expected_version) in [
            (self.world_schema_version, WORLD_SCHEMA_VERSION),
            (self.entity_schema_version, ENTITY_SCHEMA_VERSION),
        ] {
            if file_version != expected_version {
                return Err(PersistError::SchemaMismatch {
                    file_version,
                    expected_version,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub sha256: String,
}

/// Integrity manifest with the hash of every stored file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

impl IntegrityManifest {
    fn record(&mut self, filename: String, sha256: String) {
        match self.entries.iter_mut().find(|e| e.filename == filename) {
            Some(entry) => entry.sha256 = sha256,
            None => self.entries.push(ManifestEntry { filename, sha256 }),
        }
    }

    fn hash_of(&self, filename: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.filename == filename)
            .map(|e| e.sha256.as_str())
    }
}

/// File-backed store of chunk blobs and the global entity store, with schema
/// versioning and integrity checking. Every read is verified against the
/// manifest and fails closed.
pub struct WorldStore {
    root: PathBuf,
    meta: WorldMeta,
    manifest: IntegrityManifest,
    compression_level: i32,
}

impl WorldStore {
    /// Open or create a world store at the given path. An existing store
    /// written with another schema version is rejected.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let root = path.as_ref().to_path_buf();
        for dir in ["chunks", "entities", "integrity"] {
            std::fs::create_dir_all(root.join(dir))?;
        }

        let mut store = Self {
            root,
            meta: WorldMeta::empty(),
            manifest: IntegrityManifest::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        };
        if store.meta_path().exists() {
            store.meta = read_json(&store.meta_path())?;
            store.meta.check_schema()?;
            if store.manifest_path().exists() {
                store.manifest = read_json(&store.manifest_path())?;
            }
        } else {
            store.save_meta()?;
            store.save_manifest()?;
        }
        Ok(store)
    }

    /// Compression level used for the global entity store.
    pub fn set_compression_level(&mut self, level: i32) {
        self.compression_level = level;
    }

    /// Write a chunk blob as produced by the chunk builder.
    pub fn save_chunk(&mut self, pos: ChunkPos, blob: &[u8]) -> Result<(), PersistError> {
        let filename = chunk_filename(pos);
        let path = self.root.join("chunks").join(&filename);
        self.write_file(&path, filename, blob)?;
        if !self.meta.chunks.contains(&pos) {
            self.meta.chunks.push(pos);
            self.meta.chunks.sort_unstable();
        }
        self.save_meta()
    }

    /// Verified raw blob of a stored chunk.
    pub fn load_chunk_blob(&self, pos: ChunkPos) -> Result<Option<Vec<u8>>, PersistError> {
        if !self.meta.chunks.contains(&pos) {
            return Ok(None);
        }
        let filename = chunk_filename(pos);
        let data = self.read_verified(&self.root.join("chunks").join(&filename), &filename)?;
        Ok(Some(data))
    }

    pub fn load_chunk(&self, pos: ChunkPos) -> Result<Option<ChunkStore>, PersistError> {
        self.load_chunk_blob(pos)?
            .map(|blob| decode_chunk_store(&blob))
            .transpose()
    }

    pub fn has_chunk(&self, pos: ChunkPos) -> bool {
        self.meta.chunks.contains(&pos)
    }

    pub fn stored_chunks(&self) -> &[ChunkPos] {
        &self.meta.chunks
    }

    /// Write the store of global entities, replacing the previous one.
    pub fn save_global_store(&mut self, store: &EntityStore) -> Result<(), PersistError> {
        let blob = encode_compressed(store, self.compression_level)?;
        let path = self.root.join("entities").join(GLOBAL_STORE_FILE);
        self.write_file(&path, GLOBAL_STORE_FILE.to_string(), &blob)?;
        self.meta.has_global_store = true;
        self.save_meta()
    }

    pub fn load_global_store(&self) -> Result<Option<EntityStore>, PersistError> {
        if !self.meta.has_global_store {
            return Ok(None);
        }
        let path = self.root.join("entities").join(GLOBAL_STORE_FILE);
        let data = self.read_verified(&path, GLOBAL_STORE_FILE)?;
        Ok(Some(decode_compressed(&data)?))
    }

    /// Verify every file listed in the manifest.
    pub fn verify_integrity(&self) -> Result<(), PersistError> {
        for entry in &self.manifest.entries {
            let path = self.file_path(&entry.filename);
            let actual = sha256_hex(&std::fs::read(&path)?);
            if actual != entry.sha256 {
                return Err(PersistError::IntegrityMismatch {
                    filename: entry.filename.clone(),
                    expected: entry.sha256.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &WorldMeta {
        &self.meta
    }

    fn file_path(&self, filename: &str) -> PathBuf {
        if filename == GLOBAL_STORE_FILE {
            self.root.join("entities").join(filename)
        } else {
            self.root.join("chunks").join(filename)
        }
    }

    fn write_file(&mut self, path: &Path, filename: String, data: &[u8]) -> Result<(), PersistError> {
        std::fs::write(path, data)?;
        self.manifest.record(filename, sha256_hex(data));
        self.save_manifest()
    }

    fn read_verified(&self, path: &Path, filename: &str) -> Result<Vec<u8>, PersistError> {
        let data = std::fs::read(path)?;
        let actual = sha256_hex(&data);
        match self.manifest.hash_of(filename) {
            Some(expected) if expected == actual => Ok(data),
            expected => Err(PersistError::IntegrityMismatch {
                filename: filename.to_string(),
                expected: expected.unwrap_or("<no manifest entry>").to_string(),
                actual,
            }),
        }
    }

    fn meta_path(&self) -> PathBuf {
        self.root.join(META_FILE)
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join("integrity").join(MANIFEST_FILE)
    }

    fn save_meta(&self) -> Result<(), PersistError> {
        write_json(&self.meta_path(), &self.meta)
    }

    fn save_manifest(&self) -> Result<(), PersistError> {
        write_json(&self.manifest_path(), &self.manifest)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn chunk_filename(pos: ChunkPos) -> String {
    format!("{pos}.chunk.cbor.zst")
}
