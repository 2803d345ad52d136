use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use worldspace_common::EntityId;
use worldspace_ecs::EntityManager;
use worldspace_kernel::{Chunk, ChunkData, ChunkError, ChunkSnapshot};

use crate::compression::{DEFAULT_COMPRESSION_LEVEL, decode_compressed, encode_compressed};
use crate::entity_serializer::EntitySerializer;
use crate::error::PersistError;
use crate::storer::EntityStorer;
use crate::wire::ChunkStore;

/// What the chunk builder needs from a chunk: snapshotting and block encoding.
pub trait ChunkEncoding: Send + Sync {
    /// Handle to a frozen copy of the chunk. Dropping it releases the snapshot.
    type Snapshot: Send;

    fn create_snapshot(&self) -> Self::Snapshot;
    fn encode_and_release_snapshot(&self, snapshot: Self::Snapshot) -> Result<ChunkData, ChunkError>;
    fn encode(&self) -> ChunkData;
}

impl ChunkEncoding for Chunk {
    type Snapshot = ChunkSnapshot;

    fn create_snapshot(&self) -> ChunkSnapshot {
        Chunk::create_snapshot(self)
    }

    fn encode_and_release_snapshot(&self, snapshot: ChunkSnapshot) -> Result<ChunkData, ChunkError> {
        Chunk::encode_and_release_snapshot(self, snapshot)
    }

    fn encode(&self) -> ChunkData {
        Chunk::encode(self)
    }
}

enum BuildState<S> {
    Pending(Option<S>),
    Built {
        blob: Arc<[u8]>,
        stored: BTreeSet<EntityId>,
    },
    Failed(String),
}

/// Produces the compressed blob of one chunk and the entities stored with it.
///
/// In snapshot mode the chunk is snapshotted when the builder is created, so
/// the chunk may keep changing before [`build_encoded_chunk`] runs. The build
/// runs once; every later or concurrent call gets the same bytes.
///
/// [`build_encoded_chunk`]: CompressedChunkBuilder::build_encoded_chunk
pub struct CompressedChunkBuilder<'a, C: ChunkEncoding = Chunk> {
    manager: &'a EntityManager,
    serializer: EntitySerializer,
    chunk: Arc<C>,
    entities: Vec<EntityId>,
    compression_level: i32,
    state: Mutex<BuildState<C::Snapshot>>,
}

impl<'a, C: ChunkEncoding> CompressedChunkBuilder<'a, C> {
    /// `via_snapshot` should be set while the chunk is still live; an unloaded
    /// chunk can be read directly.
    pub fn new(
        manager: &'a EntityManager,
        serializer: EntitySerializer,
        chunk: Arc<C>,
        entities: impl IntoIterator<Item = EntityId>,
        via_snapshot: bool,
    ) -> Self {
        let snapshot = via_snapshot.then(|| chunk.create_snapshot());
        Self {
            manager,
            serializer,
            chunk,
            entities: entities.into_iter().collect(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            state: Mutex::new(BuildState::Pending(snapshot)),
        }
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn chunk(&self) -> &Arc<C> {
        &self.chunk
    }

    /// Encode and compress the chunk with its entities, once.
    pub fn build_encoded_chunk(&self) -> Result<Arc<[u8]>, PersistError> {
        let mut state = self.state.lock();
        let snapshot = match &mut *state {
            BuildState::Built { blob, .. } => return Ok(Arc::clone(blob)),
            BuildState::Failed(reason) => return Err(PersistError::BuildFailed(reason.clone())),
            BuildState::Pending(snapshot) => snapshot.take(),
        };
        match self.build(snapshot) {
            Ok((blob, stored)) => {
                *state = BuildState::Built {
                    blob: Arc::clone(&blob),
                    stored,
                };
                Ok(blob)
            }
            Err(err) => {
                *state = BuildState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    fn build(&self, snapshot: Option<C::Snapshot>) -> Result<(Arc<[u8]>, BTreeSet<EntityId>), PersistError> {
        let span = tracing::debug_span!("build_encoded_chunk", entities = self.entities.len());
        let _guard = span.enter();

        let mut storer = EntityStorer::new(self.manager, self.serializer.clone());
        for &id in &self.entities {
            let persistent = self.manager.get(id).is_some_and(|e| e.is_persistent());
            if persistent {
                storer.store(id)?;
            }
        }
        let (store, stored) = storer.finish();

        let chunk = match snapshot {
            Some(snapshot) => self.chunk.encode_and_release_snapshot(snapshot)?,
            None => self.chunk.encode(),
        };
        let pos = chunk.pos;
        let blob: Arc<[u8]> = encode_compressed(&ChunkStore { chunk, store }, self.compression_level)?.into();
        tracing::debug!(%pos, stored = stored.len(), bytes = blob.len(), "chunk encoded");
        Ok((blob, stored))
    }

    /// Entities written into the blob; empty until a build succeeded.
    pub fn stored_entities(&self) -> BTreeSet<EntityId> {
        match &*self.state.lock() {
            BuildState::Built { stored, .. } => stored.clone(),
            _ => BTreeSet::new(),
        }
    }

    pub fn is_built(&self) -> bool {
        matches!(&*self.state.lock(), BuildState::Built { .. })
    }
}

/// Decompress and decode a chunk blob.
pub fn decode_chunk_store(blob: &[u8]) -> Result<ChunkStore, PersistError> {
    decode_compressed(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use glam::IVec3;
    use worldspace_common::EntityScope;
    use worldspace_ecs::components::{Health, Location, register_engine_components};
    use worldspace_ecs::{ComponentLibrary, ComponentMap, EntityInfo, Prefab, PrefabManager};
    use worldspace_kernel::ChunkPos;
    use worldspace_typehandling::TypeHandlerLibrary;

    use crate::storer::EntityRestorer;

    /// Chunk wrapper counting encode calls and live snapshots.
    struct CountingChunk {
        inner: Chunk,
        encodes: AtomicUsize,
    }

    impl CountingChunk {
        fn new() -> Self {
            Self {
                inner: Chunk::generate(ChunkPos::new(0, 0, 0), 11),
                encodes: AtomicUsize::new(0),
            }
        }
    }

    impl ChunkEncoding for CountingChunk {
        type Snapshot = ChunkSnapshot;

        fn create_snapshot(&self) -> ChunkSnapshot {
            self.inner.create_snapshot()
        }

        fn encode_and_release_snapshot(&self, snapshot: ChunkSnapshot) -> Result<ChunkData, ChunkError> {
            self.encodes.fetch_add(1, Ordering::SeqCst);
            self.inner.encode_and_release_snapshot(snapshot)
        }

        fn encode(&self) -> ChunkData {
            self.encodes.fetch_add(1, Ordering::SeqCst);
            self.inner.encode()
        }
    }

    /// Chunk whose snapshots are taken from a neighbouring chunk, so encoding fails.
    struct MisroutedChunk {
        inner: Chunk,
        neighbour: Chunk,
        encodes: AtomicUsize,
    }

    impl ChunkEncoding for MisroutedChunk {
        type Snapshot = ChunkSnapshot;

        fn create_snapshot(&self) -> ChunkSnapshot {
            self.neighbour.create_snapshot()
        }

        fn encode_and_release_snapshot(&self, snapshot: ChunkSnapshot) -> Result<ChunkData, ChunkError> {
            self.encodes.fetch_add(1, Ordering::SeqCst);
            self.inner.encode_and_release_snapshot(snapshot)
        }

        fn encode(&self) -> ChunkData {
            self.encodes.fetch_add(1, Ordering::SeqCst);
            self.inner.encode()
        }
    }

    fn setup() -> (EntitySerializer, EntityManager) {
        let mut library = ComponentLibrary::new();
        register_engine_components(&mut library).unwrap();
        let mut prefabs = PrefabManager::new();
        prefabs.register(
            Prefab::builder("engine:sheep")
                .with(Health {
                    current: 8,
                    max: 8,
                    regen_rate: 0.5,
                })
                .build(),
        );
        let prefabs = Arc::new(prefabs);
        let serializer = EntitySerializer::new(
            Arc::new(library),
            Arc::clone(&prefabs),
            Arc::new(TypeHandlerLibrary::with_defaults()),
        );
        (serializer, EntityManager::new(prefabs))
    }

    #[test]
    fn build_is_memoized() {
        let (serializer, mut manager) = setup();
        let sheep = manager.create_from_prefab("engine:sheep").unwrap();
        let chunk = Arc::new(CountingChunk::new());

        let builder = CompressedChunkBuilder::new(&manager, serializer, Arc::clone(&chunk), [sheep], true);
        assert_eq!(chunk.inner.active_snapshots(), 1);
        let first = builder.build_encoded_chunk().unwrap();
        let second = builder.build_encoded_chunk().unwrap();
        assert_eq!(first, second);
        assert_eq!(chunk.encodes.load(Ordering::SeqCst), 1);
        assert_eq!(chunk.inner.active_snapshots(), 0);
        assert_eq!(builder.stored_entities(), BTreeSet::from([sheep]));
    }

    #[test]
    fn concurrent_builds_encode_once() {
        let (serializer, mut manager) = setup();
        for _ in 0..16 {
            manager.create_from_prefab("engine:sheep").unwrap();
        }
        let ids: Vec<EntityId> = manager.iter().map(|e| e.id()).collect();
        let chunk = Arc::new(CountingChunk::new());
        let builder = CompressedChunkBuilder::new(&manager, serializer, Arc::clone(&chunk), ids, true);

        let blobs: Vec<Arc<[u8]>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| builder.build_encoded_chunk().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(blobs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(chunk.encodes.load(Ordering::SeqCst), 1);
        assert!(!chunk.inner.is_snapshotted());
        assert_eq!(builder.stored_entities().len(), 16);
    }

    #[test]
    fn snapshot_isolates_later_mutation() {
        let (serializer, manager) = setup();
        let chunk = Arc::new(Chunk::new(ChunkPos::new(1, 0, 1)));
        let at = IVec3::new(3, 3, 3);
        chunk.set_block(at, 5).unwrap();

        let builder = CompressedChunkBuilder::new(&manager, serializer, Arc::clone(&chunk), [], true);
        chunk.set_block(at, 6).unwrap();
        let decoded = decode_chunk_store(&builder.build_encoded_chunk().unwrap()).unwrap();
        assert_eq!(Chunk::from_data(&decoded.chunk).unwrap().get_block(at).unwrap(), 5);
        assert!(!chunk.is_snapshotted());
    }

    #[test]
    fn direct_mode_takes_no_snapshot() {
        let (serializer, manager) = setup();
        let chunk = Arc::new(CountingChunk::new());
        let builder = CompressedChunkBuilder::new(&manager, serializer, Arc::clone(&chunk), [], false);
        assert_eq!(chunk.inner.active_snapshots(), 0);
        builder.build_encoded_chunk().unwrap();
        assert_eq!(chunk.encodes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unbuilt_builder_releases_snapshot_on_drop() {
        let (serializer, manager) = setup();
        let chunk = Arc::new(Chunk::new(ChunkPos::default()));
        let builder = CompressedChunkBuilder::new(&manager, serializer, Arc::clone(&chunk), [], true);
        assert!(chunk.is_snapshotted());
        assert!(builder.stored_entities().is_empty());
        drop(builder);
        assert!(!chunk.is_snapshotted());
    }

    #[test]
    fn failed_build_releases_snapshot_and_is_remembered() {
        let (serializer, mut manager) = setup();
        let sheep = manager.create_from_prefab("engine:sheep").unwrap();
        let chunk = Arc::new(MisroutedChunk {
            inner: Chunk::new(ChunkPos::new(0, 0, 0)),
            neighbour: Chunk::new(ChunkPos::new(1, 0, 0)),
            encodes: AtomicUsize::new(0),
        });
        let builder = CompressedChunkBuilder::new(&manager, serializer, Arc::clone(&chunk), [sheep], true);
        assert_eq!(chunk.neighbour.active_snapshots(), 1);

        let err = builder.build_encoded_chunk().unwrap_err();
        assert!(matches!(err, PersistError::Chunk(ChunkError::ForeignSnapshot { .. })));
        assert_eq!(chunk.neighbour.active_snapshots(), 0);

        let again = builder.build_encoded_chunk().unwrap_err();
        assert!(matches!(again, PersistError::BuildFailed(_)));
        assert_eq!(chunk.encodes.load(Ordering::SeqCst), 1);
        assert!(!builder.is_built());
        assert!(builder.stored_entities().is_empty());

        drop(builder);
        assert_eq!(chunk.neighbour.active_snapshots(), 0);
    }

    #[test]
    fn only_persistent_entities_are_stored() {
        let (serializer, mut manager) = setup();
        let kept = manager.create(ComponentMap::new().with(Location::default()));
        let dropped = manager.create_with_info(
            EntityInfo {
                persistent: false,
                ..EntityInfo::default()
            },
            ComponentMap::new().with(Location::default()),
        );
        let chunk = Arc::new(Chunk::new(ChunkPos::default()));
        let builder =
            CompressedChunkBuilder::new(&manager, serializer, chunk, [kept, dropped, EntityId(999)], true);
        let store = decode_chunk_store(&builder.build_encoded_chunk().unwrap()).unwrap();
        assert_eq!(store.store.entities.len(), 1);
        assert_eq!(builder.stored_entities(), BTreeSet::from([kept]));
    }

    #[test]
    fn blob_restores_chunk_and_entities() {
        let (serializer, mut manager) = setup();
        let sheep = manager.create_from_prefab("engine:sheep").unwrap();
        manager.get_mut(sheep).unwrap().info_mut().scope = Some(EntityScope::Chunk);
        manager.get_mut(sheep).unwrap().components_mut().insert(Location {
            position: glam::Vec3::new(4.0, 20.0, 4.0),
            ..Location::default()
        });
        let chunk = Arc::new(Chunk::generate(ChunkPos::new(0, 0, 0), 3));
        let builder = CompressedChunkBuilder::new(&manager, serializer.clone(), Arc::clone(&chunk), [sheep], true)
            .with_compression_level(9);
        let blob = builder.build_encoded_chunk().unwrap();

        let decoded = decode_chunk_store(&blob).unwrap();
        assert_eq!(decoded.chunk, chunk.encode());
        let mut target = EntityManager::new(Arc::clone(manager.prefabs()));
        let restored = EntityRestorer::new(serializer)
            .restore(&mut target, &decoded.store)
            .unwrap();
        assert_eq!(restored, vec![sheep]);
        let entity = target.get(sheep).unwrap();
        assert_eq!(entity.scope(), Some(EntityScope::Chunk));
        assert_eq!(entity.get::<Health>().unwrap().current, 8);
        assert_eq!(entity.get::<Location>().unwrap().position, glam::Vec3::new(4.0, 20.0, 4.0));
    }
}
