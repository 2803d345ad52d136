use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::{IVec3, Vec3};
use tracing_subscriber::EnvFilter;
use worldspace_common::{EntityId, EntityScope};
use worldspace_ecs::components::{
    DisplayName, Health, Inventory, Location, NetworkState, RigidBody, register_engine_components,
};
use worldspace_ecs::{ComponentLibrary, ComponentMap, EntityInfo, EntityManager, Prefab, PrefabManager};
use worldspace_kernel::{AIR, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z, Chunk, ChunkPos, splitmix64};
use worldspace_persist::{
    CompressedChunkBuilder, EntityRestorer, EntitySerializer, EntityStorer, PersistConfig, WorldStore,
};
use worldspace_typehandling::TypeHandlerLibrary;

#[derive(Parser)]
#[command(name = "worldspace-cli", about = "CLI tool for worldspace persistence")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Generate a chunk with entities and write it into a world store
    Build {
        /// World store directory
        #[arg(short, long, default_value = "world_data")]
        store: PathBuf,
        /// Number of entities to place in the chunk
        #[arg(short, long, default_value = "16")]
        entities: usize,
        /// Terrain seed
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Chunk x coordinate
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        chunk_x: i32,
        /// Chunk y coordinate
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        chunk_y: i32,
        /// Chunk z coordinate
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        chunk_z: i32,
        /// Persistence settings (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Verify a world store and list the chunks and entities it holds
    Inspect {
        /// World store directory
        #[arg(short, long, default_value = "world_data")]
        store: PathBuf,
        /// Persistence settings (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Registries shared by every persistence session.
struct Engine {
    library: Arc<ComponentLibrary>,
    prefabs: Arc<PrefabManager>,
    handlers: Arc<TypeHandlerLibrary>,
}

impl Engine {
    fn new() -> anyhow::Result<Self> {
        let mut library = ComponentLibrary::new();
        register_engine_components(&mut library)?;

        let mut prefabs = PrefabManager::new();
        prefabs.register(
            Prefab::builder("engine:sheep")
                .with(DisplayName {
                    name: "Sheep".into(),
                    description: "Grazes.".into(),
                })
                .with(Health {
                    current: 8,
                    max: 8,
                    regen_rate: 0.25,
                })
                .with(Location::default())
                .with(RigidBody::default())
                .build(),
        );
        prefabs.register(
            Prefab::builder("engine:chest")
                .with(DisplayName {
                    name: "Chest".into(),
                    description: String::new(),
                })
                .with(Inventory::default())
                .with(Location::default())
                .build(),
        );

        Ok(Self {
            library: Arc::new(library),
            prefabs: Arc::new(prefabs),
            handlers: Arc::new(TypeHandlerLibrary::with_defaults()),
        })
    }

    fn serializer(&self, config: &PersistConfig) -> EntitySerializer {
        let mut serializer = EntitySerializer::new(
            Arc::clone(&self.library),
            Arc::clone(&self.prefabs),
            Arc::clone(&self.handlers),
        );
        serializer.configure(config);
        serializer
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PersistConfig> {
    match path {
        Some(path) => PersistConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(PersistConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            let engine = Engine::new()?;
            println!("worldspace-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("chunk: {CHUNK_SIZE_X}x{CHUNK_SIZE_Y}x{CHUNK_SIZE_Z} blocks");
            println!("components: {}", engine.library.len());
            for metadata in engine.library.iter() {
                let persisted = if metadata.is_persisted() { "" } else { " (not persisted)" };
                println!("  {} [{} fields]{persisted}", metadata.name(), metadata.fields().len());
            }
            println!("prefabs: {}", engine.prefabs.len());
            println!("type handlers: {}", engine.handlers.len());
        }
        Commands::Build {
            store,
            entities,
            seed,
            chunk_x,
            chunk_y,
            chunk_z,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let pos = ChunkPos::new(chunk_x, chunk_y, chunk_z);
            build(&store, pos, entities, seed, &config)?;
        }
        Commands::Inspect { store, config } => {
            let config = load_config(config.as_deref())?;
            inspect(&store, &config)?;
        }
    }

    Ok(())
}

fn build(path: &Path, pos: ChunkPos, entity_count: usize, seed: u64, config: &PersistConfig) -> anyhow::Result<()> {
    let engine = Engine::new()?;
    let chunk = Arc::new(Chunk::generate(pos, seed));
    let mut manager = EntityManager::new(Arc::clone(&engine.prefabs));
    let origin = pos.origin();

    let mut in_chunk = Vec::with_capacity(entity_count + 2);
    let mut state = seed;
    for _ in 0..entity_count {
        state = splitmix64(state);
        let local = IVec3::new(
            (state % CHUNK_SIZE_X as u64) as i32,
            0,
            ((state >> 16) % CHUNK_SIZE_Z as u64) as i32,
        );
        let id = manager
            .create_from_prefab("engine:sheep")
            .context("sheep prefab is not registered")?;
        let entity = manager.get_mut(id).context("created entity vanished")?;
        entity.info_mut().scope = Some(EntityScope::Chunk);
        if let Some(location) = entity.components_mut().get_mut::<Location>() {
            location.position = (origin + local).as_vec3() + Vec3::new(0.5, 32.0, 0.5);
        }
        if state % 3 == 0 {
            if let Some(health) = entity.components_mut().get_mut::<Health>() {
                health.current -= (state % 5) as i32;
            }
        }
        in_chunk.push(id);
    }

    let chest = manager
        .create_from_prefab("engine:chest")
        .context("chest prefab is not registered")?;
    let gem = manager.create_with_info(
        EntityInfo {
            owner: Some(chest),
            ..EntityInfo::default()
        },
        ComponentMap::new().with(DisplayName {
            name: "Gem".into(),
            description: "Shiny.".into(),
        }),
    );
    if let Some(entity) = manager.get_mut(chest) {
        entity.info_mut().scope = Some(EntityScope::Chunk);
        if let Some(inventory) = entity.components_mut().get_mut::<Inventory>() {
            inventory.slots.push(gem);
        }
    }
    in_chunk.push(chest);

    let replicated = manager.create_with_info(
        EntityInfo {
            persistent: false,
            ..EntityInfo::default()
        },
        ComponentMap::new().with(NetworkState { network_id: 7 }),
    );
    in_chunk.push(replicated);

    let player = manager.create_with_info(
        EntityInfo {
            scope: Some(EntityScope::Global),
            always_relevant: true,
            ..EntityInfo::default()
        },
        ComponentMap::new()
            .with(DisplayName {
                name: "Player".into(),
                description: String::new(),
            })
            .with(Location {
                position: origin.as_vec3() + Vec3::new(16.0, 40.0, 16.0),
                ..Location::default()
            })
            .with(Health::default()),
    );

    let serializer = engine.serializer(config);
    let builder = CompressedChunkBuilder::new(&manager, serializer.clone(), Arc::clone(&chunk), in_chunk, true)
        .with_compression_level(config.compression_level);
    let blob = builder.build_encoded_chunk()?;
    let stored = builder.stored_entities();

    let mut store = WorldStore::open(path).with_context(|| format!("opening {}", path.display()))?;
    store.set_compression_level(config.compression_level);
    store.save_chunk(pos, &blob)?;

    let mut storer = EntityStorer::new(&manager, serializer);
    storer.store(player)?;
    let (global, _) = storer.finish();
    store.save_global_store(&global)?;
    tracing::info!(%pos, bytes = blob.len(), stored = stored.len(), "chunk saved");

    println!("Chunk {pos}: {} bytes, {} entities stored", blob.len(), stored.len());
    println!("Global store: {} entities", global.entities.len());
    println!("Written to {}", store.root().display());
    Ok(())
}

fn inspect(path: &Path, config: &PersistConfig) -> anyhow::Result<()> {
    let store = WorldStore::open(path).with_context(|| format!("opening {}", path.display()))?;
    store.verify_integrity()?;
    println!("World store {}: integrity OK", store.root().display());

    let engine = Engine::new()?;
    let restorer = EntityRestorer::new(engine.serializer(config));
    let mut manager = EntityManager::new(Arc::clone(&engine.prefabs));

    for &pos in store.stored_chunks() {
        let chunk_store = store
            .load_chunk(pos)?
            .with_context(|| format!("chunk {pos} is listed but missing"))?;
        let chunk = Chunk::from_data(&chunk_store.chunk)?;
        let solid: u64 = chunk_store
            .chunk
            .runs
            .iter()
            .filter(|run| run.block != AIR)
            .map(|run| u64::from(run.length))
            .sum();
        println!(
            "chunk {}: {} runs, {solid} solid blocks, {} entities",
            chunk.pos(),
            chunk_store.chunk.runs.len(),
            chunk_store.store.entities.len()
        );
        for id in restorer.restore(&mut manager, &chunk_store.store)? {
            print_entity(&engine, &manager, id);
        }
    }

    if let Some(global) = store.load_global_store()? {
        println!("global: {} entities", global.entities.len());
        for id in restorer.restore(&mut manager, &global)? {
            print_entity(&engine, &manager, id);
        }
    }
    Ok(())
}

fn print_entity(engine: &Engine, manager: &EntityManager, id: EntityId) {
    let Some(entity) = manager.get(id) else {
        return;
    };
    let name = entity.get::<DisplayName>().map_or("-", |d| d.name.as_str());
    let components: Vec<&str> = entity
        .iter_components()
        .filter_map(|c| engine.library.metadata_of(c).map(|m| m.name()))
        .collect();
    let prefab = entity.parent_prefab().unwrap_or("-");
    let owner = manager
        .owner_of(id)
        .map_or_else(|| "-".to_string(), |owner| owner.to_string());
    println!(
        "  {id} {name} prefab={prefab} owner={owner} [{}]",
        components.join(", ")
    );
}
