//! # World Round Trip
//!
//! Places one voxel, saves the world, opens it again from a fresh session
//! and checks the voxel came back.
//!
//! ```text
//! 1. Open a world, stream the chunks around (1, 2, 3)
//! 2. Set block (0, 0, 0) of chunk (1, 2, 3)
//! 3. Save
//! 4. Open a fresh storage manager on the same root
//! 5. load_chunk_store((1, 2, 3)): block and state must match
//! ```
//!
//! Usage: `world_roundtrip [config.toml]`

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use strata::persist::TypeHandlerRegistry;
use strata::storage::{InMemoryWorldState, StorageManager};
use strata::world::{Block, ChunkCoord, ChunkObserver, ChunkState, FlatChunkProducer, ObserverId};
use strata::{WorldConfig, WorldDescriptor, WorldSession};

const TARGET: ChunkCoord = ChunkCoord::new(1, 2, 3);
const VOXEL: Block = Block(42);

struct Quiet;

impl ChunkObserver for Quiet {
    fn on_chunk_ready(&self, _: ObserverId, _: ChunkCoord) {}
    fn on_chunk_unloaded(&self, _: ObserverId, _: ChunkCoord) {}
}

fn load_config() -> Result<WorldConfig, String> {
    if let Some(path) = std::env::args().nth(1) {
        return WorldConfig::from_toml_file(&path).map_err(|e| e.to_string());
    }
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let mut config = WorldConfig::default();
    config.storage.root = std::env::temp_dir().join(format!("strata_roundtrip_{id}"));
    config.storage.world_name = "roundtrip".into();
    config.seed = 42;
    Ok(config)
}

fn run(config: WorldConfig) -> Result<(), String> {
    let start = Instant::now();

    // Session one: write.
    let session = WorldSession::open(
        config.clone(),
        Arc::new(FlatChunkProducer::default()),
        Arc::new(InMemoryWorldState::new()),
    )
    .map_err(|e| e.to_string())?;
    session.streamer().add_region(ObserverId(1), TARGET, 0, Arc::new(Quiet));
    session.streamer().flush_generation_queue();

    let chunk = session
        .streamer()
        .get_chunk(TARGET)
        .ok_or_else(|| format!("chunk {TARGET} never became ready"))?;
    chunk
        .lock()
        .ok_or_else(|| format!("chunk {TARGET} was evicted"))?
        .set_block(0, 0, 0, VOXEL);
    println!("Set block (0, 0, 0) of chunk {TARGET} to {}", VOXEL.id());

    let report = session.shutdown();
    println!(
        "Saved: {} chunks, {} players, global: {}, failures: {}",
        report.chunks_written,
        report.players_written,
        report.global_written,
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  ✗ {failure}");
    }

    // Session two: read back with nothing shared.
    let storage = StorageManager::open(config.storage.clone(), config.seed, Arc::new(TypeHandlerRegistry::new()))
        .map_err(|e| e.to_string())?;
    let store = storage
        .load_chunk_store(TARGET)
        .ok_or_else(|| format!("chunk {TARGET} missing after reload"))?;
    let block = store.chunk.get_block(0, 0, 0);
    let state = store.chunk.state();

    let loaded = WorldSession::load(&WorldDescriptor::from(&config.storage)).map_err(|e| e.to_string())?;
    let manifest = loaded.manifest.ok_or("manifest missing after save")?;

    println!();
    println!("┌─ RELOADED ───────────────────────────────────────────────┐");
    println!("│ World:          {}", manifest.world_name);
    println!("│ Seed:           {}", manifest.seed);
    println!("│ Chunk stores:   {}", manifest.chunk_count);
    println!("│ Block (0,0,0):  {}", block.id());
    println!("│ State:          {state:?}");
    println!("│ Elapsed:        {:.2} ms", start.elapsed().as_secs_f64() * 1000.0);
    println!("└──────────────────────────────────────────────────────────┘");

    if block != VOXEL {
        return Err(format!("expected block {}, found {}", VOXEL.id(), block.id()));
    }
    if state != ChunkState::Complete {
        return Err(format!("expected state Complete, found {state:?}"));
    }
    Ok(())
}

fn main() -> ExitCode {
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║              STRATA WORLD ROUND TRIP                     ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            println!("✗ {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("World directory: {}", config.storage.world_dir().display());

    match run(config) {
        Ok(()) => {
            println!();
            println!("✓ Voxel survived the round trip");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!();
            println!("✗ {e}");
            ExitCode::FAILURE
        }
    }
}
