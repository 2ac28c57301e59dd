#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel World
//!
//! A chunk streaming engine for voxel terrain: it generates, persists, caches,
//! evicts and spatially queries the chunks around a moving player while a
//! background thread keeps producing new ones.
//!
//! ## Key Modules
//!
//! * `engine_state` - The world, its chunks, generation, persistence and meshing
//! * `application_state` - A headless host that drives a world like a game loop would
//!
//! ## Architecture
//!
//! The game thread owns a `World` and tells it where the player is. The world
//! queues the chunks the player needs, a background update thread loads or
//! generates and meshes them, and the game thread draws whatever is ready
//! through a `ChunkRenderer` without ever waiting for generation.
//!
//! ## Usage
//!
//! ```no_run
//! // Native application initialization
//! fn main() {
//!     voxel_world::run();
//! }
//! ```

use log::{error, info};
use web_time::Duration;

pub mod application_state;
pub mod core;
pub mod engine_state;

pub use engine_state::{
    error::{ConfigError, SaveError, WorldError},
    rendering::{ChunkMesh, ChunkRenderer, MeshView, Vertex},
    settings::WorldSettings,
    voxels::{
        block::{block_side::BlockSide, block_type::BlockType, BlockDescriptor, BlockServer},
        chunk::{BlockArray, ChunkCoord, ChunkState},
        raycast::{Ray, RaycastHit},
        save_world::{PlayerData, SaveWorld},
        world::World,
        world_generation::WorldGeneration,
    },
};

use application_state::ApplicationState;

/// Frames the headless demo simulates before closing the world.
const DEMO_FRAMES: u32 = 240;
const FRAME_TIME: Duration = Duration::from_millis(16);

/// Runs the headless demo.
///
/// The first command line argument, if present, is a `WorldSettings` JSON file.
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();
    info!("Logger initialized");

    let settings = match std::env::args().nth(1) {
        Some(path) => match WorldSettings::load(&path) {
            Ok(settings) => settings,
            Err(err) => {
                error!("{}", err);
                std::process::exit(2);
            }
        },
        None => WorldSettings::default(),
    };

    if let Err(err) = run_demo(settings) {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn run_demo(settings: WorldSettings) -> Result<(), WorldError> {
    let mut state = ApplicationState::new(settings)?;
    info!("Fog distance {}", state.fog_distance);
    state.start()?;

    for frame in 0..DEMO_FRAMES {
        state.update(FRAME_TIME);
        if frame % 60 == 0 {
            if let Err(err) = state.interact() {
                info!("Edit skipped: {}", err);
            }
        }
        std::thread::sleep(FRAME_TIME);
    }
    state.close()
}
