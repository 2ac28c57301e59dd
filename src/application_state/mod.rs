//! # Application State Management
//!
//! A headless host for the world: it plays the part of the game thread,
//! moving a player through the terrain, drawing through a recording renderer
//! and editing blocks the way a player would. Windowing and GPU work are left
//! to real hosts.

pub mod headless_renderer;

use std::sync::Arc;

use cgmath::{Point3, Vector2, Vector3};
use log::{debug, info, warn};
use web_time::{Duration, Instant};

use headless_renderer::{ChunkShader, HeadlessRenderer};

use crate::engine_state::{
    error::WorldError,
    settings::WorldSettings,
    voxels::{
        block::{block_type::BlockType, BlockServer},
        raycast::Ray,
        save_world::PlayerData,
        world::World,
    },
};

/// Units per second the demo player walks along +x.
const WALK_SPEED: f32 = 24.0;

fn spawn() -> PlayerData {
    PlayerData {
        position: Point3::new(8.0, 200.0, 8.0),
        velocity: Vector3::new(0.0, 0.0, 0.0),
        rotation: Vector2::new(0.0, 0.0),
    }
}

/// Everything the running application owns.
pub struct ApplicationState {
    pub world: World,
    pub player: PlayerData,
    /// Whether `player` came from the save rather than the spawn point
    pub player_restored: bool,
    pub renderer: HeadlessRenderer,
    pub shader: ChunkShader,
    pub fog_distance: f32,
}

impl ApplicationState {
    /// Opens the world and restores the player, falling back to the spawn point.
    pub fn new(settings: WorldSettings) -> Result<Self, WorldError> {
        let render_distance = settings.render_distance;
        let world = World::new(settings, Arc::new(BlockServer::new()))?;

        let restored = match world.save_world().map(|save| save.load_player()) {
            Some(Ok(Some(player))) => {
                info!("Restored player at {:?}", player.position);
                Some(player)
            }
            Some(Err(err)) => {
                warn!("Ignoring unreadable player record: {}", err);
                None
            }
            _ => None,
        };

        let fog_distance = world.set_render_distance(render_distance);
        Ok(ApplicationState {
            world,
            player_restored: restored.is_some(),
            player: restored.unwrap_or_else(spawn),
            renderer: HeadlessRenderer::default(),
            shader: ChunkShader::new("chunk"),
            fog_distance,
        })
    }

    /// Starts streaming and blocks until the chunks around the player are ready.
    ///
    /// A player placed at the spawn point is then dropped onto the terrain; a
    /// restored player keeps their saved position.
    pub fn start(&mut self) -> Result<(), WorldError> {
        self.world.set_center_position(self.player.position);
        self.world.start_update_thread()?;

        let side = 2 * self.world.render_distance() as usize + 1;
        let start = Instant::now();
        self.world.wait_for_generation(side * side)?;
        info!(
            "{} chunks ready after {:?}",
            self.world.ready_count(),
            start.elapsed()
        );

        if !self.player_restored {
            if let Some(height) = self.world.get_height(self.player.position) {
                self.player.position.y = height as f32 + 2.0;
            }
        }
        Ok(())
    }

    /// Advances the player by `dt` and draws one frame.
    pub fn update(&mut self, dt: Duration) {
        self.player.velocity = Vector3::new(WALK_SPEED, 0.0, 0.0);
        self.player.position += self.player.velocity * dt.as_secs_f32();
        if let Some(height) = self.world.get_height(self.player.position) {
            self.player.position.y = height as f32 + 2.0;
        }
        self.world.set_center_position(self.player.position);

        self.renderer.begin_frame();
        let draws = self.world.render(&mut self.renderer, &self.shader);
        debug!(
            "Frame: {} draws, {} vertices, {} jobs pending",
            draws,
            self.renderer.frame_vertices(),
            self.world.pending_jobs()
        );
    }

    /// Looks straight down, stacks a block on whatever is hit, then removes it again.
    pub fn interact(&mut self) -> Result<(), WorldError> {
        let ray = Ray::new(self.player.position, Vector3::new(0.0, -1.0, 0.0));
        let Some(hit) = self.world.raycast_block(&ray) else {
            info!("Nothing below the player");
            return Ok(());
        };

        let target = hit.face.adjacent(hit.block);
        self.world.place_block(target, BlockType::WOOD)?;
        info!("Placed wood at {:?} on the {:?} face of {:?}", target, hit.face, hit.block);
        self.world.destroy_block(target)?;
        Ok(())
    }

    /// Persists the player and modified chunks, then stops the update thread.
    pub fn close(mut self) -> Result<(), WorldError> {
        self.player.velocity = Vector3::new(0.0, 0.0, 0.0);
        if let Some(save) = self.world.save_world() {
            save.save_player(&self.player)?;
        }
        info!(
            "Drew {} frames, {} draw calls",
            self.renderer.frames(),
            self.renderer.total_draws()
        );
        self.world.shutdown()
    }
}
