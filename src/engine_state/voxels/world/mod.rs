//! # World Module
//!
//! This module provides the `World` struct, the streaming controller of the
//! voxel terrain. It owns the map from chunk coordinates to chunks, decides
//! which chunks should be resident, and drives a background update thread
//! that loads, generates, remeshes and evicts them.
//!
//! ## Threads
//!
//! The game thread owns the `World` and calls it every frame
//! (`set_center_position`, `render`, block edits, queries). None of those calls
//! wait for a chunk to become ready: a chunk that is not resident yet simply
//! answers "no data". The only blocking call is `wait_for_generation`, meant
//! for startup.
//!
//! The update thread takes jobs from a shared queue (see `scheduler`). It can
//! be replaced by calling `process_jobs` from any thread, which is how tests
//! drive the world deterministically.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cgmath::Point3;
//! use voxel_world::{BlockServer, World, WorldSettings};
//!
//! let mut world = World::new(WorldSettings::default(), Arc::new(BlockServer::new()))?;
//! world.set_center_position(Point3::new(0.0, 100.0, 0.0));
//! world.start_update_thread()?;
//! world.wait_for_generation(9)?;
//! # Ok::<(), voxel_world::WorldError>(())
//! ```

mod ready_counter;
mod scheduler;
mod window;
mod worker;

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use cgmath::Point3;
use log::{error, info, warn};
use lru::LruCache;

use crate::engine_state::{
    error::{SaveError, WorldError},
    rendering::{ChunkRenderer, MeshView},
    settings::WorldSettings,
};

use self::ready_counter::ReadyCounter;
use self::scheduler::{InFlight, JobQueue};
use self::window::StreamingWindow;
use self::worker::WorldShared;

use super::{
    block::{block_type::BlockType, BlockServer},
    chunk::{split_block_position, ChunkCoord, ChunkState},
    raycast::{self, Ray, RaycastHit},
    save_world::{SaveWorld, WorldMetadata, SAVE_FORMAT_VERSION},
    world_generation::WorldGeneration,
};

/// The chunk streaming controller.
///
/// All queries and edits take `&self` and may be called from any thread;
/// only starting and stopping the update thread need `&mut self`.
pub struct World {
    shared: Arc<WorldShared>,
    worker: Option<JoinHandle<()>>,
    settings: WorldSettings,
}

impl World {
    /// Opens a world.
    ///
    /// With a `save_folder` configured the world lives in
    /// `save_folder/world_name`; its stored seed wins over `settings.seed`.
    /// Without one the world is kept in memory only.
    ///
    /// # Errors
    /// Fails if the save folder cannot be created or its metadata cannot be
    /// read or written.
    pub fn new(settings: WorldSettings, block_server: Arc<BlockServer>) -> Result<Self, WorldError> {
        let save = match settings.world_folder() {
            Some(folder) if settings.new_world => Some(SaveWorld::create_new(folder)?),
            Some(folder) => Some(SaveWorld::open(folder)?),
            None => None,
        };

        let stored_seed = match &save {
            Some(save) => save.load_metadata()?.map(|metadata| metadata.seed),
            None => None,
        };
        let seed = stored_seed
            .or(settings.seed)
            .unwrap_or_else(|| fastrand::u32(..));
        if let (Some(save), None) = (&save, stored_seed) {
            save.save_metadata(&WorldMetadata {
                seed,
                version: SAVE_FORMAT_VERSION,
            })?;
        }

        match &save {
            Some(save) => info!("Opened world {:?} with seed {}", save.folder(), seed),
            None => info!("Opened in-memory world with seed {}", seed),
        }

        let cache_capacity =
            NonZeroUsize::new(settings.evicted_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let shared = WorldShared {
            chunks: RwLock::new(HashMap::new()),
            jobs: JobQueue::new(),
            ready: ReadyCounter::new(),
            window: Mutex::new(StreamingWindow::new(
                settings.render_distance,
                settings.eviction_margin,
            )),
            generator: RwLock::new(WorldGeneration::new(seed)),
            save,
            evicted: Mutex::new(LruCache::new(cache_capacity)),
            block_server,
        };

        Ok(World {
            shared: Arc::new(shared),
            worker: None,
            settings,
        })
    }

    pub fn seed(&self) -> u32 {
        self.shared
            .generator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .seed()
    }

    /// The persistent store, `None` for an in-memory world.
    pub fn save_world(&self) -> Option<&SaveWorld> {
        self.shared.save.as_ref()
    }

    /// Recenters the streaming window on the chunk containing `position`.
    ///
    /// Missing chunks are queued nearest first and chunks past the eviction
    /// radius are scheduled for eviction. Does nothing if the center chunk did
    /// not change. Never blocks on generation.
    pub fn set_center_position(&self, position: Point3<f32>) {
        let center = ChunkCoord::from_world_position(position);
        let mut window = self.shared.lock_window();
        if window.set_center(center) {
            self.shared.refresh_window(&window);
        }
    }

    /// Chunk the window is centered on, `None` before the first `set_center_position`.
    pub fn center(&self) -> Option<ChunkCoord> {
        self.shared.lock_window().center()
    }

    /// Sets the window radius in chunks.
    ///
    /// # Returns
    /// The fog distance in blocks the renderer should use for this radius.
    pub fn set_render_distance(&self, render_distance: u32) -> f32 {
        let mut window = self.shared.lock_window();
        window.set_render_distance(render_distance);
        if window.center().is_some() {
            self.shared.refresh_window(&window);
        }
        info!("Render distance set to {} chunks", render_distance);
        window.fog_distance()
    }

    pub fn render_distance(&self) -> u32 {
        self.shared.lock_window().render_distance()
    }

    /// Spawns the background update thread.
    ///
    /// # Errors
    /// * `WorkerAlreadyRunning` - the thread is already running
    /// * `WorkerSpawn` - the OS refused to create the thread
    pub fn start_update_thread(&mut self) -> Result<(), WorldError> {
        if self.is_update_thread_running() {
            return Err(WorldError::WorkerAlreadyRunning);
        }
        self.shared.jobs.reset_shutdown();

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("world-update".to_string())
            .spawn(move || shared.run_worker())
            .map_err(WorldError::WorkerSpawn)?;
        self.worker = Some(handle);
        info!("World update thread started");
        Ok(())
    }

    pub fn is_update_thread_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Runs up to `max_jobs` queued jobs on the calling thread.
    ///
    /// # Returns
    /// The number of jobs run. Zero when the queue is empty or paused.
    pub fn process_jobs(&self, max_jobs: usize) -> usize {
        let mut processed = 0;
        while processed < max_jobs {
            let Some(job) = self.shared.jobs.next_job(false) else {
                break;
            };
            let _in_flight = InFlight(&self.shared.jobs);
            self.shared.run_job(job);
            processed += 1;
        }
        processed
    }

    /// Number of queued background jobs.
    pub fn pending_jobs(&self) -> usize {
        self.shared.jobs.pending()
    }

    /// Blocks the calling thread until at least `wanted` chunks are ready.
    ///
    /// # Errors
    /// * `WorkerNotRunning` - the update thread was never started or died
    /// * `GenerationTimeout` - `generation_timeout_ms` elapsed first
    pub fn wait_for_generation(&self, wanted: usize) -> Result<(), WorldError> {
        if !self.is_update_thread_running() {
            return Err(WorldError::WorkerNotRunning);
        }
        self.shared.ready.wait_for(
            wanted,
            self.settings.generation_timeout(),
            || self.is_update_thread_running(),
        )
    }

    /// Number of chunks that are `Ready` or `Dirty`.
    pub fn ready_count(&self) -> usize {
        self.shared.ready.get()
    }

    /// Number of chunks in the map, in any state.
    pub fn resident_count(&self) -> usize {
        self.shared.read_chunks().len()
    }

    /// Lifecycle state of the chunk at `coord`; `Unrequested` if it is not in the map.
    pub fn chunk_state(&self, coord: ChunkCoord) -> ChunkState {
        self.shared
            .read_chunks()
            .get(&coord)
            .map_or(ChunkState::Unrequested, |chunk| chunk.get().state())
    }

    /// Reads the block at `position`, `None` if its chunk is not ready.
    pub fn block_at(&self, position: Point3<i32>) -> Option<BlockType> {
        let (coord, local) = split_block_position(position)?;
        let chunks = self.shared.read_chunks();
        let chunk = chunks.get(&coord)?.get();
        chunk.block(local)
    }

    /// Writes `block_type` at `position` and schedules a remesh of its chunk.
    ///
    /// # Errors
    /// * `OutOfBounds` - `position.y` is outside the world's height
    /// * `ChunkNotLoaded` - the chunk is not `Ready` or `Dirty`
    pub fn place_block(&self, position: Point3<i32>, block_type: BlockType) -> Result<(), WorldError> {
        let (coord, local) =
            split_block_position(position).ok_or(WorldError::OutOfBounds(position))?;
        let chunks = self.shared.read_chunks();
        let chunk = chunks
            .get(&coord)
            .ok_or(WorldError::ChunkNotLoaded(coord))?;
        chunk.get_mut().set_block(local, block_type)?;
        self.shared.jobs.push_remesh(coord);
        Ok(())
    }

    /// Replaces the block at `position` with air. Fails like `place_block`.
    pub fn destroy_block(&self, position: Point3<i32>) -> Result<(), WorldError> {
        self.place_block(position, BlockType::AIR)
    }

    /// Topmost non-air block index of the column containing `position`.
    ///
    /// `None` if the chunk is not ready or the column is all air.
    pub fn get_height(&self, position: Point3<f32>) -> Option<usize> {
        let column = Point3::new(position.x.floor() as i32, 0, position.z.floor() as i32);
        let (coord, local) = split_block_position(column)?;
        let chunks = self.shared.read_chunks();
        let chunk = chunks.get(&coord)?.get();
        chunk.column_height(local.x, local.z)
    }

    /// Finds the first solid block along `ray` within the render distance.
    ///
    /// Cells of chunks that are not ready count as empty.
    pub fn raycast_block(&self, ray: &Ray) -> Option<RaycastHit> {
        let max_distance = self.shared.lock_window().max_ray_distance();
        let chunks = self.shared.read_chunks();
        let block_server = &self.shared.block_server;
        raycast::traverse(ray, max_distance, |cell| {
            split_block_position(cell)
                .and_then(|(coord, local)| chunks.get(&coord)?.get().block(local))
                .is_some_and(|block| block_server.is_solid(block))
        })
    }

    /// Draws every ready chunk that has geometry.
    ///
    /// Chunks still generating, or locked by the update thread this instant,
    /// are skipped rather than waited for.
    ///
    /// # Returns
    /// The number of draw calls issued.
    pub fn render<R: ChunkRenderer>(&self, target: &mut R, shader: &R::Shader) -> usize {
        let chunks = self.shared.read_chunks();
        let mut shader_bound = false;
        let mut draws = 0;
        for resource in chunks.values() {
            let Some(chunk) = resource.try_get() else {
                continue;
            };
            let mesh = chunk.mesh();
            if !chunk.is_ready() || mesh.is_empty() {
                continue;
            }
            if !shader_bound {
                target.bind_shader(shader);
                shader_bound = true;
            }
            target.bind_mesh(MeshView {
                coord: chunk.coord(),
                revision: mesh.revision(),
                vertices: mesh.vertices(),
            });
            target.draw(mesh.vertex_count());
            draws += 1;
        }
        draws
    }

    /// Throws away every chunk, in memory and on disk, and restarts streaming
    /// around the current center with a new seed.
    ///
    /// The update thread is drained first and resumed afterwards.
    ///
    /// # Returns
    /// The seed now in use: `seed` if given, otherwise a random one.
    pub fn clear_and_reseed(&self, seed: Option<u32>) -> Result<u32, WorldError> {
        self.shared.jobs.pause_and_drain();
        let result = self.reset_chunks(seed);
        self.shared.jobs.resume();
        result
    }

    fn reset_chunks(&self, seed: Option<u32>) -> Result<u32, WorldError> {
        let window = self.shared.lock_window();
        self.shared.write_chunks().clear();
        self.shared.ready.reset();
        self.shared.lock_evicted().clear();
        self.shared.jobs.clear();

        let result = self.reseed_store(seed);
        self.shared.refresh_window(&window);
        result
    }

    fn reseed_store(&self, seed: Option<u32>) -> Result<u32, WorldError> {
        if let Some(save) = &self.shared.save {
            save.clear_chunks()?;
        }
        let seed = seed.unwrap_or_else(|| fastrand::u32(..));
        self.shared
            .generator
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .reseed(seed);
        if let Some(save) = &self.shared.save {
            save.save_metadata(&WorldMetadata {
                seed,
                version: SAVE_FORMAT_VERSION,
            })?;
        }
        info!("World cleared and reseeded with {}", seed);
        Ok(seed)
    }

    /// Writes every modified resident chunk to disk.
    ///
    /// Every chunk is attempted even after a failure.
    ///
    /// # Returns
    /// The number of chunks written, or the first error hit.
    pub fn save_all(&self) -> Result<usize, SaveError> {
        let Some(save) = &self.shared.save else {
            return Ok(0);
        };
        let chunks: Vec<_> = self.shared.read_chunks().values().cloned().collect();

        let mut saved = 0;
        let mut first_error = None;
        for resource in chunks {
            let snapshot = {
                let chunk = resource.get();
                if !chunk.is_modified() {
                    continue;
                }
                chunk.snapshot().map(|snapshot| (chunk.coord(), snapshot))
            };
            let Some((coord, (blocks, revision))) = snapshot else {
                continue;
            };
            match save.save_chunk(coord, &blocks) {
                Ok(()) => {
                    resource.get_mut().mark_persisted(revision);
                    saved += 1;
                }
                Err(err) => {
                    warn!("Failed to save chunk {}: {}", coord, err);
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(saved),
        }
    }

    /// Stops and joins the update thread, then saves modified chunks.
    ///
    /// # Errors
    /// `WorkerShutdownFailure` if the update thread panicked. Save failures
    /// are logged, not returned.
    pub fn shutdown(&mut self) -> Result<(), WorldError> {
        if let Some(handle) = self.worker.take() {
            self.shared.jobs.request_shutdown();
            if handle.join().is_err() {
                error!("World update thread panicked");
                return Err(WorldError::WorkerShutdownFailure);
            }
            info!("World update thread stopped");
        }
        match self.save_all() {
            Ok(0) => {}
            Ok(saved) => info!("Saved {} modified chunks", saved),
            Err(err) => warn!("Some chunks were not saved: {}", err),
        }
        Ok(())
    }
}

impl Drop for World {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            if !thread::panicking() {
                panic!("World dropped with a failed update thread: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_side::BlockSide;

    fn in_memory(render_distance: u32) -> World {
        let settings = WorldSettings {
            render_distance,
            seed: Some(42),
            ..WorldSettings::default()
        };
        World::new(settings, Arc::new(BlockServer::new())).expect("failed to open world")
    }

    fn drain(world: &World) {
        while world.process_jobs(usize::MAX) > 0 {}
    }

    fn chunk_count(render_distance: u32) -> usize {
        let side = 2 * render_distance as usize + 1;
        side * side
    }

    #[derive(Default)]
    struct CountingRenderer {
        shaders: usize,
        meshes: Vec<ChunkCoord>,
        vertices: u32,
    }

    impl ChunkRenderer for CountingRenderer {
        type Shader = str;

        fn bind_shader(&mut self, _shader: &str) {
            self.shaders += 1;
        }

        fn bind_mesh(&mut self, mesh: MeshView<'_>) {
            assert!(!mesh.vertices.is_empty());
            self.meshes.push(mesh.coord);
        }

        fn draw(&mut self, vertex_count: u32) {
            self.vertices += vertex_count;
        }
    }

    #[test]
    fn center_queues_window_nearest_first() {
        let world = in_memory(1);
        assert_eq!(world.resident_count(), 0);
        assert_eq!(world.center(), None);

        world.set_center_position(Point3::new(8.0, 100.0, 8.0));
        assert_eq!(world.center(), Some(ChunkCoord::new(0, 0)));
        assert_eq!(world.resident_count(), chunk_count(1));
        assert_eq!(world.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Queued);

        assert_eq!(world.process_jobs(1), 1);
        assert_eq!(world.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Ready);
        assert_eq!(world.chunk_state(ChunkCoord::new(1, 1)), ChunkState::Queued);

        drain(&world);
        assert_eq!(world.ready_count(), chunk_count(1));
    }

    #[test]
    fn moving_far_evicts_old_window() {
        let world = in_memory(1);
        world.set_center_position(Point3::new(0.0, 0.0, 0.0));
        drain(&world);

        world.set_center_position(Point3::new(16.0 * 10.0, 0.0, 0.0));
        drain(&world);

        assert_eq!(world.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Unrequested);
        assert_eq!(world.chunk_state(ChunkCoord::new(10, 0)), ChunkState::Ready);
        assert_eq!(world.resident_count(), chunk_count(1));
        assert_eq!(world.ready_count(), chunk_count(1));
    }

    #[test]
    fn margin_keeps_chunks_one_step_behind() {
        let world = in_memory(1);
        world.set_center_position(Point3::new(0.0, 0.0, 0.0));
        drain(&world);

        world.set_center_position(Point3::new(16.0, 0.0, 0.0));
        drain(&world);
        assert_eq!(world.chunk_state(ChunkCoord::new(-1, 0)), ChunkState::Ready);
        assert_eq!(world.resident_count(), 12);
    }

    #[test]
    fn evicting_chunk_is_recovered_when_window_returns() {
        let world = in_memory(1);
        world.set_center_position(Point3::new(0.0, 0.0, 0.0));
        drain(&world);

        world.set_center_position(Point3::new(16.0 * 3.0, 0.0, 0.0));
        assert_eq!(world.chunk_state(ChunkCoord::new(-1, 0)), ChunkState::Evicting);
        world.set_center_position(Point3::new(0.0, 0.0, 0.0));
        assert_eq!(world.chunk_state(ChunkCoord::new(-1, 0)), ChunkState::Dirty);

        drain(&world);
        assert_eq!(world.chunk_state(ChunkCoord::new(-1, 0)), ChunkState::Ready);
        assert_eq!(world.ready_count(), chunk_count(1));
    }

    #[test]
    fn edits_require_a_ready_chunk() {
        let world = in_memory(1);
        let position = Point3::new(3, 10, 3);
        assert!(matches!(
            world.place_block(position, BlockType::WOOD),
            Err(WorldError::ChunkNotLoaded(_))
        ));

        world.set_center_position(Point3::new(0.0, 0.0, 0.0));
        assert!(matches!(
            world.place_block(position, BlockType::WOOD),
            Err(WorldError::ChunkNotLoaded(_))
        ));
        assert!(matches!(
            world.place_block(Point3::new(3, 256, 3), BlockType::WOOD),
            Err(WorldError::OutOfBounds(_))
        ));
    }

    #[test]
    fn edit_marks_dirty_until_remeshed() {
        let world = in_memory(0);
        world.set_center_position(Point3::new(0.0, 0.0, 0.0));
        drain(&world);

        let top = world.get_height(Point3::new(2.5, 0.0, 2.5)).expect("column");
        let above = Point3::new(2, top as i32 + 1, 2);
        world.place_block(above, BlockType::WOOD).expect("place");
        assert_eq!(world.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Dirty);
        assert_eq!(world.ready_count(), 1);
        assert_eq!(world.get_height(Point3::new(2.5, 0.0, 2.5)), Some(top + 1));

        drain(&world);
        assert_eq!(world.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Ready);

        world.destroy_block(above).expect("destroy");
        assert_eq!(world.block_at(above), Some(BlockType::AIR));
        assert_eq!(world.get_height(Point3::new(2.5, 0.0, 2.5)), Some(top));
    }

    #[test]
    fn height_matches_column_scan() {
        let world = in_memory(0);
        world.set_center_position(Point3::new(0.0, 0.0, 0.0));
        assert_eq!(world.get_height(Point3::new(1.0, 0.0, 1.0)), None);
        drain(&world);

        for x in 0..16 {
            for z in 0..16 {
                let expected = (0..256)
                    .rev()
                    .find(|&y| world.block_at(Point3::new(x, y, z)) != Some(BlockType::AIR))
                    .map(|y| y as usize);
                let actual = world.get_height(Point3::new(x as f32 + 0.5, 0.0, z as f32 + 0.5));
                assert_eq!(actual, expected);
            }
        }
    }

    #[test]
    fn raycast_finds_terrain_below() {
        let world = in_memory(0);
        world.set_center_position(Point3::new(0.0, 0.0, 0.0));
        drain(&world);

        let top = world.get_height(Point3::new(4.5, 0.0, 4.5)).expect("column");
        let ray = Ray::new(
            Point3::new(4.5, top as f32 + 5.5, 4.5),
            cgmath::Vector3::new(0.0, -1.0, 0.0),
        );
        let hit = world.raycast_block(&ray).expect("hit");
        assert_eq!(hit.block, Point3::new(4, top as i32, 4));
        assert_eq!(hit.face, BlockSide::TOP);
    }

    #[test]
    fn render_draws_ready_chunks_only() {
        let world = in_memory(1);
        let mut renderer = CountingRenderer::default();
        assert_eq!(world.render(&mut renderer, "chunk"), 0);
        assert_eq!(renderer.shaders, 0);

        world.set_center_position(Point3::new(0.0, 0.0, 0.0));
        world.process_jobs(3);
        let draws = world.render(&mut renderer, "chunk");
        assert_eq!(draws, 3);
        assert_eq!(renderer.shaders, 1);
        assert_eq!(renderer.meshes.len(), 3);
        assert!(renderer.vertices > 0);
        assert_eq!(renderer.vertices % 6, 0);
    }

    #[test]
    fn reseed_regenerates_window() {
        let world = in_memory(1);
        world.set_center_position(Point3::new(0.0, 0.0, 0.0));
        drain(&world);

        let seed = world.clear_and_reseed(Some(7)).expect("reseed");
        assert_eq!(seed, 7);
        assert_eq!(world.seed(), 7);
        assert_eq!(world.ready_count(), 0);
        assert_eq!(world.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Queued);

        drain(&world);
        assert_eq!(world.ready_count(), chunk_count(1));
    }

    #[test]
    fn render_distance_returns_fog_and_grows_window() {
        let world = in_memory(1);
        world.set_center_position(Point3::new(0.0, 0.0, 0.0));
        let fog = world.set_render_distance(2);
        assert_eq!(fog, 24.0);
        assert_eq!(world.render_distance(), 2);
        assert_eq!(world.resident_count(), chunk_count(2));
    }

    #[test]
    fn wait_without_thread_fails_fast() {
        let world = in_memory(1);
        world.set_center_position(Point3::new(0.0, 0.0, 0.0));
        assert!(matches!(
            world.wait_for_generation(1),
            Err(WorldError::WorkerNotRunning)
        ));
    }

    #[test]
    fn second_start_is_rejected() {
        let mut world = in_memory(0);
        world.start_update_thread().expect("start");
        assert!(matches!(
            world.start_update_thread(),
            Err(WorldError::WorkerAlreadyRunning)
        ));
        world.shutdown().expect("shutdown");
        assert!(!world.is_update_thread_running());
    }
}
