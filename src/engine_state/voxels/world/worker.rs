//! # World Worker
//!
//! State shared between the `World` handle and its update thread, and the
//! execution of background jobs against it.
//!
//! ## Locking
//!
//! Locks are always taken in this order, and a lock later in the list is never
//! held while acquiring an earlier one:
//!
//! ```text
//! window -> chunk map -> one chunk -> jobs / ready counter / evicted cache
//! ```
//!
//! Heavy work (loading, noise, meshing, disk writes) runs on block copies with
//! no lock held. Results are installed under the chunk lock only if the chunk
//! is still in the state (and revision) the work started from.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, error, trace, warn};
use lru::LruCache;
use web_time::Instant;

use super::ready_counter::ReadyCounter;
use super::scheduler::{InFlight, Job, JobQueue};
use super::window::StreamingWindow;
use crate::core::MtResource;
use crate::engine_state::rendering::ChunkMesh;
use crate::engine_state::voxels::{
    block::BlockServer,
    chunk::{BlockArray, Chunk, ChunkCoord, ChunkState},
    save_world::SaveWorld,
    world_generation::WorldGeneration,
};

pub type ChunkMap = HashMap<ChunkCoord, MtResource<Chunk>>;

pub struct WorldShared {
    pub chunks: RwLock<ChunkMap>,
    pub jobs: JobQueue,
    pub ready: ReadyCounter,
    pub window: Mutex<StreamingWindow>,
    pub generator: RwLock<WorldGeneration>,
    pub save: Option<SaveWorld>,
    /// Recently evicted blocks, already persisted or never modified
    pub evicted: Mutex<LruCache<ChunkCoord, BlockArray>>,
    pub block_server: Arc<BlockServer>,
}

impl WorldShared {
    pub fn read_chunks(&self) -> RwLockReadGuard<'_, ChunkMap> {
        self.chunks.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write_chunks(&self) -> RwLockWriteGuard<'_, ChunkMap> {
        self.chunks.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lock_window(&self) -> MutexGuard<'_, StreamingWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lock_evicted(&self) -> MutexGuard<'_, LruCache<ChunkCoord, BlockArray>> {
        self.evicted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn chunk(&self, coord: ChunkCoord) -> Option<MtResource<Chunk>> {
        self.read_chunks().get(&coord).cloned()
    }

    /// Brings the chunk map in line with `window` and rebuilds the generation queue.
    ///
    /// * Missing wanted coordinates are inserted as `Queued`
    /// * `Queued` chunks no longer wanted are dropped
    /// * Ready chunks past the eviction radius start `Evicting`
    /// * `Evicting` chunks back inside the radius are recovered as `Dirty`
    pub fn refresh_window(&self, window: &StreamingWindow) {
        let wanted = window.wanted();
        let mut evictions = Vec::new();
        let mut recovered = Vec::new();

        let mut chunks = self.write_chunks();
        chunks.retain(|coord, resource| {
            let mut chunk = resource.get_mut();
            match chunk.state() {
                ChunkState::Queued => window.wants(*coord),
                ChunkState::Ready | ChunkState::Dirty if !window.keeps(*coord) => {
                    if chunk.transition(ChunkState::Evicting).is_ok() {
                        self.ready.decrement();
                        evictions.push(*coord);
                    }
                    true
                }
                ChunkState::Evicting if window.keeps(*coord) => {
                    if chunk.transition(ChunkState::Dirty).is_ok() {
                        self.ready.increment();
                        recovered.push(*coord);
                    }
                    true
                }
                _ => true,
            }
        });

        let mut generation = Vec::new();
        for coord in wanted {
            let resource = chunks
                .entry(coord)
                .or_insert_with(|| MtResource::new(Chunk::queued(coord)));
            if resource.get().state() == ChunkState::Queued {
                generation.push(coord);
            }
        }
        drop(chunks);

        debug!(
            "Window refresh: {} to generate, {} to evict, {} recovered",
            generation.len(),
            evictions.len(),
            recovered.len()
        );
        for coord in evictions {
            self.jobs.push_eviction(coord);
        }
        for coord in recovered {
            self.jobs.push_remesh(coord);
        }
        self.jobs.set_generation_queue(generation);
    }

    /// Body of the update thread: run jobs until shutdown is requested.
    pub fn run_worker(&self) {
        debug!("World update thread running");
        while let Some(job) = self.jobs.next_job(true) {
            let _in_flight = InFlight(&self.jobs);
            self.run_job(job);
        }
        debug!("World update thread stopped");
    }

    pub fn run_job(&self, job: Job) {
        trace!("Running {:?}", job);
        match job {
            Job::Generate(coord) => self.generate(coord),
            Job::Remesh(coord) => self.remesh(coord),
            Job::Evict(coord) => self.evict(coord),
        }
    }

    fn generate(&self, coord: ChunkCoord) {
        let Some(resource) = self.chunk(coord) else {
            return;
        };
        {
            let mut chunk = resource.get_mut();
            if chunk.state() != ChunkState::Queued
                || chunk.transition(ChunkState::LoadingOrGenerating).is_err()
            {
                return;
            }
        }

        let start = Instant::now();
        let (blocks, source) = self.load_or_generate(coord);
        let mesh = ChunkMesh::build(coord, &blocks, &self.block_server, 0);
        debug!(
            "Chunk {} {} in {:?} ({} faces)",
            coord,
            source,
            start.elapsed(),
            mesh.face_count()
        );

        let window = self.lock_window();
        if !window.keeps(coord) {
            let mut chunks = self.write_chunks();
            if chunks
                .get(&coord)
                .is_some_and(|current| current.ptr_eq(&resource))
            {
                chunks.remove(&coord);
            }
            drop(chunks);
            self.lock_evicted().put(coord, blocks);
            debug!("Chunk {} left the window while generating", coord);
            return;
        }

        let mut chunk = resource.get_mut();
        match chunk.install(blocks, mesh, false) {
            Ok(()) => self.ready.increment(),
            Err(err) => error!("Failed to install chunk {}: {}", coord, err),
        }
    }

    /// Evicted cache first, then disk, then the generator.
    fn load_or_generate(&self, coord: ChunkCoord) -> (BlockArray, &'static str) {
        if let Some(blocks) = self.lock_evicted().pop(&coord) {
            return (blocks, "restored from cache");
        }
        if let Some(save) = &self.save {
            match save.load_chunk(coord) {
                Ok(Some(blocks)) => return (blocks, "loaded"),
                Ok(None) => {}
                Err(err) => warn!("Generating chunk {} instead of loading it: {}", coord, err),
            }
        }
        let blocks = self
            .generator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generate(coord);
        (blocks, "generated")
    }

    fn remesh(&self, coord: ChunkCoord) {
        let Some(resource) = self.chunk(coord) else {
            return;
        };
        let snapshot = {
            let chunk = resource.get();
            if !chunk.is_ready() {
                return;
            }
            chunk.snapshot()
        };
        let Some((blocks, revision)) = snapshot else {
            return;
        };

        let mesh = ChunkMesh::build(coord, &blocks, &self.block_server, revision);
        if !resource.get_mut().install_mesh(mesh) {
            trace!("Mesh of chunk {} went stale before install", coord);
        }
    }

    fn evict(&self, coord: ChunkCoord) {
        let Some(resource) = self.chunk(coord) else {
            return;
        };
        let snapshot = {
            let chunk = resource.get();
            if chunk.state() != ChunkState::Evicting {
                return;
            }
            if chunk.is_modified() {
                chunk.snapshot()
            } else {
                None
            }
        };

        if let (Some((blocks, revision)), Some(save)) = (snapshot, &self.save) {
            match save.save_chunk(coord, &blocks) {
                Ok(()) => resource.get_mut().mark_persisted(revision),
                Err(err) => {
                    // Stays `Evicting` and modified until a retry succeeds or
                    // the window takes it back.
                    warn!("Keeping chunk {} resident, save failed: {}", coord, err);
                    self.jobs.defer_eviction(coord);
                    return;
                }
            }
        }

        let mut chunks = self.write_chunks();
        let Some(current) = chunks.get(&coord) else {
            return;
        };
        if !current.ptr_eq(&resource) {
            return;
        }
        let blocks = {
            let mut chunk = resource.get_mut();
            if chunk.state() != ChunkState::Evicting
                || chunk.transition(ChunkState::Unrequested).is_err()
            {
                return;
            }
            chunk.take_blocks()
        };
        chunks.remove(&coord);
        drop(chunks);

        if let Some(blocks) = blocks {
            self.lock_evicted().put(coord, blocks);
        }
        trace!("Chunk {} evicted", coord);
    }
}
