//! # Voxel Engine Core
//!
//! This module contains the voxel data and the machinery that streams it,
//! providing the foundation for representing, generating, persisting and
//! querying a voxel terrain around a moving player.
//!
//! ## Architecture
//!
//! The voxel system is organized into several key components:
//!
//! * **Block**: Block types, faces and the `BlockServer` material registry
//! * **Chunk**: Dense block storage plus the per-chunk lifecycle
//! * **WorldGeneration**: Seeded, deterministic terrain from Perlin noise
//! * **SaveWorld**: Crash-safe, folder-backed persistence of chunks and the player
//! * **Raycast**: Voxel traversal for block picking
//! * **World**: The streaming controller tying it all together
//!
//! ## Data Flow
//!
//! 1. The game thread reports the player position to the `World`
//! 2. The `World` queues missing chunks and schedules far ones for eviction
//! 3. The update thread loads or generates queued chunks and meshes them
//! 4. Ready chunks are drawn; edits mark them dirty and queue a remesh
//! 5. Modified chunks are written back when evicted or at shutdown

pub mod block;
pub mod chunk;
pub mod raycast;
pub mod save_world;
pub mod world;
pub mod world_generation;
