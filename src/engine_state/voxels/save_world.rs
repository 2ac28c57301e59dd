//! # Save World Module
//!
//! Folder-backed persistence for chunk contents and player state.
//!
//! ## Layout
//!
//! ```text
//! <world folder>/
//!     world.json            seed and format version
//!     player.bin            8 little-endian f32: position, velocity, pitch/yaw
//!     chunks/chunk_<x>_<z>.bin   one storage code per block, x-major, then z, then y
//! ```
//!
//! ## Durability
//!
//! Every record is fully buffered, written to a uniquely named temporary file,
//! synced, and renamed over the old record. An interrupted write can leave a
//! stray temporary file behind but never a truncated record.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::{Pod, Zeroable};
use cgmath::{Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use super::chunk::{BlockArray, ChunkCoord};
use crate::engine_state::error::SaveError;

/// Version written to `world.json`.
pub const SAVE_FORMAT_VERSION: u32 = 1;
/// Size of `player.bin`, in bytes.
pub const PLAYER_RECORD_SIZE: usize = std::mem::size_of::<PlayerRecord>();

const METADATA_FILE: &str = "world.json";
const PLAYER_FILE: &str = "player.bin";
const CHUNK_FOLDER: &str = "chunks";

/// Player state persisted alongside the world.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlayerData {
    pub position: Point3<f32>,
    pub velocity: Vector3<f32>,
    /// Pitch and yaw, in radians
    pub rotation: Vector2<f32>,
}

/// On-disk layout of `PlayerData`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct PlayerRecord {
    position: [f32; 3],
    velocity: [f32; 3],
    rotation: [f32; 2],
}

impl PlayerRecord {
    fn to_bytes(self) -> Vec<u8> {
        bytemuck::cast::<PlayerRecord, [f32; 8]>(self)
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect()
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != PLAYER_RECORD_SIZE {
            return None;
        }
        let mut values = [0f32; 8];
        for (value, chunk) in values.iter_mut().zip(bytes.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Some(bytemuck::cast(values))
    }
}

impl From<PlayerData> for PlayerRecord {
    fn from(data: PlayerData) -> Self {
        PlayerRecord {
            position: data.position.into(),
            velocity: data.velocity.into(),
            rotation: data.rotation.into(),
        }
    }
}

impl From<PlayerRecord> for PlayerData {
    fn from(record: PlayerRecord) -> Self {
        PlayerData {
            position: record.position.into(),
            velocity: record.velocity.into(),
            rotation: record.rotation.into(),
        }
    }
}

/// Contents of `world.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldMetadata {
    pub seed: u32,
    pub version: u32,
}

/// Durable store for one world.
#[derive(Debug)]
pub struct SaveWorld {
    folder: PathBuf,
    temp_counter: AtomicU64,
}

impl SaveWorld {
    /// Opens (creating if needed) the world stored in `folder`.
    pub fn open(folder: impl Into<PathBuf>) -> Result<Self, SaveError> {
        let folder = folder.into();
        let chunks = folder.join(CHUNK_FOLDER);
        fs::create_dir_all(&chunks).map_err(|source| SaveError::Write {
            path: chunks,
            source,
        })?;
        Ok(Self {
            folder,
            temp_counter: AtomicU64::new(0),
        })
    }

    /// Deletes everything stored in `folder`, then opens it empty.
    pub fn create_new(folder: impl Into<PathBuf>) -> Result<Self, SaveError> {
        let folder = folder.into();
        match fs::remove_dir_all(&folder) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(SaveError::Write { path: folder, source }),
        }
        Self::open(folder)
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Path of the record for `coord`.
    pub fn chunk_path(&self, coord: ChunkCoord) -> PathBuf {
        self.folder
            .join(CHUNK_FOLDER)
            .join(format!("chunk_{}_{}.bin", coord.x, coord.z))
    }

    /// Reads the stored blocks of a chunk.
    ///
    /// # Returns
    /// `Ok(None)` if the chunk was never saved.
    ///
    /// # Errors
    /// `Read` or `Corrupt` if a record exists but cannot be used; callers fall
    /// back to generating the chunk.
    pub fn load_chunk(&self, coord: ChunkCoord) -> Result<Option<BlockArray>, SaveError> {
        let path = self.chunk_path(coord);
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };
        BlockArray::from_bytes(&bytes)
            .map(Some)
            .map_err(|source| SaveError::Corrupt { path, source })
    }

    /// Stores the blocks of a chunk, replacing any previous record atomically.
    pub fn save_chunk(&self, coord: ChunkCoord, blocks: &BlockArray) -> Result<(), SaveError> {
        self.write_atomic(&self.chunk_path(coord), &blocks.to_bytes())
    }

    /// Deletes every chunk record, keeping player and metadata files.
    pub fn clear_chunks(&self) -> Result<(), SaveError> {
        let chunks = self.folder.join(CHUNK_FOLDER);
        match fs::remove_dir_all(&chunks) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(SaveError::Write { path: chunks, source }),
        }
        fs::create_dir_all(&chunks).map_err(|source| SaveError::Write {
            path: chunks,
            source,
        })
    }

    pub fn load_player(&self) -> Result<Option<PlayerData>, SaveError> {
        let path = self.folder.join(PLAYER_FILE);
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };
        match PlayerRecord::from_bytes(&bytes) {
            Some(record) => Ok(Some(record.into())),
            None => Err(SaveError::CorruptPlayer {
                path,
                found: bytes.len(),
            }),
        }
    }

    pub fn save_player(&self, data: &PlayerData) -> Result<(), SaveError> {
        let record = PlayerRecord::from(*data);
        self.write_atomic(&self.folder.join(PLAYER_FILE), &record.to_bytes())
    }

    pub fn load_metadata(&self) -> Result<Option<WorldMetadata>, SaveError> {
        let path = self.folder.join(METADATA_FILE);
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| SaveError::Metadata { path, source })
    }

    pub fn save_metadata(&self, metadata: &WorldMetadata) -> Result<(), SaveError> {
        let path = self.folder.join(METADATA_FILE);
        let json = serde_json::to_vec_pretty(metadata).map_err(|source| SaveError::Metadata {
            path: path.clone(),
            source,
        })?;
        self.write_atomic(&path, &json)
    }

    /// Writes `bytes` next to `path` and renames the result over it.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), SaveError> {
        let id = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(format!(".{}.tmp", id));
        let temp_path = PathBuf::from(temp_name);

        let result = (|| -> io::Result<()> {
            {
                let mut file = File::create(&temp_path)?;
                file.write_all(bytes)?;
                file.sync_all()?;
            }
            fs::rename(&temp_path, path)
        })();

        result.map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            SaveError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, SaveError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SaveError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
