//! Error types for the world streaming engine

use std::io;
use std::path::PathBuf;

use cgmath::Point3;
use thiserror::Error;

use super::voxels::chunk::{BlockDataError, ChunkCoord, ChunkState};

/// Errors returned by `World` operations.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("chunk {0} is not loaded")]
    ChunkNotLoaded(ChunkCoord),

    #[error("block position {0:?} is outside the world")]
    OutOfBounds(Point3<i32>),

    #[error("chunk {coord} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        coord: ChunkCoord,
        from: ChunkState,
        to: ChunkState,
    },

    #[error("update thread is already running")]
    WorkerAlreadyRunning,

    #[error("update thread is not running")]
    WorkerNotRunning,

    #[error("timed out waiting for {wanted} ready chunks ({ready} ready)")]
    GenerationTimeout { wanted: usize, ready: usize },

    #[error("failed to spawn update thread: {0}")]
    WorkerSpawn(#[source] io::Error),

    #[error("update thread could not be joined")]
    WorkerShutdownFailure,

    #[error("Save error: {0}")]
    Save(#[from] SaveError),
}

/// Errors raised by the on-disk world store.
///
/// A `Read` or `Corrupt` error on a chunk load is never fatal: the chunk is
/// generated procedurally instead. A `Write` error leaves the previously
/// committed file untouched.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt chunk file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: BlockDataError,
    },

    #[error("player record {path} has {found} bytes")]
    CorruptPlayer { path: PathBuf, found: usize },

    #[error("invalid world metadata {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while loading `WorldSettings`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid settings {path}: {field} is {value}, at most {max} is supported")]
    OutOfRange {
        path: PathBuf,
        field: &'static str,
        value: u64,
        max: u64,
    },
}
