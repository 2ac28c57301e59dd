//! # World Settings
//!
//! Configuration for the streaming engine, loaded from a JSON file. Every field
//! has a default, so a settings file only needs the values it changes:
//!
//! ```json
//! { "render_distance": 6, "save_folder": "saves", "world_name": "test_world" }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Largest accepted `render_distance`, in chunks.
pub const MAX_RENDER_DISTANCE: u32 = 64;
/// Largest accepted `eviction_margin`, in chunks.
pub const MAX_EVICTION_MARGIN: u32 = 16;

/// Tunables of a `World`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Radius of the resident window, in chunks
    pub render_distance: u32,
    /// Extra chunks kept beyond the render distance before eviction
    pub eviction_margin: u32,
    /// Parent folder of all world saves; `None` keeps the world in memory only
    pub save_folder: Option<PathBuf>,
    /// Name of this world's folder inside `save_folder`
    pub world_name: String,
    /// Seed for a world without stored metadata; drawn at random when absent
    pub seed: Option<u32>,
    /// Wipe any existing save of this world before opening it
    pub new_world: bool,
    /// How long `wait_for_generation` may block, in milliseconds
    pub generation_timeout_ms: u64,
    /// Number of evicted chunks kept in memory for quick reloads
    pub evicted_cache_capacity: usize,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            render_distance: 4,
            eviction_margin: 1,
            save_folder: None,
            world_name: "world".to_string(),
            seed: None,
            new_world: false,
            generation_timeout_ms: 30_000,
            evicted_cache_capacity: 64,
        }
    }
}

impl WorldSettings {
    /// Reads settings from a JSON file.
    ///
    /// # Errors
    /// Fails if the file cannot be read, is not valid settings JSON, or asks
    /// for a window larger than `MAX_RENDER_DISTANCE` / `MAX_EVICTION_MARGIN`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: WorldSettings =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let limits = [
            ("render_distance", settings.render_distance, MAX_RENDER_DISTANCE),
            ("eviction_margin", settings.eviction_margin, MAX_EVICTION_MARGIN),
        ];
        for (field, value, max) in limits {
            if value > max {
                return Err(ConfigError::OutOfRange {
                    path: path.to_path_buf(),
                    field,
                    value: u64::from(value),
                    max: u64::from(max),
                });
            }
        }
        Ok(settings)
    }

    /// Folder holding this world's files, if the world is persisted.
    pub fn world_folder(&self) -> Option<PathBuf> {
        self.save_folder
            .as_ref()
            .map(|folder| folder.join(&self.world_name))
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "render_distance": 7, "world_name": "test_world" }"#).unwrap();

        let settings = WorldSettings::load(&path).expect("valid settings");
        assert_eq!(settings.render_distance, 7);
        assert_eq!(settings.world_name, "test_world");
        assert_eq!(settings.eviction_margin, 1);
        assert_eq!(settings.save_folder, None);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ render_distance: ").unwrap();
        assert!(matches!(
            WorldSettings::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn huge_render_distance_is_rejected() {
        let dir = tempfile::TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "render_distance": 4294967295 }"#).unwrap();
        assert!(matches!(
            WorldSettings::load(&path),
            Err(ConfigError::OutOfRange {
                field: "render_distance",
                ..
            })
        ));

        std::fs::write(&path, r#"{ "eviction_margin": 17 }"#).unwrap();
        assert!(matches!(
            WorldSettings::load(&path),
            Err(ConfigError::OutOfRange {
                field: "eviction_margin",
                ..
            })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            WorldSettings::load("/definitely/not/here.json"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn world_folder_joins_name() {
        let settings = WorldSettings {
            save_folder: Some(PathBuf::from("saves")),
            world_name: "alpha".to_string(),
            ..WorldSettings::default()
        };
        assert_eq!(settings.world_folder(), Some(PathBuf::from("saves/alpha")));
    }
}
