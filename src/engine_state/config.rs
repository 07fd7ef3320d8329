//! # Streaming Configuration
//!
//! Runtime settings for the world streamer, loadable from JSON. Every field has a
//! default, so a partial file (or `{}`) is a valid configuration.
//!
//! ```rust
//! use voxel_streaming::engine_state::config::StreamingConfig;
//!
//! let config = StreamingConfig::from_json_str(r#"{ "render_distance": 4 }"#).unwrap();
//! assert_eq!(config.render_distance, 4);
//! assert_eq!(config.worker_threads, 3);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{Result, StreamingError};

/// Edge length of a chunk in world units.
pub const CHUNK_SIZE: i32 = 32;
/// Height samples along one edge of a chunk's terrain grid.
pub const CHUNK_GRID_VERTICES: usize = 33;
/// How many times the terrain texture repeats across one chunk.
pub const UV_TILING: f32 = 8.0;
/// Vertex color baked into every terrain vertex.
pub const CHUNK_BASE_COLOR: [f32; 3] = [0.2, 0.8, 0.2];
/// The chunk layer that terrain is streamed on.
pub const STREAMING_LAYER_Y: i32 = 0;

/// Settings for the world streamer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Chebyshev radius, in chunks, of the square kept loaded around the observer
    pub render_distance: i32,
    /// Number of background worker threads
    pub worker_threads: usize,
    /// Whether chunks get a static collision body
    pub collision_enabled: bool,
    /// Terrain height-field parameters
    pub terrain: TerrainConfig,
}

/// Parameters of the fractal noise height field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Noise seed
    pub seed: u32,
    /// Number of summed noise octaves
    pub octaves: u32,
    /// Amplitude multiplier between successive octaves
    pub persistence: f64,
    /// Frequency of the first octave, in cycles per world unit
    pub base_frequency: f64,
    /// Final height scale in world units
    pub amplitude: f64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            render_distance: 2,
            worker_threads: 3,
            collision_enabled: true,
            terrain: TerrainConfig::default(),
        }
    }
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 4,
            persistence: 0.5,
            base_frequency: 0.1,
            amplitude: 3.0,
        }
    }
}

impl StreamingConfig {
    /// Parses and validates a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| StreamingError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded streaming configuration from {}", path.display());
        Ok(config)
    }

    /// Rejects configurations the streamer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.render_distance < 0 {
            return Err(StreamingError::InvalidConfig(format!(
                "render_distance must be non-negative, got {}",
                self.render_distance
            )));
        }
        if self.worker_threads == 0 {
            return Err(StreamingError::InvalidConfig(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.terrain.octaves == 0 {
            return Err(StreamingError::InvalidConfig(
                "terrain.octaves must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of chunks in a fully loaded square around the observer.
    pub fn chunks_in_range(&self) -> usize {
        let side = (2 * self.render_distance + 1) as usize;
        side * side
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = StreamingConfig::from_json_str("{}").unwrap();
        assert_eq!(config, StreamingConfig::default());
        assert_eq!(config.chunks_in_range(), 25);
    }

    #[test]
    fn nested_terrain_fields_are_partial() {
        let config =
            StreamingConfig::from_json_str(r#"{ "terrain": { "seed": 9, "amplitude": 1.5 } }"#)
                .unwrap();
        assert_eq!(config.terrain.seed, 9);
        assert_eq!(config.terrain.amplitude, 1.5);
        assert_eq!(config.terrain.octaves, 4);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = StreamingConfig::from_json_str(r#"{ "worker_threads": 0 }"#).unwrap_err();
        assert!(matches!(err, StreamingError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = StreamingConfig::from_json_str("{ render_distance: }").unwrap_err();
        assert!(matches!(err, StreamingError::ConfigParse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = StreamingConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, StreamingError::ConfigIo { .. }));
    }
}
