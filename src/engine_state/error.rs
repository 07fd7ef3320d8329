//! Error types for the streaming engine.

use std::path::PathBuf;

use thiserror::Error;

use super::physics::PhysicsError;
use super::rendering::RenderError;

/// Errors surfaced by the streaming engine.
#[derive(Debug, Error)]
pub enum StreamingError {
    /// Reading the configuration file failed
    #[error("Failed to read configuration '{path}': {source}")]
    ConfigIo {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for `StreamingConfig`
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The configuration parsed but describes an unusable setup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A worker thread could not be started
    #[error("Failed to spawn worker thread {index}: {source}")]
    WorkerSpawn {
        /// Index of the worker that failed to start
        index: usize,
        /// Underlying OS failure
        #[source]
        source: std::io::Error,
    },

    /// An object with the same name is already registered
    #[error("Object '{0}' is already registered")]
    DuplicateObject(String),

    /// The renderer failed to create a resource
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The physics world failed to create a resource
    #[error(transparent)]
    Physics(#[from] PhysicsError),
}

/// Failure of a single worker-pool task.
///
/// Task failures never leave the worker that ran them: they are logged at the task
/// boundary and the worker moves on to the next task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task reported a failure
    #[error("Task failed: {0}")]
    Failed(String),

    /// The task panicked; the payload message is kept
    #[error("Task panicked: {0}")]
    Panicked(String),
}

/// Result type for streaming operations
pub type Result<T> = std::result::Result<T, StreamingError>;
