#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Streaming
//!
//! Terrain streaming core of a voxel engine: chunks of height-field terrain are
//! generated, loaded and unloaded around a moving observer.
//!
//! Generation runs on a background worker pool. Everything that touches GPU or
//! physics resources is handed back to the thread that owns them through a
//! cancelable main-thread executor, and changes to the set of chunks are buffered as
//! pending actions that the main thread applies once per frame.
//!
//! ## Key Modules
//!
//! * `core` - Shared-state primitives used throughout the engine
//! * `engine_state` - The engine: world manager, chunks, task management, rendering
//!   and physics seams
//!
//! ## Usage
//!
//! ```rust
//! use cgmath::Point3;
//! use voxel_streaming::engine_state::{config::StreamingConfig, EngineState};
//!
//! let mut engine = EngineState::headless(StreamingConfig::default()).unwrap();
//! let frames = engine.run_until_settled(Point3::new(0.0, 0.0, 0.0), 500).unwrap();
//! assert!(frames.is_some());
//! assert_eq!(engine.world().active_coordinates().len(), 25);
//! engine.shutdown();
//! ```
//!
//! The `voxel-streaming` binary runs the same engine headlessly with a wandering
//! observer; see `run()`.

use std::path::PathBuf;

use cgmath::{Point3, Rad};
use log::{info, warn};
use web_time::{Duration, Instant};

use engine_state::{
    config::StreamingConfig,
    error::Result,
    observer::Observer,
    physics::{PhysicsWorld, StaticCollisionWorld},
    rendering::{GpuMeshRenderer, HeadlessRenderer, MeshRenderer},
    EngineState, MainThreadContext,
};

pub mod core;
pub mod engine_state;

/// Simulated time step of one demo frame.
const FRAME_TIME: Duration = Duration::from_millis(16);

/// Frames between two progress lines in the demo log.
const REPORT_INTERVAL: usize = 120;

/// Settings of a headless demo run.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoOptions {
    /// JSON configuration file; defaults are used when absent
    pub config_path: Option<PathBuf>,
    /// Number of frames to run
    pub frames: usize,
    /// Seed of the observer's random walk
    pub seed: u64,
    /// Try to obtain a GPU device before falling back to the headless renderer
    pub use_gpu: bool,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            frames: 600,
            seed: 0x5eed,
            use_gpu: true,
        }
    }
}

/// Initializes logging to stdout, filtered by `RUST_LOG`.
pub fn init_logger() {
    let mut log_builder = env_logger::Builder::new();
    // a second initialization (e.g. from tests) keeps the first logger
    let _ = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init();
}

/// Runs the streaming engine headlessly with a wandering observer.
///
/// # Errors
/// Configuration errors, worker start failures, and mesh or collider creation
/// failures during a frame
pub fn run(options: &DemoOptions) -> Result<()> {
    init_logger();
    info!("Logger initialized");

    let config = match &options.config_path {
        Some(path) => StreamingConfig::load(path)?,
        None => StreamingConfig::default(),
    };

    let mut engine = EngineState::new(config, main_thread_context(options.use_gpu))?;
    let mut observer = Observer::default();
    let mut rng = fastrand::Rng::with_seed(options.seed);
    let start = Instant::now();

    for frame in 1..=options.frames {
        observer.wander(&mut rng, Rad(0.05), FRAME_TIME);
        observer.stand_on(
            engine
                .context()
                .physics
                .ground_height(observer.position.x, observer.position.z),
        );

        let stats = engine.frame(observer.position)?;

        if frame % REPORT_INTERVAL == 0 {
            let world = engine.world_stats();
            info!(
                "Frame {}: observer chunk ({}, {}), {} active, {} requested, {} pending removal, {} meshes",
                frame,
                stats.observer_chunk.x,
                stats.observer_chunk.z,
                world.active,
                world.requested,
                world.pending_removal,
                engine.context().renderer.mesh_count()
            );
        }
    }

    let final_position: Point3<f32> = observer.position;
    engine.shutdown();
    info!(
        "Ran {} frames in {:.2?}; observer ended at ({:.1}, {:.1}, {:.1}) with {} chunks active",
        options.frames,
        start.elapsed(),
        final_position.x,
        final_position.y,
        final_position.z,
        engine.world_stats().active
    );
    Ok(())
}

fn main_thread_context(use_gpu: bool) -> MainThreadContext {
    let renderer: Box<dyn MeshRenderer> = if use_gpu {
        match GpuMeshRenderer::request_headless() {
            Ok(renderer) => Box::new(renderer),
            Err(err) => {
                warn!("{}; falling back to the headless renderer", err);
                Box::new(HeadlessRenderer::new())
            }
        }
    } else {
        Box::new(HeadlessRenderer::new())
    };

    MainThreadContext::new(renderer, Box::new(StaticCollisionWorld::new()))
}
