//! # Engine State Module
//!
//! The streaming engine: the services constructed once per run and the per-frame loop
//! that drives them.
//!
//! ## Key Components
//!
//! * `EngineState` - Owns every service and runs frames
//! * `MainThreadContext` - Renderer, physics world and object registry; only the
//!   main thread ever holds it
//! * `config` - Streaming configuration and constants
//! * `error` - Error types
//! * `object_registry` - Named scene objects
//! * `observer` - The walking point streaming is centered on
//! * `physics` - Static collision for terrain
//! * `rendering` - Mesh upload
//! * `task_management` - Worker pool and main-thread executor
//! * `voxels` - Chunks, terrain and the world manager
//!
//! ## Frame Structure
//!
//! ```text
//! frame(observer)
//!   world.update(observer)   apply last frame's decisions, dispatch new ones
//!   executor.drain()         run uploads queued by chunk generation
//! ```
//!
//! Everything a worker produces for the main thread passes through the executor, so
//! GPU and physics resources are only touched inside `frame`.

use std::sync::Arc;

use cgmath::Point3;
use log::{info, trace};
use web_time::{Duration, Instant};

use config::StreamingConfig;
use error::Result;
use object_registry::ObjectRegistry;
use physics::{PhysicsWorld, StaticCollisionWorld};
use rendering::{HeadlessRenderer, MeshRenderer};
use task_management::{MainThreadExecutor, WorkerPool};
use voxels::{
    height_field::{HeightField, NoiseHeightField},
    world::{WorldManager, WorldStats},
};

pub mod config;
pub mod error;
pub mod object_registry;
pub mod observer;
pub mod physics;
pub mod rendering;
pub mod task_management;
pub mod voxels;

/// The main-thread executor as used by the engine.
pub type EngineExecutor = MainThreadExecutor<MainThreadContext>;

/// State that only the main thread may touch.
///
/// Executor callbacks and `WorldManager::update` receive it by `&mut`; worker threads
/// never see it.
pub struct MainThreadContext {
    /// Named scene objects, including one per streamed chunk
    pub registry: ObjectRegistry,
    /// Mesh storage
    pub renderer: Box<dyn MeshRenderer>,
    /// Static collision
    pub physics: Box<dyn PhysicsWorld>,
}

impl MainThreadContext {
    /// Bundles main-thread services.
    pub fn new(renderer: Box<dyn MeshRenderer>, physics: Box<dyn PhysicsWorld>) -> Self {
        Self {
            registry: ObjectRegistry::new(),
            renderer,
            physics,
        }
    }

    /// A context with a `HeadlessRenderer` and a `StaticCollisionWorld`.
    pub fn headless() -> Self {
        Self::new(
            Box::new(HeadlessRenderer::new()),
            Box::new(StaticCollisionWorld::new()),
        )
    }
}

impl std::fmt::Debug for MainThreadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThreadContext")
            .field("objects", &self.registry.len())
            .field("meshes", &self.renderer.mesh_count())
            .field("bodies", &self.physics.body_count())
            .finish()
    }
}

/// What one frame did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// ADD actions applied
    pub applied_adds: usize,
    /// REMOVE actions applied
    pub applied_removes: usize,
    /// Stale actions ignored
    pub skipped_actions: usize,
    /// Add decisions sent to the pool
    pub dispatched_adds: usize,
    /// Removal decisions sent to the pool
    pub dispatched_removes: usize,
    /// Executor callbacks run
    pub executed_callbacks: usize,
    /// Chunk containing the observer
    pub observer_chunk: Point3<i32>,
    /// Wall time of the frame
    pub elapsed: Duration,
}

/// The streaming engine.
///
/// # Examples
///
/// ```rust
/// use cgmath::Point3;
/// use voxel_streaming::engine_state::{config::StreamingConfig, EngineState};
///
/// let mut engine = EngineState::headless(StreamingConfig::default()).unwrap();
/// engine.frame(Point3::new(0.0, 0.0, 0.0)).unwrap();
/// engine.shutdown();
/// ```
pub struct EngineState {
    /// Background workers for decisions and terrain generation
    pool: WorkerPool,
    /// Main-thread callback queue
    executor: EngineExecutor,
    /// Chunk map and streaming decisions
    world: WorldManager,
    /// Renderer, physics and registry
    context: MainThreadContext,
    /// Frames run so far
    frame_index: u64,
}

impl EngineState {
    /// Creates the engine with noise terrain from `config`.
    ///
    /// # Errors
    /// Invalid configuration, or a worker thread that fails to start
    pub fn new(config: StreamingConfig, context: MainThreadContext) -> Result<Self> {
        let height_field = Arc::new(NoiseHeightField::new(&config.terrain));
        Self::with_height_field(config, height_field, context)
    }

    /// Creates the engine with a headless context.
    pub fn headless(config: StreamingConfig) -> Result<Self> {
        Self::new(config, MainThreadContext::headless())
    }

    /// Creates the engine with a custom terrain.
    ///
    /// # Arguments
    /// * `config` - Streaming parameters; validated here
    /// * `height_field` - Terrain sampled by chunk generation
    /// * `context` - Main-thread services
    pub fn with_height_field(
        config: StreamingConfig,
        height_field: Arc<dyn HeightField>,
        context: MainThreadContext,
    ) -> Result<Self> {
        config.validate()?;

        let pool = WorkerPool::new(config.worker_threads)?;
        let executor = EngineExecutor::new();
        info!(
            "Streaming with render distance {} ({} chunks), collision {}",
            config.render_distance,
            config.chunks_in_range(),
            if config.collision_enabled { "on" } else { "off" }
        );
        let world = WorldManager::new(config, height_field, executor.clone());

        Ok(Self {
            pool,
            executor,
            world,
            context,
            frame_index: 0,
        })
    }

    /// Runs one frame for an observer at `observer`.
    ///
    /// # Errors
    /// A mesh or collider creation failure. The frame loop should treat it as fatal;
    /// the callbacks queued behind the failed one are kept for the next drain.
    pub fn frame(&mut self, observer: Point3<f32>) -> Result<FrameStats> {
        let start = Instant::now();

        let update = self.world.update(observer, &self.pool, &mut self.context);
        let executed_callbacks = self.executor.drain(&mut self.context)?;

        self.frame_index += 1;
        let stats = FrameStats {
            applied_adds: update.applied_adds,
            applied_removes: update.applied_removes,
            skipped_actions: update.skipped_actions,
            dispatched_adds: update.dispatched_adds,
            dispatched_removes: update.dispatched_removes,
            executed_callbacks,
            observer_chunk: update.observer_chunk,
            elapsed: start.elapsed(),
        };
        trace!("Frame {}: {:?}", self.frame_index, stats);
        Ok(stats)
    }

    /// Runs frames at a fixed observer position until streaming has converged.
    ///
    /// # Returns
    /// The number of frames run, or `None` if `max_frames` were not enough
    pub fn run_until_settled(&mut self, observer: Point3<f32>, max_frames: usize) -> Result<Option<usize>> {
        for frame in 1..=max_frames {
            self.frame(observer)?;
            if self.is_settled() {
                return Ok(Some(frame));
            }
            // let workers catch up before the next frame reads their decisions
            self.pool.wait_idle(Duration::from_millis(50));
        }
        Ok(None)
    }

    /// Returns `true` when no decision, action, task or upload is outstanding.
    pub fn is_settled(&self) -> bool {
        let stats = self.world.stats();
        stats.requested == 0
            && stats.pending_removal == 0
            && stats.pending_actions == 0
            && self.pool.outstanding() == 0
            && self.executor.is_empty()
    }

    /// The world manager.
    pub fn world(&self) -> &WorldManager {
        &self.world
    }

    /// Counts of mapped coordinates by status.
    pub fn world_stats(&self) -> WorldStats {
        self.world.stats()
    }

    /// The main-thread services.
    pub fn context(&self) -> &MainThreadContext {
        &self.context
    }

    /// The main-thread executor.
    pub fn executor(&self) -> &EngineExecutor {
        &self.executor
    }

    /// The worker pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Frames run so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Stops and joins the worker pool. Frames run afterwards no longer dispatch
    /// decisions.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }
}
