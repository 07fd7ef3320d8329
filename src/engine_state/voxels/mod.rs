//! # Voxel World Streaming
//!
//! This module contains the streamed terrain: which chunks exist around the observer,
//! how each one is generated, and how its results reach the main thread.
//!
//! ## Architecture
//!
//! * **Coordinates**: Mapping between world positions and the integer chunk grid
//! * **Height Field**: The terrain surface sampled by chunk generation
//! * **Chunk**: One square of terrain and its mesh/collider lifecycle
//! * **World**: The chunk map, pending actions and per-frame streaming decisions
//! * **Tasks**: Worker-pool tasks for chunk generation
//!
//! ## Data Flow
//!
//! 1. `WorldManager::update` applies last frame's decisions, then dispatches add and
//!    remove decisions for the current observer position to the worker pool
//! 2. Applying an ADD creates the chunk and submits a `ChunkGenerationTask`
//! 3. The task samples the height field on a worker and enqueues the upload on the
//!    `MainThreadExecutor`
//! 4. The executor's drain creates the mesh and collider on the main thread
//!
//! ## Thread Safety
//!
//! * Decisions run on workers and only touch the chunk map and pending list
//! * Geometry generation reads the shared, immutable height field
//! * Renderer, physics world and object registry are reached only through the
//!   `MainThreadContext`

pub mod chunk;
pub mod coordinates;
pub mod height_field;
pub mod tasks;
pub mod world;
