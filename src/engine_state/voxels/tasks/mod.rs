//! # Voxel Task System
//!
//! Worker-pool tasks of the streaming world: terrain generation for new chunks.
//! Streaming decisions (`queue_add_chunk` / `queue_remove_chunk`) are dispatched as
//! closures by the world manager itself.

pub mod chunk_generation_task;

pub use chunk_generation_task::ChunkGenerationTask;
