//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask`, scheduled when an ADD is applied.
//! It samples the height field on a worker thread and hands the resulting geometry
//! to the main thread for upload.

use std::sync::{Arc, Weak};

use crate::engine_state::{
    error::TaskError,
    task_management::task::Task,
    voxels::{chunk::Chunk, height_field::HeightField},
    EngineExecutor,
};

/// A task that generates a chunk's geometry asynchronously.
///
/// The task holds the chunk weakly; if the chunk was unloaded before a worker picked
/// the task up, it finishes without doing anything.
pub struct ChunkGenerationTask {
    /// The chunk to generate
    chunk: Weak<Chunk>,
    /// Terrain shared by all generation tasks
    height_field: Arc<dyn HeightField>,
    /// Queue the upload is handed to
    executor: EngineExecutor,
    /// Whether the upload also builds a collider
    collision: bool,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `chunk` - The chunk to generate
    /// * `height_field` - Terrain to sample
    /// * `executor` - Main-thread queue receiving the upload
    /// * `collision` - Whether to build a static collider on upload
    pub fn new(
        chunk: &Arc<Chunk>,
        height_field: Arc<dyn HeightField>,
        executor: EngineExecutor,
        collision: bool,
    ) -> Self {
        ChunkGenerationTask {
            chunk: Arc::downgrade(chunk),
            height_field,
            executor,
            collision,
        }
    }
}

impl Task for ChunkGenerationTask {
    fn process(self: Box<Self>) -> Result<(), TaskError> {
        let Some(chunk) = self.chunk.upgrade() else {
            return Ok(());
        };

        chunk.generate(self.height_field.as_ref(), &self.executor, self.collision);
        Ok(())
    }

    fn name(&self) -> &str {
        "chunk generation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point3;

    use crate::engine_state::{task_management::CancelToken, task_management::MainThreadExecutor};

    fn flat(_: f32, _: f32) -> f32 {
        0.0
    }

    #[test]
    fn queues_upload_for_live_chunk() {
        let executor = MainThreadExecutor::new();
        let chunk = Arc::new(Chunk::new(Point3::new(0, 0, 0), CancelToken::new(4)));
        let task = ChunkGenerationTask::new(&chunk, Arc::new(flat), executor.clone(), true);

        Box::new(task).process().unwrap();
        assert!(executor.is_queued(CancelToken::new(4)));
    }

    #[test]
    fn dropped_chunk_is_skipped() {
        let executor = MainThreadExecutor::new();
        let chunk = Arc::new(Chunk::new(Point3::new(0, 0, 0), CancelToken::new(4)));
        let task = ChunkGenerationTask::new(&chunk, Arc::new(flat), executor.clone(), true);
        drop(chunk);

        Box::new(task).process().unwrap();
        assert!(executor.is_empty());
    }
}
