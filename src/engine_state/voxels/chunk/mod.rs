//! # Chunk Module
//!
//! A `Chunk` is one `CHUNK_SIZE` square of streamed terrain. It is created on the main
//! thread when an ADD is applied, generates its geometry on a worker, and hands the
//! result back to the main thread for GPU upload and collider creation.
//!
//! ## Lifecycle
//! `Generating` -> `PendingUpload` -> `Active` -> `Removed`
//!
//! A chunk is retired in two steps. When its removal is decided (on any thread),
//! `request_removal` flags it; `release` later frees its resources on the main thread.
//! Work already in flight checks both flags:
//! - a worker that has not finished generating drops its geometry
//! - a queued upload is canceled through the chunk's `CancelToken`
//! - an upload enqueued after the removal was decided, or captured by a running
//!   drain, no-ops on the flags, or on the failed weak upgrade once the chunk has
//!   been dropped
//!
//! ## Ownership
//! The object registry holds the only strong reference (as a component of the chunk's
//! `GameObject`). The world map, worker tasks and queued uploads hold `Weak`s.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use cgmath::Point3;
use log::{debug, error};
use parking_lot::Mutex;

use crate::engine_state::{
    error::Result,
    physics::{BodyHandle, PhysicsWorld, TriangleMeshShape},
    rendering::{MeshHandle, MeshRenderer},
    task_management::CancelToken,
    voxels::{
        coordinates::{chunk_object_name, chunk_to_world, ChunkCoordinate},
        height_field::HeightField,
    },
    EngineExecutor, MainThreadContext,
};

mod chunk_geometry;

pub use chunk_geometry::ChunkGeometry;

/// Where a chunk is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkStage {
    /// Created; geometry is being generated (or waits for a worker)
    Generating,
    /// Geometry is done and its upload is queued on the main thread
    PendingUpload,
    /// Mesh (and collider) exist
    Active,
    /// Released; owns no resources and never will again
    Removed,
}

#[derive(Debug, Default)]
struct ChunkResources {
    mesh: Option<MeshHandle>,
    body: Option<BodyHandle>,
}

/// A streamed terrain chunk.
#[derive(Debug)]
pub struct Chunk {
    coordinate: ChunkCoordinate,
    token: CancelToken,
    removal_requested: AtomicBool,
    removed: AtomicBool,
    stage: Mutex<ChunkStage>,
    resources: Mutex<ChunkResources>,
}

impl Chunk {
    /// Creates a chunk awaiting generation.
    ///
    /// # Arguments
    /// * `coordinate` - Chunk grid coordinate
    /// * `token` - Token unique to this chunk instance; tags its main-thread work
    pub fn new(coordinate: ChunkCoordinate, token: CancelToken) -> Self {
        Self {
            coordinate,
            token,
            removal_requested: AtomicBool::new(false),
            removed: AtomicBool::new(false),
            stage: Mutex::new(ChunkStage::Generating),
            resources: Mutex::new(ChunkResources::default()),
        }
    }

    /// Generates the chunk's geometry and queues its upload on `executor`.
    ///
    /// Runs on a worker thread. Does nothing if the chunk's removal was requested, or
    /// the chunk released, before or during generation.
    ///
    /// # Returns
    /// `true` if an upload was queued
    pub fn generate(
        self: &Arc<Self>,
        height_field: &dyn HeightField,
        executor: &EngineExecutor,
        collision: bool,
    ) -> bool {
        if self.is_retired() {
            return false;
        }

        let geometry = ChunkGeometry::generate(self.coordinate, height_field);

        {
            // the stage lock orders this check against `release`
            let mut stage = self.stage.lock();
            if self.is_retired() {
                debug!("{} retired during generation, dropping geometry", self.name());
                return false;
            }
            *stage = ChunkStage::PendingUpload;
        }

        let chunk = Arc::downgrade(self);
        executor.enqueue(self.token, move |context| match chunk.upgrade() {
            Some(chunk) => chunk.upload(context, &geometry, collision),
            None => Ok(()),
        });
        true
    }

    /// Creates the chunk's mesh and, if `collision` is set, its static collider.
    ///
    /// Runs on the main thread. A chunk whose removal was requested is skipped.
    ///
    /// # Errors
    /// Renderer or physics failures. Nothing created by this call survives an error.
    pub fn upload(
        &self,
        context: &mut MainThreadContext,
        geometry: &ChunkGeometry,
        collision: bool,
    ) -> Result<()> {
        if self.is_retired() {
            debug!("Skipping upload of retired {}", self.name());
            return Ok(());
        }

        let name = self.name();
        let mesh = context
            .renderer
            .upload_mesh(&name, &geometry.vertices, &geometry.indices)?;

        let body = if collision {
            let body = TriangleMeshShape::from_geometry(geometry.positions(), &geometry.indices)
                .and_then(|shape| context.physics.add_static_mesh(&name, shape, self.origin()));
            match body {
                Ok(body) => Some(body),
                Err(err) => {
                    error!("Failed to create collider for {}: {}", name, err);
                    context.renderer.release_mesh(mesh);
                    return Err(err.into());
                }
            }
        } else {
            None
        };

        *self.resources.lock() = ChunkResources {
            mesh: Some(mesh),
            body,
        };
        *self.stage.lock() = ChunkStage::Active;
        debug!("{} active", name);
        Ok(())
    }

    /// Marks the chunk removed and frees its mesh and collider.
    ///
    /// Runs on the main thread. Calling it again is a no-op.
    pub fn release(&self, context: &mut MainThreadContext) {
        {
            let mut stage = self.stage.lock();
            self.removed.store(true, Ordering::Release);
            *stage = ChunkStage::Removed;
        }

        let resources = std::mem::take(&mut *self.resources.lock());
        if let Some(mesh) = resources.mesh {
            context.renderer.release_mesh(mesh);
        }
        if let Some(body) = resources.body {
            context.physics.remove_body(body);
        }
    }

    /// Chunk grid coordinate.
    pub fn coordinate(&self) -> ChunkCoordinate {
        self.coordinate
    }

    /// World-space origin (minimum corner).
    pub fn origin(&self) -> Point3<f32> {
        chunk_to_world(self.coordinate)
    }

    /// Token tagging this chunk's main-thread work.
    pub fn token(&self) -> CancelToken {
        self.token
    }

    /// Name of the chunk's registry object.
    pub fn name(&self) -> String {
        chunk_object_name(self.coordinate)
    }

    /// Current lifecycle stage.
    pub fn stage(&self) -> ChunkStage {
        *self.stage.lock()
    }

    /// Flags the chunk for removal. Callable from any thread; the resources are
    /// freed by the following `release`.
    pub fn request_removal(&self) {
        self.removal_requested.store(true, Ordering::Release);
    }

    /// Returns `true` once the chunk's removal was requested.
    pub fn is_removal_requested(&self) -> bool {
        self.removal_requested.load(Ordering::Acquire)
    }

    /// Returns `true` once `release` has been called.
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    fn is_retired(&self) -> bool {
        self.is_removal_requested() || self.is_removed()
    }

    /// Mesh handle, once uploaded.
    pub fn mesh(&self) -> Option<MeshHandle> {
        self.resources.lock().mesh
    }

    /// Collider handle, once uploaded with collision enabled.
    pub fn body(&self) -> Option<BodyHandle> {
        self.resources.lock().body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::engine_state::task_management::MainThreadExecutor;

    fn flat(_: f32, _: f32) -> f32 {
        2.0
    }

    #[test]
    fn generate_then_drain_uploads_mesh_and_collider() {
        let executor = MainThreadExecutor::new();
        let mut context = MainThreadContext::headless();
        let chunk = Arc::new(Chunk::new(Point3::new(1, 0, -1), CancelToken::new(1)));

        assert!(chunk.generate(&flat, &executor, true));
        assert_eq!(chunk.stage(), ChunkStage::PendingUpload);
        assert_eq!(executor.len(), 1);

        executor.drain(&mut context).unwrap();
        assert_eq!(chunk.stage(), ChunkStage::Active);
        assert!(context.renderer.contains_mesh(chunk.mesh().unwrap()));
        assert!(context.physics.contains_body(chunk.body().unwrap()));
        assert_relative_eq!(
            context.physics.ground_height(40.0, -20.0).unwrap(),
            2.0,
            epsilon = 1e-5
        );
    }

    #[test]
    fn collision_can_be_disabled() {
        let executor = MainThreadExecutor::new();
        let mut context = MainThreadContext::headless();
        let chunk = Arc::new(Chunk::new(Point3::new(0, 0, 0), CancelToken::new(1)));

        chunk.generate(&flat, &executor, false);
        executor.drain(&mut context).unwrap();
        assert!(chunk.mesh().is_some());
        assert!(chunk.body().is_none());
        assert_eq!(context.physics.body_count(), 0);
    }

    #[test]
    fn release_before_drain_leaves_nothing_behind() {
        let executor = MainThreadExecutor::new();
        let mut context = MainThreadContext::headless();
        let chunk = Arc::new(Chunk::new(Point3::new(0, 0, 0), CancelToken::new(1)));

        chunk.generate(&flat, &executor, true);
        chunk.release(&mut context);
        executor.drain(&mut context).unwrap();

        assert_eq!(chunk.stage(), ChunkStage::Removed);
        assert_eq!(context.renderer.mesh_count(), 0);
        assert_eq!(context.physics.body_count(), 0);
    }

    #[test]
    fn dropped_chunk_upload_is_a_no_op() {
        let executor = MainThreadExecutor::new();
        let mut context = MainThreadContext::headless();
        let chunk = Arc::new(Chunk::new(Point3::new(0, 0, 0), CancelToken::new(1)));

        chunk.generate(&flat, &executor, true);
        drop(chunk);
        assert_eq!(executor.drain(&mut context).unwrap(), 1);
        assert_eq!(context.renderer.mesh_count(), 0);
    }

    #[test]
    fn removal_requested_after_generation_skips_upload() {
        let executor = MainThreadExecutor::new();
        let mut context = MainThreadContext::headless();
        let chunk = Arc::new(Chunk::new(Point3::new(0, 0, 0), CancelToken::new(1)));

        assert!(chunk.generate(&flat, &executor, true));
        chunk.request_removal();
        assert_eq!(executor.drain(&mut context).unwrap(), 1);

        assert!(chunk.mesh().is_none());
        assert_eq!(context.renderer.mesh_count(), 0);
        assert_eq!(context.physics.body_count(), 0);
        assert_eq!(chunk.stage(), ChunkStage::PendingUpload);
    }

    #[test]
    fn removal_requested_chunk_does_not_generate() {
        let executor = MainThreadExecutor::new();
        let chunk = Arc::new(Chunk::new(Point3::new(0, 0, 0), CancelToken::new(1)));

        chunk.request_removal();
        assert!(!chunk.generate(&flat, &executor, true));
        assert!(executor.is_empty());
        assert!(!chunk.is_removed());
    }

    #[test]
    fn released_chunk_does_not_generate() {
        let executor = MainThreadExecutor::new();
        let mut context = MainThreadContext::headless();
        let chunk = Arc::new(Chunk::new(Point3::new(0, 0, 0), CancelToken::new(1)));

        chunk.release(&mut context);
        assert!(!chunk.generate(&flat, &executor, true));
        assert!(executor.is_empty());
    }

    #[test]
    fn release_after_upload_frees_resources() {
        let executor = MainThreadExecutor::new();
        let mut context = MainThreadContext::headless();
        let chunk = Arc::new(Chunk::new(Point3::new(3, 0, 3), CancelToken::new(1)));

        chunk.generate(&flat, &executor, true);
        executor.drain(&mut context).unwrap();
        chunk.release(&mut context);
        chunk.release(&mut context);

        assert!(chunk.mesh().is_none());
        assert_eq!(context.renderer.mesh_count(), 0);
        assert_eq!(context.physics.body_count(), 0);
        assert_eq!(chunk.name(), "chunk_3_0_3");
    }
}
