//! # World Module
//!
//! This module provides the `WorldManager`, the authority over which chunks exist.
//!
//! ## Architecture
//!
//! The manager keeps one `ChunkRecord` per chunk coordinate that is requested, active
//! or about to be removed. Streaming decisions are made in two phases:
//!
//! 1. **Decide** (any thread): `queue_add_chunk` / `queue_remove_chunk` check and
//!    update the record under the map lock and append a `PendingAction`. These run on
//!    the worker pool, dispatched by `update`.
//! 2. **Apply** (main thread): at the start of the next `update`, pending actions are
//!    applied in submission order. ADD creates and registers the chunk and starts its
//!    generation; REMOVE erases the record, frees GPU and physics resources and
//!    unregisters the chunk object.
//!
//! ## Coordinate States
//!
//! `absent` -> `Requested` -> `Active` -> `PendingRemoval` -> `absent`
//!
//! Every request gets a fresh generation number. Actions carry the generation of the
//! record they were decided against, and an action whose generation no longer matches
//! the record (or whose record is gone) is ignored.
//!
//! ## Locking
//!
//! The chunk map and the pending list have separate locks, always taken in that
//! order. The map lock is never held while GPU or physics resources are touched.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use cgmath::Point3;
use log::{debug, error, trace};

use crate::{
    core::MtResource,
    engine_state::{
        config::{StreamingConfig, STREAMING_LAYER_Y},
        object_registry::GameObject,
        task_management::{CancelToken, WorkerPool},
        voxels::{
            chunk::Chunk,
            coordinates::{chunk_object_name, square_around, within_radius_xz, world_to_chunk, ChunkCoordinate},
            height_field::HeightField,
            tasks::ChunkGenerationTask,
        },
        EngineExecutor, MainThreadContext,
    },
};

/// Streaming status of a mapped coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkStatus {
    /// An ADD is pending; no chunk exists yet
    Requested,
    /// The chunk exists and is generating or uploaded
    Active,
    /// A REMOVE is pending
    PendingRemoval,
}

/// The world's entry for one coordinate.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    chunk: Weak<Chunk>,
    status: ChunkStatus,
    generation: u64,
}

impl ChunkRecord {
    /// The chunk, if it has been created and is still alive.
    pub fn chunk(&self) -> Option<Arc<Chunk>> {
        self.chunk.upgrade()
    }

    /// Streaming status.
    pub fn status(&self) -> ChunkStatus {
        self.status
    }

    /// Generation of the request that created the record.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What a pending action does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingActionKind {
    /// Create the chunk
    Add,
    /// Destroy the chunk
    Remove,
}

/// A streaming decision waiting to be applied on the main thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingAction {
    /// What to do
    pub kind: PendingActionKind,
    /// Where
    pub coordinate: ChunkCoordinate,
    /// Generation of the record the decision was made against
    pub generation: u64,
}

/// Snapshot of the world's bookkeeping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorldStats {
    /// Records waiting for their ADD
    pub requested: usize,
    /// Records with a live chunk
    pub active: usize,
    /// Records waiting for their REMOVE
    pub pending_removal: usize,
    /// Actions not yet applied
    pub pending_actions: usize,
}

impl WorldStats {
    /// Number of mapped coordinates.
    pub fn mapped(&self) -> usize {
        self.requested + self.active + self.pending_removal
    }
}

/// What one `update` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateStats {
    /// ADD actions that created a chunk
    pub applied_adds: usize,
    /// REMOVE actions that destroyed a record
    pub applied_removes: usize,
    /// Actions ignored as stale
    pub skipped_actions: usize,
    /// `queue_add_chunk` calls sent to the pool
    pub dispatched_adds: usize,
    /// `queue_remove_chunk` calls sent to the pool
    pub dispatched_removes: usize,
    /// Chunk containing the observer, on the streaming layer
    pub observer_chunk: ChunkCoordinate,
}

/// Outcome of applying one batch of pending actions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    /// ADD actions that created a chunk
    pub adds: usize,
    /// REMOVE actions that destroyed a record
    pub removes: usize,
    /// Actions ignored as stale
    pub skipped: usize,
}

/// Streams chunks in and out around an observer.
///
/// Cloning yields another handle to the same world; worker tasks hold such clones.
#[derive(Clone)]
pub struct WorldManager {
    config: Arc<StreamingConfig>,
    chunks: MtResource<HashMap<ChunkCoordinate, ChunkRecord>>,
    pending: MtResource<Vec<PendingAction>>,
    next_generation: Arc<AtomicU64>,
    executor: EngineExecutor,
    height_field: Arc<dyn HeightField>,
}

impl WorldManager {
    /// Creates an empty world.
    ///
    /// # Arguments
    /// * `config` - Streaming parameters
    /// * `height_field` - Terrain sampled by chunk generation
    /// * `executor` - Main-thread queue receiving chunk uploads
    pub fn new(
        config: StreamingConfig,
        height_field: Arc<dyn HeightField>,
        executor: EngineExecutor,
    ) -> Self {
        Self {
            config: Arc::new(config),
            chunks: MtResource::new(HashMap::new()),
            pending: MtResource::new(Vec::new()),
            next_generation: Arc::new(AtomicU64::new(1)),
            executor,
            height_field,
        }
    }

    /// Requests the chunk at `coordinate`.
    ///
    /// No-op if the coordinate is mapped in any state. Otherwise a `Requested` record
    /// and a pending ADD are created, atomically with the check.
    ///
    /// # Returns
    /// `true` if an ADD was queued
    pub fn queue_add_chunk(&self, coordinate: ChunkCoordinate) -> bool {
        use std::collections::hash_map::Entry;

        let mut chunks = self.chunks.get_mut();
        let Entry::Vacant(slot) = chunks.entry(coordinate) else {
            return false;
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        slot.insert(ChunkRecord {
            chunk: Weak::new(),
            status: ChunkStatus::Requested,
            generation,
        });
        self.pending.get_mut().push(PendingAction {
            kind: PendingActionKind::Add,
            coordinate,
            generation,
        });
        true
    }

    /// Requests removal of the chunk at `coordinate`.
    ///
    /// No-op if the coordinate is absent or already pending removal. Otherwise the
    /// record is marked `PendingRemoval`, the live chunk is flagged so an upload that
    /// is still being generated never runs, its queued upload is canceled and a
    /// pending REMOVE is created.
    ///
    /// # Returns
    /// `true` if a REMOVE was queued
    pub fn queue_remove_chunk(&self, coordinate: ChunkCoordinate) -> bool {
        let mut chunks = self.chunks.get_mut();
        let Some(record) = chunks.get_mut(&coordinate) else {
            return false;
        };
        if record.status == ChunkStatus::PendingRemoval {
            return false;
        }

        record.status = ChunkStatus::PendingRemoval;
        if let Some(chunk) = record.chunk.upgrade() {
            chunk.request_removal();
        }
        self.executor.cancel(CancelToken::new(record.generation));
        self.pending.get_mut().push(PendingAction {
            kind: PendingActionKind::Remove,
            coordinate,
            generation: record.generation,
        });
        true
    }

    /// Advances streaming by one frame. Main thread only.
    ///
    /// 1. Applies the actions decided since the last update.
    /// 2. Finds the observer's chunk on the streaming layer.
    /// 3. Sends `queue_add_chunk` to the pool for each unmapped coordinate within
    ///    `render_distance`, and `queue_remove_chunk` for each mapped coordinate
    ///    outside it.
    ///
    /// The decisions made in step 3 are applied by the next update.
    pub fn update(
        &self,
        observer: Point3<f32>,
        pool: &WorkerPool,
        context: &mut MainThreadContext,
    ) -> UpdateStats {
        let applied = self.apply_pending_actions(pool, context);

        let mut center = world_to_chunk(observer);
        center.y = STREAMING_LAYER_Y;
        let radius = self.config.render_distance;

        let (to_add, to_remove) = {
            let chunks = self.chunks.get();
            let to_add: Vec<_> = square_around(center, radius, STREAMING_LAYER_Y)
                .filter(|coordinate| !chunks.contains_key(coordinate))
                .collect();
            let to_remove: Vec<_> = chunks
                .iter()
                .filter(|(coordinate, record)| {
                    record.status != ChunkStatus::PendingRemoval
                        && !within_radius_xz(**coordinate, center, radius)
                })
                .map(|(coordinate, _)| *coordinate)
                .collect();
            (to_add, to_remove)
        };

        let mut dispatched_adds = 0;
        for coordinate in to_add {
            let world = self.clone();
            let sent = pool.spawn("queue chunk add", move || {
                world.queue_add_chunk(coordinate);
                Ok(())
            });
            dispatched_adds += sent as usize;
        }

        let mut dispatched_removes = 0;
        for coordinate in to_remove {
            let world = self.clone();
            let sent = pool.spawn("queue chunk removal", move || {
                world.queue_remove_chunk(coordinate);
                Ok(())
            });
            dispatched_removes += sent as usize;
        }

        let stats = UpdateStats {
            applied_adds: applied.adds,
            applied_removes: applied.removes,
            skipped_actions: applied.skipped,
            dispatched_adds,
            dispatched_removes,
            observer_chunk: center,
        };
        trace!("World update: {:?}", stats);
        stats
    }

    /// Applies every pending action in submission order. Main thread only.
    pub fn apply_pending_actions(
        &self,
        pool: &WorkerPool,
        context: &mut MainThreadContext,
    ) -> ApplyStats {
        let actions = self.pending.take();
        let mut stats = ApplyStats::default();

        for action in actions {
            let applied = match action.kind {
                PendingActionKind::Add => self.apply_add(action, pool, context),
                PendingActionKind::Remove => self.apply_remove(action, context),
            };
            match (applied, action.kind) {
                (true, PendingActionKind::Add) => stats.adds += 1,
                (true, PendingActionKind::Remove) => stats.removes += 1,
                (false, _) => stats.skipped += 1,
            }
        }

        stats
    }

    fn is_current(&self, action: &PendingAction, status: ChunkStatus) -> bool {
        self.chunks
            .get()
            .get(&action.coordinate)
            .is_some_and(|record| record.generation == action.generation && record.status == status)
    }

    fn apply_add(
        &self,
        action: PendingAction,
        pool: &WorkerPool,
        context: &mut MainThreadContext,
    ) -> bool {
        if !self.is_current(&action, ChunkStatus::Requested) {
            trace!("Skipping stale add of {:?}", action.coordinate);
            return false;
        }

        let chunk = Arc::new(Chunk::new(action.coordinate, CancelToken::new(action.generation)));
        let name = chunk.name();
        let object = GameObject::new(name.clone(), chunk.origin()).with_component(chunk.clone());

        if let Err(err) = context.registry.register(object) {
            error!("Cannot add {}: {}", name, err);
            let mut chunks = self.chunks.get_mut();
            if chunks
                .get(&action.coordinate)
                .is_some_and(|record| record.generation == action.generation)
            {
                chunks.remove(&action.coordinate);
            }
            return false;
        }

        let status = {
            let mut chunks = self.chunks.get_mut();
            match chunks.get_mut(&action.coordinate) {
                Some(record) if record.generation == action.generation => {
                    record.chunk = Arc::downgrade(&chunk);
                    if record.status == ChunkStatus::Requested {
                        record.status = ChunkStatus::Active;
                    }
                    Some(record.status)
                }
                _ => None,
            }
        };

        debug_assert!(status.is_some(), "record of {name} vanished during its add");
        match status {
            Some(ChunkStatus::Active) => {
                debug!("Added {}", name);
                let task = ChunkGenerationTask::new(
                    &chunk,
                    self.height_field.clone(),
                    self.executor.clone(),
                    self.config.collision_enabled,
                );
                pool.submit(Box::new(task));
                true
            }
            Some(_) => {
                // removal was decided while the chunk was being created; its REMOVE
                // is already queued and will release it
                chunk.request_removal();
                debug!("Added {} with its removal pending", name);
                true
            }
            None => {
                error!("Record of {} vanished during its add", name);
                chunk.release(context);
                context.registry.unregister(&name);
                false
            }
        }
    }

    fn apply_remove(&self, action: PendingAction, context: &mut MainThreadContext) -> bool {
        let record = {
            let mut chunks = self.chunks.get_mut();
            let current = chunks.get(&action.coordinate).is_some_and(|record| {
                record.generation == action.generation && record.status == ChunkStatus::PendingRemoval
            });
            if !current {
                trace!("Skipping stale removal of {:?}", action.coordinate);
                return false;
            }
            chunks.remove(&action.coordinate)
        };

        // an upload may have been queued after the removal was decided
        self.executor.cancel(CancelToken::new(action.generation));

        if let Some(chunk) = record.and_then(|record| record.chunk.upgrade()) {
            chunk.release(context);
        }
        let name = chunk_object_name(action.coordinate);
        context.registry.unregister(&name);
        debug!("Removed {}", name);
        true
    }

    /// Counts of mapped coordinates by status, plus the pending-action backlog.
    pub fn stats(&self) -> WorldStats {
        let chunks = self.chunks.get();
        let mut stats = WorldStats {
            pending_actions: self.pending.get().len(),
            ..WorldStats::default()
        };
        for record in chunks.values() {
            match record.status {
                ChunkStatus::Requested => stats.requested += 1,
                ChunkStatus::Active => stats.active += 1,
                ChunkStatus::PendingRemoval => stats.pending_removal += 1,
            }
        }
        stats
    }

    /// A copy of the record at `coordinate`.
    pub fn record(&self, coordinate: ChunkCoordinate) -> Option<ChunkRecord> {
        self.chunks.get().get(&coordinate).cloned()
    }

    /// The live chunk at `coordinate`.
    pub fn chunk(&self, coordinate: ChunkCoordinate) -> Option<Arc<Chunk>> {
        self.chunks.get().get(&coordinate).and_then(ChunkRecord::chunk)
    }

    /// Every mapped coordinate, sorted by `(x, y, z)`.
    pub fn coordinates(&self) -> Vec<ChunkCoordinate> {
        let mut coordinates: Vec<_> = self.chunks.get().keys().copied().collect();
        coordinates.sort_by_key(|c| (c.x, c.y, c.z));
        coordinates
    }

    /// Coordinates whose status is `Active`, sorted by `(x, y, z)`.
    pub fn active_coordinates(&self) -> Vec<ChunkCoordinate> {
        let mut coordinates: Vec<_> = self
            .chunks
            .get()
            .iter()
            .filter(|(_, record)| record.status == ChunkStatus::Active)
            .map(|(coordinate, _)| *coordinate)
            .collect();
        coordinates.sort_by_key(|c| (c.x, c.y, c.z));
        coordinates
    }

    /// Actions decided but not yet applied, in submission order.
    pub fn pending_actions(&self) -> Vec<PendingAction> {
        self.pending.get().clone()
    }

    /// Streaming parameters.
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }
}

impl std::fmt::Debug for WorldManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldManager")
            .field("stats", &self.stats())
            .finish()
    }
}
