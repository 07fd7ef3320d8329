//! Static collision for streamed terrain.
//!
//! Chunks only ever add zero-mass triangle-mesh bodies and remove them again, so the
//! physics seam is small: `PhysicsWorld`. `StaticCollisionWorld` implements it on
//! rapier: fixed rigid bodies carrying trimesh colliders, with ground-height queries
//! answered by a downward ray cast through the query pipeline.
//!
//! Like the renderer, the physics world lives on the main thread and is only reached
//! through the `MainThreadContext`.

use std::collections::HashMap;

use cgmath::Point3;
use log::debug;
use rapier3d::prelude as rapier;
use thiserror::Error;

mod triangle_mesh;

pub use triangle_mesh::TriangleMeshShape;

/// Identifies a body in a physics world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(rapier::RigidBodyHandle);

/// Physics system errors
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// A shape needs at least one triangle
    #[error("Collision shape has no triangles")]
    EmptyShape,

    /// The index buffer does not describe whole triangles
    #[error("Collision shape has {0} indices, which is not a multiple of 3")]
    PartialTriangle(usize),

    /// An index points past the end of the vertex list
    #[error("Collision shape references vertex {index} but only has {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index
        index: u32,
        /// Number of vertices supplied
        vertex_count: usize,
    },

    /// The world refused to add the body
    #[error("Failed to create static body '{label}': {reason}")]
    BodyCreationFailed {
        /// Body label
        label: String,
        /// Backend message
        reason: String,
    },
}

/// Main-thread physics world holding static terrain bodies.
pub trait PhysicsWorld {
    /// Adds a zero-mass body with a triangle-mesh collider.
    ///
    /// # Arguments
    /// * `label` - Debug label of the body
    /// * `shape` - Collider in body-local space
    /// * `position` - World-space position of the body origin
    fn add_static_mesh(
        &mut self,
        label: &str,
        shape: TriangleMeshShape,
        position: Point3<f32>,
    ) -> Result<BodyHandle, PhysicsError>;

    /// Removes a body. Returns `false` if the handle is unknown.
    fn remove_body(&mut self, handle: BodyHandle) -> bool;

    /// Returns `true` while `handle` refers to a live body.
    fn contains_body(&self, handle: BodyHandle) -> bool;

    /// Number of live bodies.
    fn body_count(&self) -> usize;

    /// Height of the highest static surface above the world-space point `(x, z)`.
    fn ground_height(&self, x: f32, z: f32) -> Option<f32>;
}

/// Distance the ground ray starts above the highest collider.
const RAY_CLEARANCE: f32 = 1.0;

/// A collision world made only of fixed triangle-mesh bodies.
pub struct StaticCollisionWorld {
    bodies: rapier::RigidBodySet,
    colliders: rapier::ColliderSet,
    islands: rapier::IslandManager,
    impulse_joints: rapier::ImpulseJointSet,
    multibody_joints: rapier::MultibodyJointSet,
    query_pipeline: rapier::QueryPipeline,
    labels: HashMap<BodyHandle, String>,
    /// Lowest and highest world-space y of any collider added so far
    vertical_extent: Option<(f32, f32)>,
}

impl StaticCollisionWorld {
    /// Creates an empty world.
    pub fn new() -> Self {
        Self {
            bodies: rapier::RigidBodySet::new(),
            colliders: rapier::ColliderSet::new(),
            islands: rapier::IslandManager::new(),
            impulse_joints: rapier::ImpulseJointSet::new(),
            multibody_joints: rapier::MultibodyJointSet::new(),
            query_pipeline: rapier::QueryPipeline::new(),
            labels: HashMap::new(),
            vertical_extent: None,
        }
    }

    /// Label and world-space position of a live body.
    pub fn body(&self, handle: BodyHandle) -> Option<(&str, Point3<f32>)> {
        let label = self.labels.get(&handle)?;
        let translation = self.bodies.get(handle.0)?.translation();
        Some((
            label.as_str(),
            Point3::new(translation.x, translation.y, translation.z),
        ))
    }
}

impl Default for StaticCollisionWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld for StaticCollisionWorld {
    fn add_static_mesh(
        &mut self,
        label: &str,
        shape: TriangleMeshShape,
        position: Point3<f32>,
    ) -> Result<BodyHandle, PhysicsError> {
        if !(position.x.is_finite() && position.y.is_finite() && position.z.is_finite()) {
            return Err(PhysicsError::BodyCreationFailed {
                label: label.to_string(),
                reason: format!("non-finite position {position:?}"),
            });
        }

        let (min, max) = shape.bounds();
        let (low, high) = (min.y + position.y, max.y + position.y);
        self.vertical_extent = Some(match self.vertical_extent {
            Some((floor, ceiling)) => (floor.min(low), ceiling.max(high)),
            None => (low, high),
        });

        let body = rapier::RigidBodyBuilder::fixed()
            .translation(rapier::Vector::new(position.x, position.y, position.z));
        let handle = self.bodies.insert(body);
        let collider = rapier::ColliderBuilder::new(shape.into_shared_shape());
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        self.query_pipeline.update(&self.colliders);

        let handle = BodyHandle(handle);
        self.labels.insert(handle, label.to_string());
        Ok(handle)
    }

    fn remove_body(&mut self, handle: BodyHandle) -> bool {
        let removed = self.bodies.remove(
            handle.0,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        if removed.is_none() {
            return false;
        }

        self.query_pipeline.update(&self.colliders);
        if let Some(label) = self.labels.remove(&handle) {
            debug!("Removed static body '{}'", label);
        }
        true
    }

    fn contains_body(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle.0)
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn ground_height(&self, x: f32, z: f32) -> Option<f32> {
        if self.labels.is_empty() {
            return None;
        }
        let (floor, ceiling) = self.vertical_extent?;

        let start = ceiling + RAY_CLEARANCE;
        let ray = rapier::Ray::new(
            rapier::Point::new(x, start, z),
            rapier::Vector::new(0.0, -1.0, 0.0),
        );
        self.query_pipeline
            .cast_ray(
                &self.bodies,
                &self.colliders,
                &ray,
                start - floor + RAY_CLEARANCE,
                true,
                rapier::QueryFilter::new(),
            )
            .map(|(_, toi)| ray.point_at(toi).y)
    }
}

impl std::fmt::Debug for StaticCollisionWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCollisionWorld")
            .field("bodies", &self.bodies.len())
            .field("colliders", &self.colliders.len())
            .finish()
    }
}
