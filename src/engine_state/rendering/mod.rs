//! Rendering side of chunk streaming.
//!
//! The streamer only needs one thing from a renderer: turning generated vertex and
//! index data into a GPU mesh, and releasing it again. `MeshRenderer` is that seam.
//! Two implementations are provided:
//!
//! * `GpuMeshRenderer` - uploads vertex and index buffers through `wgpu`
//! * `HeadlessRenderer` - keeps a CPU-side record of every mesh, for headless runs
//!   and tests
//!
//! Renderers are main-thread objects. They are only reachable through the
//! `MainThreadContext`, never from worker threads.

use std::collections::HashMap;

use thiserror::Error;

mod gpu_mesh_renderer;
mod vertex;

pub use gpu_mesh_renderer::GpuMeshRenderer;
pub use vertex::Vertex;

/// Identifies a mesh owned by a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(u64);

impl MeshHandle {
    /// Raw id of the handle.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    /// The mesh has no vertices or no indices
    #[error("Mesh '{0}' is empty")]
    EmptyMesh(String),

    /// The index buffer does not describe whole triangles
    #[error("Mesh '{label}' has {count} indices, which is not a multiple of 3")]
    PartialTriangle {
        /// Mesh label
        label: String,
        /// Number of indices supplied
        count: usize,
    },

    /// An index points past the end of the vertex buffer
    #[error("Mesh '{label}' references vertex {index} but only has {vertex_count} vertices")]
    IndexOutOfRange {
        /// Mesh label
        label: String,
        /// Offending index
        index: u32,
        /// Number of vertices supplied
        vertex_count: usize,
    },

    /// No GPU adapter or device could be obtained
    #[error("No GPU device available: {0}")]
    DeviceUnavailable(String),

    /// The backend refused to create the mesh
    #[error("Failed to upload mesh '{label}': {reason}")]
    UploadFailed {
        /// Mesh label
        label: String,
        /// Backend message
        reason: String,
    },
}

/// Main-thread mesh storage used by streamed chunks.
pub trait MeshRenderer {
    /// Creates a mesh from vertex and index data.
    ///
    /// # Arguments
    /// * `label` - Debug label of the mesh
    /// * `vertices` - Vertex data in the `Vertex` layout
    /// * `indices` - Triangle list indices into `vertices`
    ///
    /// # Returns
    /// A handle that stays valid until passed to `release_mesh`
    fn upload_mesh(
        &mut self,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<MeshHandle, RenderError>;

    /// Frees a mesh. Returns `false` if the handle is unknown.
    fn release_mesh(&mut self, handle: MeshHandle) -> bool;

    /// Returns `true` while `handle` refers to a live mesh.
    fn contains_mesh(&self, handle: MeshHandle) -> bool;

    /// Number of live meshes.
    fn mesh_count(&self) -> usize;
}

/// Checks that `indices` form whole triangles over `vertices`.
pub fn validate_mesh(label: &str, vertices: &[Vertex], indices: &[u32]) -> Result<(), RenderError> {
    if vertices.is_empty() || indices.is_empty() {
        return Err(RenderError::EmptyMesh(label.to_string()));
    }
    if indices.len() % 3 != 0 {
        return Err(RenderError::PartialTriangle {
            label: label.to_string(),
            count: indices.len(),
        });
    }
    if let Some(&index) = indices.iter().find(|&&index| index as usize >= vertices.len()) {
        return Err(RenderError::IndexOutOfRange {
            label: label.to_string(),
            index,
            vertex_count: vertices.len(),
        });
    }
    Ok(())
}

/// What a `HeadlessRenderer` remembers about a mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshRecord {
    /// Label passed at upload
    pub label: String,
    /// Number of vertices uploaded
    pub vertex_count: usize,
    /// Number of indices uploaded
    pub index_count: usize,
}

/// A renderer without a GPU.
///
/// Validates and records uploads so streaming can run (and be tested) anywhere.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    meshes: HashMap<MeshHandle, MeshRecord>,
    next_id: u64,
    total_uploads: u64,
}

impl HeadlessRenderer {
    /// Creates a renderer with no meshes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record of a live mesh.
    pub fn mesh(&self, handle: MeshHandle) -> Option<&MeshRecord> {
        self.meshes.get(&handle)
    }

    /// Labels of all live meshes, sorted.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<_> = self.meshes.values().map(|mesh| mesh.label.clone()).collect();
        labels.sort();
        labels
    }

    /// Number of successful uploads over the renderer's lifetime.
    pub fn total_uploads(&self) -> u64 {
        self.total_uploads
    }
}

impl MeshRenderer for HeadlessRenderer {
    fn upload_mesh(
        &mut self,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<MeshHandle, RenderError> {
        validate_mesh(label, vertices, indices)?;

        let handle = MeshHandle(self.next_id);
        self.next_id += 1;
        self.total_uploads += 1;
        self.meshes.insert(
            handle,
            MeshRecord {
                label: label.to_string(),
                vertex_count: vertices.len(),
                index_count: indices.len(),
            },
        );
        Ok(handle)
    }

    fn release_mesh(&mut self, handle: MeshHandle) -> bool {
        self.meshes.remove(&handle).is_some()
    }

    fn contains_mesh(&self, handle: MeshHandle) -> bool {
        self.meshes.contains_key(&handle)
    }

    fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Point3, Vector3};

    fn triangle() -> Vec<Vertex> {
        [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]]
            .into_iter()
            .map(|p| Vertex::new(Point3::from(p), [1.0; 3], Vector3::unit_y(), [0.0; 2]))
            .collect()
    }

    #[test]
    fn headless_upload_and_release() {
        let mut renderer = HeadlessRenderer::new();
        let handle = renderer.upload_mesh("tri", &triangle(), &[0, 1, 2]).unwrap();

        assert!(renderer.contains_mesh(handle));
        assert_eq!(renderer.mesh(handle).unwrap().vertex_count, 3);
        assert_eq!(renderer.labels(), vec!["tri".to_string()]);

        assert!(renderer.release_mesh(handle));
        assert!(!renderer.release_mesh(handle));
        assert_eq!(renderer.mesh_count(), 0);
        assert_eq!(renderer.total_uploads(), 1);
    }

    #[test]
    fn rejects_malformed_meshes() {
        let mut renderer = HeadlessRenderer::new();
        assert!(matches!(
            renderer.upload_mesh("empty", &[], &[]),
            Err(RenderError::EmptyMesh(_))
        ));
        assert!(matches!(
            renderer.upload_mesh("partial", &triangle(), &[0, 1]),
            Err(RenderError::PartialTriangle { count: 2, .. })
        ));
        assert!(matches!(
            renderer.upload_mesh("oob", &triangle(), &[0, 1, 3]),
            Err(RenderError::IndexOutOfRange { index: 3, .. })
        ));
        assert_eq!(renderer.mesh_count(), 0);
    }
}
