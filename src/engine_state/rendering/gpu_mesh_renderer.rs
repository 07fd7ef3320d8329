//! # GPU Mesh Renderer
//!
//! `MeshRenderer` backed by `wgpu` buffers. Every mesh owns one vertex buffer and one
//! index buffer, created with their contents in a single call and destroyed when the
//! mesh is released.
//!
//! Allocation failures are caught with error scopes around the buffer creation, so a
//! failed upload becomes a `RenderError` instead of reaching the device's uncaptured
//! error handler.

use std::collections::HashMap;

use log::{debug, info};
use wgpu::{util::DeviceExt, Buffer, Device};

use super::{validate_mesh, MeshHandle, MeshRenderer, RenderError, Vertex};

/// Buffer memory accounting for one mesh.
#[derive(Debug, Clone, Copy)]
struct MeshAnalytics {
    /// Bytes allocated for the vertex buffer
    vertex_bytes: u64,
    /// Bytes allocated for the index buffer
    index_bytes: u64,
}

/// GPU buffers of one mesh.
struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    analytics: MeshAnalytics,
}

/// Uploads chunk meshes to the GPU.
pub struct GpuMeshRenderer {
    device: Device,
    meshes: HashMap<MeshHandle, GpuMesh>,
    next_id: u64,
}

impl GpuMeshRenderer {
    /// Wraps an existing device.
    pub fn new(device: Device) -> Self {
        Self {
            device,
            meshes: HashMap::new(),
            next_id: 0,
        }
    }

    /// Requests a device without a surface, blocking until the adapter answers.
    ///
    /// # Errors
    /// `RenderError::DeviceUnavailable` if no adapter or device can be obtained
    pub fn request_headless() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::empty(),
            backend_options: wgpu::BackendOptions::from_env_or_default(),
        });

        pollster::block_on(async move {
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::default(),
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|err| RenderError::DeviceUnavailable(err.to_string()))?;

            let (device, _queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    label: Some("Chunk Streaming Device"),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                    trace: wgpu::Trace::Off,
                })
                .await
                .map_err(|err| RenderError::DeviceUnavailable(err.to_string()))?;

            info!("Using GPU adapter {}", adapter.get_info().name);
            Ok(Self::new(device))
        })
    }

    /// Total bytes allocated across all live meshes.
    pub fn total_allocated_memory(&self) -> u64 {
        self.meshes.values().fold(0, |acc, mesh| {
            acc + mesh.analytics.vertex_bytes + mesh.analytics.index_bytes
        })
    }
}

impl MeshRenderer for GpuMeshRenderer {
    fn upload_mesh(
        &mut self,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<MeshHandle, RenderError> {
        validate_mesh(label, vertices, indices)?;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Vertex Buffer")),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Index Buffer")),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            vertex_buffer.destroy();
            index_buffer.destroy();
            return Err(RenderError::UploadFailed {
                label: label.to_string(),
                reason: err.to_string(),
            });
        }

        let analytics = MeshAnalytics {
            vertex_bytes: vertex_buffer.size(),
            index_bytes: index_buffer.size(),
        };
        let handle = MeshHandle(self.next_id);
        self.next_id += 1;
        self.meshes.insert(
            handle,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: indices.len() as u32,
                analytics,
            },
        );

        debug!(
            "Uploaded mesh '{}' ({} bytes)",
            label,
            analytics.vertex_bytes + analytics.index_bytes
        );
        Ok(handle)
    }

    fn release_mesh(&mut self, handle: MeshHandle) -> bool {
        match self.meshes.remove(&handle) {
            Some(mesh) => {
                mesh.vertex_buffer.destroy();
                mesh.index_buffer.destroy();
                true
            }
            None => false,
        }
    }

    fn contains_mesh(&self, handle: MeshHandle) -> bool {
        self.meshes.contains_key(&handle)
    }

    fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}

impl std::fmt::Debug for GpuMeshRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuMeshRenderer")
            .field("meshes", &self.meshes.len())
            .field(
                "indices",
                &self
                    .meshes
                    .values()
                    .map(|mesh| u64::from(mesh.index_count))
                    .sum::<u64>(),
            )
            .field("allocated_bytes", &self.total_allocated_memory())
            .finish()
    }
}
