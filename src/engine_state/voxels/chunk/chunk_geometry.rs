//! # Chunk Geometry
//!
//! Terrain surface of one chunk: a regular grid of `CHUNK_GRID_VERTICES²` vertices
//! spanning the chunk's edge on the x/z plane, lifted by the height field.
//!
//! ## Layout
//! Vertex `(i, j)` sits at local `(i * unit, height, j * unit)` and is stored at index
//! `i + j * CHUNK_GRID_VERTICES`. Every grid cell becomes two triangles,
//! `(top-left, bottom-left, top-right)` and `(top-right, bottom-left, bottom-right)`,
//! which face +y.

use cgmath::Point3;

use crate::engine_state::{
    config::{CHUNK_BASE_COLOR, CHUNK_GRID_VERTICES, CHUNK_SIZE, UV_TILING},
    rendering::Vertex,
    voxels::{
        coordinates::{chunk_to_world, ChunkCoordinate},
        height_field::HeightField,
    },
};

/// Vertex and index buffers generated for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkGeometry {
    /// Grid vertices, positions relative to the chunk origin
    pub vertices: Vec<Vertex>,
    /// Triangle list over `vertices`
    pub indices: Vec<u32>,
}

impl ChunkGeometry {
    /// Samples `height_field` over the chunk at `coordinate`.
    ///
    /// Heights and normals are sampled in world space so neighbouring chunks agree on
    /// their shared edge; positions are stored relative to the chunk origin.
    pub fn generate(coordinate: ChunkCoordinate, height_field: &dyn HeightField) -> Self {
        let grid = CHUNK_GRID_VERTICES;
        let cells = grid - 1;
        let unit = CHUNK_SIZE as f32 / cells as f32;
        let origin = chunk_to_world(coordinate);

        let mut vertices = Vec::with_capacity(grid * grid);
        for j in 0..grid {
            for i in 0..grid {
                let x = i as f32 * unit;
                let z = j as f32 * unit;
                let sample = height_field.sample(origin.x + x, origin.z + z, unit);

                vertices.push(Vertex::new(
                    Point3::new(x, sample.height, z),
                    CHUNK_BASE_COLOR,
                    sample.normal,
                    [
                        i as f32 / cells as f32 * UV_TILING,
                        j as f32 / cells as f32 * UV_TILING,
                    ],
                ));
            }
        }

        let mut indices = Vec::with_capacity(cells * cells * 6);
        for j in 0..cells {
            for i in 0..cells {
                let top_left = (i + j * grid) as u32;
                let top_right = (i + 1 + j * grid) as u32;
                let bottom_left = (i + (j + 1) * grid) as u32;
                let bottom_right = (i + 1 + (j + 1) * grid) as u32;

                indices.extend_from_slice(&[top_left, bottom_left, top_right]);
                indices.extend_from_slice(&[top_right, bottom_left, bottom_right]);
            }
        }

        Self { vertices, indices }
    }

    /// Vertex positions, for building collision shapes.
    pub fn positions(&self) -> impl Iterator<Item = Point3<f32>> + '_ {
        self.vertices.iter().map(Vertex::position)
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::InnerSpace;

    #[test]
    fn grid_has_expected_counts() {
        let geometry = ChunkGeometry::generate(Point3::new(0, 0, 0), &|_: f32, _: f32| 0.0f32);
        assert_eq!(geometry.vertices.len(), 33 * 33);
        assert_eq!(geometry.indices.len(), 32 * 32 * 6);
        assert_eq!(geometry.triangle_count(), 2048);
        assert!(geometry.indices.iter().all(|&index| (index as usize) < geometry.vertices.len()));
    }

    #[test]
    fn vertices_span_the_chunk_with_tiled_uvs() {
        let geometry = ChunkGeometry::generate(Point3::new(0, 0, 0), &|_: f32, _: f32| 1.5f32);
        let first = geometry.vertices[0];
        let last = geometry.vertices[33 * 33 - 1];

        assert_eq!(first.position, [0.0, 1.5, 0.0]);
        assert_eq!(last.position, [32.0, 1.5, 32.0]);
        assert_eq!(first.uv, [0.0, 0.0]);
        assert_eq!(last.uv, [8.0, 8.0]);
        assert_eq!(first.color, CHUNK_BASE_COLOR);
    }

    #[test]
    fn heights_are_sampled_in_world_space() {
        let ramp = |x: f32, z: f32| x + 2.0 * z;
        let geometry = ChunkGeometry::generate(Point3::new(-1, 0, 2), &ramp);

        // vertex (0, 0) sits at world (-32, 64)
        assert_relative_eq!(geometry.vertices[0].position[1], -32.0 + 128.0);
        // vertex (3, 1) sits at world (-29, 65)
        assert_relative_eq!(geometry.vertices[3 + 33].position[1], -29.0 + 130.0);
    }

    #[test]
    fn shared_edges_match_between_neighbours() {
        let wave = |x: f32, z: f32| (x * 0.3).sin() + (z * 0.2).cos();
        let left = ChunkGeometry::generate(Point3::new(0, 0, 0), &wave);
        let right = ChunkGeometry::generate(Point3::new(1, 0, 0), &wave);

        for j in 0..33 {
            let edge_of_left = left.vertices[32 + j * 33];
            let edge_of_right = right.vertices[j * 33];
            assert_relative_eq!(edge_of_left.position[1], edge_of_right.position[1]);
        }
    }

    #[test]
    fn triangles_face_upwards() {
        let geometry = ChunkGeometry::generate(Point3::new(0, 0, 0), &|_: f32, _: f32| 0.0f32);
        for triangle in geometry.indices.chunks_exact(3) {
            let a = geometry.vertices[triangle[0] as usize].position();
            let b = geometry.vertices[triangle[1] as usize].position();
            let c = geometry.vertices[triangle[2] as usize].position();
            let face_normal = (b - a).cross(c - a);
            assert!(face_normal.y > 0.0);
        }
    }

    #[test]
    fn normals_are_unit_length() {
        let wave = |x: f32, z: f32| (x * 0.5).sin() * 3.0 + z * 0.25;
        let geometry = ChunkGeometry::generate(Point3::new(2, 0, -3), &wave);
        for vertex in &geometry.vertices {
            assert_relative_eq!(vertex.normal().magnitude(), 1.0, epsilon = 1e-5);
            assert!(vertex.normal[1] > 0.0);
        }
    }
}
