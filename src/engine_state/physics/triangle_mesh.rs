//! Static triangle-mesh collision shapes.

use cgmath::Point3;
use rapier3d::prelude as rapier;

use super::PhysicsError;

/// A validated triangle soup in the local space of its body, ready to become a
/// rapier trimesh collider.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMeshShape {
    vertices: Vec<rapier::Point<f32>>,
    triangles: Vec<[u32; 3]>,
    min: Point3<f32>,
    max: Point3<f32>,
}

impl TriangleMeshShape {
    /// Builds a shape from points and a triangle-list index buffer; every index triple
    /// becomes one triangle.
    ///
    /// # Errors
    /// Fails if there are no triangles, the index count is not a multiple of three, or
    /// an index is out of range.
    pub fn from_geometry(
        points: impl IntoIterator<Item = Point3<f32>>,
        indices: &[u32],
    ) -> Result<Self, PhysicsError> {
        let points: Vec<Point3<f32>> = points.into_iter().collect();

        if points.is_empty() || indices.is_empty() {
            return Err(PhysicsError::EmptyShape);
        }
        if indices.len() % 3 != 0 {
            return Err(PhysicsError::PartialTriangle(indices.len()));
        }
        if let Some(&index) = indices.iter().find(|&&index| index as usize >= points.len()) {
            return Err(PhysicsError::IndexOutOfRange {
                index,
                vertex_count: points.len(),
            });
        }

        let mut min = points[0];
        let mut max = points[0];
        for point in &points[1..] {
            min = Point3::new(min.x.min(point.x), min.y.min(point.y), min.z.min(point.z));
            max = Point3::new(max.x.max(point.x), max.y.max(point.y), max.z.max(point.z));
        }

        Ok(Self {
            vertices: points
                .iter()
                .map(|p| rapier::Point::new(p.x, p.y, p.z))
                .collect(),
            triangles: indices
                .chunks_exact(3)
                .map(|triangle| [triangle[0], triangle[1], triangle[2]])
                .collect(),
            min,
            max,
        })
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Local-space bounding box as `(min, max)`.
    pub fn bounds(&self) -> (Point3<f32>, Point3<f32>) {
        (self.min, self.max)
    }

    pub(super) fn into_shared_shape(self) -> rapier::SharedShape {
        rapier::SharedShape::trimesh(self.vertices, self.triangles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> TriangleMeshShape {
        // unit quad rising along x
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
        ];
        TriangleMeshShape::from_geometry(points, &[0, 1, 2, 2, 1, 3]).unwrap()
    }

    #[test]
    fn builds_one_triangle_per_index_triple() {
        let shape = ramp();
        assert_eq!(shape.triangle_count(), 2);
        let (min, max) = shape.bounds();
        assert_eq!(min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(max, Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn converts_to_a_trimesh() {
        let shape = ramp().into_shared_shape();
        let trimesh = shape.as_trimesh().unwrap();
        assert_eq!(trimesh.indices().len(), 2);
        assert_eq!(trimesh.vertices().len(), 4);
    }

    #[test]
    fn rejects_bad_geometry() {
        let points = vec![Point3::new(0.0, 0.0, 0.0); 3];
        assert!(matches!(
            TriangleMeshShape::from_geometry(Vec::new(), &[0, 1, 2]),
            Err(PhysicsError::EmptyShape)
        ));
        assert!(matches!(
            TriangleMeshShape::from_geometry(points.clone(), &[0, 1]),
            Err(PhysicsError::PartialTriangle(2))
        ));
        assert!(matches!(
            TriangleMeshShape::from_geometry(points, &[0, 1, 5]),
            Err(PhysicsError::IndexOutOfRange { index: 5, .. })
        ));
    }
}
