//! # Chunk Coordinates
//!
//! Mapping between world-space positions and integer chunk coordinates. A chunk
//! with coordinate `c` covers the world-space box `[c * CHUNK_SIZE, (c + 1) * CHUNK_SIZE)`
//! on every axis.

use cgmath::{Point3, Vector3};

use crate::engine_state::config::CHUNK_SIZE;

/// Integer coordinate of a chunk in the chunk grid.
pub type ChunkCoordinate = Point3<i32>;

/// Returns the chunk containing the world-space position `position`.
///
/// Each component is `floor(p / CHUNK_SIZE)`, so negative positions map to negative
/// chunks (`-0.5` lies in chunk `-1`).
pub fn world_to_chunk(position: Point3<f32>) -> ChunkCoordinate {
    let size = CHUNK_SIZE as f32;
    Point3::new(
        (position.x / size).floor() as i32,
        (position.y / size).floor() as i32,
        (position.z / size).floor() as i32,
    )
}

/// Returns the world-space origin (minimum corner) of the chunk `coordinate`.
pub fn chunk_to_world(coordinate: ChunkCoordinate) -> Point3<f32> {
    let size = CHUNK_SIZE as f32;
    Point3::new(
        coordinate.x as f32 * size,
        coordinate.y as f32 * size,
        coordinate.z as f32 * size,
    )
}

/// Registry name of the chunk object at `coordinate`.
pub fn chunk_object_name(coordinate: ChunkCoordinate) -> String {
    format!("chunk_{}_{}_{}", coordinate.x, coordinate.y, coordinate.z)
}

/// Returns `true` if `coordinate` is inside the square of radius `radius` around
/// `center` on the x/z plane. The y axis is ignored.
pub fn within_radius_xz(coordinate: ChunkCoordinate, center: ChunkCoordinate, radius: i32) -> bool {
    let offset: Vector3<i32> = coordinate - center;
    offset.x.abs() <= radius && offset.z.abs() <= radius
}

/// All coordinates of the square of radius `radius` around `center` on the layer `y`,
/// in x-major order.
pub fn square_around(center: ChunkCoordinate, radius: i32, y: i32) -> impl Iterator<Item = ChunkCoordinate> {
    (center.x - radius..=center.x + radius).flat_map(move |x| {
        (center.z - radius..=center.z + radius).map(move |z| Point3::new(x, y, z))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn chunk_to_world_round_trips() {
        for x in -4..=4 {
            for y in -2..=2 {
                for z in -4..=4 {
                    let coordinate = Point3::new(x, y, z);
                    assert_eq!(world_to_chunk(chunk_to_world(coordinate)), coordinate);
                }
            }
        }
    }

    #[test]
    fn negative_positions_floor_downwards() {
        assert_eq!(world_to_chunk(Point3::new(-0.5, 0.0, -31.9)), Point3::new(-1, 0, -1));
        assert_eq!(world_to_chunk(Point3::new(-32.0, 0.0, 0.0)), Point3::new(-1, 0, 0));
        assert_eq!(world_to_chunk(Point3::new(-32.01, 0.0, 0.0)), Point3::new(-2, 0, 0));
    }

    #[test]
    fn positions_inside_a_chunk_share_its_coordinate() {
        assert_eq!(world_to_chunk(Point3::new(33.0, 0.0, 0.0)), Point3::new(1, 0, 0));
        assert_eq!(world_to_chunk(Point3::new(31.99, 5.0, 0.0)), Point3::new(0, 0, 0));
        assert_eq!(world_to_chunk(Point3::new(64.0, 0.0, 95.0)), Point3::new(2, 0, 2));
    }

    #[test]
    fn chunk_origin_is_scaled_coordinate() {
        let origin = chunk_to_world(Point3::new(-2, 0, 3));
        assert_relative_eq!(origin.x, -64.0);
        assert_relative_eq!(origin.y, 0.0);
        assert_relative_eq!(origin.z, 96.0);
    }

    #[test]
    fn object_names_are_unique_per_coordinate() {
        assert_eq!(chunk_object_name(Point3::new(-1, 0, 2)), "chunk_-1_0_2");
        assert_ne!(
            chunk_object_name(Point3::new(1, 0, 12)),
            chunk_object_name(Point3::new(11, 0, 2))
        );
    }

    #[test]
    fn square_covers_the_radius() {
        let center = Point3::new(1, 0, 0);
        let square: Vec<_> = square_around(center, 2, 0).collect();
        assert_eq!(square.len(), 25);
        assert!(square.iter().all(|c| within_radius_xz(*c, center, 2)));
        assert!(square.contains(&Point3::new(3, 0, -2)));
        assert!(!within_radius_xz(Point3::new(-2, 0, 0), center, 2));
    }
}
