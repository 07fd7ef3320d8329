//! # Height Fields
//!
//! Terrain is a height map: a pure function from a world-space `(x, z)` to a surface
//! height. Chunks sample it on worker threads, so implementations must be
//! `Send + Sync` and deterministic.
//!
//! `NoiseHeightField` is the default terrain: fractal Perlin noise where each octave
//! doubles the frequency and scales the amplitude by the persistence.

use cgmath::{InnerSpace, Vector3};
use noise::{NoiseFn, Perlin};

use crate::engine_state::config::TerrainConfig;

/// Height and surface normal at a point of a height field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightSample {
    /// Surface height at the sampled point
    pub height: f32,
    /// Unit surface normal, pointing upwards
    pub normal: Vector3<f32>,
}

/// A terrain surface `y = height(x, z)`.
pub trait HeightField: Send + Sync {
    /// Surface height at the world-space point `(x, z)`.
    fn height(&self, x: f32, z: f32) -> f32;

    /// Height and normal at `(x, z)`; the normal comes from central differences of the
    /// neighbours `step` units away on each axis.
    fn sample(&self, x: f32, z: f32, step: f32) -> HeightSample {
        let left = self.height(x - step, z);
        let right = self.height(x + step, z);
        let down = self.height(x, z - step);
        let up = self.height(x, z + step);

        HeightSample {
            height: self.height(x, z),
            normal: central_difference_normal(left, right, down, up, step),
        }
    }
}

impl<F> HeightField for F
where
    F: Fn(f32, f32) -> f32 + Send + Sync,
{
    fn height(&self, x: f32, z: f32) -> f32 {
        self(x, z)
    }
}

/// Normal of a height map from the heights of its four axis neighbours.
///
/// `left`/`right` are the heights at `x -/+ step`, `down`/`up` at `z -/+ step`.
/// A degenerate input (e.g. non-finite heights) yields the up vector.
pub fn central_difference_normal(left: f32, right: f32, down: f32, up: f32, step: f32) -> Vector3<f32> {
    let normal = Vector3::new(left - right, 2.0 * step, down - up);
    let length = normal.magnitude();
    if length.is_finite() && length > f32::EPSILON {
        normal / length
    } else {
        Vector3::unit_y()
    }
}

/// Fractal Perlin terrain.
#[derive(Debug, Clone)]
pub struct NoiseHeightField {
    perlin: Perlin,
    octaves: u32,
    persistence: f64,
    base_frequency: f64,
    amplitude: f64,
}

impl NoiseHeightField {
    /// Builds the height field described by `config`.
    pub fn new(config: &TerrainConfig) -> Self {
        Self {
            perlin: Perlin::new(config.seed),
            octaves: config.octaves,
            persistence: config.persistence,
            base_frequency: config.base_frequency,
            amplitude: config.amplitude,
        }
    }

    fn fractal(&self, x: f64, z: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.base_frequency;
        let mut amplitude = 1.0;

        for _ in 0..self.octaves {
            total += self.perlin.get([x * frequency, z * frequency]) * amplitude;
            frequency *= 2.0;
            amplitude *= self.persistence;
        }

        total
    }
}

impl Default for NoiseHeightField {
    fn default() -> Self {
        Self::new(&TerrainConfig::default())
    }
}

impl HeightField for NoiseHeightField {
    fn height(&self, x: f32, z: f32) -> f32 {
        (self.fractal(x as f64, z as f64) * self.amplitude) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn flat_field_points_straight_up() {
        let flat = |_: f32, _: f32| 4.0f32;
        let sample = flat.sample(10.0, -3.0, 1.0);
        assert_relative_eq!(sample.height, 4.0);
        assert_relative_eq!(sample.normal.x, 0.0);
        assert_relative_eq!(sample.normal.y, 1.0);
        assert_relative_eq!(sample.normal.z, 0.0);
    }

    #[test]
    fn slope_tilts_normal_away_from_the_rise() {
        // height rises by one unit per unit of x
        let ramp = |x: f32, _: f32| x;
        let sample = ramp.sample(0.0, 0.0, 1.0);
        let expected = Vector3::new(-2.0f32, 2.0, 0.0).normalize();
        assert_relative_eq!(sample.normal.x, expected.x, epsilon = 1e-6);
        assert_relative_eq!(sample.normal.y, expected.y, epsilon = 1e-6);
        assert_relative_eq!(sample.normal.z, 0.0);
    }

    #[test]
    fn degenerate_normal_falls_back_to_up() {
        let normal = central_difference_normal(f32::NAN, 0.0, 0.0, 0.0, 1.0);
        assert_eq!(normal, Vector3::unit_y());
    }

    #[test]
    fn noise_field_is_deterministic_and_bounded() {
        let config = TerrainConfig::default();
        let a = NoiseHeightField::new(&config);
        let b = NoiseHeightField::new(&config);

        // octave amplitudes sum to 1.875; leave headroom for Perlin overshoot
        let bound = (2.0 * config.amplitude) as f32;
        for i in 0..200 {
            let x = i as f32 * 1.37 - 120.0;
            let z = i as f32 * -0.91 + 40.0;
            let height = a.height(x, z);
            assert_eq!(height, b.height(x, z));
            assert!(height.abs() <= bound, "height {height} out of bounds at ({x}, {z})");
        }
    }

    #[test]
    fn seeds_change_the_terrain() {
        let mut config = TerrainConfig::default();
        let a = NoiseHeightField::new(&config);
        config.seed = 1234;
        let b = NoiseHeightField::new(&config);

        let differs = (0..64).any(|i| {
            let x = i as f32 * 3.3 + 0.5;
            a.height(x, x * 0.7) != b.height(x, x * 0.7)
        });
        assert!(differs);
    }
}
