//! # Observer
//!
//! The point streaming is centered on. An observer has a position and a heading
//! (yaw around +y) and walks forward at a fixed speed; `wander` lets it turn by a
//! random amount each step so long unattended runs cross many chunk borders.
//!
//! ## Coordinate System
//! - X is right, Y is up, Z is forward at zero yaw

use cgmath::{Angle, Point3, Rad, Vector3};
use web_time::Duration;

/// Height of the observer's eye above the ground it stands on.
pub const EYE_HEIGHT: f32 = 1.7;

/// A walking observer.
#[derive(Debug, Clone, PartialEq)]
pub struct Observer {
    /// Position in world space
    pub position: Point3<f32>,
    /// Heading around the Y axis in radians; zero looks down +Z
    pub yaw: Rad<f32>,
    /// Walking speed in world units per second
    pub speed: f32,
}

impl Observer {
    /// Creates an observer.
    ///
    /// # Arguments
    /// * `position` - Initial position, anything convertible to `Point3<f32>`
    /// * `yaw` - Initial heading, anything convertible to `Rad<f32>`
    /// * `speed` - Walking speed in world units per second
    pub fn new<V: Into<Point3<f32>>, Y: Into<Rad<f32>>>(position: V, yaw: Y, speed: f32) -> Self {
        Self {
            position: position.into(),
            yaw: yaw.into(),
            speed,
        }
    }

    /// Unit vector of the heading on the X/Z plane.
    pub fn forward(&self) -> Vector3<f32> {
        let (sin, cos) = self.yaw.sin_cos();
        Vector3::new(sin, 0.0, cos)
    }

    /// Walks forward for `elapsed`.
    pub fn advance(&mut self, elapsed: Duration) {
        self.position += self.forward() * self.speed * elapsed.as_secs_f32();
    }

    /// Turns by a random angle in `[-max_turn, max_turn]`, then walks for `elapsed`.
    pub fn wander(&mut self, rng: &mut fastrand::Rng, max_turn: Rad<f32>, elapsed: Duration) {
        let turn = (rng.f32() * 2.0 - 1.0) * max_turn.0;
        self.yaw = (self.yaw + Rad(turn)).normalize();
        self.advance(elapsed);
    }

    /// Places the eye `EYE_HEIGHT` above `ground`, if there is ground below.
    pub fn stand_on(&mut self, ground: Option<f32>) {
        if let Some(ground) = ground {
            self.position.y = ground + EYE_HEIGHT;
        }
    }
}

impl Default for Observer {
    fn default() -> Self {
        Self::new(Point3::new(0.0, 0.0, 0.0), Rad(0.0), 8.0)
    }
}
