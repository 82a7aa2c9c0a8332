mod point;
mod vec;

pub use point::Point2;
pub use vec::Vec2;

use serde::{Deserialize, Serialize};
use std::{
    f64::consts::{PI, TAU},
    fmt,
};

/// Wraps an angle (radians) into `[-PI, PI]`.
///
/// ```
/// use rsk_async::math::angle_wrap;
/// use std::f64::consts::PI;
///
/// assert!((angle_wrap(3. * PI / 2.) + PI / 2.).abs() < 1e-9);
/// ```
pub fn angle_wrap(alpha: f64) -> f64 {
    let wrapped = (alpha + PI).rem_euclid(TAU) - PI;
    // rem_euclid maps PI to -PI, keep the sign of the input
    if wrapped == -PI && alpha > 0. {
        PI
    } else {
        wrapped
    }
}

/// A target or measured robot pose: position in meters and orientation in radians.
#[derive(Deserialize, Serialize, PartialEq, Clone, Copy, Debug, Default)]
#[serde(from = "(f64, f64, f64)", into = "(f64, f64, f64)")]
pub struct Pose {
    pub position: Point2,
    pub orientation: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, orientation: f64) -> Self {
        Self {
            position: Point2::new(x, y),
            orientation,
        }
    }

    /// Expresses a world position in this pose's frame (x forward, y left).
    pub fn pov(&self, pos: Point2) -> Point2 {
        let local = self.position.to(pos).rotated(-self.orientation);
        Point2::new(local.x, local.y)
    }
}

impl From<(f64, f64, f64)> for Pose {
    fn from((x, y, orientation): (f64, f64, f64)) -> Self {
        Self::new(x, y, orientation)
    }
}

impl From<Pose> for (f64, f64, f64) {
    fn from(p: Pose) -> Self {
        (p.position.x, p.position.y, p.orientation)
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.3}, {:.3}, {:.3})",
            self.position.x, self.position.y, self.orientation
        )
    }
}
