use super::{GotoOrder, Strategy};
use crate::{
    math::Pose,
    world::{RobotName, WorldSnapshot},
};
use std::{f64::consts::PI, time::Duration};

pub const FOLLOW_BALL_ORIENTATION: f64 = PI / 3.;

/// Sends every listed robot onto the ball, always facing the same direction.
pub struct FollowBall {
    robots: Vec<RobotName>,
    orientation: f64,
}

impl Default for FollowBall {
    /// blue1 and green1 facing pi/3
    fn default() -> Self {
        Self::new(vec![RobotName::BLUE1, RobotName::GREEN1])
    }
}

impl FollowBall {
    pub fn new(robots: Vec<RobotName>) -> Self {
        Self {
            robots,
            orientation: FOLLOW_BALL_ORIENTATION,
        }
    }

    pub fn with_orientation(mut self, orientation: f64) -> Self {
        self.orientation = orientation;
        self
    }
}

impl Strategy for FollowBall {
    fn plan(&mut self, world: &WorldSnapshot, _dt: Duration) -> Vec<GotoOrder> {
        let Some(ball) = world.ball else {
            return Vec::new();
        };
        self.robots
            .iter()
            .map(|&robot| GotoOrder {
                robot,
                target: Pose::new(ball.x, ball.y, self.orientation),
                wait: false,
            })
            .collect()
    }

    fn watched_robot(&self) -> RobotName {
        self.robots.first().copied().unwrap_or(RobotName::BLUE1)
    }
}
