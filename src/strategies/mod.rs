use crate::{
    math::Pose,
    world::{RobotName, WorldSnapshot},
};
use std::time::Duration;

pub mod follow_ball;
pub mod park;

pub use follow_ball::FollowBall;
pub use park::Park;

/// A goto to be issued to one robot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GotoOrder {
    pub robot: RobotName,
    pub target: Pose,
    pub wait: bool,
}

/// Decides, from what is currently seen, where each robot should go.
/// `dt` is the time elapsed since the previous call.
pub trait Strategy {
    fn plan(&mut self, world: &WorldSnapshot, dt: Duration) -> Vec<GotoOrder>;

    /// robot whose state is printed after each step
    fn watched_robot(&self) -> RobotName {
        RobotName::BLUE1
    }
}
