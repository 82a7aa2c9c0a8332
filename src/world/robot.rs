use crate::{
    game_state::{Marker, RefereeRobot},
    math::{angle_wrap, Point2, Pose},
    net::control_requester::Command,
    IgnoreMutexErr,
};
use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use super::TeamColor;

/// distance under which a goto is considered arrived (meters)
pub const ARRIVED_DISTANCE: f64 = 0.05;
/// orientation error under which a goto is considered arrived (radians)
pub const ARRIVED_ANGLE: f64 = 5. * std::f64::consts::PI / 180.;

const GOTO_SPEED: f64 = 1.5;
const GOTO_ANGULAR_SPEED: f64 = 1.5;

/// Identifies one of the four robots, displayed as `blue1`, `green2`, ...
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct RobotName {
    pub team: TeamColor,
    pub number: u8,
}

impl RobotName {
    pub const BLUE1: RobotName = RobotName::new(TeamColor::Blue, 1);
    pub const BLUE2: RobotName = RobotName::new(TeamColor::Blue, 2);
    pub const GREEN1: RobotName = RobotName::new(TeamColor::Green, 1);
    pub const GREEN2: RobotName = RobotName::new(TeamColor::Green, 2);

    pub const ALL: [RobotName; 4] = [Self::BLUE1, Self::BLUE2, Self::GREEN1, Self::GREEN2];

    pub const fn new(team: TeamColor, number: u8) -> Self {
        Self { team, number }
    }
}

impl fmt::Display for RobotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.team.as_str(), self.number)
    }
}

#[derive(Debug, PartialEq)]
pub struct UnknownRobotName(pub String);

impl fmt::Display for UnknownRobotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown robot: {}", self.0)
    }
}

impl std::error::Error for UnknownRobotName {}

impl FromStr for RobotName {
    type Err = UnknownRobotName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RobotName::ALL
            .into_iter()
            .find(|name| name.to_string() == s)
            .ok_or_else(|| UnknownRobotName(s.to_string()))
    }
}

/// One proportional step toward a target pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GotoStep {
    pub command: Command,
    pub arrived: bool,
}

/// Computes the control command bringing a robot at `current` toward `target`.
/// The command is expressed in the robot frame.
pub fn goto_step(current: Pose, target: Pose) -> GotoStep {
    let error = current.pov(target.position);
    let error_orientation = angle_wrap(target.orientation - current.orientation);
    let arrived = Point2::zero().distance_to(error) < ARRIVED_DISTANCE
        && error_orientation.abs() < ARRIVED_ANGLE;
    GotoStep {
        command: Command::Control {
            dx: error.x * GOTO_SPEED,
            dy: error.y * GOTO_SPEED,
            dturn: error_orientation * GOTO_ANGULAR_SPEED,
        },
        arrived,
    }
}

/// Last known state of a robot. Cloning is cheap, clones share the same state.
#[derive(Clone, Debug)]
pub struct Robot {
    name: RobotName,
    pose: Arc<Mutex<Option<Pose>>>,
    last_update: Arc<Mutex<Option<Instant>>>,
    referee: Arc<Mutex<RefereeRobot>>,
}

impl Robot {
    pub fn new(name: RobotName) -> Self {
        Self {
            name,
            pose: Arc::new(Mutex::new(None)),
            last_update: Arc::new(Mutex::new(None)),
            referee: Arc::new(Mutex::new(RefereeRobot::default())),
        }
    }

    pub fn get_name(&self) -> RobotName {
        self.name
    }

    pub fn get_pose(&self) -> Option<Pose> {
        *self.pose.lock().unwrap_ignore_poison()
    }

    pub fn has_position(&self) -> bool {
        self.get_pose().is_some()
    }

    /// origin until the robot has been seen once
    pub fn get_pos(&self) -> Point2 {
        self.get_pose().map(|p| p.position).unwrap_or_default()
    }

    pub fn get_orientation(&self) -> f64 {
        self.get_pose().map(|p| p.orientation).unwrap_or_default()
    }

    /// time elapsed since the robot was last seen
    pub fn age(&self) -> Option<Duration> {
        self.last_update
            .lock()
            .unwrap_ignore_poison()
            .map(|t| t.elapsed())
    }

    pub fn get_referee(&self) -> RefereeRobot {
        self.referee.lock().unwrap_ignore_poison().clone()
    }

    pub fn is_preempted(&self) -> bool {
        self.referee.lock().unwrap_ignore_poison().preempted
    }

    pub fn update_from_marker(&self, marker: &Marker, now: Instant) {
        *self.pose.lock().unwrap_ignore_poison() = Some(Pose {
            position: marker.position,
            orientation: marker.orientation,
        });
        *self.last_update.lock().unwrap_ignore_poison() = Some(now);
    }

    pub fn set_referee(&self, referee: RefereeRobot) {
        *self.referee.lock().unwrap_ignore_poison() = referee;
    }

    /// `None` if the robot hasn't been seen yet
    pub fn goto_step(&self, target: Pose) -> Option<GotoStep> {
        self.get_pose().map(|current| goto_step(current, target))
    }
}
