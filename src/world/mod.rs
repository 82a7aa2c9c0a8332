mod ball;
mod robot;

// EXPORTS
pub use ball::Ball;
pub use robot::{
    goto_step, GotoStep, Robot, RobotName, UnknownRobotName, ARRIVED_ANGLE, ARRIVED_DISTANCE,
};

use crate::{
    game_state::{GameState, Referee},
    math::{Point2, Pose},
    IgnoreMutexErr,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Instant,
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamColor {
    Blue,
    Green,
}

impl TeamColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamColor::Blue => "blue",
            TeamColor::Green => "green",
        }
    }
}

/// Shared view of the field. Cloning is cheap, every clone sees the same state.
#[derive(Clone)]
pub struct World {
    pub ball: Ball, // already has light cloning because internal arcs
    pub robots: BTreeMap<RobotName, Robot>,
    referee: Arc<Mutex<Referee>>,
}

impl Default for World {
    fn default() -> Self {
        World {
            ball: Ball::default(),
            robots: RobotName::ALL
                .into_iter()
                .map(|name| (name, Robot::new(name)))
                .collect(),
            referee: Arc::new(Mutex::new(Referee::default())),
        }
    }
}

/// A plain copy of the world at one instant, handed to strategies.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldSnapshot {
    pub ball: Option<Point2>,
    pub robots: BTreeMap<RobotName, Option<Pose>>,
}

impl World {
    pub fn update_from_packet(&self, packet: &GameState, now: Instant) {
        self.ball.update(packet.ball);
        for (name, robot) in &self.robots {
            if let Some(marker) = packet.markers.get(&name.to_string()) {
                robot.update_from_marker(marker, now);
            }
            if let Some(referee) = packet.referee_robot(name.team.as_str(), name.number) {
                robot.set_referee(referee.clone());
            }
        }
        *self.referee.lock().unwrap_ignore_poison() = packet.referee.clone();
    }

    pub fn robot(&self, name: RobotName) -> &Robot {
        // every RobotName is inserted at construction
        &self.robots[&name]
    }

    pub fn get_referee(&self) -> Referee {
        self.referee.lock().unwrap_ignore_poison().clone()
    }

    /// true once the ball and every robot have been seen
    pub fn is_ready(&self) -> bool {
        self.ball.get_pos().is_some() && self.robots.values().all(Robot::has_position)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            ball: self.ball.get_pos(),
            robots: self
                .robots
                .iter()
                .map(|(name, robot)| (*name, robot.get_pose()))
                .collect(),
        }
    }
}
