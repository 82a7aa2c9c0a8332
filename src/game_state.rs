//! Game state as published by the game controller on its state socket.
//!
//! Sample packet:
//! ```json
//! {
//!     "markers": {
//!         "green1": { "position": [-0.5, 0.5], "orientation": 0.0 },
//!         "blue1": { "position": [0.5, 0.5], "orientation": 3.14 }
//!     },
//!     "ball": [0.0, 0.0],
//!     "referee": {
//!         "game_is_running": false,
//!         "game_paused": true,
//!         "halftime_is_running": false,
//!         "timer": 0,
//!         "game_state_msg": "Game is ready to start",
//!         "teams": {
//!             "blue": {
//!                 "name": "", "score": 0, "x_positive": false,
//!                 "robots": {
//!                     "1": { "penalized": false, "penalized_remaining": null, "penalized_reason": null,
//!                            "preempted": false, "preemption_reasons": [] }
//!                 }
//!             }
//!         }
//!     },
//!     "leds": { "blue1": [0, 0, 50] },
//!     "simulated": true
//! }
//! ```
//! Every field is optional: a missing marker means the robot isn't currently seen.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::math::Point2;

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Marker {
    pub position: Point2,
    pub orientation: f64,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct RefereeRobot {
    pub penalized: bool,
    pub penalized_remaining: Option<f64>,
    pub penalized_reason: Option<String>,
    pub preempted: bool,
    pub preemption_reasons: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct RefereeTeam {
    pub name: String,
    pub score: u32,
    pub x_positive: bool,
    /// keyed by robot number ("1", "2")
    pub robots: HashMap<String, RefereeRobot>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Referee {
    pub game_is_running: bool,
    pub game_paused: bool,
    pub halftime_is_running: bool,
    pub timer: f64,
    pub game_state_msg: String,
    /// keyed by team color ("blue", "green")
    pub teams: HashMap<String, RefereeTeam>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct GameState {
    /// keyed by robot name ("blue1", "green2", ...)
    pub markers: HashMap<String, Marker>,
    pub ball: Option<Point2>,
    pub referee: Referee,
    pub leds: HashMap<String, [u8; 3]>,
    pub simulated: bool,
}

impl GameState {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn referee_robot(&self, team: &str, number: u8) -> Option<&RefereeRobot> {
        self.referee
            .teams
            .get(team)
            .and_then(|t| t.robots.get(&number.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "markers": {
            "green1": { "position": [-0.5, 0.5], "orientation": 0.0 },
            "green2": { "position": [-0.5, -0.5], "orientation": 0.0 },
            "blue1": { "position": [0.5, 0.5], "orientation": 3.0 },
            "blue2": { "position": [0.5, -0.5], "orientation": 0.0 }
        },
        "ball": [0.1, -0.2],
        "referee": {
            "game_is_running": false,
            "game_paused": true,
            "halftime_is_running": false,
            "timer": 0,
            "game_state_msg": "Game is ready to start",
            "teams": {
                "green": {
                    "name": "", "score": 0, "x_positive": true,
                    "robots": {
                        "1": { "penalized": false, "penalized_remaining": null, "penalized_reason": null, "preempted": false, "preemption_reasons": [] },
                        "2": { "penalized": true, "penalized_remaining": 4, "penalized_reason": "abusive_attack", "preempted": true, "preemption_reasons": ["penalized"] }
                    }
                },
                "blue": {
                    "name": "", "score": 2, "x_positive": false,
                    "robots": {}
                }
            },
            "referee_history_sliced": [[0, -9263, "neutral", "Sideline crossed"]]
        },
        "leds": {
            "green1": [0, 50, 0],
            "blue1": [0, 0, 50]
        },
        "simulated": true
    }"#;

    #[test]
    fn decodes_a_full_packet() {
        let gs = GameState::from_slice(SAMPLE.as_bytes()).expect("sample packet should decode");
        assert_eq!(gs.markers.len(), 4);
        assert_eq!(gs.ball, Some(Point2::new(0.1, -0.2)));
        assert_eq!(
            gs.markers["blue1"],
            Marker {
                position: Point2::new(0.5, 0.5),
                orientation: 3.0
            }
        );
        assert_eq!(gs.referee.teams["blue"].score, 2);
        assert_eq!(gs.leds["green1"], [0, 50, 0]);
        assert!(gs.simulated);

        let penalized = gs.referee_robot("green", 2).expect("green2 is listed");
        assert!(penalized.preempted);
        assert_eq!(penalized.penalized_reason.as_deref(), Some("abusive_attack"));
        assert!(gs.referee_robot("blue", 1).is_none());
    }

    #[test]
    fn missing_ball_and_markers_decode_as_absent() {
        let gs = GameState::from_slice(br#"{"ball": null}"#).expect("partial packet should decode");
        assert!(gs.ball.is_none());
        assert!(gs.markers.is_empty());
        assert!(!gs.referee.game_is_running);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(GameState::from_slice(b"not json").is_err());
    }
}
