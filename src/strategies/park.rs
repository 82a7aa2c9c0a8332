use super::{GotoOrder, Strategy};
use crate::{
    math::Pose,
    world::{RobotName, WorldSnapshot},
};
use std::{f64::consts::PI, time::Duration};

/// Parks every robot at the center of the field, facing pi, whatever the state.
#[derive(Default)]
pub struct Park;

pub const PARK_POSE: Pose = Pose {
    position: crate::math::Point2 { x: 0., y: 0. },
    orientation: PI,
};

impl Strategy for Park {
    fn plan(&mut self, _world: &WorldSnapshot, _dt: Duration) -> Vec<GotoOrder> {
        RobotName::ALL
            .into_iter()
            .map(|robot| GotoOrder {
                robot,
                target: PARK_POSE,
                wait: false,
            })
            .collect()
    }
}
