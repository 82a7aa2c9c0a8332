use crate::{math::Point2, IgnoreMutexErr};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default)]
pub struct Ball {
    pos: Arc<Mutex<Option<Point2>>>,
}

impl Ball {
    /// last known position, `None` until the ball has been seen once
    pub fn get_pos(&self) -> Option<Point2> {
        *self.pos.lock().unwrap_ignore_poison()
    }

    /// a `None` position means the ball isn't seen anymore, the last known position is kept
    pub fn update(&self, pos: Option<Point2>) {
        if let Some(pos) = pos {
            *self.pos.lock().unwrap_ignore_poison() = Some(pos);
        }
    }
}
