pub mod fake_game_controller;

pub use fake_game_controller::{FakeGameController, ReceivedCommand};
