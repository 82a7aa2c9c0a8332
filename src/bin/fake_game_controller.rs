use rsk_async::{
    client::{ClientConfig, CONTROL_PORT, STATE_PORT},
    math::{Point2, Pose},
    testing::{fake_game_controller::PUBLISH_PERIOD, FakeGameController},
    world::RobotName,
};
use std::f64::consts::PI;
use tracing::info;

/// Serves a fake game controller on the standard ports with the ball spinning around the
/// center, so the other binaries can run offline.
#[tokio::main]
async fn main() {
    rsk_async::init_logging();
    // both teams accept the key the other binaries read from the environment
    let key = ClientConfig::from_env().key;
    let controller = FakeGameController::start_on([&key, &key], STATE_PORT, CONTROL_PORT)
        .await
        .expect("couldn't start the fake game controller");
    let config = controller.client_config();
    info!(
        "state on port {}, control on port {}",
        config.state_port, config.control_port
    );

    controller.set_robot(RobotName::BLUE1, Pose::new(0.45, 0.3, PI));
    controller.set_robot(RobotName::BLUE2, Pose::new(0.45, -0.3, PI));
    controller.set_robot(RobotName::GREEN1, Pose::new(-0.45, 0.3, 0.));
    controller.set_robot(RobotName::GREEN2, Pose::new(-0.45, -0.3, 0.));

    let start = tokio::time::Instant::now();
    let mut interval = tokio::time::interval(PUBLISH_PERIOD);
    loop {
        interval.tick().await;
        let t = start.elapsed().as_secs_f64() * 0.5;
        controller.set_ball(Some(Point2::new(0.4 * t.cos(), 0.3 * t.sin())));
    }
}
