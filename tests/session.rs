use rsk_async::{
    client::{CONTROL_PORT, STATE_PORT},
    launch_control_thread,
    math::{Point2, Pose},
    net::control_requester::{CommandError, CommandOutcome},
    strategies::{FollowBall, Park},
    testing::{FakeGameController, ReceivedCommand},
    world::RobotName,
    Client, ClientConfig, ClientError, Drawings, LoopMode,
};
use std::{f64::consts::PI, time::Duration};

const EPS: f64 = 1e-6;

async fn start_game_controller(keys: [&str; 2]) -> FakeGameController {
    let gc = FakeGameController::start(keys)
        .await
        .expect("fake game controller should start");
    gc.set_all_robots(Pose::new(0., 0., 0.));
    gc.set_ball(Some(Point2::new(1., 2.)));
    gc
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("a free local port")
        .port()
}

fn control_of(command: &ReceivedCommand) -> (f64, f64, f64) {
    command
        .as_control()
        .unwrap_or_else(|| panic!("expected a control command, got {:?}", command))
}

#[tokio::test]
async fn follow_ball_step_commands_blue1_and_green1() {
    let gc = start_game_controller(["", ""]).await;
    gc.set_robot(RobotName::GREEN1, Pose::new(1., 2., PI / 3.));
    let client = Client::connect(gc.client_config())
        .await
        .expect("session should be acquired");

    rsk_async::step(
        &client,
        &mut FollowBall::default(),
        Duration::ZERO,
        &mut Drawings::default(),
    )
    .await
    .expect("step should succeed");

    let commands = gc.received_commands();
    assert_eq!(commands.len(), 2, "{:?}", commands);

    // blue1 sits at the origin facing +x: the ball is straight in its frame
    assert_eq!(commands[0].robot, RobotName::BLUE1);
    let (dx, dy, dturn) = control_of(&commands[0]);
    assert!((dx - 1.5).abs() < EPS);
    assert!((dy - 3.).abs() < EPS);
    assert!((dturn - 1.5 * PI / 3.).abs() < EPS);

    // green1 already is on the ball with the right orientation
    assert_eq!(commands[1].robot, RobotName::GREEN1);
    let (dx, dy, dturn) = control_of(&commands[1]);
    assert!(dx.abs() < EPS && dy.abs() < EPS && dturn.abs() < EPS);
}

#[tokio::test]
async fn acquisition_fails_without_game_controller() {
    let config = ClientConfig::default()
        .with_ports(free_port(), free_port())
        .with_ready_timeout(Some(Duration::from_millis(300)));
    let result = Client::connect(config).await;
    assert!(matches!(
        result,
        Err(ClientError::NotReady(_) | ClientError::Connect(_))
    ));
}

#[tokio::test]
async fn acquisition_waits_for_the_ball() {
    let gc = start_game_controller(["", ""]).await;
    gc.set_ball(None);
    let config = gc
        .client_config()
        .with_ready_timeout(Some(Duration::from_millis(300)));

    let result = Client::connect(config).await;
    assert!(matches!(result, Err(ClientError::NotReady(_))));
    assert!(gc.received_commands().is_empty());
}

#[tokio::test]
async fn commands_to_the_other_team_are_refused() {
    let gc = start_game_controller(["blue-key", "green-key"]).await;
    let client = Client::connect(gc.client_config().with_key("blue-key"))
        .await
        .expect("session should be acquired");

    let outcome = client
        .blue1()
        .control(0.1, 0., 0.)
        .await
        .expect("blue key is valid for blue1");
    assert_eq!(outcome, CommandOutcome::Applied);

    match client.green1().control(0.1, 0., 0.).await {
        Err(ClientError::Command(robot, CommandError::Failed(reason))) => {
            assert_eq!(robot, RobotName::GREEN1);
            assert_eq!(reason, "Bad key for team green");
        }
        other => panic!("expected a bad key failure, got {:?}", other),
    }
}

#[tokio::test]
async fn preempted_robots_do_not_apply_commands() {
    let gc = start_game_controller(["", ""]).await;
    gc.set_preempted(RobotName::BLUE2, Some("penalized"));
    let client = Client::connect(gc.client_config())
        .await
        .expect("session should be acquired");

    assert!(client.blue2().is_preempted());
    assert_eq!(client.blue2().referee().preemption_reasons, vec!["penalized"]);
    assert!(!client.blue1().is_preempted());
    match client.blue2().kick(1.).await {
        Ok(CommandOutcome::NotApplied(reason)) => assert!(reason.contains("preempted")),
        other => panic!("expected the kick not to be applied, got {:?}", other),
    }
    assert!(gc.received_commands().is_empty());
}

#[tokio::test]
async fn blocking_goto_reaches_the_target_and_stops() {
    let gc = start_game_controller(["", ""]).await;
    let client = Client::connect(gc.client_config())
        .await
        .expect("session should be acquired");

    let target = Pose::new(0.3, -0.2, PI / 2.);
    let arrived = tokio::time::timeout(Duration::from_secs(15), client.blue1().goto(target, true))
        .await
        .expect("goto should converge")
        .expect("goto should succeed");
    assert!(arrived);

    let commands = gc.received_commands();
    let last = commands.last().expect("goto sent commands");
    assert_eq!(last.robot, RobotName::BLUE1);
    assert_eq!(control_of(last), (0., 0., 0.));

    let pose = gc.robot_pose(RobotName::BLUE1).expect("blue1 is on the field");
    assert!(pose.position.distance_to(target.position) < 0.07, "{:?}", pose);
    assert!((pose.orientation - target.orientation).abs() < 0.12, "{:?}", pose);
}

#[tokio::test]
async fn non_blocking_goto_fails_for_unseen_robots() {
    let gc = FakeGameController::start(["", ""])
        .await
        .expect("fake game controller should start");
    gc.set_ball(Some(Point2::zero()));
    gc.set_robot(RobotName::BLUE1, Pose::default());
    let client = Client::connect(gc.client_config().with_wait_ready(false))
        .await
        .expect("session should be acquired");

    match client.green2().goto((0., 0., 0.), false).await {
        Err(ClientError::UnknownPosition(robot)) => assert_eq!(robot, RobotName::GREEN2),
        other => panic!("expected an unknown position error, got {:?}", other),
    }
    assert!(gc.received_commands().is_empty());
}

#[tokio::test]
async fn updates_are_paced_by_the_game_controller() {
    let gc = start_game_controller(["", ""]).await;
    let mut client = Client::connect(gc.client_config())
        .await
        .expect("session should be acquired");

    client.next_update().await.expect("first update");
    let before = client.update_count();
    let dt = client.next_update().await.expect("second update");
    assert!(client.update_count() > before);
    assert!(dt < Duration::from_secs(1), "{:?}", dt);
}

#[tokio::test]
async fn on_update_parks_every_robot() {
    let gc = start_game_controller(["", ""]).await;
    let mut client = Client::connect(gc.client_config())
        .await
        .expect("session should be acquired");

    let result =
        tokio::time::timeout(Duration::from_millis(200), client.on_update(&mut Park)).await;
    assert!(result.is_err(), "on_update only returns on error");

    let commands = gc.received_commands();
    for robot in RobotName::ALL {
        let command = commands
            .iter()
            .find(|c| c.robot == robot)
            .unwrap_or_else(|| panic!("{} was never commanded", robot));
        // every robot starts at the origin facing 0: only a half turn is needed
        let (dx, dy, dturn) = control_of(command);
        assert!(dx.abs() < EPS && dy.abs() < EPS);
        assert!((dturn - 1.5 * PI).abs() < EPS);
    }
}

#[tokio::test]
async fn closing_the_session_stops_every_robot() {
    let gc = start_game_controller(["", ""]).await;
    let client = Client::connect(gc.client_config())
        .await
        .expect("session should be acquired");

    client.close().await;

    let commands = gc.received_commands();
    assert_eq!(commands.len(), 4);
    for (command, robot) in commands.iter().zip(RobotName::ALL) {
        assert_eq!(command.robot, robot);
        assert_eq!(control_of(command), (0., 0., 0.));
    }
}

#[tokio::test]
async fn default_config_reaches_a_controller_on_the_standard_ports() {
    let gc = FakeGameController::start_on(["", ""], STATE_PORT, CONTROL_PORT)
        .await
        .expect("standard ports should be free");
    gc.set_all_robots(Pose::new(0., 0., 0.));
    gc.set_ball(Some(Point2::new(0.2, 0.1)));

    let client = Client::connect(ClientConfig::default())
        .await
        .expect("session should be acquired");
    assert_eq!(client.ball(), Some(Point2::new(0.2, 0.1)));
    client.close().await;
}

#[tokio::test]
async fn stopping_the_control_thread_closes_the_session() {
    let gc = start_game_controller(["", ""]).await;
    let client = Client::connect(gc.client_config())
        .await
        .expect("session should be acquired");

    let (stop_sender, control_thread) =
        launch_control_thread(client, FollowBall::default(), LoopMode::Polling);
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_sender.send(()).expect("control thread still running");

    let result = tokio::time::timeout(Duration::from_secs(5), control_thread)
        .await
        .expect("control thread should stop")
        .expect("control thread shouldn't panic");
    assert!(result.is_ok(), "{:?}", result);

    let commands = gc.received_commands();
    assert!(commands.iter().any(|c| c.robot == RobotName::BLUE1));
    for robot in RobotName::ALL {
        let last = commands
            .iter()
            .rev()
            .find(|c| c.robot == robot)
            .unwrap_or_else(|| panic!("{} was never stopped", robot));
        assert_eq!(control_of(last), (0., 0., 0.), "{}", robot);
    }
}

#[tokio::test]
async fn undecodable_state_packets_are_skipped() {
    let gc = start_game_controller(["", ""]).await;
    let mut client = Client::connect(gc.client_config())
        .await
        .expect("session should be acquired");
    client.next_update().await.expect("subscribed");

    gc.publish_raw("not json");
    gc.publish_raw(r#"{"ball": [0.1"#);
    gc.set_ball(Some(Point2::new(-0.3, 0.4)));

    let seen = tokio::time::timeout(Duration::from_secs(2), async {
        while client.ball() != Some(Point2::new(-0.3, 0.4)) {
            client.next_update().await?;
        }
        Ok::<_, ClientError>(())
    })
    .await
    .expect("state keeps flowing after bad packets");
    assert!(seen.is_ok(), "{:?}", seen);
}

#[tokio::test]
async fn cancelled_commands_leave_the_control_link_usable() {
    let gc = start_game_controller(["", ""]).await;
    let client = Client::connect(gc.client_config())
        .await
        .expect("session should be acquired");

    for _ in 0..10 {
        let _ = tokio::time::timeout(Duration::ZERO, client.blue1().control(0.1, 0., 0.)).await;
    }
    let outcome = client
        .blue1()
        .stop()
        .await
        .expect("control link still usable");
    assert_eq!(outcome, CommandOutcome::Applied);
}
