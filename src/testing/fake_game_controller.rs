//! An in-process game controller speaking the same protocol as the real one: state published
//! on a PUB socket, commands answered on a REP socket. Robots follow their last `control`
//! command so gotos converge.

use crate::{
    client::ClientConfig,
    game_state::{GameState, Marker, RefereeRobot},
    math::{angle_wrap, Point2, Pose, Vec2},
    net::tcp_endpoint,
    world::RobotName,
    IgnoreMutexErr,
};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    fmt, mem,
    net::Ipv4Addr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zeromq::{
    Endpoint, PubSocket, RepSocket, Socket, SocketRecv, SocketSend, ZmqError, ZmqMessage,
};

pub const PUBLISH_PERIOD: Duration = Duration::from_millis(10);

/// A command the fake controller accepted and applied.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedCommand {
    pub robot: RobotName,
    /// `["control", dx, dy, dturn]` or `["kick", power]`
    pub command: Vec<Value>,
}

impl ReceivedCommand {
    /// `(dx, dy, dturn)` if this is a control command
    pub fn as_control(&self) -> Option<(f64, f64, f64)> {
        match self.command.as_slice() {
            [name, dx, dy, dturn] if name == "control" => {
                Some((dx.as_f64()?, dy.as_f64()?, dturn.as_f64()?))
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum FakeGameControllerError {
    BindError(ZmqError),
    NotTcp(Endpoint),
}

impl fmt::Display for FakeGameControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FakeGameControllerError::BindError(e) => write!(f, "couldn't bind: {}", e),
            FakeGameControllerError::NotTcp(endpoint) => {
                write!(f, "bound to a non tcp endpoint: {}", endpoint)
            }
        }
    }
}

impl std::error::Error for FakeGameControllerError {}

#[derive(Default)]
struct Field {
    state: GameState,
    /// last control command per robot, in the robot frame
    velocities: HashMap<RobotName, (f64, f64, f64)>,
    /// frames published as is before the next state packet
    raw_frames: Vec<Vec<u8>>,
}

impl Field {
    fn advance(&mut self, dt: f64) {
        for (name, (dx, dy, dturn)) in &self.velocities {
            if let Some(marker) = self.state.markers.get_mut(&name.to_string()) {
                let vel = Vec2::new(*dx, *dy).rotated(marker.orientation);
                marker.position = marker.position + vel * dt;
                marker.orientation = angle_wrap(marker.orientation + dturn * dt);
            }
        }
    }
}

pub struct FakeGameController {
    field: Arc<Mutex<Field>>,
    received: Arc<Mutex<Vec<ReceivedCommand>>>,
    state_port: u16,
    control_port: u16,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for FakeGameController {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Binds on localhost, port 0 picks a free one.
async fn bind_port(socket: &mut impl Socket, port: u16) -> Result<u16, FakeGameControllerError> {
    match socket
        .bind(&tcp_endpoint(Ipv4Addr::LOCALHOST, port))
        .await
        .map_err(FakeGameControllerError::BindError)?
    {
        Endpoint::Tcp(_, port) => Ok(port),
        other => Err(FakeGameControllerError::NotTcp(other)),
    }
}

impl FakeGameController {
    /// Binds on free local ports. `keys` are the blue and green team keys.
    pub async fn start(keys: [&str; 2]) -> Result<Self, FakeGameControllerError> {
        Self::start_on(keys, 0, 0).await
    }

    /// Binds on the given local ports, e.g. `STATE_PORT` and `CONTROL_PORT` to stand in for a
    /// real game controller.
    pub async fn start_on(
        keys: [&str; 2],
        state_port: u16,
        control_port: u16,
    ) -> Result<Self, FakeGameControllerError> {
        let mut publisher = PubSocket::new();
        let mut replier = RepSocket::new();
        let state_port = bind_port(&mut publisher, state_port).await?;
        let control_port = bind_port(&mut replier, control_port).await?;
        debug!(
            "fake game controller publishing on {}, controlled on {}",
            state_port, control_port
        );

        let field = Arc::new(Mutex::new(Field::default()));
        let received = Arc::new(Mutex::new(Vec::new()));
        let keys = keys.map(str::to_string);

        let publish_field = field.clone();
        let publish_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(PUBLISH_PERIOD);
            loop {
                interval.tick().await;
                let (raw_frames, packet) = {
                    let mut field = publish_field.lock().unwrap_ignore_poison();
                    field.advance(PUBLISH_PERIOD.as_secs_f64());
                    (
                        mem::take(&mut field.raw_frames),
                        serde_json::to_vec(&field.state),
                    )
                };
                for frame in raw_frames {
                    if let Err(e) = publisher.send(ZmqMessage::from(frame)).await {
                        warn!("couldn't publish raw frame: {}", e);
                    }
                }
                let packet = match packet {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!("couldn't encode game state: {}", e);
                        continue;
                    }
                };
                if let Err(e) = publisher.send(ZmqMessage::from(packet)).await {
                    warn!("fake game controller stopped publishing: {}", e);
                    break;
                }
            }
        });

        let control_field = field.clone();
        let control_received = received.clone();
        let control_task = tokio::spawn(async move {
            loop {
                let request = match replier.recv().await {
                    Ok(request) => request,
                    Err(e) => {
                        warn!("fake game controller stopped answering: {}", e);
                        break;
                    }
                };
                let reply = match request.get(0) {
                    Some(frame) => {
                        handle_request(&keys, &control_field, &control_received, frame)
                    }
                    None => json!([false, "Unknown error"]),
                };
                if let Err(e) = replier.send(ZmqMessage::from(reply.to_string())).await {
                    warn!("fake game controller couldn't reply: {}", e);
                    break;
                }
            }
        });

        Ok(Self {
            field,
            received,
            state_port,
            control_port,
            tasks: vec![publish_task, control_task],
        })
    }

    /// A config pointing a client at this controller.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default().with_ports(self.state_port, self.control_port)
    }

    /// Publishes `frame` untouched ahead of the next state packet.
    pub fn publish_raw(&self, frame: impl Into<Vec<u8>>) {
        self.field
            .lock()
            .unwrap_ignore_poison()
            .raw_frames
            .push(frame.into());
    }

    pub fn set_ball(&self, ball: Option<Point2>) {
        self.field.lock().unwrap_ignore_poison().state.ball = ball;
    }

    /// teleports a robot, it stops moving
    pub fn set_robot(&self, name: RobotName, pose: Pose) {
        let mut field = self.field.lock().unwrap_ignore_poison();
        field.velocities.remove(&name);
        field.state.markers.insert(
            name.to_string(),
            Marker {
                position: pose.position,
                orientation: pose.orientation,
            },
        );
    }

    pub fn set_all_robots(&self, pose: Pose) {
        for name in RobotName::ALL {
            self.set_robot(name, pose);
        }
    }

    /// `Some(reason)` preempts the robot, `None` gives it back to its team
    pub fn set_preempted(&self, name: RobotName, reason: Option<&str>) {
        let mut field = self.field.lock().unwrap_ignore_poison();
        let robot = field
            .state
            .referee
            .teams
            .entry(name.team.as_str().to_string())
            .or_default()
            .robots
            .entry(name.number.to_string())
            .or_default();
        *robot = RefereeRobot {
            preempted: reason.is_some(),
            preemption_reasons: reason.map(str::to_string).into_iter().collect(),
            ..RefereeRobot::default()
        };
    }

    pub fn robot_pose(&self, name: RobotName) -> Option<Pose> {
        self.field
            .lock()
            .unwrap_ignore_poison()
            .state
            .markers
            .get(&name.to_string())
            .map(|m| Pose {
                position: m.position,
                orientation: m.orientation,
            })
    }

    pub fn received_commands(&self) -> Vec<ReceivedCommand> {
        self.received.lock().unwrap_ignore_poison().clone()
    }

    pub fn clear_received_commands(&self) {
        self.received.lock().unwrap_ignore_poison().clear();
    }
}

fn handle_request(
    keys: &[String; 2],
    field: &Mutex<Field>,
    received: &Mutex<Vec<ReceivedCommand>>,
    request: &[u8],
) -> Value {
    let Ok((key, team, number, command)) =
        serde_json::from_slice::<(String, String, u8, Vec<Value>)>(request)
    else {
        return json!([false, "Unknown error"]);
    };
    let Ok(robot) = format!("{}{}", team, number).parse::<RobotName>() else {
        return json!([false, format!("Unknown robot: {}{}", team, number)]);
    };
    let team_index = robot.team as usize;
    if keys[team_index] != key {
        return json!([false, format!("Bad key for team {}", team)]);
    }

    let mut field = field.lock().unwrap_ignore_poison();
    if let Some(referee) = field.state.referee_robot(&team, number) {
        if referee.preempted {
            return json!([
                2,
                format!(
                    "Robot {} of team {} is preempted: {}",
                    number,
                    team,
                    referee.preemption_reasons.join(", ")
                )
            ]);
        }
    }

    match command.as_slice() {
        [name, dx, dy, dturn] if name == "control" => {
            let velocity = (
                dx.as_f64().unwrap_or(0.),
                dy.as_f64().unwrap_or(0.),
                dturn.as_f64().unwrap_or(0.),
            );
            field.velocities.insert(robot, velocity);
        }
        [name, _power] if name == "kick" => {}
        _ => return json!([2, "Unknown command"]),
    }
    received
        .lock()
        .unwrap_ignore_poison()
        .push(ReceivedCommand { robot, command });
    json!([true, "ok"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn field_with_blue1() -> Mutex<Field> {
        let mut field = Field::default();
        field.state.markers.insert(
            "blue1".to_string(),
            Marker {
                position: Point2::zero(),
                orientation: PI / 2.,
            },
        );
        Mutex::new(field)
    }

    fn request(v: Value) -> Vec<u8> {
        serde_json::to_vec(&v).expect("serializable")
    }

    #[test]
    fn checks_keys_per_team() {
        let keys = ["b".to_string(), "g".to_string()];
        let field = field_with_blue1();
        let received = Mutex::new(Vec::new());

        let reply = handle_request(
            &keys,
            &field,
            &received,
            &request(json!(["g", "blue", 1, ["control", 0., 0., 0.]])),
        );
        assert_eq!(reply, json!([false, "Bad key for team blue"]));

        let reply = handle_request(
            &keys,
            &field,
            &received,
            &request(json!(["g", "green", 3, ["kick", 1.]])),
        );
        assert_eq!(reply, json!([false, "Unknown robot: green3"]));
        assert!(received.lock().unwrap_ignore_poison().is_empty());
    }

    #[test]
    fn control_moves_robots_in_their_own_frame() {
        let keys = [String::new(), String::new()];
        let field = field_with_blue1();
        let received = Mutex::new(Vec::new());

        let reply = handle_request(
            &keys,
            &field,
            &received,
            &request(json!(["", "blue", 1, ["control", 1., 0., 0.]])),
        );
        assert_eq!(reply, json!([true, "ok"]));

        let mut field = field.lock().unwrap_ignore_poison();
        field.advance(0.5);
        // facing +y, so forward is +y
        let marker = &field.state.markers["blue1"];
        assert!(marker.position.x.abs() < 1e-9);
        assert!((marker.position.y - 0.5).abs() < 1e-9);
        assert_eq!(
            received.lock().unwrap_ignore_poison()[0].as_control(),
            Some((1., 0., 0.))
        );
    }

    #[test]
    fn unknown_commands_are_not_applied() {
        let keys = [String::new(), String::new()];
        let field = field_with_blue1();
        let received = Mutex::new(Vec::new());
        let reply = handle_request(
            &keys,
            &field,
            &received,
            &request(json!(["", "blue", 1, ["dance"]])),
        );
        assert_eq!(reply, json!([2, "Unknown command"]));
    }
}
