//! Session with a game controller.
//!
//! A [`Client`] keeps a [`World`] up to date from the controller's state publisher and sends
//! robot commands through its control socket.
//!
//! ```no_run
//! use rsk_async::{Client, ClientConfig, ClientError};
//! use std::f64::consts::PI;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ClientError> {
//!     let client = Client::connect(ClientConfig::default().with_key("secret")).await?;
//!     let arrived = client.blue1().goto((0., 0., PI), true).await?;
//!     assert!(arrived);
//!     client.close().await;
//!     Ok(())
//! }
//! ```

use crate::{
    game_state::{Referee, RefereeRobot},
    math::{Point2, Pose},
    net::{
        control_requester::{Command, CommandError, CommandOutcome, ControlRequester},
        state_subscriber::StateSubscriber,
        ConnectError, ReceiveError,
    },
    strategies::Strategy,
    world::{Robot, RobotName, World},
    LoopMode,
};
use std::{
    fmt,
    net::Ipv4Addr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, error, info, warn};

pub const DEFAULT_HOST: Ipv4Addr = Ipv4Addr::LOCALHOST;
pub const STATE_PORT: u16 = 7557;
pub const CONTROL_PORT: u16 = 7558;
pub const KEY_ENV_VAR: &str = "RSK_KEY";
pub const HOST_ENV_VAR: &str = "RSK_HOST";
const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// period between two steps of a blocking goto
pub const GOTO_WAIT_PERIOD: Duration = Duration::from_millis(50);

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub host: Ipv4Addr,
    /// team key expected by the game controller, empty when it doesn't check keys
    pub key: String,
    pub state_port: u16,
    pub control_port: u16,
    /// wait until the ball and every robot have been seen before returning from `connect`
    pub wait_ready: bool,
    /// bounds the whole acquisition (connection and wait for readiness), `None` waits forever
    pub ready_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST,
            key: String::new(),
            state_port: STATE_PORT,
            control_port: CONTROL_PORT,
            wait_ready: true,
            ready_timeout: Some(DEFAULT_READY_TIMEOUT),
        }
    }
}

impl ClientConfig {
    /// Default config, with the team key taken from `RSK_KEY` and the host from `RSK_HOST`
    /// when set.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(key) = var(KEY_ENV_VAR) {
            config = config.with_key(key);
        }
        if let Some(host) = var(HOST_ENV_VAR) {
            match host.parse() {
                Ok(host) => config = config.with_host(host),
                Err(e) => warn!("ignoring {}={}: {}", HOST_ENV_VAR, host, e),
            }
        }
        config
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_host(mut self, host: Ipv4Addr) -> Self {
        self.host = host;
        self
    }

    pub fn with_ports(mut self, state_port: u16, control_port: u16) -> Self {
        self.state_port = state_port;
        self.control_port = control_port;
        self
    }

    pub fn with_wait_ready(mut self, wait_ready: bool) -> Self {
        self.wait_ready = wait_ready;
        self
    }

    pub fn with_ready_timeout(mut self, ready_timeout: Option<Duration>) -> Self {
        self.ready_timeout = ready_timeout;
        self
    }
}

#[derive(Debug)]
pub enum ClientError {
    Connect(ConnectError),
    Command(RobotName, CommandError),
    /// the session couldn't be acquired in time
    NotReady(Duration),
    /// the state stream ended
    Disconnected,
    UnknownPosition(RobotName),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Connect(e) => write!(f, "{}", e),
            ClientError::Command(robot, e) => write!(f, "command to {} failed: {}", robot, e),
            ClientError::NotReady(timeout) => {
                write!(f, "game controller not ready after {:?}", timeout)
            }
            ClientError::Disconnected => write!(f, "disconnected from the game controller"),
            ClientError::UnknownPosition(robot) => {
                write!(f, "position of {} is unknown", robot)
            }
        }
    }
}

impl std::error::Error for ClientError {}

/// Counter of state packets and time elapsed between the last two.
#[derive(Clone, Copy, Debug, Default)]
struct Update {
    count: u64,
    dt: Duration,
}

/// Aborts the state task once the last `Client` clone is gone.
struct StateTask(JoinHandle<()>);

impl Drop for StateTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A session with the game controller. Cloning is cheap, clones share the session.
#[derive(Clone)]
pub struct Client {
    world: World,
    requester: Arc<Mutex<ControlRequester>>,
    updates: watch::Receiver<Update>,
    state_task: Arc<StateTask>,
}

impl Client {
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        match config.ready_timeout {
            Some(timeout) => tokio::time::timeout(timeout, Self::acquire(&config))
                .await
                .map_err(|_| ClientError::NotReady(timeout))?,
            None => Self::acquire(&config).await,
        }
    }

    async fn acquire(config: &ClientConfig) -> Result<Self, ClientError> {
        let subscriber = StateSubscriber::connect(config.host, config.state_port)
            .await
            .map_err(ClientError::Connect)?;
        let requester =
            ControlRequester::connect(config.host, config.control_port, config.key.clone())
                .await
                .map_err(ClientError::Connect)?;
        debug!("connected to game controller at {}", config.host);

        let world = World::default();
        let (update_sender, updates) = watch::channel(Update::default());
        let handle = tokio::spawn(update_world_forever(
            subscriber,
            world.clone(),
            update_sender,
        ));
        let client = Self {
            world,
            requester: Arc::new(Mutex::new(requester)),
            updates,
            state_task: Arc::new(StateTask(handle)),
        };
        if config.wait_ready {
            client.wait_ready().await?;
        }
        info!("session with game controller at {} acquired", config.host);
        Ok(client)
    }

    async fn wait_ready(&self) -> Result<(), ClientError> {
        let mut updates = self.updates.clone();
        while !self.world.is_ready() {
            updates
                .changed()
                .await
                .map_err(|_| ClientError::Disconnected)?;
        }
        Ok(())
    }

    /// Waits for the next state packet and returns the time elapsed since the previous one.
    pub async fn next_update(&mut self) -> Result<Duration, ClientError> {
        self.updates
            .changed()
            .await
            .map_err(|_| ClientError::Disconnected)?;
        Ok(self.updates.borrow_and_update().dt)
    }

    /// Runs `strategy` once per received state packet, forever. Only returns on error.
    pub async fn on_update<S: Strategy + ?Sized>(
        &mut self,
        strategy: &mut S,
    ) -> Result<(), ClientError> {
        crate::control_loop(self, strategy, LoopMode::OnUpdate).await
    }

    /// number of state packets received so far
    pub fn update_count(&self) -> u64 {
        self.updates.borrow().count
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// last known ball position
    pub fn ball(&self) -> Option<Point2> {
        self.world.ball.get_pos()
    }

    pub fn referee(&self) -> Referee {
        self.world.get_referee()
    }

    pub fn robot(&self, name: RobotName) -> RobotHandle<'_> {
        RobotHandle {
            client: self,
            robot: self.world.robot(name),
        }
    }

    pub fn robots(&self) -> impl Iterator<Item = RobotHandle<'_>> {
        RobotName::ALL.into_iter().map(move |name| self.robot(name))
    }

    pub fn blue1(&self) -> RobotHandle<'_> {
        self.robot(RobotName::BLUE1)
    }

    pub fn blue2(&self) -> RobotHandle<'_> {
        self.robot(RobotName::BLUE2)
    }

    pub fn green1(&self) -> RobotHandle<'_> {
        self.robot(RobotName::GREEN1)
    }

    pub fn green2(&self) -> RobotHandle<'_> {
        self.robot(RobotName::GREEN2)
    }

    /// Sends one command and waits for its reply.
    ///
    /// The exchange runs on its own task: a REQ socket must receive a reply before it can send
    /// again, so it completes even when the caller is cancelled (e.g. by a stop signal).
    pub async fn command(
        &self,
        robot: RobotName,
        command: Command,
    ) -> Result<CommandOutcome, ClientError> {
        let requester = self.requester.clone();
        tokio::spawn(async move {
            let mut requester = requester.lock().await;
            requester.send_command(robot, command).await
        })
        .await
        .map_err(|e| {
            error!("command task for {} failed: {}", robot, e);
            ClientError::Disconnected
        })?
        .map_err(|e| ClientError::Command(robot, e))
    }

    /// Stops every robot. Failures (e.g. robots of the other team) are only logged.
    pub async fn stop_motion(&self) {
        for robot in self.robots() {
            if let Err(e) = robot.stop().await {
                debug!("couldn't stop {}: {}", robot.name(), e);
            }
        }
    }

    // workaround for async Drop, to be replaced when std::future::AsyncDrop is stabilized
    pub async fn close(self) {
        self.stop_motion().await;
        self.state_task.0.abort();
        info!("session closed");
    }
}

async fn update_world_forever(
    mut subscriber: StateSubscriber,
    world: World,
    update_sender: watch::Sender<Update>,
) {
    let mut last_packet: Option<Instant> = None;
    loop {
        match subscriber.receive().await {
            Ok(packet) => {
                let now = Instant::now();
                world.update_from_packet(&packet, now);
                let dt = last_packet.map(|t| now - t).unwrap_or_default();
                last_packet = Some(now);
                update_sender.send_modify(|update| {
                    update.count += 1;
                    update.dt = dt;
                });
            }
            Err(e @ (ReceiveError::DecodeError(_) | ReceiveError::EmptyMessage)) => {
                warn!("skipping state packet: {}", e);
            }
            Err(e @ ReceiveError::SocketReceiveError(_)) => {
                error!("state stream ended: {}", e);
                break;
            }
        }
    }
}

/// A robot seen through a session: its last known state plus the commands it accepts.
#[derive(Clone, Copy)]
pub struct RobotHandle<'c> {
    client: &'c Client,
    robot: &'c Robot,
}

impl RobotHandle<'_> {
    pub fn name(&self) -> RobotName {
        self.robot.get_name()
    }

    pub fn position(&self) -> Point2 {
        self.robot.get_pos()
    }

    pub fn orientation(&self) -> f64 {
        self.robot.get_orientation()
    }

    pub fn pose(&self) -> Option<Pose> {
        self.robot.get_pose()
    }

    pub fn has_position(&self) -> bool {
        self.robot.has_position()
    }

    pub fn age(&self) -> Option<Duration> {
        self.robot.age()
    }

    pub fn is_preempted(&self) -> bool {
        self.robot.is_preempted()
    }

    /// what the referee says about this robot (penalty, preemption)
    pub fn referee(&self) -> RefereeRobot {
        self.robot.get_referee()
    }

    pub async fn control(
        &self,
        dx: f64,
        dy: f64,
        dturn: f64,
    ) -> Result<CommandOutcome, ClientError> {
        self.client
            .command(self.name(), Command::Control { dx, dy, dturn })
            .await
    }

    pub async fn kick(&self, power: f64) -> Result<CommandOutcome, ClientError> {
        self.client
            .command(self.name(), Command::Kick { power })
            .await
    }

    pub async fn stop(&self) -> Result<CommandOutcome, ClientError> {
        self.control(0., 0., 0.).await
    }

    /// Moves toward `target`. Returns whether the robot was already there.
    ///
    /// Without `wait`, sends a single control step and returns immediately.
    /// With `wait`, keeps stepping every [`GOTO_WAIT_PERIOD`] until arrived, then stops the robot.
    pub async fn goto(&self, target: impl Into<Pose>, wait: bool) -> Result<bool, ClientError> {
        let target = target.into();
        if !wait {
            return self.goto_step(target).await;
        }
        while !self.goto_step(target).await? {
            sleep(GOTO_WAIT_PERIOD).await;
        }
        self.stop().await?;
        Ok(true)
    }

    async fn goto_step(&self, target: Pose) -> Result<bool, ClientError> {
        let step = self
            .robot
            .goto_step(target)
            .ok_or(ClientError::UnknownPosition(self.name()))?;
        self.client.command(self.name(), step.command).await?;
        Ok(step.arrived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_reads_key_and_host_from_the_environment() {
        let config = ClientConfig::from_vars(|name| match name {
            KEY_ENV_VAR => Some("secret".to_string()),
            HOST_ENV_VAR => Some("192.168.1.20".to_string()),
            _ => None,
        });
        assert_eq!(config.key, "secret");
        assert_eq!(config.host, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(config.state_port, STATE_PORT);

        let config = ClientConfig::from_vars(|name| {
            (name == HOST_ENV_VAR).then(|| "not-an-ip".to_string())
        });
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.key, "");
    }
}
