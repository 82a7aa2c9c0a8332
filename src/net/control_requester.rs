use super::{tcp_endpoint, ConnectError, ReceiveError, SendError};
use crate::world::RobotName;
use serde_json::{json, Value};
use std::{fmt, net::Ipv4Addr};
use tracing::{trace, warn};
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

/// A command understood by the game controller's control socket.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// velocities in the robot frame: forward (m/s), left (m/s), counter-clockwise (rad/s)
    Control { dx: f64, dy: f64, dturn: f64 },
    /// kicker power in [0, 1]
    Kick { power: f64 },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Control { .. } => "control",
            Command::Kick { .. } => "kick",
        }
    }

    fn to_json(self) -> Value {
        match self {
            Command::Control { dx, dy, dturn } => json!(["control", dx, dy, dturn]),
            Command::Kick { power } => json!(["kick", power]),
        }
    }
}

/// What the game controller did with an accepted request.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    Applied,
    /// the controller understood the request but didn't apply it (robot preempted by the referee, unknown command)
    NotApplied(String),
}

#[derive(Debug)]
pub enum CommandError {
    /// bad key, unknown robot or controller-side error
    Failed(String),
    MalformedReply(String),
    Send(SendError),
    Receive(ReceiveError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Failed(reason) => write!(f, "command failed: {}", reason),
            CommandError::MalformedReply(reply) => write!(f, "malformed reply: {}", reply),
            CommandError::Send(e) => write!(f, "{}", e),
            CommandError::Receive(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CommandError {}

/// Encodes a request as `[key, team, number, [command, args...]]`.
pub fn encode_request(key: &str, robot: RobotName, command: Command) -> Result<Vec<u8>, SendError> {
    let request = json!([key, robot.team.as_str(), robot.number, command.to_json()]);
    serde_json::to_vec(&request).map_err(SendError::EncodeError)
}

/// Decodes a `[status, message]` reply. Status is `true`, `false` or `2`.
pub fn decode_reply(bytes: &[u8]) -> Result<CommandOutcome, CommandError> {
    let (status, message): (Value, String) = serde_json::from_slice(bytes)
        .map_err(|_| CommandError::MalformedReply(String::from_utf8_lossy(bytes).into_owned()))?;
    match status {
        Value::Bool(true) => Ok(CommandOutcome::Applied),
        Value::Bool(false) => Err(CommandError::Failed(message)),
        Value::Number(n) if n.as_u64() == Some(2) => Ok(CommandOutcome::NotApplied(message)),
        other => Err(CommandError::MalformedReply(format!("[{}, {:?}]", other, message))),
    }
}

/// Request side of the game controller's control socket.
///
/// A REQ socket must alternate send and receive, so `send_command` takes `&mut self`
/// and callers sharing a requester serialize access to it.
pub struct ControlRequester {
    socket: ReqSocket,
    key: String,
}

impl ControlRequester {
    pub async fn connect(ip: Ipv4Addr, port: u16, key: String) -> Result<Self, ConnectError> {
        let endpoint = tcp_endpoint(ip, port);
        let mut socket = ReqSocket::new();
        socket
            .connect(&endpoint)
            .await
            .map_err(|e| ConnectError::SocketConnectError(endpoint, e))?;
        Ok(Self { socket, key })
    }

    pub async fn send_command(
        &mut self,
        robot: RobotName,
        command: Command,
    ) -> Result<CommandOutcome, CommandError> {
        let request = encode_request(&self.key, robot, command).map_err(CommandError::Send)?;
        self.socket
            .send(ZmqMessage::from(request))
            .await
            .map_err(|e| CommandError::Send(SendError::SocketSendError(e)))?;
        let reply = self
            .socket
            .recv()
            .await
            .map_err(|e| CommandError::Receive(ReceiveError::SocketReceiveError(e)))?;
        let frame = reply
            .get(0)
            .ok_or(CommandError::Receive(ReceiveError::EmptyMessage))?;
        let outcome = decode_reply(frame)?;
        match &outcome {
            CommandOutcome::Applied => trace!("{} {:?} applied", robot, command),
            CommandOutcome::NotApplied(reason) => {
                warn!("{} not applied to {}: {}", command.name(), robot, reason)
            }
        }
        Ok(outcome)
    }
}
