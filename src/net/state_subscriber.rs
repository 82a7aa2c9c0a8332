use super::{tcp_endpoint, ConnectError, ReceiveError};
use crate::game_state::GameState;
use std::net::Ipv4Addr;
use zeromq::{Socket, SocketRecv, SubSocket};

/// Subscriber side of the game controller's state publisher.
pub struct StateSubscriber {
    socket: SubSocket,
}

impl StateSubscriber {
    pub async fn connect(ip: Ipv4Addr, port: u16) -> Result<Self, ConnectError> {
        let endpoint = tcp_endpoint(ip, port);
        let mut socket = SubSocket::new();
        socket
            .connect(&endpoint)
            .await
            .map_err(|e| ConnectError::SocketConnectError(endpoint, e))?;
        socket
            .subscribe("")
            .await
            .map_err(ConnectError::SocketSubscribeError)?;
        Ok(Self { socket })
    }

    pub async fn receive(&mut self) -> Result<GameState, ReceiveError> {
        let message = self
            .socket
            .recv()
            .await
            .map_err(ReceiveError::SocketReceiveError)?;
        let frame = message.get(0).ok_or(ReceiveError::EmptyMessage)?;
        GameState::from_slice(frame).map_err(ReceiveError::DecodeError)
    }
}
