use std::{fmt, net::Ipv4Addr};
use zeromq::ZmqError;

pub mod control_requester;
pub mod state_subscriber;

pub fn tcp_endpoint(ip: Ipv4Addr, port: u16) -> String {
    format!("tcp://{}:{}", ip, port)
}

#[derive(Debug)]
pub enum ConnectError {
    SocketConnectError(String, ZmqError),
    SocketSubscribeError(ZmqError),
}

#[derive(Debug)]
pub enum ReceiveError {
    SocketReceiveError(ZmqError),
    EmptyMessage,
    DecodeError(serde_json::Error),
}

#[derive(Debug)]
pub enum SendError {
    SocketSendError(ZmqError),
    EncodeError(serde_json::Error),
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::SocketConnectError(endpoint, e) => {
                write!(f, "couldn't connect to {}: {}", endpoint, e)
            }
            ConnectError::SocketSubscribeError(e) => write!(f, "couldn't subscribe: {}", e),
        }
    }
}

impl fmt::Display for ReceiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiveError::SocketReceiveError(e) => write!(f, "socket receive failed: {}", e),
            ReceiveError::EmptyMessage => write!(f, "received an empty message"),
            ReceiveError::DecodeError(e) => write!(f, "couldn't decode message: {}", e),
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::SocketSendError(e) => write!(f, "socket send failed: {}", e),
            SendError::EncodeError(e) => write!(f, "couldn't encode message: {}", e),
        }
    }
}

impl std::error::Error for ConnectError {}
impl std::error::Error for ReceiveError {}
impl std::error::Error for SendError {}
