//! Viewer abstraction.
//!
//! Mirrors what the client sees and what it commands to websocket clients. The api is guard
//! based to be easily used in asynchronous code: an object is drawn on each frame for as long as
//! its guard lives.
//!
//! # Examples
//!
//! Drawing the target of a goto while the robot goes there:
//! ```
//! use rsk_async::{
//!     math::Pose,
//!     viewer::{ViewerObject, start_drawing},
//! };
//! use tokio::time::{sleep, Duration};
//!
//! #[tokio::main]
//! async fn main() {
//!     let target_drawing_guard = start_drawing(ViewerObject::Target {
//!         robot: "blue1".to_string(),
//!         pose: Pose::new(0.5, 0., 0.),
//!     });
//!
//!     // This sleep will act as a 1s goto.
//!     sleep(Duration::from_secs(1)).await;
//!
//!     // here the `target_drawing_guard` goes out of scope and gets dropped.
//!     // The target stops being drawn.
//! }
//! ```

use futures_util::{stream::FusedStream, SinkExt};
use serde::Serialize;
use std::{
    collections::HashMap,
    io,
    net::{Ipv4Addr, SocketAddrV4},
    sync::{Arc, LazyLock, Mutex},
    time::Duration,
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::Notify,
};
use tracing::{debug, info, warn};

use crate::{
    math::{Point2, Pose},
    world::TeamColor,
    IgnoreMutexErr,
};

/// default viewer ip
const VIEWER_IP: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);

/// default viewer port
pub const VIEWER_PORT: u16 = 8282;

const FRAME_RATE: f32 = 30.;

/// A shape that can be drawn on the viewer clients
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ViewerObject {
    Robot {
        name: String,
        color: TeamColor,
        pose: Pose,
        preempted: bool,
    },
    Ball {
        pos: Point2,
    },
    /// where a robot was last ordered to go
    Target {
        robot: String,
        pose: Pose,
    },
}

/// A frame sent to each viewer client. It contains all the objects to be drawn during the frame.
#[derive(Serialize, Debug, Clone)]
pub struct ViewerFrame {
    objects: Vec<ViewerObject>,
}

static DRAWINGS_POOL: LazyLock<Mutex<HashMap<usize, ViewerObject>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Returns the number of `ViewerObject`s which should currently be drawn (the size of the internal drawings pool).
pub fn to_be_drawn_objects_count() -> usize {
    DRAWINGS_POOL.lock().unwrap_ignore_poison().len()
}

/// Returns a new `ViewerFrame` containing the `ViewerObject`s which should currently be drawn.
fn make_frame() -> ViewerFrame {
    ViewerFrame {
        objects: DRAWINGS_POOL
            .lock()
            .unwrap_ignore_poison()
            .values()
            .cloned()
            .collect(),
    }
}

/// A guard for a `ViewerObject` while it's being actively drawn.
/// When dropped, the ascociated `ViewerObject` stops being drawn.
pub struct ViewerObjectGuard {
    id: usize,
}

impl ViewerObjectGuard {
    pub fn update(&mut self, o: ViewerObject) {
        DRAWINGS_POOL
            .lock()
            .unwrap_ignore_poison()
            .insert(self.id, o);
    }
}

impl Drop for ViewerObjectGuard {
    fn drop(&mut self) {
        let mut lock = DRAWINGS_POOL.lock().unwrap_ignore_poison();
        lock.remove(&self.id);
    }
}

/// Makes the viewer start drawing the given `ViewerObject`.
/// Returns the `ViewerObjectGuard` associated with the object to be drawn.
/// The `ViewerObject` will be drawn each frame until the guard is dropped.
pub fn start_drawing(o: ViewerObject) -> ViewerObjectGuard {
    let mut lock = DRAWINGS_POOL.lock().unwrap_ignore_poison();
    let mut id: usize = rand::random();
    while lock.contains_key(&id) {
        id = rand::random();
    }
    lock.insert(id, o);
    ViewerObjectGuard { id }
}

/// Starts the viewer server and the new frame thread.
pub async fn init() -> io::Result<()> {
    let addr = SocketAddrV4::new(VIEWER_IP, VIEWER_PORT);
    let new_frame_notify = Arc::new(Notify::new());

    let listener = TcpListener::bind(&addr).await?;
    info!("viewer listening on: {}", addr);

    let new_frame_notify_clone = new_frame_notify.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(accept_connection(new_frame_notify_clone.clone(), stream));
        }
    });

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs_f32(1. / FRAME_RATE));
        loop {
            interval.tick().await;
            new_frame_notify.notify_waiters();
        }
    });
    Ok(())
}

async fn accept_connection(new_frame_notifier: Arc<Notify>, stream: TcpStream) {
    let addr = match stream.peer_addr() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("viewer connection without peer address: {}", e);
            return;
        }
    };

    let mut ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            warn!("websocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    info!("new viewer connection: {}", addr);

    while !ws_stream.is_terminated() {
        new_frame_notifier.notified().await;
        let frame = match serde_json::to_string(&make_frame()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("couldn't serialize viewer frame: {}", e);
                continue;
            }
        };
        if let Err(e) = ws_stream
            .send(tokio_tungstenite::tungstenite::Message::text(frame))
            .await
        {
            debug!("viewer {} left: {}", addr, e);
            break;
        }
    }
}
