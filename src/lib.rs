#![deny(clippy::unwrap_used)]
pub mod client;
pub mod game_state;
pub mod math;
pub mod net;
pub mod strategies;
pub mod testing;
pub mod viewer;
pub mod world;

pub use client::{Client, ClientConfig, ClientError, RobotHandle};

use std::{collections::HashMap, sync::LockResult, time::Duration};

use math::Point2;
use strategies::Strategy;
use tokio::{
    select,
    sync::oneshot::{self, Sender},
    task::{JoinError, JoinHandle},
    time::Instant,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use viewer::{ViewerObject, ViewerObjectGuard};
use world::{Robot, RobotName};

pub const CONTROL_PERIOD: Duration = Duration::from_millis(10);

pub trait IgnoreMutexErr<T> {
    fn unwrap_ignore_poison(self) -> T;
}

impl<T> IgnoreMutexErr<T> for LockResult<T> {
    fn unwrap_ignore_poison(self) -> T {
        match self {
            Ok(r) => r,
            Err(poisoned) => {
                // Handle mutex poisoning
                let guard = poisoned.into_inner();
                warn!("mutex was poisoned, recovering from mutex poisoning");
                guard
            }
        }
    }
}

/// Logs go to stderr, stdout is kept for the state lines. `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .without_time()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// How the control loop is paced.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoopMode {
    /// step every `CONTROL_PERIOD`, reading the latest known state
    Polling,
    /// step once per state packet received (the `on_update` hook)
    OnUpdate,
}

/// One line describing the ball and a robot, printed after each step.
pub fn format_state(ball: Option<Point2>, robot: &Robot) -> String {
    let ball = match ball {
        Some(ball) => ball.to_string(),
        None => "unknown".to_string(),
    };
    format!(
        "ball: {} | {}: {} orientation: {:.3}",
        ball,
        robot.get_name(),
        robot.get_pos(),
        robot.get_orientation()
    )
}

/// What the viewer currently draws for the control loop.
#[derive(Default)]
pub struct Drawings {
    ball: Option<ViewerObjectGuard>,
    robots: HashMap<RobotName, ViewerObjectGuard>,
    targets: HashMap<RobotName, ViewerObjectGuard>,
}

impl Drawings {
    fn draw(guard: &mut Option<ViewerObjectGuard>, o: ViewerObject) {
        match guard {
            Some(guard) => guard.update(o),
            None => *guard = Some(viewer::start_drawing(o)),
        }
    }

    fn draw_in(map: &mut HashMap<RobotName, ViewerObjectGuard>, name: RobotName, o: ViewerObject) {
        let mut guard = map.remove(&name);
        Self::draw(&mut guard, o);
        if let Some(guard) = guard {
            map.insert(name, guard);
        }
    }
}

/// Reads the world, issues the strategy's gotos and prints the watched robot.
pub async fn step<S: Strategy + ?Sized>(
    client: &Client,
    strategy: &mut S,
    dt: Duration,
    drawings: &mut Drawings,
) -> Result<(), ClientError> {
    let world = client.world();
    let snapshot = world.snapshot();

    if let Some(pos) = snapshot.ball {
        Drawings::draw(&mut drawings.ball, ViewerObject::Ball { pos });
    }
    for (name, robot) in &world.robots {
        if let Some(pose) = robot.get_pose() {
            Drawings::draw_in(
                &mut drawings.robots,
                *name,
                ViewerObject::Robot {
                    name: name.to_string(),
                    color: name.team,
                    pose,
                    preempted: robot.is_preempted(),
                },
            );
        }
    }

    for order in strategy.plan(&snapshot, dt) {
        client.robot(order.robot).goto(order.target, order.wait).await?;
        Drawings::draw_in(
            &mut drawings.targets,
            order.robot,
            ViewerObject::Target {
                robot: order.robot.to_string(),
                pose: order.target,
            },
        );
    }

    println!(
        "{}",
        format_state(client.ball(), world.robot(strategy.watched_robot()))
    );
    Ok(())
}

/// Runs the strategy forever. Only returns on error.
pub async fn control_loop<S: Strategy + ?Sized>(
    client: &mut Client,
    strategy: &mut S,
    mode: LoopMode,
) -> Result<(), ClientError> {
    let mut drawings = Drawings::default();
    match mode {
        LoopMode::Polling => {
            let mut interval = tokio::time::interval(CONTROL_PERIOD);
            let mut last_step = Instant::now();
            loop {
                interval.tick().await; // first tick ticks immediately that's why it's at the beginning
                let dt = last_step.elapsed();
                last_step = Instant::now();
                step(client, strategy, dt, &mut drawings).await?;
            }
        }
        LoopMode::OnUpdate => loop {
            let dt = client.next_update().await?;
            step(client, strategy, dt, &mut drawings).await?;
        },
    }
}

/// Runs the strategy on its own task until it fails or the returned sender is used.
/// The session is closed when the task ends.
pub fn launch_control_thread(
    mut client: Client,
    mut strategy: impl Strategy + Send + 'static,
    mode: LoopMode,
) -> (Sender<()>, JoinHandle<Result<(), ClientError>>) {
    let (stop_sender, stop_receiver) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let result = select! {
            result = control_loop(&mut client, &mut strategy, mode) => result,
            _ = stop_receiver => {
                info!("control thread received stop signal");
                Ok(())
            }
        };

        client.close().await;
        result
    });
    (stop_sender, handle)
}

/// Outcome of a finished control thread. A panicked thread is logged and reported as
/// `Disconnected`.
pub fn control_thread_result(
    joined: Result<Result<(), ClientError>, JoinError>,
) -> Result<(), ClientError> {
    joined.unwrap_or_else(|e| {
        error!("control thread failed: {}", e);
        Err(ClientError::Disconnected)
    })
}
