use rsk_async::{
    control_thread_result, launch_control_thread, strategies::FollowBall, viewer, Client,
    ClientConfig, ClientError, LoopMode,
};
use tracing::{info, warn};

/// Sends blue1 and green1 onto the ball, facing pi/3, and prints the ball and blue1 as it goes.
#[tokio::main]
async fn main() -> Result<(), ClientError> {
    rsk_async::init_logging();
    if let Err(e) = viewer::init().await {
        warn!("viewer disabled: {}", e);
    }

    let client = Client::connect(ClientConfig::from_env()).await?;
    let (stop_sender, mut control_thread) =
        launch_control_thread(client, FollowBall::default(), LoopMode::Polling);

    tokio::select! {
        result = &mut control_thread => {
            return control_thread_result(result);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, stopping robots");
        }
    }
    // the control thread closes the session before returning
    let _ = stop_sender.send(());
    control_thread_result(control_thread.await)
}
