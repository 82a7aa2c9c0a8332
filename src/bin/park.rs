use rsk_async::{
    control_thread_result, launch_control_thread, strategies::Park, Client, ClientConfig,
    ClientError, LoopMode,
};
use tracing::info;

/// Parks the four robots at the center of the field, facing pi, on every state update.
#[tokio::main]
async fn main() -> Result<(), ClientError> {
    rsk_async::init_logging();

    let client = Client::connect(ClientConfig::from_env()).await?;
    let (stop_sender, mut control_thread) =
        launch_control_thread(client, Park, LoopMode::OnUpdate);

    tokio::select! {
        result = &mut control_thread => {
            return control_thread_result(result);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, stopping robots");
        }
    }
    let _ = stop_sender.send(());
    control_thread_result(control_thread.await)
}
