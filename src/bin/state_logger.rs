use rsk_async::{net::state_subscriber::StateSubscriber, ClientConfig};
use tracing::{error, warn};

#[tokio::main]
async fn main() {
    rsk_async::init_logging();
    let config = ClientConfig::from_env();
    let mut subscriber = match StateSubscriber::connect(config.host, config.state_port).await {
        Ok(subscriber) => subscriber,
        Err(e) => {
            error!("couldn't subscribe to the game controller state: {}", e);
            return;
        }
    };
    loop {
        match subscriber.receive().await {
            Ok(packet) => {
                dbg!(packet);
            }
            Err(e) => {
                warn!("failed to receive packet, reason: {}", e);
            }
        };
    }
}
