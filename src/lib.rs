pub mod client;
pub mod config;
pub mod logtail;
pub mod relay;
pub mod serial;

use config::RelayConfig;
use relay::{Relay, RelayError};

/// Acquire the configured backends, serve until Ctrl-C, then release them.
pub async fn run(config: RelayConfig) -> Result<(), RelayError> {
    let bind = config.bind;
    let relay = Relay::start(config)?;
    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("LabRelay listening on {}", listener.local_addr()?);

    let result = relay
        .serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            log::info!("Shutdown requested");
        })
        .await;

    relay.shutdown().await;
    result
}
