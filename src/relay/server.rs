use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use super::routes::{self, SharedChannel};
use super::RelayError;
use crate::client::RelayClient;
use crate::config::RelayConfig;
use crate::serial::SerialInterface;

/// Owns everything the relay holds for its lifetime.
///
/// The serial channel is acquired in [`Relay::start`] and released in
/// [`Relay::shutdown`]; nothing opens or closes it per request.
pub struct Relay {
    config: RelayConfig,
    channel: Option<SharedChannel>,
    log_path: Option<Arc<PathBuf>>,
    mirror: Option<Arc<RelayClient>>,
}

impl Relay {
    /// Validate `config` and acquire its backends. A serial device that cannot be
    /// opened aborts startup with `DeviceUnavailable`.
    pub fn start(config: RelayConfig) -> Result<Self, RelayError> {
        config.validate()?;
        let channel = match &config.serial {
            Some(settings) => Some(SerialInterface::open(settings)?),
            None => None,
        };
        Ok(Self::from_parts(config, channel))
    }

    /// Build a relay around an already-acquired channel.
    pub fn from_parts(config: RelayConfig, channel: Option<SerialInterface>) -> Self {
        let log_path = config.log.as_ref().map(|log| Arc::new(log.path.clone()));
        let mirror = config.mirror.as_ref().map(|mirror| {
            Arc::new(
                RelayClient::new(mirror.upstream.clone(), mirror.retry)
                    .with_mirror_commands(mirror.commands.clone()),
            )
        });

        Self {
            config,
            channel: channel.map(|c| Arc::new(Mutex::new(c))),
            log_path,
            mirror,
        }
    }

    pub fn router(&self) -> Router {
        let mut router = routes::welcome_routes();
        if let Some(channel) = &self.channel {
            router = router.merge(routes::commander_routes(channel.clone()));
        }
        if let Some(path) = &self.log_path {
            router = router.merge(routes::tail_routes(path.clone()));
        }
        if let Some(client) = &self.mirror {
            router = router.merge(routes::mirror_routes(client.clone()));
        }
        router
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        warn!(
            "Relay on {} accepts commands from any host without authentication; \
             expose it only on a closed network",
            addr
        );
        if let Some(settings) = &self.config.serial {
            info!("Serving /commander for {}", settings.port);
        }
        if let Some(log) = &self.config.log {
            info!("Serving /getvoltage from {}", log.path.display());
        }
        if let Some(mirror) = &self.config.mirror {
            info!("Serving /flipmirror/state via {}", mirror.upstream);
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }

    /// Release the serial channel.
    pub async fn shutdown(self) {
        if let Some(channel) = self.channel {
            channel.lock().await.close();
        }
        info!("Relay stopped");
    }
}
