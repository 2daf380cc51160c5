use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;

use super::mirror::MirrorCommands;
use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use super::NetworkFailure;

/// One request/response exchange against a relay.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<String, NetworkFailure>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<String, NetworkFailure> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Drives a remote relay over an unreliable network.
///
/// Every call blocks for at most `policy.worst_case()` and cannot be cancelled
/// early other than by dropping the future.
pub struct RelayClient {
    base_url: String,
    policy: RetryPolicy,
    mirror: MirrorCommands,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self::with_parts(
            base_url,
            policy,
            Arc::new(HttpTransport::new()),
            Arc::new(TokioSleeper),
        )
    }

    pub fn with_parts(
        base_url: impl Into<String>,
        policy: RetryPolicy,
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            policy,
            mirror: MirrorCommands::default(),
            transport,
            sleeper,
        }
    }

    pub fn with_mirror_commands(mut self, commands: MirrorCommands) -> Self {
        self.mirror = commands;
        self
    }

    pub(crate) fn mirror_commands(&self) -> &MirrorCommands {
        &self.mirror
    }

    /// GET `url` until it succeeds or the attempt budget runs out.
    ///
    /// Returns the body of the first successful attempt, or `""` once every
    /// attempt has failed. An empty string is therefore ambiguous with a
    /// genuinely empty reply.
    pub async fn call(&self, url: &str) -> String {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            if let Some(delay) = self.policy.delay_before(attempt) {
                self.sleeper.sleep(delay).await;
            }

            debug!("Attempt {}/{}: GET {}", attempt, max_attempts, url);
            match self.attempt(url).await {
                Ok(body) => {
                    if attempt > 1 {
                        info!("GET {} succeeded on attempt {}", url, attempt);
                    }
                    return body;
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt, max_attempts, url, e
                    );
                }
            }
        }

        warn!("Giving up on {} after {} attempts", url, max_attempts);
        String::new()
    }

    /// One transport call, cut off at the per-attempt deadline.
    async fn attempt(&self, url: &str) -> Result<String, NetworkFailure> {
        let timeout = self.policy.attempt_timeout();
        tokio::time::timeout(timeout, self.transport.get(url, timeout))
            .await
            .map_err(|_| NetworkFailure::Timeout)?
    }

    /// Send `cmd` to the relay's `/commander` route with retries.
    pub async fn command(&self, cmd: &str) -> String {
        match self.commander_url(cmd) {
            Ok(url) => self.call(url.as_str()).await,
            Err(e) => {
                warn!("Not sending {:?}: {}", cmd, e);
                String::new()
            }
        }
    }

    fn commander_url(&self, cmd: &str) -> Result<Url, NetworkFailure> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| NetworkFailure::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| NetworkFailure::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push("commander");
        url.query_pairs_mut().append_pair("cmd", cmd);
        Ok(url)
    }
}
