//! The broadcast manager: registration, ordered fallback, status.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use host_types::{ChainTag, HostError, HostResult, ShutdownListener};

use crate::channel::{BroadcastChannel, ChannelTxStatus, SubmitParams, SubmitResult};
use crate::DEFAULT_SUBMIT_TIMEOUT;

/// Registers channels and drives submission with ordered fallback.
pub struct BroadcastManager {
    /// Enabled channels, ascending priority. Fixed after construction.
    channels: Vec<Arc<dyn BroadcastChannel>>,
    submit_timeout: Duration,
    shutdown: ShutdownListener,
}

impl BroadcastManager {
    /// Record the enabled channels, sorted by priority. Disabled
    /// channels are dropped at registration time.
    pub fn new(channels: Vec<Arc<dyn BroadcastChannel>>, shutdown: ShutdownListener) -> Self {
        let mut enabled: Vec<Arc<dyn BroadcastChannel>> =
            channels.into_iter().filter(|c| c.enabled()).collect();
        enabled.sort_by_key(|c| c.priority());

        for channel in &enabled {
            debug!(
                channel = channel.name(),
                priority = channel.priority(),
                "Broadcast channel registered"
            );
        }

        Self {
            channels: enabled,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            shutdown,
        }
    }

    /// Timeout override for tests.
    pub fn with_submit_timeout(mut self, submit_timeout: Duration) -> Self {
        self.submit_timeout = submit_timeout;
        self
    }

    /// Names of the registered (enabled) channels, in fallback order.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name().to_string()).collect()
    }

    /// Submit through the first channel that accepts.
    ///
    /// Attempt order: the preferred channel (when named and enabled)
    /// first, then the remaining channels by ascending priority. Every
    /// failure is collected; only if all attempts fail does the caller
    /// see `all_channels_failed`.
    pub async fn submit_with_fallback(
        &self,
        params: &SubmitParams,
        preferred: Option<&str>,
    ) -> HostResult<SubmitResult> {
        let ordered = self.attempt_order(preferred);
        if ordered.is_empty() {
            return Err(HostError::AllChannelsFailed {
                attempts: vec![("none".to_string(), "no channels enabled".to_string())],
            });
        }

        let mut attempts: Vec<(String, String)> = Vec::new();

        for channel in ordered {
            if self.shutdown.is_shutdown() {
                attempts.push(("shutdown".to_string(), "host shutting down".to_string()));
                break;
            }

            let name = channel.name().to_string();
            debug!(channel = name.as_str(), chain = %params.chain, "Attempting broadcast");

            let attempt = timeout(self.submit_timeout, channel.submit(params)).await;
            match attempt {
                Ok(Ok(signature)) => {
                    info!(
                        channel = name.as_str(),
                        chain = %params.chain,
                        "Broadcast accepted"
                    );
                    return Ok(SubmitResult {
                        channel: name,
                        signature,
                    });
                }
                Ok(Err(err)) => {
                    warn!(
                        channel = name.as_str(),
                        error = %err,
                        "Broadcast channel failed, falling back"
                    );
                    attempts.push((name, err.to_string()));
                }
                Err(_) => {
                    warn!(
                        channel = name.as_str(),
                        timeout_secs = self.submit_timeout.as_secs(),
                        "Broadcast channel timed out, falling back"
                    );
                    attempts.push((name, "submit timed out".to_string()));
                }
            }
        }

        Err(HostError::AllChannelsFailed { attempts })
    }

    fn attempt_order(&self, preferred: Option<&str>) -> Vec<Arc<dyn BroadcastChannel>> {
        let mut ordered = Vec::with_capacity(self.channels.len());
        if let Some(name) = preferred {
            if let Some(hit) = self.channels.iter().find(|c| c.name() == name) {
                ordered.push(Arc::clone(hit));
            }
        }
        for channel in &self.channels {
            if ordered.iter().any(|c| c.name() == channel.name()) {
                continue;
            }
            ordered.push(Arc::clone(channel));
        }
        ordered
    }

    /// Status of a submission through a specific channel.
    pub async fn status(
        &self,
        channel: &str,
        chain: ChainTag,
        signature: &str,
    ) -> HostResult<ChannelTxStatus> {
        let hit = self
            .channels
            .iter()
            .find(|c| c.name() == channel)
            .ok_or_else(|| HostError::invalid_params(format!("unknown channel: {channel}")))?;
        hit.status(chain, signature).await
    }

    /// Close every channel. Called during teardown.
    pub async fn close_all(&self) {
        for channel in &self.channels {
            channel.close().await;
        }
    }
}
