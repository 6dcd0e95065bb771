use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::update::{InboundMessage, Reply};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to connect to the update source: {0}")]
    Connect(String),
    #[error("failed to receive an update: {0}")]
    Receive(String),
    #[error("failed to send a reply: {0}")]
    Send(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("update polling gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: TransportError },
}

/// A source of inbound messages and a sink for replies. Production uses
/// the long-polling HTTP transport; tests script a sequence by hand.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    /// Blocks until the next message arrives. `None` means the transport
    /// closed cleanly and the runner should reconnect.
    async fn next_message(&self) -> Result<Option<InboundMessage>, TransportError>;

    async fn send_reply(&self, reply: &Reply) -> Result<(), TransportError>;
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, message: &InboundMessage) -> Reply;
}

#[derive(Clone, Copy, Debug)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 500, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.min(16);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Pulls messages off a transport and feeds them through the handler one
/// at a time, reconnecting with backoff when the transport drops. The
/// retry counter resets after any successfully handled message.
pub struct PollingRunner<T, H> {
    transport: T,
    handler: H,
    policy: ReconnectPolicy,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Flips the runner into draining mode; the in-flight message still runs
/// to completion so a submitted report is never dropped mid-call.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

enum LoopExit {
    Shutdown,
    Disconnected { error: TransportError, handled_any: bool },
}

impl<T, H> PollingRunner<T, H>
where
    T: UpdateTransport,
    H: MessageHandler,
{
    pub fn new(transport: T, handler: H, policy: ReconnectPolicy) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self { transport, handler, policy, shutdown_tx, shutdown_rx }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { tx: self.shutdown_tx.clone() }
    }

    pub async fn start(&self) -> Result<(), RunnerError> {
        let mut consecutive_failures = 0u32;

        loop {
            if consecutive_failures > 0 {
                let delay = self.policy.delay_for_attempt(consecutive_failures - 1);
                warn!(
                    attempt = consecutive_failures,
                    delay_ms = delay.as_millis() as u64,
                    "reconnecting update transport"
                );
                tokio::time::sleep(delay).await;
            }

            match self.poll_loop().await {
                LoopExit::Shutdown => {
                    info!("update runner stopped");
                    return Ok(());
                }
                LoopExit::Disconnected { error, handled_any } => {
                    // Delivered traffic proves the connection recovered, so
                    // only an unbroken run of failures counts toward the cap.
                    if handled_any {
                        consecutive_failures = 0;
                    }
                    consecutive_failures += 1;
                    error!(attempt = consecutive_failures, error = %error, "update transport dropped");

                    if consecutive_failures > self.policy.max_retries {
                        return Err(RunnerError::RetriesExhausted {
                            attempts: consecutive_failures,
                            last_error: error,
                        });
                    }
                }
            }
        }
    }

    async fn poll_loop(&self) -> LoopExit {
        let mut shutdown = self.shutdown_rx.clone();
        if *shutdown.borrow() {
            return LoopExit::Shutdown;
        }

        let mut handled_any = false;
        loop {
            let received = tokio::select! {
                _ = shutdown.changed() => return LoopExit::Shutdown,
                received = self.transport.next_message() => received,
            };

            match received {
                Ok(Some(message)) => {
                    let reply = self.handler.handle_message(&message).await;
                    handled_any = true;
                    if let Err(err) = self.transport.send_reply(&reply).await {
                        // The dialog state is already persisted; the user can
                        // re-send and pick up where they left off.
                        warn!(chat_id = reply.chat_id, error = %err, "failed to deliver reply");
                    }
                    if *shutdown.borrow() {
                        return LoopExit::Shutdown;
                    }
                }
                Ok(None) => {
                    return LoopExit::Disconnected {
                        error: TransportError::Receive("transport closed".into()),
                        handled_any,
                    };
                }
                Err(error) => return LoopExit::Disconnected { error, handled_any },
            }
        }
    }
}
