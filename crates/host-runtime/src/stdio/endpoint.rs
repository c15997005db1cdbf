//! Bidirectional RPC over the native-messaging pipe.
//!
//! One reader task parses incoming frames and dispatches requests
//! concurrently; one writer task serializes every outbound frame
//! (responses, event pushes) through a common queue so frames never
//! interleave on the pipe.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use host_bus::{EventBroadcaster, SessionTransport};
use host_types::{RpcResponse, Shutdown, StdioFrame};

use crate::stdio::framing::{read_frame, write_frame};
use crate::stdio::methods::MethodTable;

/// Outbound frames buffered before event pushes start dropping.
const WRITE_QUEUE_CAPACITY: usize = 256;

/// Grace given to the writer to flush its queue on shutdown.
const FLUSH_GRACE: Duration = Duration::from_secs(1);

/// Session ID the stdio peer registers under with the broadcaster.
pub const STDIO_SESSION_ID: &str = "stdio";

/// The extension-facing endpoint.
pub struct StdioEndpoint {
    methods: Arc<MethodTable>,
    bus: Arc<EventBroadcaster>,
    shutdown: Arc<Shutdown>,
}

impl StdioEndpoint {
    pub fn new(methods: Arc<MethodTable>, bus: Arc<EventBroadcaster>, shutdown: Arc<Shutdown>) -> Self {
        Self {
            methods,
            bus,
            shutdown,
        }
    }

    /// Serve the pipe until EOF, a `shutdown` RPC, or the root signal.
    ///
    /// Generic over the pipe halves so tests can drive an in-memory
    /// duplex instead of real stdio.
    pub async fn run<R, W>(&self, mut reader: R, writer: W)
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (write_tx, write_rx) = mpsc::channel::<Value>(WRITE_QUEUE_CAPACITY);

        let writer_handle = tokio::spawn(writer_task(
            writer,
            write_rx,
            self.shutdown.listener(),
        ));
        let pump_handle = tokio::spawn(event_pump(
            Arc::clone(&self.bus),
            write_tx.clone(),
            self.shutdown.listener(),
        ));

        let mut shutdown = self.shutdown.listener();
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                frame = read_frame(&mut reader) => {
                    match frame {
                        Ok(Some(value)) => self.handle_frame(value, &write_tx),
                        Ok(None) => {
                            info!("Stdio peer closed the pipe");
                            self.shutdown.trigger();
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "Stdio framing error, shutting down");
                            self.shutdown.trigger();
                            break;
                        }
                    }
                }
            }
        }

        // Let the writer drain; it bounds its own grace.
        drop(write_tx);
        let _ = tokio::time::timeout(FLUSH_GRACE * 2, writer_handle).await;
        pump_handle.abort();
        let _ = pump_handle.await;
        info!("Stdio endpoint stopped");
    }

    fn handle_frame(&self, value: Value, write_tx: &mpsc::Sender<Value>) {
        let request = match serde_json::from_value::<StdioFrame>(value) {
            Ok(StdioFrame::Request(request)) => request,
            Ok(StdioFrame::Response(_)) => {
                warn!("Unexpected rpc_response frame from peer, ignoring");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Unparseable stdio frame, ignoring");
                return;
            }
        };

        let methods = Arc::clone(&self.methods);
        let shutdown = Arc::clone(&self.shutdown);
        let write_tx = write_tx.clone();
        // Requests run concurrently; method-level locks (the wallet
        // store's exclusive lock, the registry's map lock) serialize
        // where it matters.
        tokio::spawn(async move {
            let is_shutdown = request.method == "shutdown";
            debug!(method = request.method.as_str(), "Stdio request");

            let response = match methods.dispatch(&request.method, &request.params).await {
                Ok(result) => RpcResponse::success(request.id, result),
                Err(err) => RpcResponse::from_host_error(request.id, &err),
            };
            let frame = serde_json::to_value(StdioFrame::Response(response))
                .unwrap_or(Value::Null);
            let _ = write_tx.send(frame).await;

            if is_shutdown {
                // Reply is queued; the writer drains it within the
                // flush grace before the process exits.
                shutdown.trigger();
            }
        });
    }
}

async fn writer_task<W>(
    mut writer: W,
    mut write_rx: mpsc::Receiver<Value>,
    mut shutdown: host_types::ShutdownListener,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            frame = write_rx.recv() => match frame {
                Some(value) => {
                    if let Err(e) = write_frame(&mut writer, &value).await {
                        warn!(error = %e, "Stdio write failed, stopping writer");
                        return;
                    }
                }
                None => return,
            },
            _ = shutdown.wait() => {
                // Bounded drain, then close the pipe.
                let deadline = tokio::time::sleep(FLUSH_GRACE);
                tokio::pin!(deadline);
                loop {
                    tokio::select! {
                        frame = write_rx.recv() => match frame {
                            Some(value) => {
                                if write_frame(&mut writer, &value).await.is_err() {
                                    return;
                                }
                            }
                            None => return,
                        },
                        _ = &mut deadline => {
                            debug!("Stdio writer flush grace elapsed");
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Forwards broadcast events onto the pipe as bare event frames.
async fn event_pump(
    bus: Arc<EventBroadcaster>,
    write_tx: mpsc::Sender<Value>,
    mut shutdown: host_types::ShutdownListener,
) {
    let mut queue = bus.register(STDIO_SESSION_ID, SessionTransport::Stdio);
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            event = queue.recv() => match event {
                Some(event) => {
                    let frame = serde_json::to_value(&event).unwrap_or(Value::Null);
                    if write_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }
    bus.unregister(STDIO_SESSION_ID);
}
