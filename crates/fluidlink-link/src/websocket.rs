//! WebSocket wire transport
//!
//! Non-blocking [`WireTransport`] over tokio-tungstenite. The socket
//! lives on a dedicated worker thread running a current-thread tokio
//! runtime; the poll-driven engine talks to it through unbounded
//! channels, so no engine call ever blocks.
//!
//! The worker owns the low-level reconnection policy: after a failed
//! connect or a dropped session it sleeps for the configured reconnect
//! interval, then tries again. An effectively-infinite interval turns
//! retries off in practice.

use crate::transport::{LinkDescriptor, TransportEvent, WireTransport};
use fluidlink_core::{LinkError, Result};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;

/// Commands flowing from the engine thread to the socket worker.
enum Outbound {
    Text(String),
    Bytes(Vec<u8>),
    Shutdown,
}

/// State shared between the engine-side handle and the worker.
struct Shared {
    open: AtomicBool,
    reconnect: Mutex<Duration>,
}

/// WebSocket transport handle. All methods return immediately.
pub struct WebSocketTransport {
    shared: Arc<Shared>,
    outbound: Option<UnboundedSender<Outbound>>,
    events: Option<UnboundedReceiver<TransportEvent>>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketTransport {
    /// Create an unconnected transport.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                open: AtomicBool::new(false),
                reconnect: Mutex::new(Duration::from_millis(2000)),
            }),
            outbound: None,
            events: None,
            worker: None,
        }
    }

    fn shutdown_worker(&mut self) {
        if let Some(tx) = self.outbound.take() {
            let _ = tx.send(Outbound::Shutdown);
        }
        self.events = None;
        // The worker winds down on its own once it sees the shutdown;
        // joining here would block the scheduling loop.
        self.worker = None;
        self.shared.open.store(false, Ordering::SeqCst);
    }
}

impl WireTransport for WebSocketTransport {
    fn connect(&mut self, descriptor: &LinkDescriptor) -> Result<()> {
        // A connect while a worker is live restarts the session.
        self.shutdown_worker();

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let shared = self.shared.clone();
        let url = descriptor.url();

        let handle = std::thread::Builder::new()
            .name("fluidlink-ws".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        tracing::error!(error = %e, "websocket runtime failed to start");
                        return;
                    }
                };
                runtime.block_on(worker_loop(url, shared, out_rx, event_tx));
            })
            .map_err(|e| LinkError::Other {
                message: format!("failed to spawn websocket worker: {e}"),
            })?;

        self.outbound = Some(out_tx);
        self.events = Some(event_rx);
        self.worker = Some(handle);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.shutdown_worker();
    }

    fn set_reconnect_interval(&mut self, interval: Duration) {
        *self.shared.reconnect.lock() = interval;
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        let tx = self.outbound.as_ref().ok_or(LinkError::NotConnected)?;
        tx.send(Outbound::Text(text.to_string()))
            .map_err(|_| LinkError::NotConnected.into())
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let tx = self.outbound.as_ref().ok_or(LinkError::NotConnected)?;
        tx.send(Outbound::Bytes(bytes.to_vec()))
            .map_err(|_| LinkError::NotConnected.into())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let Some(rx) = self.events.as_mut() else {
            return Vec::new();
        };
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.shutdown_worker();
    }
}

/// Connect, run the session, sleep, repeat. Exits on shutdown or when
/// the engine side goes away.
async fn worker_loop(
    url: String,
    shared: Arc<Shared>,
    mut out_rx: UnboundedReceiver<Outbound>,
    event_tx: UnboundedSender<TransportEvent>,
) {
    loop {
        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                tracing::debug!(url = %url, "websocket open");
                shared.open.store(true, Ordering::SeqCst);
                if event_tx.send(TransportEvent::Opened).is_err() {
                    return;
                }

                let shutdown = run_session(stream, &mut out_rx, &event_tx).await;

                shared.open.store(false, Ordering::SeqCst);
                if event_tx.send(TransportEvent::Closed).is_err() || shutdown {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "websocket connect failed");
            }
        }

        let interval = *shared.reconnect.lock();
        if wait_for_retry(interval, &mut out_rx).await {
            return;
        }
    }
}

/// Pump one open session. Returns true when a shutdown was requested.
async fn run_session(
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    out_rx: &mut UnboundedReceiver<Outbound>,
    event_tx: &UnboundedSender<TransportEvent>,
) -> bool {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outbound = out_rx.recv() => {
                let message = match outbound {
                    Some(Outbound::Text(text)) => Message::Text(text.into()),
                    Some(Outbound::Bytes(bytes)) => Message::Binary(bytes.into()),
                    Some(Outbound::Shutdown) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return true;
                    }
                };
                if let Err(e) = sink.send(message).await {
                    tracing::warn!(error = %e, "websocket send failed");
                    return false;
                }
            }
            inbound = source.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if event_tx
                            .send(TransportEvent::Frame(text.as_str().to_string()))
                            .is_err()
                        {
                            return true;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        // FluidNC occasionally frames report text as binary.
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        if event_tx.send(TransportEvent::Frame(text)).is_err() {
                            return true;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return false;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "websocket read failed");
                        return false;
                    }
                }
            }
        }
    }
}

/// Sleep out the reconnect interval, but wake immediately on shutdown.
/// Returns true when the worker should exit.
async fn wait_for_retry(interval: Duration, out_rx: &mut UnboundedReceiver<Outbound>) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            outbound = out_rx.recv() => {
                match outbound {
                    Some(Outbound::Shutdown) | None => return true,
                    // Sends while disconnected are dropped; the engine
                    // gates commands on its own connected flag.
                    Some(_) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconnected_sends_are_rejected() {
        let mut transport = WebSocketTransport::new();
        assert!(transport.send_text("?").is_err());
        assert!(transport.send_bytes(&[0x18]).is_err());
        assert!(!transport.is_open());
        assert!(transport.poll().is_empty());
    }

    #[tokio::test]
    async fn connect_to_unreachable_host_stays_closed() {
        let mut transport = WebSocketTransport::new();
        transport.set_reconnect_interval(Duration::from_millis(50));
        transport
            .connect(&LinkDescriptor::new("127.0.0.1", 1))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!transport.is_open());
        assert!(transport.poll().is_empty());
        transport.disconnect();
    }
}
