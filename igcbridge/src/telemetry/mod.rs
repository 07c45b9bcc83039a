//! Telemetry Listener - UDP listener for simulator position data.
//!
//! Listens for ForeFlight-style text broadcasts (`XGPS` / `XATT`) and
//! publishes every datagram on the [`EventBus`] as a `DataReceived` event.
//! The listener never waits on consumers: publishing is the only thing the
//! receive loop does besides parsing and updating its own cache.
//!
//! # Setup
//!
//! In the simulator: enable "Broadcast flight info to IP address" (Aerofly FS)
//! or "Send position to ForeFlight" (X-Plane) on the configured port.
//!
//! # Example
//!
//! ```ignore
//! let bus = Arc::new(EventBus::new());
//! let listener = TelemetryListener::new(TelemetryListenerConfig::default(), bus.clone());
//! listener.start().await?;
//! // ...
//! listener.stop().await;
//! ```

mod protocol;
mod sample;
mod state;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{EventBus, EventKind, SOURCE_LISTENER};

pub use protocol::{parse_datagram, parse_line};
pub use sample::{
    AttitudeSample, PositionSample, SampleError, TelemetryRecord, UnrecognizedLine,
    TYPE_ATTITUDE, TYPE_POSITION, TYPE_UNRECOGNIZED,
};
pub use state::{AttitudeSummary, ConnectionState, ConnectionStatus, ListenerState, PositionSummary};

/// Default UDP port for ForeFlight-style broadcasts.
pub const DEFAULT_PORT: u16 = 49002;

/// Default receive buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Telemetry listener configuration.
#[derive(Debug, Clone)]
pub struct TelemetryListenerConfig {
    /// UDP port to listen on (0 picks an ephemeral port).
    pub port: u16,

    /// Maximum datagram size; longer datagrams are truncated.
    pub buffer_size: usize,

    /// A connection is considered live while data arrived within this window.
    pub connection_timeout: Duration,

    /// Pause after a receive error before trying again.
    pub error_backoff: Duration,

    /// How long `stop()` waits for the receive loop to exit.
    pub shutdown_timeout: Duration,
}

impl Default for TelemetryListenerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            connection_timeout: Duration::from_secs(5),
            error_backoff: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

/// Error type for the telemetry listener.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to bind the UDP socket.
    #[error("Failed to bind UDP socket on port {port}: {source}")]
    SocketBindError {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// `start()` called while the listener is running.
    #[error("Telemetry listener already running on port {port}")]
    AlreadyRunning { port: u16 },
}

/// Handle to a running receive loop.
struct ReceiveTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    port: u16,
}

/// UDP telemetry listener.
///
/// Owns the socket for as long as the receive loop runs and keeps a cache of
/// the latest samples for status queries.
pub struct TelemetryListener {
    config: TelemetryListenerConfig,
    bus: Arc<EventBus>,
    state: Arc<RwLock<ConnectionState>>,
    lifecycle: Mutex<ListenerState>,
    bound_addr: Mutex<Option<SocketAddr>>,
    task: tokio::sync::Mutex<Option<ReceiveTask>>,
}

impl TelemetryListener {
    /// Create a new listener.
    pub fn new(config: TelemetryListenerConfig, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            bus,
            state: Arc::new(RwLock::new(ConnectionState::default())),
            lifecycle: Mutex::new(ListenerState::Stopped),
            bound_addr: Mutex::new(None),
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults(bus: Arc<EventBus>) -> Self {
        Self::new(TelemetryListenerConfig::default(), bus)
    }

    /// Get the configured port.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn config(&self) -> &TelemetryListenerConfig {
        &self.config
    }

    pub fn state(&self) -> ListenerState {
        *self.lifecycle.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ListenerState::Running
    }

    /// Address the socket is bound to, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound_addr.lock()
    }

    /// Bind the socket and spawn the receive loop.
    ///
    /// Publishes `ConnectionEstablished` on success. On bind failure an
    /// `ErrorOccurred` event is published and the listener stays stopped.
    pub async fn start(&self) -> Result<SocketAddr, TelemetryError> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            warn!(port = self.config.port, "Telemetry listener already running");
            return Err(TelemetryError::AlreadyRunning {
                port: self.config.port,
            });
        }

        *self.lifecycle.lock() = ListenerState::Starting;

        let socket = match bind_socket(self.config.port) {
            Ok(socket) => socket,
            Err(source) => {
                *self.lifecycle.lock() = ListenerState::Failed;
                warn!(port = self.config.port, error = %source, "Failed to bind telemetry socket");
                self.bus.emit(
                    EventKind::ErrorOccurred,
                    SOURCE_LISTENER,
                    json!({
                        "error": format!("Failed to start UDP server: {}", source),
                        "port": self.config.port,
                    }),
                );
                *self.lifecycle.lock() = ListenerState::Stopped;
                return Err(TelemetryError::SocketBindError {
                    port: self.config.port,
                    source,
                });
            }
        };

        let local_addr = socket
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], self.config.port)));
        let cancel = CancellationToken::new();
        let receiver = ReceiveLoop {
            socket,
            buffer_size: self.config.buffer_size.max(1),
            error_backoff: self.config.error_backoff,
            port: local_addr.port(),
            bus: Arc::clone(&self.bus),
            state: Arc::clone(&self.state),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(receiver.run());

        *task = Some(ReceiveTask {
            cancel,
            handle,
            port: local_addr.port(),
        });
        *self.bound_addr.lock() = Some(local_addr);
        *self.lifecycle.lock() = ListenerState::Running;
        drop(task);

        info!(port = local_addr.port(), local_addr = %local_addr, "Telemetry listener started");
        self.bus.emit(
            EventKind::ConnectionEstablished,
            SOURCE_LISTENER,
            json!({ "type": "udp", "port": local_addr.port() }),
        );

        Ok(local_addr)
    }

    /// Stop the receive loop and release the socket.
    ///
    /// Publishes `ConnectionLost`. Does nothing when not running.
    pub async fn stop(&self) {
        let Some(task) = self.task.lock().await.take() else {
            debug!("Telemetry listener not running");
            return;
        };

        *self.lifecycle.lock() = ListenerState::Stopping;
        task.cancel.cancel();

        let mut handle = task.handle;
        match tokio::time::timeout(self.config.shutdown_timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Telemetry receive task ended abnormally"),
            Err(_) => {
                warn!(
                    timeout_ms = self.config.shutdown_timeout.as_millis() as u64,
                    "Telemetry receive task did not stop in time, aborting"
                );
                handle.abort();
            }
        }

        *self.bound_addr.lock() = None;
        *self.lifecycle.lock() = ListenerState::Stopped;
        info!(port = task.port, "Telemetry listener stopped");
        self.bus.emit(
            EventKind::ConnectionLost,
            SOURCE_LISTENER,
            json!({ "port": task.port }),
        );
    }

    /// Whether a datagram arrived within the connection timeout.
    pub fn has_connection(&self) -> bool {
        self.state
            .read()
            .has_connection(Instant::now(), self.config.connection_timeout)
    }

    pub fn latest_position(&self) -> Option<PositionSample> {
        self.state.read().latest_position().cloned()
    }

    pub fn latest_attitude(&self) -> Option<AttitudeSample> {
        self.state.read().latest_attitude().cloned()
    }

    /// Snapshot for status displays.
    pub fn connection_status(&self) -> ConnectionStatus {
        let port = self
            .local_addr()
            .map_or(self.config.port, |addr| addr.port());
        ConnectionStatus::from_state(
            &self.state.read(),
            self.state(),
            port,
            self.config.connection_timeout,
        )
    }
}

/// Bind a UDP socket on all interfaces with address reuse enabled.
fn bind_socket(port: u16) -> io::Result<UdpSocket> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

/// State moved into the spawned receive task.
struct ReceiveLoop {
    socket: UdpSocket,
    buffer_size: usize,
    error_backoff: Duration,
    port: u16,
    bus: Arc<EventBus>,
    state: Arc<RwLock<ConnectionState>>,
    cancel: CancellationToken,
}

impl ReceiveLoop {
    async fn run(self) {
        let mut buffer = vec![0u8; self.buffer_size];
        let mut datagrams: u64 = 0;

        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.socket.recv_from(&mut buffer) => result,
            };

            match received {
                Ok((len, addr)) => {
                    datagrams += 1;
                    if datagrams == 1 {
                        info!(port = self.port, source = %addr, len, "Received first telemetry datagram");
                    }
                    self.handle_datagram(&buffer[..len], addr);
                }
                Err(e) => {
                    warn!(port = self.port, error = %e, "UDP receive error");
                    self.bus.emit(
                        EventKind::ErrorOccurred,
                        SOURCE_LISTENER,
                        json!({ "error": format!("UDP receive error: {}", e), "port": self.port }),
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
            }
        }

        debug!(port = self.port, datagrams, "Telemetry receive loop exited");
    }

    fn handle_datagram(&self, data: &[u8], addr: SocketAddr) {
        let received_at = Instant::now();
        let record = parse_datagram(data, Some(Utc::now()));
        let text = String::from_utf8_lossy(data);
        let line = text.trim();

        self.state.write().observe(&record, received_at);

        self.bus.emit(
            EventKind::DataReceived,
            SOURCE_LISTENER,
            json!({
                "data": record.to_value(),
                "raw": line,
                "source": addr.to_string(),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, Handler};

    fn loopback_config() -> TelemetryListenerConfig {
        TelemetryListenerConfig {
            port: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = TelemetryListenerConfig::default();
        assert_eq!(config.port, 49002);
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_listener_creation() {
        let listener = TelemetryListener::with_defaults(Arc::new(EventBus::new()));
        assert_eq!(listener.port(), 49002);
        assert_eq!(listener.state(), ListenerState::Stopped);
        assert!(!listener.has_connection());
        assert!(listener.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_start_stop_publishes_connection_events() {
        let bus = Arc::new(EventBus::new());
        let listener = TelemetryListener::new(loopback_config(), bus.clone());

        let addr = listener.start().await.unwrap();
        assert!(listener.is_running());
        assert_ne!(addr.port(), 0);

        listener.stop().await;
        assert_eq!(listener.state(), ListenerState::Stopped);

        let kinds: Vec<EventKind> = bus.history().iter().map(Event::kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::ConnectionEstablished, EventKind::ConnectionLost]
        );
        let established = &bus.history()[0];
        assert_eq!(established.get("type"), Some(&json!("udp")));
        assert_eq!(established.get("port"), Some(&json!(addr.port())));
    }

    #[tokio::test]
    async fn test_double_start_fails() {
        let listener = TelemetryListener::new(loopback_config(), Arc::new(EventBus::new()));
        listener.start().await.unwrap();

        let err = listener.start().await.unwrap_err();
        assert!(matches!(err, TelemetryError::AlreadyRunning { .. }));
        assert!(listener.is_running());

        listener.stop().await;
    }

    #[tokio::test]
    async fn test_stop_when_not_running_is_noop() {
        let bus = Arc::new(EventBus::new());
        let listener = TelemetryListener::new(loopback_config(), bus.clone());
        listener.stop().await;
        assert!(bus.history().is_empty());
    }

    #[tokio::test]
    async fn test_bind_failure_publishes_error() {
        let occupied = std::net::UdpSocket::bind("0.0.0.0:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let bus = Arc::new(EventBus::new());
        let listener = TelemetryListener::new(
            TelemetryListenerConfig {
                port,
                ..Default::default()
            },
            bus.clone(),
        );

        let err = listener.start().await.unwrap_err();
        assert!(matches!(err, TelemetryError::SocketBindError { port: p, .. } if p == port));
        assert_eq!(listener.state(), ListenerState::Stopped);
        assert_eq!(bus.history_of(EventKind::ErrorOccurred).len(), 1);
        assert!(bus.history_of(EventKind::ConnectionEstablished).is_empty());
    }

    #[tokio::test]
    async fn test_datagram_is_published_and_cached() {
        let bus = Arc::new(EventBus::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        bus.subscribe(
            EventKind::DataReceived,
            Handler::sync(move |event| {
                let _ = tx.send(event.clone());
                Ok(())
            }),
        );

        let listener = TelemetryListener::new(loopback_config(), bus.clone());
        let addr = listener.start().await.unwrap();

        let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(
                b"XGPSSim,8.5417,47.3769,1200.0,90.0,30.0\n",
                ("127.0.0.1", addr.port()),
            )
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.get("raw"), Some(&json!("XGPSSim,8.5417,47.3769,1200.0,90.0,30.0")));
        assert_eq!(event.payload()["data"]["type"], "XGPS");
        assert!(event.get("source").is_some());

        assert!(listener.has_connection());
        assert_eq!(listener.latest_position().map(|p| p.latitude()), Some(47.3769));

        let status = listener.connection_status();
        assert!(status.running);
        assert_eq!(status.port, addr.port());
        assert_eq!(status.datagrams_received, 1);

        listener.stop().await;
    }

    #[tokio::test]
    async fn test_invalid_utf8_datagram_is_decoded_lossily() {
        let bus = Arc::new(EventBus::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        bus.subscribe(
            EventKind::DataReceived,
            Handler::sync(move |event| {
                let _ = tx.send(event.clone());
                Ok(())
            }),
        );

        let listener = TelemetryListener::new(loopback_config(), bus.clone());
        let addr = listener.start().await.unwrap();

        let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(b"\xffXATTSim,1,2,3\r\n", ("127.0.0.1", addr.port()))
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.get("raw"), Some(&json!("\u{FFFD}XATTSim,1,2,3")));
        assert_eq!(event.payload()["data"]["type"], "UNKNOWN");
        assert_eq!(
            event.payload()["data"]["raw_line"],
            json!("\u{FFFD}XATTSim,1,2,3")
        );
        assert!(listener.latest_attitude().is_none());

        listener.stop().await;
    }
}
