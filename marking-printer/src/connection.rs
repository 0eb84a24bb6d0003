//! Supervised duplex connection to a marking printer
//!
//! A background supervisor keeps the transport open:
//!
//! ```text
//! closed → connecting → open → (error | ended) → closed → (retry after interval)
//! ```
//!
//! Inbound bytes are framed into lines and fanned out on a broadcast
//! channel. `write_and_response` correlates one request with the first
//! matching line under a timeout; only one such request is in flight at a
//! time.

use crate::error::{DeviceError, DeviceResult};
use crate::transport::{BoxReader, BoxWriter, Transport};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const LINE_CHANNEL_CAPACITY: usize = 1024;
const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Connection state, observable through [`DeviceConnection::subscribe_status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Closed,
    Connecting,
    Open,
    Error,
    Ended,
}

impl ConnectionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Error => "error",
            Self::Ended => "ended",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub transport: Transport,
    /// Inbound line delimiters; any of these bytes ends a line
    pub delimiters: Vec<u8>,
    /// Appended to every outgoing write
    pub write_terminator: String,
    pub reconnect_interval: Duration,
    pub connect_timeout: Duration,
    /// Default timeout for `write_and_response`
    pub response_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(transport: Transport) -> Self {
        Self {
            delimiters: transport.default_delimiters(),
            transport,
            write_terminator: "\r".to_string(),
            reconnect_interval: Duration::from_millis(3000),
            connect_timeout: Duration::from_millis(5000),
            response_timeout: Duration::from_millis(5000),
        }
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }
}

/// Which inbound line answers a request
#[derive(Clone)]
pub enum ResponseMatcher {
    /// First line received
    Any,
    Contains(String),
    Prefix(String),
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl ResponseMatcher {
    pub fn matches(&self, line: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Contains(needle) => line.contains(needle.as_str()),
            Self::Prefix(prefix) => line.starts_with(prefix.as_str()),
            Self::Predicate(f) => f(line),
        }
    }
}

impl std::fmt::Debug for ResponseMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "Any"),
            Self::Contains(s) => write!(f, "Contains({:?})", s),
            Self::Prefix(s) => write!(f, "Prefix({:?})", s),
            Self::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

/// Options for [`DeviceLink::write_and_response`]
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub expect: ResponseMatcher,
    /// Falls back to the connection's response timeout when `None`
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            expect: ResponseMatcher::Any,
            timeout: None,
        }
    }
}

impl RequestOptions {
    pub fn expect(matcher: ResponseMatcher) -> Self {
        Self {
            expect: matcher,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What a printer driver needs from a device channel
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Best-effort write; failures are logged, never returned
    async fn write(&self, data: &str);

    /// Write `data` and wait for the first line accepted by `options.expect`
    async fn write_and_response(&self, data: &str, options: RequestOptions)
    -> DeviceResult<String>;

    /// Subscribe to every inbound line; drop the receiver to unsubscribe
    fn subscribe(&self) -> broadcast::Receiver<String>;

    fn status(&self) -> ConnectionStatus;
}

/// State shared with the supervisor task
struct Inner {
    config: ConnectionConfig,
    writer: tokio::sync::Mutex<Option<BoxWriter>>,
    lines: broadcast::Sender<String>,
    status: watch::Sender<ConnectionStatus>,
}

impl Inner {
    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
        debug!(status = %status, "Connection status changed");
    }
}

struct Supervisor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Device connection with automatic reconnect
pub struct DeviceConnection {
    inner: Arc<Inner>,
    request_guard: tokio::sync::Mutex<()>,
    supervisor: parking_lot::Mutex<Option<Supervisor>>,
}

impl DeviceConnection {
    pub fn new(config: ConnectionConfig) -> Self {
        let (lines, _) = broadcast::channel(LINE_CHANNEL_CAPACITY);
        let (status, _) = watch::channel(ConnectionStatus::Closed);
        Self {
            inner: Arc::new(Inner {
                config,
                writer: tokio::sync::Mutex::new(None),
                lines,
                status,
            }),
            request_guard: tokio::sync::Mutex::new(()),
            supervisor: parking_lot::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Start the supervisor. Returns immediately; the transport opens in
    /// the background and is retried until [`disconnect`](Self::disconnect).
    pub fn connect(&self) -> DeviceResult<()> {
        self.inner.config.transport.validate()?;

        let mut supervisor = self.supervisor.lock();
        if supervisor.is_some() {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervise(self.inner.clone(), cancel.clone()));
        *supervisor = Some(Supervisor { cancel, handle });
        info!(transport = %self.inner.config.transport, "Device connection started");
        Ok(())
    }

    /// Stop the supervisor and close the transport
    pub async fn disconnect(&self) {
        let supervisor = self.supervisor.lock().take();
        if let Some(Supervisor { cancel, handle }) = supervisor {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "Connection supervisor ended abnormally");
            }
            info!(transport = %self.inner.config.transport, "Device connection stopped");
        }
    }

    pub fn is_open(&self) -> bool {
        *self.inner.status.borrow() == ConnectionStatus::Open
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Wait until the transport is open, up to `timeout`
    pub async fn wait_open(&self, timeout: Duration) -> DeviceResult<()> {
        let mut rx = self.subscribe_status();
        tokio::time::timeout(timeout, rx.wait_for(|s| *s == ConnectionStatus::Open))
            .await
            .map_err(|_| DeviceError::Timeout("device did not come online".into()))?
            .map(|_| ())
            .map_err(|_| DeviceError::NotConnected)
    }

    /// Write `data` plus the terminator
    pub async fn send(&self, data: &str) -> DeviceResult<()> {
        let mut guard = self.inner.writer.lock().await;
        let writer = guard.as_mut().ok_or(DeviceError::NotConnected)?;

        let mut frame = Vec::with_capacity(data.len() + self.inner.config.write_terminator.len());
        frame.extend_from_slice(data.as_bytes());
        frame.extend_from_slice(self.inner.config.write_terminator.as_bytes());

        writer.write_all(&frame).await?;
        writer.flush().await?;
        debug!(data = %data.escape_debug(), "Wrote to device");
        Ok(())
    }
}

#[async_trait]
impl DeviceLink for DeviceConnection {
    async fn write(&self, data: &str) {
        if let Err(e) = self.send(data).await {
            warn!(error = %e, data = %data.escape_debug(), "Device write failed");
        }
    }

    #[instrument(skip(self, data, options), fields(data = %data.escape_debug()))]
    async fn write_and_response(
        &self,
        data: &str,
        options: RequestOptions,
    ) -> DeviceResult<String> {
        let _in_flight = self.request_guard.lock().await;
        let timeout = options.timeout.unwrap_or(self.inner.config.response_timeout);

        // Subscribe before writing so a fast reply is not missed
        let mut rx = self.inner.lines.subscribe();
        self.send(data).await?;

        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(line) if options.expect.matches(&line) => return Ok(line),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Response listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(DeviceError::NotConnected);
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait).await.map_err(|_| {
            DeviceError::Timeout(format!(
                "no response to {} within {}ms",
                data.escape_debug(),
                timeout.as_millis()
            ))
        })?
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.inner.lines.subscribe()
    }

    fn status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }
}

impl Drop for DeviceConnection {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.get_mut().take() {
            supervisor.cancel.cancel();
        }
    }
}

/// Keep the transport open until cancelled
async fn supervise(inner: Arc<Inner>, cancel: CancellationToken) {
    let config = &inner.config;

    loop {
        inner.set_status(ConnectionStatus::Connecting);

        let opened = tokio::select! {
            _ = cancel.cancelled() => break,
            result = config.transport.open(config.connect_timeout) => result,
        };

        match opened {
            Ok((reader, writer)) => {
                *inner.writer.lock().await = Some(writer);
                inner.set_status(ConnectionStatus::Open);
                info!(transport = %config.transport, "Device connected");

                let ended = tokio::select! {
                    _ = cancel.cancelled() => None,
                    result = read_lines(reader, &inner) => Some(result),
                };
                inner.writer.lock().await.take();

                match ended {
                    None => break,
                    Some(Ok(())) => {
                        warn!(transport = %config.transport, "Device closed the connection");
                        inner.set_status(ConnectionStatus::Ended);
                    }
                    Some(Err(e)) => {
                        warn!(transport = %config.transport, error = %e, "Device connection error");
                        inner.set_status(ConnectionStatus::Error);
                    }
                }
            }
            Err(e) => {
                warn!(transport = %config.transport, error = %e, "Device connect failed");
                inner.set_status(ConnectionStatus::Error);
            }
        }

        inner.set_status(ConnectionStatus::Closed);

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(config.reconnect_interval) => {
                info!(
                    transport = %config.transport,
                    interval_ms = config.reconnect_interval.as_millis() as u64,
                    "Reconnecting to device"
                );
            }
        }
    }

    inner.writer.lock().await.take();
    inner.set_status(ConnectionStatus::Closed);
}

/// Frame inbound bytes into lines until EOF or error
async fn read_lines(reader: BoxReader, inner: &Inner) -> DeviceResult<()> {
    let codec = AnyDelimiterCodec::new_with_max_length(
        inner.config.delimiters.clone(),
        Vec::new(),
        MAX_LINE_LENGTH,
    );
    let mut frames = FramedRead::new(reader, codec);

    while let Some(frame) = frames.next().await {
        let frame = frame.map_err(|e| DeviceError::Connection(e.to_string()))?;
        if frame.is_empty() {
            continue;
        }
        let line = String::from_utf8_lossy(&frame).into_owned();
        debug!(line = %line.escape_debug(), "Device line");
        // No receivers is fine
        let _ = inner.lines.send(line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matchers() {
        assert!(ResponseMatcher::Any.matches("anything"));
        assert!(ResponseMatcher::Contains("=RS".into()).matches("^0=RS1 6 0 0 0"));
        assert!(!ResponseMatcher::Contains("=SM".into()).matches("^0=RS1 6 0 0 0"));
        assert!(ResponseMatcher::Prefix("^0".into()).matches("^0!GO"));
        assert!(!ResponseMatcher::Prefix("^0".into()).matches("INK LOW"));
        let even = ResponseMatcher::Predicate(Arc::new(|l: &str| l.len() % 2 == 0));
        assert!(even.matches("ab"));
        assert!(!even.matches("abc"));
    }

    #[test]
    fn test_config_defaults() {
        let tcp = ConnectionConfig::new(Transport::tcp("127.0.0.1:3100"));
        assert_eq!(tcp.delimiters, b"\r");
        assert_eq!(tcp.write_terminator, "\r");
        assert_eq!(tcp.reconnect_interval, Duration::from_millis(3000));
        assert_eq!(tcp.response_timeout, Duration::from_millis(5000));

        let serial = ConnectionConfig::new(Transport::serial("/dev/ttyUSB0", 115200));
        assert_eq!(serial.delimiters, b"\r\n");
    }

    #[tokio::test]
    async fn test_write_without_connection() {
        let conn = DeviceConnection::new(ConnectionConfig::new(Transport::tcp("127.0.0.1:1")));
        assert_eq!(conn.status(), ConnectionStatus::Closed);
        assert!(matches!(conn.send("^0?RS").await, Err(DeviceError::NotConnected)));
        assert!(matches!(
            conn.write_and_response("^0?RS", RequestOptions::default()).await,
            Err(DeviceError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let conn = DeviceConnection::new(ConnectionConfig::new(Transport::tcp("")));
        assert!(matches!(conn.connect(), Err(DeviceError::InvalidConfig(_))));
    }
}
