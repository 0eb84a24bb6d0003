//! Byte transports to the device
//!
//! - TCP (printer network port)
//! - Serial (RS-232 / USB serial adapters)

use crate::error::{DeviceError, DeviceResult};
use serial2_tokio::SerialPort;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Where the device lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// `host:port`
    Tcp { addr: String },
    Serial { path: String, baud_rate: u32 },
}

impl Transport {
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::Tcp { addr: addr.into() }
    }

    pub fn serial(path: impl Into<String>, baud_rate: u32) -> Self {
        Self::Serial {
            path: path.into(),
            baud_rate,
        }
    }

    pub fn validate(&self) -> DeviceResult<()> {
        match self {
            Self::Tcp { addr } if addr.trim().is_empty() => {
                Err(DeviceError::InvalidConfig("empty TCP address".into()))
            }
            Self::Serial { path, .. } if path.trim().is_empty() => {
                Err(DeviceError::InvalidConfig("empty serial path".into()))
            }
            Self::Serial { baud_rate: 0, .. } => {
                Err(DeviceError::InvalidConfig("baud rate must be > 0".into()))
            }
            _ => Ok(()),
        }
    }

    /// Default inbound line delimiters (`\r` for the socket, `\r\n` for serial)
    pub fn default_delimiters(&self) -> Vec<u8> {
        match self {
            Self::Tcp { .. } => b"\r".to_vec(),
            Self::Serial { .. } => b"\r\n".to_vec(),
        }
    }

    /// Open the transport and split it into independent halves
    #[instrument(skip(self), fields(transport = %self))]
    pub async fn open(&self, connect_timeout: Duration) -> DeviceResult<(BoxReader, BoxWriter)> {
        match self {
            Self::Tcp { addr } => {
                let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr.as_str()))
                    .await
                    .map_err(|_| DeviceError::Timeout(format!("Connection timeout: {}", addr)))?
                    .map_err(|e| DeviceError::Connection(format!("{}: {}", addr, e)))?;
                stream.set_nodelay(true)?;
                debug!("TCP transport open");
                let (reader, writer) = stream.into_split();
                Ok((Box::new(reader), Box::new(writer)))
            }
            Self::Serial { path, baud_rate } => {
                let port = SerialPort::open(path, *baud_rate)
                    .map_err(|e| DeviceError::Connection(format!("{}: {}", path, e)))?;
                debug!("Serial transport open");
                let (reader, writer) = tokio::io::split(port);
                Ok((Box::new(reader), Box::new(writer)))
            }
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp { addr } => write!(f, "tcp://{}", addr),
            Self::Serial { path, baud_rate } => write!(f, "serial://{}@{}", path, baud_rate),
        }
    }
}
