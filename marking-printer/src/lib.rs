//! # marking-printer
//!
//! Continuous inkjet / marking printer library - device side only.
//!
//! ## Scope
//!
//! This crate handles HOW to talk to the printer:
//! - Wire protocol: command strings, status parsing, line classification
//! - Transports: TCP and serial
//! - Supervised connection with auto-reconnect and request/response correlation
//!
//! Business logic (WHAT to print, when) stays in application code:
//! - Print pipeline and state machine → coding-server
//!
//! ## Example
//!
//! ```ignore
//! use marking_printer::{ConnectionConfig, DeviceConnection, DeviceLink, RequestOptions, Transport};
//! use marking_printer::protocol::{classify, Command, Response};
//!
//! let conn = DeviceConnection::new(ConnectionConfig::new(Transport::tcp("192.168.1.50:3100")));
//! conn.connect()?;
//!
//! let line = conn
//!     .write_and_response(Command::QueryStatus.as_str(), RequestOptions::default())
//!     .await?;
//! if let Response::PrinterStatus(status) = classify(&line)? {
//!     println!("nozzle {}", status.nozzle_state);
//! }
//! ```

mod connection;
mod error;
pub mod protocol;
mod transport;

// Re-exports
pub use connection::{
    ConnectionConfig, ConnectionStatus, DeviceConnection, DeviceLink, RequestOptions,
    ResponseMatcher,
};
pub use error::{DeviceError, DeviceResult, ProtocolError};
pub use transport::Transport;
