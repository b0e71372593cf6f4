// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Transport Abstraction
//!
//! Platform-agnostic interface to the gateway byte stream.

use std::fmt;

use crate::error::PushError;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, PushError>;

/// Connection state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to any server.
    #[default]
    Disconnected,
    /// Connection in progress (TCP connect and TLS handshake).
    Connecting,
    /// Connected and ready.
    Connected,
}

/// Opaque TLS credential material, handed unmodified to the TLS layer.
#[derive(Clone, Default)]
pub struct TlsCredentials {
    /// PKCS#12 archive carrying the client certificate and private key.
    pub pkcs12: Option<Vec<u8>>,
    /// Passphrase protecting the archive.
    pub passphrase: String,
}

impl fmt::Debug for TlsCredentials {
    // key material stays out of Debug output
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsCredentials")
            .field("pkcs12", &self.pkcs12.as_ref().map(|p| p.len()))
            .finish_non_exhaustive()
    }
}

/// Configuration for gateway connections.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Gateway hostname.
    pub host: String,
    /// Gateway port.
    pub port: u16,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Read/write timeout in milliseconds; reads returning within this
    /// window with no data surface as `Ok(None)`.
    pub io_timeout_ms: u64,
    /// Client credentials, opaque to the core.
    pub credentials: TlsCredentials,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            host: "gateway.push.apple.com".into(),
            port: 2195,
            connect_timeout_ms: 10_000,
            io_timeout_ms: 100,
            credentials: TlsCredentials::default(),
        }
    }
}

impl TransportConfig {
    /// Config for the production feedback service endpoint.
    pub fn feedback() -> Self {
        TransportConfig {
            host: "feedback.push.apple.com".into(),
            port: 2196,
            ..Default::default()
        }
    }

    /// Config for the sandbox gateway endpoint.
    pub fn sandbox() -> Self {
        TransportConfig {
            host: "gateway.sandbox.push.apple.com".into(),
            ..Default::default()
        }
    }

    /// Config for the sandbox feedback endpoint.
    pub fn sandbox_feedback() -> Self {
        TransportConfig {
            host: "feedback.sandbox.push.apple.com".into(),
            port: 2196,
            ..Default::default()
        }
    }

    /// `host:port` form for socket address resolution.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Outcome of handing bytes to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The bytes were accepted and flushed to the wire.
    Written,
    /// The bytes were accepted but the transport's write buffer is now
    /// full; hold further writes until `poll_writable` reports drained.
    Full,
}

/// Transport trait for the gateway byte stream.
///
/// This trait abstracts the underlying transport mechanism (TLS socket,
/// mock, ...) allowing for platform-specific implementations and easy
/// testing.
///
/// # Synchronous Interface
///
/// This trait uses synchronous methods for simplicity in the core library.
/// `connect` blocks through the handshake; `read` blocks at most the
/// configured I/O timeout and returns `Ok(None)` when no data arrived.
///
/// # Example
///
/// ```ignore
/// use petrel_core::{MockTransport, Transport, TransportConfig};
///
/// let mut transport = MockTransport::new();
/// transport.connect(&TransportConfig::default())?;
/// transport.write(&frame)?;
/// let inbound = transport.read()?;
/// transport.disconnect()?;
/// ```
pub trait Transport: Send {
    /// Connects to the configured endpoint.
    fn connect(&mut self, config: &TransportConfig) -> TransportResult<()>;

    /// Disconnects. Safe to call even if not connected.
    fn disconnect(&mut self) -> TransportResult<()>;

    /// Returns the current connection state.
    fn state(&self) -> ConnectionState;

    /// Hands one encoded frame to the transport.
    fn write(&mut self, bytes: &[u8]) -> TransportResult<WriteStatus>;

    /// Returns the next available chunk of inbound bytes, `Ok(None)` when
    /// nothing arrived within the I/O timeout, `Err(ConnectionClosed)` when
    /// the remote closed the stream.
    fn read(&mut self) -> TransportResult<Option<Vec<u8>>>;

    /// Tries to flush previously buffered outbound bytes; true when the
    /// transport has drained and accepts further writes.
    fn poll_writable(&mut self) -> TransportResult<bool>;
}
