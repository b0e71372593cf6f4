// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! TLS Transport
//!
//! Production transport: a raw TLS stream to the gateway using native-tls
//! over a `TcpStream` with read/write timeouts.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use native_tls::TlsConnector;

use crate::error::PushError;
use crate::transport::{
    ConnectionState, Transport, TransportConfig, TransportResult, WriteStatus,
};

const READ_CHUNK_SIZE: usize = 4096;

/// TLS transport for gateway communication.
///
/// Writes spill into an internal buffer when the socket stops accepting
/// bytes within the write timeout, so a partially-written frame is never
/// torn; the spill surfaces to the channel as `WriteStatus::Full` and is
/// flushed by `poll_writable`.
///
/// # Example
///
/// ```ignore
/// use petrel_core::{TlsTransport, Transport, TransportConfig, TlsCredentials};
///
/// let mut transport = TlsTransport::new();
/// let config = TransportConfig {
///     credentials: TlsCredentials { pkcs12: Some(archive), passphrase: pass },
///     ..Default::default()
/// };
/// transport.connect(&config)?;
/// ```
pub struct TlsTransport {
    stream: Option<native_tls::TlsStream<TcpStream>>,
    /// Bytes accepted by write() but not yet flushed to the socket.
    outbound: Vec<u8>,
    state: ConnectionState,
}

impl TlsTransport {
    /// Creates a new, disconnected TLS transport.
    pub fn new() -> Self {
        TlsTransport {
            stream: None,
            outbound: Vec::new(),
            state: ConnectionState::Disconnected,
        }
    }

    /// Attempts to push the spill buffer onto the socket. Ok(true) when it
    /// drained, Ok(false) when the socket stopped accepting bytes.
    fn flush_outbound(&mut self) -> TransportResult<bool> {
        let stream = self.stream.as_mut().ok_or(PushError::NotConnected)?;
        while !self.outbound.is_empty() {
            match stream.write(&self.outbound) {
                Ok(0) => {
                    return Err(PushError::SendFailed("socket accepted no bytes".into()))
                }
                Ok(written) => {
                    self.outbound.drain(..written);
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    return Ok(false);
                }
                Err(e) => return Err(PushError::SendFailed(e.to_string())),
            }
        }
        Ok(true)
    }

    fn teardown(&mut self) {
        self.stream = None;
        self.outbound.clear();
        self.state = ConnectionState::Disconnected;
    }
}

impl Default for TlsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TlsTransport {
    fn connect(&mut self, config: &TransportConfig) -> TransportResult<()> {
        if matches!(self.state, ConnectionState::Connected) {
            return Ok(());
        }

        self.state = ConnectionState::Connecting;

        let mut addrs = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| {
                self.state = ConnectionState::Disconnected;
                PushError::ConnectionFailed(e.to_string())
            })?;
        let addr = addrs.next().ok_or_else(|| {
            self.state = ConnectionState::Disconnected;
            PushError::ConnectionFailed(format!("no address for {}", config.addr()))
        })?;

        let tcp_stream = TcpStream::connect_timeout(
            &addr,
            Duration::from_millis(config.connect_timeout_ms),
        )
        .map_err(|e| {
            self.state = ConnectionState::Disconnected;
            PushError::ConnectionFailed(e.to_string())
        })?;

        tcp_stream
            .set_read_timeout(Some(Duration::from_millis(config.io_timeout_ms)))
            .map_err(|e| PushError::ConnectionFailed(e.to_string()))?;
        tcp_stream
            .set_write_timeout(Some(Duration::from_millis(config.io_timeout_ms)))
            .map_err(|e| PushError::ConnectionFailed(e.to_string()))?;

        let mut builder = TlsConnector::builder();
        if let Some(pkcs12) = &config.credentials.pkcs12 {
            let identity =
                native_tls::Identity::from_pkcs12(pkcs12, &config.credentials.passphrase)
                    .map_err(|e| {
                        self.state = ConnectionState::Disconnected;
                        PushError::ConnectionFailed(format!("client identity: {}", e))
                    })?;
            builder.identity(identity);
        }
        let connector = builder.build().map_err(|e| {
            self.state = ConnectionState::Disconnected;
            PushError::ConnectionFailed(format!("TLS setup failed: {}", e))
        })?;

        let stream = connector.connect(&config.host, tcp_stream).map_err(|e| {
            self.state = ConnectionState::Disconnected;
            PushError::ConnectionFailed(format!("TLS handshake failed: {}", e))
        })?;

        self.stream = Some(stream);
        self.state = ConnectionState::Connected;
        Ok(())
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown(); // Ignore errors on close
        }
        self.outbound.clear();
        self.state = ConnectionState::Disconnected;
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.state.clone()
    }

    fn write(&mut self, bytes: &[u8]) -> TransportResult<WriteStatus> {
        if self.state != ConnectionState::Connected {
            return Err(PushError::NotConnected);
        }

        self.outbound.extend_from_slice(bytes);
        match self.flush_outbound() {
            Ok(true) => Ok(WriteStatus::Written),
            Ok(false) => Ok(WriteStatus::Full),
            Err(e) => {
                self.teardown();
                Err(e)
            }
        }
    }

    fn read(&mut self) -> TransportResult<Option<Vec<u8>>> {
        let stream = self.stream.as_mut().ok_or(PushError::NotConnected)?;

        let mut buf = [0u8; READ_CHUNK_SIZE];
        match stream.read(&mut buf) {
            Ok(0) => {
                self.teardown();
                Err(PushError::ConnectionClosed)
            }
            Ok(read) => Ok(Some(buf[..read].to_vec())),
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                // No data within the read timeout
                Ok(None)
            }
            Err(e) => {
                self.teardown();
                Err(PushError::ReceiveFailed(e.to_string()))
            }
        }
    }

    fn poll_writable(&mut self) -> TransportResult<bool> {
        if self.stream.is_none() {
            return Err(PushError::NotConnected);
        }
        match self.flush_outbound() {
            Ok(drained) => Ok(drained),
            Err(e) => {
                self.teardown();
                Err(e)
            }
        }
    }
}
