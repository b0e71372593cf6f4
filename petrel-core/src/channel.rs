// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Push Channel
//!
//! Owns one persistent outbound connection to the gateway: encodes and
//! writes frames, assigns sequence numbers, buffers writes under transport
//! backpressure and scans the inbound stream for asynchronous error
//! reports. Everything it learns is reported as [`ChannelEvent`]s; the
//! channel never retries on its own.

use std::collections::VecDeque;

use crate::codec::{decode_error_report, encode_frame, ERROR_REPORT_SIZE};
use crate::error::PushError;
use crate::events::ChannelEvent;
use crate::notification::Notification;
use crate::transport::{
    ConnectionState, Transport, TransportConfig, TransportResult, WriteStatus,
};

/// Configuration for a push channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Use the extended frame format carrying a sequence number and expiry.
    /// Without it no sequence numbers are assigned and per-message error
    /// correlation is impossible.
    pub use_extended_format: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            use_extended_format: true,
        }
    }
}

/// Channel states as observable from the outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    /// Connected; writes go straight to the transport.
    AuthorizedIdle,
    /// Connected, but the transport write buffer is full; sends queue in
    /// the retry-order FIFO until the transport drains.
    AuthorizedBuffering,
}

/// A frame accepted while the transport was full, flushed in send order.
struct BufferedFrame {
    sequence: Option<u32>,
    frame: Vec<u8>,
}

/// One persistent outbound connection to the gateway.
///
/// # Example
///
/// ```ignore
/// use petrel_core::{ChannelConfig, MockTransport, PushChannel, TransportConfig};
///
/// let mut channel = PushChannel::new(
///     MockTransport::new(),
///     TransportConfig::default(),
///     ChannelConfig::default(),
/// );
/// channel.send(&mut notification)?;
/// while let Some(event) = channel.poll_event() {
///     // Sent / BufferFull / ErrorReport / ...
/// }
/// ```
pub struct PushChannel<T: Transport> {
    transport: T,
    transport_config: TransportConfig,
    config: ChannelConfig,
    next_sequence: u32,
    buffering: bool,
    retry_queue: VecDeque<BufferedFrame>,
    /// Unconsumed inbound bytes, scanned in 6-byte records.
    inbound: Vec<u8>,
    events: VecDeque<ChannelEvent>,
}

impl<T: Transport> PushChannel<T> {
    /// Creates a channel over a transport. Nothing connects until the
    /// first send.
    pub fn new(transport: T, transport_config: TransportConfig, config: ChannelConfig) -> Self {
        PushChannel {
            transport,
            transport_config,
            config,
            next_sequence: 0,
            buffering: false,
            retry_queue: VecDeque::new(),
            inbound: Vec::new(),
            events: VecDeque::new(),
        }
    }

    /// Current channel state.
    pub fn state(&self) -> ChannelState {
        match self.transport.state() {
            ConnectionState::Disconnected => ChannelState::Disconnected,
            ConnectionState::Connecting => ChannelState::Connecting,
            ConnectionState::Connected => {
                if self.buffering {
                    ChannelState::AuthorizedBuffering
                } else {
                    ChannelState::AuthorizedIdle
                }
            }
        }
    }

    /// Next event reported by the channel, if any.
    pub fn poll_event(&mut self) -> Option<ChannelEvent> {
        self.events.pop_front()
    }

    /// Number of frames waiting in the retry-order FIFO.
    pub fn buffered_len(&self) -> usize {
        self.retry_queue.len()
    }

    /// Returns a reference to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns a mutable reference to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Sends a notification, connecting first if necessary.
    ///
    /// The connect blocks through the TLS handshake; a handshake failure
    /// surfaces as `ConnectFailed` and as the returned error. On success
    /// the next strictly-increasing sequence number is assigned (extended
    /// format) and recorded on the notification. While the transport is
    /// full the encoded frame queues in the retry-order FIFO; its `Sent`
    /// event is emitted when it is flushed.
    pub fn send(&mut self, notification: &mut Notification) -> TransportResult<()> {
        if self.transport.state() != ConnectionState::Connected {
            if let Err(e) = self.transport.connect(&self.transport_config) {
                self.events.push_back(ChannelEvent::ConnectFailed(e.clone()));
                return Err(e);
            }
            // fresh connection, fresh backpressure state
            self.buffering = false;
        }

        let sequence = if self.config.use_extended_format {
            Some(self.allocate_sequence())
        } else {
            None
        };
        let frame = encode_frame(notification, sequence)?;

        if self.buffering {
            self.retry_queue.push_back(BufferedFrame { sequence, frame });
            return Ok(());
        }

        match self.transport.write(&frame) {
            Ok(WriteStatus::Written) => {
                self.events.push_back(ChannelEvent::Sent { sequence });
            }
            Ok(WriteStatus::Full) => {
                self.events.push_back(ChannelEvent::Sent { sequence });
                self.buffering = true;
                self.events.push_back(ChannelEvent::BufferFull);
            }
            Err(e) => {
                self.teardown(ChannelEvent::Error(e.clone()));
                return Err(e);
            }
        }
        Ok(())
    }

    /// Pumps the connection: reads inbound error reports and flushes the
    /// retry FIFO once the transport drains. Never blocks longer than the
    /// transport's I/O timeout. No-op while disconnected.
    pub fn pump(&mut self) {
        if self.transport.state() != ConnectionState::Connected {
            return;
        }

        loop {
            match self.transport.read() {
                Ok(Some(chunk)) => self.inbound.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(PushError::ConnectionClosed) => {
                    self.scan_inbound();
                    self.teardown(ChannelEvent::Closed);
                    return;
                }
                Err(e) => {
                    self.scan_inbound();
                    self.teardown(ChannelEvent::Error(e));
                    return;
                }
            }
        }
        self.scan_inbound();

        if self.buffering {
            match self.transport.poll_writable() {
                Ok(true) => {
                    self.buffering = false;
                    self.flush_retry_queue();
                }
                Ok(false) => {}
                Err(e) => self.teardown(ChannelEvent::Error(e)),
            }
        }
    }

    /// Closes the channel. A graceful close flushes buffered frames first
    /// if the transport accepts them; either way the channel ends up
    /// disconnected.
    pub fn close(&mut self, graceful: bool) {
        if graceful && self.transport.state() == ConnectionState::Connected {
            if let Ok(true) = self.transport.poll_writable() {
                self.buffering = false;
                self.flush_retry_queue();
            }
        }
        let _ = self.transport.disconnect();
        self.buffering = false;
        self.retry_queue.clear();
        self.inbound.clear();
    }

    fn allocate_sequence(&mut self) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        sequence
    }

    /// Consumes complete 6-byte records from the inbound buffer. The
    /// gateway sends nothing else, so records with a different marker are
    /// surfaced as protocol noise and skipped.
    fn scan_inbound(&mut self) {
        while self.inbound.len() >= ERROR_REPORT_SIZE {
            let record: Vec<u8> = self.inbound.drain(..ERROR_REPORT_SIZE).collect();
            match decode_error_report(&record) {
                Some(report) => self.events.push_back(ChannelEvent::ErrorReport(report)),
                None => self.events.push_back(ChannelEvent::Protocol(PushError::Protocol(
                    format!("unexpected inbound record marker {}", record[0]),
                ))),
            }
        }
    }

    /// Flushes the retry FIFO in original order, re-entering the buffering
    /// state the moment the transport reports full again.
    fn flush_retry_queue(&mut self) {
        while let Some(buffered) = self.retry_queue.pop_front() {
            match self.transport.write(&buffered.frame) {
                Ok(WriteStatus::Written) => {
                    self.events.push_back(ChannelEvent::Sent {
                        sequence: buffered.sequence,
                    });
                }
                Ok(WriteStatus::Full) => {
                    // this frame was accepted; the ones behind it stay queued
                    self.events.push_back(ChannelEvent::Sent {
                        sequence: buffered.sequence,
                    });
                    self.buffering = true;
                    self.events.push_back(ChannelEvent::BufferFull);
                    return;
                }
                Err(e) => {
                    self.teardown(ChannelEvent::Error(e));
                    return;
                }
            }
        }
    }

    /// Discards the transport and resets to disconnected. Queued-but-
    /// unflushed frames are dropped here: resending is the orchestrator's
    /// decision, made from its in-flight table.
    fn teardown(&mut self, event: ChannelEvent) {
        let _ = self.transport.disconnect();
        self.buffering = false;
        self.retry_queue.clear();
        self.inbound.clear();
        self.events.push_back(event);
    }
}
