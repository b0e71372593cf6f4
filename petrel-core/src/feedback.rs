// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Feedback Reader
//!
//! Reads the feedback service stream: a transient, inbound-only connection
//! carrying fixed-size records of device tokens the service saw fail.
//! Records arrive in arbitrarily-sized chunks and are reassembled through a
//! fixed-capacity buffer.
//!
//! The buffer is flushed only when it is exactly full (or at stream end),
//! never eagerly. A slow trickle of bytes into a buffer sized for more than
//! one record therefore delays emission of already-complete records until
//! the buffer fills or the stream ends. That batching is part of the
//! observable behavior and is kept as is.

use std::collections::VecDeque;

use crate::error::PushError;
use crate::events::FeedbackEvent;
use crate::token::DeviceToken;
use crate::transport::{Transport, TransportConfig, TransportResult};

/// Size of one feedback record on the wire.
pub const FEEDBACK_RECORD_SIZE: usize = 38;

/// Token length the 38-byte record framing implies.
const FEEDBACK_TOKEN_LEN: usize = 32;

/// Configuration for the feedback reader.
#[derive(Debug, Clone)]
pub struct FeedbackConfig {
    /// Number of 38-byte records the reassembly buffer holds before a
    /// batch flush.
    pub buffer_capacity_records: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        FeedbackConfig {
            buffer_capacity_records: 1,
        }
    }
}

/// Reader for the feedback service stream.
///
/// # Example
///
/// ```ignore
/// use petrel_core::{FeedbackConfig, FeedbackEvent, FeedbackReader, TlsTransport, TransportConfig};
///
/// let mut reader = FeedbackReader::new(
///     TlsTransport::new(),
///     TransportConfig::feedback(),
///     FeedbackConfig::default(),
/// );
/// for event in reader.run() {
///     if let FeedbackEvent::Device { timestamp, token } = event {
///         // token stopped being deliverable at `timestamp`
///     }
/// }
/// ```
pub struct FeedbackReader<T: Transport> {
    transport: T,
    transport_config: TransportConfig,
    /// Buffer capacity in bytes, a whole number of records.
    capacity: usize,
    buffer: Vec<u8>,
    events: VecDeque<FeedbackEvent>,
    finished: bool,
}

impl<T: Transport> FeedbackReader<T> {
    /// Creates a reader over a transport. Nothing connects until
    /// [`connect`](Self::connect) or [`run`](Self::run).
    pub fn new(transport: T, transport_config: TransportConfig, config: FeedbackConfig) -> Self {
        let records = config.buffer_capacity_records.max(1);
        FeedbackReader {
            transport,
            transport_config,
            capacity: records * FEEDBACK_RECORD_SIZE,
            buffer: Vec::new(),
            events: VecDeque::new(),
            finished: false,
        }
    }

    /// Connects to the feedback service.
    pub fn connect(&mut self) -> TransportResult<()> {
        self.transport.connect(&self.transport_config)
    }

    /// Next event produced by the reader, if any.
    pub fn poll_event(&mut self) -> Option<FeedbackEvent> {
        self.events.pop_front()
    }

    /// Drains all produced events.
    pub fn drain_events(&mut self) -> Vec<FeedbackEvent> {
        self.events.drain(..).collect()
    }

    /// Returns a mutable reference to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// One pump step: reads at most one chunk. Returns false once the
    /// stream has terminated (remote close or transport error).
    pub fn poll(&mut self) -> bool {
        if self.finished {
            return false;
        }
        match self.transport.read() {
            Ok(Some(chunk)) => {
                self.ingest(&chunk);
                true
            }
            Ok(None) => true,
            Err(PushError::ConnectionClosed) => {
                self.finish();
                false
            }
            Err(e) => {
                self.events.push_back(FeedbackEvent::Error(e));
                self.finished = true;
                false
            }
        }
    }

    /// Connects and reads until the remote closes the stream, then returns
    /// every event produced. A connect failure yields a single `Error`
    /// event; a clean close ends the events with `End`.
    pub fn run(&mut self) -> Vec<FeedbackEvent> {
        if let Err(e) = self.connect() {
            self.events.push_back(FeedbackEvent::Error(e));
            self.finished = true;
            return self.drain_events();
        }
        while self.poll() {}
        self.drain_events()
    }

    /// Folds one chunk into the buffer. Explicit loop, so chunk size never
    /// grows the stack; the buffer is flushed whenever it is exactly full.
    fn ingest(&mut self, chunk: &[u8]) {
        let mut rest = chunk;
        while !rest.is_empty() {
            let room = self.capacity - self.buffer.len();
            let take = rest.len().min(room);
            self.buffer.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.buffer.len() == self.capacity {
                self.flush_buffer();
            }
        }
    }

    /// Batch flush: parses every complete record in the buffer and resets
    /// it. The capacity is a whole number of records, so a full buffer
    /// never holds a partial one.
    fn flush_buffer(&mut self) {
        let data = std::mem::take(&mut self.buffer);
        let complete = data.len() / FEEDBACK_RECORD_SIZE * FEEDBACK_RECORD_SIZE;
        for record in data[..complete].chunks_exact(FEEDBACK_RECORD_SIZE) {
            self.parse_record(record);
        }
        if complete < data.len() {
            self.events.push_back(FeedbackEvent::Protocol(PushError::Protocol(
                format!(
                    "truncated feedback record ({} trailing bytes)",
                    data.len() - complete
                ),
            )));
        }
    }

    /// End of stream: every complete record still in the buffer is emitted
    /// before the terminal `End` event; none is silently dropped.
    fn finish(&mut self) {
        self.flush_buffer();
        self.events.push_back(FeedbackEvent::End);
        self.finished = true;
    }

    fn parse_record(&mut self, record: &[u8]) {
        let timestamp =
            u32::from_be_bytes([record[0], record[1], record[2], record[3]]);
        let token_len = u16::from_be_bytes([record[4], record[5]]) as usize;

        if token_len != FEEDBACK_TOKEN_LEN {
            self.events.push_back(FeedbackEvent::Protocol(PushError::Protocol(
                format!("feedback record declares token length {}", token_len),
            )));
            return;
        }
        match DeviceToken::from_bytes(record[6..].to_vec()) {
            Ok(token) => self
                .events
                .push_back(FeedbackEvent::Device { timestamp, token }),
            Err(e) => self.events.push_back(FeedbackEvent::Protocol(e)),
        }
    }
}
