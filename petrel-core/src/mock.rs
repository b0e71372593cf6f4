// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Mock Transport
//!
//! Mock implementation of the Transport trait for testing.

use std::collections::VecDeque;

use crate::error::PushError;
use crate::transport::{
    ConnectionState, Transport, TransportConfig, TransportResult, WriteStatus,
};

#[derive(Debug)]
enum ReadScript {
    Chunk(Vec<u8>),
    Close,
    Error(PushError),
}

/// Mock transport for testing.
///
/// Allows injection of inbound chunks and errors, scripting of write
/// backpressure, and tracking of written frames.
///
/// # Example
///
/// ```ignore
/// use petrel_core::{MockTransport, Transport, TransportConfig};
///
/// let mut transport = MockTransport::new();
/// transport.connect(&TransportConfig::default()).unwrap();
///
/// // Queue bytes to be returned by read()
/// transport.queue_chunk(vec![8, 8, 0, 0, 0, 0]);
///
/// // Write a frame
/// transport.write(&frame).unwrap();
///
/// // Check what was written
/// assert_eq!(transport.written().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    state: ConnectionState,
    /// Frames that have been written, one entry per write call.
    written: Vec<Vec<u8>>,
    /// Scripted results for read().
    read_queue: VecDeque<ReadScript>,
    /// Error to inject on the next operation.
    inject_error: Option<PushError>,
    /// Whether the write buffer currently reports full.
    full: bool,
    /// Writes still accepted before the buffer reports full.
    full_after: Option<usize>,
    connect_count: u32,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        MockTransport::default()
    }

    /// Queues a chunk of bytes to be returned by the next read() call.
    pub fn queue_chunk(&mut self, bytes: Vec<u8>) {
        self.read_queue.push_back(ReadScript::Chunk(bytes));
    }

    /// Queues a remote close; read() returns `ConnectionClosed` when it is
    /// reached.
    pub fn queue_close(&mut self) {
        self.read_queue.push_back(ReadScript::Close);
    }

    /// Queues a read error.
    pub fn queue_read_error(&mut self, error: PushError) {
        self.read_queue.push_back(ReadScript::Error(error));
    }

    /// Returns all frames that have been written.
    pub fn written(&self) -> &[Vec<u8>] {
        &self.written
    }

    /// Clears the written-frames buffer.
    pub fn clear_written(&mut self) {
        self.written.clear();
    }

    /// Injects an error to be returned on the next operation.
    pub fn inject_error(&mut self, error: PushError) {
        self.inject_error = Some(error);
    }

    /// Scripts the write buffer as full (or drained). While full, writes
    /// are still accepted but report `WriteStatus::Full` and
    /// `poll_writable` reports false.
    pub fn set_full(&mut self, full: bool) {
        self.full = full;
        if !full {
            self.full_after = None;
        }
    }

    /// Reports the buffer full beginning with the `count`-th subsequent
    /// write; that write is still accepted, like the socket write that
    /// fills the OS buffer.
    pub fn set_full_after(&mut self, count: usize) {
        self.full = count == 0;
        self.full_after = Some(count);
    }

    /// Manually sets the connection state (for testing state transitions).
    pub fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    /// Number of successful connect() calls, to assert reconnects.
    pub fn connect_count(&self) -> u32 {
        self.connect_count
    }

    fn check_error(&mut self) -> TransportResult<()> {
        if let Some(err) = self.inject_error.take() {
            return Err(err);
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, _config: &TransportConfig) -> TransportResult<()> {
        self.check_error()?;
        self.state = ConnectionState::Connected;
        self.connect_count += 1;
        Ok(())
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        self.check_error()?;
        self.state = ConnectionState::Disconnected;
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.state.clone()
    }

    fn write(&mut self, bytes: &[u8]) -> TransportResult<WriteStatus> {
        self.check_error()?;

        if self.state != ConnectionState::Connected {
            return Err(PushError::NotConnected);
        }

        self.written.push(bytes.to_vec());

        if let Some(remaining) = &mut self.full_after {
            if *remaining > 0 {
                *remaining -= 1;
            }
            if *remaining == 0 {
                self.full = true;
            }
        }

        Ok(if self.full {
            WriteStatus::Full
        } else {
            WriteStatus::Written
        })
    }

    fn read(&mut self) -> TransportResult<Option<Vec<u8>>> {
        self.check_error()?;

        if self.state != ConnectionState::Connected {
            return Err(PushError::NotConnected);
        }

        match self.read_queue.pop_front() {
            Some(ReadScript::Chunk(bytes)) => Ok(Some(bytes)),
            Some(ReadScript::Close) => {
                self.state = ConnectionState::Disconnected;
                Err(PushError::ConnectionClosed)
            }
            Some(ReadScript::Error(error)) => {
                self.state = ConnectionState::Disconnected;
                Err(error)
            }
            None => Ok(None),
        }
    }

    fn poll_writable(&mut self) -> TransportResult<bool> {
        self.check_error()?;
        Ok(!self.full)
    }
}
