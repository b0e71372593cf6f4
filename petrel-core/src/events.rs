// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Event System
//!
//! Typed events emitted by the channel, the feedback reader and the
//! orchestrator, plus the injectable sink delivery observers register with.

use std::sync::Arc;

use crate::codec::ErrorReport;
use crate::error::PushError;
use crate::token::DeviceToken;

/// Events emitted by `PushChannel`.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A frame was handed to the transport. This does not mean the remote
    /// acknowledged it; the gateway accepts writes silently.
    Sent {
        /// Assigned sequence number; `None` on simple-format channels.
        sequence: Option<u32>,
    },
    /// The transport write buffer filled; subsequent sends are buffered
    /// until the transport drains.
    BufferFull,
    /// An asynchronous error report arrived on the stream.
    ErrorReport(ErrorReport),
    /// A malformed inbound record was skipped.
    Protocol(PushError),
    /// The remote closed the connection.
    Closed,
    /// The transport failed mid-stream.
    Error(PushError),
    /// A connection attempt (TCP connect or TLS handshake) failed.
    ConnectFailed(PushError),
}

/// Events emitted by `FeedbackReader`.
#[derive(Debug, Clone)]
pub enum FeedbackEvent {
    /// One feedback record: the service saw this token fail at `timestamp`.
    Device { timestamp: u32, token: DeviceToken },
    /// A malformed feedback record was skipped.
    Protocol(PushError),
    /// The stream ended; every complete record has been emitted.
    End,
    /// The transport failed; no `End` follows.
    Error(PushError),
}

/// Delivery lifecycle events, observable through an [`EventSink`].
#[derive(Debug, Clone)]
pub enum DeliveryEvent {
    /// A notification was handed to the channel.
    Dispatched { sequence: Option<u32> },
    /// A notification was confirmed delivered (quiet period elapsed, or it
    /// preceded a failing frame on the same connection).
    Delivered { sequence: u32 },
    /// A notification failed terminally.
    Failed {
        sequence: Option<u32>,
        error: PushError,
    },
    /// In-flight notifications were requeued after a connection loss.
    Requeued { count: usize },
    /// A device token was added to the blacklist.
    Blacklisted { token: DeviceToken },
    /// Dispatch was suspended.
    Suspended,
    /// Dispatch was resumed.
    Resumed,
    /// The startup feedback query finished.
    FeedbackQueryFinished { devices: usize },
}

/// Event sink trait.
///
/// Implement this trait to observe delivery events.
pub trait EventSink: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: DeliveryEvent);
}

/// Simple callback-based event sink.
///
/// Wraps a closure for easy event handling.
pub struct CallbackSink<F>
where
    F: Fn(DeliveryEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(DeliveryEvent) + Send + Sync,
{
    /// Creates a new callback sink.
    pub fn new(callback: F) -> Self {
        CallbackSink { callback }
    }
}

impl<F> EventSink for CallbackSink<F>
where
    F: Fn(DeliveryEvent) + Send + Sync,
{
    fn on_event(&self, event: DeliveryEvent) {
        (self.callback)(event);
    }
}

/// Event dispatcher for managing multiple sinks.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    pub fn new() -> Self {
        EventDispatcher { sinks: Vec::new() }
    }

    /// Adds an event sink.
    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Removes all sinks.
    pub fn clear_sinks(&mut self) {
        self.sinks.clear();
    }

    /// Returns the number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Dispatches an event to all sinks.
    pub fn dispatch(&self, event: DeliveryEvent) {
        for sink in &self.sinks {
            sink.on_event(event.clone());
        }
    }
}
