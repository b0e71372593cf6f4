// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Delivery Orchestrator
//!
//! Queue management and partial-failure recovery over a protocol with no
//! per-message acknowledgment. The gateway accepts writes silently and
//! reports failures asynchronously; when a report arrives, the connection
//! that carried the failing frame is already torn down and everything
//! written after it is presumed lost. The orchestrator tracks in-flight
//! notifications by sequence number, resolves them against error reports
//! and connection failures, requeues what cannot be assumed delivered, and
//! confirms the rest after a quiet period.
//!
//! All state here (pending queue, in-flight table, blacklist, event log) is
//! owned exclusively by the orchestrator and mutated only from its own
//! methods; the channel and the feedback reader communicate solely through
//! typed events.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::channel::PushChannel;
use crate::codec::{ErrorCode, ErrorReport};
use crate::error::PushError;
use crate::events::{ChannelEvent, DeliveryEvent, EventDispatcher, EventSink, FeedbackEvent};
use crate::feedback::FeedbackReader;
use crate::notification::Notification;
use crate::token::DeviceToken;
use crate::transport::Transport;

/// Configuration for the delivery orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Quiet period after the pending queue drains; in-flight
    /// notifications still unresolved when it elapses are confirmed
    /// delivered.
    pub grace_period_ms: u64,
    /// Recurring dispatch cadence enforced by [`tick`](DeliveryOrchestrator::tick).
    pub dispatch_interval_ms: u64,
    /// Capacity of the bounded event log; oldest entries are evicted.
    pub event_log_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            grace_period_ms: 2_000,
            dispatch_interval_ms: 1_000,
            event_log_capacity: 100,
        }
    }
}

/// One-shot completion handler, invoked at most once per notification with
/// either no error (confirmed) or exactly one error.
pub type CompletionHandler = Box<dyn FnOnce(&Notification, Result<(), PushError>) + Send>;

struct QueueEntry {
    notification: Notification,
    completion: Option<CompletionHandler>,
}

impl QueueEntry {
    fn complete(&mut self, result: Result<(), PushError>) {
        if let Some(handler) = self.completion.take() {
            handler(&self.notification, result);
        }
    }
}

/// One entry of the bounded event log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Seconds since epoch.
    pub timestamp: u64,
    /// Gateway error code, when the entry stems from an error report.
    pub error_code: Option<ErrorCode>,
    /// The notification concerned, when one could be identified.
    pub notification: Option<Notification>,
    pub description: String,
}

/// Queues, dispatches and resolves notifications over one push channel.
///
/// # Example
///
/// ```ignore
/// use petrel_core::{
///     ChannelConfig, DeliveryOrchestrator, FeedbackConfig, FeedbackReader,
///     MockTransport, OrchestratorConfig, PushChannel, TransportConfig,
/// };
///
/// let channel = PushChannel::new(transport, TransportConfig::default(), ChannelConfig::default());
/// let mut orchestrator = DeliveryOrchestrator::new(channel, OrchestratorConfig::default());
///
/// // populate the blacklist, then enable dispatch
/// orchestrator.start(&mut feedback_reader);
///
/// orchestrator.enqueue(notification, Some(Box::new(|n, result| {
///     // delivered or failed terminally
/// })));
///
/// loop {
///     orchestrator.tick(); // on the dispatch cadence
/// }
/// ```
pub struct DeliveryOrchestrator<T: Transport> {
    channel: PushChannel<T>,
    config: OrchestratorConfig,
    pending: VecDeque<QueueEntry>,
    in_flight: BTreeMap<u32, QueueEntry>,
    /// Token → seconds-since-epoch timestamp of blacklisting.
    blacklist: HashMap<DeviceToken, u32>,
    event_log: VecDeque<LogEntry>,
    dispatcher: EventDispatcher,
    suspended: bool,
    grace_deadline: Option<Instant>,
    next_dispatch_at: Option<Instant>,
}

impl<T: Transport> DeliveryOrchestrator<T> {
    /// Creates an orchestrator over a channel. Dispatch starts disabled;
    /// [`start`](Self::start) (or [`restart`](Self::restart)) enables it.
    pub fn new(channel: PushChannel<T>, config: OrchestratorConfig) -> Self {
        DeliveryOrchestrator {
            channel,
            config,
            pending: VecDeque::new(),
            in_flight: BTreeMap::new(),
            blacklist: HashMap::new(),
            event_log: VecDeque::new(),
            dispatcher: EventDispatcher::new(),
            suspended: true,
            grace_deadline: None,
            next_dispatch_at: None,
        }
    }

    /// Registers a delivery event sink.
    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.dispatcher.add_sink(sink);
    }

    /// Runs the startup feedback query to populate the blacklist, then
    /// enables dispatch. A failed query must not block delivery: dispatch
    /// is enabled whether the query succeeds, fails or errors.
    pub fn start<F: Transport>(&mut self, feedback: &mut FeedbackReader<F>) {
        let mut devices = 0;
        for event in feedback.run() {
            match event {
                FeedbackEvent::Device { timestamp, token } => {
                    self.blacklist.insert(token, timestamp);
                    devices += 1;
                }
                FeedbackEvent::Protocol(e) => {
                    self.log(None, None, format!("feedback: {}", e));
                }
                FeedbackEvent::Error(e) => {
                    self.log(None, None, format!("feedback query failed: {}", e));
                }
                FeedbackEvent::End => {}
            }
        }
        self.dispatcher
            .dispatch(DeliveryEvent::FeedbackQueryFinished { devices });
        self.suspended = false;
        self.dispatch_pass();
    }

    /// Queues a notification for delivery.
    ///
    /// Returns false, without touching the queue, when the device token is
    /// blacklisted or the notification fails validation; the completion
    /// handler fires immediately with the rejection. Otherwise the
    /// notification is appended and a dispatch pass runs right away (when
    /// dispatch is enabled).
    pub fn enqueue(
        &mut self,
        notification: Notification,
        completion: Option<CompletionHandler>,
    ) -> bool {
        let mut entry = QueueEntry {
            notification,
            completion,
        };

        if self.blacklist.contains_key(entry.notification.device()) {
            self.dispatcher.dispatch(DeliveryEvent::Failed {
                sequence: None,
                error: PushError::Blacklisted,
            });
            entry.complete(Err(PushError::Blacklisted));
            return false;
        }
        if let Err(e) = entry.notification.validate() {
            self.dispatcher.dispatch(DeliveryEvent::Failed {
                sequence: None,
                error: e.clone(),
            });
            entry.complete(Err(e));
            return false;
        }

        self.pending.push_back(entry);
        self.dispatch_pass();
        true
    }

    /// Disables dispatch and cancels the scheduled pass. Idempotent. Does
    /// not abort writes already handed to the transport.
    pub fn suspend(&mut self) {
        self.next_dispatch_at = None;
        if !self.suspended {
            self.suspended = true;
            self.dispatcher.dispatch(DeliveryEvent::Suspended);
        }
    }

    /// Re-enables dispatch and runs a pass immediately. Idempotent.
    pub fn restart(&mut self) {
        if self.suspended {
            self.suspended = false;
            self.dispatcher.dispatch(DeliveryEvent::Resumed);
            self.dispatch_pass();
        }
    }

    /// True while dispatch is suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Drives timers and the connection: pumps the channel, resolves its
    /// events, confirms in-flight notifications once the grace period
    /// elapses, and runs a dispatch pass when one is due. Call this on the
    /// dispatch cadence.
    pub fn tick(&mut self) {
        self.channel.pump();
        self.drain_channel_events();

        if let Some(deadline) = self.grace_deadline {
            if Instant::now() >= deadline {
                self.grace_deadline = None;
                let confirmed = std::mem::take(&mut self.in_flight);
                for (sequence, mut entry) in confirmed {
                    self.dispatcher
                        .dispatch(DeliveryEvent::Delivered { sequence });
                    entry.complete(Ok(()));
                }
            }
        }

        let due = match self.next_dispatch_at {
            None => true,
            Some(at) => Instant::now() >= at,
        };
        if due {
            self.dispatch_pass();
        }
    }

    /// Number of notifications awaiting dispatch.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of notifications written but not yet resolved.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// True when the token is currently blacklisted.
    pub fn is_blacklisted(&self, token: &DeviceToken) -> bool {
        self.blacklist.contains_key(token)
    }

    /// The blacklist: token → seconds-since-epoch timestamp. Grows over
    /// the process lifetime; pruning is the owner's concern.
    pub fn blacklist(&self) -> &HashMap<DeviceToken, u32> {
        &self.blacklist
    }

    /// The bounded event log, oldest first.
    pub fn event_log(&self) -> impl Iterator<Item = &LogEntry> {
        self.event_log.iter()
    }

    /// Returns a reference to the push channel.
    pub fn channel(&self) -> &PushChannel<T> {
        &self.channel
    }

    /// Returns a mutable reference to the push channel.
    pub fn channel_mut(&mut self) -> &mut PushChannel<T> {
        &mut self.channel
    }

    fn dispatchable(&self) -> bool {
        !self.suspended && self.grace_deadline.is_none()
    }

    /// One dispatch pass: sends pending notifications until the queue is
    /// empty or dispatch is disabled. When at least one was sent and none
    /// remain pending, dispatch pauses for the grace period so a late
    /// error report can still claim the in-flight entries.
    fn dispatch_pass(&mut self) {
        if !self.dispatchable() {
            return;
        }

        let mut sent_any = false;
        while self.dispatchable() {
            let Some(mut entry) = self.pending.pop_front() else {
                break;
            };
            match self.channel.send(&mut entry.notification) {
                Ok(()) => {
                    sent_any = true;
                    let sequence = entry.notification.sequence();
                    self.dispatcher
                        .dispatch(DeliveryEvent::Dispatched { sequence });
                    match sequence {
                        Some(sequence) => {
                            self.in_flight.insert(sequence, entry);
                        }
                        None => {
                            // simple format: no correlation possible, so
                            // handing the frame over is all we can confirm
                            entry.complete(Ok(()));
                        }
                    }
                }
                Err(_) => {
                    // the channel already reported the failure as an event;
                    // the notification waits for a later pass
                    self.pending.push_front(entry);
                    break;
                }
            }
        }
        self.drain_channel_events();

        if sent_any && self.pending.is_empty() && self.dispatchable() {
            self.grace_deadline =
                Some(Instant::now() + Duration::from_millis(self.config.grace_period_ms));
        }
        self.next_dispatch_at =
            Some(Instant::now() + Duration::from_millis(self.config.dispatch_interval_ms));
    }

    fn drain_channel_events(&mut self) {
        while let Some(event) = self.channel.poll_event() {
            match event {
                ChannelEvent::ErrorReport(report) => self.handle_error_report(report),
                ChannelEvent::Closed => {
                    self.handle_connection_loss("connection closed by the gateway".into())
                }
                ChannelEvent::Error(e) => {
                    self.handle_connection_loss(format!("transport error: {}", e))
                }
                ChannelEvent::ConnectFailed(e) => {
                    self.log(None, None, format!("connect failed: {}", e));
                }
                ChannelEvent::Protocol(e) => {
                    self.log(None, None, e.to_string());
                }
                ChannelEvent::Sent { .. } | ChannelEvent::BufferFull => {}
            }
        }
    }

    /// Resolves an asynchronous error report. The remote stops processing
    /// at the failing frame and tears the connection down, so entries up
    /// to the failing sequence were processed (delivered) and entries
    /// after it cannot be assumed delivered; those are requeued onto the
    /// front of the pending queue preserving their relative order.
    fn handle_error_report(&mut self, report: ErrorReport) {
        let failing = self.in_flight.remove(&report.sequence);
        self.log(
            Some(report.error_code),
            failing.as_ref().map(|entry| &entry.notification),
            format!(
                "gateway reported '{}' for sequence {}",
                report.error_code, report.sequence
            ),
        );

        if let Some(mut entry) = failing {
            if report.error_code.is_token_failure() {
                let token = entry.notification.device().clone();
                self.blacklist.insert(token.clone(), now_secs());
                self.dispatcher.dispatch(DeliveryEvent::Blacklisted { token });
            }
            self.dispatcher.dispatch(DeliveryEvent::Failed {
                sequence: Some(report.sequence),
                error: PushError::Rejected(report.error_code),
            });
            entry.complete(Err(PushError::Rejected(report.error_code)));
        }

        let unresolved = std::mem::take(&mut self.in_flight);
        let mut requeue = Vec::new();
        for (sequence, mut entry) in unresolved {
            if sequence > report.sequence {
                requeue.push(entry);
            } else {
                self.dispatcher
                    .dispatch(DeliveryEvent::Delivered { sequence });
                entry.complete(Ok(()));
            }
        }
        // push_front in reverse keeps the ascending original order and
        // places resends ahead of newly enqueued notifications
        for entry in requeue.into_iter().rev() {
            self.pending.push_front(entry);
        }

        self.grace_deadline = None;
    }

    /// A connection-level failure carries no sequence number: every
    /// in-flight notification is now unconfirmed and goes back to the
    /// front of the queue in ascending sequence order. Dispatch suspends;
    /// resuming is the owner's decision, typically upon observing
    /// recovery.
    fn handle_connection_loss(&mut self, description: String) {
        self.log(None, None, description);

        let unresolved = std::mem::take(&mut self.in_flight);
        let count = unresolved.len();
        for (_, entry) in unresolved.into_iter().rev() {
            self.pending.push_front(entry);
        }
        if count > 0 {
            self.dispatcher.dispatch(DeliveryEvent::Requeued { count });
        }

        self.grace_deadline = None;
        self.suspend();
    }

    fn log(
        &mut self,
        error_code: Option<ErrorCode>,
        notification: Option<&Notification>,
        description: String,
    ) {
        if self.config.event_log_capacity == 0 {
            return;
        }
        while self.event_log.len() >= self.config.event_log_capacity {
            self.event_log.pop_front();
        }
        self.event_log.push_back(LogEntry {
            timestamp: u64::from(now_secs()),
            error_code,
            notification: notification.cloned(),
            description,
        });
    }
}

fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
