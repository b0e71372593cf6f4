// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Petrel Core Library
//!
//! Client for a binary push-notification gateway protocol: a persistent
//! TLS stream carrying compact binary frames, a gateway that accepts
//! writes silently and reports failures asynchronously out-of-band, and a
//! companion feedback stream of stale device tokens.
//!
//! # Architecture
//!
//! - **Frame codec**: wire encoding for outbound frames and inbound error
//!   reports
//! - **Transport trait**: platform-agnostic interface to the byte stream
//! - **Push channel**: one persistent connection, sequence assignment and
//!   write backpressure
//! - **Feedback reader**: fixed-size record reassembly from the feedback
//!   stream
//! - **Delivery orchestrator**: queueing, in-flight tracking, resend on
//!   partial failure, blacklist, delivery confirmation after a quiet
//!   period

pub mod channel;
pub mod codec;
pub mod error;
pub mod events;
pub mod feedback;
pub mod mock;
pub mod notification;
pub mod orchestrator;
#[cfg(feature = "network-native-tls")]
pub mod tls;
pub mod token;
pub mod transport;

// Error types
pub use error::PushError;

// Data model
pub use notification::{Alert, LocalizedAlert, Notification, APS_KEY};
pub use token::DeviceToken;

// Wire protocol
pub use codec::{
    decode_error_report, encode_frame, ErrorCode, ErrorReport, ERROR_REPORT_MARKER,
    ERROR_REPORT_SIZE, FORMAT_EXTENDED, FORMAT_SIMPLE, MAX_PAYLOAD_SIZE,
};

// Transport abstraction
pub use transport::{
    ConnectionState, TlsCredentials, Transport, TransportConfig, TransportResult, WriteStatus,
};

// Mock transport for testing
pub use mock::MockTransport;

// TLS transport for production
#[cfg(feature = "network-native-tls")]
pub use tls::TlsTransport;

// Connection management
pub use channel::{ChannelConfig, ChannelState, PushChannel};

// Feedback stream
pub use feedback::{FeedbackConfig, FeedbackReader, FEEDBACK_RECORD_SIZE};

// Delivery orchestration
pub use orchestrator::{
    CompletionHandler, DeliveryOrchestrator, LogEntry, OrchestratorConfig,
};

// Events
pub use events::{
    CallbackSink, ChannelEvent, DeliveryEvent, EventDispatcher, EventSink, FeedbackEvent,
};
