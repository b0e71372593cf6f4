// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error Types
//!
//! Error types for the push gateway client.

use thiserror::Error;

use crate::codec::ErrorCode;

/// Push gateway client error types.
#[derive(Error, Debug, Clone)]
pub enum PushError {
    #[error("Invalid device token: {0}")]
    InvalidToken(String),

    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    #[error("Device token is blacklisted")]
    Blacklisted,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timeout")]
    Timeout,

    #[error("Transport not connected")]
    NotConnected,

    #[error("Frame send failed: {0}")]
    SendFailed(String),

    #[error("Stream receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Malformed inbound record: {0}")]
    Protocol(String),

    #[error("Gateway rejected notification: {0}")]
    Rejected(ErrorCode),
}

impl PushError {
    /// True for failures of the transport layer itself. These are
    /// recoverable: the channel resets to disconnected and the next send
    /// attempts a fresh connection.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PushError::ConnectionFailed(_)
                | PushError::ConnectionClosed
                | PushError::Timeout
                | PushError::NotConnected
                | PushError::SendFailed(_)
                | PushError::ReceiveFailed(_)
        )
    }

    /// True when the error condemns the device token itself, either locally
    /// (parse failure) or through a gateway rejection of the token class.
    pub fn is_invalid_token(&self) -> bool {
        match self {
            PushError::InvalidToken(_) => true,
            PushError::Rejected(code) => code.is_token_failure(),
            _ => false,
        }
    }
}
