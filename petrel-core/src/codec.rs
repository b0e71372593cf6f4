// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Frame Codec
//!
//! Binary wire encoding for outbound notification frames and decoding of
//! the gateway's asynchronous 6-byte error reports. All integers on the
//! wire are big-endian.

use std::fmt;

use crate::error::PushError;
use crate::notification::Notification;

/// Leading byte of the simple outbound frame.
pub const FORMAT_SIMPLE: u8 = 0;
/// Leading byte of the extended outbound frame (sequence number + expiry).
pub const FORMAT_EXTENDED: u8 = 1;
/// Leading byte marking an inbound error report.
pub const ERROR_REPORT_MARKER: u8 = 8;
/// Size of an inbound error report record.
pub const ERROR_REPORT_SIZE: usize = 6;
/// Maximum serialized payload size accepted by the gateway.
pub const MAX_PAYLOAD_SIZE: usize = 256;

/// Gateway error codes (the protocol's value → meaning table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NoError,
    ProcessingError,
    MissingDeviceToken,
    MissingTopic,
    MissingPayload,
    InvalidTokenSize,
    InvalidTopicSize,
    InvalidPayloadSize,
    InvalidToken,
    Unknown,
}

impl ErrorCode {
    /// Maps a wire byte to its code; unassigned values map to `Unknown`.
    pub fn from_wire(value: u8) -> ErrorCode {
        match value {
            0 => ErrorCode::NoError,
            1 => ErrorCode::ProcessingError,
            2 => ErrorCode::MissingDeviceToken,
            3 => ErrorCode::MissingTopic,
            4 => ErrorCode::MissingPayload,
            5 => ErrorCode::InvalidTokenSize,
            6 => ErrorCode::InvalidTopicSize,
            7 => ErrorCode::InvalidPayloadSize,
            8 => ErrorCode::InvalidToken,
            _ => ErrorCode::Unknown,
        }
    }

    /// The code's wire byte.
    pub fn to_wire(self) -> u8 {
        match self {
            ErrorCode::NoError => 0,
            ErrorCode::ProcessingError => 1,
            ErrorCode::MissingDeviceToken => 2,
            ErrorCode::MissingTopic => 3,
            ErrorCode::MissingPayload => 4,
            ErrorCode::InvalidTokenSize => 5,
            ErrorCode::InvalidTopicSize => 6,
            ErrorCode::InvalidPayloadSize => 7,
            ErrorCode::InvalidToken => 8,
            ErrorCode::Unknown => 255,
        }
    }

    /// True for codes that condemn the device token itself; these feed the
    /// blacklist.
    pub fn is_token_failure(self) -> bool {
        matches!(
            self,
            ErrorCode::MissingDeviceToken
                | ErrorCode::InvalidTokenSize
                | ErrorCode::InvalidToken
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            ErrorCode::NoError => "no error",
            ErrorCode::ProcessingError => "processing error",
            ErrorCode::MissingDeviceToken => "missing device token",
            ErrorCode::MissingTopic => "missing topic",
            ErrorCode::MissingPayload => "missing payload",
            ErrorCode::InvalidTokenSize => "invalid token size",
            ErrorCode::InvalidTopicSize => "invalid topic size",
            ErrorCode::InvalidPayloadSize => "invalid payload size",
            ErrorCode::InvalidToken => "invalid token",
            ErrorCode::Unknown => "unknown error",
        };
        f.write_str(description)
    }
}

/// An asynchronous failure report decoded from the gateway stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorReport {
    pub error_code: ErrorCode,
    /// Sequence number of the frame the report refers to.
    pub sequence: u32,
}

/// Encodes a notification into its wire frame.
///
/// With `Some(sequence)` the extended format is produced and the sequence
/// number is recorded on the notification as a side effect; it identifies
/// this delivery attempt from then on. With `None` the simple format is
/// produced and the notification's sequence number is left unset.
pub fn encode_frame(
    notification: &mut Notification,
    sequence: Option<u32>,
) -> Result<Vec<u8>, PushError> {
    let payload = notification.payload_bytes()?;
    let token = notification.device().as_bytes().to_vec();

    let mut frame = Vec::with_capacity(11 + 2 + token.len() + 2 + payload.len());
    match sequence {
        Some(sequence) => {
            frame.push(FORMAT_EXTENDED);
            frame.extend_from_slice(&sequence.to_be_bytes());
            frame.extend_from_slice(&notification.expiry.to_be_bytes());
        }
        None => {
            frame.push(FORMAT_SIMPLE);
        }
    }
    frame.extend_from_slice(&(token.len() as u16).to_be_bytes());
    frame.extend_from_slice(&token);
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(&payload);

    if let Some(sequence) = sequence {
        notification.set_sequence(sequence);
    }
    Ok(frame)
}

/// Decodes an inbound error report.
///
/// Recognizes exactly the fixed 6-byte record with leading marker byte 8;
/// anything else is non-error traffic and yields `None`.
pub fn decode_error_report(bytes: &[u8]) -> Option<ErrorReport> {
    if bytes.len() != ERROR_REPORT_SIZE || bytes[0] != ERROR_REPORT_MARKER {
        return None;
    }
    let sequence = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
    Some(ErrorReport {
        error_code: ErrorCode::from_wire(bytes[1]),
        sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Alert;
    use crate::token::DeviceToken;

    fn test_notification() -> Notification {
        let mut notification =
            Notification::new(DeviceToken::from_hex("a1b2c3d4").unwrap());
        notification.alert = Some(Alert::Body("hi".into()));
        notification
    }

    #[test]
    fn test_simple_frame_layout() {
        let mut notification = test_notification();
        let payload = notification.payload_bytes().unwrap();

        let frame = encode_frame(&mut notification, None).unwrap();
        assert_eq!(frame[0], FORMAT_SIMPLE);
        assert_eq!(&frame[1..3], &[0, 4]); // token length
        assert_eq!(&frame[3..7], &[0xa1, 0xb2, 0xc3, 0xd4]);
        assert_eq!(&frame[7..9], &(payload.len() as u16).to_be_bytes());
        assert_eq!(&frame[9..], &payload[..]);
        assert_eq!(notification.sequence(), None);
    }

    #[test]
    fn test_extended_frame_layout() {
        let mut notification = test_notification();
        notification.expiry = 0x0102_0304;
        let payload = notification.payload_bytes().unwrap();

        let frame = encode_frame(&mut notification, Some(7)).unwrap();
        assert_eq!(frame[0], FORMAT_EXTENDED);
        assert_eq!(&frame[1..5], &[0, 0, 0, 7]); // sequence
        assert_eq!(&frame[5..9], &[1, 2, 3, 4]); // expiry
        assert_eq!(&frame[9..11], &[0, 4]); // token length
        assert_eq!(&frame[11..15], &[0xa1, 0xb2, 0xc3, 0xd4]);
        assert_eq!(&frame[15..17], &(payload.len() as u16).to_be_bytes());
        assert_eq!(&frame[17..], &payload[..]);
    }

    #[test]
    fn test_encode_records_sequence_on_notification() {
        let mut notification = test_notification();
        encode_frame(&mut notification, Some(42)).unwrap();
        assert_eq!(notification.sequence(), Some(42));
    }

    #[test]
    fn test_decode_error_report() {
        let report = decode_error_report(&[8, 8, 0, 0, 0, 5]).unwrap();
        assert_eq!(report.error_code, ErrorCode::InvalidToken);
        assert_eq!(report.sequence, 5);

        let report = decode_error_report(&[8, 1, 0, 0, 1, 0]).unwrap();
        assert_eq!(report.error_code, ErrorCode::ProcessingError);
        assert_eq!(report.sequence, 256);
    }

    #[test]
    fn test_decode_ignores_other_markers() {
        assert!(decode_error_report(&[7, 8, 0, 0, 0, 5]).is_none());
        assert!(decode_error_report(&[0, 0, 0, 0, 0, 0]).is_none());
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(decode_error_report(&[8, 8, 0, 0, 0]).is_none());
        assert!(decode_error_report(&[8, 8, 0, 0, 0, 5, 9]).is_none());
        assert!(decode_error_report(&[]).is_none());
    }

    #[test]
    fn test_error_code_wire_roundtrip() {
        for value in [0u8, 1, 2, 3, 4, 5, 6, 7, 8, 255] {
            assert_eq!(ErrorCode::from_wire(value).to_wire(), value);
        }
        // unassigned values collapse into Unknown
        assert_eq!(ErrorCode::from_wire(99), ErrorCode::Unknown);
    }

    #[test]
    fn test_token_failure_codes() {
        assert!(ErrorCode::InvalidToken.is_token_failure());
        assert!(ErrorCode::InvalidTokenSize.is_token_failure());
        assert!(ErrorCode::MissingDeviceToken.is_token_failure());
        assert!(!ErrorCode::MissingPayload.is_token_failure());
        assert!(!ErrorCode::ProcessingError.is_token_failure());
    }
}
