// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for the binary frame codec: wire layout and round-trips.

use petrel_core::{
    decode_error_report, encode_frame, Alert, DeviceToken, ErrorCode, Notification,
    FORMAT_EXTENDED, FORMAT_SIMPLE,
};
use serde_json::Value;

fn notification_for(token: &str) -> Notification {
    let mut notification = Notification::new(DeviceToken::from_hex(token).unwrap());
    notification.alert = Some(Alert::Body("round trip".into()));
    notification
        .payload
        .insert("ref".into(), Value::from("m-17"));
    notification
}

/// Parses an extended frame back into (sequence, expiry, token, payload).
fn parse_extended(frame: &[u8]) -> (u32, u32, Vec<u8>, Vec<u8>) {
    assert_eq!(frame[0], FORMAT_EXTENDED);
    let sequence = u32::from_be_bytes(frame[1..5].try_into().unwrap());
    let expiry = u32::from_be_bytes(frame[5..9].try_into().unwrap());
    let token_len = u16::from_be_bytes(frame[9..11].try_into().unwrap()) as usize;
    let token = frame[11..11 + token_len].to_vec();
    let payload_at = 11 + token_len;
    let payload_len =
        u16::from_be_bytes(frame[payload_at..payload_at + 2].try_into().unwrap()) as usize;
    let payload = frame[payload_at + 2..payload_at + 2 + payload_len].to_vec();
    assert_eq!(frame.len(), payload_at + 2 + payload_len);
    (sequence, expiry, token, payload)
}

/// Parses a simple frame back into (token, payload).
fn parse_simple(frame: &[u8]) -> (Vec<u8>, Vec<u8>) {
    assert_eq!(frame[0], FORMAT_SIMPLE);
    let token_len = u16::from_be_bytes(frame[1..3].try_into().unwrap()) as usize;
    let token = frame[3..3 + token_len].to_vec();
    let payload_at = 3 + token_len;
    let payload_len =
        u16::from_be_bytes(frame[payload_at..payload_at + 2].try_into().unwrap()) as usize;
    let payload = frame[payload_at + 2..payload_at + 2 + payload_len].to_vec();
    assert_eq!(frame.len(), payload_at + 2 + payload_len);
    (token, payload)
}

#[test]
fn test_extended_frame_round_trip() {
    let mut notification = notification_for(&"ab".repeat(32));
    notification.expiry = 1_700_000_000;

    let frame = encode_frame(&mut notification, Some(41)).unwrap();
    let (sequence, expiry, token, payload) = parse_extended(&frame);

    assert_eq!(sequence, 41);
    assert_eq!(expiry, 1_700_000_000);
    assert_eq!(token, notification.device().as_bytes());

    let decoded: Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(
        decoded,
        Value::Object(notification.merged_payload())
    );
    assert_eq!(notification.sequence(), Some(41));
}

#[test]
fn test_simple_frame_round_trip() {
    let mut notification = notification_for("0011aaff");

    let frame = encode_frame(&mut notification, None).unwrap();
    let (token, payload) = parse_simple(&frame);

    assert_eq!(token, notification.device().as_bytes());
    let decoded: Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(decoded["aps"]["alert"], "round trip");
    assert_eq!(decoded["ref"], "m-17");

    // simple format leaves the sequence number unset
    assert_eq!(notification.sequence(), None);
}

#[test]
fn test_frame_is_deterministic() {
    let mut first = notification_for("a1b2");
    let mut second = notification_for("a1b2");
    assert_eq!(
        encode_frame(&mut first, Some(3)).unwrap(),
        encode_frame(&mut second, Some(3)).unwrap()
    );
}

#[test]
fn test_error_report_decode_matches_table() {
    let report = decode_error_report(&[8, 2, 0, 0, 0, 9]).unwrap();
    assert_eq!(report.error_code, ErrorCode::MissingDeviceToken);
    assert_eq!(report.sequence, 9);

    // non-error traffic is ignored rather than misparsed
    assert!(decode_error_report(&[1, 2, 0, 0, 0, 9]).is_none());
}
