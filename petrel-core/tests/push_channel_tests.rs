// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for the push channel state machine: connection lifecycle,
//! sequence assignment, write backpressure and inbound error reports.

use petrel_core::{
    Alert, ChannelConfig, ChannelEvent, ChannelState, DeviceToken, ErrorCode, MockTransport,
    Notification, PushChannel, PushError, TransportConfig,
};

fn channel() -> PushChannel<MockTransport> {
    PushChannel::new(
        MockTransport::new(),
        TransportConfig::default(),
        ChannelConfig::default(),
    )
}

fn simple_channel() -> PushChannel<MockTransport> {
    PushChannel::new(
        MockTransport::new(),
        TransportConfig::default(),
        ChannelConfig {
            use_extended_format: false,
        },
    )
}

fn notification() -> Notification {
    let mut notification = Notification::new(DeviceToken::from_hex(&"a1".repeat(32)).unwrap());
    notification.alert = Some(Alert::Body("hi".into()));
    notification
}

fn drain(channel: &mut PushChannel<MockTransport>) -> Vec<ChannelEvent> {
    let mut events = Vec::new();
    while let Some(event) = channel.poll_event() {
        events.push(event);
    }
    events
}

#[test]
fn test_send_connects_on_demand() {
    let mut channel = channel();
    assert_eq!(channel.state(), ChannelState::Disconnected);

    channel.send(&mut notification()).unwrap();
    assert_eq!(channel.state(), ChannelState::AuthorizedIdle);
    assert_eq!(channel.transport().connect_count(), 1);

    // an established connection is reused
    channel.send(&mut notification()).unwrap();
    assert_eq!(channel.transport().connect_count(), 1);
}

#[test]
fn test_sequence_numbers_are_strictly_increasing_from_zero() {
    let mut channel = channel();
    for expected in 0..3u32 {
        let mut notification = notification();
        channel.send(&mut notification).unwrap();
        assert_eq!(notification.sequence(), Some(expected));
    }

    let written = channel.transport().written();
    assert_eq!(written.len(), 3);
    for (expected, frame) in written.iter().enumerate() {
        assert_eq!(frame[0], 1);
        assert_eq!(frame[1..5], (expected as u32).to_be_bytes());
    }
}

#[test]
fn test_simple_format_assigns_no_sequence() {
    let mut channel = simple_channel();
    let mut notification = notification();
    channel.send(&mut notification).unwrap();

    assert_eq!(notification.sequence(), None);
    assert_eq!(channel.transport().written()[0][0], 0);
    assert!(matches!(
        drain(&mut channel).as_slice(),
        [ChannelEvent::Sent { sequence: None }]
    ));
}

#[test]
fn test_connect_failure_surfaces_as_event_and_error() {
    let mut channel = channel();
    channel
        .transport_mut()
        .inject_error(PushError::ConnectionFailed("handshake refused".into()));

    let result = channel.send(&mut notification());
    assert!(matches!(result, Err(PushError::ConnectionFailed(_))));
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert!(matches!(
        drain(&mut channel).as_slice(),
        [ChannelEvent::ConnectFailed(_)]
    ));
}

#[test]
fn test_full_transport_enters_buffering() {
    let mut channel = channel();
    channel.transport_mut().set_full(true);

    channel.send(&mut notification()).unwrap();
    assert_eq!(channel.state(), ChannelState::AuthorizedBuffering);
    let events = drain(&mut channel);
    assert!(matches!(events[0], ChannelEvent::Sent { sequence: Some(0) }));
    assert!(matches!(events[1], ChannelEvent::BufferFull));

    // while buffering, sends queue silently; the Sent event comes at flush
    channel.send(&mut notification()).unwrap();
    assert_eq!(channel.buffered_len(), 1);
    assert!(drain(&mut channel).is_empty());
}

#[test]
fn test_drain_flushes_in_original_order() {
    let mut channel = channel();
    channel.transport_mut().set_full(true);

    for _ in 0..4 {
        channel.send(&mut notification()).unwrap();
    }
    drain(&mut channel);
    assert_eq!(channel.buffered_len(), 3);

    channel.transport_mut().set_full(false);
    channel.pump();

    assert_eq!(channel.state(), ChannelState::AuthorizedIdle);
    assert_eq!(channel.buffered_len(), 0);

    let events = drain(&mut channel);
    let flushed: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            ChannelEvent::Sent { sequence } => *sequence,
            _ => None,
        })
        .collect();
    assert_eq!(flushed, [1, 2, 3]);

    let written = channel.transport().written();
    assert_eq!(written.len(), 4);
    assert_eq!(written[3][1..5], 3u32.to_be_bytes());
}

#[test]
fn test_flush_stops_when_transport_fills_again() {
    let mut channel = channel();
    channel.transport_mut().set_full(true);

    for _ in 0..4 {
        channel.send(&mut notification()).unwrap();
    }
    drain(&mut channel);

    // the transport accepts one flushed frame, then fills again
    channel.transport_mut().set_full_after(1);
    channel.pump();

    assert_eq!(channel.state(), ChannelState::AuthorizedBuffering);
    assert_eq!(channel.buffered_len(), 2);

    let events = drain(&mut channel);
    assert!(matches!(events[0], ChannelEvent::Sent { sequence: Some(1) }));
    assert!(matches!(events[1], ChannelEvent::BufferFull));
}

#[test]
fn test_inbound_error_report_is_reemitted() {
    let mut channel = channel();
    channel.send(&mut notification()).unwrap();
    drain(&mut channel);

    channel.transport_mut().queue_chunk(vec![8, 8, 0, 0, 0, 0]);
    channel.pump();

    let events = drain(&mut channel);
    match &events[..] {
        [ChannelEvent::ErrorReport(report)] => {
            assert_eq!(report.error_code, ErrorCode::InvalidToken);
            assert_eq!(report.sequence, 0);
        }
        other => panic!("expected one error report, got {:?}", other),
    }
}

#[test]
fn test_unknown_inbound_marker_is_protocol_noise() {
    let mut channel = channel();
    channel.send(&mut notification()).unwrap();
    drain(&mut channel);

    // one garbage record, then a real error report in the same chunk
    channel
        .transport_mut()
        .queue_chunk(vec![7, 0, 0, 0, 0, 0, 8, 1, 0, 0, 0, 0]);
    channel.pump();

    let events = drain(&mut channel);
    assert!(matches!(events[0], ChannelEvent::Protocol(_)));
    assert!(matches!(events[1], ChannelEvent::ErrorReport(_)));
    // the stream keeps going
    assert_eq!(channel.state(), ChannelState::AuthorizedIdle);
}

#[test]
fn test_remote_close_tears_down() {
    let mut channel = channel();
    channel.send(&mut notification()).unwrap();
    drain(&mut channel);

    channel.transport_mut().queue_close();
    channel.pump();

    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert!(matches!(
        drain(&mut channel).as_slice(),
        [ChannelEvent::Closed]
    ));
}

#[test]
fn test_read_error_tears_down() {
    let mut channel = channel();
    channel.send(&mut notification()).unwrap();
    drain(&mut channel);

    channel
        .transport_mut()
        .queue_read_error(PushError::ReceiveFailed("reset by peer".into()));
    channel.pump();

    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert!(matches!(
        drain(&mut channel).as_slice(),
        [ChannelEvent::Error(_)]
    ));
}

#[test]
fn test_error_report_before_close_is_not_lost() {
    let mut channel = channel();
    channel.send(&mut notification()).unwrap();
    drain(&mut channel);

    // the gateway writes the report and immediately closes
    channel.transport_mut().queue_chunk(vec![8, 8, 0, 0, 0, 0]);
    channel.transport_mut().queue_close();
    channel.pump();

    let events = drain(&mut channel);
    assert!(matches!(events[0], ChannelEvent::ErrorReport(_)));
    assert!(matches!(events[1], ChannelEvent::Closed));
}

#[test]
fn test_graceful_close_flushes_buffered_frames() {
    let mut channel = channel();
    channel.transport_mut().set_full(true);

    channel.send(&mut notification()).unwrap();
    channel.send(&mut notification()).unwrap();
    assert_eq!(channel.buffered_len(), 1);

    channel.transport_mut().set_full(false);
    channel.close(true);

    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(channel.transport().written().len(), 2);
}

#[test]
fn test_immediate_close_drops_buffered_frames() {
    let mut channel = channel();
    channel.transport_mut().set_full(true);

    channel.send(&mut notification()).unwrap();
    channel.send(&mut notification()).unwrap();

    channel.close(false);

    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(channel.transport().written().len(), 1);
    assert_eq!(channel.buffered_len(), 0);
}

#[test]
fn test_reconnect_after_close_continues_sequence() {
    let mut channel = channel();
    channel.send(&mut notification()).unwrap();
    channel.transport_mut().queue_close();
    channel.pump();
    drain(&mut channel);

    // sequence numbers are per channel instance, not per connection
    let mut next = notification();
    channel.send(&mut next).unwrap();
    assert_eq!(next.sequence(), Some(1));
    assert_eq!(channel.transport().connect_count(), 2);
}
