//! End-to-end exchanges between a `TransferSession` and scripted peers.

use std::io;
use std::num::NonZeroU64;
use std::time::Duration;

use bandwidth::BandwidthLimiter;
use proptest::prelude::*;
use test_support::{
    ManualClock, ReadStep, ScriptedChannel, ScriptedConnector, chunked_response, http_head,
    http_response, redirect_response,
};
use transport::{
    Address, ByteRange, ConnectError, FailureReason, MAX_REDIRECTS, ResourceRequest,
    SessionStatus, TransferEvent, TransferSession, TransferSource,
};

fn address() -> Address {
    Address::new("files.example", 8080).expect("address")
}

fn session_over(
    channel: &ScriptedChannel,
) -> TransferSession<ScriptedConnector, ManualClock> {
    TransferSession::with_clock(
        ScriptedConnector::with_channel(channel.clone()),
        ManualClock::new(),
    )
}

/// Polls until a terminal event, collecting delivered bytes.
fn drain<S: TransferSource>(source: &mut S, chunk: usize) -> (Vec<u8>, TransferEvent) {
    let mut body = Vec::new();
    let mut buf = vec![0u8; chunk];
    for _ in 0..10_000 {
        match source.poll(&mut buf) {
            TransferEvent::DataAvailable(n) => {
                assert!(n <= chunk);
                body.extend_from_slice(&buf[..n]);
            }
            TransferEvent::WouldBlock => {}
            terminal => return (body, terminal),
        }
    }
    panic!("session never reached a terminal event");
}

// ============================================================================
// Successful exchanges
// ============================================================================

#[test]
fn fetches_body_split_across_many_reads() {
    let channel = ScriptedChannel::new();
    let response = http_response(200, "OK", b"the quick brown fox");
    for piece in response.chunks(5) {
        channel.push_data(piece.to_vec());
        channel.push(ReadStep::Block);
    }

    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    session
        .request(&ResourceRequest::new("docs/fox.txt"))
        .expect("request");

    let (body, event) = drain(&mut session, 7);
    assert_eq!(event, TransferEvent::Complete);
    assert_eq!(body, b"the quick brown fox");
    assert_eq!(session.bytes_transferred(), 19);
    assert_eq!(session.status(), &SessionStatus::Complete);
    assert!(channel.is_closed());

    let request = String::from_utf8(channel.written()).expect("utf8 request");
    assert!(request.starts_with("GET /docs/fox.txt HTTP/1.1\r\n"));
    assert!(request.contains("\r\nHost: files.example:8080\r\n"));
    assert!(request.ends_with("\r\n\r\n"));
}

#[test]
fn request_survives_one_byte_writes() {
    let channel = ScriptedChannel::replying(http_response(200, "OK", b"ok"));
    channel.limit_writes(std::iter::repeat_n(1, 40).chain([0, 0]));

    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    session.request(&ResourceRequest::new("/a")).expect("request");

    let (body, event) = drain(&mut session, 64);
    assert_eq!(event, TransferEvent::Complete);
    assert_eq!(body, b"ok");
    let request = channel.written();
    assert!(request.starts_with(b"GET /a HTTP/1.1\r\n"));
    assert!(request.ends_with(b"Connection: close\r\n\r\n"));
}

#[test]
fn ranged_request_sends_range_header() {
    let channel = ScriptedChannel::replying(http_response(206, "Partial Content", b"2345"));
    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    let range = ByteRange::new(2, 5).expect("range");
    session
        .request(&ResourceRequest::new("digits").with_range(range))
        .expect("request");

    let (body, event) = drain(&mut session, 16);
    assert_eq!(event, TransferEvent::Complete);
    assert_eq!(body, b"2345");
    let request = String::from_utf8(channel.written()).expect("utf8 request");
    assert!(request.contains("\r\nRange: bytes=2-5\r\n"));
}

#[test]
fn unknown_length_completes_at_end_of_stream() {
    let channel = ScriptedChannel::new();
    channel.push_data(http_head(200, "OK", None));
    channel.push_data(b"abc".to_vec());
    channel.push(ReadStep::Block);
    channel.push_data(b"de".to_vec());

    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    session.request(&ResourceRequest::new("stream")).expect("request");

    let (body, event) = drain(&mut session, 16);
    assert_eq!(event, TransferEvent::Complete);
    assert_eq!(body, b"abcde");
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn gone_is_not_found() {
    let channel = ScriptedChannel::replying(http_response(410, "Gone", b""));
    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    session.request(&ResourceRequest::new("old")).expect("request");

    let (_, event) = drain(&mut session, 16);
    assert_eq!(
        event,
        TransferEvent::Failed(FailureReason::NotFound { status: 410 })
    );
}

#[test]
fn server_errors_and_garbage_are_protocol_errors() {
    for reply in [
        http_response(500, "Internal Server Error", b"oops"),
        b"SPDY/3 200 OK\r\n\r\n".to_vec(),
    ] {
        let channel = ScriptedChannel::replying(reply);
        let mut session = session_over(&channel);
        session.connect(&address()).expect("connect");
        session.request(&ResourceRequest::new("x")).expect("request");
        let (body, event) = drain(&mut session, 16);
        assert!(body.is_empty());
        assert!(
            matches!(event, TransferEvent::Failed(FailureReason::ProtocolError(_))),
            "{event:?}"
        );
    }
}

#[test]
fn short_body_is_truncated() {
    let mut reply = http_head(200, "OK", Some(10));
    reply.extend_from_slice(b"1234");
    let channel = ScriptedChannel::replying(reply);
    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    session.request(&ResourceRequest::new("short")).expect("request");

    let (body, event) = drain(&mut session, 16);
    assert_eq!(body, b"1234");
    assert_eq!(
        event,
        TransferEvent::Failed(FailureReason::Truncated {
            expected: 10,
            received: 4
        })
    );
}

#[test]
fn connection_reset_mid_body_is_terminal() {
    let channel = ScriptedChannel::new();
    channel.push_data(http_head(200, "OK", Some(100)));
    channel.push(ReadStep::Block);
    channel.push_data(vec![7u8; 30]);
    channel.push(ReadStep::Fail(io::ErrorKind::ConnectionReset));

    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    session.request(&ResourceRequest::new("big")).expect("request");

    let (body, event) = drain(&mut session, 64);
    assert_eq!(body.len(), 30);
    assert!(matches!(
        event,
        TransferEvent::Failed(FailureReason::Channel {
            kind: io::ErrorKind::ConnectionReset,
            ..
        })
    ));
    assert_eq!(session.poll(&mut [0u8; 8]), event);
    assert_eq!(session.bytes_transferred(), 30);
}

#[test]
fn failed_connect_can_be_retried() {
    let channel = ScriptedChannel::replying(http_response(200, "OK", b"second try"));
    let mut connector = ScriptedConnector::default();
    connector.push(Err(ConnectError::Timeout {
        address: address().to_string(),
    }));
    connector.push(Ok(channel));

    let mut session = TransferSession::with_clock(connector, ManualClock::new());
    assert!(matches!(
        session.connect(&address()),
        Err(ConnectError::Timeout { .. })
    ));
    assert_eq!(session.status(), &SessionStatus::Idle);

    session.connect(&address()).expect("retry");
    session.request(&ResourceRequest::new("retry")).expect("request");
    let (body, event) = drain(&mut session, 4);
    assert_eq!(event, TransferEvent::Complete);
    assert_eq!(body, b"second try");
}

#[test]
fn disconnect_releases_the_channel() {
    let channel = ScriptedChannel::new();
    channel.push_data(http_head(200, "OK", Some(1000)));
    channel.push_data(vec![1u8; 10]);
    channel.hold_open();

    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    session.request(&ResourceRequest::new("slow")).expect("request");
    let mut buf = [0u8; 64];
    while session.bytes_transferred() == 0 {
        session.poll(&mut buf);
    }

    session.disconnect();
    assert!(channel.is_closed());
    assert_eq!(session.status(), &SessionStatus::Idle);
    assert_eq!(
        session.poll(&mut buf),
        TransferEvent::Failed(FailureReason::Cancelled)
    );
}

/// Scripts `wire` as reads of the given sizes, cycling through them, with a
/// `WouldBlock` after every read.
fn in_pieces(wire: &[u8], sizes: &[usize]) -> ScriptedChannel {
    let channel = ScriptedChannel::new();
    let mut offset = 0;
    for size in sizes.iter().copied().cycle() {
        if offset == wire.len() {
            break;
        }
        let end = wire.len().min(offset + size.max(1));
        channel.push_data(wire[offset..end].to_vec());
        channel.push(ReadStep::Block);
        offset = end;
    }
    channel
}

/// A session that connects through `connector` and sends `request`.
fn requested(
    connector: ScriptedConnector,
    request: &ResourceRequest,
) -> TransferSession<ScriptedConnector, ManualClock> {
    let mut session = TransferSession::with_clock(connector, ManualClock::new());
    session.connect(&address()).expect("connect");
    session.request(request).expect("request");
    session
}

fn protocol_message(event: &TransferEvent) -> &str {
    match event {
        TransferEvent::Failed(FailureReason::ProtocolError(message)) => message,
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

// ============================================================================
// Chunked bodies
// ============================================================================

#[test]
fn chunked_body_split_byte_by_byte() {
    let reply = chunked_response(&[b"hello", b", ", b"chunked world"]);
    let channel = in_pieces(&reply, &[1]);
    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    session.request(&ResourceRequest::new("chunked")).expect("request");

    let (body, event) = drain(&mut session, 4);
    assert_eq!(event, TransferEvent::Complete);
    assert_eq!(body, b"hello, chunked world");
    assert_eq!(session.bytes_transferred(), 20);
    assert_eq!(session.expected_length(), None);
    assert!(channel.is_closed());
}

#[test]
fn chunk_sizes_and_extensions_split_across_reads() {
    let mut reply = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    reply.extend_from_slice(b"1A;name=value\r\nabcdefghijklmnopqrstuvwxyz\r\n");
    reply.extend_from_slice(b"0\r\nX-Checksum: none\r\n\r\n");
    let channel = in_pieces(&reply, &[3, 7, 2]);
    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    session.request(&ResourceRequest::new("letters")).expect("request");

    let (body, event) = drain(&mut session, 5);
    assert_eq!(event, TransferEvent::Complete);
    assert_eq!(body, b"abcdefghijklmnopqrstuvwxyz");
}

#[test]
fn chunked_framing_overrides_content_length() {
    let reply = b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
    let channel = ScriptedChannel::replying(reply.to_vec());
    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    session.request(&ResourceRequest::new("greeting")).expect("request");

    let (body, event) = drain(&mut session, 16);
    assert_eq!(event, TransferEvent::Complete);
    assert_eq!(body, b"hello");
}

#[test]
fn short_chunk_is_truncated() {
    let mut reply = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    reply.extend_from_slice(b"a\r\n0123");
    let channel = ScriptedChannel::replying(reply);
    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    session.request(&ResourceRequest::new("short")).expect("request");

    let (body, event) = drain(&mut session, 16);
    assert_eq!(body, b"0123");
    assert_eq!(
        event,
        TransferEvent::Failed(FailureReason::Truncated {
            expected: 10,
            received: 4
        })
    );
}

#[test]
fn missing_terminating_chunk_is_a_protocol_error() {
    let mut reply = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    reply.extend_from_slice(b"2\r\nab\r\n");
    let channel = ScriptedChannel::replying(reply);
    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    session.request(&ResourceRequest::new("unterminated")).expect("request");

    let (body, event) = drain(&mut session, 16);
    assert_eq!(body, b"ab");
    assert!(protocol_message(&event).contains("terminating chunk"));
}

#[test]
fn unsupported_codings_are_rejected() {
    let reply = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: gzip, chunked\r\n\r\n0\r\n\r\n";
    let channel = ScriptedChannel::replying(reply.to_vec());
    let mut session = session_over(&channel);
    session.connect(&address()).expect("connect");
    session.request(&ResourceRequest::new("zipped")).expect("request");

    let (_, event) = drain(&mut session, 16);
    assert!(protocol_message(&event).contains("Transfer-Encoding"));
}

// ============================================================================
// Redirects
// ============================================================================

#[test]
fn follows_a_redirect_to_another_host() {
    let first = ScriptedChannel::replying(redirect_response(301, "http://mirror.test:9090/files/other.z"));
    let second = ScriptedChannel::replying(http_response(200, "OK", b"moved body"));
    let mut connector = ScriptedConnector::with_channel(first.clone());
    connector.push(Ok(second.clone()));

    let mut session = requested(connector, &ResourceRequest::new("docs/a.z"));
    let (body, event) = drain(&mut session, 8);
    assert_eq!(event, TransferEvent::Complete);
    assert_eq!(body, b"moved body");
    assert!(first.is_closed());
    assert!(second.is_closed());

    let request = String::from_utf8(second.written()).expect("utf8 request");
    assert!(request.starts_with("GET /files/other.z HTTP/1.1\r\n"), "{request}");
    assert!(request.contains("\r\nHost: mirror.test:9090\r\n"), "{request}");
}

#[test]
fn relative_redirect_keeps_host_and_range() {
    let first = ScriptedChannel::replying(redirect_response(307, "other.z"));
    let second = ScriptedChannel::replying(http_response(206, "Partial Content", b"abcd"));
    let mut connector = ScriptedConnector::with_channel(first);
    connector.push(Ok(second.clone()));

    let range = ByteRange::new(0, 3).expect("range");
    let mut session = requested(connector, &ResourceRequest::new("docs/a.z").with_range(range));
    let (body, event) = drain(&mut session, 8);
    assert_eq!(event, TransferEvent::Complete);
    assert_eq!(body, b"abcd");

    let request = String::from_utf8(second.written()).expect("utf8 request");
    assert!(request.starts_with("GET /docs/other.z HTTP/1.1\r\n"), "{request}");
    assert!(request.contains("\r\nHost: files.example:8080\r\n"), "{request}");
    assert!(request.contains("\r\nRange: bytes=0-3\r\n"), "{request}");
}

#[test]
fn redirect_cycles_are_protocol_errors() {
    let mut connector = ScriptedConnector::with_channel(ScriptedChannel::replying(
        redirect_response(302, "/b"),
    ));
    connector.push(Ok(ScriptedChannel::replying(redirect_response(302, "/a"))));
    connector.push(Ok(ScriptedChannel::replying(redirect_response(302, "/b"))));

    let mut session = requested(connector, &ResourceRequest::new("a"));
    let (_, event) = drain(&mut session, 8);
    assert!(protocol_message(&event).contains("cycle"));
}

#[test]
fn redirect_chains_are_bounded() {
    let mut connector = ScriptedConnector::default();
    for hop in 0..=MAX_REDIRECTS {
        connector.push(Ok(ScriptedChannel::replying(redirect_response(
            301,
            &format!("/hop{hop}"),
        ))));
    }

    let mut session = requested(connector, &ResourceRequest::new("start"));
    let (_, event) = drain(&mut session, 8);
    assert!(protocol_message(&event).contains("redirects"));
}

#[test]
fn unusable_redirects_are_protocol_errors() {
    for reply in [
        b"HTTP/1.1 302 Found\r\nContent-Length: 0\r\n\r\n".to_vec(),
        redirect_response(301, "https://secure.test/a.z"),
    ] {
        let connector = ScriptedConnector::with_channel(ScriptedChannel::replying(reply));
        let mut session = requested(connector, &ResourceRequest::new("a.z"));
        let (body, event) = drain(&mut session, 8);
        assert!(body.is_empty());
        protocol_message(&event);
    }
}

#[test]
fn failed_reconnect_after_a_redirect_is_a_channel_failure() {
    let mut connector = ScriptedConnector::with_channel(ScriptedChannel::replying(
        redirect_response(301, "http://mirror.test/a.z"),
    ));
    connector.push(Err(ConnectError::Refused {
        address: "mirror.test:80".to_owned(),
    }));

    let mut session = requested(connector, &ResourceRequest::new("a.z"));
    let (_, event) = drain(&mut session, 8);
    assert!(matches!(
        event,
        TransferEvent::Failed(FailureReason::Channel {
            kind: io::ErrorKind::ConnectionRefused,
            ..
        })
    ));
}

// ============================================================================
// Throttling
// ============================================================================

#[test]
fn throttled_session_never_exceeds_its_allowance() {
    const RATE: u64 = 1024;
    const BODY: usize = 8 * 1024;

    let channel = ScriptedChannel::replying(http_response(200, "OK", &vec![0x5a; BODY]));
    let clock = ManualClock::new();
    let limiter = BandwidthLimiter::new(NonZeroU64::new(RATE).expect("rate"));
    let burst = limiter.write_max_bytes();
    let mut session = TransferSession::with_clock(
        ScriptedConnector::with_channel(channel),
        clock.clone(),
    )
    .with_limiter(limiter);
    session.connect(&address()).expect("connect");
    session.request(&ResourceRequest::new("paced")).expect("request");

    let mut buf = vec![0u8; BODY];
    let mut delivered = 0usize;
    loop {
        match session.poll(&mut buf) {
            TransferEvent::DataAvailable(n) => {
                assert!(n <= burst, "delivered {n} bytes with a {burst}-byte bucket");
                delivered += n;
                let elapsed = clock.elapsed().as_secs_f64();
                let ceiling = burst as f64 + RATE as f64 * elapsed + 1.0;
                assert!(
                    delivered as f64 <= ceiling,
                    "{delivered} bytes after {elapsed}s exceeds {ceiling}"
                );
            }
            TransferEvent::WouldBlock => clock.advance(Duration::from_millis(50)),
            TransferEvent::Complete => break,
            other => panic!("unexpected event {other:?}"),
        }
        assert!(clock.elapsed() < Duration::from_secs(60), "throttle stalled");
    }

    assert_eq!(delivered, BODY);
    let minimum = Duration::from_secs_f64((BODY - burst) as f64 / RATE as f64);
    assert!(clock.elapsed() >= minimum - Duration::from_millis(100));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn body_is_independent_of_read_splits(
        payload in prop::collection::vec(any::<u8>(), 0..2048),
        sizes in prop::collection::vec(1usize..64, 1..16),
        chunk_len in 1usize..300,
        poll_len in 1usize..100,
        chunked in any::<bool>(),
    ) {
        let reply = if chunked {
            let chunks: Vec<&[u8]> = payload.chunks(chunk_len).collect();
            chunked_response(&chunks)
        } else {
            http_response(200, "OK", &payload)
        };
        let channel = in_pieces(&reply, &sizes);
        let mut session = session_over(&channel);
        session.connect(&address()).expect("connect");
        session.request(&ResourceRequest::new("split")).expect("request");

        let mut body = Vec::new();
        let mut buf = vec![0u8; poll_len];
        let event = loop {
            match session.poll(&mut buf) {
                TransferEvent::DataAvailable(n) => body.extend_from_slice(&buf[..n]),
                TransferEvent::WouldBlock => {}
                terminal => break terminal,
            }
        };
        prop_assert_eq!(event, TransferEvent::Complete);
        prop_assert_eq!(body, payload);
    }
}
