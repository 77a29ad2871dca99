//! Per-client frame assembly.
//!
//! Each readable event drains exactly the bytes the kernel reports as queued
//! (`FIONREAD`). A frame may therefore arrive over any number of events; the
//! connection keeps the bytes gathered so far and resumes where it stopped.
//! Every complete frame is parsed, dispatched and answered before the next
//! one is considered.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

use serde_json::Value;
use tracing::debug;

use sockctl_proto::{HEADER_LEN, Request, decode_header, encode_frame};

use super::TRANSPORT_TARGET;
use super::errors::{DisconnectReason, ProtocolError};
use super::sys;
use crate::dispatch::MethodRegistry;

/// Outcome of handling a readable event.
#[derive(Debug)]
pub enum ConnectionState {
    /// The connection stays registered.
    Open,
    /// The connection must be dropped.
    Closed(DisconnectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Complete,
    Partial,
}

/// Fixed-capacity assembly buffer holding at most one frame.
#[derive(Debug)]
struct FrameBuffer {
    bytes: Box<[u8]>,
    filled: usize,
}

impl FrameBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0_u8; capacity].into_boxed_slice(),
            filled: 0,
        }
    }

    const fn header_complete(&self) -> bool {
        self.filled >= HEADER_LEN
    }

    fn declared_len(&self) -> usize {
        let mut header = [0_u8; HEADER_LEN];
        if let Some(bytes) = self.bytes.get(..HEADER_LEN) {
            header.copy_from_slice(bytes);
        }
        decode_header(header) as usize
    }

    fn payload_limit(&self) -> usize {
        self.bytes.len().saturating_sub(HEADER_LEN)
    }

    fn payload(&self) -> &[u8] {
        self.bytes.get(HEADER_LEN..self.filled).unwrap_or_default()
    }

    fn spare(&mut self, len: usize) -> &mut [u8] {
        let end = self.filled.saturating_add(len).min(self.bytes.len());
        self.bytes.get_mut(self.filled..end).unwrap_or_default()
    }

    const fn reset(&mut self) {
        self.filled = 0;
    }
}

/// A connected client and its partially assembled frame.
#[derive(Debug)]
pub struct ClientConnection {
    stream: UnixStream,
    buffer: FrameBuffer,
}

impl ClientConnection {
    /// Wraps a non-blocking stream.
    ///
    /// `max_message_len` bounds a whole frame, header included, and sizes
    /// the assembly buffer.
    #[must_use]
    pub fn new(stream: UnixStream, max_message_len: usize) -> Self {
        Self {
            stream,
            buffer: FrameBuffer::new(max_message_len),
        }
    }

    /// Descriptor watched by the event loop for this client.
    #[must_use]
    pub fn fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    /// Bytes of the current frame gathered so far.
    #[must_use]
    pub const fn buffered(&self) -> usize {
        self.buffer.filled
    }

    /// Consumes the bytes currently queued on the socket.
    ///
    /// Complete frames are dispatched through `registry` and answered in
    /// order. Any framing violation, read or write failure, or end of stream
    /// yields [`ConnectionState::Closed`].
    pub fn handle_readable(&mut self, registry: &MethodRegistry) -> ConnectionState {
        match self.drain(registry) {
            Ok(()) => ConnectionState::Open,
            Err(reason) => ConnectionState::Closed(reason),
        }
    }

    fn drain(&mut self, registry: &MethodRegistry) -> Result<(), DisconnectReason> {
        let mut available = sys::bytes_available(self.fd()).map_err(DisconnectReason::Read)?;
        if available == 0 {
            // Readable with nothing queued: either the peer hung up or the
            // wake-up was spurious.
            if !self.probe()? {
                return Ok(());
            }
            available = sys::bytes_available(self.fd()).map_err(DisconnectReason::Read)?;
        }

        loop {
            if !self.buffer.header_complete() {
                if available == 0 {
                    return Ok(());
                }
                if self.read_up_to(HEADER_LEN, &mut available)? == Progress::Partial {
                    return Ok(());
                }
            }

            let declared = self.buffer.declared_len();
            let limit = self.buffer.payload_limit();
            if declared > limit {
                return Err(ProtocolError::Oversized { declared, limit }.into());
            }

            if self.read_up_to(HEADER_LEN + declared, &mut available)? == Progress::Partial {
                return Ok(());
            }

            let response = self.dispatch(registry)?;
            self.buffer.reset();
            self.send(&response)?;

            if available == 0 {
                return Ok(());
            }
        }
    }

    /// Reads toward `target` buffered bytes without exceeding `available`.
    fn read_up_to(
        &mut self,
        target: usize,
        available: &mut usize,
    ) -> Result<Progress, DisconnectReason> {
        let mut want = target.saturating_sub(self.buffer.filled).min(*available);
        while want > 0 {
            match self.stream.read(self.buffer.spare(want)) {
                Ok(0) => return Err(DisconnectReason::EndOfStream),
                Ok(read) => {
                    self.buffer.filled += read;
                    want -= read;
                    *available = available.saturating_sub(read);
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    *available = 0;
                    break;
                }
                Err(error) => return Err(DisconnectReason::Read(error)),
            }
        }

        if self.buffer.filled >= target {
            Ok(Progress::Complete)
        } else {
            Ok(Progress::Partial)
        }
    }

    /// Reads a single byte of the current frame to tell a hang-up from a
    /// spurious wake-up. Returns `true` when a byte was consumed.
    fn probe(&mut self) -> Result<bool, DisconnectReason> {
        loop {
            match self.stream.read(self.buffer.spare(1)) {
                Ok(0) => return Err(DisconnectReason::EndOfStream),
                Ok(read) => {
                    self.buffer.filled += read;
                    return Ok(true);
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(error) => return Err(DisconnectReason::Read(error)),
            }
        }
    }

    fn dispatch(&self, registry: &MethodRegistry) -> Result<Value, DisconnectReason> {
        let request = Request::parse(self.buffer.payload()).map_err(ProtocolError::from)?;
        debug!(
            target: TRANSPORT_TARGET,
            fd = self.fd(),
            method = %request.method,
            "request received"
        );
        Ok(registry.dispatch(&request.method, request.data))
    }

    /// Writes a whole response frame, waiting for the socket to drain
    /// whenever the kernel buffer is full.
    fn send(&mut self, response: &Value) -> Result<(), DisconnectReason> {
        let frame = encode_frame(response).map_err(DisconnectReason::Encode)?;
        let mut remaining = frame.as_slice();
        while !remaining.is_empty() {
            match self.stream.write(remaining) {
                Ok(0) => {
                    return Err(DisconnectReason::Write(io::Error::from(
                        io::ErrorKind::WriteZero,
                    )));
                }
                Ok(written) => remaining = remaining.get(written..).unwrap_or_default(),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    sys::wait_writable(self.fd()).map_err(DisconnectReason::Write)?;
                }
                Err(error) => return Err(DisconnectReason::Write(error)),
            }
        }
        Ok(())
    }
}

impl Drop for ClientConnection {
    fn drop(&mut self) {
        if let Err(error) = self.stream.shutdown(Shutdown::Both)
            && error.kind() != io::ErrorKind::NotConnected
        {
            debug!(
                target: TRANSPORT_TARGET,
                fd = self.fd(),
                error = %error,
                "failed to shut down client socket"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::thread;
    use std::time::Duration;

    use rstest::{fixture, rstest};
    use serde_json::json;

    use sockctl_proto::{RequestError, read_frame};

    use super::*;

    const LIMIT: usize = 1 << 20;

    struct Pair {
        peer: UnixStream,
        connection: ClientConnection,
        /// Second handle on the server side, used to inspect queued bytes.
        server_view: UnixStream,
        calls: Rc<RefCell<Vec<(String, Value)>>>,
        registry: MethodRegistry,
    }

    impl Pair {
        fn with_limit(max_message_len: usize) -> Self {
            let (peer, server) = UnixStream::pair().expect("socket pair");
            server.set_nonblocking(true).expect("non-blocking");
            peer.set_read_timeout(Some(Duration::from_secs(5)))
                .expect("read timeout");
            let server_view = server.try_clone().expect("clone");
            let calls = Rc::new(RefCell::new(Vec::new()));
            let mut registry = MethodRegistry::new();
            registry.register_method("ping", |_| json!({ "pong": true }));
            let recorded = Rc::clone(&calls);
            registry.register_method("record", move |data: Value| {
                recorded.borrow_mut().push(("record".to_owned(), data.clone()));
                json!({ "seen": data })
            });
            Self {
                peer,
                connection: ClientConnection::new(server, max_message_len),
                server_view,
                calls,
                registry,
            }
        }

        fn send(&mut self, bytes: &[u8]) {
            self.peer.write_all(bytes).expect("peer write");
        }

        fn pump(&mut self) -> ConnectionState {
            self.connection.handle_readable(&self.registry)
        }

        fn response(&mut self) -> Value {
            read_frame(&mut self.peer, LIMIT).expect("response frame")
        }

        fn queued_on_server(&self) -> usize {
            sys::bytes_available(self.server_view.as_raw_fd()).expect("FIONREAD")
        }

        fn queued_for_peer(&self) -> usize {
            sys::bytes_available(self.peer.as_raw_fd()).expect("FIONREAD")
        }
    }

    #[fixture]
    fn pair() -> Pair {
        Pair::with_limit(LIMIT)
    }

    fn frame(payload: &[u8]) -> Vec<u8> {
        let len = u32::try_from(payload.len()).expect("length fits");
        let mut bytes = len.to_ne_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    fn assert_open(state: &ConnectionState) {
        assert!(
            matches!(state, ConnectionState::Open),
            "expected open connection, got {state:?}"
        );
    }

    #[rstest]
    fn answers_ping_with_thirteen_byte_frame(mut pair: Pair) {
        let request = frame(br#"{"method":"ping"}"#);
        assert_eq!(request.get(..4), Some(17_u32.to_ne_bytes().as_slice()));
        pair.send(&request);

        assert_open(&pair.pump());

        let mut header = [0_u8; 4];
        pair.peer.read_exact(&mut header).expect("header");
        assert_eq!(u32::from_ne_bytes(header), 13);
        let mut body = [0_u8; 13];
        pair.peer.read_exact(&mut body).expect("body");
        assert_eq!(&body, br#"{"pong":true}"#);
    }

    #[rstest]
    fn split_header_and_body_resume_across_events(mut pair: Pair) {
        let request = frame(br#"{"method":"record","data":{"n":1}}"#);
        let (head, tail) = request.split_at(2);
        let (body_start, body_end) = tail.split_at(5);

        pair.send(head);
        assert_open(&pair.pump());
        assert_eq!(pair.connection.buffered(), 2);

        pair.send(body_start);
        assert_open(&pair.pump());
        assert_eq!(pair.connection.buffered(), 7);
        assert!(pair.calls.borrow().is_empty());

        pair.send(body_end);
        assert_open(&pair.pump());
        assert_eq!(pair.calls.borrow().len(), 1);
        assert_eq!(pair.response(), json!({ "seen": { "n": 1 } }));
        assert_eq!(pair.connection.buffered(), 0);
    }

    #[rstest]
    fn one_byte_per_event_dispatches_once_at_the_end(mut pair: Pair) {
        let request = frame(br#"{"method":"record","data":"slow"}"#);
        let (last, rest) = request.split_last().expect("non-empty frame");

        for byte in rest {
            pair.send(&[*byte]);
            assert_open(&pair.pump());
            assert!(pair.calls.borrow().is_empty());
        }
        pair.send(&[*last]);
        assert_open(&pair.pump());

        assert_eq!(
            pair.calls.borrow().as_slice(),
            &[("record".to_owned(), json!("slow"))]
        );
        assert_eq!(pair.response(), json!({ "seen": "slow" }));
    }

    #[rstest]
    fn frames_in_one_event_are_answered_in_order(mut pair: Pair) {
        let mut bytes = frame(br#"{"method":"record","data":1}"#);
        bytes.extend(frame(br#"{"method":"record","data":2}"#));
        bytes.extend(frame(br#"{"method":"record","data":3}"#).get(..6).expect("prefix"));
        pair.send(&bytes);

        assert_open(&pair.pump());

        let seen: Vec<Value> = pair.calls.borrow().iter().map(|(_, data)| data.clone()).collect();
        assert_eq!(seen, vec![json!(1), json!(2)]);
        assert_eq!(pair.response(), json!({ "seen": 1 }));
        assert_eq!(pair.response(), json!({ "seen": 2 }));
        assert_eq!(pair.connection.buffered(), 6);
    }

    #[rstest]
    fn unknown_method_is_answered_and_connection_stays_open(mut pair: Pair) {
        pair.send(&frame(br#"{"method":"nope","data":{}}"#));
        assert_open(&pair.pump());
        assert_eq!(
            pair.response(),
            json!({ "error": "No such method found!" })
        );
    }

    #[test]
    fn oversized_length_disconnects_without_reading_the_body() {
        let mut pair = Pair::with_limit(64);
        let body = [b' '; 100];
        pair.send(&frame(&body));

        let state = pair.pump();

        assert!(matches!(
            state,
            ConnectionState::Closed(DisconnectReason::Protocol(ProtocolError::Oversized {
                declared: 100,
                limit: 60,
            }))
        ));
        assert_eq!(pair.queued_on_server(), body.len());
        assert!(pair.calls.borrow().is_empty());
    }

    #[test]
    fn payload_at_the_ceiling_is_accepted() {
        let mut pair = Pair::with_limit(64);
        let mut payload = br#"{"method":"record","data":""#.to_vec();
        let padding = 60 - payload.len() - 2;
        payload.extend(std::iter::repeat_n(b'a', padding));
        payload.extend_from_slice(br#""}"#);
        assert_eq!(payload.len(), 60);
        pair.send(&frame(&payload));

        assert_open(&pair.pump());
        assert_eq!(pair.calls.borrow().len(), 1);
    }

    #[rstest]
    #[case(br#"{"method":"#.as_slice())]
    #[case(b"\xff\xfe".as_slice())]
    #[case(b"".as_slice())]
    fn malformed_json_disconnects_without_reply(mut pair: Pair, #[case] payload: &[u8]) {
        pair.send(&frame(payload));

        let state = pair.pump();

        assert!(matches!(
            state,
            ConnectionState::Closed(DisconnectReason::Protocol(ProtocolError::Request(
                RequestError::MalformedJson(_)
            )))
        ));
        assert_eq!(pair.queued_for_peer(), 0);
    }

    #[rstest]
    #[case(br#"{"data":{}}"#.as_slice())]
    #[case(br#"{"method":7}"#.as_slice())]
    #[case(br#"["ping"]"#.as_slice())]
    fn missing_method_disconnects_without_reply(mut pair: Pair, #[case] payload: &[u8]) {
        pair.send(&frame(payload));

        let state = pair.pump();

        assert!(matches!(
            state,
            ConnectionState::Closed(DisconnectReason::Protocol(ProtocolError::Request(
                RequestError::MissingMethod
            )))
        ));
        assert_eq!(pair.queued_for_peer(), 0);
    }

    #[rstest]
    fn peer_hang_up_is_end_of_stream(pair: Pair) {
        let Pair {
            peer,
            mut connection,
            registry,
            ..
        } = pair;
        drop(peer);

        let state = connection.handle_readable(&registry);

        assert!(matches!(
            state,
            ConnectionState::Closed(DisconnectReason::EndOfStream)
        ));
    }

    #[rstest]
    fn hang_up_mid_frame_is_end_of_stream(mut pair: Pair) {
        pair.send(&frame(br#"{"method":"ping"}"#).get(..9).expect("prefix").to_vec());
        assert_open(&pair.pump());

        let Pair {
            peer,
            mut connection,
            registry,
            ..
        } = pair;
        drop(peer);

        assert!(matches!(
            connection.handle_readable(&registry),
            ConnectionState::Closed(DisconnectReason::EndOfStream)
        ));
    }

    #[rstest]
    fn spurious_wake_up_keeps_connection_open(mut pair: Pair) {
        assert_open(&pair.pump());
        assert_eq!(pair.connection.buffered(), 0);
    }

    #[rstest]
    fn write_failure_disconnects(pair: Pair) {
        let Pair {
            mut peer,
            mut connection,
            registry,
            ..
        } = pair;
        peer.write_all(&frame(br#"{"method":"ping"}"#)).expect("write");
        drop(peer);

        assert!(matches!(
            connection.handle_readable(&registry),
            ConnectionState::Closed(DisconnectReason::Write(_))
        ));
    }

    #[test]
    fn large_response_is_delivered_once_the_peer_drains() {
        let mut pair = Pair::with_limit(LIMIT);
        let blob = "z".repeat(900_000);
        let reply = json!({ "blob": blob });
        let expected = reply.clone();
        pair.registry
            .register_method("blob", move |_| reply.clone());
        pair.send(&frame(br#"{"method":"blob"}"#));

        let mut reader = pair.peer.try_clone().expect("clone peer");
        let drained = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            read_frame(&mut reader, 2 * LIMIT).expect("response")
        });

        assert_open(&pair.pump());
        let response = drained.join().expect("reader thread");
        assert_eq!(response, expected);
    }
}
