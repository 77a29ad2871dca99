//! Length-prefixed frame codec.
//!
//! The blocking helpers here are used by clients and tests. The daemon
//! assembles frames incrementally from a non-blocking socket and only
//! borrows [`decode_header`] and [`encode_frame`] from this module.

use std::io::{self, Read, Write};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 4;

/// Default ceiling for a whole frame, header included (1 MiB).
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 1 << 20;

/// Errors raised while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Reading or writing the underlying stream failed.
    #[error("frame I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The peer declared a payload larger than the configured ceiling.
    #[error("declared payload of {declared} bytes exceeds the {limit} byte limit")]
    Oversized {
        /// Payload length announced by the header.
        declared: usize,
        /// Largest payload accepted.
        limit: usize,
    },
    /// A payload cannot be described by a 32-bit length prefix.
    #[error("payload of {len} bytes does not fit a 32-bit length prefix")]
    PayloadTooLarge {
        /// Serialised payload length.
        len: usize,
    },
    /// The payload was not valid JSON.
    #[error("frame payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Interprets a length prefix.
#[must_use]
pub const fn decode_header(header: [u8; HEADER_LEN]) -> u32 {
    u32::from_ne_bytes(header)
}

/// Serialises `value` and prepends its length prefix.
///
/// # Errors
///
/// Returns [`FrameError::Json`] when serialisation fails and
/// [`FrameError::PayloadTooLarge`] when the payload exceeds `u32::MAX` bytes.
pub fn encode_frame<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, FrameError> {
    let payload = serde_json::to_vec(value)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| FrameError::PayloadTooLarge { len: payload.len() })?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_ne_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Writes one framed value and flushes the writer.
///
/// # Errors
///
/// Propagates encoding failures and I/O errors from the writer.
pub fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), FrameError>
where
    W: Write,
    T: Serialize + ?Sized,
{
    let frame = encode_frame(value)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Reads one framed value.
///
/// `max_message_len` bounds the whole frame, header included, mirroring the
/// ceiling the daemon enforces on requests.
///
/// # Errors
///
/// Returns [`FrameError::Oversized`] before reading any payload byte when
/// the header announces too much data, [`FrameError::Io`] on short reads and
/// [`FrameError::Json`] when the payload does not parse.
pub fn read_frame<R: Read>(reader: &mut R, max_message_len: usize) -> Result<Value, FrameError> {
    let mut header = [0_u8; HEADER_LEN];
    reader.read_exact(&mut header)?;
    let declared = decode_header(header) as usize;
    let limit = max_message_len.saturating_sub(HEADER_LEN);
    if declared > limit {
        return Err(FrameError::Oversized { declared, limit });
    }

    let mut payload = vec![0_u8; declared];
    reader.read_exact(&mut payload)?;
    Ok(serde_json::from_slice(&payload)?)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[test]
    fn encodes_host_order_length_prefix() {
        let frame = encode_frame(&json!({"pong": true})).expect("encode");
        let (header, payload) = frame.split_at(HEADER_LEN);
        let header: [u8; HEADER_LEN] = header.try_into().expect("header length");
        assert_eq!(decode_header(header), 13);
        assert_eq!(payload, br#"{"pong":true}"#);
    }

    #[rstest]
    #[case::null(json!(null))]
    #[case::boolean(json!(false))]
    #[case::negative(json!(-42))]
    #[case::float(json!(2.5))]
    #[case::unicode(json!("caf\u{e9} \u{1f980}"))]
    #[case::array(json!([1, "two", [3.0, null]]))]
    #[case::nested(json!({"a": {"b": {"c": [true, {"d": "e"}]}}}))]
    fn frames_preserve_json_values(#[case] value: Value) {
        let mut wire = Vec::new();
        write_frame(&mut wire, &value).expect("write frame");

        let decoded =
            read_frame(&mut Cursor::new(wire), DEFAULT_MAX_MESSAGE_LEN).expect("read frame");
        assert_eq!(decoded, value);
    }

    #[test]
    fn payload_at_the_ceiling_is_accepted() {
        let padding = DEFAULT_MAX_MESSAGE_LEN - HEADER_LEN - 2;
        let value = Value::String("x".repeat(padding));
        let frame = encode_frame(&value).expect("encode");
        assert_eq!(frame.len(), DEFAULT_MAX_MESSAGE_LEN);

        let decoded =
            read_frame(&mut Cursor::new(frame), DEFAULT_MAX_MESSAGE_LEN).expect("read frame");
        assert_eq!(decoded, value);
    }

    #[test]
    fn rejects_oversized_header_without_reading_payload() {
        let declared = u32::try_from(DEFAULT_MAX_MESSAGE_LEN).expect("fits u32");
        let mut wire = declared.to_ne_bytes().to_vec();
        wire.extend_from_slice(b"{}");
        let mut cursor = Cursor::new(wire);

        let error = read_frame(&mut cursor, DEFAULT_MAX_MESSAGE_LEN).expect_err("oversized");
        assert!(matches!(error, FrameError::Oversized { .. }));
        assert_eq!(cursor.position(), HEADER_LEN as u64);
    }

    #[test]
    fn short_payload_is_an_io_error() {
        let mut wire = 10_u32.to_ne_bytes().to_vec();
        wire.extend_from_slice(b"{}");

        let error =
            read_frame(&mut Cursor::new(wire), DEFAULT_MAX_MESSAGE_LEN).expect_err("short read");
        assert!(matches!(error, FrameError::Io(_)));
    }

    #[test]
    fn invalid_json_payload_is_reported() {
        let mut wire = 3_u32.to_ne_bytes().to_vec();
        wire.extend_from_slice(b"{no");

        let error =
            read_frame(&mut Cursor::new(wire), DEFAULT_MAX_MESSAGE_LEN).expect_err("bad json");
        assert!(matches!(error, FrameError::Json(_)));
    }
}
