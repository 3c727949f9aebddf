//! Newline-delimited JSON framing for the command channel.
//!
//! Every message is one compact JSON object followed by `\n`. The stream
//! codec wraps [`tokio_util::codec::LinesCodec`] with a maximum line length
//! so a follower that never sends a newline cannot make the leader buffer
//! without bound.
//!
//! The connection handler drives [`WireCodec`] directly over its read
//! buffer instead of through `FramedRead`, because a framed stream ends
//! after the first decode error and an over-long line must not close the
//! connection.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Deserialize;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::models::{MessageKind, WireMessage};
use crate::{AppError, Result};

/// Maximum inbound line length: 64 KiB.
///
/// Follower reports are short status strings; anything longer is discarded
/// and reported as [`AppError::Codec`].
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Line codec for the TCP command channel.
#[derive(Debug)]
pub struct WireCodec(LinesCodec);

impl WireCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for WireCodec {
    type Item = String;
    type Error = AppError;

    /// Returns `Ok(None)` while no complete line is buffered. After a
    /// "line too long" error the next calls discard input up to the next
    /// newline.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

/// Serialize `message` into a single `\n`-terminated frame.
///
/// # Errors
///
/// Returns [`AppError::Codec`] if serialization fails.
pub fn encode<M: WireMessage>(message: &M) -> Result<Bytes> {
    let json = serde_json::to_vec(message)?;
    let mut frame = BytesMut::with_capacity(json.len() + 1);
    frame.put_slice(&json);
    frame.put_u8(b'\n');
    Ok(frame.freeze())
}

/// Parse one line (without its terminator) as message shape `M`.
///
/// Unknown fields are ignored. The `Type` discriminator must be present and
/// must belong to `M`.
///
/// # Errors
///
/// Returns [`AppError::Codec`] for blank input, malformed JSON, a missing
/// required field, or a discriminator that belongs to another shape.
pub fn decode<M: WireMessage>(line: &str) -> Result<M> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(AppError::Codec("empty message".into()));
    }

    // Check `Type` before the typed parse.
    let value: serde_json::Value = serde_json::from_str(trimmed)?;
    let kind = match value.get("Type") {
        Some(raw) => MessageKind::deserialize(raw)
            .map_err(|err| AppError::Codec(format!("unknown message type: {err}")))?,
        None => return Err(AppError::Codec("missing message type".into())),
    };
    if !M::accepts(kind) {
        return Err(AppError::Codec(format!("unexpected message type: {kind}")));
    }
    Ok(M::deserialize(value)?)
}

/// Parse a datagram payload (which may or may not carry a trailing newline).
///
/// # Errors
///
/// Same as [`decode`], plus [`AppError::Codec`] for invalid UTF-8.
pub fn decode_bytes<M: WireMessage>(raw: &[u8]) -> Result<M> {
    let text = std::str::from_utf8(raw)
        .map_err(|err| AppError::Codec(format!("invalid utf-8: {err}")))?;
    decode(text)
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Codec(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
