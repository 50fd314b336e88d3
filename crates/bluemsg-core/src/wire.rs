//! Message framing
//!
//! Every chat message travels as one frame: a 4-byte big-endian length header
//! followed by that many UTF-8 bytes. Frames survive fragmentation and
//! coalescing on the underlying byte stream.

use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::warn;

/// Width of the length header in bytes
pub const LENGTH_HEADER_LEN: usize = 4;

/// Default upper bound for a single message payload
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024;

/// Length-delimited UTF-8 text codec
#[derive(Debug)]
pub struct MessageCodec {
    inner: LengthDelimitedCodec,
    max_message_size: usize,
}

impl MessageCodec {
    pub fn new(max_message_size: usize) -> Self {
        let inner = LengthDelimitedCodec::builder()
            .length_field_length(LENGTH_HEADER_LEN)
            .big_endian()
            .max_frame_length(max_message_size)
            .new_codec();
        Self {
            inner,
            max_message_size,
        }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl Clone for MessageCodec {
    fn clone(&self) -> Self {
        Self::new(self.max_message_size)
    }
}

impl Decoder for MessageCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            match self.inner.decode(src)? {
                // Empty frames carry no message
                Some(frame) if frame.is_empty() => continue,
                Some(frame) => return Ok(Some(decode_text(frame))),
                None => return Ok(None),
            }
        }
    }
}

impl Encoder<String> for MessageCodec {
    type Error = io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        if item.len() > self.max_message_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "message of {} bytes exceeds limit of {} bytes",
                    item.len(),
                    self.max_message_size
                ),
            ));
        }
        self.inner.encode(Bytes::from(item), dst)
    }
}

fn decode_text(frame: BytesMut) -> String {
    match String::from_utf8(frame.to_vec()) {
        Ok(text) => text,
        Err(err) => {
            warn!("Received frame with invalid UTF-8, decoding lossily: {}", err);
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    }
}

/// Wrap the read half of a stream in a message decoder
pub fn message_reader<R: AsyncRead>(reader: R, max_message_size: usize) -> FramedRead<R, MessageCodec> {
    FramedRead::new(reader, MessageCodec::new(max_message_size))
}

/// Wrap the write half of a stream in a message encoder
pub fn message_writer<W: AsyncWrite>(writer: W, max_message_size: usize) -> FramedWrite<W, MessageCodec> {
    FramedWrite::new(writer, MessageCodec::new(max_message_size))
}
