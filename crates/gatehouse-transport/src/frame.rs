//! NUL-terminated frame codec.
//!
//! Game clients send ASCII frames terminated by `\0`, usually with a
//! `\n` right before the terminator. The server terminates its own frames
//! with `\0` only.

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Largest frame accepted from a client, terminator excluded.
pub const MAX_FRAME_LEN: usize = 4096;

const TERMINATOR: u8 = b'\0';

/// Splits a byte stream into NUL-terminated frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_len: usize,
}

impl FrameCodec {
    /// Creates a codec with the default [`MAX_FRAME_LEN`].
    pub fn new() -> Self {
        Self {
            max_len: MAX_FRAME_LEN,
        }
    }

    /// Creates a codec that rejects frames longer than `max_len` bytes.
    pub fn with_max_len(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Vec<u8>;
    type Error = io::Error;

    fn decode(
        &mut self,
        src: &mut BytesMut,
    ) -> Result<Option<Self::Item>, Self::Error> {
        let Some(end) = src.iter().position(|b| *b == TERMINATOR) else {
            if src.len() > self.max_len {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("frame exceeds {} bytes", self.max_len),
                ));
            }
            return Ok(None);
        };

        if end > self.max_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame exceeds {} bytes", self.max_len),
            ));
        }

        let mut frame = src.split_to(end).to_vec();
        src.advance(1);

        while matches!(frame.last(), Some(b'\n' | b'\r')) {
            frame.pop();
        }
        Ok(Some(frame))
    }

    fn decode_eof(
        &mut self,
        src: &mut BytesMut,
    ) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                // An unterminated tail is never a message.
                src.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<Vec<u8>> for FrameCodec {
    type Error = io::Error;

    fn encode(
        &mut self,
        item: Vec<u8>,
        dst: &mut BytesMut,
    ) -> Result<(), Self::Error> {
        if item.contains(&TERMINATOR) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "frame contains a NUL byte",
            ));
        }
        dst.reserve(item.len() + 1);
        dst.put_slice(&item);
        dst.put_u8(TERMINATOR);
        Ok(())
    }
}
