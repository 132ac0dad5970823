//! Tokio codec for newline-delimited JSON frames

use std::marker::PhantomData;

use bytes::{BufMut, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Maximum length of a single frame line (16MB)
pub const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Codec decoding `D` frames and encoding `E` frames, one JSON object per line
#[derive(Debug)]
pub struct JsonLineCodec<D, E> {
    /// Offset already scanned for a newline
    next_index: usize,
    /// Maximum accepted line length
    max_length: usize,
    _types: PhantomData<fn() -> (D, E)>,
}

impl<D, E> JsonLineCodec<D, E> {
    /// Create a new codec with the default line limit
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom line limit
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length,
            _types: PhantomData,
        }
    }
}

impl<D, E> Default for JsonLineCodec<D, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DeserializeOwned, E> Decoder for JsonLineCodec<D, E> {
    type Item = D;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');

            let Some(offset) = newline else {
                if src.len() > self.max_length {
                    return Err(ProtocolError::LineTooLarge {
                        size: src.len(),
                        max: self.max_length,
                    });
                }
                // Need more data
                self.next_index = src.len();
                return Ok(None);
            };

            let line_end = self.next_index + offset;
            self.next_index = 0;

            if line_end > self.max_length {
                return Err(ProtocolError::LineTooLarge {
                    size: line_end,
                    max: self.max_length,
                });
            }

            let line = src.split_to(line_end + 1);
            let line = &line[..line_end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            if line.iter().all(|b| b.is_ascii_whitespace()) {
                // Blank keepalive line
                continue;
            }

            let text = std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8)?;
            return Ok(Some(serde_json::from_str(text)?));
        }
    }
}

impl<D, E: Serialize> Encoder<E> for JsonLineCodec<D, E> {
    type Error = ProtocolError;

    fn encode(&mut self, item: E, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;

        if payload.len() > self.max_length {
            return Err(ProtocolError::LineTooLarge {
                size: payload.len(),
                max: self.max_length,
            });
        }

        dst.reserve(payload.len() + 1);
        dst.extend_from_slice(&payload);
        dst.put_u8(b'\n');
        Ok(())
    }
}
