//! Session-data frame codec
//!
//! Every notification on the session-data characteristic is one frame:
//!
//! ```text
//! ┌────────────┬────────────┬──────────────────────────┐
//! │ index (BE) │ total (BE) │ payload (≤ chunk size)   │
//! │  2 bytes   │  2 bytes   │                          │
//! └────────────┴────────────┴──────────────────────────┘
//!
//! index = total = 0xFFFF   completion sentinel, no payload
//! index = total = 0xFFFE   error sentinel, payload = UTF-8 message
//! ```
//!
//! [`ChunkAssembler`] is the receiving side: it rebuilds the session bytes
//! and rejects gaps, duplicates and total-count changes, since the device
//! never retransmits.

use alloc::string::String;
use alloc::vec::Vec;

use crate::constants::buffers::{FRAME_HEADER_LEN, MAX_CHUNK_SIZE, MAX_ERROR_MESSAGE_LEN, MAX_FRAME_LEN};
use crate::constants::protocol::{SENTINEL_COMPLETE, SENTINEL_ERROR};
use crate::errors::FrameError;

/// Encoded frame
pub type FrameBuf = heapless::Vec<u8, MAX_FRAME_LEN>;

/// Decoded frame, borrowing its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Data chunk
    Chunk {
        /// Zero-based chunk index
        index: u16,
        /// Chunks in the transfer
        total: u16,
        /// Chunk bytes
        payload: &'a [u8],
    },
    /// Transfer or delete finished
    Complete,
    /// Command or transfer failed
    Error(&'a str),
}

fn framed(index: u16, total: u16, payload: &[u8]) -> Result<FrameBuf, FrameError> {
    if payload.len() > MAX_CHUNK_SIZE {
        return Err(FrameError::PayloadTooLarge { len: payload.len() });
    }
    let mut out = FrameBuf::new();
    out.extend_from_slice(&index.to_be_bytes())
        .and_then(|_| out.extend_from_slice(&total.to_be_bytes()))
        .and_then(|_| out.extend_from_slice(payload))
        .map_err(|_| FrameError::PayloadTooLarge { len: payload.len() })?;
    Ok(out)
}

/// Data chunk `index` of `total`
pub fn encode_chunk(index: u16, total: u16, payload: &[u8]) -> Result<FrameBuf, FrameError> {
    framed(index, total, payload)
}

/// Completion sentinel
pub fn encode_complete() -> [u8; FRAME_HEADER_LEN] {
    let [hi, lo] = SENTINEL_COMPLETE.to_be_bytes();
    [hi, lo, hi, lo]
}

/// Error sentinel carrying `message`, cut to `max_payload` bytes
///
/// Never longer than [`MAX_ERROR_MESSAGE_LEN`]; the cut never splits a
/// UTF-8 character.
pub fn encode_error(message: &str, max_payload: usize) -> FrameBuf {
    let limit = max_payload.min(MAX_ERROR_MESSAGE_LEN);
    let mut end = message.len().min(limit);
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    // Payload is bounded by MAX_ERROR_MESSAGE_LEN above.
    framed(SENTINEL_ERROR, SENTINEL_ERROR, &message.as_bytes()[..end]).unwrap_or_default()
}

/// Parse one frame
pub fn decode(bytes: &[u8]) -> Result<Frame<'_>, FrameError> {
    if bytes.len() < FRAME_HEADER_LEN {
        return Err(FrameError::Truncated { len: bytes.len() });
    }
    let index = u16::from_be_bytes([bytes[0], bytes[1]]);
    let total = u16::from_be_bytes([bytes[2], bytes[3]]);
    let payload = &bytes[FRAME_HEADER_LEN..];

    Ok(match (index, total) {
        (SENTINEL_COMPLETE, SENTINEL_COMPLETE) => Frame::Complete,
        (SENTINEL_ERROR, SENTINEL_ERROR) => {
            let text = match core::str::from_utf8(payload) {
                Ok(text) => text,
                Err(err) => core::str::from_utf8(&payload[..err.valid_up_to()]).unwrap_or_default(),
            };
            Frame::Error(text)
        }
        _ => Frame::Chunk { index, total, payload },
    })
}

/// Receiving-side reassembly of one transfer at a time
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    data: Vec<u8>,
    next_index: u16,
    total: Option<u16>,
}

impl ChunkAssembler {
    /// Empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks accepted so far in the current transfer
    pub fn received(&self) -> u16 {
        self.next_index
    }

    /// Drop any partial transfer
    pub fn reset(&mut self) {
        self.data.clear();
        self.next_index = 0;
        self.total = None;
    }

    /// Feed one frame
    ///
    /// Returns the reassembled bytes on the completion sentinel. Any error
    /// discards the partial transfer.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, FrameError> {
        let result = self.accept(bytes);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn accept(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, FrameError> {
        match decode(bytes)? {
            Frame::Chunk { index, total, payload } => {
                if index != self.next_index {
                    return Err(FrameError::OutOfOrder {
                        expected: self.next_index,
                        got: index,
                    });
                }
                match self.total {
                    Some(expected) if expected != total => {
                        return Err(FrameError::TotalMismatch { expected, got: total })
                    }
                    _ => self.total = Some(total),
                }
                if index >= total {
                    return Err(FrameError::OutOfOrder {
                        expected: self.next_index,
                        got: index,
                    });
                }
                self.data.extend_from_slice(payload);
                self.next_index += 1;
                Ok(None)
            }
            Frame::Complete => {
                let total = self.total.unwrap_or(0);
                if self.next_index != total {
                    return Err(FrameError::Incomplete {
                        received: self.next_index,
                        total,
                    });
                }
                let data = core::mem::take(&mut self.data);
                self.reset();
                Ok(Some(data))
            }
            Frame::Error(message) => Err(FrameError::Remote(String::from(message))),
        }
    }
}
