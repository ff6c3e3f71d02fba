//! Byte-stream framing.
//!
//! The device writes frames back to back on the serial line:
//!
//! ```text
//! 0xFF 0xFF <type: u8> <length: u8> <payload: length bytes>
//! ```
//!
//! Reads from the port are arbitrary chunks of that stream: a frame may be
//! split across reads, and line noise may sit between frames. The
//! [`FrameSynchronizer`] keeps the unconsumed tail between reads and skips
//! noise one byte at a time, so frame extraction does not depend on where
//! the chunk boundaries fall.

use log::{debug, trace};

use crate::errors::ProtocolError;

// ============================================================================
// Constants
// ============================================================================

/// Two-byte start-of-frame marker.
pub const MARKER: [u8; 2] = [0xFF, 0xFF];

/// Marker + type byte + length byte.
pub const HEADER_LEN: usize = 4;

/// Largest payload a single length byte can describe.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

// ============================================================================
// Frame
// ============================================================================

/// A header-delimited chunk of the serial stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: u8,
    // Never longer than MAX_PAYLOAD_LEN; only built through `new` or the synchronizer.
    payload: Vec<u8>,
}

impl Frame {
    /// Build a frame, rejecting payloads the length byte cannot describe.
    pub fn new(kind: u8, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLong(payload.len()));
        }
        Ok(Self { kind, payload })
    }

    /// Raw packet type code.
    #[inline]
    pub fn kind(&self) -> u8 {
        self.kind
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length as carried in the header.
    #[inline]
    pub fn len(&self) -> u8 {
        // `new` bounds the payload to what a length byte can hold.
        u8::try_from(self.payload.len()).unwrap_or(u8::MAX)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Serialize to wire bytes (header + payload).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&MARKER);
        out.push(self.kind);
        out.push(self.len());
        out.extend_from_slice(&self.payload);
        out
    }
}

// ============================================================================
// Frame Synchronizer
// ============================================================================

/// Incremental frame extractor over an accumulating byte buffer.
#[derive(Debug, Default)]
pub struct FrameSynchronizer {
    buffer: Vec<u8>,
    skipped: u64,
}

impl FrameSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a newly-read chunk and extract every complete frame.
    ///
    /// An incomplete trailing frame (or a lone trailing `0xFF` that may be the
    /// first half of a marker) is kept for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut pos = 0usize;
        let mut noise = 0usize;
        let len = self.buffer.len();

        while pos < len {
            if self.buffer[pos] != MARKER[0] {
                pos += 1;
                noise += 1;
                continue;
            }
            if pos + 1 >= len {
                // Possible first half of a marker; wait for more bytes.
                break;
            }
            if self.buffer[pos + 1] != MARKER[1] {
                pos += 1;
                noise += 1;
                continue;
            }
            if pos + HEADER_LEN > len {
                break;
            }

            let kind = self.buffer[pos + 2];
            let payload_len = self.buffer[pos + 3] as usize;
            let start = pos + HEADER_LEN;
            let end = start + payload_len;
            if end > len {
                trace!(
                    "partial frame: type={:#04X}, need {} bytes, have {}",
                    kind,
                    payload_len,
                    len - start
                );
                break;
            }

            frames.push(Frame {
                kind,
                payload: self.buffer[start..end].to_vec(),
            });
            pos = end;
        }

        if noise > 0 {
            self.skipped += noise as u64;
            debug!("skipped {} noise bytes while resynchronizing", noise);
        }
        self.buffer.drain(..pos);
        frames
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Total noise bytes discarded since creation (or the last reset).
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Drop any partially received frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.skipped = 0;
    }
}
