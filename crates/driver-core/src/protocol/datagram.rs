//! Splitting encoded frames into bounded UDP datagrams.
//!
//! Wire format of one datagram:
//! ```text
//! [offset:4][remaining:4][payload:N]
//! ```
//! `offset` is the number of frame bytes sent before this chunk, `remaining`
//! the number still to come after it.  Both are big-endian `u32`.  A frame is
//! complete when a datagram with `remaining == 0` arrives.
//!
//! A frame of `S` bytes with a payload cap of `P` yields `ceil(S / P)`
//! datagrams, and exactly one (header only, `0/0`) when `S == 0`.

use thiserror::Error;

/// Maximum payload bytes per datagram, header excluded.
pub const MAX_PAYLOAD: usize = 2000;

/// Size of the offset/remaining header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Errors raised while splitting or reassembling frames.
#[derive(Debug, Error, PartialEq)]
pub enum DatagramError {
    /// The frame length does not fit in the 32-bit header fields.
    #[error("frame of {0} bytes exceeds the 32-bit header range")]
    FrameTooLarge(usize),

    /// A payload cap of zero can never make progress.
    #[error("max payload must be at least 1 byte")]
    ZeroPayload,

    /// Fewer bytes than a header.
    #[error("datagram too short: need at least {HEADER_SIZE} bytes, got {0}")]
    TooShort(usize),

    /// A datagram does not continue the frame being reassembled.
    #[error("unexpected offset: expected {expected}, got {actual}")]
    OutOfOrder { expected: u32, actual: u32 },
}

/// The 8-byte header in front of every datagram payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramHeader {
    pub offset: u32,
    pub remaining: u32,
}

impl DatagramHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.offset.to_be_bytes());
        buf[4..8].copy_from_slice(&self.remaining.to_be_bytes());
        buf
    }

    /// Reads the header from the front of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`DatagramError::TooShort`] if fewer than [`HEADER_SIZE`] bytes
    /// are available.
    pub fn decode(bytes: &[u8]) -> Result<Self, DatagramError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DatagramError::TooShort(bytes.len()));
        }
        Ok(Self {
            offset: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            remaining: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }

    /// Whether this is the last datagram of its frame.
    pub fn is_last(&self) -> bool {
        self.remaining == 0
    }
}

/// Lazily yields the datagrams of one frame, header included.
///
/// Created by [`split_frame`].  Each item is a fresh buffer handed straight to
/// the transport; nothing is retained after it is yielded.
#[derive(Debug)]
pub struct FrameChunks<'a> {
    frame: &'a [u8],
    max_payload: usize,
    sent: usize,
    done: bool,
}

impl Iterator for FrameChunks<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let end = (self.sent + self.max_payload).min(self.frame.len());
        let payload = &self.frame[self.sent..end];
        // Lengths were checked against u32::MAX in split_frame.
        let header = DatagramHeader {
            offset: self.sent as u32,
            remaining: (self.frame.len() - end) as u32,
        };

        let mut datagram = Vec::with_capacity(HEADER_SIZE + payload.len());
        datagram.extend_from_slice(&header.encode());
        datagram.extend_from_slice(payload);

        self.sent = end;
        self.done = header.is_last();
        Some(datagram)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let left = self.frame.len() - self.sent;
        let n = left.div_ceil(self.max_payload).max(1);
        (n, Some(n))
    }
}

impl ExactSizeIterator for FrameChunks<'_> {}

/// Splits `frame` into datagrams of at most `max_payload` payload bytes.
///
/// # Errors
///
/// - [`DatagramError::ZeroPayload`] if `max_payload` is zero.
/// - [`DatagramError::FrameTooLarge`] if the frame length exceeds `u32::MAX`.
///
/// # Examples
///
/// ```rust
/// use driver_core::protocol::datagram::{split_frame, DatagramHeader, MAX_PAYLOAD};
///
/// let frame = vec![7u8; 4500];
/// let datagrams: Vec<Vec<u8>> = split_frame(&frame, MAX_PAYLOAD).unwrap().collect();
/// assert_eq!(datagrams.len(), 3);
/// let last = DatagramHeader::decode(&datagrams[2]).unwrap();
/// assert_eq!((last.offset, last.remaining), (4000, 0));
/// ```
pub fn split_frame(frame: &[u8], max_payload: usize) -> Result<FrameChunks<'_>, DatagramError> {
    if max_payload == 0 {
        return Err(DatagramError::ZeroPayload);
    }
    if u32::try_from(frame.len()).is_err() {
        return Err(DatagramError::FrameTooLarge(frame.len()));
    }
    Ok(FrameChunks {
        frame,
        max_payload,
        sent: 0,
        done: false,
    })
}

/// Rebuilds frames from datagrams arriving in order.
///
/// Used by stream clients.  A datagram with offset 0 always starts a new frame,
/// discarding any partial one.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    buffer: Vec<u8>,
    in_progress: bool,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one datagram.  Returns the complete frame when `datagram` is the
    /// last chunk of it.
    ///
    /// # Errors
    ///
    /// Returns [`DatagramError::TooShort`] for a truncated datagram and
    /// [`DatagramError::OutOfOrder`] when the offset does not continue the
    /// current frame.  After an error the partial frame is dropped.
    pub fn push(&mut self, datagram: &[u8]) -> Result<Option<Vec<u8>>, DatagramError> {
        let header = DatagramHeader::decode(datagram)?;

        if header.offset == 0 {
            self.buffer.clear();
            self.in_progress = true;
        }

        let expected = self.buffer.len() as u32;
        if !self.in_progress || header.offset != expected {
            self.reset();
            return Err(DatagramError::OutOfOrder {
                expected,
                actual: header.offset,
            });
        }

        self.buffer.extend_from_slice(&datagram[HEADER_SIZE..]);
        if header.is_last() {
            self.in_progress = false;
            return Ok(Some(std::mem::take(&mut self.buffer)));
        }
        Ok(None)
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_progress = false;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
