//! # Report Framing
//!
//! Splits one logical message into fixed 64-byte USB reports and puts it back
//! together on the way in.
//!
//! ## Layout
//! ```text
//! first:        ['?' '#' '#'] [id: u16 BE] [length: u32 BE] [payload 0..55]
//! continuation: ['?'] [payload 0..63]
//! ```
//! The final report is zero-padded. A message of `L` bytes takes
//! `1 + ceil(max(0, L - 55) / 63)` reports.

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::field::Encode;
use crate::core::to_bytes;
use crate::error::{constants, ProtocolError, Result};

pub const REPORT_SIZE: usize = 64;
pub const MAGIC: &[u8; 3] = b"?##";
pub const CONTINUATION: u8 = b'?';
pub const HEADER_LEN: usize = 9;
pub const FIRST_CHUNK: usize = REPORT_SIZE - HEADER_LEN;
pub const CONTINUATION_CHUNK: usize = REPORT_SIZE - 1;

/// Upper bound on the buffer reserved from an untrusted length header.
const MAX_PREALLOC: usize = 64 * 1024;

/// One fixed-size USB report.
pub type Report = [u8; REPORT_SIZE];

/// A reassembled message before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: u16,
    pub payload: Bytes,
}

impl RawMessage {
    /// Encode `message` under message id `id`.
    pub fn encode<M: Encode + ?Sized>(id: u16, message: &M) -> Result<Self> {
        Ok(Self {
            id,
            payload: to_bytes(message)?,
        })
    }

    pub fn empty(id: u16) -> Self {
        Self {
            id,
            payload: Bytes::new(),
        }
    }
}

/// Number of reports needed for a payload of `len` bytes.
pub fn report_count(len: usize) -> usize {
    1 + len.saturating_sub(FIRST_CHUNK).div_ceil(CONTINUATION_CHUNK)
}

/// Split `payload` into reports for message `id`.
pub fn packetize(id: u16, payload: &[u8]) -> Result<Vec<Report>> {
    let length =
        u32::try_from(payload.len()).map_err(|_| ProtocolError::OversizedPacket(payload.len()))?;

    let mut reports = Vec::with_capacity(report_count(payload.len()));
    let (head, mut rest) = payload.split_at(payload.len().min(FIRST_CHUNK));

    let mut first = [0u8; REPORT_SIZE];
    {
        let mut out = &mut first[..];
        out.put_slice(MAGIC);
        out.put_u16(id);
        out.put_u32(length);
        out.put_slice(head);
    }
    reports.push(first);

    while !rest.is_empty() {
        let (chunk, tail) = rest.split_at(rest.len().min(CONTINUATION_CHUNK));
        let mut report = [0u8; REPORT_SIZE];
        report[0] = CONTINUATION;
        report[1..1 + chunk.len()].copy_from_slice(chunk);
        reports.push(report);
        rest = tail;
    }

    Ok(reports)
}

/// Incremental report reassembly for a single message.
#[derive(Debug, Default)]
pub struct Reassembler {
    header: Option<(u16, usize)>,
    buffer: BytesMut,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a first report has been accepted and the message is not complete.
    pub fn in_progress(&self) -> bool {
        self.header.is_some()
    }

    /// Feed one report; returns the message once its length is satisfied.
    pub fn push(&mut self, report: &Report) -> Result<Option<RawMessage>> {
        let (id, length) = match self.header {
            None => {
                if &report[..MAGIC.len()] != MAGIC {
                    return Err(ProtocolError::InvalidEncoding(constants::ERR_INVALID_MAGIC));
                }
                let id = u16::from_be_bytes([report[3], report[4]]);
                let length =
                    u32::from_be_bytes([report[5], report[6], report[7], report[8]]) as usize;

                let take = length.min(FIRST_CHUNK);
                self.buffer = BytesMut::with_capacity(length.min(MAX_PREALLOC));
                self.buffer
                    .extend_from_slice(&report[HEADER_LEN..HEADER_LEN + take]);
                (id, length)
            }
            Some((id, length)) => {
                if report[0] != CONTINUATION {
                    self.reset();
                    return Err(ProtocolError::InvalidEncoding(
                        constants::ERR_INVALID_CONTINUATION,
                    ));
                }
                let take = (length - self.buffer.len()).min(CONTINUATION_CHUNK);
                self.buffer.extend_from_slice(&report[1..1 + take]);
                (id, length)
            }
        };

        if self.buffer.len() < length {
            self.header = Some((id, length));
            return Ok(None);
        }

        self.header = None;
        Ok(Some(RawMessage {
            id,
            payload: self.buffer.split().freeze(),
        }))
    }

    pub fn reset(&mut self) {
        self.header = None;
        self.buffer.clear();
    }
}
