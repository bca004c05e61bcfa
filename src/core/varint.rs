//! Base-128 unsigned varints.
//!
//! Little-endian 7-bit groups with `0x80` as the continuation bit. Decoding is
//! strict: the value must fit the requested bit width and a trailing all-zero
//! group is rejected, so every value has exactly one accepted encoding.

use bytes::{Buf, BufMut, Bytes};

use crate::error::{constants, ProtocolError, Result, SchemaError};

/// Longest encoding of a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

/// Append `value` to `out`.
#[inline]
pub fn encode<B: BufMut>(out: &mut B, mut value: u64) {
    while value > 0x7f {
        out.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.put_u8(value as u8);
}

/// Number of bytes [`encode`] writes for `value`.
#[inline]
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decode a varint from the front of `source` into a value of at most `bits` bits.
///
/// On success the varint is consumed from `source`. On failure `source` is left
/// untouched.
pub fn decode(source: &mut Bytes, bits: u32) -> Result<u64> {
    debug_assert!(bits > 0 && bits <= 64);
    let mut value: u64 = 0;
    let mut shift: u32 = 0;

    for (index, &raw) in source.iter().enumerate() {
        if shift >= bits {
            return Err(ProtocolError::InvalidEncoding(constants::ERR_VARINT_TOO_LONG));
        }
        let group = u64::from(raw & 0x7f);
        let room = bits - shift;
        if room < 7 && group >> room != 0 {
            return Err(overflow(bits));
        }
        if raw == 0 && shift != 0 {
            return Err(ProtocolError::InvalidEncoding(constants::ERR_VARINT_ZERO_GROUP));
        }

        value |= group << shift;
        if raw & 0x80 == 0 {
            source.advance(index + 1);
            return Ok(value);
        }
        shift += 7;
    }

    Err(ProtocolError::InvalidEncoding(constants::ERR_VARINT_EOF))
}

fn overflow(bits: u32) -> ProtocolError {
    let max = if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    };
    // the true value is unknown once it overflows; report the first value past the limit
    SchemaError::SmallerInteger {
        value: max.saturating_add(1),
        max,
    }
    .into()
}
