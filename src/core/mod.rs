//! # Core Wire Components
//!
//! Field model, binary wire codec and USB report framing.
//!
//! This module is the foundation the device session is built on: typed messages
//! are mapped onto key/value fields, encoded in the protobuf wire format and
//! split into fixed-size reports for the USB link.
//!
//! ## Components
//! - **Field**: schema descriptors and the `Encode`/`Decode` capabilities
//! - **Writer / Reader**: protobuf-compatible binary codec over `bytes`
//! - **Frame**: 64-byte report packetizing and reassembly
//!
//! ## Wire Format
//! ```text
//! tag    = (field_id << 3) | wire_type     (varint)
//! report = ['?','#','#'] [id: u16 BE] [len: u32 BE] [payload..55]
//!          ['?'] [payload..63] ...
//! ```
//!
//! ## Limits
//! - Nesting depth: [`MAX_DEPTH`] objects, checked before any bytes are parsed
//! - Reports carry at most `u32::MAX` payload bytes

pub mod field;
pub mod frame;
pub mod reader;
pub mod varint;
pub mod writer;

use bytes::Bytes;

use crate::error::{constants, ProtocolError, Result};
use field::{Decode, Encode, WireReader};
use reader::BinaryReader;
use writer::BinaryWriter;

/// Maximum object nesting accepted by the writer and the reader.
pub const MAX_DEPTH: usize = 100;

/// Protobuf wire types understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    /// Key for field `id` with this wire type.
    #[inline]
    pub fn tag(self, id: u32) -> u64 {
        (u64::from(id) << 3) | self as u64
    }

    /// Group wire types (3 and 4) and the reserved 6/7 are rejected.
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            5 => Ok(Self::Fixed32),
            _ => Err(ProtocolError::InvalidEncoding(constants::ERR_UNKNOWN_WIRE_TYPE)),
        }
    }
}

/// Encode `value` as one root object.
pub fn to_bytes<T: Encode + ?Sized>(value: &T) -> Result<Bytes> {
    let mut writer = BinaryWriter::new();
    value.encode(&mut writer)?;
    writer.take_bytes()
}

/// Decode one root object, requiring every input byte to be consumed.
pub fn from_bytes<T: Decode + Default>(input: Bytes) -> Result<T> {
    let mut reader = BinaryReader::new(input);
    let mut value = T::default();
    value.decode(&mut reader)?;
    reader.check_complete()?;
    Ok(value)
}
