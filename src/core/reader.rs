//! Binary reader for the protobuf-compatible wire format.
//!
//! The reader keeps one `Bytes` view per open container. Opening a nested
//! object or packed array carves its length-delimited body out of the parent
//! view, so binary values come back as zero-copy slices of the input.

use bytes::{Buf, Bytes};

use crate::core::field::WireReader;
use crate::core::varint;
use crate::core::{WireType, MAX_DEPTH};
use crate::error::{constants, ProtocolError, Result, SchemaError};

/// Reads one root object from protobuf bytes.
pub struct BinaryReader {
    input: Bytes,
    views: [Bytes; MAX_DEPTH],
    depth: usize,
    pending: Option<WireType>,
}

impl BinaryReader {
    pub fn new(input: Bytes) -> Self {
        Self {
            input,
            views: std::array::from_fn(|_| Bytes::new()),
            depth: 0,
            pending: None,
        }
    }

    /// Current nesting level; 0 outside the root object.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn view(&mut self) -> Result<&mut Bytes> {
        match self.depth {
            0 => Err(ProtocolError::InvalidState(constants::ERR_READ_OUTSIDE_OBJECT)),
            depth => Ok(&mut self.views[depth - 1]),
        }
    }

    fn expect(&self, expected: &'static str, allowed: &[WireType]) -> Result<WireType> {
        let found = self
            .pending
            .ok_or(ProtocolError::InvalidState(constants::ERR_READ_OUTSIDE_OBJECT))?;
        if allowed.contains(&found) {
            Ok(found)
        } else {
            Err(SchemaError::UnexpectedWireType {
                expected,
                found: found as u8,
            }
            .into())
        }
    }

    /// Split a length-delimited body off the current view.
    fn delimited(&mut self, expected: &'static str) -> Result<Bytes> {
        self.expect(expected, &[WireType::LengthDelimited])?;
        let view = self.view()?;
        let len = varint::decode(view, 64)?;
        if len > view.len() as u64 {
            return Err(ProtocolError::InvalidEncoding(constants::ERR_SHORT_BYTES));
        }
        Ok(view.split_to(len as usize))
    }

    fn varint(&mut self, expected: &'static str) -> Result<u64> {
        self.expect(expected, &[WireType::Varint])?;
        varint::decode(self.view()?, 64)
    }

    fn skip(&mut self, wire_type: WireType) -> Result<()> {
        let view = self.view()?;
        match wire_type {
            WireType::Varint => {
                varint::decode(view, 64)?;
            }
            WireType::LengthDelimited => {
                let len = varint::decode(view, 64)?;
                if len > view.len() as u64 {
                    return Err(ProtocolError::InvalidEncoding(constants::ERR_SHORT_BYTES));
                }
                view.advance(len as usize);
            }
            WireType::Fixed32 | WireType::Fixed64 => {
                let len = if wire_type == WireType::Fixed32 { 4 } else { 8 };
                if view.len() < len {
                    return Err(ProtocolError::InvalidEncoding(constants::ERR_SHORT_FIXED));
                }
                view.advance(len);
            }
        }
        Ok(())
    }

    fn fixed(&mut self, len: usize) -> Result<&mut Bytes> {
        let view = self.view()?;
        if view.len() < len {
            return Err(ProtocolError::InvalidEncoding(constants::ERR_SHORT_FIXED));
        }
        Ok(view)
    }

    fn push(&mut self) -> Result<()> {
        if self.depth == MAX_DEPTH {
            return Err(SchemaError::MaximumDepth(MAX_DEPTH).into());
        }
        let body = if self.depth == 0 {
            std::mem::take(&mut self.input)
        } else {
            self.delimited("object")?
        };
        self.views[self.depth] = body;
        self.depth += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(ProtocolError::InvalidState(constants::ERR_UNBALANCED_END));
        }
        if !self.views[self.depth - 1].is_empty() {
            return Err(ProtocolError::InvalidEncoding(constants::ERR_INCOMPLETE_PARSE));
        }
        self.depth -= 1;
        Ok(())
    }
}

impl WireReader for BinaryReader {
    fn unsigned_integer(&mut self) -> Result<u64> {
        let found = self.expect(
            "unsigned integer",
            &[WireType::Varint, WireType::Fixed32, WireType::Fixed64],
        )?;
        match found {
            WireType::Fixed32 => Ok(u64::from(self.fixed(4)?.get_u32_le())),
            WireType::Fixed64 => Ok(self.fixed(8)?.get_u64_le()),
            _ => varint::decode(self.view()?, 64),
        }
    }

    fn integer(&mut self) -> Result<i64> {
        let found = self.expect(
            "integer",
            &[WireType::Varint, WireType::Fixed32, WireType::Fixed64],
        )?;
        match found {
            WireType::Fixed32 => Ok(i64::from(self.fixed(4)?.get_i32_le())),
            WireType::Fixed64 => Ok(self.fixed(8)?.get_i64_le()),
            // two's complement, as written for non-zigzag int32/int64
            _ => Ok(varint::decode(self.view()?, 64)? as i64),
        }
    }

    fn boolean(&mut self) -> Result<bool> {
        match self.varint("boolean")? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(SchemaError::SmallerInteger { value, max: 1 }.into()),
        }
    }

    fn string(&mut self) -> Result<String> {
        let body = self.delimited("string")?;
        String::from_utf8(body.to_vec())
            .map_err(|_| ProtocolError::InvalidEncoding(constants::ERR_INVALID_UTF8))
    }

    fn binary(&mut self) -> Result<Bytes> {
        self.delimited("binary")
    }

    fn binary_into(&mut self, dest: &mut [u8]) -> Result<()> {
        let body = self.delimited("binary")?;
        if body.len() != dest.len() {
            return Err(SchemaError::FixedBinary {
                expected: dest.len(),
                actual: body.len(),
            }
            .into());
        }
        dest.copy_from_slice(&body);
        Ok(())
    }

    fn enumeration(&mut self) -> Result<u64> {
        self.varint("enumeration")
    }

    fn start_array(&mut self) -> Result<()> {
        self.push()?;
        self.pending = Some(WireType::Varint);
        Ok(())
    }

    fn is_array_end(&mut self) -> Result<bool> {
        Ok(self.view()?.is_empty())
    }

    fn end_array(&mut self) -> Result<()> {
        self.pop()
    }

    fn is_packed(&self) -> bool {
        self.pending == Some(WireType::LengthDelimited)
    }

    fn start_object(&mut self) -> Result<()> {
        self.push()?;
        self.pending = None;
        Ok(())
    }

    fn key(&mut self, ids: &[u32]) -> Result<Option<usize>> {
        loop {
            let view = self.view()?;
            if view.is_empty() {
                self.pending = None;
                return Ok(None);
            }

            let tag = varint::decode(view, 32)?;
            let wire_type = WireType::from_bits((tag & 0x7) as u8)?;
            let id = (tag >> 3) as u32;
            self.pending = Some(wire_type);

            if let Some(index) = ids.iter().position(|&known| known == id) {
                return Ok(Some(index));
            }
            tracing::trace!(id, ?wire_type, "skipping unknown field");
            self.skip(wire_type)?;
        }
    }

    fn end_object(&mut self) -> Result<()> {
        self.pop()
    }

    fn check_complete(&self) -> Result<()> {
        if self.depth != 0 || !self.input.is_empty() {
            return Err(ProtocolError::InvalidEncoding(constants::ERR_INCOMPLETE_PARSE));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn reader(bytes: &'static [u8]) -> BinaryReader {
        BinaryReader::new(Bytes::from_static(bytes))
    }

    /// `levels` objects, each holding the next under field 1.
    fn nested(levels: usize) -> Bytes {
        let mut inner = BytesMut::new();
        for _ in 1..levels {
            let mut outer = BytesMut::new();
            varint::encode(&mut outer, WireType::LengthDelimited.tag(1));
            varint::encode(&mut outer, inner.len() as u64);
            outer.extend_from_slice(&inner);
            inner = outer;
        }
        inner.freeze()
    }

    fn descend(reader: &mut BinaryReader, levels: usize) -> Result<()> {
        for level in 0..levels {
            reader.start_object()?;
            if level + 1 < levels {
                assert_eq!(reader.key(&[1])?, Some(0));
            }
        }
        Ok(())
    }

    #[test]
    fn test_skips_unknown_fields() {
        // 1: varint, 2: bytes, 3: fixed32, 4: fixed64, then 5: varint 7
        let mut reader = reader(&[
            0x08, 0x01, 0x12, 0x01, 0xff, 0x1d, 1, 2, 3, 4, 0x21, 1, 2, 3, 4, 5, 6, 7, 8, 0x28,
            0x07,
        ]);
        reader.start_object().unwrap();
        assert_eq!(reader.key(&[5]).unwrap(), Some(0));
        assert_eq!(reader.unsigned_integer().unwrap(), 7);
        assert_eq!(reader.key(&[5]).unwrap(), None);
        reader.end_object().unwrap();
        reader.check_complete().unwrap();
    }

    #[test]
    fn test_group_wire_types_rejected() {
        for tag in [0x0b_u8, 0x0c, 0x0e, 0x0f] {
            let mut reader = BinaryReader::new(Bytes::from(vec![tag, 0x00]));
            reader.start_object().unwrap();
            assert!(matches!(
                reader.key(&[1]),
                Err(ProtocolError::InvalidEncoding(_))
            ));
        }
    }

    #[test]
    fn test_wire_type_mismatch() {
        let mut reader = reader(&[0x08, 0x01]);
        reader.start_object().unwrap();
        reader.key(&[1]).unwrap();
        assert!(matches!(
            reader.string(),
            Err(ProtocolError::Schema(SchemaError::UnexpectedWireType { found: 0, .. }))
        ));
    }

    #[test]
    fn test_fixed_width_unsigned() {
        let mut reader = reader(&[0x0d, 0x01, 0x00, 0x00, 0x80]);
        reader.start_object().unwrap();
        reader.key(&[1]).unwrap();
        assert_eq!(reader.unsigned_integer().unwrap(), 0x8000_0001);
    }

    #[test]
    fn test_boolean_range() {
        let mut reader = reader(&[0x08, 0x02]);
        reader.start_object().unwrap();
        reader.key(&[1]).unwrap();
        assert!(matches!(
            reader.boolean(),
            Err(ProtocolError::Schema(SchemaError::SmallerInteger { value: 2, max: 1 }))
        ));
    }

    #[test]
    fn test_binary_is_zero_copy() {
        let input = Bytes::from_static(&[0x0a, 0x03, 7, 8, 9]);
        let mut reader = BinaryReader::new(input.clone());
        reader.start_object().unwrap();
        reader.key(&[1]).unwrap();
        let value = reader.binary().unwrap();
        assert_eq!(&value[..], &[7, 8, 9]);
        assert_eq!(value.as_ptr(), input[2..].as_ptr());
    }

    #[test]
    fn test_fixed_binary_length() {
        let mut reader = reader(&[0x0a, 0x02, 1, 2]);
        reader.start_object().unwrap();
        reader.key(&[1]).unwrap();
        let mut dest = [0u8; 3];
        assert!(matches!(
            reader.binary_into(&mut dest),
            Err(ProtocolError::Schema(SchemaError::FixedBinary {
                expected: 3,
                actual: 2
            }))
        ));
    }

    #[test]
    fn test_truncated_length_delimited() {
        let mut reader = reader(&[0x0a, 0x05, 1, 2]);
        reader.start_object().unwrap();
        reader.key(&[1]).unwrap();
        assert!(matches!(
            reader.binary(),
            Err(ProtocolError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut reader = reader(&[0x0a, 0x02, 0xc3, 0x28]);
        reader.start_object().unwrap();
        reader.key(&[1]).unwrap();
        assert!(matches!(
            reader.string(),
            Err(ProtocolError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_packed_array() {
        let mut reader = reader(&[0x0a, 0x04, 0x01, 0x96, 0x01, 0x03]);
        reader.start_object().unwrap();
        reader.key(&[1]).unwrap();
        assert!(reader.is_packed());
        reader.start_array().unwrap();
        let mut values = Vec::new();
        while !reader.is_array_end().unwrap() {
            values.push(reader.unsigned_integer().unwrap());
        }
        reader.end_array().unwrap();
        assert_eq!(values, vec![1, 150, 3]);
    }

    #[test]
    fn test_check_complete() {
        let reader = reader(&[0x08, 0x01]);
        assert!(reader.check_complete().is_err());

        let mut reader = BinaryReader::new(Bytes::from_static(&[0x08, 0x01]));
        reader.start_object().unwrap();
        assert!(reader.check_complete().is_err());
        reader.key(&[1]).unwrap();
        reader.unsigned_integer().unwrap();
        assert_eq!(reader.key(&[1]).unwrap(), None);
        reader.end_object().unwrap();
        reader.check_complete().unwrap();
    }

    #[test]
    fn test_depth_limit() {
        let mut ok = BinaryReader::new(nested(MAX_DEPTH));
        descend(&mut ok, MAX_DEPTH).unwrap();
        assert_eq!(ok.depth(), MAX_DEPTH);

        let mut deep = BinaryReader::new(nested(MAX_DEPTH + 1));
        descend(&mut deep, MAX_DEPTH).unwrap();
        assert_eq!(deep.key(&[1]).unwrap(), Some(0));
        assert!(matches!(
            deep.start_object(),
            Err(ProtocolError::Schema(SchemaError::MaximumDepth(MAX_DEPTH)))
        ));
    }
}
