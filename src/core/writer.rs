//! Binary writer for the protobuf-compatible wire format.
//!
//! Nested objects are built bottom-up in a fixed stack of per-depth buffers.
//! When a child object closes it is length-prefixed into its parent under the
//! key that was pending when it opened, and its slot is cleared for reuse.

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::field::WireWriter;
use crate::core::varint;
use crate::core::{WireType, MAX_DEPTH};
use crate::error::{constants, ProtocolError, Result, SchemaError};

/// Writes one root object into protobuf bytes.
pub struct BinaryWriter {
    slots: [BytesMut; MAX_DEPTH],
    /// Key each open object was started under, indexed like `slots`.
    parent_keys: [u32; MAX_DEPTH],
    depth: usize,
    pending: Option<u32>,
    finished: bool,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| BytesMut::new()),
            parent_keys: [0; MAX_DEPTH],
            depth: 0,
            pending: None,
            finished: false,
        }
    }

    /// Current nesting level; 0 outside the root object.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Take the finished root object.
    pub fn take_bytes(&mut self) -> Result<Bytes> {
        if !self.finished || self.depth != 0 {
            return Err(ProtocolError::InvalidState(constants::ERR_INCOMPLETE_OUTPUT));
        }
        self.finished = false;
        Ok(self.slots[0].split().freeze())
    }

    /// Start a value in the current object: emit the tag and return its buffer.
    fn begin_value(&mut self, wire_type: WireType) -> Result<&mut BytesMut> {
        if self.depth == 0 {
            return Err(ProtocolError::InvalidState(constants::ERR_VALUE_OUTSIDE_OBJECT));
        }
        let id = self
            .pending
            .ok_or(ProtocolError::InvalidState(constants::ERR_VALUE_OUTSIDE_OBJECT))?;
        let out = &mut self.slots[self.depth - 1];
        varint::encode(out, wire_type.tag(id));
        Ok(out)
    }

    fn length_delimited(&mut self, value: &[u8]) -> Result<()> {
        let out = self.begin_value(WireType::LengthDelimited)?;
        varint::encode(out, value.len() as u64);
        out.put_slice(value);
        Ok(())
    }
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl WireWriter for BinaryWriter {
    fn unsigned_integer(&mut self, value: u64) -> Result<()> {
        let out = self.begin_value(WireType::Varint)?;
        varint::encode(out, value);
        Ok(())
    }

    fn integer(&mut self, _value: i64) -> Result<()> {
        Err(ProtocolError::Unimplemented(constants::ERR_SIGNED_VARINT))
    }

    fn boolean(&mut self, value: bool) -> Result<()> {
        self.unsigned_integer(u64::from(value))
    }

    fn string(&mut self, value: &str) -> Result<()> {
        self.length_delimited(value.as_bytes())
    }

    fn binary(&mut self, value: &[u8]) -> Result<()> {
        self.length_delimited(value)
    }

    fn enumeration(&mut self, index: u64) -> Result<()> {
        self.unsigned_integer(index)
    }

    fn start_array(&mut self, _count: usize) -> Result<()> {
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_object(&mut self, _present: usize) -> Result<()> {
        if self.depth == MAX_DEPTH {
            return Err(SchemaError::MaximumDepth(MAX_DEPTH).into());
        }
        if self.depth == 0 {
            if self.finished {
                return Err(ProtocolError::InvalidState(constants::ERR_VALUE_OUTSIDE_OBJECT));
            }
            self.slots[0].clear();
        } else {
            self.parent_keys[self.depth] = self
                .pending
                .ok_or(ProtocolError::InvalidState(constants::ERR_VALUE_OUTSIDE_OBJECT))?;
        }
        self.depth += 1;
        self.pending = None;
        Ok(())
    }

    fn key(&mut self, id: u32, _name: &'static str) -> Result<()> {
        self.pending = Some(id);
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        match self.depth {
            0 => Err(ProtocolError::InvalidState(constants::ERR_UNBALANCED_END)),
            1 => {
                self.depth = 0;
                self.pending = None;
                self.finished = true;
                Ok(())
            }
            depth => {
                let id = self.parent_keys[depth - 1];
                let (parents, rest) = self.slots.split_at_mut(depth - 1);
                let parent = &mut parents[depth - 2];
                let child = &mut rest[0];

                varint::encode(parent, WireType::LengthDelimited.tag(id));
                varint::encode(parent, child.len() as u64);
                parent.put_slice(&child[..]);
                child.clear();

                self.depth -= 1;
                // repeated objects reuse the key they were written under
                self.pending = Some(id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(writer: &mut BinaryWriter, levels: usize) -> Result<()> {
        for _ in 0..levels {
            writer.start_object(1)?;
            writer.key(1, "child")?;
        }
        Ok(())
    }

    #[test]
    fn test_scalar_tags() {
        let mut writer = BinaryWriter::new();
        writer.start_object(3).unwrap();
        writer.key(1, "a").unwrap();
        writer.unsigned_integer(150).unwrap();
        writer.key(2, "b").unwrap();
        writer.string("hi").unwrap();
        writer.key(16, "c").unwrap();
        writer.boolean(true).unwrap();
        writer.end_object().unwrap();

        let bytes = writer.take_bytes().unwrap();
        assert_eq!(
            &bytes[..],
            &[0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i', 0x80, 0x01, 0x01]
        );
    }

    #[test]
    fn test_nested_object_is_length_prefixed() {
        let mut writer = BinaryWriter::new();
        writer.start_object(1).unwrap();
        writer.key(3, "inner").unwrap();
        writer.start_object(1).unwrap();
        writer.key(1, "v").unwrap();
        writer.unsigned_integer(1).unwrap();
        writer.end_object().unwrap();
        writer.end_object().unwrap();

        assert_eq!(&writer.take_bytes().unwrap()[..], &[0x1a, 0x02, 0x08, 0x01]);
    }

    #[test]
    fn test_signed_integers_rejected() {
        let mut writer = BinaryWriter::new();
        writer.start_object(1).unwrap();
        writer.key(1, "n").unwrap();
        assert!(matches!(
            writer.integer(-1),
            Err(ProtocolError::Unimplemented(_))
        ));
    }

    #[test]
    fn test_value_outside_object() {
        let mut writer = BinaryWriter::new();
        assert!(matches!(
            writer.unsigned_integer(1),
            Err(ProtocolError::InvalidState(_))
        ));
    }

    #[test]
    fn test_incomplete_output() {
        let mut writer = BinaryWriter::new();
        assert!(writer.take_bytes().is_err());
        writer.start_object(0).unwrap();
        assert!(matches!(
            writer.take_bytes(),
            Err(ProtocolError::InvalidState(_))
        ));
        writer.end_object().unwrap();
        assert!(writer.take_bytes().unwrap().is_empty());
    }

    #[test]
    fn test_unbalanced_end() {
        let mut writer = BinaryWriter::new();
        assert!(matches!(
            writer.end_object(),
            Err(ProtocolError::InvalidState(_))
        ));
    }

    #[test]
    fn test_maximum_depth() {
        let mut writer = BinaryWriter::new();
        open(&mut writer, MAX_DEPTH).unwrap();
        assert_eq!(writer.depth(), MAX_DEPTH);
        assert!(matches!(
            writer.start_object(0),
            Err(ProtocolError::Schema(SchemaError::MaximumDepth(MAX_DEPTH)))
        ));

        for _ in 0..MAX_DEPTH {
            writer.end_object().unwrap();
        }
        assert!(!writer.take_bytes().unwrap().is_empty());
    }
}
