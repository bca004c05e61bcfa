//! # Field Model
//!
//! Maps typed Rust values onto a key/value wire schema without building an
//! intermediate tree.
//!
//! A schema is a list of [`Field`] descriptors, each binding a numeric id, a
//! name and a required flag to a borrowed value. [`write_object`] and
//! [`read_object`] walk that list in declaration order against any codec that
//! implements [`WireWriter`] / [`WireReader`]. Values plug in through the
//! [`Encode`] and [`Decode`] capabilities; message types usually get both from
//! the `wire_object!` declaration.
//!
//! ## Reading
//! Unknown keys are skipped by the codec, so newer peers can add fields. Optional
//! fields keep their default when absent; a required field that never appears
//! is reported as [`SchemaError::MissingField`].
//!
//! ## Arrays
//! Arrays follow the repeated-field convention: every element is written as its
//! own occurrence of the same key. When reading, a length-delimited occurrence
//! for a packable scalar element is read as a packed run.

use bytes::Bytes;
use zeroize::Zeroize;

use crate::error::{constants, ProtocolError, Result, SchemaError};

/// Output side of a wire format.
///
/// Calls arrive in schema order: `start_object`, then `key` followed by exactly
/// one value (or array) per present field, then `end_object`.
pub trait WireWriter {
    fn unsigned_integer(&mut self, value: u64) -> Result<()>;
    fn integer(&mut self, value: i64) -> Result<()>;
    fn boolean(&mut self, value: bool) -> Result<()>;
    fn string(&mut self, value: &str) -> Result<()>;
    fn binary(&mut self, value: &[u8]) -> Result<()>;
    fn enumeration(&mut self, index: u64) -> Result<()>;

    fn start_array(&mut self, count: usize) -> Result<()>;
    fn end_array(&mut self) -> Result<()>;

    /// `present` is the number of fields that will be written.
    fn start_object(&mut self, present: usize) -> Result<()>;
    fn key(&mut self, id: u32, name: &'static str) -> Result<()>;
    fn end_object(&mut self) -> Result<()>;
}

/// Input side of a wire format.
pub trait WireReader {
    fn unsigned_integer(&mut self) -> Result<u64>;
    fn integer(&mut self) -> Result<i64>;
    fn boolean(&mut self) -> Result<bool>;
    fn string(&mut self) -> Result<String>;
    /// Borrowed view into the reader's input.
    fn binary(&mut self) -> Result<Bytes>;
    /// Fixed-size blob; the encoded length must equal `dest.len()`.
    fn binary_into(&mut self, dest: &mut [u8]) -> Result<()>;
    fn enumeration(&mut self) -> Result<u64>;

    fn start_array(&mut self) -> Result<()>;
    fn is_array_end(&mut self) -> Result<bool>;
    fn end_array(&mut self) -> Result<()>;

    /// True when the pending value is a packed run of scalars.
    fn is_packed(&self) -> bool;

    fn start_object(&mut self) -> Result<()>;
    /// Advance to the next key whose id is in `ids` and return its index.
    /// `None` means the current object has no more keys.
    fn key(&mut self, ids: &[u32]) -> Result<Option<usize>>;
    fn end_object(&mut self) -> Result<()>;

    /// Fails if input remains or a container is still open.
    fn check_complete(&self) -> Result<()>;
}

/// Values that can be written through a [`WireWriter`].
pub trait Encode {
    fn encode(&self, writer: &mut dyn WireWriter) -> Result<()>;

    /// Optional fields are skipped when this returns false.
    fn is_present(&self) -> bool {
        true
    }
}

/// Values that can be filled in from a [`WireReader`].
///
/// Decoding writes into existing (default) storage so that repeated keys can
/// append and nested objects can be read in place.
pub trait Decode {
    fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()>;

    /// Scalars that may arrive as a packed run.
    fn packable() -> bool
    where
        Self: Sized,
    {
        false
    }
}

/// Binds a schema id and name to a borrowed value for one encode/decode call.
#[derive(Debug, Clone, Copy)]
pub struct Field<V> {
    pub id: u32,
    pub name: &'static str,
    pub required: bool,
    pub value: V,
}

impl<V> Field<V> {
    pub const fn required(id: u32, name: &'static str, value: V) -> Self {
        Self {
            id,
            name,
            required: true,
            value,
        }
    }

    pub const fn optional(id: u32, name: &'static str, value: V) -> Self {
        Self {
            id,
            name,
            required: false,
            value,
        }
    }
}

/// Write `fields` as one object.
pub fn write_object(writer: &mut dyn WireWriter, fields: &[Field<&dyn Encode>]) -> Result<()> {
    let present = fields
        .iter()
        .filter(|field| field.required || field.value.is_present())
        .count();

    writer.start_object(present)?;
    for field in fields {
        if !field.required && !field.value.is_present() {
            continue;
        }
        writer.key(field.id, field.name)?;
        field.value.encode(writer)?;
    }
    writer.end_object()
}

/// Read one object into `fields`.
pub fn read_object(reader: &mut dyn WireReader, fields: &mut [Field<&mut dyn Decode>]) -> Result<()> {
    let ids: Vec<u32> = fields.iter().map(|field| field.id).collect();
    let mut seen = vec![false; fields.len()];

    reader.start_object()?;
    while let Some(index) = reader.key(&ids)? {
        fields[index].value.decode(reader)?;
        seen[index] = true;
    }
    reader.end_object()?;

    match fields.iter().zip(&seen).find(|(field, seen)| field.required && !**seen) {
        Some((field, _)) => Err(SchemaError::MissingField(field.name).into()),
        None => Ok(()),
    }
}

/// Write every element of `items` under the pending key.
pub fn write_array<T: Encode>(writer: &mut dyn WireWriter, items: &[T]) -> Result<()> {
    writer.start_array(items.len())?;
    for item in items {
        item.encode(writer)?;
    }
    writer.end_array()
}

/// Read one occurrence of a repeated key, appending to `items`.
pub fn read_array<T: Decode + Default>(reader: &mut dyn WireReader, items: &mut Vec<T>) -> Result<()> {
    if T::packable() && reader.is_packed() {
        reader.start_array()?;
        while !reader.is_array_end()? {
            let mut item = T::default();
            item.decode(reader)?;
            items.push(item);
        }
        return reader.end_array();
    }

    let mut item = T::default();
    item.decode(reader)?;
    items.push(item);
    Ok(())
}

/// Declares the wire schema of a struct and derives [`Encode`] and [`Decode`].
///
/// ```ignore
/// wire_object!(Identity {
///     1 => protocol: required,
///     2 => user: required,
///     3 => host: required,
/// });
/// ```
macro_rules! wire_object {
    ($ty:ty { $($id:literal => $name:ident : $kind:ident),* $(,)? }) => {
        impl $crate::core::field::Encode for $ty {
            fn encode(
                &self,
                writer: &mut dyn $crate::core::field::WireWriter,
            ) -> $crate::error::Result<()> {
                $crate::core::field::write_object(
                    writer,
                    &[$($crate::core::field::Field::$kind(
                        $id,
                        stringify!($name),
                        &self.$name as &dyn $crate::core::field::Encode,
                    )),*],
                )
            }
        }

        impl $crate::core::field::Decode for $ty {
            fn decode(
                &mut self,
                reader: &mut dyn $crate::core::field::WireReader,
            ) -> $crate::error::Result<()> {
                $crate::core::field::read_object(
                    reader,
                    &mut [$($crate::core::field::Field::$kind(
                        $id,
                        stringify!($name),
                        &mut self.$name as &mut dyn $crate::core::field::Decode,
                    )),*],
                )
            }
        }
    };
}
pub(crate) use wire_object;

/// Fixed-length binary blob, zero-filled by default and wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct FixedBytes<const N: usize>(pub [u8; N]);

impl<const N: usize> FixedBytes<N> {
    pub const LEN: usize = N;

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> Default for FixedBytes<N> {
    fn default() -> Self {
        Self([0u8; N])
    }
}

impl<const N: usize> std::fmt::Debug for FixedBytes<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FixedBytes<{N}>(..)")
    }
}

impl<const N: usize> Drop for FixedBytes<N> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<const N: usize> Encode for FixedBytes<N> {
    fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
        writer.binary(&self.0)
    }
}

impl<const N: usize> Decode for FixedBytes<N> {
    fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
        reader.binary_into(&mut self.0)
    }
}

impl Encode for u64 {
    fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
        writer.unsigned_integer(*self)
    }
}

impl Decode for u64 {
    fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
        *self = reader.unsigned_integer()?;
        Ok(())
    }

    fn packable() -> bool {
        true
    }
}

impl Encode for u32 {
    fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
        writer.unsigned_integer(u64::from(*self))
    }
}

impl Decode for u32 {
    fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
        let value = reader.unsigned_integer()?;
        *self = u32::try_from(value).map_err(|_| SchemaError::SmallerInteger {
            value,
            max: u64::from(u32::MAX),
        })?;
        Ok(())
    }

    fn packable() -> bool {
        true
    }
}

impl Encode for i64 {
    fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
        writer.integer(*self)
    }
}

impl Decode for i64 {
    fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
        *self = reader.integer()?;
        Ok(())
    }
}

impl Encode for i32 {
    fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
        writer.integer(i64::from(*self))
    }
}

impl Decode for i32 {
    fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
        let value = reader.integer()?;
        *self = match i32::try_from(value) {
            Ok(value) => value,
            Err(_) if value < 0 => {
                return Err(SchemaError::LargerInteger {
                    value,
                    min: i64::from(i32::MIN),
                }
                .into())
            }
            Err(_) => {
                return Err(SchemaError::SmallerInteger {
                    value: value as u64,
                    max: i32::MAX as u64,
                }
                .into())
            }
        };
        Ok(())
    }
}

impl Encode for bool {
    fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
        writer.boolean(*self)
    }
}

impl Decode for bool {
    fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
        *self = reader.boolean()?;
        Ok(())
    }

    fn packable() -> bool {
        true
    }
}

impl Encode for String {
    fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
        writer.string(self)
    }

    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Decode for String {
    fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
        *self = reader.string()?;
        Ok(())
    }
}

impl Encode for Bytes {
    fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
        writer.binary(self)
    }

    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Decode for Bytes {
    fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
        *self = reader.binary()?;
        Ok(())
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
        match self {
            Some(value) => value.encode(writer),
            None => Err(ProtocolError::InvalidState(constants::ERR_REQUIRED_UNSET)),
        }
    }

    fn is_present(&self) -> bool {
        self.is_some()
    }
}

impl<T: Decode + Default> Decode for Option<T> {
    fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
        let mut value = T::default();
        value.decode(reader)?;
        *self = Some(value);
        Ok(())
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
        write_array(writer, self)
    }

    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<T: Decode + Default> Decode for Vec<T> {
    fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
        read_array(reader, self)
    }
}

impl<T: Encode> Encode for Box<T> {
    fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
        (**self).encode(writer)
    }

    fn is_present(&self) -> bool {
        (**self).is_present()
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
        (**self).decode(reader)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::core::{from_bytes, to_bytes};

    #[derive(Debug, Default, PartialEq)]
    struct Inner {
        label: String,
        count: Option<u32>,
    }
    wire_object!(Inner {
        1 => label: required,
        2 => count: optional,
    });

    #[derive(Debug, Default, PartialEq)]
    struct Outer {
        inner: Inner,
        path: Vec<u32>,
        blob: FixedBytes<4>,
        note: String,
    }
    wire_object!(Outer {
        1 => inner: required,
        2 => path: optional,
        3 => blob: required,
        4 => note: optional,
    });

    #[test]
    fn test_optional_fields_are_skipped() {
        let value = Inner {
            label: "a".to_string(),
            count: None,
        };
        // tag(1, bytes) len 1 'a'
        assert_eq!(&to_bytes(&value).unwrap()[..], &[0x0a, 0x01, b'a']);
    }

    #[test]
    fn test_required_empty_string_is_written() {
        let value = Inner::default();
        assert_eq!(&to_bytes(&value).unwrap()[..], &[0x0a, 0x00]);
    }

    #[test]
    fn test_nested_roundtrip() {
        let value = Outer {
            inner: Inner {
                label: "node".to_string(),
                count: Some(300),
            },
            path: vec![1, 0x8000_0011, u32::MAX],
            blob: FixedBytes([1, 2, 3, 4]),
            note: String::new(),
        };
        let bytes = to_bytes(&value).unwrap();
        let decoded: Outer = from_bytes(bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_missing_required_field_on_read() {
        // only field 1 present, `blob` (3) is required
        let mut encoded = to_bytes(&Inner::default()).unwrap().to_vec();
        encoded.splice(0..0, [0x0a, encoded.len() as u8]);
        let result: Result<Outer> = from_bytes(Bytes::from(encoded));
        assert!(matches!(
            result,
            Err(ProtocolError::Schema(SchemaError::MissingField("blob")))
        ));
    }

    #[test]
    fn test_required_option_without_value() {
        struct Broken {
            value: Option<u32>,
        }
        impl Encode for Broken {
            fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
                write_object(writer, &[Field::required(1, "value", &self.value as &dyn Encode)])
            }
        }

        let result = to_bytes(&Broken { value: None });
        assert!(matches!(result, Err(ProtocolError::InvalidState(_))));
    }

    #[test]
    fn test_packed_repeated_field() {
        // field 2 as a packed run: tag(2, bytes) len 3 [1, 2, 3]
        let mut bytes = to_bytes(&Outer::default()).unwrap().to_vec();
        bytes.extend_from_slice(&[0x12, 0x03, 0x01, 0x02, 0x03]);
        let decoded: Outer = from_bytes(Bytes::from(bytes)).unwrap();
        assert_eq!(decoded.path, vec![1, 2, 3]);
    }
}
