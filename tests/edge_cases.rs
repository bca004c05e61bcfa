#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Boundary conditions of the codec, the report framing and the mnemonic encoder.

use bytes::Bytes;
use macer::core::field::{read_object, write_object, Decode, Encode, Field, WireReader, WireWriter};
use macer::core::frame::{packetize, report_count, Reassembler, Report, REPORT_SIZE};
use macer::core::{from_bytes, to_bytes, varint, MAX_DEPTH};
use macer::error::{ProtocolError, Result, SchemaError};
use macer::mnemonic;
use macer::protocol::message::{Identity, SignedIdentity};

// ============================================================================
// NESTING
// ============================================================================

/// Self-similar object used to build deep chains.
#[derive(Debug, Default, PartialEq)]
struct Nest {
    level: u32,
    child: Option<Box<Nest>>,
}

impl Encode for Nest {
    fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
        write_object(
            writer,
            &[
                Field::required(1, "level", &self.level as &dyn Encode),
                Field::optional(2, "child", &self.child as &dyn Encode),
            ],
        )
    }
}

impl Decode for Nest {
    fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
        read_object(
            reader,
            &mut [
                Field::required(1, "level", &mut self.level as &mut dyn Decode),
                Field::optional(2, "child", &mut self.child as &mut dyn Decode),
            ],
        )
    }
}

/// A chain of `objects` nested objects, root included.
fn chain(objects: usize) -> Nest {
    let mut node = Nest {
        level: objects as u32,
        child: None,
    };
    for level in (1..objects).rev() {
        node = Nest {
            level: level as u32,
            child: Some(Box::new(node)),
        };
    }
    node
}

/// Raw bytes for `objects` nested empty objects under key 2.
fn raw_chain(objects: usize) -> Bytes {
    let mut body: Vec<u8> = Vec::new();
    for _ in 1..objects {
        let mut outer = vec![0x12];
        varint::encode(&mut outer, body.len() as u64);
        outer.extend_from_slice(&body);
        body = outer;
    }
    Bytes::from(body)
}

#[test]
fn test_depth_limit_on_write() {
    let encoded = to_bytes(&chain(MAX_DEPTH)).expect("depth 100 encodes");
    let decoded: Nest = from_bytes(encoded).expect("depth 100 decodes");
    assert_eq!(decoded, chain(MAX_DEPTH));

    match to_bytes(&chain(MAX_DEPTH + 1)) {
        Err(ProtocolError::Schema(SchemaError::MaximumDepth(limit))) => {
            assert_eq!(limit, MAX_DEPTH)
        }
        other => panic!("expected depth error, got {other:?}"),
    }
}

#[test]
fn test_depth_limit_on_read() {
    #[derive(Default)]
    struct Skipper;
    impl Decode for Skipper {
        fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
            read_object(
                reader,
                &mut [Field::optional(2, "child", self as &mut dyn Decode)],
            )
        }
    }

    assert!(from_bytes::<Skipper>(raw_chain(MAX_DEPTH)).is_ok());
    assert!(matches!(
        from_bytes::<Skipper>(raw_chain(MAX_DEPTH + 1)),
        Err(ProtocolError::Schema(SchemaError::MaximumDepth(100)))
    ));
}

// ============================================================================
// VARINTS
// ============================================================================

#[test]
fn test_varint_boundaries() {
    for (value, len) in [
        (0u64, 1),
        (127, 1),
        (128, 2),
        (16_383, 2),
        (16_384, 3),
        (u64::from(u32::MAX), 5),
        (u64::MAX, 10),
    ] {
        let mut out = Vec::new();
        varint::encode(&mut out, value);
        assert_eq!(out.len(), len, "value {value}");
        assert_eq!(varint::encoded_len(value), len);

        let mut input = Bytes::from(out);
        assert_eq!(varint::decode(&mut input, 64).unwrap(), value);
        assert!(input.is_empty());
    }
}

#[test]
fn test_varint_zero_group_rejected() {
    let mut input = Bytes::from_static(&[0x80, 0x00]);
    assert!(matches!(
        varint::decode(&mut input, 64),
        Err(ProtocolError::InvalidEncoding(_))
    ));
    assert_eq!(input.len(), 2, "input left untouched on failure");
}

#[test]
fn test_varint_width_enforced() {
    let mut out = Vec::new();
    varint::encode(&mut out, u64::from(u32::MAX) + 1);
    assert!(varint::decode(&mut Bytes::from(out), 32).is_err());
}

// ============================================================================
// SCHEMA
// ============================================================================

#[test]
fn test_missing_required_field() {
    // identity with only the protocol set
    let bytes = Bytes::from_static(&[0x0a, 0x01, b'm']);
    match from_bytes::<Identity>(bytes) {
        Err(ProtocolError::Schema(SchemaError::MissingField(name))) => assert_eq!(name, "user"),
        other => panic!("expected missing field, got {other:?}"),
    }
}

#[test]
fn test_wrong_signature_length() {
    let mut bytes = vec![0x1a, 64];
    bytes.extend_from_slice(&[1u8; 64]);
    assert!(matches!(
        from_bytes::<SignedIdentity>(Bytes::from(bytes)),
        Err(ProtocolError::Schema(SchemaError::FixedBinary {
            expected: 65,
            actual: 64
        }))
    ));
}

#[test]
fn test_wire_type_mismatch() {
    // field 1 of Identity sent as a varint
    let bytes = Bytes::from_static(&[0x08, 0x01]);
    assert!(matches!(
        from_bytes::<Identity>(bytes),
        Err(ProtocolError::Schema(SchemaError::UnexpectedWireType { .. }))
    ));
}

#[test]
fn test_group_wire_type_rejected() {
    let bytes = Bytes::from_static(&[0x0b]);
    assert!(matches!(
        from_bytes::<Identity>(bytes),
        Err(ProtocolError::InvalidEncoding(_))
    ));
}

#[test]
fn test_truncated_string() {
    let bytes = Bytes::from_static(&[0x0a, 0x05, b'a', b'b']);
    assert!(from_bytes::<Identity>(bytes).is_err());
}

// ============================================================================
// FRAMING
// ============================================================================

#[test]
fn test_single_report_boundary() {
    for (len, expected) in [(0, 1), (1, 1), (54, 1), (55, 1), (56, 2), (118, 2), (119, 3)] {
        let payload = vec![0x33u8; len];
        let reports = packetize(9, &payload).unwrap();
        assert_eq!(reports.len(), expected);
        assert_eq!(report_count(len), expected);
        assert!(reports.iter().all(|report| report.len() == REPORT_SIZE));
    }
}

#[test]
fn test_bad_magic_yields_no_message() {
    let mut report: Report = [0u8; REPORT_SIZE];
    report[..3].copy_from_slice(b"!##");
    let mut assembler = Reassembler::new();
    assert!(matches!(
        assembler.push(&report),
        Err(ProtocolError::InvalidEncoding(_))
    ));
    assert!(!assembler.in_progress());
}

#[test]
fn test_huge_declared_length_waits_for_more() {
    let mut report: Report = [0u8; REPORT_SIZE];
    report[..3].copy_from_slice(b"?##");
    report[5..9].copy_from_slice(&u32::MAX.to_be_bytes());

    let mut assembler = Reassembler::new();
    assert_eq!(assembler.push(&report).unwrap(), None);
    assert!(assembler.in_progress());

    let mut continuation: Report = [0u8; REPORT_SIZE];
    continuation[0] = b'?';
    for _ in 0..10 {
        assert_eq!(assembler.push(&continuation).unwrap(), None);
    }
    assembler.reset();
    assert!(!assembler.in_progress());
}

// ============================================================================
// MNEMONIC
// ============================================================================

#[test]
fn test_mnemonic_rejects_other_lengths() {
    for len in [0usize, 8, 20, 48, 64] {
        assert!(matches!(
            mnemonic::encode(&vec![1u8; len]),
            Err(ProtocolError::EntropyLength(found)) if found == len
        ));
    }
}

#[test]
fn test_mnemonic_all_zero_vector() {
    let words = mnemonic::encode(&[0u8; 16]).unwrap();
    let expected = format!("{} about", vec!["abandon"; 11].join(" "));
    assert_eq!(words.as_str(), expected);
}
