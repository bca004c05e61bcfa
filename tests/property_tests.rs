//! Property-based tests using proptest
//!
//! Codec, framing and mnemonic invariants over randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::Bytes;
use macer::core::frame::{packetize, report_count, Reassembler};
use macer::core::{from_bytes, to_bytes, varint};
use macer::mnemonic;
use macer::protocol::message::{Features, GetPublicKey, Identity, SignedIdentity};
use proptest::prelude::*;

// Property: any payload survives packetize + reassemble unchanged
proptest! {
    #[test]
    fn prop_frame_roundtrip(id in any::<u16>(), payload in prop::collection::vec(any::<u8>(), 0..2000)) {
        let reports = packetize(id, &payload).expect("packetize");
        prop_assert_eq!(reports.len(), report_count(payload.len()));

        let mut assembler = Reassembler::new();
        let mut message = None;
        for (index, report) in reports.iter().enumerate() {
            message = assembler.push(report).expect("push");
            prop_assert_eq!(message.is_some(), index == reports.len() - 1);
        }
        let message = message.expect("complete");
        prop_assert_eq!(message.id, id);
        prop_assert_eq!(&message.payload[..], &payload[..]);
    }
}

// Property: varints decode to the encoded value and report their own length
proptest! {
    #[test]
    fn prop_varint_roundtrip(value in any::<u64>()) {
        let mut out = Vec::new();
        varint::encode(&mut out, value);
        prop_assert_eq!(out.len(), varint::encoded_len(value));

        let mut input = Bytes::from(out);
        prop_assert_eq!(varint::decode(&mut input, 64).expect("decode"), value);
        prop_assert!(input.is_empty());
    }
}

// Property: string fields keep arbitrary UTF-8
proptest! {
    #[test]
    fn prop_identity_roundtrip(protocol in ".{0,40}", user in ".{0,40}", host in ".{0,40}") {
        let identity = Identity { protocol, user, host };
        let decoded: Identity = from_bytes(to_bytes(&identity).expect("encode")).expect("decode");
        prop_assert_eq!(decoded, identity);
    }
}

// Property: repeated u32 fields keep order and values
proptest! {
    #[test]
    fn prop_address_path_roundtrip(address_n in prop::collection::vec(any::<u32>(), 0..16)) {
        let request = GetPublicKey { address_n, ecdsa_curve_name: None, show_display: None };
        let decoded: GetPublicKey = from_bytes(to_bytes(&request).expect("encode")).expect("decode");
        prop_assert_eq!(decoded, request);
    }
}

// Property: the reader returns an error instead of panicking on garbage
proptest! {
    #[test]
    fn prop_reader_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = from_bytes::<Features>(Bytes::from(data.clone()));
        let _ = from_bytes::<SignedIdentity>(Bytes::from(data));
    }
}

// Property: the reassembler never panics on arbitrary reports
proptest! {
    #[test]
    fn prop_reassembler_never_panics(reports in prop::collection::vec(prop::array::uniform32(any::<u8>()), 1..8)) {
        let mut assembler = Reassembler::new();
        for half in reports {
            let mut report = [0u8; 64];
            report[..32].copy_from_slice(&half);
            report[32..].copy_from_slice(&half);
            if assembler.push(&report).is_err() {
                assembler.reset();
            }
        }
    }
}

// Property: mnemonics decode back to their entropy
proptest! {
    #[test]
    fn prop_mnemonic_roundtrip(
        len in prop::sample::select(vec![16usize, 24, 32]),
        seed in prop::collection::vec(any::<u8>(), 32),
    ) {
        let entropy = &seed[..len];
        let words = mnemonic::encode(entropy).expect("encode");
        prop_assert_eq!(words.split(' ').count(), len * 3 / 4);
        prop_assert_eq!(&mnemonic::decode(&words).expect("decode")[..], entropy);
    }
}
