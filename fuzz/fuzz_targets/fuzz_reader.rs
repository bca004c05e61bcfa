#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use macer::core::from_bytes;
use macer::protocol::message::{EcdhSessionKey, Features, PublicKey, SignedIdentity};

fuzz_target!(|data: &[u8]| {
    // Device replies are untrusted: decoding must fail cleanly, never panic
    let _ = from_bytes::<Features>(Bytes::copy_from_slice(data));
    let _ = from_bytes::<PublicKey>(Bytes::copy_from_slice(data));
    let _ = from_bytes::<SignedIdentity>(Bytes::copy_from_slice(data));
    let _ = from_bytes::<EcdhSessionKey>(Bytes::copy_from_slice(data));
});
