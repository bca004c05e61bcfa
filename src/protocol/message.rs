//! Device message catalogue.
//!
//! Every request and response exchanged with the key, with its numeric id and
//! its protobuf field layout. Field numbers follow the device's published
//! message definitions; only the fields this crate reads or writes are
//! declared, anything else the device sends is skipped.

use bytes::Bytes;
use zeroize::Zeroize;

use crate::core::field::{wire_object, Decode, Encode, FixedBytes, WireReader, WireWriter};
use crate::error::Result;

/// Curve requested for identity signatures.
pub const LEGACY_CURVE: &str = "ed25519";
/// Curve requested for public keys and ECDH sessions.
pub const MODERN_CURVE: &str = "curve25519";
/// Bit set on every hardened derivation index.
pub const HARDENED: u32 = 0x8000_0000;

/// Numeric message ids carried in the report header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    Initialize = 0,
    Success = 2,
    Failure = 3,
    GetPublicKey = 11,
    PublicKey = 12,
    Features = 17,
    PinMatrixRequest = 18,
    PinMatrixAck = 19,
    ButtonRequest = 26,
    ButtonAck = 27,
    PassphraseRequest = 41,
    PassphraseAck = 42,
    SignIdentity = 53,
    SignedIdentity = 54,
    GetEcdhSessionKey = 61,
    EcdhSessionKey = 62,
}

impl MessageType {
    pub fn id(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for MessageType {
    type Error = u16;

    fn try_from(id: u16) -> std::result::Result<Self, u16> {
        Ok(match id {
            0 => Self::Initialize,
            2 => Self::Success,
            3 => Self::Failure,
            11 => Self::GetPublicKey,
            12 => Self::PublicKey,
            17 => Self::Features,
            18 => Self::PinMatrixRequest,
            19 => Self::PinMatrixAck,
            26 => Self::ButtonRequest,
            27 => Self::ButtonAck,
            41 => Self::PassphraseRequest,
            42 => Self::PassphraseAck,
            53 => Self::SignIdentity,
            54 => Self::SignedIdentity,
            61 => Self::GetEcdhSessionKey,
            62 => Self::EcdhSessionKey,
            other => return Err(other),
        })
    }
}

/// A catalogue entry: a wire object with a fixed message id.
pub trait DeviceMessage: Encode + Decode + Default {
    const TYPE: MessageType;
}

macro_rules! device_message {
    ($($ty:ident => $id:ident),* $(,)?) => {
        $(impl DeviceMessage for $ty {
            const TYPE: MessageType = MessageType::$id;
        })*
    };
}

/// Enumerations travel as their varint ordinal; values this crate doesn't
/// know are kept as `Unknown` rather than failing the whole message.
macro_rules! wire_enum {
    ($name:ident { $($value:literal => $variant:ident),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant,)*
            Unknown(u64),
        }

        impl $name {
            pub fn ordinal(self) -> u64 {
                match self {
                    $(Self::$variant => $value,)*
                    Self::Unknown(value) => value,
                }
            }

            pub fn from_ordinal(value: u64) -> Self {
                match value {
                    $($value => Self::$variant,)*
                    other => Self::Unknown(other),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::Unknown(0)
            }
        }

        impl Encode for $name {
            fn encode(&self, writer: &mut dyn WireWriter) -> Result<()> {
                writer.enumeration(self.ordinal())
            }
        }

        impl Decode for $name {
            fn decode(&mut self, reader: &mut dyn WireReader) -> Result<()> {
                *self = Self::from_ordinal(reader.enumeration()?);
                Ok(())
            }
        }
    };
}

wire_enum!(FailureType {
    1 => UnexpectedMessage,
    2 => ButtonExpected,
    3 => DataError,
    4 => ActionCancelled,
    5 => PinExpected,
    6 => PinCancelled,
    7 => PinInvalid,
    8 => InvalidSignature,
    9 => ProcessError,
    10 => NotEnoughFunds,
    11 => NotInitialized,
    12 => PinMismatch,
    13 => WipeCodeMismatch,
    14 => InvalidSession,
    99 => FirmwareError,
});

wire_enum!(ButtonRequestType {
    1 => Other,
    2 => FeeOverThreshold,
    3 => ConfirmOutput,
    4 => ResetDevice,
    5 => ConfirmWord,
    6 => WipeDevice,
    7 => ProtectCall,
    8 => SignTx,
    9 => FirmwareCheck,
    10 => Address,
    11 => PublicKey,
    12 => MnemonicWordCount,
    13 => MnemonicInput,
    14 => Deprecated,
    15 => UnknownDerivationPath,
    16 => RecoveryHomepage,
    17 => Success,
    18 => Warning,
    19 => PassphraseEntry,
    20 => PinEntry,
});

/// Who is asking for a key: `protocol://user@host`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub protocol: String,
    pub user: String,
    pub host: String,
}
wire_object!(Identity {
    1 => protocol: required,
    2 => user: required,
    3 => host: required,
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Initialize {
    pub session_id: Option<Bytes>,
}
wire_object!(Initialize {
    1 => session_id: optional,
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Success {
    pub message: Option<String>,
}
wire_object!(Success {
    1 => message: optional,
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Failure {
    pub code: Option<FailureType>,
    pub message: Option<String>,
}
wire_object!(Failure {
    1 => code: optional,
    2 => message: optional,
});

/// Subset of the device feature report logged after the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Features {
    pub vendor: Option<String>,
    pub major_version: Option<u32>,
    pub minor_version: Option<u32>,
    pub patch_version: Option<u32>,
    pub device_id: Option<String>,
    pub pin_protection: Option<bool>,
    pub passphrase_protection: Option<bool>,
    pub label: Option<String>,
    pub initialized: Option<bool>,
    pub model: Option<String>,
}
wire_object!(Features {
    1 => vendor: optional,
    2 => major_version: optional,
    3 => minor_version: optional,
    4 => patch_version: optional,
    6 => device_id: optional,
    7 => pin_protection: optional,
    8 => passphrase_protection: optional,
    10 => label: optional,
    12 => initialized: optional,
    21 => model: optional,
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinMatrixRequest {}
wire_object!(PinMatrixRequest {});

#[derive(Clone, Default, PartialEq, Eq)]
pub struct PinMatrixAck {
    pub pin: String,
}
wire_object!(PinMatrixAck {
    1 => pin: required,
});

impl Drop for PinMatrixAck {
    fn drop(&mut self) {
        self.pin.zeroize();
    }
}

impl std::fmt::Debug for PinMatrixAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinMatrixAck").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonRequest {
    pub code: Option<ButtonRequestType>,
}
wire_object!(ButtonRequest {
    1 => code: optional,
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonAck {}
wire_object!(ButtonAck {});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassphraseRequest {}
wire_object!(PassphraseRequest {});

#[derive(Clone, Default, PartialEq, Eq)]
pub struct PassphraseAck {
    pub passphrase: String,
}
wire_object!(PassphraseAck {
    1 => passphrase: required,
});

impl Drop for PassphraseAck {
    fn drop(&mut self) {
        self.passphrase.zeroize();
    }
}

impl std::fmt::Debug for PassphraseAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassphraseAck").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignIdentity {
    pub identity: Identity,
    pub challenge_hidden: String,
    pub challenge_visual: String,
    pub ecdsa_curve_name: String,
}
wire_object!(SignIdentity {
    1 => identity: required,
    2 => challenge_hidden: required,
    3 => challenge_visual: required,
    4 => ecdsa_curve_name: required,
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedIdentity {
    pub address: Option<String>,
    pub public_key: Option<Bytes>,
    /// Leading byte is filler; the ed25519 signature is the remaining 64.
    pub signature: FixedBytes<65>,
}
wire_object!(SignedIdentity {
    1 => address: optional,
    2 => public_key: optional,
    3 => signature: required,
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetPublicKey {
    pub address_n: Vec<u32>,
    pub ecdsa_curve_name: Option<String>,
    pub show_display: Option<bool>,
}
wire_object!(GetPublicKey {
    1 => address_n: optional,
    2 => ecdsa_curve_name: optional,
    3 => show_display: optional,
});

/// BIP32 node as reported by the device.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HdNode {
    pub depth: u32,
    pub fingerprint: u32,
    pub child_num: u32,
    pub chain_code: Bytes,
    pub private_key: Option<Bytes>,
    pub public_key: Bytes,
}
wire_object!(HdNode {
    1 => depth: required,
    2 => fingerprint: required,
    3 => child_num: required,
    4 => chain_code: required,
    5 => private_key: optional,
    6 => public_key: required,
});

impl std::fmt::Debug for HdNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HdNode")
            .field("depth", &self.depth)
            .field("fingerprint", &self.fingerprint)
            .field("child_num", &self.child_num)
            .field("public_key_len", &self.public_key.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicKey {
    pub node: HdNode,
    pub xpub: Option<String>,
}
wire_object!(PublicKey {
    1 => node: required,
    2 => xpub: optional,
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetEcdhSessionKey {
    pub identity: Identity,
    /// First byte is replaced with `0x40` before sending.
    pub peer_public_key: FixedBytes<33>,
    pub ecdsa_curve_name: String,
}
wire_object!(GetEcdhSessionKey {
    1 => identity: required,
    2 => peer_public_key: required,
    3 => ecdsa_curve_name: optional,
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EcdhSessionKey {
    /// One prefix byte followed by the 32-byte shared secret.
    pub session_key: FixedBytes<33>,
    pub public_key: Option<Bytes>,
}
wire_object!(EcdhSessionKey {
    1 => session_key: required,
    2 => public_key: optional,
});

device_message! {
    Initialize => Initialize,
    Success => Success,
    Failure => Failure,
    GetPublicKey => GetPublicKey,
    PublicKey => PublicKey,
    Features => Features,
    PinMatrixRequest => PinMatrixRequest,
    PinMatrixAck => PinMatrixAck,
    ButtonRequest => ButtonRequest,
    ButtonAck => ButtonAck,
    PassphraseRequest => PassphraseRequest,
    PassphraseAck => PassphraseAck,
    SignIdentity => SignIdentity,
    SignedIdentity => SignedIdentity,
    GetEcdhSessionKey => GetEcdhSessionKey,
    EcdhSessionKey => EcdhSessionKey,
}

/// Hardened derivation path for the modern key exchange.
///
/// The digest of the peer URI is split into four big-endian words, each
/// prefixed by the fixed purpose index 17.
pub fn peer_key_path(digest: &[u8; 32]) -> Vec<u32> {
    let mut path = Vec::with_capacity(5);
    path.push(HARDENED | 17);
    path.extend(
        digest
            .chunks_exact(4)
            .take(4)
            .map(|word| HARDENED | u32::from_be_bytes([word[0], word[1], word[2], word[3]])),
    );
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids() {
        for id in 0u16..=100 {
            if let Ok(kind) = MessageType::try_from(id) {
                assert_eq!(kind.id(), id);
            }
        }
        assert_eq!(MessageType::try_from(1), Err(1));
        assert_eq!(SignIdentity::TYPE.id(), 53);
        assert_eq!(EcdhSessionKey::TYPE.id(), 62);
    }

    #[test]
    fn test_enum_fallback() {
        assert_eq!(FailureType::from_ordinal(4), FailureType::ActionCancelled);
        assert_eq!(FailureType::from_ordinal(500), FailureType::Unknown(500));
        assert_eq!(ButtonRequestType::PinEntry.ordinal(), 20);
    }

    #[test]
    fn test_peer_key_path() {
        let mut digest = [0u8; 32];
        digest[..4].copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        digest[12..16].copy_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        let path = peer_key_path(&digest);
        assert_eq!(
            path,
            vec![0x8000_0011, 0x8102_0304, HARDENED, HARDENED, 0xffff_ffff]
        );
    }

    #[test]
    fn test_sign_identity_writes_empty_fields() {
        use crate::core::{from_bytes, to_bytes};
        use crate::error::{ProtocolError, SchemaError};

        let request = SignIdentity {
            identity: Identity {
                protocol: "macer".into(),
                user: "root".into(),
                host: "vault".into(),
            },
            challenge_hidden: "macer_luks_drive".into(),
            challenge_visual: String::new(),
            ecdsa_curve_name: LEGACY_CURVE.into(),
        };
        let encoded = to_bytes(&request).unwrap();

        let mut tail = vec![0x1a, 0x00, 0x22, LEGACY_CURVE.len() as u8];
        tail.extend_from_slice(LEGACY_CURVE.as_bytes());
        assert!(encoded.ends_with(&tail));

        let decoded: SignIdentity = from_bytes(encoded.clone()).unwrap();
        assert_eq!(decoded.challenge_visual, "");

        let without_visual = encoded.slice(..encoded.len() - tail.len());
        assert!(matches!(
            from_bytes::<SignIdentity>(without_visual),
            Err(ProtocolError::Schema(SchemaError::MissingField("challenge_visual")))
        ));
    }
}
