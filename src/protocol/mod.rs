//! # Device Protocol
//!
//! Message catalogue and the session state machine that drives a derivation.
//!
//! ## Components
//! - **Message**: numeric ids and field layouts for every request and response
//! - **Engine**: handshake, derivation request and the interactive response loop
//!
//! ## Flow
//! ```text
//! Initialize -> (any reply, logged)
//! legacy: SignIdentity     -> [Button|Pin|Passphrase]* -> SignedIdentity
//! modern: GetPublicKey     -> [..]* -> PublicKey
//!         GetEcdhSessionKey -> [..]* -> EcdhSessionKey
//! ```

pub mod engine;
pub mod message;

pub use engine::{DerivationMode, DerivedSecret, DeviceSession, HostInfo, SessionState};
pub use message::{DeviceMessage, MessageType};
