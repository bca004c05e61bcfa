//! # macer
//!
//! Derives disk-encryption passphrases from a USB hardware security key.
//!
//! The key never reveals a private key: it either signs a fixed identity
//! challenge (legacy mode) or performs curve25519 ECDH against a public key
//! derived from a hashed path (modern mode). The result is stable for a given
//! user and host, so it can be fed to `cryptsetup` as a passphrase, and may be
//! written down as a BIP39 mnemonic for recovery.
//!
//! ## Layout
//! - [`core`]: field model, protobuf wire codec and 64-byte report framing
//! - [`protocol`]: message catalogue and the device session state machine
//! - [`transport`]: report links (hidraw stream, in-memory device)
//! - [`mnemonic`]: BIP39 encoding and decoding of derived secrets
//! - [`config`]: TOML and environment configuration
//! - [`utils`]: hashing, prompts, logging, timeouts and metrics
//!
//! ## Example
//! ```rust,no_run
//! use macer::config::MacerConfig;
//! use macer::protocol::DeviceSession;
//! use macer::transport::{MessageChannel, StreamTransport};
//! use macer::utils::TerminalPrompt;
//!
//! # async fn run() -> macer::error::Result<()> {
//! let config = MacerConfig::from_file("macer.toml")?;
//! let transport = StreamTransport::open(&config.device.path, config.device.report_id).await?;
//! let channel = MessageChannel::new(transport)
//!     .with_timeouts(config.device.write_timeout, config.device.read_timeout());
//!
//! let mut session = DeviceSession::new(channel, TerminalPrompt, config.identity.host_info());
//! let secret = session.run(config.device.mode()).await?;
//! # drop(secret);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod mnemonic;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use config::MacerConfig;
pub use error::{ProtocolError, Result};
pub use protocol::{DerivationMode, DerivedSecret, DeviceSession, HostInfo};
