//! Device session state machine.
//!
//! A session runs one key derivation against an attached device:
//!
//! 1. **Handshake**: `Initialize` is sent and exactly one reply is read and
//!    discarded. A feature report or a failure is logged, never acted on.
//! 2. **Request**: legacy mode asks for an identity signature; modern mode first
//!    asks for the public key of a hashed derivation path, then for an ECDH
//!    session key with that peer.
//! 3. **Response loop**: button, PIN and passphrase requests are answered and the
//!    loop continues until a terminal payload for the current state arrives.
//!
//! Per-session state lives in [`DeviceSession`]; nothing is global. The first
//! error ends the session and is returned unchanged.

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::core::field::FixedBytes;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{
    peer_key_path, ButtonAck, ButtonRequest, EcdhSessionKey, Failure, Features,
    GetEcdhSessionKey, GetPublicKey, Identity, Initialize, MessageType, PassphraseAck,
    PassphraseRequest, PinMatrixAck, PinMatrixRequest, PublicKey, SignIdentity, SignedIdentity,
    Success, LEGACY_CURVE, MODERN_CURVE,
};
use crate::transport::channel::{decode_payload, MessageChannel};
use crate::transport::Transport;
use crate::utils::hash::hash256;
use crate::utils::prompt::Prompt;

/// Identity protocol name and derivation namespace.
pub const APP_NAME: &str = "macer";

pub const BUTTON_NOTICE: &str = "Check device";
pub const PIN_PROMPT: &str = "Device PIN";
pub const PASSPHRASE_PROMPT: &str = "Device passphrase";
/// Keypad layout shown before a PIN prompt; digits map to the scrambled
/// positions on the device screen.
pub const PIN_KEYPAD: [&str; 3] = ["  7 8 9", "  4 5 6", "  1 2 3"];

/// Prefix the device expects on a curve25519 peer key.
const PEER_KEY_PREFIX: u8 = 0x40;

/// Which derivation scheme to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationMode {
    /// ed25519 identity signature, 64-byte secret
    Legacy,
    /// curve25519 ECDH against a hashed path, 32-byte secret
    Modern,
}

impl DerivationMode {
    pub fn from_legacy_flag(legacy: bool) -> Self {
        if legacy {
            Self::Legacy
        } else {
            Self::Modern
        }
    }

    /// Length of the secret this mode produces.
    pub fn secret_len(self) -> usize {
        match self {
            Self::Legacy => 64,
            Self::Modern => 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshake,
    AwaitingPeerKey,
    AwaitingSecret,
    Done,
}

/// Identity the secret is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub app: String,
    pub user: String,
    pub host: String,
    /// Text shown on the device while signing (legacy mode).
    pub message: String,
}

impl HostInfo {
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            app: APP_NAME.to_string(),
            user: user.into(),
            host: host.into(),
            message: String::new(),
        }
    }

    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = app.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    fn identity(&self) -> Identity {
        Identity {
            protocol: self.app.clone(),
            user: self.user.clone(),
            host: self.host.clone(),
        }
    }

    /// Hidden challenge for identity signatures.
    pub fn challenge(&self) -> String {
        format!("{}_luks_drive", self.app)
    }

    /// URI hashed into the modern derivation path.
    pub fn peer_uri(&self) -> String {
        format!("{}_peerkey://{}@{}", self.app, self.user, self.host)
    }
}

/// Secret bytes returned by the device, wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedSecret(Zeroizing<Vec<u8>>);

impl DerivedSecret {
    /// Lengths accepted by [`DerivedSecret::truncate`].
    pub const LENGTHS: [usize; 4] = [16, 24, 32, 64];

    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep the first `len` bytes; `len` must be one of [`Self::LENGTHS`].
    pub fn truncate(mut self, len: usize) -> Result<Self> {
        if !Self::LENGTHS.contains(&len) || len > self.0.len() {
            return Err(ProtocolError::InvalidArgument(format!(
                "{}: {} of {} bytes",
                constants::ERR_SECRET_LENGTH,
                len,
                self.0.len()
            )));
        }
        self.0.truncate(len);
        Ok(self)
    }
}

impl std::fmt::Debug for DerivedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DerivedSecret({} bytes)", self.0.len())
    }
}

/// Outcome of handling one device message.
enum Step {
    Continue,
    PeerKey(Bytes),
    Secret(DerivedSecret),
}

/// One derivation run against a device.
pub struct DeviceSession<T, P> {
    channel: MessageChannel<T>,
    prompt: P,
    info: HostInfo,
    state: SessionState,
}

impl<T: Transport, P: Prompt> DeviceSession<T, P> {
    pub fn new(channel: MessageChannel<T>, prompt: P, info: HostInfo) -> Self {
        Self {
            channel,
            prompt,
            info,
            state: SessionState::Handshake,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn channel(&self) -> &MessageChannel<T> {
        &self.channel
    }

    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    pub fn into_parts(self) -> (MessageChannel<T>, P) {
        (self.channel, self.prompt)
    }

    /// Run the whole exchange and return the device secret.
    #[instrument(skip(self), fields(user = %self.info.user, host = %self.info.host))]
    pub async fn run(&mut self, mode: DerivationMode) -> Result<DerivedSecret> {
        if self.state != SessionState::Handshake {
            return Err(ProtocolError::InvalidState(constants::ERR_SESSION_FINISHED));
        }

        let result = self.exchange(mode).await;
        self.channel.metrics().log_metrics();
        self.state = SessionState::Done;
        result
    }

    async fn exchange(&mut self, mode: DerivationMode) -> Result<DerivedSecret> {
        self.handshake().await?;

        let secret = match mode {
            DerivationMode::Legacy => {
                let request = SignIdentity {
                    identity: self.info.identity(),
                    challenge_hidden: self.info.challenge(),
                    challenge_visual: self.info.message.clone(),
                    ecdsa_curve_name: LEGACY_CURVE.to_string(),
                };
                self.channel.send(&request).await?;
                self.state = SessionState::AwaitingSecret;
                self.await_secret().await?
            }
            DerivationMode::Modern => {
                let digest = hash256(self.info.peer_uri().as_bytes());
                let request = GetPublicKey {
                    address_n: peer_key_path(&digest),
                    ecdsa_curve_name: Some(MODERN_CURVE.to_string()),
                    show_display: None,
                };
                self.channel.send(&request).await?;
                self.state = SessionState::AwaitingPeerKey;
                let peer = self.await_peer_key().await?;

                let mut peer_public_key = FixedBytes::<33>::default();
                let len = peer.len().min(FixedBytes::<33>::LEN);
                peer_public_key.0[..len].copy_from_slice(&peer[..len]);
                peer_public_key.0[0] = PEER_KEY_PREFIX;

                let request = GetEcdhSessionKey {
                    identity: self.info.identity(),
                    peer_public_key,
                    ecdsa_curve_name: MODERN_CURVE.to_string(),
                };
                self.channel.send(&request).await?;
                self.state = SessionState::AwaitingSecret;
                self.await_secret().await?
            }
        };

        info!(len = secret.len(), "Device secret derived");
        Ok(secret)
    }

    /// Send `Initialize` and discard the reply.
    async fn handshake(&mut self) -> Result<()> {
        self.state = SessionState::Handshake;
        let reply = self.channel.request(&Initialize::default()).await?;

        match MessageType::try_from(reply.id) {
            Ok(MessageType::Features) => match decode_payload::<Features>(reply.payload) {
                Ok(features) => {
                    let version = format!(
                        "{}.{}.{}",
                        features.major_version.unwrap_or(0),
                        features.minor_version.unwrap_or(0),
                        features.patch_version.unwrap_or(0)
                    );
                    info!(
                        vendor = features.vendor.as_deref().unwrap_or("unknown"),
                        model = features.model.as_deref().unwrap_or("unknown"),
                        %version,
                        initialized = features.initialized.unwrap_or(false),
                        "Device connected"
                    );
                }
                Err(err) => warn!(error = %err, "Unreadable feature report"),
            },
            Ok(MessageType::Failure) => {
                let text = decode_payload::<Failure>(reply.payload)
                    .ok()
                    .and_then(|failure| failure.message)
                    .unwrap_or_default();
                warn!(message = %text, "Device reported failure on initialize, continuing");
            }
            _ => debug!(id = reply.id, "Ignoring initialize reply"),
        }
        Ok(())
    }

    async fn await_peer_key(&mut self) -> Result<Bytes> {
        loop {
            match self.next_step().await? {
                Step::Continue => continue,
                Step::PeerKey(key) => return Ok(key),
                Step::Secret(_) => return Err(ProtocolError::UnexpectedMessage),
            }
        }
    }

    async fn await_secret(&mut self) -> Result<DerivedSecret> {
        loop {
            match self.next_step().await? {
                Step::Continue => continue,
                Step::Secret(secret) => return Ok(secret),
                Step::PeerKey(_) => return Err(ProtocolError::UnexpectedMessage),
            }
        }
    }

    /// Read one message and dispatch it by id.
    async fn next_step(&mut self) -> Result<Step> {
        let message = self.channel.receive_raw().await?;
        let kind = MessageType::try_from(message.id).map_err(ProtocolError::UnsupportedMessage)?;
        debug!(?kind, state = ?self.state, "Dispatching device message");

        match kind {
            MessageType::Failure => {
                let failure: Failure = decode_payload(message.payload)?;
                let text = failure.message.unwrap_or_default();
                warn!(code = ?failure.code, message = %text, "Device failure");
                self.channel.metrics().protocol_error();
                Err(ProtocolError::DeviceFailure(text))
            }
            MessageType::ButtonRequest => {
                let request: ButtonRequest = decode_payload(message.payload)?;
                debug!(code = ?request.code, "Button confirmation requested");
                self.prompt.show(BUTTON_NOTICE);
                self.channel.metrics().interaction();
                self.channel.send(&ButtonAck {}).await?;
                Ok(Step::Continue)
            }
            MessageType::PinMatrixRequest => {
                let _: PinMatrixRequest = decode_payload(message.payload)?;
                for line in PIN_KEYPAD {
                    self.prompt.show(line);
                }
                let pin = self.prompt.secret(PIN_PROMPT, false)?;
                self.channel.metrics().interaction();
                let ack = PinMatrixAck {
                    pin: pin.as_str().to_owned(),
                };
                self.channel.send(&ack).await?;
                Ok(Step::Continue)
            }
            MessageType::PassphraseRequest => {
                let _: PassphraseRequest = decode_payload(message.payload)?;
                let passphrase = self.prompt.secret(PASSPHRASE_PROMPT, false)?;
                self.channel.metrics().interaction();
                let ack = PassphraseAck {
                    passphrase: passphrase.as_str().to_owned(),
                };
                self.channel.send(&ack).await?;
                Ok(Step::Continue)
            }
            MessageType::Success => {
                let success: Success = decode_payload(message.payload)?;
                debug!(message = ?success.message, "Device success");
                Ok(Step::Continue)
            }
            MessageType::Features => {
                let _: Features = decode_payload(message.payload)?;
                Ok(Step::Continue)
            }
            MessageType::PublicKey => {
                if self.state != SessionState::AwaitingPeerKey {
                    return Err(ProtocolError::UnexpectedMessage);
                }
                let key: PublicKey = decode_payload(message.payload)?;
                if key.node.public_key.is_empty() {
                    debug!("Empty peer key, waiting for the next reply");
                    return Ok(Step::Continue);
                }
                Ok(Step::PeerKey(key.node.public_key.clone()))
            }
            MessageType::SignedIdentity => {
                if self.state != SessionState::AwaitingSecret {
                    return Err(ProtocolError::UnexpectedMessage);
                }
                let signed: SignedIdentity = decode_payload(message.payload)?;
                // first byte of the 65 is filler, the ed25519 signature follows
                Ok(Step::Secret(DerivedSecret::new(
                    signed.signature.as_bytes()[1..].to_vec(),
                )))
            }
            MessageType::EcdhSessionKey => {
                if self.state != SessionState::AwaitingSecret {
                    return Err(ProtocolError::UnexpectedMessage);
                }
                let session: EcdhSessionKey = decode_payload(message.payload)?;
                // drop the non-standard prefix, hash the 32-byte shared point
                let digest = Zeroizing::new(hash256(&session.session_key.as_bytes()[1..]));
                Ok(Step::Secret(DerivedSecret::new(digest.to_vec())))
            }
            _ => Err(ProtocolError::UnsupportedMessage(message.id)),
        }
    }
}
