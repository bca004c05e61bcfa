//! `macer` command-line tool.
//!
//! Writes the derived secret to stdout, for use as `cryptsetup --key-file=-`.
//! Prompts, notices and logs go to stderr.

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};
use zeroize::Zeroizing;

use macer::config::MacerConfig;
use macer::error::{ProtocolError, Result};
use macer::mnemonic;
use macer::protocol::DeviceSession;
use macer::transport::{MessageChannel, StreamTransport};
use macer::utils::logging::init_logging;
use macer::utils::metrics::Timer;
use macer::utils::prompt::{wait_for_enter, Prompt, TerminalPrompt};

const ATTACH_NOTICE: &str = "Attach compatible device (press enter when ready)...";

#[derive(Debug, Parser)]
#[command(name = "macer", version, about = "Derive a LUKS passphrase from a hardware key")]
struct Cli {
    /// Host name bound into the derived secret
    #[arg(short = 't', long)]
    host: String,

    /// User name bound into the derived secret
    #[arg(short, long)]
    user: Option<String>,

    /// Text shown on the device in legacy mode
    #[arg(short, long)]
    message: Option<String>,

    /// Prompt for the current LUKS password and print it before the new secret
    #[arg(short, long)]
    existing: bool,

    /// Mix a local passphrase into the output after the device secret
    #[arg(short, long)]
    password: bool,

    /// Use signed-identity derivation instead of ECDH
    #[arg(short, long)]
    legacy: bool,

    /// hidraw node of the device
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the secret truncated to this many bytes as BIP39 words
    #[arg(
        long,
        value_parser = clap::builder::PossibleValuesParser::new(["16", "24", "32"]),
        conflicts_with_all = ["existing", "password"]
    )]
    mnemonic: Option<String>,
}

impl Cli {
    fn load_config(&self) -> Result<MacerConfig> {
        let mut config = match &self.config {
            Some(path) => MacerConfig::from_file(path)?,
            None => MacerConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;

        config.identity.host = self.host.clone();
        if let Some(user) = &self.user {
            config.identity.user = user.clone();
        }
        if let Some(message) = &self.message {
            config.identity.message = message.clone();
        }
        if let Some(device) = &self.device {
            config.device.path = device.clone();
        }
        config.device.legacy |= self.legacy;

        config.validate_strict()?;
        Ok(config)
    }

    fn mnemonic_len(&self) -> Result<Option<usize>> {
        self.mnemonic
            .as_deref()
            .map(|len| {
                len.parse()
                    .map_err(|_| ProtocolError::InvalidArgument(format!("Invalid length: {len}")))
            })
            .transpose()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging(&config.logging) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }

    match run(&cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config: &MacerConfig) -> Result<()> {
    let _timer = Timer::start("macer");
    let mnemonic_len = cli.mnemonic_len()?;

    if mnemonic_len.is_none() && std::io::stdout().is_terminal() {
        return Err(ProtocolError::InvalidArgument(
            "Refusing to write a secret to a terminal, redirect stdout".to_string(),
        ));
    }

    let mut prompt = TerminalPrompt;
    let mut output = Zeroizing::new(Vec::new());

    if cli.existing {
        let current = prompt.secret("Enter current password", false)?;
        output.extend_from_slice(current.as_bytes());
        output.push(b'\n');
    }

    let local = if cli.password {
        Some(prompt.secret("Local passphrase", cli.existing)?)
    } else {
        None
    };

    let transport = loop {
        match StreamTransport::open(&config.device.path, config.device.report_id).await {
            Ok(transport) => break transport,
            Err(err) => {
                warn!(device = %config.device.path.display(), error = %err, "Device unavailable");
                if !wait_for_enter(ATTACH_NOTICE)? {
                    return Err(ProtocolError::ConnectionClosed);
                }
            }
        }
    };

    let channel = MessageChannel::new(transport)
        .with_timeouts(config.device.write_timeout, config.device.read_timeout());
    let mut session = DeviceSession::new(channel, prompt, config.identity.host_info());
    let secret = session.run(config.device.mode()).await?;

    if let Some(len) = mnemonic_len {
        let words = mnemonic::encode(secret.truncate(len)?.as_bytes())?;
        info!(words = words.split(' ').count(), "Writing mnemonic");
        output.extend_from_slice(words.as_bytes());
        output.push(b'\n');
    } else {
        output.extend_from_slice(secret.as_bytes());
        if let Some(local) = &local {
            output.extend_from_slice(local.as_bytes());
        }
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&output)?;
    stdout.flush()?;
    Ok(())
}
