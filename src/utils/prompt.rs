//! Interactive prompts for PINs, passphrases and device notices.
//!
//! The device session never touches the terminal directly; it talks to a
//! [`Prompt`]. [`TerminalPrompt`] reads hidden input from the controlling
//! terminal and writes notices to stderr, keeping stdout free for the secret.

use std::collections::VecDeque;
use std::io::{BufRead, IsTerminal};

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{constants, ProtocolError, Result};

/// Longest secret accepted from the terminal, in characters.
pub const MAX_SECRET_LEN: usize = 1000;

pub trait Prompt {
    /// Show a notice line to the user.
    fn show(&mut self, line: &str);

    /// Read a hidden secret; with `confirm` the user must type it twice.
    fn secret(&mut self, message: &str, confirm: bool) -> Result<Zeroizing<String>>;
}

/// Hidden input on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn read_hidden(message: &str) -> Result<Zeroizing<String>> {
        let mut value = Zeroizing::new(
            rpassword::prompt_password(format!("{message}:")).map_err(|err| {
                match err.kind() {
                    std::io::ErrorKind::UnexpectedEof => {
                        ProtocolError::InvalidArgument(constants::ERR_INPUT_CLOSED.to_string())
                    }
                    _ => ProtocolError::Io(err),
                }
            })?,
        );
        if let Some((cut, _)) = value.char_indices().nth(MAX_SECRET_LEN) {
            value.truncate(cut);
        }
        Ok(value)
    }
}

impl Prompt for TerminalPrompt {
    fn show(&mut self, line: &str) {
        eprintln!("{line}");
    }

    fn secret(&mut self, message: &str, confirm: bool) -> Result<Zeroizing<String>> {
        if !std::io::stdin().is_terminal() {
            return Err(ProtocolError::InvalidArgument(
                constants::ERR_NOT_A_TERMINAL.to_string(),
            ));
        }

        let value = Self::read_hidden(message)?;
        if confirm {
            let again = Self::read_hidden("Confirm")?;
            if !bool::from(value.as_bytes().ct_eq(again.as_bytes())) {
                return Err(ProtocolError::InvalidArgument(
                    constants::ERR_CONFIRM_MISMATCH.to_string(),
                ));
            }
        }
        Ok(value)
    }
}

/// Print `message` to stderr and wait for a line on stdin.
///
/// Returns `false` once stdin is closed.
pub fn wait_for_enter(message: &str) -> Result<bool> {
    eprintln!("{message}");
    let mut line = String::new();
    let read = std::io::stdin().lock().read_line(&mut line)?;
    Ok(read != 0)
}

/// Pre-recorded answers, for driving a session without a terminal.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    /// Every notice shown, in order.
    pub shown: Vec<String>,
    /// Every secret prompt message, in order.
    pub asked: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

impl Prompt for ScriptedPrompt {
    fn show(&mut self, line: &str) {
        self.shown.push(line.to_string());
    }

    fn secret(&mut self, message: &str, confirm: bool) -> Result<Zeroizing<String>> {
        self.asked.push(message.to_string());
        let value = self.answers.pop_front().ok_or_else(|| {
            ProtocolError::InvalidArgument(constants::ERR_INPUT_CLOSED.to_string())
        })?;
        if confirm {
            let again = self.answers.pop_front().unwrap_or_default();
            if again != value {
                return Err(ProtocolError::InvalidArgument(
                    constants::ERR_CONFIRM_MISMATCH.to_string(),
                ));
            }
        }
        Ok(Zeroizing::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_answers() {
        let mut prompt = ScriptedPrompt::new(["1234", "hunter2", "hunter2"]);
        assert_eq!(prompt.secret("Pin", false).unwrap().as_str(), "1234");
        assert_eq!(prompt.secret("Pass", true).unwrap().as_str(), "hunter2");
        assert_eq!(prompt.asked, vec!["Pin", "Pass"]);
        assert!(matches!(
            prompt.secret("More", false),
            Err(ProtocolError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_scripted_confirm_mismatch() {
        let mut prompt = ScriptedPrompt::new(["a", "b"]);
        assert!(matches!(
            prompt.secret("Pass", true),
            Err(ProtocolError::InvalidArgument(_))
        ));
    }
}
