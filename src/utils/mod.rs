//! # Utility Modules
//!
//! Supporting utilities for hashing, prompting, logging, and timing.
//!
//! ## Components
//! - **Hash**: SHA-256 over byte slices
//! - **Prompt**: Hidden terminal input and scripted answers for tests
//! - **Logging**: Subscriber setup for the binary
//! - **Timeout**: Async timeout wrappers
//! - **Metrics**: Per-session traffic counters
//!
//! ## Security
//! - Secrets read from the terminal are held in `Zeroizing` buffers
//! - Confirmation input is compared in constant time (subtle crate)

pub mod hash;
pub mod logging;
pub mod metrics;
pub mod prompt;
pub mod timeout;

pub use metrics::SessionMetrics;
pub use prompt::{Prompt, ScriptedPrompt, TerminalPrompt};
