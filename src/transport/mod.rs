//! # Transport Layer
//!
//! Moves fixed 64-byte reports between the host and the key.
//!
//! ## Components
//! - **Transport**: the report-level seam every link implements
//! - **Stream**: reports over any async byte stream, e.g. a Linux hidraw node
//! - **Memory**: an in-process device for tests and dry runs
//! - **Channel**: whole messages over a transport, with timeouts and metrics
//!
//! Reads wait indefinitely unless a read timeout is given; every write is
//! bounded by the write timeout.

use std::time::Duration;

use crate::core::frame::Report;
use crate::error::Result;

pub mod channel;
pub mod memory;
pub mod stream;

pub use channel::MessageChannel;
pub use memory::MemoryTransport;
pub use stream::StreamTransport;

/// A report-oriented link to a device.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Read exactly one report. `None` waits forever.
    async fn read_report(&mut self, report: &mut Report, timeout: Option<Duration>) -> Result<()>;

    /// Write exactly one report.
    async fn write_report(&mut self, report: &Report, timeout: Option<Duration>) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    async fn read_report(&mut self, report: &mut Report, timeout: Option<Duration>) -> Result<()> {
        (**self).read_report(report, timeout).await
    }

    async fn write_report(&mut self, report: &Report, timeout: Option<Duration>) -> Result<()> {
        (**self).write_report(report, timeout).await
    }
}
