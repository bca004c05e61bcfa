//! Reports over an async byte stream.
//!
//! On Linux a USB HID key shows up as `/dev/hidrawN`: every `read` returns one
//! input report and every `write` sends one output report, prefixed with the
//! report number when the device uses numbered reports.

use std::path::Path;
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

use crate::core::frame::{Report, REPORT_SIZE};
use crate::error::{ProtocolError, Result};
use crate::transport::Transport;
use crate::utils::timeout::with_optional_timeout;

/// Report number sent ahead of each output report when enabled.
pub const REPORT_ID: u8 = 0;

pub struct StreamTransport<S> {
    stream: S,
    report_id: bool,
}

impl<S> StreamTransport<S> {
    /// Wrap `stream`; with `report_id` each write is prefixed by [`REPORT_ID`].
    pub fn new(stream: S, report_id: bool) -> Self {
        Self { stream, report_id }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl StreamTransport<File> {
    /// Open a hidraw device node for reading and writing.
    #[instrument(skip(path), fields(device = %path.as_ref().display()))]
    pub async fn open<P: AsRef<Path>>(path: P, report_id: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())
            .await?;
        debug!("Device node opened");
        Ok(Self::new(file, report_id))
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn read_report(&mut self, report: &mut Report, timeout: Option<Duration>) -> Result<()> {
        with_optional_timeout(
            async {
                match self.stream.read_exact(report).await {
                    Ok(_) => Ok(()),
                    Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                        Err(ProtocolError::ConnectionClosed)
                    }
                    Err(err) => Err(err.into()),
                }
            },
            timeout,
        )
        .await
    }

    async fn write_report(&mut self, report: &Report, timeout: Option<Duration>) -> Result<()> {
        let mut buffer = [0u8; REPORT_SIZE + 1];
        let outgoing: &[u8] = if self.report_id {
            buffer[0] = REPORT_ID;
            buffer[1..].copy_from_slice(report);
            &buffer
        } else {
            report
        };

        with_optional_timeout(
            async {
                self.stream.write_all(outgoing).await?;
                self.stream.flush().await?;
                Ok(())
            },
            timeout,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_report_id_prefix() {
        let (host, mut device) = duplex(256);
        let mut transport = StreamTransport::new(host, true);

        let mut report = [0u8; REPORT_SIZE];
        report[0] = b'?';
        transport
            .write_report(&report, Some(Duration::from_secs(1)))
            .await
            .unwrap();

        let mut received = [0xffu8; REPORT_SIZE + 1];
        device.read_exact(&mut received).await.unwrap();
        assert_eq!(received[0], REPORT_ID);
        assert_eq!(received[1], b'?');
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let (host, _device) = duplex(256);
        let mut transport = StreamTransport::new(host, false);
        let mut report = [0u8; REPORT_SIZE];
        assert!(matches!(
            transport
                .read_report(&mut report, Some(Duration::from_millis(20)))
                .await,
            Err(ProtocolError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_closed_stream() {
        let (host, device) = duplex(256);
        drop(device);
        let mut transport = StreamTransport::new(host, false);
        let mut report = [0u8; REPORT_SIZE];
        assert!(matches!(
            transport.read_report(&mut report, None).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }
}
