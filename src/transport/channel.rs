use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, instrument};

use crate::core::field::Encode;
use crate::core::frame::{packetize, report_count, RawMessage, Reassembler, REPORT_SIZE};
use crate::core::{from_bytes, to_bytes};
use crate::error::Result;
use crate::protocol::message::DeviceMessage;
use crate::transport::Transport;
use crate::utils::metrics::SessionMetrics;
use crate::utils::timeout::DEFAULT_WRITE_TIMEOUT;

/// Whole messages over a report transport.
///
/// Each outgoing message is packetized and written report by report under the
/// write timeout; any failed write aborts the send. Incoming reports are
/// reassembled until the header's length is satisfied.
pub struct MessageChannel<T> {
    transport: T,
    write_timeout: Duration,
    read_timeout: Option<Duration>,
    metrics: SessionMetrics,
}

impl<T: Transport> MessageChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            read_timeout: None,
            metrics: SessionMetrics::new(),
        }
    }

    /// Set custom timeout durations; a `None` read timeout waits forever.
    pub fn with_timeouts(mut self, write_timeout: Duration, read_timeout: Option<Duration>) -> Self {
        self.write_timeout = write_timeout;
        self.read_timeout = read_timeout;
        self
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send an already encoded payload under message id `id`.
    #[instrument(skip(self, payload), fields(len = payload.len()), level = "debug")]
    pub async fn send_raw(&mut self, id: u16, payload: &[u8]) -> Result<()> {
        let reports = packetize(id, payload)?;
        debug!(
            reports = reports.len(),
            timeout_ms = ?self.write_timeout.as_millis(),
            "Sending message"
        );
        for report in &reports {
            self.transport
                .write_report(report, Some(self.write_timeout))
                .await?;
        }
        self.metrics
            .message_sent(payload.len() as u64, report_count(payload.len()) as u64);
        Ok(())
    }

    /// Encode and send a catalogue message.
    pub async fn send<M: DeviceMessage>(&mut self, message: &M) -> Result<()> {
        self.send_encoded(M::TYPE.id(), message).await
    }

    /// Encode `message` and send it under `id`.
    pub async fn send_encoded<M: Encode + ?Sized>(&mut self, id: u16, message: &M) -> Result<()> {
        let payload = to_bytes(message)?;
        self.send_raw(id, &payload).await
    }

    /// Read reports until one full message has arrived.
    #[instrument(skip(self), level = "debug")]
    pub async fn receive_raw(&mut self) -> Result<RawMessage> {
        let mut assembler = Reassembler::new();
        let mut report = [0u8; REPORT_SIZE];
        loop {
            self.transport
                .read_report(&mut report, self.read_timeout)
                .await?;
            self.metrics.report_received();

            match assembler.push(&report) {
                Ok(Some(message)) => {
                    debug!(id = message.id, len = message.payload.len(), "Received message");
                    self.metrics.message_received(message.payload.len() as u64);
                    return Ok(message);
                }
                Ok(None) => continue,
                Err(err) => {
                    self.metrics.protocol_error();
                    return Err(err);
                }
            }
        }
    }

    /// Send a message and wait for the next message from the device.
    pub async fn request<M: DeviceMessage>(&mut self, message: &M) -> Result<RawMessage> {
        self.send(message).await?;
        self.receive_raw().await
    }
}

/// Decode a payload as catalogue message `M`.
pub fn decode_payload<M: DeviceMessage>(payload: Bytes) -> Result<M> {
    from_bytes(payload)
}
