//! In-process device.
//!
//! Reports written by the host are reassembled into messages and recorded;
//! an optional responder reacts to each complete message by queueing reply
//! messages, which the host then reads back report by report.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::trace;

use crate::core::field::Encode;
use crate::core::frame::{packetize, RawMessage, Reassembler, Report};
use crate::core::to_bytes;
use crate::error::{ProtocolError, Result};
use crate::transport::Transport;

/// Reaction to one complete outgoing message: the replies to queue.
pub type Responder = Box<dyn FnMut(&RawMessage) -> Result<Vec<RawMessage>> + Send>;

#[derive(Default)]
pub struct MemoryTransport {
    inbound: VecDeque<Report>,
    assembler: Reassembler,
    sent: Vec<RawMessage>,
    reports_written: usize,
    responder: Option<Responder>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that answers each host message through `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&RawMessage) -> Result<Vec<RawMessage>> + Send + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    /// Queue a raw report for the host to read.
    pub fn queue_report(&mut self, report: Report) {
        self.inbound.push_back(report);
    }

    /// Queue an encoded message for the host to read.
    pub fn queue_raw(&mut self, id: u16, payload: &[u8]) -> Result<()> {
        self.inbound.extend(packetize(id, payload)?);
        Ok(())
    }

    /// Queue `message` under `id`.
    pub fn queue_message<M: Encode>(&mut self, id: u16, message: &M) -> Result<()> {
        let payload = to_bytes(message)?;
        self.queue_raw(id, &payload)
    }

    /// Messages the host has written, in order.
    pub fn sent(&self) -> &[RawMessage] {
        &self.sent
    }

    pub fn reports_written(&self) -> usize {
        self.reports_written
    }

    /// Reports still waiting to be read.
    pub fn pending_reports(&self) -> usize {
        self.inbound.len()
    }
}

impl Transport for MemoryTransport {
    async fn read_report(&mut self, report: &mut Report, _timeout: Option<Duration>) -> Result<()> {
        let next = self
            .inbound
            .pop_front()
            .ok_or(ProtocolError::ConnectionClosed)?;
        report.copy_from_slice(&next);
        Ok(())
    }

    async fn write_report(&mut self, report: &Report, _timeout: Option<Duration>) -> Result<()> {
        self.reports_written += 1;
        let Some(message) = self.assembler.push(report)? else {
            return Ok(());
        };
        trace!(id = message.id, len = message.payload.len(), "Device received message");

        if let Some(responder) = self.responder.as_mut() {
            for reply in responder(&message)? {
                self.inbound.extend(packetize(reply.id, &reply.payload)?);
            }
        }
        self.sent.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::REPORT_SIZE;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_responder_replies_per_message() {
        let mut transport = MemoryTransport::with_responder(|message| {
            Ok(vec![RawMessage {
                id: message.id + 1,
                payload: Bytes::from(vec![0xab; 70]),
            }])
        });

        for report in packetize(26, &[1u8; 100]).unwrap() {
            transport.write_report(&report, None).await.unwrap();
        }
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(transport.reports_written(), 2);
        assert_eq!(transport.pending_reports(), 2);

        let mut report = [0u8; REPORT_SIZE];
        transport.read_report(&mut report, None).await.unwrap();
        assert_eq!(&report[..5], &[b'?', b'#', b'#', 0, 27]);
    }

    #[tokio::test]
    async fn test_empty_queue_is_closed() {
        let mut transport = MemoryTransport::new();
        let mut report = [0u8; REPORT_SIZE];
        assert!(matches!(
            transport.read_report(&mut report, None).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }
}
