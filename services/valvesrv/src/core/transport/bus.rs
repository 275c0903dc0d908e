//! Exchange layer: one request/response transaction on the half-duplex bus.

use std::time::{Duration, Instant};
use tracing::debug;

use super::traits::{PurgeBuffers, RawTransport, TransportError};
use crate::core::modbus::{
    encode_request, expected_response_len, parse_response, BusOperation, ExchangeReply,
    EXCEPTION_RESPONSE_LEN,
};

const RECV_CHUNK: usize = 64;

/// Owns the raw link and performs framed exchanges over it.
///
/// There is exactly one `BusTransport` per connection and the scheduler task
/// owns it exclusively, so every exchange is serialized by construction.
#[derive(Debug)]
pub struct BusTransport {
    raw: Box<dyn RawTransport>,
}

impl BusTransport {
    pub fn new(raw: Box<dyn RawTransport>) -> Self {
        Self { raw }
    }

    /// Whether the underlying link is open
    pub fn is_open(&self) -> bool {
        self.raw.is_open()
    }

    /// Close the underlying link. Idempotent; failures are logged upstream.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.raw.close().await
    }

    /// Discard residual buffered bytes on the link.
    pub async fn purge(&mut self, buffers: PurgeBuffers) -> Result<(), TransportError> {
        self.raw.purge(buffers).await
    }

    /// Perform exactly one request/response transaction with `addr`.
    ///
    /// Residual buffering from a previous aborted exchange is purged before
    /// transmitting, otherwise stale bytes would corrupt this frame's
    /// response. The whole transaction is bounded by `timeout`.
    pub async fn exchange(
        &mut self,
        addr: u8,
        op: &BusOperation,
        timeout: Duration,
    ) -> Result<ExchangeReply, TransportError> {
        self.raw.purge(PurgeBuffers::Both).await?;

        let request = encode_request(addr, op);
        self.raw.send(&request).await?;

        let deadline = Instant::now() + timeout;
        let mut expected = expected_response_len(op);
        let mut collected: Vec<u8> = Vec::with_capacity(expected);
        let mut chunk = [0u8; RECV_CHUNK];

        while collected.len() < expected {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .filter(|d| !d.is_zero())
                .ok_or_else(|| {
                    TransportError::Timeout(format!(
                        "Incomplete response from {addr}: {} of {expected} bytes",
                        collected.len()
                    ))
                })?;

            let n = self.raw.recv(&mut chunk, remaining).await?;
            collected.extend_from_slice(&chunk[..n]);

            // An exception reply is shorter than the normal one
            if collected.len() >= 2 && collected[1] & 0x80 != 0 {
                expected = EXCEPTION_RESPONSE_LEN;
            }
        }

        debug!(
            addr,
            ?op,
            response_len = collected.len(),
            "Exchange complete"
        );
        parse_response(addr, op, &collected[..expected])
    }
}
