//! Transport layer traits.
//!
//! A [`RawTransport`] moves opaque bytes over one physical link. Framing and
//! retry policy sit above it, so serial hardware and the test double share
//! one contract. The scheduler task is the only owner of a transport, which
//! is what guarantees one exchange in flight on the half-duplex line.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Transport layer error types
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation attempted without an open connection
    #[error("Not connected")]
    NotConnected,

    /// Send operation failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Receive operation failed
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Timeout occurred
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Protocol-level error (framing, CRC, exception response)
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

/// Which direction of residual buffering to discard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeBuffers {
    /// Discard unread received bytes
    Input,
    /// Discard untransmitted outgoing bytes
    Output,
    /// Discard both directions
    Both,
}

/// Byte-level transport over one exclusive link.
///
/// Implementations must tolerate `close` on an already-closed link and purge
/// as a no-op when nothing is buffered. A half-duplex bus can retain bytes
/// from a previous aborted exchange, so the exchange layer purges before
/// every transmission.
#[async_trait]
pub trait RawTransport: Send + fmt::Debug {
    /// Human-readable transport name for logs
    fn name(&self) -> &str;

    /// Acquire the link. Fails when the underlying resource is unavailable.
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Release the link. Idempotent.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Whether the link is currently open
    fn is_open(&self) -> bool;

    /// Transmit all bytes of `data`.
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read available bytes into `buf`, waiting up to `timeout` for data.
    ///
    /// Returns the number of bytes read; `Ok(0)` means the link yielded
    /// nothing yet without erroring.
    async fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Discard residual buffered bytes in the given direction.
    async fn purge(&mut self, buffers: PurgeBuffers) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let error = TransportError::ConnectionFailed("port busy".to_string());
        assert!(error.to_string().contains("Connection failed"));
        assert!(error.to_string().contains("port busy"));

        assert_eq!(TransportError::NotConnected.to_string(), "Not connected");
    }
}
