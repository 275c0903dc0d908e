//! Mock bus transport for testing.
//!
//! Simulates a bank of register slaves behind the byte-level transport
//! contract, so scheduler and retry semantics are exercised through the real
//! frame codec. Failure injection covers the two ways a half-duplex bus
//! actually misbehaves: a slave that stays silent until the timeout, and a
//! reply corrupted in flight.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::traits::{PurgeBuffers, RawTransport, TransportError};
use crate::core::modbus::{
    crc16, BusOperation, FN_READ_HOLDING_REGISTERS, FN_WRITE_SINGLE_REGISTER,
};
use valvelink_model::REGS_PER_DEVICE;

/// One request observed on the mock bus
#[derive(Debug, Clone)]
pub struct BusRecord {
    /// Addressed slave
    pub addr: u8,
    /// Decoded operation
    pub op: BusOperation,
    /// When the request hit the bus
    pub at: Instant,
    /// Whether the slave produced a (possibly corrupt) reply
    pub replied: bool,
}

/// A simulated register slave
#[derive(Debug)]
struct MockSlave {
    registers: [u16; REGS_PER_DEVICE as usize],
    /// Swallow this many read requests
    fail_reads: u32,
    /// Swallow this many write requests
    fail_writes: u32,
    /// Corrupt the CRC of this many replies
    corrupt_replies: u32,
    /// Swallow everything while set
    silent: bool,
}

impl MockSlave {
    fn new() -> Self {
        Self {
            registers: [0; REGS_PER_DEVICE as usize],
            fail_reads: 0,
            fail_writes: 0,
            corrupt_replies: 0,
            silent: false,
        }
    }
}

#[derive(Debug)]
struct MockBusInner {
    open: bool,
    slaves: HashMap<u8, MockSlave>,
    log: Vec<BusRecord>,
    /// Reply waiting to be read by the master
    pending: Option<Vec<u8>>,
}

/// Test-side control handle over the simulated bus
#[derive(Debug, Clone)]
pub struct MockBusHandle {
    inner: Arc<Mutex<MockBusInner>>,
}

impl MockBusHandle {
    /// Register a slave with zeroed registers.
    pub fn add_slave(&self, addr: u8) {
        self.inner.lock().slaves.insert(addr, MockSlave::new());
    }

    /// Set a slave register directly.
    pub fn set_register(&self, addr: u8, register: u16, value: u16) {
        if let Some(slave) = self.inner.lock().slaves.get_mut(&addr) {
            slave.registers[register as usize] = value;
        }
    }

    /// Read a slave register directly.
    pub fn register(&self, addr: u8, register: u16) -> Option<u16> {
        self.inner
            .lock()
            .slaves
            .get(&addr)
            .map(|s| s.registers[register as usize])
    }

    /// Swallow the next `n` read requests for `addr`.
    pub fn fail_reads(&self, addr: u8, n: u32) {
        if let Some(slave) = self.inner.lock().slaves.get_mut(&addr) {
            slave.fail_reads = n;
        }
    }

    /// Swallow the next `n` write requests for `addr`.
    pub fn fail_writes(&self, addr: u8, n: u32) {
        if let Some(slave) = self.inner.lock().slaves.get_mut(&addr) {
            slave.fail_writes = n;
        }
    }

    /// Corrupt the CRC of the next `n` replies from `addr`.
    pub fn corrupt_replies(&self, addr: u8, n: u32) {
        if let Some(slave) = self.inner.lock().slaves.get_mut(&addr) {
            slave.corrupt_replies = n;
        }
    }

    /// Make `addr` ignore all traffic (as an unpowered device would).
    pub fn set_silent(&self, addr: u8, silent: bool) {
        if let Some(slave) = self.inner.lock().slaves.get_mut(&addr) {
            slave.silent = silent;
        }
    }

    /// All requests observed so far, in bus order.
    pub fn history(&self) -> Vec<BusRecord> {
        self.inner.lock().log.clone()
    }

    /// Forget recorded history.
    pub fn clear_history(&self) {
        self.inner.lock().log.clear();
    }
}

/// Mock transport end held by the scheduler
#[derive(Debug)]
pub struct MockBusTransport {
    inner: Arc<Mutex<MockBusInner>>,
}

impl MockBusTransport {
    /// Create a transport plus its control handle.
    pub fn new() -> (Self, MockBusHandle) {
        let inner = Arc::new(Mutex::new(MockBusInner {
            open: false,
            slaves: HashMap::new(),
            log: Vec::new(),
            pending: None,
        }));
        (
            Self {
                inner: Arc::clone(&inner),
            },
            MockBusHandle { inner },
        )
    }

    /// Decode a request frame and produce the slave's reaction.
    fn process_request(inner: &mut MockBusInner, frame: &[u8]) -> Result<(), TransportError> {
        if frame.len() < 8 {
            return Err(TransportError::SendFailed(format!(
                "Malformed request: {} bytes",
                frame.len()
            )));
        }
        let payload = &frame[..frame.len() - 2];
        let sent_crc = u16::from_le_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
        if crc16(payload) != sent_crc {
            return Err(TransportError::SendFailed("Request CRC invalid".to_string()));
        }

        let addr = frame[0];
        let fc = frame[1];
        let a = u16::from_be_bytes([frame[2], frame[3]]);
        let b = u16::from_be_bytes([frame[4], frame[5]]);
        let op = match fc {
            FN_READ_HOLDING_REGISTERS => BusOperation::ReadRegisters { start: a, count: b },
            FN_WRITE_SINGLE_REGISTER => BusOperation::WriteRegister {
                register: a,
                value: b,
            },
            other => {
                return Err(TransportError::SendFailed(format!(
                    "Unsupported function code {other:#04x}"
                )))
            }
        };

        let mut reply = match inner.slaves.get_mut(&addr) {
            None => None,
            Some(slave) if slave.silent => None,
            Some(slave) => match op {
                BusOperation::ReadRegisters { start, count } => {
                    if slave.fail_reads > 0 {
                        slave.fail_reads -= 1;
                        None
                    } else if count == 0 || start as u32 + count as u32 > REGS_PER_DEVICE as u32 {
                        Some(exception_reply(addr, fc, 0x02))
                    } else {
                        let mut data = vec![addr, fc, (2 * count) as u8];
                        for reg in start..start + count {
                            data.extend_from_slice(&slave.registers[reg as usize].to_be_bytes());
                        }
                        let crc = crc16(&data);
                        data.extend_from_slice(&crc.to_le_bytes());
                        Some(data)
                    }
                }
                BusOperation::WriteRegister { register, value } => {
                    if slave.fail_writes > 0 {
                        slave.fail_writes -= 1;
                        None
                    } else if register >= REGS_PER_DEVICE {
                        Some(exception_reply(addr, fc, 0x02))
                    } else {
                        slave.registers[register as usize] = value;
                        Some(frame.to_vec())
                    }
                }
            },
        };

        if let Some(bytes) = reply.as_mut() {
            if let Some(slave) = inner.slaves.get_mut(&addr) {
                if slave.corrupt_replies > 0 {
                    slave.corrupt_replies -= 1;
                    let last = bytes.len() - 1;
                    bytes[last] ^= 0xFF;
                }
            }
        }

        inner.log.push(BusRecord {
            addr,
            op,
            at: Instant::now(),
            replied: reply.is_some(),
        });
        inner.pending = reply;
        Ok(())
    }
}

fn exception_reply(addr: u8, fc: u8, code: u8) -> Vec<u8> {
    let mut data = vec![addr, fc | 0x80, code];
    let crc = crc16(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    data
}

#[async_trait]
impl RawTransport for MockBusTransport {
    fn name(&self) -> &str {
        "mock-bus"
    }

    async fn open(&mut self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.open = true;
        inner.pending = None;
        debug!("Mock bus opened");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.open = false;
        inner.pending = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(TransportError::NotConnected);
        }
        Self::process_request(&mut inner, data)
    }

    async fn recv(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize, TransportError> {
        let reply = {
            let mut inner = self.inner.lock();
            if !inner.open {
                return Err(TransportError::NotConnected);
            }
            inner.pending.take()
        };
        match reply {
            Some(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            None => {
                // Quiet line: behave like serial hardware and run out the clock
                tokio::time::sleep(wait).await;
                Err(TransportError::Timeout(format!(
                    "No response within {wait:?}"
                )))
            }
        }
    }

    async fn purge(&mut self, _buffers: PurgeBuffers) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(TransportError::NotConnected);
        }
        inner.pending = None;
        Ok(())
    }
}
