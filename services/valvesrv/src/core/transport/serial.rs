//! Serial transport implementation on tokio-serial.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info};

use super::traits::{PurgeBuffers, RawTransport, TransportError};

/// Serial port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0", "COM1")
    #[serde(default)]
    pub port: String,
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    /// Stop bits (1, 2)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    /// Parity ("None", "Even", "Odd")
    #[serde(default = "default_parity")]
    pub parity: String,
    /// Read timeout for one exchange, in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    9600
}
fn default_data_bits() -> u8 {
    8
}
fn default_stop_bits() -> u8 {
    1
}
fn default_parity() -> String {
    "None".to_string()
}
fn default_read_timeout_ms() -> u64 {
    1000
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: default_parity(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl SerialConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.port.is_empty() {
            return Err(TransportError::ConfigError(
                "Port path cannot be empty".to_string(),
            ));
        }
        if self.baud_rate == 0 {
            return Err(TransportError::ConfigError(
                "Baud rate must be greater than zero".to_string(),
            ));
        }
        if ![5, 6, 7, 8].contains(&self.data_bits) {
            return Err(TransportError::ConfigError(
                "Data bits must be 5, 6, 7, or 8".to_string(),
            ));
        }
        if ![1, 2].contains(&self.stop_bits) {
            return Err(TransportError::ConfigError(
                "Stop bits must be 1 or 2".to_string(),
            ));
        }
        if !["None", "Even", "Odd"].contains(&self.parity.as_str()) {
            return Err(TransportError::ConfigError(
                "Parity must be None, Even, or Odd".to_string(),
            ));
        }
        if self.read_timeout_ms == 0 {
            return Err(TransportError::ConfigError(
                "Read timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Read timeout as a [`Duration`]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    fn parse_parity(&self) -> tokio_serial::Parity {
        match self.parity.as_str() {
            "Even" => tokio_serial::Parity::Even,
            "Odd" => tokio_serial::Parity::Odd,
            _ => tokio_serial::Parity::None,
        }
    }

    fn parse_data_bits(&self) -> tokio_serial::DataBits {
        match self.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        }
    }

    fn parse_stop_bits(&self) -> tokio_serial::StopBits {
        match self.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        }
    }
}

/// Serial transport bound to a single port
#[derive(Debug)]
pub struct SerialTransport {
    config: SerialConfig,
    connection: Option<SerialStream>,
}

impl SerialTransport {
    /// Create a new serial transport with configuration.
    pub fn new(config: SerialConfig) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self {
            config,
            connection: None,
        })
    }
}

#[async_trait]
impl RawTransport for SerialTransport {
    fn name(&self) -> &str {
        "serial"
    }

    async fn open(&mut self) -> Result<(), TransportError> {
        debug!("Opening serial port: {}", self.config.port);

        let port_result = tokio_serial::new(&self.config.port, self.config.baud_rate)
            .data_bits(self.config.parse_data_bits())
            .parity(self.config.parse_parity())
            .stop_bits(self.config.parse_stop_bits())
            .timeout(self.config.read_timeout())
            .open_native_async();

        match port_result {
            Ok(port) => {
                #[cfg(unix)]
                {
                    let mut port = port;
                    port.set_exclusive(false).map_err(|e| {
                        TransportError::ConnectionFailed(format!(
                            "Failed to set exclusive mode: {e}"
                        ))
                    })?;
                    self.connection = Some(port);
                }
                #[cfg(not(unix))]
                {
                    self.connection = Some(port);
                }

                info!(
                    "Opened serial port {} @ {} baud",
                    self.config.port, self.config.baud_rate
                );
                Ok(())
            }
            Err(e) => {
                let error_msg = format!("Failed to open serial port {}: {e}", self.config.port);
                error!("{error_msg}");
                Err(TransportError::ConnectionFailed(error_msg))
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.connection.take().is_some() {
            // The port is released when the stream drops
            info!("Closed serial port: {}", self.config.port);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.connection.as_mut().ok_or(TransportError::NotConnected)?;

        port.write_all(data)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        port.flush()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        debug!(
            hex_data = %data.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" "),
            length = data.len(),
            direction = "send",
            "[Serial] Raw frame"
        );
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize, TransportError> {
        let port = self.connection.as_mut().ok_or(TransportError::NotConnected)?;

        match timeout(wait, port.read(buf)).await {
            Ok(Ok(n)) => {
                if n > 0 {
                    debug!(
                        hex_data = %buf[..n].iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" "),
                        length = n,
                        direction = "recv",
                        "[Serial] Raw frame"
                    );
                }
                Ok(n)
            }
            Ok(Err(e)) => Err(TransportError::ReceiveFailed(e.to_string())),
            // Timeout is routine on a quiet bus, keep it at debug
            Err(_) => {
                debug!("Receive timed out after {wait:?}");
                Err(TransportError::Timeout(format!(
                    "No response within {wait:?}"
                )))
            }
        }
    }

    async fn purge(&mut self, buffers: PurgeBuffers) -> Result<(), TransportError> {
        let port = self.connection.as_mut().ok_or(TransportError::NotConnected)?;
        let target = match buffers {
            PurgeBuffers::Input => ClearBuffer::Input,
            PurgeBuffers::Output => ClearBuffer::Output,
            PurgeBuffers::Both => ClearBuffer::All,
        };
        port.clear(target)
            .map_err(|e| TransportError::ReceiveFailed(format!("Failed to purge buffers: {e}")))
    }
}
