//! Transport layer: one exclusive connection to the shared half-duplex bus.
//!
//! - [`traits`]: the byte-level [`RawTransport`] contract and error types
//! - [`serial`]: the production serial implementation (tokio-serial)
//! - [`mock`]: a scripted register-slave simulator for tests
//! - [`bus`]: the exchange layer that frames one transaction at a time

pub mod bus;
pub mod mock;
pub mod serial;
pub mod traits;

pub use bus::BusTransport;
pub use mock::{BusRecord, MockBusHandle, MockBusTransport};
pub use serial::{SerialConfig, SerialTransport};
pub use traits::{PurgeBuffers, RawTransport, TransportError};
