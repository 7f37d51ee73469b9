//! Core types: addresses, device snapshots, presence reconciliation, tracing

pub mod address;
pub mod presence;
pub mod snapshot;
pub mod tracing;

pub use address::{ADDRESS_LEN, Address, AddressParseError};
pub use presence::{PresenceEvent, PresenceRegistry, RegistryEntry};
pub use snapshot::{ColorParseError, DeviceSnapshot, Rgba};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
