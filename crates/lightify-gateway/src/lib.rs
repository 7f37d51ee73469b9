//! Gateway transport: connection, request correlation, scheduling, presence.
//!
//! This crate provides the I/O side around the protocol core:
//! - A TCP connection with a reader task and sequence-correlated requests
//! - Bounded-wait expiry of pending requests
//! - A poll scheduler with separate device and group cadences, jitter and backoff
//! - A gateway context that reconciles scans and publishes lifecycle events
//!
//! # Example
//!
//! ```rust,no_run
//! use lightify_gateway::{Gateway, GatewayConfig, NoThings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::new("192.168.1.20");
//!     let (mut gateway, mut events) = Gateway::connect(config, NoThings).await?;
//!
//!     gateway.scan().await?;
//!     while let Ok(event) = events.try_recv() {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod error;
mod gateway;
mod pending;
mod scheduler;
#[cfg(test)]
mod testing;

pub use config::GatewayConfig;
pub use connection::Connection;
pub use error::{GatewayError, GatewayResult};
pub use gateway::{
    EVENT_CHANNEL_CAPACITY, Gateway, GatewayEvent, NoThings, ThingSet, ThingTracker,
};
pub use pending::{PendingRequests, SequenceCounter};
pub use scheduler::{
    CadenceState, ScanKind, ScanTarget, Scheduler, SchedulerCommand, SchedulerConfig,
    SchedulerHandle, SchedulerState, SharedSchedulerState,
};
