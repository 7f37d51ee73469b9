//! Gateway context.
//!
//! A [`Gateway`] owns one connection plus the device and group presence
//! registries fed by it, and publishes [`GatewayEvent`]s on a channel. The
//! presentation side reports which identities it still holds a live thing
//! for through [`ThingTracker`].

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use lightify_core::{Address, DeviceSnapshot, PresenceEvent, PresenceRegistry};
use lightify_protocol::{Command, DeviceRecord, GroupRecord, InfoOutcome, Response};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

use crate::config::GatewayConfig;
use crate::connection::Connection;
use crate::error::GatewayResult;

/// Capacity of the event channel returned by [`Gateway::new`].
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something published by a gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Device lifecycle transition.
    Device(PresenceEvent<Address, DeviceRecord>),
    /// Group lifecycle transition.
    Group(PresenceEvent<u16, GroupRecord>),
    /// Fresh state for a device that is already known and online.
    State {
        address: Address,
        snapshot: DeviceSnapshot,
    },
}

/// Reports whether the presentation side still holds a live thing.
pub trait ThingTracker: Send + Sync {
    fn has_device(&self, address: &Address) -> bool;
    fn has_group(&self, number: u16) -> bool;
}

/// No presentation side: every missing identity is forgotten right away.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoThings;

impl ThingTracker for NoThings {
    fn has_device(&self, _address: &Address) -> bool {
        false
    }

    fn has_group(&self, _number: u16) -> bool {
        false
    }
}

impl<T: ThingTracker + ?Sized> ThingTracker for Arc<T> {
    fn has_device(&self, address: &Address) -> bool {
        (**self).has_device(address)
    }

    fn has_group(&self, number: u16) -> bool {
        (**self).has_group(number)
    }
}

/// Holds a thing for every identity from discovery until it is forgotten or
/// explicitly released.
#[derive(Debug, Default)]
pub struct ThingSet {
    devices: RwLock<BTreeSet<Address>>,
    groups: RwLock<BTreeSet<u16>>,
}

impl ThingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the set from a published event.
    pub fn observe(&self, event: &GatewayEvent) {
        match event {
            GatewayEvent::Device(PresenceEvent::Discovered { id, .. })
            | GatewayEvent::Device(PresenceEvent::Recovered { id, .. }) => {
                self.devices
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(*id);
            }
            GatewayEvent::Device(PresenceEvent::Forgotten { id }) => {
                self.release_device(id);
            }
            GatewayEvent::Group(PresenceEvent::Discovered { id, .. })
            | GatewayEvent::Group(PresenceEvent::Recovered { id, .. }) => {
                self.groups
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(*id);
            }
            GatewayEvent::Group(PresenceEvent::Forgotten { id }) => {
                self.release_group(*id);
            }
            GatewayEvent::Device(PresenceEvent::Lost { .. })
            | GatewayEvent::Group(PresenceEvent::Lost { .. })
            | GatewayEvent::State { .. } => {}
        }
    }

    /// Drops the thing for a device. Returns false if none was held.
    pub fn release_device(&self, address: &Address) -> bool {
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(address)
    }

    /// Drops the thing for a group. Returns false if none was held.
    pub fn release_group(&self, number: u16) -> bool {
        self.groups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&number)
    }
}

impl ThingTracker for ThingSet {
    fn has_device(&self, address: &Address) -> bool {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(address)
    }

    fn has_group(&self, number: u16) -> bool {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&number)
    }
}

/// One gateway with its registries.
pub struct Gateway<T = NoThings> {
    connection: Connection,
    config: GatewayConfig,
    devices: PresenceRegistry<Address>,
    groups: PresenceRegistry<u16>,
    things: T,
    events: mpsc::Sender<GatewayEvent>,
}

impl<T: ThingTracker> Gateway<T> {
    /// Wraps an open connection. Returns the gateway and the receiving end
    /// of its event channel.
    pub fn new(
        connection: Connection,
        config: GatewayConfig,
        things: T,
    ) -> (Self, mpsc::Receiver<GatewayEvent>) {
        let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let gateway = Self {
            connection,
            devices: PresenceRegistry::with_grace(config.grace_scans),
            groups: PresenceRegistry::with_grace(config.grace_scans),
            config,
            things,
            events,
        };
        (gateway, receiver)
    }

    /// Connects to the gateway named in `config`.
    pub async fn connect(
        config: GatewayConfig,
        things: T,
    ) -> GatewayResult<(Self, mpsc::Receiver<GatewayEvent>)> {
        let connection = Connection::connect(&config).await?;
        Ok(Self::new(connection, config, things))
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn devices(&self) -> &PresenceRegistry<Address> {
        &self.devices
    }

    pub fn groups(&self) -> &PresenceRegistry<u16> {
        &self.groups
    }

    pub fn things(&self) -> &T {
        &self.things
    }

    /// Enumerates devices and reconciles the device registry.
    ///
    /// Publishes lifecycle events, then a state update for every listed
    /// device that was already online.
    pub async fn scan_devices(&mut self) -> GatewayResult<Vec<DeviceRecord>> {
        let records = self.connection.list_devices().await?;

        let things = &self.things;
        let events = self.devices.reconcile(
            records.iter().map(|record| (record.address, record.clone())),
            |address| things.has_device(address),
        );

        let announced: BTreeSet<Address> = events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    PresenceEvent::Discovered { .. } | PresenceEvent::Recovered { .. }
                )
            })
            .map(|event| *event.id())
            .collect();

        trace!(
            devices = records.len(),
            transitions = events.len(),
            "Device scan reconciled"
        );
        for event in events {
            self.publish(GatewayEvent::Device(event));
        }
        for record in records.iter().filter(|r| !announced.contains(&r.address)) {
            self.publish(GatewayEvent::State {
                address: record.address,
                snapshot: record.snapshot,
            });
        }

        Ok(records)
    }

    /// Enumerates groups and reconciles the group registry.
    pub async fn scan_groups(&mut self) -> GatewayResult<Vec<GroupRecord>> {
        let records = self.connection.list_groups().await?;

        let things = &self.things;
        let events = self.groups.reconcile(
            records.iter().map(|record| (record.number, record.clone())),
            |number| things.has_group(*number),
        );

        trace!(
            groups = records.len(),
            transitions = events.len(),
            "Group scan reconciled"
        );
        for event in events {
            self.publish(GatewayEvent::Group(event));
        }

        Ok(records)
    }

    /// Runs one full scan: devices, then groups.
    pub async fn scan(&mut self) -> GatewayResult<()> {
        self.scan_devices().await?;
        self.scan_groups().await?;
        Ok(())
    }

    /// Polls a single device, retrying while it is busy and still online.
    ///
    /// Returns `None` when the device stayed busy; its state arrives with the
    /// next full enumeration instead.
    pub async fn refresh_device(&self, address: Address) -> GatewayResult<Option<DeviceSnapshot>> {
        let mut retries = 0;
        loop {
            let info = self.connection.device_info(address).await?;
            match info.outcome(|address| self.devices.is_online(address)) {
                InfoOutcome::Updated(snapshot) => {
                    self.publish(GatewayEvent::State { address, snapshot });
                    return Ok(Some(snapshot));
                }
                InfoOutcome::Retry if retries < self.config.busy_retries => {
                    retries += 1;
                    trace!(%address, retries, "Device busy, retrying");
                    tokio::time::sleep(self.config.busy_retry_delay).await;
                }
                InfoOutcome::Retry | InfoOutcome::GiveUp => {
                    debug!(%address, retries, "Device busy, waiting for next scan");
                    return Ok(None);
                }
            }
        }
    }

    /// Sends an arbitrary command on the gateway connection.
    pub async fn send(&self, command: &Command) -> GatewayResult<Response> {
        self.connection.request(command).await
    }

    fn publish(&self, event: GatewayEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "Event channel full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                trace!("No event listener");
            }
        }
    }
}
