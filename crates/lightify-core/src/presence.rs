//! Presence reconciliation across enumeration scans.
//!
//! The gateway never announces that a device went away; it simply stops
//! listing it. [`PresenceRegistry`] turns a sequence of complete scans into
//! lifecycle events with a single-generation mark and sweep:
//!
//! 1. every identity in the scan is stamped with the current generation,
//!    emitting [`PresenceEvent::Discovered`] the first time it is seen and
//!    [`PresenceEvent::Recovered`] when it returns after being lost;
//! 2. every identity whose stamp is older than the current generation is
//!    swept: [`PresenceEvent::Lost`] if the caller still has a live thing for
//!    it, [`PresenceEvent::Forgotten`] (and removed) otherwise;
//! 3. the generation advances.
//!
//! With the default grace of zero scans an identity is declared lost after
//! exactly one scan it was missing from.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, trace};

/// A lifecycle transition produced by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PresenceEvent<K, S> {
    /// An identity never seen before appeared.
    Discovered { id: K, state: S },
    /// A lost identity appeared again.
    Recovered { id: K, state: S },
    /// An identity with a live thing was missing from the scan.
    Lost { id: K },
    /// An identity without a live thing was missing and has been dropped.
    Forgotten { id: K },
}

impl<K, S> PresenceEvent<K, S> {
    /// Returns the identity the event is about.
    pub fn id(&self) -> &K {
        match self {
            Self::Discovered { id, .. }
            | Self::Recovered { id, .. }
            | Self::Lost { id }
            | Self::Forgotten { id } => id,
        }
    }

    /// Returns the short name of the transition.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Discovered { .. } => "discovered",
            Self::Recovered { .. } => "recovered",
            Self::Lost { .. } => "lost",
            Self::Forgotten { .. } => "forgotten",
        }
    }
}

/// Registry bookkeeping for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Generation of the last scan that listed the identity.
    pub generation: u64,
    /// False once the identity has been reported lost.
    pub online: bool,
}

/// Generation-stamped registry for one kind of scan (devices or groups).
///
/// A registry belongs to exactly one gateway connection and is driven by the
/// single loop that delivers its scan results.
#[derive(Debug, Clone)]
pub struct PresenceRegistry<K> {
    entries: BTreeMap<K, RegistryEntry>,
    generation: u64,
    grace_scans: u64,
}

impl<K: Ord + Clone + fmt::Debug> Default for PresenceRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone + fmt::Debug> PresenceRegistry<K> {
    /// Creates an empty registry at generation 0.
    pub fn new() -> Self {
        Self::with_grace(0)
    }

    /// Creates a registry that tolerates `grace_scans` consecutive misses
    /// before sweeping an identity.
    pub fn with_grace(grace_scans: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            generation: 0,
            grace_scans,
        }
    }

    /// Returns the generation the next scan will be stamped with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the number of scans an identity may be missing from before it
    /// is swept.
    pub fn grace_scans(&self) -> u64 {
        self.grace_scans
    }

    /// Returns the entry for an identity.
    pub fn get(&self, id: &K) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    /// Returns true if the identity is known and not currently lost.
    pub fn is_online(&self, id: &K) -> bool {
        self.entries.get(id).is_some_and(|entry| entry.online)
    }

    /// Returns the number of tracked identities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no identities are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over tracked identities in order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &RegistryEntry)> {
        self.entries.iter()
    }

    /// Applies one complete scan and returns the resulting transitions.
    ///
    /// `has_thing` reports whether the presentation side still holds a live
    /// object for an identity; it decides between lost and forgotten. The
    /// registry is fully updated before the events are returned.
    pub fn reconcile<S, I, F>(&mut self, scan: I, has_thing: F) -> Vec<PresenceEvent<K, S>>
    where
        I: IntoIterator<Item = (K, S)>,
        F: Fn(&K) -> bool,
    {
        let current = self.generation;
        let mut events = Vec::new();

        for (id, state) in scan {
            match self.entries.get_mut(&id) {
                None => {
                    debug!(id = ?id, generation = current, "Discovered");
                    self.entries.insert(
                        id.clone(),
                        RegistryEntry {
                            generation: current,
                            online: true,
                        },
                    );
                    events.push(PresenceEvent::Discovered { id, state });
                }
                Some(entry) => {
                    entry.generation = current;
                    if !entry.online {
                        debug!(id = ?id, generation = current, "Recovered");
                        entry.online = true;
                        events.push(PresenceEvent::Recovered { id, state });
                    }
                }
            }
        }

        let mut forgotten = Vec::new();
        for (id, entry) in self.entries.iter_mut() {
            if current - entry.generation <= self.grace_scans {
                continue;
            }
            if has_thing(id) {
                if entry.online {
                    debug!(id = ?id, last_seen = entry.generation, "Lost");
                    entry.online = false;
                    events.push(PresenceEvent::Lost { id: id.clone() });
                }
            } else {
                forgotten.push(id.clone());
            }
        }
        for id in forgotten {
            debug!(id = ?id, "Forgotten");
            self.entries.remove(&id);
            events.push(PresenceEvent::Forgotten { id });
        }

        self.generation += 1;
        trace!(
            generation = self.generation,
            tracked = self.entries.len(),
            events = events.len(),
            "Scan reconciled"
        );
        events
    }
}
