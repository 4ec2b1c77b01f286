//! In-memory table of the latest known vector per `(device, name)`.
//!
//! The registry is only ever touched from the caller's thread; the
//! receive worker posts snapshots to a queue and the client merges them
//! in here, so the table itself needs no lock.

use std::collections::{HashMap, HashSet};

use indi_protocol::PropertyVector;

#[derive(Debug, Default)]
pub(crate) struct Registry {
    vectors: HashMap<(String, String), PropertyVector>,
    /// Pairs whose define handler already fired.
    defined: HashSet<(String, String)>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Merge a received snapshot: an existing entry absorbs it in place
    /// (metadata wholesale, element values by name, preserving element
    /// identity and change flags), a new pair is inserted as-is. Vectors
    /// are superseded, never removed.
    pub(crate) fn merge(&mut self, incoming: PropertyVector) {
        let key = (incoming.device().to_string(), incoming.name().to_string());
        match self.vectors.get_mut(&key) {
            Some(existing) => existing.update_from(&incoming),
            None => {
                self.vectors.insert(key, incoming);
            }
        }
    }

    pub(crate) fn get(&self, device: &str, name: &str) -> Option<&PropertyVector> {
        self.vectors.get(&(device.to_string(), name.to_string()))
    }

    pub(crate) fn get_mut(&mut self, device: &str, name: &str) -> Option<&mut PropertyVector> {
        self.vectors.get_mut(&(device.to_string(), name.to_string()))
    }

    /// Record that a define handler fired for the pair. Returns `true`
    /// only the first time.
    pub(crate) fn mark_defined(&mut self, device: &str, name: &str) -> bool {
        self.defined.insert((device.to_string(), name.to_string()))
    }

    pub(crate) fn vectors(&self) -> impl Iterator<Item = &PropertyVector> {
        self.vectors.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.vectors.len()
    }
}
