// src/coordinator/registry.rs
//! Registry of discovered sources.
//!
//! A slot is reserved under the lock before any I/O happens, so two
//! announcements for the same source can never both pass the check.

use metrics::gauge;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::task::JoinHandle;

use super::ingestor::IngestSummary;
use crate::types::SourceId;

#[derive(Debug)]
enum Slot {
    /// Reserved; the ingestion stream is still being opened.
    Pending,
    Active(JoinHandle<IngestSummary>),
}

#[derive(Debug, Default)]
pub struct SourceRegistry {
    slots: Mutex<HashMap<SourceId, Slot>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically check-and-reserve. `false` means the source is already known.
    pub fn try_reserve(&self, id: &SourceId) -> bool {
        let mut slots = self.slots.lock();
        if slots.contains_key(id) {
            return false;
        }
        slots.insert(id.clone(), Slot::Pending);
        gauge!("fleet_sources_registered").set(slots.len() as f64);
        true
    }

    /// Attach the ingestor handle to a reserved slot.
    /// Returns the handle back if the slot vanished meanwhile.
    pub fn activate(
        &self,
        id: &SourceId,
        handle: JoinHandle<IngestSummary>,
    ) -> Result<(), JoinHandle<IngestSummary>> {
        match self.slots.lock().get_mut(id) {
            Some(slot) => {
                *slot = Slot::Active(handle);
                Ok(())
            }
            None => Err(handle),
        }
    }

    /// Drop a slot so a later announcement can retry from scratch.
    pub fn release(&self, id: &SourceId) -> bool {
        let mut slots = self.slots.lock();
        let removed = slots.remove(id).is_some();
        gauge!("fleet_sources_registered").set(slots.len() as f64);
        removed
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.slots.lock().contains_key(id)
    }

    pub fn is_active(&self, id: &SourceId) -> bool {
        matches!(self.slots.lock().get(id), Some(Slot::Active(_)))
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Known identifiers, sorted.
    pub fn ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = self.slots.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Take every ingestor handle out for shutdown. Entries stay registered.
    pub(crate) fn take_handles(&self) -> Vec<(SourceId, JoinHandle<IngestSummary>)> {
        let mut slots = self.slots.lock();
        let mut out = Vec::new();
        for (id, slot) in slots.iter_mut() {
            if !matches!(slot, Slot::Active(_)) {
                continue;
            }
            if let Slot::Active(h) = std::mem::replace(slot, Slot::Pending) {
                out.push((id.clone(), h));
            }
        }
        out
    }
}
