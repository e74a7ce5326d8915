//! Per-device sticky state, owned by the ledger writer.

use shared_types::{Block, DeviceId, DeviceState};
use std::collections::HashMap;

/// Last committed snapshot for every device.
#[derive(Debug, Clone, Default)]
pub struct DeviceStates {
    states: HashMap<DeviceId, DeviceState>,
}

impl DeviceStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored blocks: the highest-index block per location wins.
    pub fn recover<'a, I>(blocks: I) -> Self
    where
        I: IntoIterator<Item = &'a Block>,
    {
        let mut recovery = Recovery::default();
        for block in blocks {
            recovery.observe(block);
        }
        recovery.finish()
    }

    /// Snapshot for `device`, empty if never committed.
    pub fn get(&self, device: &DeviceId) -> DeviceState {
        self.states.get(device).cloned().unwrap_or_default()
    }

    /// Replace the snapshot after a successful commit.
    pub fn commit(&mut self, device: &DeviceId, state: DeviceState) {
        self.states.insert(device.clone(), state);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Streaming form of [`DeviceStates::recover`], fed one block at a time.
#[derive(Debug, Default)]
pub struct Recovery {
    latest: HashMap<DeviceId, (u64, DeviceState)>,
}

impl Recovery {
    pub fn observe(&mut self, block: &Block) {
        let newer = self
            .latest
            .get(&block.location)
            .map_or(true, |(index, _)| block.index > *index);
        if newer {
            self.latest
                .insert(block.location.clone(), (block.index, block.data.clone()));
        }
    }

    pub fn finish(self) -> DeviceStates {
        DeviceStates {
            states: self
                .latest
                .into_iter()
                .map(|(device, (_, state))| (device, state))
                .collect(),
        }
    }
}
