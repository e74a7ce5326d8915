//! # Ledger Events
//!
//! Event types that flow through the shared bus.

use serde::{Deserialize, Serialize};
use shared_types::entities::{Block, DeviceId, TrustTier};

/// Events published to live subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum LedgerEvent {
    /// A block was durably appended. Carried verbatim.
    BlockCommitted(Block),
}

impl LedgerEvent {
    /// The device the event concerns.
    #[must_use]
    pub fn location(&self) -> &DeviceId {
        match self {
            Self::BlockCommitted(block) => &block.location,
        }
    }

    #[must_use]
    pub fn trust(&self) -> TrustTier {
        match self {
            Self::BlockCommitted(block) => block.trust,
        }
    }

    /// Ledger index of the committed block.
    #[must_use]
    pub fn index(&self) -> u64 {
        match self {
            Self::BlockCommitted(block) => block.index,
        }
    }

    /// The block, if this event carries one.
    #[must_use]
    pub fn block(&self) -> Option<&Block> {
        match self {
            Self::BlockCommitted(block) => Some(block),
        }
    }
}

/// Filter for subscribing to a subset of events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Locations to include. Empty means all.
    pub locations: Vec<DeviceId>,
    /// Trust tiers to include. Empty means all.
    pub trust: Vec<TrustTier>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific locations.
    #[must_use]
    pub fn locations(locations: Vec<DeviceId>) -> Self {
        Self {
            locations,
            trust: Vec::new(),
        }
    }

    /// Only blocks whose readings were verified.
    #[must_use]
    pub fn authenticated_only() -> Self {
        Self {
            locations: Vec::new(),
            trust: vec![TrustTier::Authenticated],
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        let location_match =
            self.locations.is_empty() || self.locations.contains(event.location());
        let trust_match = self.trust.is_empty() || self.trust.contains(&event.trust());

        location_match && trust_match
    }
}
