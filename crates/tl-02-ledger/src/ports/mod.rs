//! Port definitions for the ledger.

pub mod inbound;
pub mod outbound;
