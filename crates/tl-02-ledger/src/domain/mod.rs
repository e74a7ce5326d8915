//! Domain layer for the ledger: pure block construction, chain
//! verification and device state bookkeeping.

pub mod block;
pub mod chain;
pub mod config;
pub mod errors;
pub mod state;
