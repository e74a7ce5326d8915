//! # Shared Types Crate
//!
//! Domain entities, the canonical encoder and the HMAC tag helpers used by
//! every subsystem of the telemetry ledger.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Readings, device snapshots and ledger blocks
//!   are defined once, here.
//! - **One Encoder**: `CanonicalEncoder` is the only serialization used as
//!   HMAC and content-hash input. Device tooling signs with the same code
//!   the ingest node verifies with.
//! - **Explicit Optionality**: inbound fields are `Option`s with sticky-merge
//!   semantics, never presence checks on loose maps.

pub mod canonical;
pub mod entities;
pub mod errors;
pub mod ipc;
pub mod security;

pub use canonical::{normalize_measurement, CanonicalEncoder, MEASUREMENT_DECIMALS};
pub use entities::*;
pub use errors::*;
pub use ipc::*;
pub use security::*;
