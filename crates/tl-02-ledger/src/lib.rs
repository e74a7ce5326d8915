//! # Telemetry Ledger (tl-02)
//!
//! Hash-linked, append-only record of every accepted reading. Each block
//! carries the device's full sticky snapshot, so any single block tells
//! the complete last-known state of its location.
//!
//! ## Append Path
//!
//! ```text
//! (device, trust, reading)
//!        │
//!        ▼
//!  single writer: tail ──▶ merge snapshot ──▶ hash ──▶ tail unchanged? ──▶ store.append
//!                                                          │ no                │
//!                                                       retry once        commit snapshot
//!                                                                              │
//!                                                                   CommitObserver (fan-out)
//! ```
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Contiguous Indices | Block indices run 0, 1, 2, ... with no gaps |
//! | 2 | Hash Linking | `previousHash` of block n equals `hash` of block n-1; block 0 links to `GENESIS_HASH` |
//! | 3 | Content Hash | `hash` is SHA-256 over the canonical encoding of the block's other fields |
//! | 4 | Single Writer | All appends, for all devices, are serialized |
//! | 5 | Commit Before Fan-Out | Observers only see durably stored blocks, in index order |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Hashing, chain verification, device snapshots, errors
//! - `ports/` - `LedgerApi` (inbound), `LedgerStore` / `CommitObserver` / `TimeSource` (outbound)
//! - `adapters/` - JSON-lines file store, in-memory store, event-bus observer, data-dir lock
//! - `service/` - `LedgerService` and its writer task

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use domain::block::{build_next, compute_hash, recompute_hash};
pub use domain::chain::{verify_chain, ChainSummary, ChainVerifier};
pub use domain::config::{LedgerConfig, DEFAULT_QUEUE_CAPACITY, MAX_APPEND_ATTEMPTS};
pub use domain::errors::{ChainViolation, LedgerError, LedgerStoreError};
pub use domain::state::DeviceStates;
pub use ports::inbound::LedgerApi;
pub use ports::outbound::{CommitObserver, LedgerStore, NoopObserver, SystemTimeSource, TimeSource};
pub use service::{LedgerDependencies, LedgerService};
