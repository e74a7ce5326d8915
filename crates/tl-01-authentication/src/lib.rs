//! # Reading Authentication (tl-01)
//!
//! Decides whether a reading from a field device may reach the ledger.
//!
//! ## Verification Order
//!
//! ```text
//! payload ──▶ credentials present? ──▶ seq >= expected? ──▶ HMAC matches?
//!                  │ no                     │ no                 │ no
//!            MissingCredentials       ReplaySuspected      SignatureInvalid
//!                                                              │ yes
//!                                          expected = seq + 1, persisted ──▶ Accepted
//! ```
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Monotonic Sequence | `expected(device)` never decreases |
//! | 2 | Durable Before Accept | The advanced sequence is persisted before `Accepted` is returned |
//! | 3 | Per-Device Serialization | Check, verify and advance for one device never interleave |
//! | 4 | Constant-Time Tags | Tag comparison goes through `Mac::verify_slice` |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Configuration, rejection taxonomy, credential extraction
//! - `ports/` - `AuthenticatorApi` / `HandshakeApi` (inbound), `SequencePersistence` (outbound)
//! - `adapters/` - In-memory and JSON-file sequence persistence
//! - `service/` - `SequenceStore`, `AuthenticationService`, `HandshakeResponder`
//!
//! ## Usage
//!
//! ```ignore
//! use tl_01_authentication::{AuthConfig, AuthenticationService, SequenceStore};
//! use tl_01_authentication::adapters::FileSequencePersistence;
//!
//! let store = SequenceStore::load(FileSequencePersistence::new(dir.join("sequences.json"))).await?;
//! let auth = AuthenticationService::new(AuthConfig::new(secret), Arc::new(store));
//!
//! match auth.verify(&device, &payload).await {
//!     Ok(accepted) => { /* hand to the ledger */ }
//!     Err(e) => tracing::warn!(reason = %e, "Reading rejected"),
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use domain::config::AuthConfig;
pub use domain::credentials::{Credentials, MAX_SEQ};
pub use domain::errors::{AuthError, AuthRejection, SequenceStoreError};
pub use ports::inbound::{Accepted, AuthenticatorApi, HandshakeApi};
pub use ports::outbound::SequencePersistence;
pub use service::{AuthenticationService, HandshakeResponder, SequenceStore};
