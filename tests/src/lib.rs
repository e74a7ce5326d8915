//! # Telemetry Ledger Test Suite
//!
//! Cross-crate tests that need more than one subsystem.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # In-memory node harness, signed readings
//! └── integration/
//!     ├── scenarios.rs  # Cafeteria/fablab end-to-end scenarios
//!     ├── properties.rs # Randomized checks of the pipeline's guarantees
//!     └── fanout.rs     # Live delivery order and recovery via range reads
//! tests/benches/
//! └── pipeline_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p tl-tests
//! cargo test -p tl-tests integration::scenarios::
//! cargo bench -p tl-tests
//! ```

pub mod fixtures;
pub mod integration;
