//! Adapters for the ledger's outbound ports.

pub mod bus;
pub mod file;
#[cfg(feature = "locking")]
pub mod lock;
pub mod memory;

pub use bus::EventBusObserver;
pub use file::JsonLinesLedgerStore;
#[cfg(feature = "locking")]
pub use lock::DataDirLock;
pub use memory::InMemoryLedgerStore;
