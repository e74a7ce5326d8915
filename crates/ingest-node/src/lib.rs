//! # Ingest Node Library
//!
//! Exposes the node's modules for testing. The entry point is the
//! `ingest-node` binary.
//!
//! ## Modules
//!
//! - `config` - `NodeConfig` from defaults and `TL_*` environment variables
//! - `logging` - tracing subscriber bootstrap
//! - `transport` - pub/sub port, in-process broker, TCP line bridge
//! - `pipeline` - parse, authenticate, append
//! - `handshake` - sequence resynchronization over the transport
//! - `fanout` - committed blocks re-published on the fan-out topic
//! - `runtime` - wiring, startup and shutdown

pub mod config;
pub mod fanout;
pub mod handshake;
pub mod logging;
pub mod pipeline;
pub mod runtime;
pub mod transport;

pub use config::{ChannelConfig, ConfigError, NodeConfig};
pub use pipeline::{IngestPipeline, PipelineError};
pub use runtime::NodeRuntime;
pub use transport::{InMemoryBroker, PubSubTransport, TransportError, TransportMessage};
