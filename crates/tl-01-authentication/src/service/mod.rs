//! Application services for reading authentication.

pub mod authenticator;
pub mod handshake;
pub mod sequence_store;

pub use authenticator::AuthenticationService;
pub use handshake::HandshakeResponder;
pub use sequence_store::SequenceStore;
