//! Domain layer for reading authentication.

pub mod config;
pub mod credentials;
pub mod errors;
