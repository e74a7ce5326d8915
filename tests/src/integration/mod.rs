//! Cross-crate integration tests.

pub mod fanout;
pub mod properties;
pub mod scenarios;
