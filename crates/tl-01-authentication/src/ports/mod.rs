//! Port definitions for the authenticator.

pub mod inbound;
pub mod outbound;
