//! # Error Types
//!
//! Errors shared across subsystems.

use thiserror::Error;

/// Errors raised while turning a payload into canonical bytes or typed fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The payload is not a JSON object.
    #[error("Payload is not an object")]
    NotAnObject,

    /// A declared measurement field carries a non-numeric value.
    #[error("Measurement field '{field}' is not numeric")]
    NonNumericMeasurement { field: String },

    /// An inbound field uses a name the device snapshot reserves.
    #[error("Field '{field}' is reserved for the device snapshot")]
    ReservedField { field: String },

    /// The payload could not be parsed into a reading.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<serde_json::Error> for EncodingError {
    fn from(err: serde_json::Error) -> Self {
        EncodingError::InvalidPayload(err.to_string())
    }
}
