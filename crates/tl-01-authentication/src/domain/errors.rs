//! # Domain Errors
//!
//! Rejection taxonomy and failure modes of the authenticator.
//!
//! A rejection is an expected outcome for hostile or stale traffic and is
//! logged at `warn`. A persistence failure is an operational fault and is
//! logged at `error`.

use shared_types::EncodingError;
use thiserror::Error;

/// Why a reading was refused before reaching the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthRejection {
    /// `seq` or `hmac` is absent.
    #[error("Missing credentials: {missing}")]
    MissingCredentials { missing: &'static str },

    /// `seq` is below the next expected value for this device.
    #[error("Replay suspected: seq {received} < expected {expected}")]
    ReplaySuspected { expected: u64, received: u64 },

    /// The recomputed tag does not match the supplied one.
    #[error("Signature invalid")]
    SignatureInvalid,
}

impl AuthRejection {
    /// Short machine-friendly reason for log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthRejection::MissingCredentials { .. } => "MissingCredentials",
            AuthRejection::ReplaySuspected { .. } => "ReplaySuspected",
            AuthRejection::SignatureInvalid => "SignatureInvalid",
        }
    }
}

/// Errors from sequence persistence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceStoreError {
    /// Reading or writing the backing file failed.
    #[error("Sequence store I/O error: {message}")]
    Io { message: String },

    /// The persisted record could not be decoded. Starting from zero
    /// instead would reopen every replay window, so this is fatal.
    #[error("Sequence store corrupt: {message}")]
    Corrupt { message: String },
}

impl From<std::io::Error> for SequenceStoreError {
    fn from(err: std::io::Error) -> Self {
        SequenceStoreError::Io {
            message: err.to_string(),
        }
    }
}

/// Any failure of `AuthenticatorApi::verify`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error(transparent)]
    Rejected(#[from] AuthRejection),

    /// The payload could not be canonically encoded or `seq` is not an
    /// unsigned integer.
    #[error("Malformed message: {0}")]
    Malformed(#[from] EncodingError),

    /// The advanced sequence could not be persisted. The reading is not
    /// accepted and the in-memory value is rolled back.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] SequenceStoreError),
}

impl AuthError {
    /// Whether this is an authentication rejection (as opposed to a fault).
    pub fn is_rejection(&self) -> bool {
        matches!(self, AuthError::Rejected(_))
    }

    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::Rejected(r) => r.reason(),
            AuthError::Malformed(_) => "MalformedMessage",
            AuthError::PersistenceFailure(_) => "PersistenceFailure",
        }
    }
}
