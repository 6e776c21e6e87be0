//! Error taxonomy for the resize pipeline

use crate::models::ResourceKind;
use crate::quantity::QuantityError;
use thiserror::Error;

/// Failures of a read-merge-build-apply pipeline run
///
/// Every variant terminates the request at the stage that produced it;
/// nothing is retried internally.
#[derive(Debug, Error)]
pub enum ResizeError {
    /// A client-supplied override could not be parsed
    #[error("Invalid {kind} value {raw:?}: {source}")]
    InvalidQuantity {
        kind: ResourceKind,
        raw: String,
        #[source]
        source: QuantityError,
    },

    /// The request body was not a valid override document
    #[error("Error decoding request body: {0}")]
    Decode(String),

    /// The target workload, or its container list, does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The orchestrator API could not be reached or refused the read
    #[error("Orchestrator request failed: {0}")]
    Transient(String),

    /// The orchestrator rejected the patch
    #[error("Failed to apply patch: {reason}")]
    Apply { reason: String },

    /// The live object carries a quantity this service cannot interpret
    #[error("Workload reports malformed {name} quantity {raw:?}")]
    MalformedLiveQuantity { name: String, raw: String },
}

impl ResizeError {
    /// True for errors caused by the caller's input (HTTP 400)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ResizeError::InvalidQuantity { .. } | ResizeError::Decode(_)
        )
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            ResizeError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            ResizeError::Decode(_) => "DECODE_ERROR",
            ResizeError::NotFound(_) => "NOT_FOUND",
            ResizeError::Transient(_) | ResizeError::MalformedLiveQuantity { .. } => {
                "ORCHESTRATOR_ERROR"
            }
            ResizeError::Apply { .. } => "APPLY_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ResizeError>;
