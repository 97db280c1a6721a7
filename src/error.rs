//! Error types for the attestation extraction core.
//!
//! Only four kinds ever reach the host: invalid input, cancellation,
//! quality rejection and internal invariant violations. Everything a later
//! cascade stage might recover from is folded into
//! [`ExtractionResult`](crate::extract::ExtractionResult) instead of being
//! raised as an error.

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during attestation processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input failed validation before extraction started.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File signature does not match the declared extension.
    #[error("File signature mismatch: declared {declared}, detected {detected}")]
    SignatureMismatch {
        /// Extension the caller declared
        declared: String,
        /// Format detected from magic bytes
        detected: String,
    },

    /// Cooperative cancellation was requested by the host.
    #[error("Processing cancelled during stage '{0}'")]
    Cancelled(String),

    /// A stage failed in a way a later stage may recover from.
    ///
    /// Never surfaced to the host; consumed by the cascade runner.
    #[error("Stage '{stage}' failed (transient): {reason}")]
    StageTransient {
        /// Stage that failed
        stage: String,
        /// Reason for the failure
        reason: String,
    },

    /// A stage is broken (misconfigured client, missing credentials).
    ///
    /// Never surfaced to the host; the stage is marked unavailable.
    #[error("Stage '{stage}' unavailable: {reason}")]
    StageFatal {
        /// Stage that is unavailable
        stage: String,
        /// Reason it cannot run
        reason: String,
    },

    /// No stage produced a result meeting any quality threshold.
    #[error("No extraction stage met its quality threshold (best confidence: {confidence:.2})")]
    QualityRejected {
        /// Confidence of the best partial result
        confidence: f64,
        /// Best partial result, attached for debugging
        partial: Box<crate::model::AttestationExtraction>,
    },

    /// A finalization invariant was violated. Always a bug.
    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),

    /// IO error while reading the input document.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error may be surfaced to the host per the propagation
    /// policy. Transient and fatal stage errors are internal only.
    pub fn is_host_visible(&self) -> bool {
        !matches!(
            self,
            Error::StageTransient { .. } | Error::StageFatal { .. }
        )
    }
}
