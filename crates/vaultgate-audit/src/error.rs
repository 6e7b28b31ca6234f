//! Audit persistence errors.

use thiserror::Error;

/// Failures while writing, reading, or cleaning up audit files.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
