//! MCP transport error types.

use thiserror::Error;

/// MCP operation result type.
pub type McpResult<T> = Result<T, McpError>;

/// Errors raised while serving the MCP transport. Tool-level failures are
/// not errors at this layer: they travel inside the response envelope.
#[derive(Debug, Error)]
pub enum McpError {
    /// Server failed to start or crashed.
    #[error("Server error: {0}")]
    ServerError(String),

    /// Transport-level failure on stdio.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
