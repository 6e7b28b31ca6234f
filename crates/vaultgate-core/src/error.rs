//! Gateway error taxonomy.
//!
//! Policy, validation, and rate-limit outcomes are first-class values: they
//! feed audit decisions and normal response paths, so they are modeled as
//! `Result` returns rather than panics. Every externally visible failure
//! maps onto exactly one [`ErrorCode`] from the closed set below.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Closed set of error codes visible to callers.
///
/// This enum is the single source of truth for the external taxonomy; the
/// dispatcher maps every internal failure through [`GatewayError::code`] and
/// anything unclassified falls back to [`ErrorCode::ExecutionFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnknownSecret,
    NoPolicy,
    PolicyExpired,
    ForbiddenAction,
    ForbiddenDomain,
    RateLimited,
    InvalidRequest,
    InvalidUrl,
    InvalidHeaders,
    InvalidMethod,
    InvalidInjectionType,
    InvalidRateLimit,
    MissingEnv,
    Timeout,
    ExecutionFailed,
    UnknownTool,
}

impl ErrorCode {
    /// Wire form of the code, as it appears in error envelopes and audit
    /// `reason` strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnknownSecret => "unknown_secret",
            ErrorCode::NoPolicy => "no_policy",
            ErrorCode::PolicyExpired => "policy_expired",
            ErrorCode::ForbiddenAction => "forbidden_action",
            ErrorCode::ForbiddenDomain => "forbidden_domain",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::InvalidUrl => "invalid_url",
            ErrorCode::InvalidHeaders => "invalid_headers",
            ErrorCode::InvalidMethod => "invalid_method",
            ErrorCode::InvalidInjectionType => "invalid_injection_type",
            ErrorCode::InvalidRateLimit => "invalid_rate_limit",
            ErrorCode::MissingEnv => "missing_env",
            ErrorCode::Timeout => "timeout",
            ErrorCode::ExecutionFailed => "execution_failed",
            ErrorCode::UnknownTool => "unknown_tool",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised anywhere along the request-mediation pipeline.
///
/// Messages may embed caller-supplied strings; the dispatcher sanitizes
/// every message before it crosses the trust boundary. Secret values and
/// environment variable names must never be interpolated here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("Unknown secret: {secret_id}")]
    UnknownSecret { secret_id: String },

    #[error("No policy configured for secret: {secret_id}")]
    NoPolicy { secret_id: String },

    #[error("Policy expired for secret: {secret_id}")]
    PolicyExpired { secret_id: String },

    #[error("Action not allowed: {action}")]
    ForbiddenAction { action: String },

    #[error("Domain not allowed: {domain}")]
    ForbiddenDomain { domain: String },

    #[error("Rate limit exceeded for secret: {secret_id}")]
    RateLimited { secret_id: String, reset_at: i64 },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Invalid URL: {reason}")]
    InvalidUrl { reason: String },

    #[error("Invalid headers: {reason}")]
    InvalidHeaders { reason: String },

    #[error("Invalid HTTP method: {method}")]
    InvalidMethod { method: String },

    #[error("Invalid injection type: {injection}")]
    InvalidInjectionType { injection: String },

    #[error("Invalid rate limit: {reason}")]
    InvalidRateLimit { reason: String },

    #[error("Environment variable for secret {secret_id} is empty")]
    MissingEnv { secret_id: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Execution failed: {reason}")]
    ExecutionFailed { reason: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    /// A structured denial carrying its own code, produced when a policy
    /// or limiter decision is converted into an error for the dispatcher.
    #[error("{message}")]
    Denied { code: ErrorCode, message: String },
}

impl GatewayError {
    /// Map this error onto its external code.
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::UnknownSecret { .. } => ErrorCode::UnknownSecret,
            GatewayError::NoPolicy { .. } => ErrorCode::NoPolicy,
            GatewayError::PolicyExpired { .. } => ErrorCode::PolicyExpired,
            GatewayError::ForbiddenAction { .. } => ErrorCode::ForbiddenAction,
            GatewayError::ForbiddenDomain { .. } => ErrorCode::ForbiddenDomain,
            GatewayError::RateLimited { .. } => ErrorCode::RateLimited,
            GatewayError::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            GatewayError::InvalidUrl { .. } => ErrorCode::InvalidUrl,
            GatewayError::InvalidHeaders { .. } => ErrorCode::InvalidHeaders,
            GatewayError::InvalidMethod { .. } => ErrorCode::InvalidMethod,
            GatewayError::InvalidInjectionType { .. } => ErrorCode::InvalidInjectionType,
            GatewayError::InvalidRateLimit { .. } => ErrorCode::InvalidRateLimit,
            GatewayError::MissingEnv { .. } => ErrorCode::MissingEnv,
            GatewayError::Timeout => ErrorCode::Timeout,
            GatewayError::ExecutionFailed { .. } => ErrorCode::ExecutionFailed,
            GatewayError::UnknownTool { .. } => ErrorCode::UnknownTool,
            GatewayError::Denied { code, .. } => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_wire_form_is_snake_case() {
        assert_eq!(ErrorCode::ForbiddenDomain.as_str(), "forbidden_domain");
        assert_eq!(ErrorCode::InvalidRateLimit.as_str(), "invalid_rate_limit");
        assert_eq!(ErrorCode::UnknownTool.as_str(), "unknown_tool");
    }

    #[test]
    fn test_code_serializes_like_as_str() {
        let json = serde_json::to_string(&ErrorCode::PolicyExpired).unwrap();
        assert_eq!(json, "\"policy_expired\"");
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorCode::PolicyExpired);
    }

    #[test]
    fn test_error_maps_to_code() {
        let err = GatewayError::RateLimited {
            secret_id: "gh".to_string(),
            reset_at: 0,
        };
        assert_eq!(err.code(), ErrorCode::RateLimited);

        let err = GatewayError::ExecutionFailed {
            reason: "upstream closed the connection".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::ExecutionFailed);
    }
}
