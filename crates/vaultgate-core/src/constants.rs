//! Shared vocabularies and fixed protocol constants.
//!
//! Every closed set consulted by more than one component lives here so that
//! the validator, sanitizer, evaluator, and executor cannot drift apart.

/// Replacement token emitted wherever sensitive data is scrubbed.
pub const REDACTED: &str = "[REDACTED]";

/// Fixed user-agent attached to every outbound request.
pub const USER_AGENT: &str = concat!("vaultgate/", env!("CARGO_PKG_VERSION"));

/// The only configuration document version this gateway accepts.
pub const CONFIG_VERSION: &str = "1.0.0";

/// Default configuration file name looked up by the CLI.
pub const DEFAULT_CONFIG_FILE: &str = "vault.config.json";

/// Fixed message for domains that attempt wildcard or pattern matching.
pub const WILDCARD_MESSAGE: &str = "Wildcards not allowed. Use exact FQDNs only";

/// Deadline for a single outbound HTTP call.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upstream response bodies are cut off past this many bytes.
pub const MAX_RESPONSE_BODY_BYTES: usize = 10_000;

/// Marker appended to a truncated response body.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Response headers allowed to pass back to the caller, lowercased.
///
/// Anything not named here is dropped before the response leaves the
/// executor. Notably absent: `location` (redirects are surfaced but never
/// followed, and their targets are withheld) and `set-cookie`.
pub const RESPONSE_HEADER_ALLOWLIST: &[&str] = &[
    "content-type",
    "content-length",
    "date",
    "etag",
    "cache-control",
    "x-request-id",
    "x-rate-limit-remaining",
    "x-rate-limit-reset",
];

/// Object keys whose values are always redacted by the structured sanitizer,
/// and the key names matched by the `key=value` text pattern.
pub const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "auth",
    "authorization",
    "bearer",
    "credential",
    "credentials",
    "client_secret",
    "private_key",
    "access_token",
    "refresh_token",
];

/// Keys that look sensitive but are opaque handles, never values.
///
/// `secretId` and friends are the caller-visible identifiers this gateway
/// exists to hand out; redacting them would make every response useless.
pub const IDENTIFIER_KEYS: &[&str] = &["secretid", "secret_id", "secrets"];

/// Recursion ceiling for the structured sanitizer walk.
pub const SANITIZE_MAX_DEPTH: usize = 10;

/// Audit file naming scheme: `audit-<timestamp>.jsonl`.
pub const AUDIT_FILE_PREFIX: &str = "audit-";
/// File extension for audit logs.
pub const AUDIT_FILE_EXTENSION: &str = ".jsonl";
/// Timestamp layout inside audit file names (colons are not filesystem-safe).
pub const AUDIT_FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%3fZ";

/// Audit query pagination bounds.
pub const AUDIT_DEFAULT_PAGE_SIZE: i64 = 50;
/// Upper clamp for `pageSize`.
pub const AUDIT_MAX_PAGE_SIZE: i64 = 500;
