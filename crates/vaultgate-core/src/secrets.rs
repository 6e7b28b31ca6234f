//! Secret values and the environment-backed resolver.
//!
//! [`SecretString`] wraps a resolved value so it cannot be exposed through
//! logging or serialization: `Debug`, `Display`, and `Serialize` all emit
//! the redaction token, memory is zeroed on drop, and the value is only
//! reachable through the deliberately verbose [`SecretString::expose_secret`].
//!
//! [`SecretResolver`] is the single component permitted to read environment
//! variables in the request path, and it reads only the names declared in
//! the configuration's mappings. Values are resolved at call time and never
//! cached.

use crate::config::VaultConfig;
use crate::constants::REDACTED;
use crate::identifiers::SecretId;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secret value that cannot be accidentally exposed.
///
/// The exposed value must never be logged, interpolated into an error
/// message, or stored outside the current call stack.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Wrap a freshly resolved value.
    pub fn new(value: String) -> Self {
        Self { inner: value }
    }

    /// Expose the secret for immediate use.
    ///
    /// The method name is intentionally verbose so every access point is
    /// obvious during review.
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    /// Compare two secrets in constant time to avoid timing leaks.
    pub fn constant_time_eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.inner.as_bytes().ct_eq(other.inner.as_bytes()).into()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

// Serializes as the redaction token so a secret embedded in any larger
// structure cannot leak through JSON output.
impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(REDACTED)
    }
}

/// Availability of a secret at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// No mapping exists for the identifier.
    Unknown,
    /// A mapping exists but the environment variable is not set.
    Unset,
    /// The environment variable is set to the empty string.
    Empty,
    /// The environment variable holds a non-empty value.
    Available,
}

/// Resolves secret identifiers to values via the configured mappings.
#[derive(Clone)]
pub struct SecretResolver {
    config: Arc<VaultConfig>,
}

impl SecretResolver {
    pub fn new(config: Arc<VaultConfig>) -> Self {
        Self { config }
    }

    /// All configured secret identifiers, sorted.
    pub fn list_secret_ids(&self) -> Vec<SecretId> {
        let mut ids: Vec<SecretId> = self
            .config
            .mappings
            .iter()
            .map(|m| m.secret_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Whether a mapping exists and its variable holds a non-empty value
    /// right now. Unknown identifiers are simply unavailable.
    pub fn is_available(&self, secret_id: &str) -> bool {
        self.availability(secret_id) == Availability::Available
    }

    /// Fine-grained availability, used by the dispatcher to distinguish
    /// `unknown_secret` from `missing_env`.
    pub fn availability(&self, secret_id: &str) -> Availability {
        let Some(mapping) = self.config.mapping(secret_id) else {
            return Availability::Unknown;
        };
        match std::env::var(mapping.env_var.as_str()) {
            Ok(value) if !value.is_empty() => Availability::Available,
            Ok(_) => Availability::Empty,
            Err(_) => Availability::Unset,
        }
    }

    /// Resolve the current value for an identifier.
    ///
    /// Returns `None` for unknown identifiers and unset or empty variables;
    /// never logs, never caches.
    pub fn resolve_value(&self, secret_id: &str) -> Option<SecretString> {
        let mapping = self.config.mapping(secret_id)?;
        match std::env::var(mapping.env_var.as_str()) {
            Ok(value) if !value.is_empty() => Some(SecretString::new(value)),
            _ => None,
        }
    }

    /// Human description from the mapping, if any.
    pub fn description(&self, secret_id: &str) -> Option<&str> {
        self.config
            .mapping(secret_id)
            .and_then(|m| m.description.as_deref())
    }
}
