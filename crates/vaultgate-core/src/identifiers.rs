//! Validated identifier newtypes.
//!
//! Identifiers follow parse-don't-validate: the only public constructors
//! return `Result`, so any [`SecretId`] or [`EnvVarName`] reaching the rest
//! of the gateway is already known to be well-formed. The newtype split also
//! means a secret identifier can never be passed where an environment
//! variable name is expected, which matters here: the former is
//! caller-visible, the latter must never leave the process.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Secret identifiers are capped well below any practical need.
pub const MAX_SECRET_ID_LEN: usize = 100;

/// Validation failures for identifier parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("identifier must not be empty")]
    Empty,

    #[error("identifier is {len} characters long, maximum is 100")]
    TooLong { len: usize },

    #[error("identifier contains characters outside [A-Za-z0-9_-]")]
    InvalidSecretId,

    #[error("environment variable name must match [A-Z][A-Z0-9_]*")]
    InvalidEnvVarName,
}

/// Opaque, caller-visible handle for a secret. Never the value.
///
/// 1–100 characters drawn from `[A-Za-z0-9_-]`. Input is trimmed before
/// validation, matching how every lookup path in the gateway treats ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretId(String);

impl SecretId {
    /// Parse and validate a secret identifier.
    pub fn parse(id: impl AsRef<str>) -> Result<Self, IdError> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty);
        }
        if trimmed.len() > MAX_SECRET_ID_LEN {
            return Err(IdError::TooLong { len: trimmed.len() });
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IdError::InvalidSecretId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Construct without validation. Test helper only.
    #[doc(hidden)]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SecretId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<SecretId> for String {
    fn from(id: SecretId) -> Self {
        id.0
    }
}

impl TryFrom<String> for SecretId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

/// Name of a host environment variable holding a secret value.
///
/// `[A-Z][A-Z0-9_]*`, the conventional shell-exportable shape. This type is
/// internal to the gateway: it is deliberately *not* `Serialize`, so a
/// mapping's variable name cannot end up in a tool response or audit entry
/// by accident.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvVarName(String);

impl EnvVarName {
    /// Parse and validate an environment variable name.
    pub fn parse(name: impl AsRef<str>) -> Result<Self, IdError> {
        let trimmed = name.as_ref().trim();
        let mut chars = trimmed.chars();
        let valid_first = matches!(chars.next(), Some(c) if c.is_ascii_uppercase());
        let valid_rest =
            chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if !valid_first || !valid_rest {
            return Err(IdError::InvalidEnvVarName);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the variable name. Callers must keep it inside the process.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Construct without validation. Test helper only.
    #[doc(hidden)]
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for EnvVarName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EnvVarName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
