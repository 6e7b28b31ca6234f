//! Configuration model and validator.
//!
//! Two families of types live here. The `Raw*` structs mirror the untrusted
//! JSON document exactly as it arrives from disk; the validated structs
//! ([`VaultConfig`] and friends) are what the rest of the gateway consumes.
//! [`RawConfig::validate`] is the only way to produce a [`VaultConfig`], so
//! holding one is proof the document passed every rule. Validation collects
//! every violation and reports them in a single error rather than stopping
//! at the first.
//!
//! The validator reads no environment variables and performs no network
//! I/O; availability of the mapped variables is a runtime question answered
//! by the resolver.

use crate::action::ActionKind;
use crate::constants::{CONFIG_VERSION, WILDCARD_MESSAGE};
use crate::error::{GatewayError, GatewayResult};
use crate::identifiers::{EnvVarName, SecretId};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Exact lowercase FQDNs only: dotted labels, alphabetic TLD of 2+ chars.
static FQDN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z0-9]+(-[a-z0-9]+)*\.)+[a-z]{2,}$").unwrap());

/// Domains shorter than this cannot be a real FQDN.
pub const MIN_DOMAIN_LEN: usize = 3;
/// RFC 1035 ceiling on a domain name.
pub const MAX_DOMAIN_LEN: usize = 253;

/// Untrusted configuration document, straight off the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawConfig {
    pub version: Option<String>,
    pub mappings: Vec<RawMapping>,
    pub policies: Vec<RawPolicy>,
    pub settings: Option<RawSettings>,
}

/// Untrusted mapping record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMapping {
    pub secret_id: String,
    pub env_var: String,
    pub description: Option<String>,
}

/// Untrusted policy record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPolicy {
    pub secret_id: String,
    pub allowed_actions: Vec<String>,
    pub allowed_domains: Vec<String>,
    pub rate_limit: Option<RawRateLimit>,
    pub expires_at: Option<String>,
}

/// Untrusted rate-limit tuple. Numbers arrive as JSON doubles so the
/// validator can reject non-integers explicitly instead of silently
/// coercing them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRateLimit {
    pub requests: Option<f64>,
    pub window_seconds: Option<f64>,
}

/// Untrusted settings block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSettings {
    pub audit_dir: Option<String>,
    pub max_file_size_mb: Option<f64>,
    pub max_file_age_days: Option<f64>,
    pub default_rate_limit: Option<RawRateLimit>,
}

/// A validated pairing of a secret identifier with an environment variable.
///
/// The variable's *value* is never stored here; availability is queried on
/// demand by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretMapping {
    pub secret_id: SecretId,
    pub env_var: EnvVarName,
    pub description: Option<String>,
}

// Hand-written so the config document round-trips while `EnvVarName` itself
// stays non-serializable everywhere else.
impl Serialize for SecretMapping {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let fields = 2 + usize::from(self.description.is_some());
        let mut state = serializer.serialize_struct("SecretMapping", fields)?;
        state.serialize_field("secretId", self.secret_id.as_str())?;
        state.serialize_field("envVar", self.env_var.as_str())?;
        if let Some(description) = &self.description {
            state.serialize_field("description", description)?;
        }
        state.end()
    }
}

/// A validated sliding-window budget: `requests` per `window_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub requests: u32,
    pub window_seconds: u64,
}

/// The validated per-identifier rules gating `use_secret`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub secret_id: SecretId,
    pub allowed_actions: Vec<ActionKind>,
    pub allowed_domains: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Policy {
    /// Whether this policy allows the given action.
    pub fn allows_action(&self, action: ActionKind) -> bool {
        self.allowed_actions.contains(&action)
    }

    /// Whether this policy allows the given domain. Bytewise equality
    /// against the stored lowercase set; `sub.api.example.com` does not
    /// match an allowance for `api.example.com`.
    pub fn allows_domain(&self, domain: &str) -> bool {
        let lowered = domain.trim().to_lowercase();
        self.allowed_domains.iter().any(|d| *d == lowered)
    }

    /// Whether the policy has expired as of `now`. Equality is expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Validated settings: audit directory, rotation thresholds, and the
/// fallback rate limit applied when a policy carries none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultSettings {
    pub audit_dir: PathBuf,
    pub max_file_size_mb: u64,
    pub max_file_age_days: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_rate_limit: Option<RateLimit>,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            audit_dir: PathBuf::from("./audit"),
            max_file_size_mb: 10,
            max_file_age_days: 7,
            default_rate_limit: None,
        }
    }
}

/// The deeply-immutable root configuration, loaded once at startup.
///
/// No component mutates this after validation; it is shared behind an `Arc`
/// for the process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    pub version: String,
    pub mappings: Vec<SecretMapping>,
    pub policies: Vec<Policy>,
    pub settings: VaultSettings,
}

impl VaultConfig {
    /// Parse and validate a configuration document from JSON text.
    pub fn from_json(text: &str) -> GatewayResult<Self> {
        let raw: RawConfig =
            serde_json::from_str(text).map_err(|e| GatewayError::InvalidRequest {
                reason: format!("configuration is not a valid document: {e}"),
            })?;
        raw.validate()
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> GatewayResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GatewayError::InvalidRequest {
            reason: format!("cannot read configuration {}: {}", path.display(), e.kind()),
        })?;
        Self::from_json(&text)
    }

    /// Look up a mapping by trimmed secret identifier.
    pub fn mapping(&self, secret_id: &str) -> Option<&SecretMapping> {
        let trimmed = secret_id.trim();
        self.mappings.iter().find(|m| m.secret_id.as_str() == trimmed)
    }

    /// Look up a policy by trimmed secret identifier.
    pub fn policy(&self, secret_id: &str) -> Option<&Policy> {
        let trimmed = secret_id.trim();
        self.policies.iter().find(|p| p.secret_id.as_str() == trimmed)
    }

    /// The rate limit applying to a secret: its policy's own limit if set,
    /// otherwise the settings default, otherwise none.
    pub fn rate_limit_for(&self, secret_id: &str) -> Option<RateLimit> {
        self.policy(secret_id)
            .and_then(|p| p.rate_limit)
            .or(self.settings.default_rate_limit)
    }
}

impl RawConfig {
    /// Validate the untrusted document, returning the immutable runtime
    /// configuration or a single error enumerating every violation.
    pub fn validate(self) -> GatewayResult<VaultConfig> {
        let mut violations: Vec<String> = Vec::new();

        let version = match &self.version {
            Some(v) if v == CONFIG_VERSION => v.clone(),
            Some(v) => {
                violations.push(format!(
                    "unsupported version \"{v}\", expected \"{CONFIG_VERSION}\""
                ));
                String::new()
            }
            None => {
                violations.push(format!("missing version, expected \"{CONFIG_VERSION}\""));
                String::new()
            }
        };

        let mut mappings = Vec::with_capacity(self.mappings.len());
        let mut seen_mapping_ids: HashSet<String> = HashSet::new();
        for (index, raw) in self.mappings.iter().enumerate() {
            let secret_id = match SecretId::parse(&raw.secret_id) {
                Ok(id) => id,
                Err(e) => {
                    violations.push(format!("mapping {index}: {e}"));
                    continue;
                }
            };
            if !seen_mapping_ids.insert(secret_id.as_str().to_string()) {
                violations.push(format!(
                    "mapping {index}: duplicate secret id \"{secret_id}\""
                ));
                continue;
            }
            let env_var = match EnvVarName::parse(&raw.env_var) {
                Ok(name) => name,
                Err(e) => {
                    violations.push(format!("mapping \"{secret_id}\": {e}"));
                    continue;
                }
            };
            mappings.push(SecretMapping {
                secret_id,
                env_var,
                description: raw.description.clone(),
            });
        }

        let mut policies = Vec::with_capacity(self.policies.len());
        let mut seen_policy_ids: HashSet<String> = HashSet::new();
        for (index, raw) in self.policies.iter().enumerate() {
            let secret_id = match SecretId::parse(&raw.secret_id) {
                Ok(id) => id,
                Err(e) => {
                    violations.push(format!("policy {index}: {e}"));
                    continue;
                }
            };
            if !seen_policy_ids.insert(secret_id.as_str().to_string()) {
                violations.push(format!(
                    "policy {index}: duplicate secret id \"{secret_id}\""
                ));
                continue;
            }

            let mut allowed_actions = Vec::new();
            for action in &raw.allowed_actions {
                match ActionKind::from_name(action) {
                    Some(kind) if !allowed_actions.contains(&kind) => {
                        allowed_actions.push(kind);
                    }
                    Some(_) => {}
                    None => violations.push(format!(
                        "policy \"{secret_id}\": unsupported action \"{action}\""
                    )),
                }
            }
            if raw.allowed_actions.is_empty() {
                violations.push(format!(
                    "policy \"{secret_id}\": allowedActions must not be empty"
                ));
            }

            let mut allowed_domains = Vec::new();
            for domain in &raw.allowed_domains {
                match normalize_domain(domain) {
                    Ok(normalized) => {
                        if !allowed_domains.contains(&normalized) {
                            allowed_domains.push(normalized);
                        }
                    }
                    Err(reason) => {
                        violations.push(format!("policy \"{secret_id}\": {reason}"));
                    }
                }
            }
            if raw.allowed_domains.is_empty() {
                violations.push(format!(
                    "policy \"{secret_id}\": allowedDomains must not be empty"
                ));
            }

            let rate_limit = match &raw.rate_limit {
                Some(raw_limit) => match validate_rate_limit(raw_limit) {
                    Ok(limit) => Some(limit),
                    Err(reason) => {
                        violations.push(format!("policy \"{secret_id}\": {reason}"));
                        None
                    }
                },
                None => None,
            };

            let expires_at = match &raw.expires_at {
                Some(text) => match DateTime::parse_from_rfc3339(text) {
                    Ok(instant) => Some(instant.with_timezone(&Utc)),
                    Err(_) => {
                        violations.push(format!(
                            "policy \"{secret_id}\": expiresAt \"{text}\" is not a valid RFC 3339 timestamp"
                        ));
                        None
                    }
                },
                None => None,
            };

            policies.push(Policy {
                secret_id,
                allowed_actions,
                allowed_domains,
                rate_limit,
                expires_at,
            });
        }

        let settings = match &self.settings {
            Some(raw) => validate_settings(raw, &mut violations),
            None => VaultSettings::default(),
        };

        if !violations.is_empty() {
            return Err(GatewayError::InvalidRequest {
                reason: violations.join("; "),
            });
        }

        Ok(VaultConfig {
            version,
            mappings,
            policies,
            settings,
        })
    }
}

/// Trim, lowercase, and validate a single domain entry.
fn normalize_domain(domain: &str) -> Result<String, String> {
    let normalized = domain.trim().to_lowercase();
    if normalized.contains(['*', '?', '[', ']'])
        || normalized.ends_with('.')
        || normalized.chars().any(char::is_whitespace)
    {
        return Err(format!("domain \"{normalized}\": {WILDCARD_MESSAGE}"));
    }
    if normalized.len() < MIN_DOMAIN_LEN || normalized.len() > MAX_DOMAIN_LEN {
        return Err(format!(
            "domain \"{normalized}\" must be between {MIN_DOMAIN_LEN} and {MAX_DOMAIN_LEN} characters"
        ));
    }
    if !FQDN_RE.is_match(&normalized) {
        return Err(format!("domain \"{normalized}\" is not a valid FQDN"));
    }
    Ok(normalized)
}

/// Both fields must be finite positive integers.
fn validate_rate_limit(raw: &RawRateLimit) -> Result<RateLimit, String> {
    let requests = validate_positive_integer(raw.requests, "rateLimit.requests")?;
    if requests > u64::from(u32::MAX) {
        return Err("rateLimit.requests is out of range".to_string());
    }
    let window_seconds = validate_positive_integer(raw.window_seconds, "rateLimit.windowSeconds")?;
    Ok(RateLimit {
        requests: requests as u32,
        window_seconds,
    })
}

fn validate_positive_integer(value: Option<f64>, field: &str) -> Result<u64, String> {
    match value {
        Some(v) if v.is_finite() && v.fract() == 0.0 && v >= 1.0 => Ok(v as u64),
        Some(v) => Err(format!("{field} must be a positive integer, got {v}")),
        None => Err(format!("{field} is required")),
    }
}

fn validate_settings(raw: &RawSettings, violations: &mut Vec<String>) -> VaultSettings {
    let defaults = VaultSettings::default();

    let audit_dir = match &raw.audit_dir {
        Some(dir) if dir.trim().is_empty() => {
            violations.push("settings.auditDir must not be blank".to_string());
            defaults.audit_dir.clone()
        }
        Some(dir) => PathBuf::from(dir.trim()),
        None => defaults.audit_dir.clone(),
    };

    let max_file_size_mb = match raw.max_file_size_mb {
        Some(_) => match validate_positive_integer(raw.max_file_size_mb, "settings.maxFileSizeMb") {
            Ok(v) => v,
            Err(reason) => {
                violations.push(reason);
                defaults.max_file_size_mb
            }
        },
        None => defaults.max_file_size_mb,
    };

    let max_file_age_days = match raw.max_file_age_days {
        Some(_) => match validate_positive_integer(raw.max_file_age_days, "settings.maxFileAgeDays")
        {
            Ok(v) => v,
            Err(reason) => {
                violations.push(reason);
                defaults.max_file_age_days
            }
        },
        None => defaults.max_file_age_days,
    };

    let default_rate_limit = match &raw.default_rate_limit {
        Some(raw_limit) => match validate_rate_limit(raw_limit) {
            Ok(limit) => Some(limit),
            Err(reason) => {
                violations.push(format!("settings.defaultRateLimit: {reason}"));
                None
            }
        },
        None => None,
    };

    VaultSettings {
        audit_dir,
        max_file_size_mb,
        max_file_age_days,
        default_rate_limit,
    }
}
