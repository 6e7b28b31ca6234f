//! The audit record schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a mediated request concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Denied,
    Error,
}

impl Outcome {
    /// Wire form of the outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Denied => "denied",
            Outcome::Error => "error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Outcome::Success),
            "denied" => Ok(Outcome::Denied),
            "error" => Ok(Outcome::Error),
            _ => Err(()),
        }
    }
}

/// One append-only record describing one pipeline outcome.
///
/// The field set is an invariant: nothing else may ever be serialized. In
/// particular the environment variable name, the secret value, the request
/// body, and the response body are forbidden. `reason` is a short
/// non-sensitive string such as an error code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuditEntry {
    /// UTC instant the outcome was recorded, millisecond precision on the
    /// wire.
    #[serde(with = "rfc3339_millis")]
    pub timestamp: DateTime<Utc>,
    pub secret_id: String,
    pub action: String,
    pub outcome: Outcome,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl AuditEntry {
    /// Build an entry stamped with the current clock.
    pub fn new(
        secret_id: impl Into<String>,
        action: impl Into<String>,
        outcome: Outcome,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            secret_id: secret_id.into(),
            action: action.into(),
            outcome,
            reason: reason.into(),
            domain: None,
            method: None,
        }
    }

    /// Attach the target domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Attach the HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }
}

/// RFC 3339 with exactly millisecond precision, always UTC (`Z`).
mod rfc3339_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry_at_millis(ms: u32) -> AuditEntry {
        let mut entry = AuditEntry::new("gh", "http_get", Outcome::Success, "completed");
        entry.timestamp = Utc
            .with_ymd_and_hms(2026, 3, 14, 9, 26, 53)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(i64::from(ms)))
            .unwrap();
        entry
    }

    #[test]
    fn test_serializes_with_millisecond_timestamp() {
        let entry = entry_at_millis(7);
        let line = serde_json::to_string(&entry).unwrap();
        assert!(line.contains("\"timestamp\":\"2026-03-14T09:26:53.007Z\""));
    }

    #[test]
    fn test_optional_fields_omitted_when_absent() {
        let entry = entry_at_millis(0);
        let value: serde_json::Value = serde_json::to_value(&entry).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["action", "outcome", "reason", "secretId", "timestamp"]);
    }

    #[test]
    fn test_full_key_set_is_closed() {
        let entry = entry_at_millis(0)
            .with_domain("api.github.com")
            .with_method("GET");
        let value: serde_json::Value = serde_json::to_value(&entry).unwrap();
        let allowed = ["timestamp", "secretId", "action", "outcome", "reason", "domain", "method"];
        for key in value.as_object().unwrap().keys() {
            assert!(allowed.contains(&key.as_str()), "unexpected audit key {key}");
        }
    }

    #[test]
    fn test_round_trip() {
        let entry = entry_at_millis(123)
            .with_domain("api.github.com")
            .with_method("GET");
        let line = serde_json::to_string(&entry).unwrap();
        let back: AuditEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_unknown_fields_rejected_on_read() {
        let line = r#"{"timestamp":"2026-03-14T09:26:53.000Z","secretId":"gh","action":"http_get","outcome":"success","reason":"completed","envVar":"GH_TOKEN"}"#;
        assert!(serde_json::from_str::<AuditEntry>(line).is_err());
    }

    #[test]
    fn test_outcome_parsing() {
        assert_eq!("success".parse::<Outcome>(), Ok(Outcome::Success));
        assert_eq!(" Denied ".parse::<Outcome>(), Ok(Outcome::Denied));
        assert!("unknown".parse::<Outcome>().is_err());
    }
}
