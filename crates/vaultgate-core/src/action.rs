//! The closed action vocabulary.
//!
//! Strongly-typed dispatch over the actions this gateway is willing to
//! mediate. A request naming anything outside this enum never reaches a
//! per-secret policy.

use serde::{Deserialize, Serialize};

/// An outbound action a policy may allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    HttpGet,
    HttpPost,
}

impl ActionKind {
    /// Wire name of the action (`http_get`, `http_post`).
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::HttpGet => "http_get",
            ActionKind::HttpPost => "http_post",
        }
    }

    /// Parse an action name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "http_get" => Some(ActionKind::HttpGet),
            "http_post" => Some(ActionKind::HttpPost),
            _ => None,
        }
    }

    /// The HTTP method this action issues.
    pub fn http_method(&self) -> &'static str {
        match self {
            ActionKind::HttpGet => "GET",
            ActionKind::HttpPost => "POST",
        }
    }

    /// All actions in the vocabulary.
    pub fn all() -> &'static [ActionKind] {
        &[ActionKind::HttpGet, ActionKind::HttpPost]
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
