//! Wire shapes for the four tool calls.
//!
//! These are the untrusted argument types exactly as MCP clients send them:
//! loose strings everywhere, validated only once they enter the dispatcher.
//! JSON Schemas for `tools/list` derive from these definitions.

use rmcp::schemars;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Arguments for `describe_policy`.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DescribePolicyRequest {
    #[schemars(description = "Opaque secret identifier to describe")]
    pub secret_id: String,
}

/// Arguments for `use_secret`.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UseSecretRequest {
    #[schemars(description = "Opaque secret identifier to use")]
    pub secret_id: String,
    #[schemars(description = "The outbound action to perform with the secret")]
    pub action: ActionSpec,
}

/// The action block of a `use_secret` call.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionSpec {
    /// Action kind: `http_get` or `http_post`.
    #[serde(rename = "type")]
    #[schemars(description = "Action kind: http_get or http_post")]
    pub kind: String,
    #[schemars(description = "Absolute HTTP(S) URL to call")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Additional request headers")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "JSON body for http_post")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "How to inject the secret: bearer (default) or header")]
    pub injection_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Header name for header injection")]
    pub header_name: Option<String>,
}

/// Arguments for `query_audit`. Everything is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryAuditRequest {
    #[schemars(description = "Filter by exact secret identifier")]
    pub secret_id: Option<String>,
    #[schemars(description = "Filter by outcome: success, denied, or error")]
    pub outcome: Option<String>,
    #[schemars(description = "Inclusive RFC 3339 lower bound on timestamps")]
    pub start_time: Option<String>,
    #[schemars(description = "Inclusive RFC 3339 upper bound on timestamps")]
    pub end_time: Option<String>,
    #[schemars(description = "1-based page number")]
    pub page: Option<i64>,
    #[schemars(description = "Page size, clamped to [1, 500], default 50")]
    pub page_size: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_use_secret_request_parses_wire_shape() {
        let args = json!({
            "secretId": "gh",
            "action": {
                "type": "http_get",
                "url": "https://api.github.com/user",
                "headers": {"accept": "application/vnd.github+json"},
                "injectionType": "bearer"
            }
        });
        let req: UseSecretRequest = serde_json::from_value(args).unwrap();
        assert_eq!(req.secret_id, "gh");
        assert_eq!(req.action.kind, "http_get");
        assert_eq!(req.action.injection_type.as_deref(), Some("bearer"));
        assert!(req.action.body.is_none());
    }

    #[test]
    fn test_query_audit_request_defaults_empty() {
        let req: QueryAuditRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.secret_id.is_none());
        assert!(req.page.is_none());
    }
}
