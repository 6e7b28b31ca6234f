//! Deny-by-default policy evaluation.
//!
//! Any absence — missing policy, unknown action, unknown domain — results
//! in denial without further inquiry. The check ordering is deliberate:
//! global checks run before policy-scoped ones, so a request naming an
//! unknown action never consults a per-secret policy at all.

use crate::action::ActionKind;
use crate::config::VaultConfig;
use crate::error::ErrorCode;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The outcome of a policy check: a first-class value, not an exception,
/// because denials feed the audit trail and the normal response path.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow,
    Deny { code: ErrorCode, message: String },
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    fn deny(code: ErrorCode, message: impl Into<String>) -> Self {
        Decision::Deny {
            code,
            message: message.into(),
        }
    }
}

/// Evaluates `(secret, action, domain)` triples against the loaded policies.
#[derive(Clone)]
pub struct PolicyEvaluator {
    config: Arc<VaultConfig>,
}

impl PolicyEvaluator {
    pub fn new(config: Arc<VaultConfig>) -> Self {
        Self { config }
    }

    /// Evaluate against the current clock.
    pub fn evaluate(&self, secret_id: &str, action: &str, domain: &str) -> Decision {
        self.evaluate_at(secret_id, action, domain, Utc::now())
    }

    /// Evaluate at an explicit instant. First failure wins.
    pub fn evaluate_at(
        &self,
        secret_id: &str,
        action: &str,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Decision {
        let secret_id = secret_id.trim();
        let action = action.trim().to_lowercase();
        let domain = domain.trim().to_lowercase();

        if secret_id.is_empty() || action.is_empty() || domain.is_empty() {
            return Decision::deny(
                ErrorCode::InvalidRequest,
                "secret id, action, and domain are all required",
            );
        }

        // Global vocabulary first: an unknown action reveals nothing about
        // any per-secret policy.
        let Some(kind) = ActionKind::from_name(&action) else {
            return Decision::deny(ErrorCode::ForbiddenAction, "unsupported action");
        };

        let Some(policy) = self.config.policy(secret_id) else {
            return Decision::deny(
                ErrorCode::NoPolicy,
                format!("no policy configured for secret \"{secret_id}\""),
            );
        };

        if policy.is_expired_at(now) {
            return Decision::deny(
                ErrorCode::PolicyExpired,
                format!("policy for secret \"{secret_id}\" has expired"),
            );
        }

        if !policy.allows_action(kind) {
            return Decision::deny(
                ErrorCode::ForbiddenAction,
                format!("action \"{action}\" is not allowed for secret \"{secret_id}\""),
            );
        }

        if !policy.allows_domain(&domain) {
            return Decision::deny(
                ErrorCode::ForbiddenDomain,
                format!("domain \"{domain}\" is not allowed for secret \"{secret_id}\""),
            );
        }

        Decision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn evaluator(policy_extra: &str) -> PolicyEvaluator {
        let doc = format!(
            r#"{{
                "version": "1.0.0",
                "policies": [{{
                    "secretId": "gh",
                    "allowedActions": ["http_get"],
                    "allowedDomains": ["api.github.com"]
                    {policy_extra}
                }}]
            }}"#
        );
        PolicyEvaluator::new(Arc::new(VaultConfig::from_json(&doc).unwrap()))
    }

    fn deny_code(decision: &Decision) -> ErrorCode {
        match decision {
            Decision::Deny { code, .. } => *code,
            Decision::Allow => panic!("expected denial, got allow"),
        }
    }

    #[test]
    fn test_allowed_triple() {
        let decision = evaluator("").evaluate("gh", "http_get", "api.github.com");
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_inputs_trimmed_and_lowercased() {
        let decision = evaluator("").evaluate(" gh ", " HTTP_GET ", " API.GitHub.COM ");
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_empty_inputs_are_invalid_request() {
        let eval = evaluator("");
        for (id, action, domain) in [
            ("", "http_get", "api.github.com"),
            ("gh", "  ", "api.github.com"),
            ("gh", "http_get", ""),
        ] {
            let decision = eval.evaluate(id, action, domain);
            assert_eq!(deny_code(&decision), ErrorCode::InvalidRequest);
        }
    }

    #[test]
    fn test_unknown_action_denied_before_policy_lookup() {
        // Even an id with no policy gets the generic unsupported-action
        // denial, not no_policy.
        let decision = evaluator("").evaluate("absent", "http_delete", "api.github.com");
        assert_eq!(deny_code(&decision), ErrorCode::ForbiddenAction);
        match decision {
            Decision::Deny { message, .. } => assert_eq!(message, "unsupported action"),
            Decision::Allow => unreachable!(),
        }
    }

    #[test]
    fn test_missing_policy_denied() {
        let decision = evaluator("").evaluate("absent", "http_get", "api.github.com");
        assert_eq!(deny_code(&decision), ErrorCode::NoPolicy);
    }

    #[test]
    fn test_expired_policy_denied() {
        let eval = evaluator(r#", "expiresAt": "2020-01-01T00:00:00Z""#);
        let decision = eval.evaluate("gh", "http_get", "api.github.com");
        assert_eq!(deny_code(&decision), ErrorCode::PolicyExpired);
    }

    #[test]
    fn test_expiry_equality_is_expired() {
        let eval = evaluator(r#", "expiresAt": "2030-06-01T12:00:00Z""#);
        let exactly_then = Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap();
        let decision = eval.evaluate_at("gh", "http_get", "api.github.com", exactly_then);
        assert_eq!(deny_code(&decision), ErrorCode::PolicyExpired);

        let just_before = Utc.with_ymd_and_hms(2030, 6, 1, 11, 59, 59).unwrap();
        let decision = eval.evaluate_at("gh", "http_get", "api.github.com", just_before);
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_action_outside_policy_denied() {
        let doc = r#"{
            "version": "1.0.0",
            "policies": [{
                "secretId": "gh",
                "allowedActions": ["http_get"],
                "allowedDomains": ["api.github.com"]
            }]
        }"#;
        let eval = PolicyEvaluator::new(Arc::new(VaultConfig::from_json(doc).unwrap()));
        let decision = eval.evaluate("gh", "http_post", "api.github.com");
        assert_eq!(deny_code(&decision), ErrorCode::ForbiddenAction);
    }

    #[test]
    fn test_domain_match_is_exact_not_suffix() {
        let eval = evaluator("");
        for domain in ["sub.api.github.com", "github.com", "api.github.com.evil.com"] {
            let decision = eval.evaluate("gh", "http_get", domain);
            assert_eq!(
                deny_code(&decision),
                ErrorCode::ForbiddenDomain,
                "{domain:?} must not match api.github.com"
            );
        }
    }

    #[test]
    fn test_allow_implies_domain_membership() {
        let eval = evaluator("");
        let config_doc = r#"{
            "version": "1.0.0",
            "policies": [{
                "secretId": "gh",
                "allowedActions": ["http_get"],
                "allowedDomains": ["api.github.com"]
            }]
        }"#;
        let config = VaultConfig::from_json(config_doc).unwrap();
        for domain in ["api.github.com", "API.github.com", "evil.com", "a.b.cd"] {
            let decision = eval.evaluate("gh", "http_get", domain);
            if decision.is_allowed() {
                assert!(
                    config
                        .policy("gh")
                        .unwrap()
                        .allowed_domains
                        .contains(&domain.to_lowercase())
                );
            }
        }
    }
}
