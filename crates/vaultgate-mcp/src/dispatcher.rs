//! Table-driven tool dispatch over the core pipeline.
//!
//! One invocation is processed end-to-end before the next begins: the
//! dispatcher holds an async mutex across the whole call, so the rate
//! limiter and the audit trail observe requests in a total order. The
//! single suspension point inside a `use_secret` call is the outbound HTTP
//! request.
//!
//! Every `use_secret` invocation produces exactly one audit entry; denials
//! and errors are first-class replies, never panics, and every message is
//! run through the sanitizer before it can reach the caller.

use crate::tools::{DescribePolicyRequest, QueryAuditRequest, UseSecretRequest};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use vaultgate_audit::{AuditEntry, AuditQuery, AuditStore, Outcome};
use vaultgate_core::{
    ActionKind, Decision, ErrorCode, GatewayError, GatewayResult, PolicyEvaluator, RateLimiter,
    Sanitizer, SecretResolver, VaultConfig,
    secrets::Availability,
};
use vaultgate_exec::{ActionExecutor, ExecRequest, InjectionType, SanitizedResponse};

/// The four tool names this gateway answers to.
pub const TOOL_NAMES: [&str; 4] = [
    "discover_secrets",
    "describe_policy",
    "use_secret",
    "query_audit",
];

/// Internal return shape of a tool call. The MCP server wraps this into
/// the wire envelope (`content[]` text, `isError` on failure).
#[derive(Debug, Clone, PartialEq)]
pub enum ToolReply {
    Success { result: Value },
    Failure { code: ErrorCode, message: String },
}

impl ToolReply {
    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, ToolReply::Success { .. })
    }

    /// The internal `{success, ...}` JSON shape, used by tests and logs.
    pub fn to_value(&self) -> Value {
        match self {
            ToolReply::Success { result } => json!({"success": true, "result": result}),
            ToolReply::Failure { code, message } => {
                json!({"success": false, "code": code, "message": message})
            }
        }
    }

    fn failure(error: &GatewayError) -> Self {
        ToolReply::Failure {
            code: error.code(),
            message: Sanitizer::sanitize_text(&error.to_string()),
        }
    }
}

/// Routes tool invocations through the policy evaluator, rate limiter,
/// secret resolver, action executor, and audit log.
pub struct ToolDispatcher {
    config: Arc<VaultConfig>,
    resolver: SecretResolver,
    evaluator: PolicyEvaluator,
    limiter: RateLimiter,
    audit: AuditStore,
    executor: ActionExecutor,
    gate: tokio::sync::Mutex<()>,
}

impl ToolDispatcher {
    /// Build the dispatcher and open its audit store.
    pub fn new(config: Arc<VaultConfig>) -> GatewayResult<Self> {
        let audit = AuditStore::open(
            &config.settings.audit_dir,
            config.settings.max_file_size_mb,
            config.settings.max_file_age_days,
        )
        .map_err(|e| GatewayError::ExecutionFailed {
            reason: format!("cannot open audit directory: {e}"),
        })?;
        Ok(Self {
            resolver: SecretResolver::new(Arc::clone(&config)),
            evaluator: PolicyEvaluator::new(Arc::clone(&config)),
            limiter: RateLimiter::new(),
            audit,
            executor: ActionExecutor::new()?,
            gate: tokio::sync::Mutex::new(()),
            config,
        })
    }

    /// The audit store backing this dispatcher.
    pub fn audit_store(&self) -> &AuditStore {
        &self.audit
    }

    /// Periodic maintenance: evict idle rate windows and expired audit
    /// files. Called from a background tick; never blocks request dispatch
    /// for long.
    pub fn maintenance_tick(&self) {
        let default_window = self
            .config
            .settings
            .default_rate_limit
            .map(|limit| limit.window_seconds)
            .unwrap_or(60);
        self.limiter.cleanup_idle(default_window);

        let retention_ms = self.config.settings.max_file_age_days as i64 * 86_400_000;
        if let Err(err) = self.audit.cleanup(retention_ms) {
            tracing::warn!(target: "vaultgate_audit", "audit cleanup failed: {err}");
        }
    }

    /// Route one tool invocation. Unknown names fail with `unknown_tool`.
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolReply {
        let _serialized = self.gate.lock().await;
        let result = match name {
            "discover_secrets" => self.discover(),
            "describe_policy" => self.describe_policy(args),
            "use_secret" => self.use_secret(args).await,
            "query_audit" => self.query_audit(args),
            _ => Err(GatewayError::UnknownTool {
                name: name.to_string(),
            }),
        };
        match result {
            Ok(value) => ToolReply::Success { result: value },
            Err(error) => {
                tracing::warn!(
                    target: "vaultgate_dispatch",
                    tool = name,
                    code = %error.code(),
                    "{}",
                    Sanitizer::sanitize_text(&error.to_string())
                );
                ToolReply::failure(&error)
            }
        }
    }

    /// `discover_secrets`: every configured identifier with availability
    /// and description. The environment variable name never appears.
    fn discover(&self) -> GatewayResult<Value> {
        let secrets: Vec<Value> = self
            .resolver
            .list_secret_ids()
            .iter()
            .map(|id| {
                let mut entry = json!({
                    "secretId": id.as_str(),
                    "available": self.resolver.is_available(id.as_str()),
                });
                if let Some(description) = self.resolver.description(id.as_str()) {
                    entry["description"] = json!(description);
                }
                entry
            })
            .collect();
        Ok(json!({ "secrets": secrets }))
    }

    /// `describe_policy`: the rules gating one secret.
    fn describe_policy(&self, args: Value) -> GatewayResult<Value> {
        let request: DescribePolicyRequest =
            serde_json::from_value(args).map_err(|e| GatewayError::InvalidRequest {
                reason: format!("malformed describe_policy arguments: {e}"),
            })?;
        let secret_id = request.secret_id.trim();
        if secret_id.is_empty() {
            return Err(GatewayError::InvalidRequest {
                reason: "secretId is required".to_string(),
            });
        }
        let policy = self
            .config
            .policy(secret_id)
            .ok_or_else(|| GatewayError::NoPolicy {
                secret_id: secret_id.to_string(),
            })?;
        serde_json::to_value(policy).map_err(|_| GatewayError::ExecutionFailed {
            reason: "policy serialization failed".to_string(),
        })
    }

    /// `use_secret`: the full mediation pipeline. Exactly one audit entry
    /// per invocation, success or not.
    async fn use_secret(&self, args: Value) -> GatewayResult<Value> {
        // Keep enough context for the audit entry even when the typed
        // parse fails.
        let fallback_id = args
            .get("secretId")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();
        let fallback_action = args
            .get("action")
            .and_then(|a| a.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_lowercase();

        let request: UseSecretRequest = match serde_json::from_value(args) {
            Ok(request) => request,
            Err(e) => {
                let error = GatewayError::InvalidRequest {
                    reason: format!("malformed use_secret arguments: {e}"),
                };
                self.write_audit(
                    &fallback_id,
                    &fallback_action,
                    Outcome::Denied,
                    error.code().as_str(),
                    None,
                    None,
                );
                return Err(error);
            }
        };

        let secret_id = request.secret_id.trim().to_string();
        let action_name = request.action.kind.trim().to_lowercase();
        let mut domain: Option<String> = None;
        let mut method: Option<String> = None;

        match self
            .run_use_secret(&request, &secret_id, &action_name, &mut domain, &mut method)
            .await
        {
            Ok(response) => {
                self.write_audit(
                    &secret_id,
                    &action_name,
                    Outcome::Success,
                    "completed",
                    domain.as_deref(),
                    method.as_deref(),
                );
                serde_json::to_value(&response).map_err(|_| GatewayError::ExecutionFailed {
                    reason: "response serialization failed".to_string(),
                })
            }
            Err(error) => {
                let outcome = match error.code() {
                    ErrorCode::Timeout | ErrorCode::ExecutionFailed => Outcome::Error,
                    _ => Outcome::Denied,
                };
                self.write_audit(
                    &secret_id,
                    &action_name,
                    outcome,
                    error.code().as_str(),
                    domain.as_deref(),
                    method.as_deref(),
                );
                Err(error)
            }
        }
    }

    /// The §2 pipeline: validate, rate-limit, availability, policy,
    /// resolve, execute. First failure wins; no outbound call is made
    /// after a failure.
    async fn run_use_secret(
        &self,
        request: &UseSecretRequest,
        secret_id: &str,
        action_name: &str,
        domain_out: &mut Option<String>,
        method_out: &mut Option<String>,
    ) -> GatewayResult<SanitizedResponse> {
        // Input validation.
        if secret_id.is_empty() {
            return Err(GatewayError::InvalidRequest {
                reason: "secretId is required".to_string(),
            });
        }
        if action_name.is_empty() {
            return Err(GatewayError::InvalidRequest {
                reason: "action.type is required".to_string(),
            });
        }
        let url = ActionExecutor::validate_url(&request.action.url)?;
        let domain = url.host_str().unwrap_or_default().to_lowercase();
        *domain_out = Some(domain.clone());
        if let Some(kind) = ActionKind::from_name(action_name) {
            *method_out = Some(kind.http_method().to_string());
        }
        let injection = match request.action.injection_type.as_deref() {
            Some(name) => {
                InjectionType::from_name(name).ok_or_else(|| GatewayError::InvalidInjectionType {
                    injection: name.to_string(),
                })?
            }
            None => InjectionType::default(),
        };
        if injection == InjectionType::Header
            && request
                .action
                .header_name
                .as_deref()
                .unwrap_or("")
                .trim()
                .is_empty()
        {
            return Err(GatewayError::InvalidRequest {
                reason: "header injection requires a non-blank headerName".to_string(),
            });
        }

        // Rate limiter, keyed per secret identifier: the budget is shared
        // across all of a secret's domains.
        if let Some(limit) = self.config.rate_limit_for(secret_id) {
            let decision =
                self.limiter
                    .check_limit(secret_id, limit.requests, limit.window_seconds)?;
            if !decision.allowed {
                return Err(GatewayError::RateLimited {
                    secret_id: secret_id.to_string(),
                    reset_at: decision.reset_at,
                });
            }
        }

        // Secret availability.
        match self.resolver.availability(secret_id) {
            Availability::Available => {}
            Availability::Empty => {
                return Err(GatewayError::MissingEnv {
                    secret_id: secret_id.to_string(),
                });
            }
            Availability::Unknown | Availability::Unset => {
                return Err(GatewayError::UnknownSecret {
                    secret_id: secret_id.to_string(),
                });
            }
        }

        // Policy.
        match self.evaluator.evaluate(secret_id, action_name, &domain) {
            Decision::Allow => {}
            Decision::Deny { code, message } => {
                return Err(GatewayError::Denied { code, message });
            }
        }
        let Some(kind) = ActionKind::from_name(action_name) else {
            // The evaluator only allows actions in the vocabulary.
            return Err(GatewayError::ForbiddenAction {
                action: action_name.to_string(),
            });
        };

        // Resolve the value, inject, send, sanitize.
        let secret =
            self.resolver
                .resolve_value(secret_id)
                .ok_or_else(|| GatewayError::MissingEnv {
                    secret_id: secret_id.to_string(),
                })?;
        let exec_request = ExecRequest {
            action: kind,
            url: request.action.url.trim().to_string(),
            headers: request.action.headers.clone().unwrap_or_default(),
            body: request.action.body.clone(),
            injection,
            header_name: request.action.header_name.clone(),
        };
        let response = self.executor.execute(&exec_request, &secret).await?;

        if response.is_timeout() {
            return Err(GatewayError::Timeout);
        }
        if let Some(error) = &response.error {
            return Err(GatewayError::ExecutionFailed {
                reason: error.clone(),
            });
        }
        Ok(response)
    }

    /// `query_audit`: read the trail back with filters and pagination.
    fn query_audit(&self, args: Value) -> GatewayResult<Value> {
        let request: QueryAuditRequest =
            serde_json::from_value(args).map_err(|e| GatewayError::InvalidRequest {
                reason: format!("malformed query_audit arguments: {e}"),
            })?;

        let outcome = match request.outcome.as_deref() {
            Some(text) => Some(text.parse::<Outcome>().map_err(|()| {
                GatewayError::InvalidRequest {
                    reason: format!("unknown outcome \"{text}\""),
                }
            })?),
            None => None,
        };
        let start_time = parse_query_time(request.start_time.as_deref(), "startTime")?;
        let end_time = parse_query_time(request.end_time.as_deref(), "endTime")?;

        let query = AuditQuery {
            secret_id: request.secret_id.map(|id| id.trim().to_string()),
            outcome,
            start_time,
            end_time,
            page: request.page,
            page_size: request.page_size,
        };
        let page = self
            .audit
            .query(&query)
            .map_err(|e| GatewayError::ExecutionFailed {
                reason: format!("audit query failed: {e}"),
            })?;
        serde_json::to_value(&page).map_err(|_| GatewayError::ExecutionFailed {
            reason: "audit page serialization failed".to_string(),
        })
    }

    fn write_audit(
        &self,
        secret_id: &str,
        action: &str,
        outcome: Outcome,
        reason: &str,
        domain: Option<&str>,
        method: Option<&str>,
    ) {
        let mut entry = AuditEntry::new(secret_id, action, outcome, reason);
        if let Some(domain) = domain {
            entry = entry.with_domain(domain);
        }
        if let Some(method) = method {
            entry = entry.with_method(method);
        }
        if let Err(err) = self.audit.write(&entry) {
            tracing::error!(target: "vaultgate_audit", "audit write failed: {err}");
        }
    }
}

fn parse_query_time(
    text: Option<&str>,
    field: &str,
) -> GatewayResult<Option<DateTime<Utc>>> {
    match text {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| GatewayError::InvalidRequest {
                reason: format!("{field} is not a valid RFC 3339 timestamp"),
            }),
    }
}
