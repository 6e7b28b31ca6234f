//! # Vaultgate Exec
//!
//! The constrained HTTP client at the end of the mediation pipeline. It
//! accepts an already-authorized request, injects the resolved secret into
//! a header, performs exactly one outbound call with redirects disabled,
//! and returns a response scrubbed for the untrusted caller: headers
//! filtered against a fixed allowlist, body truncated and sanitized.
//!
//! The secret value exists only inside [`ActionExecutor::execute`]; it is
//! never logged, never audited, and never part of the returned value.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use url::Url;
use vaultgate_core::constants::{
    MAX_RESPONSE_BODY_BYTES, REQUEST_TIMEOUT_SECS, RESPONSE_HEADER_ALLOWLIST, TRUNCATION_MARKER,
    USER_AGENT,
};
use vaultgate_core::{ActionKind, GatewayError, GatewayResult, Sanitizer, SecretString};

/// Where the secret lands in the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InjectionType {
    /// `Authorization: Bearer <value>`.
    #[default]
    Bearer,
    /// A caller-named header carrying the raw value.
    Header,
}

impl InjectionType {
    /// Parse an injection type name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bearer" => Some(InjectionType::Bearer),
            "header" => Some(InjectionType::Header),
            _ => None,
        }
    }

    /// Wire name of the injection type.
    pub fn name(&self) -> &'static str {
        match self {
            InjectionType::Bearer => "bearer",
            InjectionType::Header => "header",
        }
    }
}

/// An authorized outbound request, ready for injection and send.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub action: ActionKind,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    pub injection: InjectionType,
    pub header_name: Option<String>,
}

impl ExecRequest {
    /// A bearer-injected request with no extra headers or body.
    pub fn new(action: ActionKind, url: impl Into<String>) -> Self {
        Self {
            action,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            injection: InjectionType::Bearer,
            header_name: None,
        }
    }
}

/// The response shape crossing back over the trust boundary.
///
/// Headers outside the allowlist are already gone, the body is truncated
/// and sanitized, and network failures are folded into `status_code: 0`
/// with a short `error` marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SanitizedResponse {
    /// Whether the outbound call hit its deadline.
    pub fn is_timeout(&self) -> bool {
        self.error.as_deref() == Some("timeout")
    }

    fn timeout() -> Self {
        Self {
            status_code: 0,
            status_text: "timeout".to_string(),
            headers: BTreeMap::new(),
            body: None,
            error: Some("timeout".to_string()),
        }
    }

    fn network_error(detail: &str) -> Self {
        Self {
            status_code: 0,
            status_text: "network_error".to_string(),
            headers: BTreeMap::new(),
            body: None,
            error: Some(Sanitizer::sanitize_text(detail)),
        }
    }
}

/// Single-call HTTP executor. Redirects are never followed: a 3xx is
/// returned to the caller verbatim (after sanitization) and no second
/// request is issued.
pub struct ActionExecutor {
    client: reqwest::Client,
}

impl ActionExecutor {
    /// Build the executor with its fixed client posture: no redirects, a
    /// 30-second deadline, and the gateway user-agent.
    pub fn new() -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|_| GatewayError::ExecutionFailed {
                reason: "failed to construct HTTP client".to_string(),
            })?;
        Ok(Self { client })
    }

    /// Validate that a URL is absolute HTTP(S) with a host, without
    /// touching the network. Used both pre-send here and by the dispatcher
    /// to extract the policy domain.
    pub fn validate_url(raw: &str) -> GatewayResult<Url> {
        let url = Url::parse(raw.trim()).map_err(|e| GatewayError::InvalidUrl {
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::InvalidUrl {
                reason: format!("unsupported scheme \"{}\"", url.scheme()),
            });
        }
        if url.host_str().is_none() {
            return Err(GatewayError::InvalidUrl {
                reason: "URL has no host".to_string(),
            });
        }
        Ok(url)
    }

    /// Inject the secret, send once, and sanitize whatever comes back.
    ///
    /// Pre-send validation failures return `Err`; anything after the
    /// request leaves the process is folded into the response shape.
    pub async fn execute(
        &self,
        request: &ExecRequest,
        secret: &SecretString,
    ) -> GatewayResult<SanitizedResponse> {
        let url = Self::validate_url(&request.url)?;

        let injection_header = match request.injection {
            InjectionType::Bearer => None,
            InjectionType::Header => {
                let name = request.header_name.as_deref().unwrap_or("").trim();
                if name.is_empty() {
                    return Err(GatewayError::InvalidRequest {
                        reason: "header injection requires a non-blank headerName".to_string(),
                    });
                }
                Some(name.to_lowercase())
            }
        };

        let method = match request.action {
            ActionKind::HttpGet => reqwest::Method::GET,
            ActionKind::HttpPost => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, url);

        for (name, value) in &request.headers {
            let header_name = reqwest::header::HeaderName::try_from(name.as_str()).map_err(|_| {
                GatewayError::InvalidHeaders {
                    reason: format!("invalid header name \"{name}\""),
                }
            })?;
            let header_value =
                reqwest::header::HeaderValue::from_str(value).map_err(|_| {
                    GatewayError::InvalidHeaders {
                        reason: format!("invalid value for header \"{name}\""),
                    }
                })?;
            builder = builder.header(header_name, header_value);
        }

        // Injection last, so a caller-supplied header cannot shadow it.
        builder = match (request.injection, injection_header) {
            (InjectionType::Bearer, _) => {
                let value = reqwest::header::HeaderValue::from_str(&format!(
                    "Bearer {}",
                    secret.expose_secret()
                ))
                .map_err(|_| GatewayError::ExecutionFailed {
                    reason: "secret value cannot be carried in a header".to_string(),
                })?;
                builder.header(reqwest::header::AUTHORIZATION, value)
            }
            (InjectionType::Header, Some(name)) => {
                let header_name =
                    reqwest::header::HeaderName::try_from(name.as_str()).map_err(|_| {
                        GatewayError::InvalidHeaders {
                            reason: format!("invalid injection header name \"{name}\""),
                        }
                    })?;
                let value = reqwest::header::HeaderValue::from_str(secret.expose_secret())
                    .map_err(|_| GatewayError::ExecutionFailed {
                        reason: "secret value cannot be carried in a header".to_string(),
                    })?;
                builder.header(header_name, value)
            }
            (InjectionType::Header, None) => unreachable!("validated above"),
        };

        if request.action == ActionKind::HttpPost
            && let Some(body) = &request.body
            && !body.is_null()
        {
            builder = builder.json(body);
        }

        match builder.send().await {
            Ok(response) => {
                tracing::debug!(
                    target: "vaultgate_exec",
                    status = response.status().as_u16(),
                    "outbound call completed"
                );
                Ok(Self::sanitize_response(response).await)
            }
            Err(err) if err.is_timeout() => Ok(SanitizedResponse::timeout()),
            Err(err) => Ok(SanitizedResponse::network_error(&err.to_string())),
        }
    }

    async fn sanitize_response(response: reqwest::Response) -> SanitizedResponse {
        let status = response.status();
        let status_code = status.as_u16();
        let status_text = status.canonical_reason().unwrap_or("unknown").to_string();

        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            let lower = name.as_str();
            if RESPONSE_HEADER_ALLOWLIST.contains(&lower)
                && let Ok(text) = value.to_str()
            {
                headers.insert(lower.to_string(), Sanitizer::sanitize_text(text));
            }
        }

        match response.text().await {
            Ok(text) => SanitizedResponse {
                status_code,
                status_text,
                headers,
                body: Some(Sanitizer::sanitize_text(&Self::truncate_body(&text))),
                error: None,
            },
            Err(err) => SanitizedResponse::network_error(&err.to_string()),
        }
    }

    /// Cut the body off at the byte budget, marking the cut. A body at
    /// exactly the budget passes untouched.
    fn truncate_body(text: &str) -> String {
        if text.len() <= MAX_RESPONSE_BODY_BYTES {
            return text.to_string();
        }
        let mut end = MAX_RESPONSE_BODY_BYTES;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}{TRUNCATION_MARKER}", &text[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultgate_core::ErrorCode;

    fn secret() -> SecretString {
        SecretString::new("abc123".to_string())
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_send() {
        let executor = ActionExecutor::new().unwrap();
        for bad in ["not a url", "/relative/path", "ftp://example.com/x", "https://"] {
            let request = ExecRequest::new(ActionKind::HttpGet, bad);
            let err = executor.execute(&request, &secret()).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidUrl, "{bad:?}");
        }
    }

    #[tokio::test]
    async fn test_header_injection_requires_name() {
        let executor = ActionExecutor::new().unwrap();
        let mut request = ExecRequest::new(ActionKind::HttpGet, "https://api.github.com/user");
        request.injection = InjectionType::Header;
        request.header_name = Some("   ".to_string());
        let err = executor.execute(&request, &secret()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn test_bad_caller_headers_rejected_before_send() {
        let executor = ActionExecutor::new().unwrap();
        let mut request = ExecRequest::new(ActionKind::HttpGet, "https://api.github.com/user");
        request
            .headers
            .insert("bad header name".to_string(), "v".to_string());
        let err = executor.execute(&request, &secret()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidHeaders);
    }

    #[test]
    fn test_injection_type_parsing() {
        assert_eq!(InjectionType::from_name("bearer"), Some(InjectionType::Bearer));
        assert_eq!(InjectionType::from_name(" HEADER "), Some(InjectionType::Header));
        assert_eq!(InjectionType::from_name("query"), None);
    }

    #[test]
    fn test_truncation_boundary() {
        let exact = "x".repeat(MAX_RESPONSE_BODY_BYTES);
        assert_eq!(ActionExecutor::truncate_body(&exact), exact);

        let over = "x".repeat(MAX_RESPONSE_BODY_BYTES + 1);
        let truncated = ActionExecutor::truncate_body(&over);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            truncated.len(),
            MAX_RESPONSE_BODY_BYTES + TRUNCATION_MARKER.len()
        );
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // Multi-byte characters straddling the cut are dropped whole.
        let body = "é".repeat(MAX_RESPONSE_BODY_BYTES);
        let truncated = ActionExecutor::truncate_body(&body);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert!(truncated.len() <= MAX_RESPONSE_BODY_BYTES + TRUNCATION_MARKER.len());
    }
}
