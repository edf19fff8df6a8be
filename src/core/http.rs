//! HTTP transport to the generation service.
//!
//! [`Transport`] is the single seam the orchestration core talks through.
//! [`HttpTransport`] is the reqwest implementation: it resolves service paths
//! against the configured base URL, attaches the service's session headers,
//! and unwraps the `{ret, errmsg, data}` response envelope.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method};
use serde_json::Value;

use super::credentials::Credential;
use crate::error::{GenError, Result};

/// Default timeout for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default service base URL.
pub const DEFAULT_BASE_URL: &str = "https://jimeng.jianying.com";

/// Default application id sent with every service call.
pub const DEFAULT_ASSISTANT_ID: u32 = 513_695;

const DEFAULT_APP_VERSION: &str = "5.8.0";
const DEFAULT_REGION: &str = "CN";
const PLATFORM_CODE: &str = "7";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";

/// Request body variants.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    Bytes(Vec<u8>),
}

/// Everything about a call besides method, target, and credential.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParts {
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl RequestParts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    #[must_use]
    pub fn bytes(mut self, body: Vec<u8>) -> Self {
        self.body = Body::Bytes(body);
        self
    }

    /// Look up a query parameter by name.
    #[must_use]
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The JSON body, if any.
    #[must_use]
    pub const fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Authenticated call to the remote service.
///
/// A failed call is never retried by the implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one call and return the unwrapped response payload.
    ///
    /// # Errors
    /// Any network failure, non-success status, or rejected envelope surfaces
    /// as an upstream error.
    async fn call(
        &self,
        method: Method,
        target: &str,
        credential: &Credential,
        parts: RequestParts,
    ) -> Result<Value>;
}

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub base_url: String,
    pub assistant_id: u32,
    pub region: String,
    pub app_version: String,
    pub timeout: Duration,
}

impl Default for ServiceEndpoint {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            assistant_id: DEFAULT_ASSISTANT_ID,
            region: DEFAULT_REGION.to_string(),
            app_version: DEFAULT_APP_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(BROWSER_USER_AGENT)
        .build()
        .map_err(|e| GenError::upstream("build HTTP client", e.to_string()))
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: ServiceEndpoint,
}

impl HttpTransport {
    /// Create a transport for the given endpoint.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(endpoint: ServiceEndpoint) -> Result<Self> {
        let client = build_client(endpoint.timeout)?;
        Ok(Self { client, endpoint })
    }

    #[must_use]
    pub const fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    fn is_absolute(target: &str) -> bool {
        target.starts_with("http://") || target.starts_with("https://")
    }

    fn resolve_url(&self, target: &str) -> String {
        if Self::is_absolute(target) {
            target.to_string()
        } else {
            format!(
                "{}/{}",
                self.endpoint.base_url.trim_end_matches('/'),
                target.trim_start_matches('/')
            )
        }
    }

    fn session_cookie(credential: &Credential) -> String {
        let token = credential.expose();
        format!("sessionid={token}; sessionid_ss={token}; sid_tt={token}")
    }

    fn build_request(
        &self,
        method: Method,
        target: &str,
        credential: &Credential,
        parts: RequestParts,
    ) -> reqwest::RequestBuilder {
        let url = self.resolve_url(target);
        let mut request = self.client.request(method, &url);

        if !Self::is_absolute(target) {
            let base = self.endpoint.base_url.trim_end_matches('/');
            request = request
                .query(&[
                    ("aid", self.endpoint.assistant_id.to_string()),
                    ("device_platform", "web".to_string()),
                    ("region", self.endpoint.region.clone()),
                ])
                .header("Accept", "application/json, text/plain, */*")
                .header("Appid", self.endpoint.assistant_id.to_string())
                .header("Appvr", &self.endpoint.app_version)
                .header("Pf", PLATFORM_CODE)
                .header("Origin", base)
                .header("Referer", format!("{base}/ai-tool/image/generate"))
                .header("Cookie", Self::session_cookie(credential));
        }

        if !parts.params.is_empty() {
            request = request.query(&parts.params);
        }
        for (key, value) in &parts.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        match parts.body {
            Body::Empty => request,
            Body::Json(value) => request.json(&value),
            Body::Bytes(bytes) => request.body(bytes),
        }
    }

    fn map_send_error(&self, operation: &str, err: &reqwest::Error) -> GenError {
        if err.is_timeout() {
            GenError::Timeout {
                operation: operation.to_string(),
                seconds: self.endpoint.timeout.as_secs(),
            }
        } else {
            GenError::upstream(operation, err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        method: Method,
        target: &str,
        credential: &Credential,
        parts: RequestParts,
    ) -> Result<Value> {
        let operation = format!("{method} {target}");
        tracing::debug!(
            method = %method,
            target,
            credential = %credential.fingerprint(),
            "Calling service"
        );

        let response = self
            .build_request(method, target, credential, parts)
            .send()
            .await
            .map_err(|e| self.map_send_error(&operation, &e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(target, status = status.as_u16(), "Service returned error status");
            return Err(GenError::HttpStatus {
                operation,
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GenError::upstream(&operation, format!("undecodable response: {e}")))?;

        unwrap_envelope(&operation, body)
    }
}

/// Unwrap the service's `{ret, errmsg, data}` envelope.
///
/// Bodies that carry no `ret` field are returned unchanged.
///
/// # Errors
/// Returns [`GenError::ApiRejected`] for a non-zero `ret`.
pub fn unwrap_envelope(operation: &str, mut body: Value) -> Result<Value> {
    let code = match body.get("ret") {
        None | Some(Value::Null) => return Ok(body),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    };

    if code == "0" {
        return Ok(body
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null));
    }

    let message = body
        .get("errmsg")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    tracing::warn!(operation, code = %code, message = %message, "Service rejected call");
    Err(GenError::ApiRejected {
        operation: operation.to_string(),
        code,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_success_unwraps_data() {
        let body = json!({"ret": "0", "errmsg": "success", "data": {"x": 1}});
        assert_eq!(unwrap_envelope("op", body).unwrap(), json!({"x": 1}));
    }

    #[test]
    fn envelope_numeric_zero_is_success() {
        let body = json!({"ret": 0, "data": [1, 2]});
        assert_eq!(unwrap_envelope("op", body).unwrap(), json!([1, 2]));
    }

    #[test]
    fn envelope_without_data_yields_null() {
        let body = json!({"ret": "0"});
        assert_eq!(unwrap_envelope("op", body).unwrap(), Value::Null);
    }

    #[test]
    fn envelope_non_zero_is_rejected() {
        let body = json!({"ret": "5000", "errmsg": "credit not enough"});
        match unwrap_envelope("POST /x", body).unwrap_err() {
            GenError::ApiRejected {
                operation,
                code,
                message,
            } => {
                assert_eq!(operation, "POST /x");
                assert_eq!(code, "5000");
                assert_eq!(message, "credit not enough");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bodies_without_envelope_pass_through() {
        let body = json!({"Result": {"UploadAddress": {}}});
        assert_eq!(unwrap_envelope("op", body.clone()).unwrap(), body);
    }

    #[test]
    fn relative_targets_resolve_against_base() {
        let transport = HttpTransport::new(ServiceEndpoint {
            base_url: "http://localhost:9999/".to_string(),
            ..ServiceEndpoint::default()
        })
        .unwrap();
        assert_eq!(
            transport.resolve_url("/mweb/v1/generate_video"),
            "http://localhost:9999/mweb/v1/generate_video"
        );
        assert_eq!(
            transport.resolve_url("https://imagex.example.com"),
            "https://imagex.example.com"
        );
    }

    #[test]
    fn request_parts_builders() {
        let parts = RequestParts::new()
            .param("task_id", "t1")
            .header("X-Test", "1")
            .json(json!({"a": 1}));
        assert_eq!(parts.param_value("task_id"), Some("t1"));
        assert_eq!(parts.param_value("missing"), None);
        assert_eq!(parts.json_body(), Some(&json!({"a": 1})));
    }
}
