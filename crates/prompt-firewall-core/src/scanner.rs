//! Client for the external prompt/response scanning service.

use crate::config::ScannerConfig;
use crate::error::FirewallError;
use crate::verdict::{QueryStatus, ScanVerdict, Stage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scanning service seam.
///
/// Implementations report service failures as errors; they never turn a
/// failed scan into an admitting verdict.
#[async_trait]
pub trait ContentScanner: Send + Sync {
    /// Scan a user prompt before it reaches the model.
    async fn scan_prompt(&self, prompt: &str) -> Result<ScanVerdict, FirewallError>;

    /// Scan a model response. `session_id` is the one returned by the
    /// matching prompt scan.
    async fn scan_response(
        &self,
        prompt: &str,
        response: &str,
        session_id: Option<&str>,
    ) -> Result<ScanVerdict, FirewallError>;
}

#[derive(Debug, Serialize)]
struct ScanRequest<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    user_info: &'a str,
}

/// Body returned by the scanning service.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanReport {
    pub query_status: Option<QueryStatus>,
    #[serde(default)]
    pub sanitized_content: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub risk_score: serde_json::Value,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl ScanReport {
    /// Convert to a verdict. An `error` field or a missing status is a
    /// service error, never an implicit pass.
    pub fn into_verdict(self, stage: Stage) -> Result<ScanVerdict, FirewallError> {
        if let Some(error) = self.error {
            let message = match error {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            return Err(FirewallError::scan(stage, message));
        }

        let status = self
            .query_status
            .ok_or_else(|| FirewallError::scan(stage, "response carried no query_status"))?;

        let allowed = !status.is_block();
        Ok(ScanVerdict {
            allowed,
            reason: if allowed { None } else { self.reason },
            status,
            sanitized_content: self.sanitized_content,
            session_id: self.session_id,
            risk_score: self.risk_score,
        })
    }
}

/// HTTP implementation of [`ContentScanner`].
#[derive(Debug, Clone)]
pub struct HttpScanner {
    client: Client,
    base_url: String,
    api_key: String,
    user_info: String,
    timeout_secs: u64,
}

impl HttpScanner {
    pub fn new(config: &ScannerConfig, api_key: impl Into<String>) -> Result<Self, FirewallError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FirewallError::Config(format!("failed to build scanner client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            user_info: config.user_info.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Timeouts surface as [`FirewallError::Timeout`] whether they hit while
    /// sending or while reading the body.
    fn transport_error(&self, stage: Stage, err: reqwest::Error, context: &str) -> FirewallError {
        if err.is_timeout() {
            FirewallError::Timeout {
                stage,
                seconds: self.timeout_secs,
            }
        } else {
            FirewallError::scan(stage, format!("{}: {}", context, err))
        }
    }

    async fn post(
        &self,
        stage: Stage,
        path: &str,
        request: &ScanRequest<'_>,
    ) -> Result<ScanVerdict, FirewallError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, %stage, "sending scan request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(stage, e, "request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FirewallError::scan(
                stage,
                format!("HTTP {}: {}", status, body.trim()),
            ));
        }

        let report: ScanReport = response
            .json()
            .await
            .map_err(|e| self.transport_error(stage, e, "invalid scan response"))?;

        report.into_verdict(stage)
    }
}

#[async_trait]
impl ContentScanner for HttpScanner {
    async fn scan_prompt(&self, prompt: &str) -> Result<ScanVerdict, FirewallError> {
        let request = ScanRequest {
            content: prompt,
            prompt: None,
            session_id: None,
            user_info: &self.user_info,
        };
        self.post(Stage::Inbound, "/scan/prompt", &request).await
    }

    async fn scan_response(
        &self,
        prompt: &str,
        response: &str,
        session_id: Option<&str>,
    ) -> Result<ScanVerdict, FirewallError> {
        let request = ScanRequest {
            content: response,
            prompt: Some(prompt),
            session_id,
            user_info: &self.user_info,
        };
        self.post(Stage::Outbound, "/scan/response", &request).await
    }
}
