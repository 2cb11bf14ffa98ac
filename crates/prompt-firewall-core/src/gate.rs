//! Inbound and outbound gates around the scanning service.

use crate::error::FirewallError;
use crate::scanner::ContentScanner;
use crate::verdict::{ScanVerdict, Stage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Await `fut`, turning an elapsed deadline into a fatal [`FirewallError::Timeout`].
pub(crate) async fn with_deadline<T, F>(
    stage: Stage,
    timeout: Duration,
    fut: F,
) -> Result<T, FirewallError>
where
    F: Future<Output = Result<T, FirewallError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(FirewallError::Timeout {
            stage,
            seconds: timeout.as_secs(),
        }),
    }
}

fn log_verdict(stage: Stage, verdict: &ScanVerdict) {
    if verdict.allowed {
        info!(%stage, status = ?verdict.status, risk_score = %verdict.risk_score, "gate admitted content");
    } else {
        info!(%stage, reason = %verdict.block_reason(), risk_score = %verdict.risk_score, "gate blocked content");
    }
}

/// Checks prompts before they reach the completion stage.
#[derive(Clone)]
pub struct InboundGate {
    scanner: Arc<dyn ContentScanner>,
    timeout: Duration,
}

impl InboundGate {
    pub fn new(scanner: Arc<dyn ContentScanner>, timeout: Duration) -> Self {
        Self { scanner, timeout }
    }

    pub async fn check(&self, prompt: &str) -> Result<ScanVerdict, FirewallError> {
        debug!(prompt, "scanning prompt");
        let verdict = with_deadline(Stage::Inbound, self.timeout, self.scanner.scan_prompt(prompt)).await?;
        log_verdict(Stage::Inbound, &verdict);
        Ok(verdict)
    }
}

/// Checks completion text before it is surfaced.
#[derive(Clone)]
pub struct OutboundGate {
    scanner: Arc<dyn ContentScanner>,
    timeout: Duration,
}

impl OutboundGate {
    pub fn new(scanner: Arc<dyn ContentScanner>, timeout: Duration) -> Self {
        Self { scanner, timeout }
    }

    /// `prompt` and `session_id` tie the response to its admitted prompt.
    pub async fn check(
        &self,
        prompt: &str,
        text: &str,
        session_id: Option<&str>,
    ) -> Result<ScanVerdict, FirewallError> {
        let verdict = with_deadline(
            Stage::Outbound,
            self.timeout,
            self.scanner.scan_response(prompt, text, session_id),
        )
        .await?;
        log_verdict(Stage::Outbound, &verdict);
        Ok(verdict)
    }
}
