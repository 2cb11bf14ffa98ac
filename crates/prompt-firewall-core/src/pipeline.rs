//! FirewallPipeline - sanitize, complete, scan.
//!
//! Every run moves through
//! `Start → InboundChecked → Completed → OutboundChecked → Done`.
//! A gate block jumps straight to the terminal `Blocked` state; a fatal
//! error aborts the run and is returned as [`FirewallError`].

use crate::completion::{
    AnthropicCompletion, CompletionProvider, CompletionRequest, Message, Usage,
};
use crate::config::{Credentials, FirewallConfig, DEFAULT_FALLBACK_RESPONSE};
use crate::conversation::Conversation;
use crate::error::FirewallError;
use crate::gate::{with_deadline, InboundGate, OutboundGate};
use crate::scanner::{ContentScanner, HttpScanner};
use crate::tools::ToolSpec;
use crate::trace::{RunTrace, StageSpan};
use crate::verdict::Stage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

/// States of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    InboundChecked,
    Completed,
    OutboundChecked,
    Done,
    Blocked,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Blocked)
    }
}

/// Terminal value of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Blocked { stage: Stage, reason: String },
    Succeeded { text: String, usage: Usage },
}

impl PipelineOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, PipelineOutcome::Blocked { .. })
    }

    /// Surfaced text; `None` for blocked runs.
    pub fn text(&self) -> Option<&str> {
        match self {
            PipelineOutcome::Succeeded { text, .. } => Some(text),
            PipelineOutcome::Blocked { .. } => None,
        }
    }
}

/// Outcome plus the bookkeeping of the run that produced it.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub outcome: PipelineOutcome,
    pub trace: RunTrace,
    /// Prompt as forwarded to the model; `None` when the inbound gate blocked.
    pub admitted_prompt: Option<String>,
}

/// The orchestrator. Cheap to reuse: runs share only read-only state.
pub struct FirewallPipeline {
    inbound: Option<InboundGate>,
    outbound: Option<OutboundGate>,
    completion: Arc<dyn CompletionProvider>,
    completion_timeout: Duration,
    tools: Arc<ToolSpec>,
    system_prompt: Option<String>,
    fallback_response: String,
}

impl FirewallPipeline {
    pub fn builder() -> FirewallPipelineBuilder {
        FirewallPipelineBuilder::new()
    }

    /// Wire the HTTP scanner and the Anthropic client from startup settings.
    pub fn from_config(
        config: &FirewallConfig,
        credentials: &Credentials,
    ) -> Result<Self, FirewallError> {
        config.validate()?;

        let completion = AnthropicCompletion::new(&config.completion, &credentials.completion_api_key)?;
        let mut builder = Self::builder()
            .with_completion(Arc::new(completion))
            .with_gates_enabled(config.gates_enabled)
            .with_tools(config.tools.clone())
            .with_fallback_response(config.fallback_response.clone())
            .with_scan_timeout(config.scanner.timeout())
            .with_completion_timeout(config.completion.timeout());

        if let Some(system) = &config.completion.system_prompt {
            builder = builder.with_system_prompt(system.clone());
        }

        if config.gates_enabled {
            let api_key = credentials.scanner_api_key.as_deref().ok_or_else(|| {
                FirewallError::MissingCredential {
                    variable: config.scanner.api_key_env.clone(),
                }
            })?;
            builder = builder.with_scanner(Arc::new(HttpScanner::new(&config.scanner, api_key)?));
        }

        builder.build()
    }

    pub fn gates_enabled(&self) -> bool {
        self.inbound.is_some()
    }

    pub fn fallback_response(&self) -> &str {
        &self.fallback_response
    }

    pub fn tools(&self) -> &ToolSpec {
        &self.tools
    }

    /// Run one pass and return only the outcome.
    pub async fn run(&self, prompt: &str) -> Result<PipelineOutcome, FirewallError> {
        self.execute(prompt).await.map(|report| report.outcome)
    }

    /// Run one pass with no prior conversation.
    pub async fn execute(&self, prompt: &str) -> Result<PipelineReport, FirewallError> {
        self.execute_with_history(&[], prompt).await
    }

    /// Run one pass as the next turn of `conversation`, then record the turn.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        prompt: &str,
    ) -> Result<PipelineReport, FirewallError> {
        let report = self.execute_with_history(conversation.messages(), prompt).await?;
        conversation.record(&report, &self.fallback_response);
        Ok(report)
    }

    /// Run one pass; `history` precedes the prompt in the completion request.
    pub async fn execute_with_history(
        &self,
        history: &[Message],
        prompt: &str,
    ) -> Result<PipelineReport, FirewallError> {
        let trace = RunTrace::new();
        let span = info_span!("pipeline_run", run_id = %trace.run_id);

        async move {
            let result = self.drive(trace, history, prompt).await;
            match &result {
                Ok(report) => match &report.outcome {
                    PipelineOutcome::Succeeded { usage, .. } => {
                        info!(total_tokens = usage.total_tokens, "run succeeded")
                    }
                    PipelineOutcome::Blocked { stage, reason } => {
                        info!(%stage, %reason, "run blocked")
                    }
                },
                Err(err) => warn!(error = %err, "run aborted"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        mut trace: RunTrace,
        history: &[Message],
        prompt: &str,
    ) -> Result<PipelineReport, FirewallError> {
        // Inbound gate
        let mut span = StageSpan::start(Stage::Inbound);
        let (admitted_prompt, session_id) = match &self.inbound {
            Some(gate) => {
                let verdict = match gate.check(prompt).await {
                    Ok(verdict) => verdict,
                    Err(err) => return abort(trace, span, err),
                };
                span.attach_artifact("risk_score", verdict.risk_score.clone());

                if !verdict.allowed {
                    let reason = verdict.block_reason();
                    span.block(&reason);
                    trace.record(span);
                    trace.enter(PipelineState::Blocked);
                    return Ok(PipelineReport {
                        outcome: PipelineOutcome::Blocked {
                            stage: Stage::Inbound,
                            reason,
                        },
                        trace,
                        admitted_prompt: None,
                    });
                }

                span.complete();
                (verdict.admitted_text(prompt).to_string(), verdict.session_id)
            }
            None => {
                span.skip();
                (prompt.to_string(), None)
            }
        };
        trace.record(span);
        trace.enter(PipelineState::InboundChecked);

        // Completion
        let mut span = StageSpan::start(Stage::Completion);
        let mut messages = history.to_vec();
        messages.push(Message::user(admitted_prompt.clone()));
        let request = CompletionRequest {
            system: self.system_prompt.clone(),
            messages,
            tools: Arc::clone(&self.tools),
        };

        let completion = match with_deadline(
            Stage::Completion,
            self.completion_timeout,
            self.completion.complete(&request),
        )
        .await
        {
            Ok(completion) => completion,
            Err(err) => return abort(trace, span, err),
        };
        span.attach_artifact("usage", serde_json::json!(completion.usage));
        if !completion.tool_calls.is_empty() {
            span.attach_artifact("tool_calls", serde_json::json!(completion.tool_calls));
        }
        span.complete();
        trace.record(span);
        trace.enter(PipelineState::Completed);

        // Outbound gate
        let mut span = StageSpan::start(Stage::Outbound);
        let usage = completion.usage;
        let text = match &self.outbound {
            Some(gate) => {
                let verdict = match gate
                    .check(&admitted_prompt, &completion.text, session_id.as_deref())
                    .await
                {
                    Ok(verdict) => verdict,
                    Err(err) => return abort(trace, span, err),
                };
                span.attach_artifact("risk_score", verdict.risk_score.clone());

                if !verdict.allowed {
                    // The completion text is dropped here and never leaves the run.
                    drop(completion);
                    let reason = verdict.block_reason();
                    span.block(&reason);
                    trace.record(span);
                    trace.enter(PipelineState::Blocked);
                    return Ok(PipelineReport {
                        outcome: PipelineOutcome::Blocked {
                            stage: Stage::Outbound,
                            reason,
                        },
                        trace,
                        admitted_prompt: Some(admitted_prompt),
                    });
                }

                span.complete();
                verdict.sanitized_content.unwrap_or(completion.text)
            }
            None => {
                span.skip();
                completion.text
            }
        };
        trace.record(span);
        trace.enter(PipelineState::OutboundChecked);
        trace.enter(PipelineState::Done);

        Ok(PipelineReport {
            outcome: PipelineOutcome::Succeeded { text, usage },
            trace,
            admitted_prompt: Some(admitted_prompt),
        })
    }
}

/// Close `span` as failed and hand back the fatal error.
fn abort(
    mut trace: RunTrace,
    mut span: StageSpan,
    err: FirewallError,
) -> Result<PipelineReport, FirewallError> {
    span.fail(&err.to_string());
    trace.record(span);
    debug!(
        trace = %serde_json::to_string(&trace).unwrap_or_default(),
        "aborted run trace"
    );
    Err(err)
}

/// Builder for [`FirewallPipeline`].
pub struct FirewallPipelineBuilder {
    scanner: Option<Arc<dyn ContentScanner>>,
    completion: Option<Arc<dyn CompletionProvider>>,
    gates_enabled: bool,
    tools: ToolSpec,
    system_prompt: Option<String>,
    fallback_response: String,
    scan_timeout: Duration,
    completion_timeout: Duration,
}

impl FirewallPipelineBuilder {
    fn new() -> Self {
        Self {
            scanner: None,
            completion: None,
            gates_enabled: true,
            tools: ToolSpec::default(),
            system_prompt: None,
            fallback_response: DEFAULT_FALLBACK_RESPONSE.to_string(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }

    /// Scanner used by both gates (required while gates are enabled).
    pub fn with_scanner(mut self, scanner: Arc<dyn ContentScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Completion provider (required).
    pub fn with_completion(mut self, completion: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(completion);
        self
    }

    /// `false` skips both gates; completions are returned unchanged.
    pub fn with_gates_enabled(mut self, enabled: bool) -> Self {
        self.gates_enabled = enabled;
        self
    }

    pub fn with_tools(mut self, tools: ToolSpec) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_fallback_response(mut self, fallback: impl Into<String>) -> Self {
        self.fallback_response = fallback.into();
        self
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<FirewallPipeline, FirewallError> {
        let completion = self.completion.ok_or_else(|| {
            FirewallError::Config("a completion provider is required".to_string())
        })?;

        let (inbound, outbound) = if self.gates_enabled {
            let scanner = self.scanner.ok_or_else(|| {
                FirewallError::Config("a scanner is required while gates are enabled".to_string())
            })?;
            (
                Some(InboundGate::new(Arc::clone(&scanner), self.scan_timeout)),
                Some(OutboundGate::new(scanner, self.scan_timeout)),
            )
        } else {
            (None, None)
        };

        Ok(FirewallPipeline {
            inbound,
            outbound,
            completion,
            completion_timeout: self.completion_timeout,
            tools: Arc::new(self.tools),
            system_prompt: self.system_prompt,
            fallback_response: self.fallback_response,
        })
    }
}
