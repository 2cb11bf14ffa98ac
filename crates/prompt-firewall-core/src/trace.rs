//! Per-run trace of pipeline stages.
//!
//! ```text
//! Run (run_id)
//!   ├─ inbound span
//!   ├─ completion span
//!   └─ outbound span
//! ```
//!
//! A trace travels next to the [`PipelineOutcome`](crate::pipeline::PipelineOutcome),
//! never inside it. Spans are append-only and ordered by stage.

use crate::pipeline::PipelineState;
use crate::verdict::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Running,
    Completed,
    Blocked,
    /// Gate bypassed by configuration.
    Skipped,
    Error,
}

/// Evidence attached to a span (scanner risk scores, usage, errors).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanArtifact {
    pub artifact_type: String,
    pub data: serde_json::Value,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSpan {
    pub span_id: String,
    pub stage: Stage,
    pub status: SpanStatus,
    pub start_time: String,
    pub end_time: Option<String>,
    pub duration_ms: Option<u64>,
    pub artifacts: Vec<SpanArtifact>,
    #[serde(skip)]
    started: Option<DateTime<Utc>>,
}

impl StageSpan {
    pub fn start(stage: Stage) -> Self {
        let now = Utc::now();
        Self {
            span_id: Uuid::new_v4().to_string(),
            stage,
            status: SpanStatus::Running,
            start_time: now.to_rfc3339(),
            end_time: None,
            duration_ms: None,
            artifacts: Vec::new(),
            started: Some(now),
        }
    }

    pub fn attach_artifact(&mut self, artifact_type: &str, data: serde_json::Value) {
        self.artifacts.push(SpanArtifact {
            artifact_type: artifact_type.to_string(),
            data,
            timestamp: Utc::now().to_rfc3339(),
        });
    }

    pub fn complete(&mut self) {
        self.close(SpanStatus::Completed);
    }

    pub fn block(&mut self, reason: &str) {
        self.attach_artifact("block", serde_json::json!({ "reason": reason }));
        self.close(SpanStatus::Blocked);
    }

    pub fn skip(&mut self) {
        self.close(SpanStatus::Skipped);
    }

    pub fn fail(&mut self, error: &str) {
        self.attach_artifact("error", serde_json::json!({ "error_reason": error }));
        self.close(SpanStatus::Error);
    }

    fn close(&mut self, status: SpanStatus) {
        let now = Utc::now();
        self.end_time = Some(now.to_rfc3339());
        self.status = status;
        if let Some(started) = self.started {
            self.duration_ms = Some((now - started).num_milliseconds().max(0) as u64);
        }
    }
}

/// Record of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTrace {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    /// Every state the run entered, in order.
    pub states: Vec<PipelineState>,
    pub spans: Vec<StageSpan>,
}

impl Default for RunTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTrace {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now().to_rfc3339(),
            finished_at: None,
            states: vec![PipelineState::Start],
            spans: Vec::new(),
        }
    }

    pub fn enter(&mut self, state: PipelineState) {
        self.states.push(state);
        if state.is_terminal() {
            self.finished_at = Some(Utc::now().to_rfc3339());
        }
    }

    pub fn record(&mut self, span: StageSpan) {
        self.spans.push(span);
    }

    /// Current (last entered) state.
    pub fn state(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Start)
    }

    pub fn span(&self, stage: Stage) -> Option<&StageSpan> {
        self.spans.iter().find(|s| s.stage == stage)
    }
}
