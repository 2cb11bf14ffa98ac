//! Scanner verdicts and the pipeline stages they gate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason reported when the scanner blocks without naming one.
pub const UNSPECIFIED_BLOCK_REASON: &str = "blocked by firewall policy";

/// Pipeline stage identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Inbound,
    Completion,
    Outbound,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Inbound => "inbound",
            Stage::Completion => "completion",
            Stage::Outbound => "outbound",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action the scanning service decided for a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryStatus {
    /// Content is clean.
    Pass,
    /// Content matched a policy in observe-only mode.
    Monitor,
    /// No policy evaluated the content.
    Unchecked,
    /// Content must not be forwarded.
    Block,
}

impl QueryStatus {
    pub fn is_block(&self) -> bool {
        matches!(self, QueryStatus::Block)
    }
}

/// Decision returned by a gate for one piece of text.
///
/// Produced once per gate and consumed once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanVerdict {
    /// Whether the text may move on to the next stage.
    pub allowed: bool,
    /// Why the text was blocked (set when `allowed` is false).
    pub reason: Option<String>,
    /// Raw scanner action.
    pub status: QueryStatus,
    /// Scanner-sanitized version of the text, if the scanner produced one.
    pub sanitized_content: Option<String>,
    /// Links a prompt scan to its response scan.
    pub session_id: Option<String>,
    /// Opaque per-policy risk scores reported by the scanner.
    #[serde(default)]
    pub risk_score: serde_json::Value,
}

impl ScanVerdict {
    /// An admitting verdict with no scanner metadata.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            status: QueryStatus::Pass,
            sanitized_content: None,
            session_id: None,
            risk_score: serde_json::Value::Null,
        }
    }

    /// A blocking verdict with a reason.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            status: QueryStatus::Block,
            sanitized_content: None,
            session_id: None,
            risk_score: serde_json::Value::Null,
        }
    }

    pub fn with_sanitized_content(mut self, content: impl Into<String>) -> Self {
        self.sanitized_content = Some(content.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Block reason, falling back to a generic one.
    pub fn block_reason(&self) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| UNSPECIFIED_BLOCK_REASON.to_string())
    }

    /// Text to forward once admitted: the sanitized version when present.
    pub fn admitted_text<'a>(&'a self, original: &'a str) -> &'a str {
        self.sanitized_content.as_deref().unwrap_or(original)
    }
}
