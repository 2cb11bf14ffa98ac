//! Error types for the prompt firewall pipeline.

use crate::verdict::Stage;

/// Fatal errors that abort a pipeline run.
///
/// A policy block is not an error: it is reported as
/// [`PipelineOutcome::Blocked`](crate::pipeline::PipelineOutcome::Blocked).
#[derive(Debug, thiserror::Error)]
pub enum FirewallError {
    /// A required credential environment variable is unset or empty.
    #[error("Missing required environment variable: {variable}")]
    MissingCredential { variable: String },

    /// The scanning service failed or returned an unusable answer.
    #[error("Scan service error during {stage} gate: {message}")]
    ScanService { stage: Stage, message: String },

    /// The completion provider failed or returned an unusable answer.
    #[error("Completion service error: {message}")]
    CompletionService { message: String },

    /// An external call exceeded its deadline.
    #[error("{stage} stage timed out after {seconds}s")]
    Timeout { stage: Stage, seconds: u64 },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FirewallError {
    pub(crate) fn scan(stage: Stage, message: impl Into<String>) -> Self {
        Self::ScanService {
            stage,
            message: message.into(),
        }
    }

    pub(crate) fn completion(message: impl Into<String>) -> Self {
        Self::CompletionService {
            message: message.into(),
        }
    }

    /// Stage the error originated from, if it happened inside a run.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::ScanService { stage, .. } | Self::Timeout { stage, .. } => Some(*stage),
            Self::CompletionService { .. } => Some(Stage::Completion),
            Self::MissingCredential { .. } | Self::Config(_) => None,
        }
    }

    /// True for errors raised before any stage could run.
    pub fn is_startup_error(&self) -> bool {
        matches!(self, Self::MissingCredential { .. } | Self::Config(_))
    }
}

impl From<config::ConfigError> for FirewallError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_names_variable() {
        let err = FirewallError::MissingCredential {
            variable: "ACCUKNOX_API_KEY".to_string(),
        };
        assert!(err.to_string().contains("ACCUKNOX_API_KEY"));
        assert!(err.is_startup_error());
        assert_eq!(err.stage(), None);
    }

    #[test]
    fn test_service_errors_carry_stage() {
        let err = FirewallError::scan(Stage::Outbound, "connection refused");
        assert_eq!(err.stage(), Some(Stage::Outbound));
        assert_eq!(
            err.to_string(),
            "Scan service error during outbound gate: connection refused"
        );

        let err = FirewallError::completion("overloaded");
        assert_eq!(err.stage(), Some(Stage::Completion));
        assert!(!err.is_startup_error());

        let err = FirewallError::Timeout {
            stage: Stage::Inbound,
            seconds: 30,
        };
        assert_eq!(err.to_string(), "inbound stage timed out after 30s");
    }
}
