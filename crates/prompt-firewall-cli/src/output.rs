//! Result blocks and exit codes.

use prompt_firewall_core::{FirewallError, PipelineOutcome};
use std::process::ExitCode;

pub const EXIT_SUCCESS: u8 = 0;
/// Unexpected failure outside the pipeline (I/O on stdin/stdout).
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_BLOCKED: u8 = 2;
pub const EXIT_CONFIG: u8 = 3;
pub const EXIT_SERVICE: u8 = 4;

/// `fallback` is shown to the user in place of a blocked answer.
pub fn render_outcome(outcome: &PipelineOutcome, fallback: &str) -> String {
    match outcome {
        PipelineOutcome::Succeeded { text, usage } => format!(
            "=== RESPONSE ===\n{}\n=== USAGE ===\nPrompt tokens: {}, Completion tokens: {}, Total tokens: {}\n",
            text, usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        ),
        PipelineOutcome::Blocked { stage, reason } => format!(
            "=== BLOCKED ===\nStage: {}\nReason: {}\nMessage: {}\n",
            stage, reason, fallback
        ),
    }
}

pub fn render_error(err: &anyhow::Error) -> String {
    let stage = err
        .downcast_ref::<FirewallError>()
        .and_then(FirewallError::stage)
        .map(|stage| stage.to_string())
        .unwrap_or_else(|| "startup".to_string());
    format!("=== ERROR ===\nStage: {}\nError: {:#}\n", stage, err)
}

pub fn outcome_exit_code(outcome: &PipelineOutcome) -> u8 {
    if outcome.is_blocked() {
        EXIT_BLOCKED
    } else {
        EXIT_SUCCESS
    }
}

pub fn error_exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<FirewallError>() {
        Some(err) if err.is_startup_error() => EXIT_CONFIG,
        Some(_) => EXIT_SERVICE,
        None => EXIT_FAILURE,
    }
}

pub fn exit(code: u8) -> ExitCode {
    ExitCode::from(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use prompt_firewall_core::{Stage, Usage};

    #[test]
    fn test_render_success() {
        let outcome = PipelineOutcome::Succeeded {
            text: "It's an example repo.".to_string(),
            usage: Usage::new(10, 5),
        };
        let block = render_outcome(&outcome, "rephrase");
        assert!(block.starts_with("=== RESPONSE ===\nIt's an example repo.\n"));
        assert!(block.contains("Prompt tokens: 10, Completion tokens: 5, Total tokens: 15"));
        assert!(!block.contains("rephrase"));
        assert_eq!(outcome_exit_code(&outcome), EXIT_SUCCESS);
    }

    #[test]
    fn test_render_blocked() {
        let outcome = PipelineOutcome::Blocked {
            stage: Stage::Inbound,
            reason: "prompt_injection_detected".to_string(),
        };
        assert_eq!(
            render_outcome(&outcome, "Your prompt violated our safety policies. Please rephrase."),
            "=== BLOCKED ===\nStage: inbound\nReason: prompt_injection_detected\n\
             Message: Your prompt violated our safety policies. Please rephrase.\n"
        );
        assert_eq!(outcome_exit_code(&outcome), EXIT_BLOCKED);
    }

    #[test]
    fn test_error_exit_codes() {
        let missing: anyhow::Error = FirewallError::MissingCredential {
            variable: "ANTHROPIC_API_KEY".to_string(),
        }
        .into();
        assert_eq!(error_exit_code(&missing), EXIT_CONFIG);
        assert!(render_error(&missing).contains("Stage: startup"));

        let service = Err::<(), _>(FirewallError::Timeout {
            stage: Stage::Completion,
            seconds: 120,
        })
        .context("pipeline run failed")
        .unwrap_err();
        assert_eq!(error_exit_code(&service), EXIT_SERVICE);
        let block = render_error(&service);
        assert!(block.contains("Stage: completion"));
        assert!(block.contains("timed out after 120s"));

        let io = anyhow::anyhow!("stdin closed");
        assert_eq!(error_exit_code(&io), EXIT_FAILURE);
    }
}
