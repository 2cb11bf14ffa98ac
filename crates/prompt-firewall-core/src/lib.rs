//! # Prompt Firewall Core
//!
//! Gates LLM completions behind an external prompt firewall.
//!
//! ## Overview
//!
//! Every run is a strictly sequential, fail-closed pipeline:
//!
//! - **Inbound gate**: the prompt is scanned; a block ends the run
//! - **Completion**: the admitted (possibly sanitized) prompt is sent to the
//!   model together with the remote MCP tool schema
//! - **Outbound gate**: the answer is scanned; a block discards it
//!
//! Scanner or provider failures, including timeouts, abort the run. They
//! are never treated as an admitting verdict.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use prompt_firewall_core::{Credentials, FirewallConfig, FirewallPipeline, PipelineOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FirewallConfig::load(None)?;
//!     let credentials = Credentials::from_env(&config)?;
//!     let pipeline = FirewallPipeline::from_config(&config, &credentials)?;
//!
//!     match pipeline.run("Hello, summarize this repo").await? {
//!         PipelineOutcome::Succeeded { text, usage } => println!("{text} ({} tokens)", usage.total_tokens),
//!         PipelineOutcome::Blocked { stage, reason } => println!("blocked at {stage}: {reason}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Scanner
//!
//! ```rust,ignore
//! use prompt_firewall_core::{ContentScanner, FirewallError, ScanVerdict};
//! use async_trait::async_trait;
//!
//! struct DenyList;
//!
//! #[async_trait]
//! impl ContentScanner for DenyList {
//!     async fn scan_prompt(&self, prompt: &str) -> Result<ScanVerdict, FirewallError> {
//!         if prompt.contains("ignore previous instructions") {
//!             Ok(ScanVerdict::deny("prompt_injection_detected"))
//!         } else {
//!             Ok(ScanVerdict::allow())
//!         }
//!     }
//!
//!     async fn scan_response(
//!         &self,
//!         _prompt: &str,
//!         _response: &str,
//!         _session_id: Option<&str>,
//!     ) -> Result<ScanVerdict, FirewallError> {
//!         Ok(ScanVerdict::allow())
//!     }
//! }
//! ```

pub mod completion;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod scanner;
pub mod tools;
pub mod trace;
pub mod verdict;

// Primary exports
pub use completion::{
    AnthropicCompletion, CompletionProvider, CompletionRequest, CompletionResult, Message, Role,
    Usage,
};
pub use crate::config::{Credentials, FirewallConfig, LogFormat};
pub use conversation::Conversation;
pub use error::FirewallError;
pub use gate::{InboundGate, OutboundGate};
pub use pipeline::{FirewallPipeline, FirewallPipelineBuilder, PipelineOutcome, PipelineReport, PipelineState};
pub use scanner::{ContentScanner, HttpScanner};
pub use tools::{McpServerSpec, ToolChoice, ToolSpec};
pub use trace::RunTrace;
pub use verdict::{QueryStatus, ScanVerdict, Stage};
