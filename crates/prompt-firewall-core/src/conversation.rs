//! Multi-turn chat history for interactive use.

use crate::completion::Message;
use crate::pipeline::{PipelineOutcome, PipelineReport};
use crate::verdict::Stage;

/// Ordered user/assistant history. Each turn is still an independent
/// pipeline run; only admitted text is ever recorded.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append the turn described by `report`.
    ///
    /// An inbound block records nothing, so a rejected prompt never reaches
    /// the model on a later turn. An outbound block records the admitted
    /// prompt and `fallback` in place of the withheld answer.
    pub fn record(&mut self, report: &PipelineReport, fallback: &str) {
        let Some(prompt) = report.admitted_prompt.as_deref() else {
            return;
        };

        let answer = match &report.outcome {
            PipelineOutcome::Succeeded { text, .. } => text.as_str(),
            PipelineOutcome::Blocked {
                stage: Stage::Inbound,
                ..
            } => return,
            PipelineOutcome::Blocked { .. } => fallback,
        };

        self.messages.push(Message::user(prompt));
        self.messages.push(Message::assistant(answer));
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
