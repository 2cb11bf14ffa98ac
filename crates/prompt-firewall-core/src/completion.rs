//! Completion provider seam and the Anthropic Messages client.
//!
//! Remote tools are passed to the provider as MCP server definitions. The
//! provider performs every tool call itself; only the final text, usage and
//! the names of invoked tools come back.

use crate::config::CompletionConfig;
use crate::error::FirewallError;
use crate::tools::{McpServerSpec, ToolSpec};
use crate::verdict::Stage;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

const MCP_CONNECTOR_BETA: &str = "mcp-client-2025-04-04";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Input of one completion call. The last message is the prompt.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Arc<ToolSpec>,
}

impl CompletionRequest {
    /// The prompt being completed.
    pub fn prompt(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }
}

/// Aggregate token usage of a completion, tool round-trips included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub text: String,
    pub usage: Usage,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Remote tools the provider reported calling, as `server/tool`.
    #[serde(default)]
    pub tool_calls: Vec<String>,
}

impl CompletionResult {
    pub fn new(text: impl Into<String>, usage: Usage) -> Self {
        Self {
            text: text.into(),
            usage,
            model: None,
            id: None,
            stop_reason: None,
            tool_calls: Vec::new(),
        }
    }
}

/// Completion provider seam.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult, FirewallError>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    mcp_servers: Vec<McpServerDefinition<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoiceParam>,
}

#[derive(Debug, Serialize)]
struct McpServerDefinition<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    url: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_configuration: Option<ToolConfiguration<'a>>,
}

#[derive(Debug, Serialize)]
struct ToolConfiguration<'a> {
    enabled: bool,
    allowed_tools: &'a [String],
}

#[derive(Debug, Serialize)]
struct ToolChoiceParam {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl<'a> From<&'a McpServerSpec> for McpServerDefinition<'a> {
    fn from(server: &'a McpServerSpec) -> Self {
        Self {
            kind: "url",
            url: &server.url,
            name: &server.name,
            authorization_token: server.authorization_token.as_deref(),
            tool_configuration: server.allowed_tools.as_ref().map(|tools| ToolConfiguration {
                enabled: true,
                allowed_tools: tools,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    McpToolUse {
        name: String,
        #[serde(default)]
        server_name: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

impl From<MessagesResponse> for CompletionResult {
    fn from(response: MessagesResponse) -> Self {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ContentBlock::Text { text: part } => text.push_str(&part),
                ContentBlock::McpToolUse { name, server_name } => tool_calls.push(match server_name {
                    Some(server) => format!("{}/{}", server, name),
                    None => name,
                }),
                ContentBlock::Other => {}
            }
        }

        Self {
            text,
            usage: Usage::new(response.usage.input_tokens, response.usage.output_tokens),
            model: response.model,
            id: response.id,
            stop_reason: response.stop_reason,
            tool_calls,
        }
    }
}

/// [`CompletionProvider`] backed by the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicCompletion {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    anthropic_version: String,
    timeout_secs: u64,
}

impl AnthropicCompletion {
    pub fn new(config: &CompletionConfig, api_key: impl Into<String>) -> Result<Self, FirewallError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FirewallError::Config(format!("failed to build completion client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            anthropic_version: config.anthropic_version.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// The client timeout also covers reading the body, so both the send
    /// and the decode step can expire.
    fn transport_error(&self, err: reqwest::Error, context: &str) -> FirewallError {
        if err.is_timeout() {
            FirewallError::Timeout {
                stage: Stage::Completion,
                seconds: self.timeout_secs,
            }
        } else {
            FirewallError::completion(format!("{}: {}", context, err))
        }
    }

    fn build_body<'a>(&'a self, request: &'a CompletionRequest) -> MessagesRequest<'a> {
        let mcp_servers: Vec<_> = request.tools.servers.iter().map(McpServerDefinition::from).collect();
        let tool_choice = (!mcp_servers.is_empty()).then(|| ToolChoiceParam {
            kind: request.tools.tool_choice.as_str(),
        });

        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: request.system.as_deref(),
            messages: &request.messages,
            mcp_servers,
            tool_choice,
        }
    }
}

#[async_trait]
impl CompletionProvider for AnthropicCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult, FirewallError> {
        if request.messages.is_empty() {
            return Err(FirewallError::completion("request carries no messages"));
        }

        let body = self.build_body(request);
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            mcp_servers = body.mcp_servers.len(),
            "sending completion request"
        );

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.anthropic_version);
        if !body.mcp_servers.is_empty() {
            builder = builder.header("anthropic-beta", MCP_CONNECTOR_BETA);
        }

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e, "request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorBody>(&raw) {
                Ok(body) => format!("HTTP {} ({}): {}", status, body.error.kind, body.error.message),
                Err(_) => format!("HTTP {}: {}", status, raw.trim()),
            };
            return Err(FirewallError::completion(message));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(e, "invalid completion response"))?;

        let result = CompletionResult::from(parsed);
        info!(
            prompt_tokens = result.usage.prompt_tokens,
            completion_tokens = result.usage.completion_tokens,
            tool_calls = result.tool_calls.len(),
            "completion received"
        );
        Ok(result)
    }
}
