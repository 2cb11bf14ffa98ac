//! Remote tool schema handed to the completion provider.
//!
//! The provider connects to these MCP servers itself; this crate never
//! talks to them directly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the model may use the configured tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    #[default]
    Auto,
    /// The model must call at least one tool.
    Any,
    /// Tools are described but must not be called.
    None,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolChoice::Auto => "auto",
            ToolChoice::Any => "any",
            ToolChoice::None => "none",
        }
    }
}

/// Static description of the remote tools available to a completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(default)]
    pub tool_choice: ToolChoice,
    #[serde(default)]
    pub servers: Vec<McpServerSpec>,
}

impl ToolSpec {
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Server names, for logging.
    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name.as_str()).collect()
    }
}

/// One remote MCP server reachable by the provider.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerSpec {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_token: Option<String>,
    /// Restricts the server to these tools; all tools when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
}

impl fmt::Debug for McpServerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpServerSpec")
            .field("name", &self.name)
            .field("url", &self.url)
            .field(
                "authorization_token",
                &self.authorization_token.as_ref().map(|_| "****"),
            )
            .field("allowed_tools", &self.allowed_tools)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let server = McpServerSpec {
            name: "github".to_string(),
            url: "https://api.githubcopilot.com/mcp/".to_string(),
            authorization_token: Some("ghp_secret".to_string()),
            allowed_tools: None,
        };
        let debug = format!("{:?}", server);
        assert!(debug.contains("****"));
        assert!(!debug.contains("ghp_secret"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let spec: ToolSpec = serde_json::from_str(r#"{"servers": []}"#).unwrap();
        assert_eq!(spec.tool_choice, ToolChoice::Auto);
        assert!(spec.is_empty());

        let spec: ToolSpec = serde_json::from_str(
            r#"{"tool_choice": "none", "servers": [{"name": "github", "url": "https://example.com/mcp"}]}"#,
        )
        .unwrap();
        assert_eq!(spec.tool_choice, ToolChoice::None);
        assert_eq!(spec.server_names(), vec!["github"]);
        assert!(spec.servers[0].authorization_token.is_none());
    }
}
