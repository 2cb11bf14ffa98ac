//! Configuration and credential loading.
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional TOML file, then `PROMPT_FIREWALL__*` environment overrides.
//! Credentials never come from the file; they are read from the environment
//! variables named by `scanner.api_key_env` and `completion.api_key_env`.

use crate::error::FirewallError;
use crate::tools::ToolSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// File picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "prompt-firewall.toml";

/// Prefix for environment overrides (`PROMPT_FIREWALL__GATES_ENABLED=false`).
pub const ENV_PREFIX: &str = "PROMPT_FIREWALL";

pub const DEFAULT_FALLBACK_RESPONSE: &str =
    "Your prompt violated our safety policies. Please rephrase.";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You have access to GitHub data through MCP tools. \
Use these tools to gather information about users and their contributions. \
Available tools include search_users, list_repositories, and other GitHub-related functions.";

/// Top-level settings, built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallConfig {
    /// When false both gates are skipped and completions are returned raw.
    pub gates_enabled: bool,
    /// Shown to the user, and recorded in a conversation, in place of a
    /// blocked answer.
    pub fallback_response: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub scanner: ScannerConfig,
    pub completion: CompletionConfig,
    pub tools: ToolSpec,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            gates_enabled: true,
            fallback_response: DEFAULT_FALLBACK_RESPONSE.to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            scanner: ScannerConfig::default(),
            completion: CompletionConfig::default(),
            tools: ToolSpec::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Scanning service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Base URL of the scanning service; required while gates are enabled.
    pub base_url: String,
    /// Identifies the end user to the scanner.
    pub user_info: String,
    pub timeout_secs: u64,
    pub api_key_env: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            user_info: String::new(),
            timeout_secs: 30,
            api_key_env: "ACCUKNOX_API_KEY".to_string(),
        }
    }
}

impl ScannerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Completion provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    pub anthropic_version: String,
    pub timeout_secs: u64,
    pub api_key_env: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 1024,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            anthropic_version: "2023-06-01".to_string(),
            timeout_secs: 120,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
        }
    }
}

impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl FirewallConfig {
    /// Load settings from an explicit file, or from [`DEFAULT_CONFIG_FILE`]
    /// when it exists, then apply environment overrides.
    ///
    /// Settings are parsed but not validated: credentials are resolved
    /// first, so a missing key is reported even when the settings are
    /// incomplete too. [`FirewallPipeline::from_config`] validates.
    ///
    /// [`FirewallPipeline::from_config`]: crate::FirewallPipeline::from_config
    pub fn load(path: Option<&Path>) -> Result<Self, FirewallError> {
        Self::load_with_env(path, None)
    }

    /// Like [`FirewallConfig::load`], reading overrides from `env` instead of
    /// the process environment when it is given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, FirewallError> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<(), FirewallError> {
        if self.gates_enabled && self.scanner.base_url.trim().is_empty() {
            return Err(FirewallError::Config(
                "scanner.base_url is required while gates are enabled".to_string(),
            ));
        }
        if self.scanner.timeout_secs == 0 || self.completion.timeout_secs == 0 {
            return Err(FirewallError::Config(
                "timeouts must be at least one second".to_string(),
            ));
        }
        if self.completion.base_url.trim().is_empty() {
            return Err(FirewallError::Config(
                "completion.base_url must not be empty".to_string(),
            ));
        }
        if self.completion.model.trim().is_empty() {
            return Err(FirewallError::Config(
                "completion.model must not be empty".to_string(),
            ));
        }
        if self.completion.max_tokens == 0 {
            return Err(FirewallError::Config(
                "completion.max_tokens must be positive".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for server in &self.tools.servers {
            if server.name.is_empty() || server.url.is_empty() {
                return Err(FirewallError::Config(
                    "every MCP server needs a name and a url".to_string(),
                ));
            }
            if !names.insert(server.name.as_str()) {
                return Err(FirewallError::Config(format!(
                    "duplicate MCP server name: {}",
                    server.name
                )));
            }
        }
        Ok(())
    }
}

/// API keys resolved at startup.
#[derive(Clone)]
pub struct Credentials {
    /// Absent when gates are disabled.
    pub scanner_api_key: Option<String>,
    pub completion_api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("scanner_api_key", &self.scanner_api_key.as_ref().map(|_| "****"))
            .field("completion_api_key", &"****")
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env(config: &FirewallConfig) -> Result<Self, FirewallError> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Resolve credentials through `lookup`, failing on the first required
    /// variable that is unset or blank.
    pub fn resolve<F>(config: &FirewallConfig, lookup: F) -> Result<Self, FirewallError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| FirewallError::MissingCredential {
                    variable: name.to_string(),
                })
        };

        let scanner_api_key = if config.gates_enabled {
            Some(require(&config.scanner.api_key_env)?)
        } else {
            None
        };
        let completion_api_key = require(&config.completion.api_key_env)?;

        Ok(Self {
            scanner_api_key,
            completion_api_key,
        })
    }
}
