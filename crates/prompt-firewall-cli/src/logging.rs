//! Tracing subscriber setup. Logs go to stderr; stdout carries results only.

use prompt_firewall_core::{FirewallConfig, LogFormat};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over `log_level` from the settings.
pub fn init(config: &FirewallConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.log_format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}
