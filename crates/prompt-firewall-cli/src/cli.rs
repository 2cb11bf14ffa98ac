//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

/// Gate an LLM completion behind the prompt firewall.
///
/// With a PROMPT, runs one pipeline pass and prints the result. Without
/// one, reads prompts line by line from standard input and keeps the
/// conversation going until end of input.
#[derive(Debug, Parser)]
#[command(name = "prompt-firewall", version, about)]
pub struct Args {
    /// Prompt for a single pipeline pass.
    pub prompt: Option<String>,

    /// TOML settings file (defaults to ./prompt-firewall.toml when present).
    #[arg(long, short, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
