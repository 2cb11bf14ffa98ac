//! Prompt Firewall CLI

mod cli;
mod logging;
mod output;

use anyhow::Context;
use clap::Parser;
use prompt_firewall_core::{Conversation, Credentials, FirewallConfig, FirewallPipeline};
use std::future::Future;
use std::io::Write;
use std::process::ExitCode;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, info};

use crate::cli::Args;
use crate::output::{
    error_exit_code, exit, outcome_exit_code, render_error, render_outcome, EXIT_SUCCESS,
};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => exit(code),
        Err(err) => {
            eprint!("{}", render_error(&err));
            exit(error_exit_code(&err))
        }
    }
}

async fn run(args: Args) -> anyhow::Result<u8> {
    let config = FirewallConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;
    logging::init(&config);

    let pipeline = prepare(&config, |name| std::env::var(name).ok())?;

    info!(
        gates_enabled = pipeline.gates_enabled(),
        mcp_servers = ?pipeline.tools().server_names(),
        model = %config.completion.model,
        "prompt firewall ready"
    );

    match args.prompt {
        Some(prompt) => single_pass(&pipeline, &prompt).await,
        None => {
            let stdin = BufReader::new(tokio::io::stdin());
            session(&pipeline, stdin, shutdown_signal).await
        }
    }
}

/// Credentials first, then settings validation inside `from_config`.
fn prepare<F>(config: &FirewallConfig, lookup: F) -> anyhow::Result<FirewallPipeline>
where
    F: Fn(&str) -> Option<String>,
{
    let credentials = Credentials::resolve(config, lookup)?;
    FirewallPipeline::from_config(config, &credentials).context("failed to build pipeline")
}

async fn single_pass(pipeline: &FirewallPipeline, prompt: &str) -> anyhow::Result<u8> {
    let report = pipeline.execute(prompt).await.context("pipeline run failed")?;
    debug!(trace = %serde_json::to_string(&report.trace).unwrap_or_default(), "run trace");

    print!("{}", render_outcome(&report.outcome, pipeline.fallback_response()));
    std::io::stdout().flush()?;
    Ok(outcome_exit_code(&report.outcome))
}

/// One prompt per line until end of input or `shutdown` resolves, whether
/// that happens while waiting for a prompt or during a turn. A failed turn
/// is reported and the session continues.
async fn session<R, S, F>(pipeline: &FirewallPipeline, input: R, shutdown: S) -> anyhow::Result<u8>
where
    R: AsyncBufRead + Unpin,
    S: Fn() -> F,
    F: Future<Output = ()>,
{
    let mut conversation = Conversation::new();
    let mut lines = input.lines();

    loop {
        print!("Prompt: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read prompt")?,
            _ = shutdown() => None,
        };
        let Some(line) = line else { break };

        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }

        let turn = tokio::select! {
            turn = pipeline.run_turn(&mut conversation, prompt) => turn,
            _ = shutdown() => break,
        };

        match turn {
            Ok(report) => {
                debug!(trace = %serde_json::to_string(&report.trace).unwrap_or_default(), "run trace");
                print!("{}", render_outcome(&report.outcome, pipeline.fallback_response()));
            }
            Err(err) => eprint!("{}", render_error(&anyhow::Error::new(err))),
        }
    }

    println!();
    info!(turns = conversation.len() / 2, "session ended");
    Ok(EXIT_SUCCESS)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, ending session"),
        _ = terminate => info!("Received SIGTERM, ending session"),
    }
}
