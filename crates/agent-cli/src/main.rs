//! rust-agent command line
//!
//! Runs one task to completion against the Anthropic provider, printing
//! assistant text as it arrives and the final answer at the end.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::provider::DEFAULT_MODEL;
use agent_core::{AgentBuilder, AgentError, AgentEvent, RunHandle, RunStatus, SubAgentSupervisor, ToolRegistry};
use agent_runtime::AnthropicProvider;
use agent_tools::{ShellManager, register_defaults, register_subagent_tools};

/// Autonomous tool-using agent
#[derive(Parser, Debug)]
#[command(name = "agent", version, about)]
struct Cli {
    /// Task for the agent
    #[arg(required = true)]
    prompt: Vec<String>,

    /// Model identifier
    #[arg(long, env = "AGENT_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Maximum model requests before the run stops
    #[arg(long, env = "AGENT_MAX_ITERATIONS", default_value_t = 25)]
    max_iterations: usize,

    /// Maximum tokens per model response
    #[arg(long, default_value_t = 4096)]
    max_tokens: u32,

    /// Do not offer sub-agent delegation tools
    #[arg(long)]
    no_subagents: bool,

    /// Replace the built-in system prompt with the contents of a file
    #[arg(long)]
    system_prompt_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment before parsing so .env can supply AGENT_* defaults
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let provider = Arc::new(
        AnthropicProvider::from_env().context("failed to configure the Anthropic provider")?,
    );

    let shells = Arc::new(ShellManager::new());
    let mut base = ToolRegistry::new();
    register_defaults(&mut base, &shells).context("failed to set up host tools")?;

    let mut builder = AgentBuilder::new()
        .provider(provider)
        .model(&cli.model)
        .max_tokens(cli.max_tokens)
        .max_iterations(cli.max_iterations);
    if let Some(path) = &cli.system_prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read system prompt from {}", path.display()))?;
        builder = builder.system_prompt(prompt);
    }

    // Nested agents see only the base tools, so they cannot spawn further agents
    let mut tools = base.clone();
    let base_agent = builder.tools(base).build()?;
    if !cli.no_subagents {
        let supervisor = Arc::new(SubAgentSupervisor::new(&base_agent));
        register_subagent_tools(&mut tools, &supervisor);
    }
    let agent = base_agent.with_tools(Arc::new(tools));

    tracing::info!(model = %cli.model, tools = agent.tools().len(), "agent ready");

    let code = run(&agent, cli.prompt.join(" ")).await;

    let killed = shells.clear();
    if killed > 0 {
        tracing::debug!(sessions = killed, "shell sessions cleared");
    }
    Ok(code)
}

async fn run(agent: &agent_core::Agent, prompt: String) -> ExitCode {
    let RunHandle {
        mut events,
        control,
        task,
        ..
    } = agent.start(prompt);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => render(&event),
                None => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                tracing::warn!("interrupt received, aborting run");
                control.abort();
            }
        }
    }

    match task.wait().await {
        Ok(outcome) if outcome.status == RunStatus::Cancelled => ExitCode::from(130),
        Ok(_) => ExitCode::SUCCESS,
        Err(AgentError::Cancelled) => ExitCode::from(130),
        Err(err) => {
            eprintln!("error: {}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

fn render(event: &AgentEvent) {
    match event {
        AgentEvent::User { .. } => {}
        AgentEvent::Assistant { content } => println!("{content}\n"),
        AgentEvent::Complete {
            result,
            tokens,
            interactions,
        } => {
            println!("{result}");
            eprintln!(
                "\n[{interactions} interactions, {} input + {} output tokens]",
                tokens.input_tokens, tokens.output_tokens
            );
        }
        AgentEvent::Cancelled { interactions } => {
            eprintln!("\n[cancelled after {interactions} interactions]");
        }
        // Reported from the run outcome
        AgentEvent::Error { .. } => {}
    }
}
