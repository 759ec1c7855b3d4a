//! Predictive Irrigation CLI
//!
//! Trains and queries the irrigation model locally, and drives a running
//! irrigation agent over its HTTP API.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{agent, local, ReadingArgs};
use irrigation_engine::ControlMode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Predictive Irrigation CLI
#[derive(Parser)]
#[command(name = "irr")]
#[command(author, version, about = "CLI for the Predictive Irrigation engine", long_about = None)]
pub struct Cli {
    /// Agent API URL (can also be set via IRR_API_URL env var)
    #[arg(long, env = "IRR_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model on synthetic soil data
    Train(local::TrainArgs),

    /// Score a reading locally
    Predict(local::PredictArgs),

    /// Talk to a running irrigation agent
    #[command(subcommand)]
    Agent(AgentCommands),
}

#[derive(Subcommand)]
pub enum AgentCommands {
    /// Show health, readiness and pump state
    Status,

    /// Run one monitoring cycle with a reading
    Cycle(ReadingArgs),

    /// Switch control mode
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,
    },

    /// Toggle the pump (manual mode only)
    Toggle,

    /// Show the served model
    Model,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Auto,
    Manual,
}

impl From<ModeArg> for ControlMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => ControlMode::Auto,
            ModeArg::Manual => ControlMode::Manual,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring unreadable config file");
        config::Config::default()
    });

    match cli.command {
        Commands::Train(args) => local::train(args, cli.format).await,
        Commands::Predict(args) => {
            local::predict(args, config.model_path.clone(), cli.format).await
        }
        Commands::Agent(command) => {
            let client = client::ApiClient::new(&config.resolve_api_url(cli.api_url.as_deref()))?;
            match command {
                AgentCommands::Status => agent::status(&client, cli.format).await,
                AgentCommands::Cycle(reading) => agent::cycle(&client, reading, cli.format).await,
                AgentCommands::Mode { mode } => {
                    agent::set_mode(&client, mode.into(), cli.format).await
                }
                AgentCommands::Toggle => agent::toggle(&client, cli.format).await,
                AgentCommands::Model => agent::model(&client, cli.format).await,
            }
        }
    }
}
