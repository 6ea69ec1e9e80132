pub mod bootstrap;
pub mod commands;
pub mod input;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use chatflow_core::config::LoadOptions;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "chatflow",
    about = "Rule-driven customer-service chatbot",
    long_about = "Run an interactive rule-driven chat session, validate rules and data files, and inspect configuration.",
    after_help = "Examples:\n  chatflow chat\n  chatflow check --config chatflow.toml\n  chatflow config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a chatflow.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive chat session on the console")]
    Chat {
        #[arg(long, help = "Session identifier (defaults to a random id)")]
        session: Option<String>,
    },
    #[command(about = "Validate config, rules and data files and return structured status output")]
    Check,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Chat { session } => commands::chat::run(options, session),
        Command::Check => commands::check::run(options),
        Command::Config => commands::config::run(options),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}
