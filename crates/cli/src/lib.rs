pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "mesero",
    about = "Mesero operator CLI",
    long_about = "Operate the Mesero ordering backend: migrations, demo data, config inspection, readiness and inventory alerts.",
    after_help = "Examples:\n  mesero doctor --json\n  mesero seed\n  mesero alerts --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo menu, ingredients and promotions (idempotent)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, LLM credentials, DB connectivity and schema")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Show the current low-stock and out-of-stock inventory alert")]
    Alerts {
        #[arg(long, help = "Embed the alert report as JSON instead of the rendered message")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Alerts { json } => commands::alerts::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
