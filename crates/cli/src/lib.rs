pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "cobranca",
    about = "Cobranca operator CLI",
    long_about = "Operate the cobranca ledger: migrations, demo fixtures, calendar-feed imports, and config inspection.",
    after_help = "Examples:\n  cobranca migrate\n  cobranca import feed.json\n  cobranca config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo ledger and verify it")]
    Seed,
    #[command(about = "Import an exported calendar feed file into the ledger")]
    Import {
        #[arg(help = "Path to the exported feed JSON file")]
        file: PathBuf,
    },
    #[command(
        about = "Inspect effective configuration values with secrets redacted"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Import { file } => commands::import::run(&file),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
