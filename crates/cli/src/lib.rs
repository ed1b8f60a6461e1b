pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "groupware",
    about = "Groupware operator CLI",
    long_about = "Apply migrations, load demo data, inspect configuration, check readiness, and issue operator tokens.",
    after_help = "Examples:\n  groupware doctor --json\n  groupware config\n  groupware token --user-id 1 --role ADMIN"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo users, customers, and products (safe to re-run)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database, upload directory, and PDF converter readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Issue a bearer token for an existing user")]
    Token {
        #[arg(long, help = "Id of the user the token is issued for")]
        user_id: i64,
        #[arg(long, help = "Role claim override: ADMIN or USER")]
        role: Option<String>,
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
        Command::Token { user_id, role } => commands::token::run(user_id, role.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
