use clap::{Parser, Subcommand};

mod commands;

use commands::{ConfigArgs, RunArgs};

#[derive(Parser)]
#[command(name = "folio-sync")]
#[command(about = "Sync brokerage balances, positions and orders into a spreadsheet", long_about = None)]
struct Cli {
    /// Optional log file path (logs to file instead of stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the report stages and publish them to the spreadsheet
    Run(RunArgs),
    /// Log in and list brokerage accounts with their configured types
    Accounts(ConfigArgs),
    /// Validate configuration without touching the network
    CheckConfig(ConfigArgs),
    /// Verify spreadsheet access with a throwaway worksheet
    CheckSheets(ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .init();
        }
    }

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Accounts(args) => commands::accounts::run(args).await,
        Commands::CheckConfig(args) => commands::check_config::run(&args),
        Commands::CheckSheets(args) => commands::check_sheets::run(args).await,
    }
}
