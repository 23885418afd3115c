//! CLI commands for folio-sync.

pub mod accounts;
pub mod check_config;
pub mod check_sheets;
pub mod run;

use anyhow::{Context, Result};
use clap::Args;

use folio_sync_brokerage::{RobinhoodClient, RobinhoodConfig};
use folio_sync_core::{AppConfig, ConfigLoader};
use folio_sync_sheets::{GoogleSheetsClient, ServiceAccountAuth, SheetsClientConfig};

pub use run::RunArgs;

/// Shared `--config` argument.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,
}

pub fn load_config(args: &ConfigArgs) -> Result<AppConfig> {
    ConfigLoader::load_from(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config))
}

pub fn robinhood(config: &AppConfig) -> Result<RobinhoodClient> {
    RobinhoodClient::new(RobinhoodConfig::from(&config.brokerage))
        .context("failed to build brokerage client")
}

pub fn google_sheets(config: &AppConfig) -> Result<GoogleSheetsClient> {
    let path = &config.sheets.credentials_file;
    let auth = ServiceAccountAuth::from_file(path)
        .with_context(|| format!("failed to load service account from {}", path.display()))?;
    GoogleSheetsClient::new(SheetsClientConfig::from(&config.sheets), auth)
        .context("failed to build sheets client")
}
