//! The `run` command: login, open the spreadsheet, run the stages.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use folio_sync_core::{Brokerage, SpreadsheetBackend};
use folio_sync_reporting::{Pipeline, Stage};
use folio_sync_sheets::MemorySpreadsheet;

use super::{google_sheets, load_config, robinhood, ConfigArgs};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Stage to run (repeatable): balances, stocks, orders, options, trades.
    /// Defaults to all stages.
    #[arg(long = "stage", value_name = "STAGE")]
    pub stages: Vec<Stage>,

    /// Trailing weeks in the weekly premium tables
    #[arg(long)]
    pub weeks: Option<u32>,

    /// Render into memory and print the worksheets instead of writing to Google Sheets
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(weeks) = args.weeks {
        config.report.premium_weeks = weeks;
    }
    config.validate().context("invalid configuration")?;

    let stages = if args.stages.is_empty() {
        Stage::ALL.to_vec()
    } else {
        args.stages
    };

    let brokerage = Arc::new(robinhood(&config)?);
    brokerage.login().await.context("brokerage login failed")?;

    let spreadsheet = &config.sheets.spreadsheet_name;
    let memory = args
        .dry_run
        .then(|| Arc::new(MemorySpreadsheet::new(spreadsheet.clone())));
    let sheets: Arc<dyn SpreadsheetBackend> = match &memory {
        Some(memory) => memory.clone(),
        None => Arc::new(google_sheets(&config)?),
    };
    sheets
        .open(spreadsheet)
        .await
        .with_context(|| format!("failed to open spreadsheet '{spreadsheet}'"))?;

    info!(
        stages = ?stages.iter().map(ToString::to_string).collect::<Vec<_>>(),
        dry_run = args.dry_run,
        "starting run"
    );
    let pipeline = Pipeline::new(brokerage, sheets, &config);
    let report = pipeline.run(&stages).await;
    report.log();

    if let Some(memory) = memory {
        for stage in &stages {
            let title = pipeline.worksheet_title(*stage);
            println!("=== {title} ===");
            for line in memory.dump(title) {
                println!("{}", line.join("\t"));
            }
            println!();
        }
    }

    let failed = report.failed().count();
    if failed > 0 {
        bail!("{failed} of {} stages failed", report.results.len());
    }
    Ok(())
}
