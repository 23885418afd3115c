//! Verifies spreadsheet access end to end with a throwaway worksheet.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use folio_sync_core::{row, SpreadsheetBackend};

use super::{google_sheets, load_config, ConfigArgs};

const PROBE_PREFIX: &str = "folio-sync check";

pub async fn run(args: ConfigArgs) -> Result<()> {
    let config = load_config(&args)?;
    let name = config.sheets.spreadsheet_name.trim();
    if name.is_empty() {
        bail!("SPREADSHEET_NAME is not set");
    }

    let client = google_sheets(&config)?;
    println!("Service account: {}", client.client_email());
    println!("(share the spreadsheet with this address as an editor)");

    client
        .open(name)
        .await
        .with_context(|| format!("failed to open spreadsheet '{name}'"))?;
    println!("Opened '{name}'");

    let probe = format!("{PROBE_PREFIX} {}", Utc::now().format("%Y%m%d%H%M%S"));
    client
        .ensure_worksheet(&probe, 5, 2)
        .await
        .context("failed to create probe worksheet")?;
    let stamp = Utc::now().to_rfc3339();
    let written = client
        .write(&probe, "A1", &[row(["checked at", stamp.as_str()])])
        .await;
    if let Err(e) = client.delete_worksheet(&probe).await {
        warn!(worksheet = %probe, error = %e, "failed to delete probe worksheet");
    }
    written.context("failed to write probe worksheet")?;
    info!(worksheet = %probe, "write access confirmed");

    let titles = client
        .worksheets()
        .await
        .context("failed to list worksheets")?;
    println!();
    println!("Worksheets ({}):", titles.len());
    for title in &titles {
        println!("  {title}");
    }
    println!();
    println!("Spreadsheet access OK");
    Ok(())
}
