//! Lists the brokerage accounts visible to the configured login.

use anyhow::{Context, Result};
use tracing::warn;

use folio_sync_core::{AccountRegistry, AccountType, Brokerage};

use super::{load_config, robinhood, ConfigArgs};

pub async fn run(args: ConfigArgs) -> Result<()> {
    let config = load_config(&args)?;
    let client = robinhood(&config)?;
    client.login().await.context("brokerage login failed")?;

    let registry = AccountRegistry::from_config(&config.accounts);
    let accounts = client
        .list_accounts()
        .await
        .context("failed to list accounts")?;

    println!();
    println!("{:<16} {:<18} {:<10}", "Account", "Broker type", "Slot");
    println!("{}", "-".repeat(46));
    for account in &accounts {
        println!(
            "{:<16} {:<18} {:<10}",
            account.account_number,
            account.kind.as_deref().unwrap_or("-"),
            registry.account_type(&account.account_number).label()
        );
    }
    println!();

    for configured in registry.accounts() {
        if !accounts.iter().any(|a| a.account_number == configured.id) {
            warn!(
                account = %configured.id,
                slot = %configured.kind,
                "configured account not returned by the brokerage"
            );
        }
    }
    if registry.id_for(AccountType::Standard).is_none() {
        warn!("MAIN_ACCOUNT is not set; runs will fail validation");
    }
    Ok(())
}
