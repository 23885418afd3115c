//! Offline configuration check.
//!
//! Reports every required value (masked), the optional account ids, the
//! service-account key file and the effective worksheet names, then exits
//! non-zero when anything required is missing or invalid.

use anyhow::Result;

use folio_sync_core::{AccountRegistry, AccountType, AppConfig};
use folio_sync_sheets::ServiceAccountKey;

use super::{load_config, ConfigArgs};

#[derive(Debug)]
struct CheckResult {
    name: &'static str,
    passed: bool,
    message: String,
}

impl CheckResult {
    fn pass(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            passed: true,
            message: message.into(),
        }
    }

    fn fail(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            passed: false,
            message: message.into(),
        }
    }
}

pub fn run(args: &ConfigArgs) -> Result<()> {
    let config = load_config(args)?;

    println!();
    println!("Configuration ({})", args.config);
    println!("------------------------------------------------------------");

    let results = collect_checks(&config);
    for result in &results {
        let mark = if result.passed { "ok  " } else { "FAIL" };
        println!("  [{mark}] {:<24} {}", result.name, result.message);
    }

    println!();
    println!("Worksheets");
    println!("------------------------------------------------------------");
    let sheets = &config.sheets;
    for title in [
        &sheets.balances_sheet,
        &sheets.stock_positions_sheet,
        &sheets.options_orders_sheet,
        &sheets.option_positions_sheet,
        &sheets.recent_trades_sheet,
    ] {
        println!("  {title}");
    }

    let registry = AccountRegistry::from_config(&config.accounts);
    println!();
    println!("Accounts ({})", registry.len());
    println!("------------------------------------------------------------");
    for account in registry.accounts() {
        println!("  {:<12} {}", account.kind.label(), mask(&account.id));
    }

    let failed: Vec<_> = results.iter().filter(|r| !r.passed).collect();
    println!();
    if failed.is_empty() {
        println!("Configuration is complete.");
        return Ok(());
    }

    println!("Fix before running:");
    for failure in &failed {
        println!("  - {}: {}", failure.name, failure.message);
    }
    println!();
    std::process::exit(1);
}

fn collect_checks(config: &AppConfig) -> Vec<CheckResult> {
    let mut results = vec![
        required("ROBINHOOD_USER", &config.brokerage.username, false),
        required("ROBINHOOD_PASS", &config.brokerage.password, true),
        required("MAIN_ACCOUNT", &config.accounts.primary, false),
        required("SPREADSHEET_NAME", &config.sheets.spreadsheet_name, false),
        optional("IRA_ACCOUNT", config.accounts.ira.as_deref()),
        optional("THIRD_ACCOUNT", config.accounts.third.as_deref()),
    ];

    let path = &config.sheets.credentials_file;
    results.push(match ServiceAccountKey::from_file(path) {
        Ok(key) => CheckResult::pass(
            "GOOGLE_CREDENTIALS_FILE",
            format!("{} ({})", path.display(), key.client_email),
        ),
        Err(e) => CheckResult::fail("GOOGLE_CREDENTIALS_FILE", format!("{}: {e}", path.display())),
    });

    // Only meaningful once the required values are there.
    if results.iter().all(|r| r.passed) {
        if let Err(e) = config.validate() {
            results.push(CheckResult::fail("settings", e.to_string()));
        }
    }
    results
}

fn required(name: &'static str, value: &str, secret: bool) -> CheckResult {
    let value = value.trim();
    if value.is_empty() {
        CheckResult::fail(name, "missing")
    } else if secret {
        CheckResult::pass(name, "set (not shown)")
    } else {
        CheckResult::pass(name, mask(value))
    }
}

fn optional(name: &'static str, value: Option<&str>) -> CheckResult {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => CheckResult::pass(name, mask(v)),
        None => CheckResult::pass(name, format!("not set ({} disabled)", label_for(name))),
    }
}

fn label_for(name: &str) -> &'static str {
    match name {
        "IRA_ACCOUNT" => AccountType::Ira.label(),
        _ => AccountType::Third.label(),
    }
}

/// Keeps the first and last two characters of values longer than six.
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 6 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 4))
}
