//! Account balances worksheet.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use folio_sync_core::{row, AccountProfile, AccountType, CellFormat, PortfolioSnapshot, Row};

use crate::context::{StageContext, ACCOUNT_PAUSE};
use crate::layout::SheetLayout;
use crate::render::{self, money};
use crate::types::StageError;

const GRID_ROWS: u32 = 60;
const ACCOUNT_BLOCKS: [(AccountType, &str); 3] = [
    (AccountType::Standard, "A14"),
    (AccountType::Ira, "A25"),
    (AccountType::Third, "A36"),
];
const CRYPTO_BLOCK: &str = "A47";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountBalance {
    pub equity: Decimal,
    pub cash: Decimal,
    pub options_collateral: Decimal,
    pub available_cash: Decimal,
    pub unsettled_funds: Decimal,
}

impl AccountBalance {
    #[must_use]
    pub fn new(profile: &AccountProfile, portfolio: &PortfolioSnapshot) -> Self {
        Self {
            equity: portfolio.equity,
            cash: profile.cash,
            options_collateral: profile.cash_held_for_options_collateral,
            available_cash: profile.cash - profile.cash_held_for_options_collateral,
            unsettled_funds: profile.unsettled_funds,
        }
    }
}

/// Per-account balances and their totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceSummary {
    pub by_account: BTreeMap<AccountType, AccountBalance>,
    pub crypto_equity: Decimal,
}

impl BalanceSummary {
    /// Equity across accounts plus positive crypto equity.
    #[must_use]
    pub fn total_equity(&self) -> Decimal {
        let equity: Decimal = self.by_account.values().map(|b| b.equity).sum();
        equity + self.crypto_equity.max(Decimal::ZERO)
    }

    #[must_use]
    pub fn total_cash(&self) -> Decimal {
        self.by_account.values().map(|b| b.cash).sum()
    }

    #[must_use]
    pub fn options_collateral(&self) -> Decimal {
        self.by_account.values().map(|b| b.options_collateral).sum()
    }

    #[must_use]
    pub fn available_cash(&self) -> Decimal {
        self.total_cash() - self.options_collateral()
    }

    #[must_use]
    pub fn unsettled_funds(&self) -> Decimal {
        self.by_account.values().map(|b| b.unsettled_funds).sum()
    }
}

/// Reads profile and portfolio for every registered account. A failed read
/// fails the stage; the unified crypto equity is optional.
pub async fn collect(ctx: &StageContext<'_>) -> Result<BalanceSummary, StageError> {
    let brokerage = ctx.brokerage;
    let mut summary = BalanceSummary::default();

    for (i, account) in ctx.registry.accounts().iter().enumerate() {
        if i > 0 {
            ctx.pause(ACCOUNT_PAUSE).await;
        }
        let id = account.id.as_str();
        let profile = ctx.fetch(move || brokerage.account_profile(id)).await?;
        let portfolio = ctx.fetch(move || brokerage.portfolio(id)).await?;
        let balance = AccountBalance::new(&profile, &portfolio);
        debug!(account = %account.kind, equity = %balance.equity, "loaded balance");
        summary.by_account.insert(account.kind, balance);
    }

    match ctx.fetch(move || brokerage.unified_account()).await {
        Ok(unified) => {
            summary.crypto_equity = unified
                .crypto_equity
                .filter(|e| *e > Decimal::ZERO)
                .unwrap_or(Decimal::ZERO);
        }
        Err(e) => warn!(error = %e, "crypto equity unavailable"),
    }

    Ok(summary)
}

fn account_block(title: &str, balance: AccountBalance) -> Vec<Row> {
    vec![
        row([title.to_string()]),
        row(["Equity".to_string(), money(balance.equity)]),
        row(["Cash".to_string(), money(balance.cash)]),
        row([
            "Cash for Options Collateral".to_string(),
            money(balance.options_collateral),
        ]),
        row(["Available Cash".to_string(), money(balance.available_cash)]),
        row(["Unsettled Funds".to_string(), money(balance.unsettled_funds)]),
        row(["Total".to_string(), money(balance.equity)]),
    ]
}

/// Summary at A1, one block per configured account slot and a crypto block.
#[must_use]
pub fn balances_layout(title: &str, summary: &BalanceSummary, updated_at: &str) -> SheetLayout {
    let mut layout = SheetLayout::new(title).with_grid(GRID_ROWS, 20);

    let total_equity = summary.total_equity();
    layout.push_block(
        "A1",
        vec![
            row(["Account Balances"]),
            row([format!("Last Updated: {updated_at}")]),
            row([""]),
            row(["Total Equity".to_string(), money(total_equity)]),
            row([
                "Total Cash (Including CSP Collateral)".to_string(),
                money(summary.total_cash()),
            ]),
            row([
                "Cash for Options Collateral (CSPs)".to_string(),
                money(summary.options_collateral()),
            ]),
            row(["Available Cash".to_string(), money(summary.available_cash())]),
            row(["Unsettled Funds".to_string(), money(summary.unsettled_funds())]),
            row(["Total Account Value".to_string(), money(total_equity)]),
        ],
    );

    for (kind, anchor) in ACCOUNT_BLOCKS {
        let balance = summary.by_account.get(&kind).copied().unwrap_or_default();
        layout.push_block(anchor, account_block(&format!("{kind} Account"), balance));
    }
    layout.push_block(
        CRYPTO_BLOCK,
        vec![
            row(["Crypto Account"]),
            row(["Equity".to_string(), render::money(summary.crypto_equity)]),
            row(["Total".to_string(), render::money(summary.crypto_equity)]),
        ],
    );
    layout.data_rows = summary.by_account.len();

    layout.push_format("A1", CellFormat::heading(14));
    for (_, anchor) in ACCOUNT_BLOCKS {
        layout.push_format(anchor, CellFormat::heading(12));
    }
    layout.push_format(CRYPTO_BLOCK, CellFormat::heading(12));
    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance(equity: Decimal, cash: Decimal, collateral: Decimal) -> AccountBalance {
        AccountBalance::new(
            &AccountProfile {
                account_number: "A".to_string(),
                cash,
                cash_held_for_options_collateral: collateral,
                unsettled_funds: dec!(5),
            },
            &PortfolioSnapshot {
                account_number: "A".to_string(),
                equity,
            },
        )
    }

    fn summary() -> BalanceSummary {
        let mut summary = BalanceSummary::default();
        summary
            .by_account
            .insert(AccountType::Standard, balance(dec!(10000), dec!(3000), dec!(1000)));
        summary
            .by_account
            .insert(AccountType::Ira, balance(dec!(5000), dec!(500), dec!(0)));
        summary.crypto_equity = dec!(250.5);
        summary
    }

    #[test]
    fn available_cash_excludes_collateral() {
        let b = balance(dec!(1), dec!(3000), dec!(1000));
        assert_eq!(b.available_cash, dec!(2000));
    }

    #[test]
    fn totals_include_crypto_equity() {
        let s = summary();
        assert_eq!(s.total_equity(), dec!(15250.5));
        assert_eq!(s.total_cash(), dec!(3500));
        assert_eq!(s.available_cash(), dec!(2500));
        assert_eq!(s.unsettled_funds(), dec!(10));
    }

    #[test]
    fn layout_places_fixed_blocks() {
        let layout = balances_layout("Account Balances", &summary(), "06/05/2024 08:00 AM");
        let anchors: Vec<&str> = layout.blocks.iter().map(|b| b.anchor.as_str()).collect();
        assert_eq!(anchors, vec!["A1", "A14", "A25", "A36", "A47"]);
        assert_eq!(layout.grid_rows, 60);

        let head = &layout.blocks[0].rows;
        assert_eq!(head[1][0].display(), "Last Updated: 06/05/2024 08:00 AM");
        assert_eq!(head[3][1].display(), "$15250.50");
        assert_eq!(head[6][1].display(), "$2500.00");

        // No third account configured: zeros, not a missing block.
        let third = &layout.blocks[3].rows;
        assert_eq!(third[0][0].display(), "Third Account");
        assert_eq!(third[1][1].display(), "$0.00");
        assert_eq!(layout.blocks[4].rows[1][1].display(), "$250.50");
    }
}
