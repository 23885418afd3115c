//! Weekly premium aggregation over a trailing window.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use folio_sync_core::{row, AccountType, Row};

use crate::orders::EnrichedOrder;
use crate::render;

/// Premium totals for one Monday-aligned week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeeklyPremium {
    pub count: u32,
    /// Premium collected on sells/credits.
    pub premium: Decimal,
    /// Premium paid on buys/debits (buy-to-close).
    pub btc_premium: Decimal,
}

impl WeeklyPremium {
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.premium - self.btc_premium
    }

    fn add(&mut self, direction: &str, premium: Decimal) {
        self.count += 1;
        if direction.contains("sell") || direction.contains("credit") {
            self.premium += premium;
        } else if direction.contains("buy") || direction.contains("debit") {
            self.btc_premium += premium;
        }
    }
}

/// Monday of the week containing `at`, in UTC.
#[must_use]
pub fn week_start(at: DateTime<Utc>) -> NaiveDate {
    let date = at.date_naive();
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// The `weeks` most recent week starts, newest first.
#[must_use]
pub fn trailing_weeks(now: DateTime<Utc>, weeks: u32) -> Vec<NaiveDate> {
    let current = week_start(now);
    (0..weeks)
        .map(|i| current - Duration::weeks(i64::from(i)))
        .collect()
}

/// Totals keyed by week start, overall and per account type.
#[derive(Debug, Clone, Default)]
pub struct PremiumSummary {
    pub overall: BTreeMap<NaiveDate, WeeklyPremium>,
    pub by_account: HashMap<AccountType, BTreeMap<NaiveDate, WeeklyPremium>>,
}

impl PremiumSummary {
    /// Aggregates filled orders created within `weeks` of `now` with a
    /// positive premium.
    #[must_use]
    pub fn aggregate(orders: &[EnrichedOrder], weeks: u32, now: DateTime<Utc>) -> Self {
        let cutoff = now - Duration::weeks(i64::from(weeks));
        let mut summary = Self::default();

        for order in orders {
            if !order.is_filled() {
                continue;
            }
            let Some(created) = order.created_at else {
                continue;
            };
            if created < cutoff || order.total_premium <= Decimal::ZERO {
                continue;
            }

            let week = week_start(created);
            summary
                .overall
                .entry(week)
                .or_default()
                .add(&order.direction, order.total_premium);
            summary
                .by_account
                .entry(order.account_type)
                .or_default()
                .entry(week)
                .or_default()
                .add(&order.direction, order.total_premium);
        }

        summary
    }

    #[must_use]
    pub fn week(&self, account: AccountType, week: NaiveDate) -> WeeklyPremium {
        self.by_account
            .get(&account)
            .and_then(|weeks| weeks.get(&week))
            .copied()
            .unwrap_or_default()
    }
}

/// Fixed-size table for one account type: title, headers and one row per
/// trailing week, zero-filled where nothing traded.
#[must_use]
pub fn weekly_table(
    summary: &PremiumSummary,
    account: AccountType,
    now: DateTime<Utc>,
    weeks: u32,
) -> Vec<Row> {
    let mut rows = vec![
        row([format!("{account} Weekly Premium Summary")]),
        row(["Week", "Total Premium", "BTC Premium", "Net Premium"]),
    ];
    for week in trailing_weeks(now, weeks) {
        let stats = summary.week(account, week);
        rows.push(row([
            week.format("%Y-%m-%d").to_string(),
            render::money(stats.premium),
            render::money(stats.btc_premium),
            render::money(stats.net()),
        ]));
    }
    rows
}
