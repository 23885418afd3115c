//! Open option positions with strategy classification.

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use folio_sync_core::{
    row, AccountType, CellFormat, OptionInstrument, OptionMarketData, OptionPosition, OptionType,
    Row,
};

use crate::context::{
    allocation, StageContext, ACCOUNT_PAUSE, HOLDING_LOOKUP_PAUSE, OPTION_BATCH_PAUSE,
    OPTION_LOOKUP_BATCH, OPTION_LOOKUP_PAUSE,
};
use crate::layout::SheetLayout;
use crate::render::{money, optional, percent, plain};
use crate::strategy::{
    classify, ClassifierInput, CollateralBook, Holding, StrategyLabel, SHARES_PER_CONTRACT,
};
use crate::types::StageError;

pub const NO_OPTION_POSITIONS: &str = "No option positions found";

const HEADERS: [&str; 17] = [
    "Account",
    "Symbol",
    "Strike Price",
    "Expiration Date",
    "Option Type",
    "Strategy Type",
    "Quantity",
    "Average Price",
    "Current Price",
    "Total Value",
    "Allocation %",
    "Implied Volatility",
    "Delta",
    "Theta",
    "Gamma",
    "Vega",
    "Open Interest",
];

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedOptionPosition {
    pub account_type: AccountType,
    pub account_number: String,
    pub symbol: String,
    pub strike_price: Decimal,
    pub expiration_date: Option<NaiveDate>,
    pub option_type: Option<OptionType>,
    pub strategy: StrategyLabel,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub current_price: Decimal,
    pub total_value: Decimal,
    pub allocation: Decimal,
    pub market: OptionMarketData,
}

impl EnrichedOptionPosition {
    fn cells(&self) -> Row {
        let m = &self.market;
        row([
            self.account_type.to_string(),
            self.symbol.clone(),
            plain(self.strike_price),
            self.expiration_date
                .map_or_else(|| "N/A".to_string(), |d| d.format("%Y-%m-%d").to_string()),
            self.option_type
                .map_or_else(|| "N/A".to_string(), |t| t.to_string()),
            self.strategy.to_string(),
            plain(self.quantity),
            money(self.average_price),
            money(self.current_price),
            money(self.total_value),
            percent(self.allocation),
            optional(m.implied_volatility),
            optional(m.delta),
            optional(m.theta),
            optional(m.gamma),
            optional(m.vega),
            m.open_interest
                .map_or_else(|| "N/A".to_string(), |n| n.to_string()),
        ])
    }
}

/// Keeps the first position seen for each option id.
#[must_use]
pub fn dedupe(positions: Vec<OptionPosition>) -> Vec<OptionPosition> {
    let mut seen = HashSet::new();
    positions
        .into_iter()
        .filter(|p| {
            let fresh = seen.insert(p.option_id.clone());
            if !fresh {
                debug!(option_id = %p.option_id, "duplicate option position dropped");
            }
            fresh
        })
        .collect()
}

/// Combines a position with its instrument and market data.
#[must_use]
pub fn enrich(
    position: &OptionPosition,
    account_type: AccountType,
    instrument: &OptionInstrument,
    market: &OptionMarketData,
    book: &CollateralBook,
) -> EnrichedOptionPosition {
    let strategy = classify(
        &ClassifierInput {
            symbol: &instrument.chain_symbol,
            account: &position.account_number,
            option_type: instrument.option_type,
            strike: instrument.strike_price,
            contracts: position.quantity,
        },
        book,
    );
    let total_value = market.adjusted_mark_price * position.quantity * SHARES_PER_CONTRACT;

    EnrichedOptionPosition {
        account_type,
        account_number: position.account_number.clone(),
        symbol: instrument.chain_symbol.clone(),
        strike_price: instrument.strike_price,
        expiration_date: instrument.expiration_date,
        option_type: instrument.option_type,
        strategy,
        quantity: position.quantity,
        average_price: position.average_price,
        current_price: market.adjusted_mark_price,
        total_value,
        allocation: Decimal::ZERO,
        market: market.clone(),
    }
}

/// Cash collateral and share holdings per registered account. Lookup
/// failures leave gaps that make the classifier fall back to plain labels.
async fn collateral_book(ctx: &StageContext<'_>) -> CollateralBook {
    let brokerage = ctx.brokerage;
    let mut book = CollateralBook::new();

    for account in ctx.registry.accounts() {
        let id = account.id.as_str();
        match ctx.fetch(move || brokerage.account_profile(id)).await {
            Ok(profile) => book.set_cash_for_options(id, profile.cash_held_for_options_collateral),
            Err(e) => warn!(account = %account.kind, error = %e, "no collateral data"),
        }

        let positions = match ctx.fetch(move || brokerage.stock_positions(id)).await {
            Ok(positions) => positions,
            Err(e) => {
                warn!(account = %account.kind, error = %e, "no stock holdings");
                continue;
            }
        };
        for position in positions {
            let Some(url) = position.instrument_url.as_deref() else {
                continue;
            };
            match ctx.fetch(move || brokerage.instrument(url)).await {
                Ok(instrument) if !instrument.symbol.is_empty() => book.add_holding(
                    instrument.symbol,
                    id,
                    Holding {
                        total_shares: position.quantity,
                        collateral_shares: position.shares_held_for_options_collateral,
                    },
                ),
                Ok(_) => {}
                Err(e) => warn!(url, error = %e, "holding instrument lookup failed"),
            }
            ctx.pause(HOLDING_LOOKUP_PAUSE).await;
        }
    }

    book
}

/// Open option positions across accounts, classified and sorted by
/// allocation. Positions whose option data cannot be fetched are skipped.
pub async fn collect(
    ctx: &StageContext<'_>,
) -> Result<(Vec<EnrichedOptionPosition>, Decimal), StageError> {
    let brokerage = ctx.brokerage;
    let mut positions = Vec::new();

    for (i, account) in ctx.registry.accounts().iter().enumerate() {
        if i > 0 {
            ctx.pause(ACCOUNT_PAUSE).await;
        }
        let id = account.id.as_str();
        let found = ctx.fetch(move || brokerage.option_positions(id)).await?;
        debug!(account = %account.kind, count = found.len(), "option positions");
        positions.extend(found);
    }

    let positions = dedupe(positions);
    if positions.is_empty() {
        return Ok((Vec::new(), Decimal::ZERO));
    }

    let book = collateral_book(ctx).await;
    let total = ctx.portfolio_value(Decimal::ZERO).await;

    let mut enriched = Vec::with_capacity(positions.len());
    let mut batches = ctx
        .pacer
        .batches(&positions, OPTION_LOOKUP_BATCH, OPTION_BATCH_PAUSE);
    while let Some(batch) = batches.next().await {
        for position in batch {
            let option_id = position.option_id.as_str();
            let instrument = ctx.fetch(move || brokerage.option_instrument(option_id)).await;
            let market = ctx.fetch(move || brokerage.option_market_data(option_id)).await;
            ctx.pause(OPTION_LOOKUP_PAUSE).await;

            let (instrument, market) = match (instrument, market) {
                (Ok(instrument), Ok(market)) => (instrument, market),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(option_id, error = %e, "skipping option position without data");
                    continue;
                }
            };

            let account_type = ctx.registry.account_type(&position.account_number);
            let mut row = enrich(position, account_type, &instrument, &market, &book);
            row.allocation = allocation(row.total_value, total);
            enriched.push(row);
        }
    }

    enriched.sort_by(|a, b| b.allocation.cmp(&a.allocation));
    info!(
        positions = positions.len(),
        enriched = enriched.len(),
        "option positions enriched"
    );
    Ok((enriched, total))
}

#[must_use]
pub fn options_layout(
    title: &str,
    positions: &[EnrichedOptionPosition],
    portfolio_value: Decimal,
) -> SheetLayout {
    if positions.is_empty() {
        return SheetLayout::placeholder(title, NO_OPTION_POSITIONS);
    }

    let mut table = vec![
        row(["Option Positions"]),
        row([format!("Total Portfolio Value: {}", money(portfolio_value))]),
        row([""]),
        row(HEADERS),
    ];
    table.extend(positions.iter().map(EnrichedOptionPosition::cells));

    let mut layout = SheetLayout::new(title);
    layout.push_block("A1", table);
    layout.data_rows = positions.len();
    layout.push_format("A1", CellFormat::heading(14));
    layout.push_format("A4:Q4", CellFormat::bold());
    layout
}
