//! Recent filled trades across stock, option and crypto orders.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use folio_sync_core::{row, CellFormat, CryptoOrder, OptionOrder, Row, StockOrder};

use crate::context::{StageContext, ACCOUNT_PAUSE};
use crate::layout::SheetLayout;
use crate::render::{self, capitalize, money};
use crate::types::StageError;

pub const NO_TRADES: &str = "No filled trades found";
pub const CRYPTO_ACCOUNT: &str = "Crypto";

const HEADERS: [&str; 10] = [
    "Date",
    "Account",
    "Type",
    "Symbol",
    "Side",
    "Quantity",
    "Price",
    "Total Value",
    "Fees",
    "Status",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeKind {
    Stock,
    Option,
    Crypto,
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stock => "Stock",
            Self::Option => "Option",
            Self::Crypto => "Crypto",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub date: Option<DateTime<Utc>>,
    pub account: String,
    pub kind: TradeKind,
    pub symbol: String,
    pub side: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total_value: Decimal,
    pub fees: Decimal,
    pub state: String,
}

impl Trade {
    #[must_use]
    pub fn from_stock(order: &StockOrder, account: &str, symbol: String) -> Self {
        let price = order.average_price.or(order.price).unwrap_or(Decimal::ZERO);
        Self {
            date: order.created_at,
            account: account.to_string(),
            kind: TradeKind::Stock,
            symbol,
            side: capitalize(order.side.as_deref().unwrap_or_default()),
            quantity: order.quantity,
            price,
            total_value: price * order.quantity,
            fees: order.fees,
            state: order.state.clone(),
        }
    }

    /// Price per contract is the order premium over its quantity.
    #[must_use]
    pub fn from_option(order: &OptionOrder, account: &str) -> Self {
        let premium = order
            .processed_premium
            .filter(|p| !p.is_zero())
            .or(order.premium)
            .unwrap_or(Decimal::ZERO);
        let quantity = order.quantity.unwrap_or(Decimal::ONE);
        Self {
            date: order.created_at,
            account: account.to_string(),
            kind: TradeKind::Option,
            symbol: order
                .chain_symbol
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            side: capitalize(order.direction.as_deref().unwrap_or_default()),
            quantity,
            price: if quantity > Decimal::ZERO {
                premium / quantity
            } else {
                premium
            },
            total_value: premium,
            fees: Decimal::ZERO,
            state: order.state.clone(),
        }
    }

    #[must_use]
    pub fn from_crypto(order: &CryptoOrder, symbol: String) -> Self {
        let price = order.average_price.or(order.price).unwrap_or(Decimal::ZERO);
        Self {
            date: order.created_at,
            account: CRYPTO_ACCOUNT.to_string(),
            kind: TradeKind::Crypto,
            symbol,
            side: capitalize(order.side.as_deref().unwrap_or_default()),
            quantity: order.quantity,
            price,
            total_value: price * order.quantity,
            fees: Decimal::ZERO,
            state: order.state.clone(),
        }
    }

    fn cells(&self, tz: Tz) -> Row {
        let positive_money = |d: Decimal| {
            if d > Decimal::ZERO {
                money(d)
            } else {
                "N/A".to_string()
            }
        };
        // Fractional crypto and share quantities keep four places.
        let quantity = if self.quantity < Decimal::TEN {
            format!("{:.4}", self.quantity.round_dp(4))
        } else {
            render::fixed2(self.quantity)
        };
        row([
            self.date
                .map_or_else(|| "N/A".to_string(), |at| render::local_timestamp(at, tz)),
            self.account.clone(),
            self.kind.to_string(),
            self.symbol.clone(),
            if self.side.is_empty() {
                "N/A".to_string()
            } else {
                self.side.clone()
            },
            quantity,
            positive_money(self.price),
            positive_money(self.total_value),
            money(self.fees.max(Decimal::ZERO)),
            capitalize(&self.state),
        ])
    }
}

fn is_filled(state: &str) -> bool {
    state.eq_ignore_ascii_case("filled")
}

/// Newest first, undated trades last, then the first `limit`.
pub fn newest(trades: &mut Vec<Trade>, limit: usize) {
    trades.sort_by(|a, b| b.date.cmp(&a.date));
    trades.truncate(limit);
}

/// Symbol lookups cached per instrument URL or currency pair id.
#[derive(Default)]
struct SymbolCache(HashMap<String, String>);

impl SymbolCache {
    async fn instrument(&mut self, ctx: &StageContext<'_>, url: Option<&str>) -> String {
        let Some(url) = url else {
            return "Unknown".to_string();
        };
        if let Some(symbol) = self.0.get(url) {
            return symbol.clone();
        }
        let brokerage = ctx.brokerage;
        let symbol = match ctx.fetch(move || brokerage.instrument(url)).await {
            Ok(instrument) => instrument.symbol,
            Err(e) => {
                warn!(url, error = %e, "trade instrument lookup failed");
                "Unknown".to_string()
            }
        };
        self.0.insert(url.to_string(), symbol.clone());
        symbol
    }

    async fn currency_pair(&mut self, ctx: &StageContext<'_>, pair_id: Option<&str>) -> String {
        let Some(pair_id) = pair_id else {
            return "Unknown".to_string();
        };
        if let Some(symbol) = self.0.get(pair_id) {
            return symbol.clone();
        }
        let brokerage = ctx.brokerage;
        let symbol = match ctx.fetch(move || brokerage.currency_pair(pair_id)).await {
            Ok(pair) => pair.symbol,
            Err(e) => {
                warn!(pair_id, error = %e, "currency pair lookup failed");
                "Unknown".to_string()
            }
        };
        self.0.insert(pair_id.to_string(), symbol.clone());
        symbol
    }
}

/// Filled stock and option orders per account plus filled crypto orders.
/// Order listings per account are required; the crypto listing is not.
pub async fn collect(ctx: &StageContext<'_>) -> Result<Vec<Trade>, StageError> {
    let brokerage = ctx.brokerage;
    let mut symbols = SymbolCache::default();
    let mut trades = Vec::new();

    for (i, account) in ctx.registry.accounts().iter().enumerate() {
        if i > 0 {
            ctx.pause(ACCOUNT_PAUSE).await;
        }
        let id = account.id.as_str();
        let label = account.kind.label();

        let stock_orders = ctx.fetch(move || brokerage.stock_orders(id)).await?;
        for order in stock_orders.iter().filter(|o| is_filled(&o.state)) {
            let symbol = symbols.instrument(ctx, order.instrument_url.as_deref()).await;
            trades.push(Trade::from_stock(order, label, symbol));
        }

        let option_orders = ctx.fetch(move || brokerage.option_orders(id)).await?;
        trades.extend(
            option_orders
                .iter()
                .filter(|o| is_filled(&o.state))
                .map(|o| Trade::from_option(o, label)),
        );
        debug!(account = %account.kind, trades = trades.len(), "collected trades");
    }

    match ctx.fetch(move || brokerage.crypto_orders()).await {
        Ok(orders) => {
            for order in orders.iter().filter(|o| is_filled(&o.state)) {
                let symbol = symbols
                    .currency_pair(ctx, order.currency_pair_id.as_deref())
                    .await;
                trades.push(Trade::from_crypto(order, symbol));
            }
        }
        Err(e) => warn!(error = %e, "crypto orders unavailable"),
    }

    newest(&mut trades, ctx.report.trade_rows);
    Ok(trades)
}

#[must_use]
pub fn trades_layout(title: &str, trades: &[Trade], tz: Tz) -> SheetLayout {
    if trades.is_empty() {
        return SheetLayout::placeholder(title, NO_TRADES);
    }

    let mut table = vec![
        row([format!("Last {} Filled Trades", trades.len())]),
        row([""]),
        row(HEADERS),
    ];
    table.extend(trades.iter().map(|t| t.cells(tz)));

    let mut layout = SheetLayout::new(title);
    layout.push_block("A1", table);
    layout.data_rows = trades.len();
    layout.push_format("A1", CellFormat::heading(14));
    layout.push_format("A3:J3", CellFormat::bold());
    layout
}
