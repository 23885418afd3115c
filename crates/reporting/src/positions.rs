//! Stock positions worksheet.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use folio_sync_core::{row, AccountType, CellFormat, Instrument, Row, StockPosition};

use crate::context::{allocation, StageContext, ACCOUNT_PAUSE, HOLDING_LOOKUP_PAUSE};
use crate::layout::SheetLayout;
use crate::render::{fixed2, money, percent, plain};
use crate::types::StageError;

pub const NO_POSITIONS: &str = "No positions found";

const HEADERS: [&str; 10] = [
    "Account",
    "Symbol",
    "Name",
    "Quantity",
    "Average Buy Price",
    "Current Price",
    "Current Value",
    "Allocation %",
    "Created At",
    "Updated At",
];

/// Instrument details resolved for one position; `None` when the lookup failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockRow {
    pub account_type: AccountType,
    pub position: StockPosition,
    pub quote: Option<Quote>,
    pub allocation: Decimal,
}

impl StockRow {
    #[must_use]
    pub fn current_value(&self) -> Decimal {
        self.quote
            .as_ref()
            .map_or(Decimal::ZERO, |q| q.price * self.position.quantity)
    }

    fn cells(&self) -> Row {
        let p = &self.position;
        let dated = |at: &Option<String>| at.clone().unwrap_or_else(|| "N/A".to_string());
        match &self.quote {
            Some(quote) => row([
                self.account_type.to_string(),
                quote.symbol.clone(),
                quote.name.clone(),
                plain(p.quantity),
                fixed2(p.average_buy_price),
                fixed2(quote.price),
                fixed2(self.current_value()),
                percent(self.allocation),
                dated(&p.created_at),
                dated(&p.updated_at),
            ]),
            None => row([
                self.account_type.to_string(),
                "Error".to_string(),
                "Error fetching data".to_string(),
                plain(p.quantity),
                fixed2(p.average_buy_price),
                "0.00".to_string(),
                "0.00".to_string(),
                "0.00%".to_string(),
                dated(&p.created_at),
                dated(&p.updated_at),
            ]),
        }
    }
}

async fn resolve(ctx: &StageContext<'_>, position: &StockPosition) -> Option<Quote> {
    let brokerage = ctx.brokerage;
    let Some(url) = position.instrument_url.as_deref() else {
        warn!(account = %position.account_number, "position without instrument");
        return None;
    };
    let instrument: Instrument = match ctx.fetch(move || brokerage.instrument(url)).await {
        Ok(instrument) => instrument,
        Err(e) => {
            warn!(url, error = %e, "instrument lookup failed");
            return None;
        }
    };

    let symbol = instrument.symbol.as_str();
    let price = match ctx.fetch(move || brokerage.latest_price(symbol)).await {
        Ok(price) => price.unwrap_or(Decimal::ZERO),
        Err(e) => {
            warn!(symbol, error = %e, "no latest price");
            Decimal::ZERO
        }
    };

    Some(Quote {
        symbol: instrument.symbol.clone(),
        name: instrument.display_name().to_string(),
        price,
    })
}

/// Open positions for every registered account with quotes and allocation
/// against the portfolio value, largest allocation first.
pub async fn collect(ctx: &StageContext<'_>) -> Result<(Vec<StockRow>, Decimal), StageError> {
    let brokerage = ctx.brokerage;
    let mut rows = Vec::new();

    for (i, account) in ctx.registry.accounts().iter().enumerate() {
        if i > 0 {
            ctx.pause(ACCOUNT_PAUSE).await;
        }
        let id = account.id.as_str();
        let positions = ctx.fetch(move || brokerage.stock_positions(id)).await?;
        debug!(account = %account.kind, count = positions.len(), "stock positions");

        for position in positions {
            let quote = resolve(ctx, &position).await;
            ctx.pause(HOLDING_LOOKUP_PAUSE).await;
            rows.push(StockRow {
                account_type: account.kind,
                position,
                quote,
                allocation: Decimal::ZERO,
            });
        }
    }

    if rows.is_empty() {
        return Ok((rows, Decimal::ZERO));
    }

    let held: Decimal = rows.iter().map(StockRow::current_value).sum();
    let total = ctx.portfolio_value(held).await;
    for r in &mut rows {
        if r.quote.is_some() {
            r.allocation = allocation(r.current_value(), total);
        }
    }
    rows.sort_by(|a, b| b.allocation.cmp(&a.allocation));

    Ok((rows, total))
}

#[must_use]
pub fn positions_layout(title: &str, rows: &[StockRow], portfolio_value: Decimal) -> SheetLayout {
    if rows.is_empty() {
        return SheetLayout::placeholder(title, NO_POSITIONS);
    }

    let mut table = vec![
        row(["Stock Positions"]),
        row([format!("Total Portfolio Value: {}", money(portfolio_value))]),
        row([""]),
        row(HEADERS),
    ];
    table.extend(rows.iter().map(StockRow::cells));

    let mut layout = SheetLayout::new(title);
    layout.push_block("A1", table);
    layout.data_rows = rows.len();
    layout.push_format("A1", CellFormat::heading(14));
    layout.push_format("A2", CellFormat::bold());
    layout.push_format("A4:J4", CellFormat::bold());
    layout
}
