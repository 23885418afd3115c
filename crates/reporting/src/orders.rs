//! Option order enrichment and the order-history worksheet.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;

use tracing::debug;

use folio_sync_core::{row, AccountRegistry, AccountType, CellFormat, OptionLeg, OptionOrder, Row};

use crate::context::{StageContext, ACCOUNT_PAUSE};
use crate::layout::SheetLayout;
use crate::premium::{self, PremiumSummary};
use crate::render;
use crate::types::StageError;

pub const NO_ORDERS: &str = "No options orders found";

const HEADERS: [&str; 11] = [
    "Date",
    "Account",
    "Symbol",
    "Strategy",
    "Direction",
    "Option Types",
    "Strike Prices",
    "Expiration",
    "Quantity",
    "Premium",
    "State",
];

/// An option order with the derived fields the reports show.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedOrder {
    pub id: String,
    pub account_number: String,
    pub account_type: AccountType,
    pub symbol: String,
    pub state: String,
    /// Raw broker direction, lower-cased.
    pub direction: String,
    pub direction_label: String,
    pub total_premium: Decimal,
    pub quantity: Decimal,
    pub premium_per_contract: Decimal,
    pub option_types: String,
    pub strikes: String,
    pub expirations: String,
    pub strategy: String,
    pub created_at: Option<DateTime<Utc>>,
    pub created_at_display: String,
    pub updated_at_display: String,
}

impl EnrichedOrder {
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.state.eq_ignore_ascii_case("filled")
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.eq_ignore_ascii_case("cancelled")
    }
}

/// Processed premium when non-zero, else the quoted premium.
fn order_premium(order: &OptionOrder) -> Decimal {
    order
        .processed_premium
        .filter(|p| !p.is_zero())
        .or(order.premium)
        .unwrap_or(Decimal::ZERO)
}

/// Sum of positive leg quantities, else the order quantity.
fn order_quantity(order: &OptionOrder) -> Decimal {
    let legs: Decimal = order
        .legs
        .iter()
        .filter_map(|leg| leg.quantity)
        .filter(|q| *q > Decimal::ZERO)
        .sum();
    if legs.is_zero() {
        order.quantity.unwrap_or(Decimal::ZERO)
    } else {
        legs
    }
}

fn direction_label(direction: &str) -> String {
    match direction {
        "debit" => "Buy (Debit)".to_string(),
        "credit" => "Sell (Credit)".to_string(),
        "" => "Unknown".to_string(),
        other => render::capitalize(other),
    }
}

/// Leg summary: (option types, strikes, expirations, strategy).
fn summarize_legs(legs: &[OptionLeg]) -> (String, String, String, String) {
    if legs.is_empty() {
        return (
            "Unknown".to_string(),
            "N/A".to_string(),
            "N/A".to_string(),
            "Unknown".to_string(),
        );
    }

    let types: BTreeSet<String> = legs
        .iter()
        .filter_map(|leg| leg.option_type.as_deref())
        .map(str::to_ascii_uppercase)
        .collect();
    let strikes: BTreeSet<Decimal> = legs
        .iter()
        .filter_map(|leg| leg.strike_price)
        .filter(|s| *s > Decimal::ZERO)
        .map(|s| s.normalize())
        .collect();
    let expirations: BTreeSet<&str> = legs
        .iter()
        .filter_map(|leg| leg.expiration_date.as_deref())
        .collect();

    let join_or = |parts: Vec<String>, empty: &str| {
        if parts.is_empty() {
            empty.to_string()
        } else {
            parts.join("/")
        }
    };

    let option_types = join_or(types.iter().cloned().collect(), "Unknown");
    let strike_text = join_or(strikes.iter().map(|s| render::money(*s)).collect(), "N/A");
    let expiration_text = join_or(expirations.iter().map(|e| (*e).to_string()).collect(), "N/A");

    let first_type = types.iter().next().map(String::as_str);
    let strategy = match legs.len() {
        1 => format!("Single {}", first_type.unwrap_or("Option")),
        2 => match (types.len(), strikes.len()) {
            (1, 2) => format!("{} Vertical", first_type.unwrap_or("Option")),
            (2, 1) => "Straddle".to_string(),
            (2, 2) => "Strangle".to_string(),
            _ => "2-Leg Strategy".to_string(),
        },
        n => format!("{n}-Leg Strategy"),
    };

    (option_types, strike_text, expiration_text, strategy)
}

/// Derives display fields for one order.
#[must_use]
pub fn enrich(order: &OptionOrder, registry: &AccountRegistry, tz: Tz) -> EnrichedOrder {
    let total_premium = order_premium(order);
    let quantity = order_quantity(order);
    let direction = order
        .direction
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let (option_types, strikes, expirations, strategy) = summarize_legs(&order.legs);

    EnrichedOrder {
        id: order.id.clone(),
        account_number: order.account_number.clone(),
        account_type: registry.account_type(&order.account_number),
        symbol: order
            .chain_symbol
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        state: order.state.clone(),
        direction_label: direction_label(&direction),
        direction,
        total_premium,
        quantity,
        premium_per_contract: if quantity > Decimal::ZERO {
            total_premium / quantity
        } else {
            Decimal::ZERO
        },
        option_types,
        strikes,
        expirations,
        strategy,
        created_at: order.created_at,
        created_at_display: order
            .created_at
            .map(|at| render::local_timestamp(at, tz))
            .unwrap_or_default(),
        updated_at_display: order
            .updated_at
            .map(|at| render::local_timestamp(at, tz))
            .unwrap_or_default(),
    }
}

/// Every registered account's option orders, enriched. A failed listing
/// fails the stage.
pub async fn collect(ctx: &StageContext<'_>) -> Result<Vec<EnrichedOrder>, StageError> {
    let brokerage = ctx.brokerage;
    let mut enriched = Vec::new();

    for (i, account) in ctx.registry.accounts().iter().enumerate() {
        if i > 0 {
            ctx.pause(ACCOUNT_PAUSE).await;
        }
        let id = account.id.as_str();
        let orders = ctx.fetch(move || brokerage.option_orders(id)).await?;
        debug!(account = %account.kind, count = orders.len(), "option orders");
        enriched.extend(orders.iter().map(|o| enrich(o, ctx.registry, ctx.tz)));
    }

    Ok(enriched)
}

/// Newest first; orders without a timestamp sort last.
pub fn sort_newest_first(orders: &mut [EnrichedOrder]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn history_row(order: &EnrichedOrder) -> Row {
    row([
        order.created_at_display.clone(),
        order.account_type.to_string(),
        order.symbol.clone(),
        order.strategy.clone(),
        order.direction_label.clone(),
        order.option_types.clone(),
        order.strikes.clone(),
        order.expirations.clone(),
        render::plain(order.quantity),
        render::money(order.total_premium),
        render::capitalize(&order.state),
    ])
}

/// Settings for the order-history worksheet.
#[derive(Debug, Clone, Copy)]
pub struct OrdersLayoutOptions {
    pub history_rows: usize,
    pub premium_weeks: u32,
    pub now: DateTime<Utc>,
}

impl OrdersLayoutOptions {
    /// First row of the Standard/IRA/Third weekly tables: 25, 36 and 47 with
    /// the default 20 history rows and 8 weeks.
    #[must_use]
    pub fn weekly_table_rows(&self) -> [u32; 3] {
        let first = u32::try_from(self.history_rows).unwrap_or(u32::MAX).saturating_add(5);
        let step = self.premium_weeks.saturating_add(3);
        [first, first.saturating_add(step), first.saturating_add(step.saturating_mul(2))]
    }
}

/// History table of the newest non-cancelled orders plus fixed weekly
/// premium tables per configured account type.
#[must_use]
pub fn orders_layout(
    title: &str,
    orders: &[EnrichedOrder],
    options: &OrdersLayoutOptions,
) -> SheetLayout {
    if orders.is_empty() {
        return SheetLayout::placeholder(title, NO_ORDERS);
    }

    let mut history: Vec<EnrichedOrder> = orders
        .iter()
        .filter(|o| !o.is_cancelled())
        .cloned()
        .collect();
    sort_newest_first(&mut history);
    history.truncate(options.history_rows);

    let mut layout = SheetLayout::new(title);
    let mut table = vec![row(["Options Order History"]), row([""]), row(HEADERS)];
    table.extend(history.iter().map(history_row));
    layout.push_block("A1", table);
    layout.data_rows = history.len();

    let summary = PremiumSummary::aggregate(orders, options.premium_weeks, options.now);
    for (kind, start) in AccountType::CONFIGURED
        .into_iter()
        .zip(options.weekly_table_rows())
    {
        let table = premium::weekly_table(&summary, kind, options.now, options.premium_weeks);
        layout.push_block(format!("A{start}"), table);
        layout.push_format(format!("A{start}"), CellFormat::heading(12));
        layout.push_format(format!("A{}:D{}", start + 1, start + 1), CellFormat::bold());
    }

    layout.push_format("A1", CellFormat::heading(14));
    layout.push_format("A3:K3", CellFormat::bold());
    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use folio_sync_core::AccountsConfig;
    use rust_decimal_macros::dec;

    fn registry() -> AccountRegistry {
        AccountRegistry::from_config(&AccountsConfig {
            primary: "STD1".to_string(),
            ira: Some("IRA1".to_string()),
            third: None,
        })
    }

    fn leg(kind: &str, strike: Decimal, expiry: &str) -> OptionLeg {
        OptionLeg {
            option_type: Some(kind.to_string()),
            strike_price: Some(strike),
            expiration_date: Some(expiry.to_string()),
            quantity: Some(dec!(1)),
            side: Some("sell".to_string()),
        }
    }

    fn order(account: &str, legs: Vec<OptionLeg>) -> OptionOrder {
        OptionOrder {
            id: "o1".to_string(),
            account_number: account.to_string(),
            chain_symbol: Some("AAPL".to_string()),
            state: "filled".to_string(),
            direction: Some("credit".to_string()),
            premium: Some(dec!(90)),
            processed_premium: Some(dec!(85)),
            quantity: Some(dec!(1)),
            legs,
            created_at: Some(Utc.with_ymd_and_hms(2024, 6, 3, 15, 0, 0).unwrap()),
            updated_at: None,
        }
    }

    fn tz() -> Tz {
        chrono_tz::America::New_York
    }

    // ==================== Enrichment Tests ====================

    #[test]
    fn single_leg_order() {
        let enriched = enrich(
            &order("STD1", vec![leg("call", dec!(200), "2024-06-21")]),
            &registry(),
            tz(),
        );
        assert_eq!(enriched.account_type, AccountType::Standard);
        assert_eq!(enriched.total_premium, dec!(85));
        assert_eq!(enriched.quantity, dec!(1));
        assert_eq!(enriched.direction_label, "Sell (Credit)");
        assert_eq!(enriched.option_types, "CALL");
        assert_eq!(enriched.strikes, "$200.00");
        assert_eq!(enriched.strategy, "Single CALL");
        assert_eq!(enriched.created_at_display, "06/03/2024 11:00 AM");
    }

    #[test]
    fn zero_processed_premium_uses_quoted_premium() {
        let mut raw = order("IRA1", vec![]);
        raw.processed_premium = Some(dec!(0));
        raw.quantity = Some(dec!(2));
        let enriched = enrich(&raw, &registry(), tz());
        assert_eq!(enriched.total_premium, dec!(90));
        assert_eq!(enriched.quantity, dec!(2));
        assert_eq!(enriched.premium_per_contract, dec!(45));
        assert_eq!(enriched.account_type, AccountType::Ira);
        assert_eq!(enriched.strategy, "Unknown");
        assert_eq!(enriched.strikes, "N/A");
    }

    #[test]
    fn two_leg_shapes() {
        let vertical = enrich(
            &order(
                "STD1",
                vec![leg("put", dec!(95), "2024-06-21"), leg("put", dec!(100), "2024-06-21")],
            ),
            &registry(),
            tz(),
        );
        assert_eq!(vertical.strategy, "PUT Vertical");
        assert_eq!(vertical.strikes, "$95.00/$100.00");
        assert_eq!(vertical.quantity, dec!(2));

        let straddle = enrich(
            &order(
                "STD1",
                vec![leg("put", dec!(100), "2024-06-21"), leg("call", dec!(100), "2024-06-21")],
            ),
            &registry(),
            tz(),
        );
        assert_eq!(straddle.strategy, "Straddle");
        assert_eq!(straddle.option_types, "CALL/PUT");

        let strangle = enrich(
            &order(
                "STD1",
                vec![leg("put", dec!(95), "2024-06-21"), leg("call", dec!(105), "2024-06-28")],
            ),
            &registry(),
            tz(),
        );
        assert_eq!(strangle.strategy, "Strangle");
        assert_eq!(strangle.expirations, "2024-06-21/2024-06-28");

        let calendar = enrich(
            &order(
                "STD1",
                vec![leg("call", dec!(100), "2024-06-21"), leg("call", dec!(100), "2024-07-19")],
            ),
            &registry(),
            tz(),
        );
        assert_eq!(calendar.strategy, "2-Leg Strategy");
    }

    #[test]
    fn four_leg_order() {
        let legs = vec![
            leg("put", dec!(90), "2024-06-21"),
            leg("put", dec!(95), "2024-06-21"),
            leg("call", dec!(105), "2024-06-21"),
            leg("call", dec!(110), "2024-06-21"),
        ];
        let enriched = enrich(&order("STD1", legs), &registry(), tz());
        assert_eq!(enriched.strategy, "4-Leg Strategy");
    }

    #[test]
    fn direction_labels() {
        assert_eq!(direction_label("debit"), "Buy (Debit)");
        assert_eq!(direction_label("sideways"), "Sideways");
        assert_eq!(direction_label(""), "Unknown");
    }

    #[test]
    fn unregistered_account_is_unknown() {
        let enriched = enrich(&order("ELSEWHERE", vec![]), &registry(), tz());
        assert_eq!(enriched.account_type, AccountType::Unknown);
    }

    // ==================== Layout Tests ====================

    #[test]
    fn default_weekly_tables_start_at_fixed_rows() {
        let options = OrdersLayoutOptions {
            history_rows: 20,
            premium_weeks: 8,
            now: Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).unwrap(),
        };
        assert_eq!(options.weekly_table_rows(), [25, 36, 47]);
    }

    #[test]
    fn huge_week_counts_saturate_table_rows() {
        let options = OrdersLayoutOptions {
            history_rows: 20,
            premium_weeks: 4_000_000_000,
            now: Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).unwrap(),
        };
        let [first, second, third] = options.weekly_table_rows();
        assert_eq!(first, 25);
        assert_eq!(second, 4_000_000_028);
        assert_eq!(third, u32::MAX);
    }

    #[test]
    fn history_skips_cancelled_and_caps_rows() {
        let now = Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).unwrap();
        let mut orders = Vec::new();
        for i in 0..25 {
            let mut raw = order("STD1", vec![leg("call", dec!(200), "2024-06-21")]);
            raw.id = format!("o{i}");
            raw.created_at = Some(now - chrono::Duration::hours(i));
            if i == 0 {
                raw.state = "cancelled".to_string();
            }
            orders.push(enrich(&raw, &registry(), tz()));
        }

        let options = OrdersLayoutOptions {
            history_rows: 20,
            premium_weeks: 8,
            now,
        };
        let layout = orders_layout("Options Orders", &orders, &options);
        assert_eq!(layout.data_rows, 20);
        let history = &layout.blocks[0];
        assert_eq!(history.anchor, "A1");
        assert_eq!(history.rows.len(), 23);
        assert_eq!(history.rows[3][10].display(), "Filled");

        let anchors: Vec<&str> = layout.blocks.iter().map(|b| b.anchor.as_str()).collect();
        assert_eq!(anchors, vec!["A1", "A25", "A36", "A47"]);
        assert_eq!(layout.blocks[2].rows[0][0].display(), "IRA Weekly Premium Summary");
    }

    #[test]
    fn no_orders_placeholder() {
        let options = OrdersLayoutOptions {
            history_rows: 20,
            premium_weeks: 8,
            now: Utc::now(),
        };
        let layout = orders_layout("Options Orders", &[], &options);
        assert_eq!(layout.placeholder.as_deref(), Some(NO_ORDERS));
    }
}
