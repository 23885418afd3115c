//! Raw Robinhood response shapes and their conversion into core records.
//!
//! The API encodes most numbers as strings and occasionally as JSON numbers
//! or `{ "amount": ... }` objects, so numeric fields are kept as raw JSON and
//! parsed with [`decimal`].

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use folio_sync_core::{
    AccountProfile, BrokerAccount, BrokerageError, CryptoOrder, CurrencyPair, Instrument,
    OptionInstrument, OptionLeg, OptionMarketData, OptionOrder, OptionPosition, OptionType,
    PortfolioSnapshot, StockOrder, StockPosition, UnifiedAccount,
};

/// Parses a JSON string, number or `{ "amount": .. }` into a decimal.
pub(crate) fn decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != '$' && *c != ',').collect();
            if cleaned.is_empty() {
                return None;
            }
            Decimal::from_str(&cleaned)
                .or_else(|_| Decimal::from_scientific(&cleaned))
                .ok()
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(|f| Decimal::try_from(f).ok())
            }
        }
        Value::Object(map) => decimal(map.get("amount")),
        _ => None,
    }
}

fn decimal_or_zero(value: Option<&Value>) -> Decimal {
    decimal(value).unwrap_or(Decimal::ZERO)
}

pub(crate) fn timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    })
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    pub next: Option<String>,
}

/// Some detail endpoints answer with a bare object, others with a
/// one-element `results` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    Many { results: Vec<T> },
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_first(self) -> Option<T> {
        match self {
            Self::Many { results } => results.into_iter().next(),
            Self::One(item) => Some(item),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawToken {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub mfa_required: Option<bool>,
    pub verification_workflow: Option<Value>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawAccount {
    pub account_number: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    pub brokerage_account_type: Option<String>,
    pub cash: Option<Value>,
    pub cash_held_for_options_collateral: Option<Value>,
    pub unsettled_funds: Option<Value>,
}

impl RawAccount {
    pub fn into_profile(self, requested: &str) -> AccountProfile {
        AccountProfile {
            account_number: non_empty(self.account_number).unwrap_or_else(|| requested.to_string()),
            cash: decimal_or_zero(self.cash.as_ref()),
            cash_held_for_options_collateral: decimal_or_zero(
                self.cash_held_for_options_collateral.as_ref(),
            ),
            unsettled_funds: decimal_or_zero(self.unsettled_funds.as_ref()),
        }
    }

    pub fn into_broker_account(self) -> Option<BrokerAccount> {
        Some(BrokerAccount {
            account_number: non_empty(self.account_number)?,
            kind: non_empty(self.brokerage_account_type).or(non_empty(self.account_type)),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPortfolio {
    pub equity: Option<Value>,
    pub extended_hours_equity: Option<Value>,
}

impl RawPortfolio {
    pub fn into_snapshot(self, account: &str) -> PortfolioSnapshot {
        PortfolioSnapshot {
            account_number: account.to_string(),
            equity: decimal(self.equity.as_ref())
                .or_else(|| decimal(self.extended_hours_equity.as_ref()))
                .unwrap_or(Decimal::ZERO),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawUnified {
    pub total_equity: Option<Value>,
    pub portfolio_equity: Option<Value>,
    pub crypto: Option<RawCryptoHolding>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawCryptoHolding {
    pub equity: Option<Value>,
}

impl From<RawUnified> for UnifiedAccount {
    fn from(raw: RawUnified) -> Self {
        Self {
            total_equity: decimal(raw.total_equity.as_ref()),
            portfolio_equity: decimal(raw.portfolio_equity.as_ref()),
            crypto_equity: raw.crypto.and_then(|c| decimal(c.equity.as_ref())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawStockPosition {
    pub instrument: Option<String>,
    pub quantity: Option<Value>,
    pub average_buy_price: Option<Value>,
    pub shares_held_for_options_collateral: Option<Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl RawStockPosition {
    pub fn into_position(self, account: &str) -> StockPosition {
        StockPosition {
            account_number: account.to_string(),
            instrument_url: non_empty(self.instrument),
            quantity: decimal_or_zero(self.quantity.as_ref()),
            average_buy_price: decimal_or_zero(self.average_buy_price.as_ref()),
            shares_held_for_options_collateral: decimal_or_zero(
                self.shares_held_for_options_collateral.as_ref(),
            ),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawInstrument {
    pub url: Option<String>,
    pub symbol: Option<String>,
    pub simple_name: Option<String>,
    pub name: Option<String>,
}

impl RawInstrument {
    pub fn into_instrument(self, requested_url: &str) -> Result<Instrument, BrokerageError> {
        let symbol = non_empty(self.symbol)
            .ok_or_else(|| BrokerageError::missing_field("symbol", requested_url))?;
        Ok(Instrument {
            url: non_empty(self.url).unwrap_or_else(|| requested_url.to_string()),
            symbol,
            simple_name: non_empty(self.simple_name),
            name: non_empty(self.name),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawQuote {
    pub symbol: Option<String>,
    pub last_trade_price: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawOptionPosition {
    pub option_id: Option<String>,
    pub option: Option<String>,
    pub quantity: Option<Value>,
    pub average_price: Option<Value>,
    pub chain_symbol: Option<String>,
    #[serde(rename = "type")]
    pub position_type: Option<String>,
}

impl RawOptionPosition {
    /// Positions with neither an id nor an option URL are dropped.
    pub fn into_position(self, account: &str) -> Option<OptionPosition> {
        let option_id = non_empty(self.option_id).or_else(|| {
            self.option
                .as_deref()
                .and_then(|url| url.trim_end_matches('/').rsplit('/').next())
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        })?;
        Some(OptionPosition {
            account_number: account.to_string(),
            option_id,
            quantity: decimal_or_zero(self.quantity.as_ref()),
            average_price: decimal_or_zero(self.average_price.as_ref()),
            chain_symbol: non_empty(self.chain_symbol),
            position_type: non_empty(self.position_type),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawOptionInstrument {
    pub id: Option<String>,
    pub chain_symbol: Option<String>,
    pub strike_price: Option<Value>,
    pub expiration_date: Option<String>,
    #[serde(rename = "type")]
    pub option_type: Option<String>,
}

impl RawOptionInstrument {
    pub fn into_instrument(self, option_id: &str) -> Result<OptionInstrument, BrokerageError> {
        let context = format!("option instrument {option_id}");
        let chain_symbol = non_empty(self.chain_symbol)
            .ok_or_else(|| BrokerageError::missing_field("chain_symbol", context.clone()))?;
        let strike_price = decimal(self.strike_price.as_ref())
            .ok_or_else(|| BrokerageError::missing_field("strike_price", context))?;
        Ok(OptionInstrument {
            id: non_empty(self.id).unwrap_or_else(|| option_id.to_string()),
            chain_symbol,
            strike_price,
            expiration_date: self
                .expiration_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            option_type: self.option_type.as_deref().and_then(OptionType::parse),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawOptionMarketData {
    pub adjusted_mark_price: Option<Value>,
    pub mark_price: Option<Value>,
    pub delta: Option<Value>,
    pub theta: Option<Value>,
    pub gamma: Option<Value>,
    pub vega: Option<Value>,
    pub implied_volatility: Option<Value>,
    pub open_interest: Option<Value>,
}

impl From<RawOptionMarketData> for OptionMarketData {
    fn from(raw: RawOptionMarketData) -> Self {
        Self {
            adjusted_mark_price: decimal(raw.adjusted_mark_price.as_ref())
                .or_else(|| decimal(raw.mark_price.as_ref()))
                .unwrap_or(Decimal::ZERO),
            delta: decimal(raw.delta.as_ref()),
            theta: decimal(raw.theta.as_ref()),
            gamma: decimal(raw.gamma.as_ref()),
            vega: decimal(raw.vega.as_ref()),
            implied_volatility: decimal(raw.implied_volatility.as_ref()),
            open_interest: decimal(raw.open_interest.as_ref())
                .and_then(|d| u64::try_from(d.trunc()).ok()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawOptionLeg {
    pub option_type: Option<String>,
    pub strike_price: Option<Value>,
    pub expiration_date: Option<String>,
    pub quantity: Option<Value>,
    pub ratio_quantity: Option<Value>,
    pub side: Option<String>,
}

impl From<RawOptionLeg> for OptionLeg {
    fn from(raw: RawOptionLeg) -> Self {
        Self {
            option_type: non_empty(raw.option_type),
            strike_price: decimal(raw.strike_price.as_ref()),
            expiration_date: non_empty(raw.expiration_date),
            quantity: decimal(raw.quantity.as_ref()).or_else(|| decimal(raw.ratio_quantity.as_ref())),
            side: non_empty(raw.side),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawOptionOrder {
    pub id: Option<String>,
    pub chain_symbol: Option<String>,
    pub state: Option<String>,
    pub direction: Option<String>,
    pub premium: Option<Value>,
    pub processed_premium: Option<Value>,
    pub quantity: Option<Value>,
    #[serde(default)]
    pub legs: Vec<RawOptionLeg>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl RawOptionOrder {
    pub fn into_order(self, account: &str) -> OptionOrder {
        OptionOrder {
            id: self.id.unwrap_or_default(),
            account_number: account.to_string(),
            chain_symbol: non_empty(self.chain_symbol),
            state: self.state.unwrap_or_default(),
            direction: non_empty(self.direction),
            premium: decimal(self.premium.as_ref()),
            processed_premium: decimal(self.processed_premium.as_ref()),
            quantity: decimal(self.quantity.as_ref()),
            legs: self.legs.into_iter().map(OptionLeg::from).collect(),
            created_at: timestamp(self.created_at.as_deref()),
            updated_at: timestamp(self.updated_at.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawStockOrder {
    pub instrument: Option<String>,
    pub state: Option<String>,
    pub side: Option<String>,
    pub quantity: Option<Value>,
    pub cumulative_quantity: Option<Value>,
    pub average_price: Option<Value>,
    pub price: Option<Value>,
    pub fees: Option<Value>,
    pub created_at: Option<String>,
}

impl RawStockOrder {
    pub fn into_order(self, account: &str) -> StockOrder {
        StockOrder {
            account_number: account.to_string(),
            instrument_url: non_empty(self.instrument),
            state: self.state.unwrap_or_default(),
            side: non_empty(self.side),
            quantity: decimal(self.quantity.as_ref())
                .or_else(|| decimal(self.cumulative_quantity.as_ref()))
                .unwrap_or(Decimal::ZERO),
            average_price: decimal(self.average_price.as_ref()),
            price: decimal(self.price.as_ref()),
            fees: decimal_or_zero(self.fees.as_ref()),
            created_at: timestamp(self.created_at.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawCryptoOrder {
    pub currency_pair_id: Option<String>,
    pub state: Option<String>,
    pub side: Option<String>,
    pub quantity: Option<Value>,
    pub average_price: Option<Value>,
    pub price: Option<Value>,
    pub created_at: Option<String>,
}

impl From<RawCryptoOrder> for CryptoOrder {
    fn from(raw: RawCryptoOrder) -> Self {
        Self {
            currency_pair_id: non_empty(raw.currency_pair_id),
            state: raw.state.unwrap_or_default(),
            side: non_empty(raw.side),
            quantity: decimal_or_zero(raw.quantity.as_ref()),
            average_price: decimal(raw.average_price.as_ref()),
            price: decimal(raw.price.as_ref()),
            created_at: timestamp(raw.created_at.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawCurrencyPair {
    pub id: Option<String>,
    pub symbol: Option<String>,
}

impl RawCurrencyPair {
    pub fn into_pair(self, pair_id: &str) -> Result<CurrencyPair, BrokerageError> {
        Ok(CurrencyPair {
            id: non_empty(self.id).unwrap_or_else(|| pair_id.to_string()),
            symbol: non_empty(self.symbol).ok_or_else(|| {
                BrokerageError::missing_field("symbol", format!("currency pair {pair_id}"))
            })?,
        })
    }
}
