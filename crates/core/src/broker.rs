//! Brokerage records and the collaborator trait the reports are built from.
//!
//! Records carry only what reporting needs. Monetary amounts are parsed into
//! `Decimal`; fields the brokerage may omit stay `Option`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BrokerageError;

/// Account listed by the brokerage for the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerAccount {
    pub account_number: String,
    /// Broker-reported type, e.g. "cash", "margin", "ira_traditional".
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub account_number: String,
    pub cash: Decimal,
    pub cash_held_for_options_collateral: Decimal,
    pub unsettled_funds: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub account_number: String,
    pub equity: Decimal,
}

/// Cross-account totals reported by the unified account endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedAccount {
    pub total_equity: Option<Decimal>,
    pub portfolio_equity: Option<Decimal>,
    pub crypto_equity: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPosition {
    pub account_number: String,
    pub instrument_url: Option<String>,
    pub quantity: Decimal,
    pub average_buy_price: Decimal,
    pub shares_held_for_options_collateral: Decimal,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub url: String,
    pub symbol: String,
    pub simple_name: Option<String>,
    pub name: Option<String>,
}

impl Instrument {
    /// Short display name, falling back to the legal name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.simple_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.name.as_deref())
            .unwrap_or("N/A")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Parses "call"/"put" in any case.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "call" => Some(Self::Call),
            "put" => Some(Self::Put),
            _ => None,
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionPosition {
    pub account_number: String,
    pub option_id: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub chain_symbol: Option<String>,
    /// "long" or "short".
    pub position_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionInstrument {
    pub id: String,
    pub chain_symbol: String,
    pub strike_price: Decimal,
    pub expiration_date: Option<NaiveDate>,
    pub option_type: Option<OptionType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionMarketData {
    pub adjusted_mark_price: Decimal,
    pub delta: Option<Decimal>,
    pub theta: Option<Decimal>,
    pub gamma: Option<Decimal>,
    pub vega: Option<Decimal>,
    pub implied_volatility: Option<Decimal>,
    pub open_interest: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionLeg {
    pub option_type: Option<String>,
    pub strike_price: Option<Decimal>,
    pub expiration_date: Option<String>,
    pub quantity: Option<Decimal>,
    pub side: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionOrder {
    pub id: String,
    /// Account the order was fetched for.
    pub account_number: String,
    pub chain_symbol: Option<String>,
    pub state: String,
    /// "credit" or "debit".
    pub direction: Option<String>,
    pub premium: Option<Decimal>,
    pub processed_premium: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub legs: Vec<OptionLeg>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OptionOrder {
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.state.eq_ignore_ascii_case("filled")
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.eq_ignore_ascii_case("cancelled")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockOrder {
    pub account_number: String,
    pub instrument_url: Option<String>,
    pub state: String,
    pub side: Option<String>,
    pub quantity: Decimal,
    pub average_price: Option<Decimal>,
    pub price: Option<Decimal>,
    pub fees: Decimal,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoOrder {
    pub currency_pair_id: Option<String>,
    pub state: String,
    pub side: Option<String>,
    pub quantity: Decimal,
    pub average_price: Option<Decimal>,
    pub price: Option<Decimal>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub id: String,
    pub symbol: String,
}

/// Read-only brokerage operations consumed by the reporting pipeline.
#[async_trait]
pub trait Brokerage: Send + Sync {
    /// Authenticates and caches the session.
    async fn login(&self) -> Result<(), BrokerageError>;

    async fn list_accounts(&self) -> Result<Vec<BrokerAccount>, BrokerageError>;

    async fn account_profile(&self, account: &str) -> Result<AccountProfile, BrokerageError>;

    async fn portfolio(&self, account: &str) -> Result<PortfolioSnapshot, BrokerageError>;

    async fn unified_account(&self) -> Result<UnifiedAccount, BrokerageError>;

    async fn stock_positions(&self, account: &str) -> Result<Vec<StockPosition>, BrokerageError>;

    async fn instrument(&self, url: &str) -> Result<Instrument, BrokerageError>;

    /// Last trade price, `None` when the quote has no price.
    async fn latest_price(&self, symbol: &str) -> Result<Option<Decimal>, BrokerageError>;

    async fn option_positions(&self, account: &str) -> Result<Vec<OptionPosition>, BrokerageError>;

    async fn option_instrument(&self, option_id: &str) -> Result<OptionInstrument, BrokerageError>;

    async fn option_market_data(&self, option_id: &str)
        -> Result<OptionMarketData, BrokerageError>;

    async fn option_orders(&self, account: &str) -> Result<Vec<OptionOrder>, BrokerageError>;

    async fn stock_orders(&self, account: &str) -> Result<Vec<StockOrder>, BrokerageError>;

    async fn crypto_orders(&self) -> Result<Vec<CryptoOrder>, BrokerageError>;

    async fn currency_pair(&self, pair_id: &str) -> Result<CurrencyPair, BrokerageError>;
}
