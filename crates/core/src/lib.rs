//! Core building blocks for folio-sync: configuration, the account registry,
//! rate-limit retry and pacing, and the brokerage/spreadsheet collaborator
//! traits implemented by the sibling crates.

pub mod a1;
pub mod accounts;
pub mod broker;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod pacing;
pub mod retry;
pub mod sheet;

pub use a1::{column_letters, CellRef, GridRange};
pub use accounts::{Account, AccountRegistry, AccountType};
pub use broker::{
    AccountProfile, BrokerAccount, Brokerage, CryptoOrder, CurrencyPair, Instrument,
    OptionInstrument, OptionLeg, OptionMarketData, OptionOrder, OptionPosition, OptionType,
    PortfolioSnapshot, StockOrder, StockPosition, UnifiedAccount,
};
pub use config::{
    AccountsConfig, AppConfig, BrokerageConfig, PacingConfig, ReportConfig, RetryConfig,
    SheetsConfig,
};
pub use config_loader::ConfigLoader;
pub use error::{BrokerageError, ConfigError, RetryError, SheetError};
pub use pacing::{Pacer, RecordingSleeper, Sleeper, TokioSleeper};
pub use retry::{is_rate_limit_message, RateLimitHandler};
pub use sheet::{row, CellFormat, CellValue, Color, Row, SpreadsheetBackend};
