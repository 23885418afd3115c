use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use folio_sync_core::{
    row, AccountProfile, AppConfig, BrokerAccount, Brokerage, BrokerageError, CryptoOrder,
    CurrencyPair, Instrument, OptionInstrument, OptionLeg, OptionMarketData, OptionOrder,
    OptionPosition, OptionType, PortfolioSnapshot, RecordingSleeper, SheetError,
    SpreadsheetBackend, StockOrder, StockPosition, UnifiedAccount,
};
use folio_sync_reporting::{Pipeline, Stage, StageOutcome};
use folio_sync_sheets::MemorySpreadsheet;

// ==================== Fake Brokerage ====================

#[derive(Default)]
struct FakeBrokerage {
    profiles: HashMap<String, AccountProfile>,
    portfolios: HashMap<String, PortfolioSnapshot>,
    unified: Option<UnifiedAccount>,
    stock_positions: HashMap<String, Vec<StockPosition>>,
    instruments: HashMap<String, Instrument>,
    prices: HashMap<String, Decimal>,
    option_positions: HashMap<String, Vec<OptionPosition>>,
    option_instruments: HashMap<String, OptionInstrument>,
    option_market: HashMap<String, OptionMarketData>,
    option_orders: HashMap<String, Vec<OptionOrder>>,
    stock_orders: HashMap<String, Vec<StockOrder>>,
    crypto_orders: Vec<CryptoOrder>,
    pairs: HashMap<String, CurrencyPair>,
    failing: Mutex<Vec<&'static str>>,
    throttled: Mutex<HashMap<&'static str, u32>>,
}

impl FakeBrokerage {
    fn fail(&self, method: &'static str) {
        self.failing.lock().push(method);
    }

    fn throttle(&self, method: &'static str, times: u32) {
        self.throttled.lock().insert(method, times);
    }

    fn check(&self, method: &'static str) -> Result<(), BrokerageError> {
        if self.failing.lock().contains(&method) {
            return Err(BrokerageError::api(500, format!("{method} unavailable")));
        }
        if let Some(remaining) = self.throttled.lock().get_mut(method) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BrokerageError::rate_limit(1));
            }
        }
        Ok(())
    }
}

fn not_found(what: &str) -> BrokerageError {
    BrokerageError::NotFound(what.to_string())
}

#[async_trait]
impl Brokerage for FakeBrokerage {
    async fn login(&self) -> Result<(), BrokerageError> {
        self.check("login")
    }

    async fn list_accounts(&self) -> Result<Vec<BrokerAccount>, BrokerageError> {
        self.check("list_accounts")?;
        Ok(self
            .profiles
            .keys()
            .map(|id| BrokerAccount {
                account_number: id.clone(),
                kind: None,
            })
            .collect())
    }

    async fn account_profile(&self, account: &str) -> Result<AccountProfile, BrokerageError> {
        self.check("account_profile")?;
        self.profiles.get(account).cloned().ok_or_else(|| not_found(account))
    }

    async fn portfolio(&self, account: &str) -> Result<PortfolioSnapshot, BrokerageError> {
        self.check("portfolio")?;
        self.portfolios.get(account).cloned().ok_or_else(|| not_found(account))
    }

    async fn unified_account(&self) -> Result<UnifiedAccount, BrokerageError> {
        self.check("unified_account")?;
        self.unified.clone().ok_or_else(|| not_found("unified"))
    }

    async fn stock_positions(&self, account: &str) -> Result<Vec<StockPosition>, BrokerageError> {
        self.check("stock_positions")?;
        Ok(self.stock_positions.get(account).cloned().unwrap_or_default())
    }

    async fn instrument(&self, url: &str) -> Result<Instrument, BrokerageError> {
        self.check("instrument")?;
        self.instruments.get(url).cloned().ok_or_else(|| not_found(url))
    }

    async fn latest_price(&self, symbol: &str) -> Result<Option<Decimal>, BrokerageError> {
        self.check("latest_price")?;
        Ok(self.prices.get(symbol).copied())
    }

    async fn option_positions(&self, account: &str) -> Result<Vec<OptionPosition>, BrokerageError> {
        self.check("option_positions")?;
        Ok(self.option_positions.get(account).cloned().unwrap_or_default())
    }

    async fn option_instrument(&self, option_id: &str) -> Result<OptionInstrument, BrokerageError> {
        self.check("option_instrument")?;
        self.option_instruments
            .get(option_id)
            .cloned()
            .ok_or_else(|| not_found(option_id))
    }

    async fn option_market_data(
        &self,
        option_id: &str,
    ) -> Result<OptionMarketData, BrokerageError> {
        self.check("option_market_data")?;
        self.option_market
            .get(option_id)
            .cloned()
            .ok_or_else(|| not_found(option_id))
    }

    async fn option_orders(&self, account: &str) -> Result<Vec<OptionOrder>, BrokerageError> {
        self.check("option_orders")?;
        Ok(self.option_orders.get(account).cloned().unwrap_or_default())
    }

    async fn stock_orders(&self, account: &str) -> Result<Vec<StockOrder>, BrokerageError> {
        self.check("stock_orders")?;
        Ok(self.stock_orders.get(account).cloned().unwrap_or_default())
    }

    async fn crypto_orders(&self) -> Result<Vec<CryptoOrder>, BrokerageError> {
        self.check("crypto_orders")?;
        Ok(self.crypto_orders.clone())
    }

    async fn currency_pair(&self, pair_id: &str) -> Result<CurrencyPair, BrokerageError> {
        self.check("currency_pair")?;
        self.pairs.get(pair_id).cloned().ok_or_else(|| not_found(pair_id))
    }
}

// ==================== Fixtures ====================

const STD: &str = "STD1";
const IRA: &str = "IRA1";
const AAPL_URL: &str = "https://api.test/instruments/aapl/";
const MSFT_URL: &str = "https://api.test/instruments/msft/";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).unwrap()
}

fn at(day: u32, hour: u32) -> Option<DateTime<Utc>> {
    Some(Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap())
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.accounts.primary = STD.to_string();
    config.accounts.ira = Some(IRA.to_string());
    config.sheets.spreadsheet_name = "Portfolio".to_string();
    config.pacing.scale = 0.0;
    config
}

fn profile(account: &str, cash: Decimal, collateral: Decimal) -> AccountProfile {
    AccountProfile {
        account_number: account.to_string(),
        cash,
        cash_held_for_options_collateral: collateral,
        unsettled_funds: Decimal::ZERO,
    }
}

fn stock(account: &str, url: &str, quantity: Decimal, collateral: Decimal) -> StockPosition {
    StockPosition {
        account_number: account.to_string(),
        instrument_url: Some(url.to_string()),
        quantity,
        average_buy_price: dec!(100),
        shares_held_for_options_collateral: collateral,
        created_at: Some("2024-01-02T15:00:00Z".to_string()),
        updated_at: Some("2024-06-01T15:00:00Z".to_string()),
    }
}

fn option_position(account: &str, option_id: &str) -> OptionPosition {
    OptionPosition {
        account_number: account.to_string(),
        option_id: option_id.to_string(),
        quantity: dec!(1),
        average_price: dec!(-150),
        chain_symbol: Some("AAPL".to_string()),
        position_type: Some("short".to_string()),
    }
}

fn option_order(account: &str, premium: Decimal, created_at: Option<DateTime<Utc>>) -> OptionOrder {
    OptionOrder {
        id: format!("{account}-order"),
        account_number: account.to_string(),
        chain_symbol: Some("AAPL".to_string()),
        state: "filled".to_string(),
        direction: Some("credit".to_string()),
        premium: Some(premium),
        processed_premium: Some(premium),
        quantity: Some(dec!(1)),
        legs: vec![OptionLeg {
            option_type: Some("call".to_string()),
            strike_price: Some(dec!(210)),
            expiration_date: Some("2024-06-21".to_string()),
            quantity: Some(dec!(1)),
            side: Some("sell".to_string()),
        }],
        created_at,
        updated_at: created_at,
    }
}

fn market(mark: Decimal) -> OptionMarketData {
    OptionMarketData {
        adjusted_mark_price: mark,
        delta: Some(dec!(0.3)),
        theta: Some(dec!(-0.05)),
        gamma: None,
        vega: None,
        implied_volatility: Some(dec!(0.28)),
        open_interest: Some(500),
    }
}

fn portfolio_brokerage() -> FakeBrokerage {
    let mut fake = FakeBrokerage::default();

    fake.profiles.insert(STD.into(), profile(STD, dec!(5000), dec!(4000)));
    fake.profiles.insert(IRA.into(), profile(IRA, dec!(1000), dec!(0)));
    for (id, equity) in [(STD, dec!(20000)), (IRA, dec!(10000))] {
        fake.portfolios.insert(
            id.into(),
            PortfolioSnapshot {
                account_number: id.to_string(),
                equity,
            },
        );
    }
    fake.unified = Some(UnifiedAccount {
        total_equity: Some(dec!(30000)),
        portfolio_equity: Some(dec!(29500)),
        crypto_equity: Some(dec!(500)),
    });

    fake.stock_positions
        .insert(STD.into(), vec![stock(STD, AAPL_URL, dec!(100), dec!(100))]);
    fake.stock_positions
        .insert(IRA.into(), vec![stock(IRA, MSFT_URL, dec!(10), dec!(0))]);
    for (url, symbol, name) in [(AAPL_URL, "AAPL", "Apple"), (MSFT_URL, "MSFT", "Microsoft")] {
        fake.instruments.insert(
            url.into(),
            Instrument {
                url: url.to_string(),
                symbol: symbol.to_string(),
                simple_name: Some(name.to_string()),
                name: None,
            },
        );
    }
    fake.prices.insert("AAPL".into(), dec!(200));
    fake.prices.insert("MSFT".into(), dec!(400));

    fake.option_positions.insert(
        STD.into(),
        vec![option_position(STD, "opt-call"), option_position(STD, "opt-put")],
    );
    fake.option_positions
        .insert(IRA.into(), vec![option_position(IRA, "opt-call")]);
    for (id, kind, strike) in [
        ("opt-call", OptionType::Call, dec!(210)),
        ("opt-put", OptionType::Put, dec!(40)),
    ] {
        fake.option_instruments.insert(
            id.into(),
            OptionInstrument {
                id: id.to_string(),
                chain_symbol: "AAPL".to_string(),
                strike_price: strike,
                expiration_date: NaiveDate::from_ymd_opt(2024, 6, 21),
                option_type: Some(kind),
            },
        );
    }
    fake.option_market.insert("opt-call".into(), market(dec!(2)));
    fake.option_market.insert("opt-put".into(), market(dec!(1)));

    fake.option_orders
        .insert(STD.into(), vec![option_order(STD, dec!(150), at(4, 14))]);
    fake.option_orders
        .insert(IRA.into(), vec![option_order(IRA, dec!(80), at(3, 14))]);

    fake.stock_orders.insert(
        STD.into(),
        vec![StockOrder {
            account_number: STD.to_string(),
            instrument_url: Some(AAPL_URL.to_string()),
            state: "filled".to_string(),
            side: Some("buy".to_string()),
            quantity: dec!(100),
            average_price: Some(dec!(150)),
            price: None,
            fees: Decimal::ZERO,
            created_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap()),
        }],
    );
    fake.crypto_orders.push(CryptoOrder {
        currency_pair_id: Some("btc".to_string()),
        state: "filled".to_string(),
        side: Some("buy".to_string()),
        quantity: dec!(0.5),
        average_price: Some(dec!(60000)),
        price: None,
        created_at: at(1, 14),
    });
    fake.pairs.insert(
        "btc".into(),
        CurrencyPair {
            id: "btc".to_string(),
            symbol: "BTC-USD".to_string(),
        },
    );

    fake
}

async fn setup(fake: FakeBrokerage) -> (Pipeline, Arc<MemorySpreadsheet>, Arc<RecordingSleeper>) {
    let sheets = Arc::new(MemorySpreadsheet::new("Portfolio"));
    sheets.open("Portfolio").await.unwrap();
    let sleeper = Arc::new(RecordingSleeper::new());
    let pipeline = Pipeline::new(Arc::new(fake), sheets.clone(), &config())
        .with_sleeper(sleeper.clone())
        .with_fixed_time(now());
    (pipeline, sheets, sleeper)
}

// ==================== Full Run ====================

#[tokio::test]
async fn full_run_publishes_every_stage() {
    let (pipeline, sheets, _) = setup(portfolio_brokerage()).await;

    let report = pipeline.run(&Stage::ALL).await;
    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.results.len(), 5);

    // Balances: crypto equity is part of the total.
    assert_eq!(sheets.text("Account Balances", "A1"), "Account Balances");
    assert_eq!(sheets.text("Account Balances", "B4"), "$30500.00");
    assert_eq!(sheets.text("Account Balances", "A14"), "Standard Account");
    assert_eq!(sheets.text("Account Balances", "B18"), "$1000.00");
    assert_eq!(sheets.text("Account Balances", "B49"), "$500.00");

    // Stocks, largest allocation first.
    assert_eq!(report.outcome(Stage::Stocks), Some(&StageOutcome::Written { rows: 2 }));
    assert_eq!(sheets.text("All Stock Positions", "B5"), "AAPL");
    assert_eq!(sheets.text("All Stock Positions", "H5"), "66.67%");
    assert_eq!(sheets.text("All Stock Positions", "B6"), "MSFT");

    // Option positions: duplicate id dropped, strategies classified.
    assert_eq!(report.outcome(Stage::Options), Some(&StageOutcome::Written { rows: 2 }));
    assert_eq!(sheets.text("Option Positions", "F5"), "Covered Call (CC)");
    assert_eq!(sheets.text("Option Positions", "F6"), "Cash-Secured Put (CSP)");

    // Orders: newest first, weekly tables at fixed rows.
    let orders = "Options Orders";
    assert_eq!(sheets.text(orders, "A1"), "Options Order History");
    assert_eq!(sheets.text(orders, "B4"), "Standard");
    assert_eq!(sheets.text(orders, "B5"), "IRA");
    assert_eq!(sheets.text(orders, "A25"), "Standard Weekly Premium Summary");
    assert_eq!(sheets.text(orders, "A27"), "2024-06-03");
    assert_eq!(sheets.text(orders, "B27"), "$150.00");
    assert_eq!(sheets.text(orders, "B38"), "$80.00");
    assert_eq!(sheets.text(orders, "D49"), "$0.00");

    // Trades merged newest first.
    let trades = "Recent Trades";
    assert_eq!(sheets.text(trades, "A1"), "Last 4 Filled Trades");
    assert_eq!(sheets.text(trades, "C4"), "Option");
    assert_eq!(sheets.text(trades, "B6"), "Crypto");
    assert_eq!(sheets.text(trades, "D6"), "BTC-USD");
    assert_eq!(sheets.text(trades, "D7"), "AAPL");
}

#[tokio::test]
async fn rerun_produces_identical_sheets() {
    let (pipeline, sheets, _) = setup(portfolio_brokerage()).await;

    pipeline.run(&Stage::ALL).await;
    let titles = sheets.worksheets().await.unwrap();
    let first: Vec<_> = titles.iter().map(|t| sheets.dump(t)).collect();

    pipeline.run(&Stage::ALL).await;
    let second: Vec<_> = titles.iter().map(|t| sheets.dump(t)).collect();

    assert_eq!(first, second);
    assert_eq!(sheets.worksheets().await.unwrap(), titles);
}

// ==================== Failure Isolation ====================

#[tokio::test]
async fn failed_listing_keeps_stale_sheet_and_other_stages_run() {
    let fake = portfolio_brokerage();
    fake.fail("option_positions");
    let (pipeline, sheets, _) = setup(fake).await;

    sheets.ensure_worksheet("Option Positions", 100, 20).await.unwrap();
    sheets
        .write("Option Positions", "A1", &[row(["yesterday"])])
        .await
        .unwrap();

    let report = pipeline.run(&Stage::ALL).await;

    assert!(report.outcome(Stage::Options).unwrap().is_failed());
    assert_eq!(report.failed().count(), 1);
    assert_eq!(sheets.text("Option Positions", "A1"), "yesterday");
    assert_eq!(sheets.text("Recent Trades", "A1"), "Last 4 Filled Trades");
}

#[tokio::test]
async fn per_record_failures_do_not_fail_the_stage() {
    let mut fake = portfolio_brokerage();
    fake.instruments.remove(MSFT_URL);
    fake.option_market.remove("opt-put");
    let (pipeline, sheets, _) = setup(fake).await;

    let report = pipeline.run(&[Stage::Stocks, Stage::Options]).await;

    assert!(report.is_success());
    assert_eq!(sheets.text("All Stock Positions", "B6"), "Error");
    assert_eq!(sheets.text("All Stock Positions", "C6"), "Error fetching data");
    assert_eq!(report.outcome(Stage::Options), Some(&StageOutcome::Written { rows: 1 }));
}

#[tokio::test]
async fn sheet_failure_fails_only_that_stage() {
    let (pipeline, sheets, _) = setup(portfolio_brokerage()).await;
    sheets.fail_worksheet("Recent Trades");

    let report = pipeline.run(&[Stage::Balances, Stage::Trades]).await;

    assert!(!report.outcome(Stage::Balances).unwrap().is_failed());
    assert!(report.outcome(Stage::Trades).unwrap().is_failed());
}

#[tokio::test]
async fn empty_upstream_publishes_placeholders() {
    let mut fake = FakeBrokerage::default();
    fake.profiles.insert(STD.into(), profile(STD, dec!(0), dec!(0)));
    fake.portfolios.insert(
        STD.into(),
        PortfolioSnapshot {
            account_number: STD.to_string(),
            equity: dec!(0),
        },
    );
    fake.profiles.insert(IRA.into(), profile(IRA, dec!(0), dec!(0)));
    fake.portfolios.insert(
        IRA.into(),
        PortfolioSnapshot {
            account_number: IRA.to_string(),
            equity: dec!(0),
        },
    );
    let (pipeline, sheets, _) = setup(fake).await;

    let report = pipeline.run(&Stage::ALL).await;

    assert!(report.is_success(), "{report:?}");
    assert_eq!(
        report.outcome(Stage::Stocks),
        Some(&StageOutcome::Empty {
            placeholder: "No positions found".to_string()
        })
    );
    assert_eq!(sheets.text("All Stock Positions", "A1"), "No positions found");
    assert_eq!(sheets.text("Option Positions", "A1"), "No option positions found");
    assert_eq!(sheets.text("Options Orders", "A1"), "No options orders found");
    assert_eq!(sheets.text("Recent Trades", "A1"), "No filled trades found");
}

// ==================== Pacing ====================

async fn options_stage_sleeps(positions: usize) -> usize {
    let mut fake = FakeBrokerage::default();
    let ids: Vec<String> = (0..positions).map(|i| format!("opt-{i}")).collect();
    fake.option_positions.insert(
        STD.into(),
        ids.iter().map(|id| option_position(STD, id)).collect(),
    );
    for id in &ids {
        fake.option_instruments.insert(
            id.clone(),
            OptionInstrument {
                id: id.clone(),
                chain_symbol: "AAPL".to_string(),
                strike_price: dec!(200),
                expiration_date: NaiveDate::from_ymd_opt(2024, 6, 21),
                option_type: Some(OptionType::Call),
            },
        );
        fake.option_market.insert(id.clone(), market(dec!(1)));
    }

    let sheets = Arc::new(MemorySpreadsheet::new("Portfolio"));
    sheets.open("Portfolio").await.unwrap();
    let sleeper = Arc::new(RecordingSleeper::new());
    let mut config = config();
    config.pacing.scale = 1.0;
    let pipeline = Pipeline::new(Arc::new(fake), sheets, &config)
        .with_sleeper(sleeper.clone())
        .with_fixed_time(now());

    let report = pipeline.run(&[Stage::Options]).await;
    assert_eq!(
        report.outcome(Stage::Options),
        Some(&StageOutcome::Written { rows: positions })
    );
    sleeper.slept().len()
}

#[tokio::test]
async fn option_lookups_pause_between_batches_of_five() {
    let four = options_stage_sleeps(4).await;
    let five = options_stage_sleeps(5).await;
    let six = options_stage_sleeps(6).await;

    // One lookup pause per position, plus a batch pause once a sixth starts.
    assert_eq!(five - four, 1);
    assert_eq!(six - five, 2);
}

// ==================== Rate Limits ====================

#[tokio::test]
async fn throttled_brokerage_reads_are_retried() {
    let fake = portfolio_brokerage();
    fake.throttle("stock_positions", 2);
    let (pipeline, _, sleeper) = setup(fake).await;

    let report = pipeline.run(&[Stage::Stocks]).await;

    assert!(report.is_success());
    let slept = sleeper.slept();
    assert_eq!(slept.len(), 2);
}

#[tokio::test]
async fn throttled_sheet_call_is_retried() {
    let (pipeline, sheets, sleeper) = setup(portfolio_brokerage()).await;
    sheets.inject_error(SheetError::RateLimit("Quota exceeded for write requests".to_string()));

    let report = pipeline.run(&[Stage::Balances]).await;

    assert!(report.is_success(), "{report:?}");
    assert_eq!(sleeper.slept().len(), 1);
    assert_eq!(sheets.text("Account Balances", "A1"), "Account Balances");
}

#[tokio::test]
async fn persistent_throttling_fails_the_stage() {
    let fake = portfolio_brokerage();
    fake.throttle("option_orders", 10);
    let (pipeline, _, sleeper) = setup(fake).await;

    let report = pipeline.run(&[Stage::Orders]).await;

    let outcome = report.outcome(Stage::Orders).unwrap();
    assert!(outcome.is_failed());
    assert!(outcome.to_string().contains("max retries (3)"));
    assert_eq!(sleeper.slept().len(), 3);
}
