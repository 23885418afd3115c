//! [`Brokerage`] implementation backed by the REST client.

use async_trait::async_trait;
use rust_decimal::Decimal;

use folio_sync_core::{
    AccountProfile, BrokerAccount, Brokerage, BrokerageError, CryptoOrder, CurrencyPair,
    Instrument, OptionInstrument, OptionMarketData, OptionOrder, OptionPosition,
    PortfolioSnapshot, StockOrder, StockPosition, UnifiedAccount,
};

use crate::client::RobinhoodClient;

#[async_trait]
impl Brokerage for RobinhoodClient {
    async fn login(&self) -> Result<(), BrokerageError> {
        self.password_login().await
    }

    async fn list_accounts(&self) -> Result<Vec<BrokerAccount>, BrokerageError> {
        self.fetch_accounts().await
    }

    async fn account_profile(&self, account: &str) -> Result<AccountProfile, BrokerageError> {
        self.fetch_account_profile(account).await
    }

    async fn portfolio(&self, account: &str) -> Result<PortfolioSnapshot, BrokerageError> {
        self.fetch_portfolio(account).await
    }

    async fn unified_account(&self) -> Result<UnifiedAccount, BrokerageError> {
        self.fetch_unified_account().await
    }

    async fn stock_positions(&self, account: &str) -> Result<Vec<StockPosition>, BrokerageError> {
        self.fetch_stock_positions(account).await
    }

    async fn instrument(&self, url: &str) -> Result<Instrument, BrokerageError> {
        self.fetch_instrument(url).await
    }

    async fn latest_price(&self, symbol: &str) -> Result<Option<Decimal>, BrokerageError> {
        self.fetch_latest_price(symbol).await
    }

    async fn option_positions(&self, account: &str) -> Result<Vec<OptionPosition>, BrokerageError> {
        self.fetch_option_positions(account).await
    }

    async fn option_instrument(&self, option_id: &str) -> Result<OptionInstrument, BrokerageError> {
        self.fetch_option_instrument(option_id).await
    }

    async fn option_market_data(
        &self,
        option_id: &str,
    ) -> Result<OptionMarketData, BrokerageError> {
        self.fetch_option_market_data(option_id).await
    }

    async fn option_orders(&self, account: &str) -> Result<Vec<OptionOrder>, BrokerageError> {
        self.fetch_option_orders(account).await
    }

    async fn stock_orders(&self, account: &str) -> Result<Vec<StockOrder>, BrokerageError> {
        self.fetch_stock_orders(account).await
    }

    async fn crypto_orders(&self) -> Result<Vec<CryptoOrder>, BrokerageError> {
        self.fetch_crypto_orders().await
    }

    async fn currency_pair(&self, pair_id: &str) -> Result<CurrencyPair, BrokerageError> {
        self.fetch_currency_pair(pair_id).await
    }
}
