//! Stock and crypto order history.

use folio_sync_core::{BrokerageError, CryptoOrder, CurrencyPair, StockOrder};

use crate::client::{Host, RobinhoodClient};
use crate::types::{RawCryptoOrder, RawCurrencyPair, RawStockOrder};

impl RobinhoodClient {
    pub(crate) async fn fetch_stock_orders(
        &self,
        account: &str,
    ) -> Result<Vec<StockOrder>, BrokerageError> {
        let raw: Vec<RawStockOrder> = self
            .paginate(Host::Api, "/orders/", &[("account_number", account)])
            .await?;
        Ok(raw.into_iter().map(|o| o.into_order(account)).collect())
    }

    pub(crate) async fn fetch_crypto_orders(&self) -> Result<Vec<CryptoOrder>, BrokerageError> {
        let raw: Vec<RawCryptoOrder> = self.paginate(Host::Nummus, "/orders/", &[]).await?;
        Ok(raw.into_iter().map(CryptoOrder::from).collect())
    }

    pub(crate) async fn fetch_currency_pair(
        &self,
        pair_id: &str,
    ) -> Result<CurrencyPair, BrokerageError> {
        let id = Self::validate_identifier(pair_id)?;
        let raw: RawCurrencyPair = self
            .get(Host::Nummus, &format!("/currency_pairs/{id}/"), &[])
            .await?;
        raw.into_pair(pair_id)
    }
}
