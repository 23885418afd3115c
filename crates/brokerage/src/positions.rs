//! Stock positions, instruments and quotes.

use rust_decimal::Decimal;

use folio_sync_core::{BrokerageError, Instrument, StockPosition};

use crate::client::{Host, RobinhoodClient};
use crate::types::{decimal, OneOrMany, RawInstrument, RawQuote, RawStockPosition};

impl RobinhoodClient {
    pub(crate) async fn fetch_stock_positions(
        &self,
        account: &str,
    ) -> Result<Vec<StockPosition>, BrokerageError> {
        let raw: Vec<RawStockPosition> = self
            .paginate(
                Host::Api,
                "/positions/",
                &[("account_number", account), ("nonzero", "true")],
            )
            .await?;
        Ok(raw.into_iter().map(|p| p.into_position(account)).collect())
    }

    /// Resolves an instrument by the URL a position or order refers to.
    pub(crate) async fn fetch_instrument(&self, url: &str) -> Result<Instrument, BrokerageError> {
        let raw: RawInstrument = self.get_url(url, &[]).await?;
        raw.into_instrument(url)
    }

    pub(crate) async fn fetch_latest_price(
        &self,
        symbol: &str,
    ) -> Result<Option<Decimal>, BrokerageError> {
        let symbol = symbol.trim().to_ascii_uppercase();
        let quotes: OneOrMany<Option<RawQuote>> = self
            .get(Host::Api, "/marketdata/quotes/", &[("symbols", symbol.as_str())])
            .await?;
        Ok(quotes
            .into_first()
            .flatten()
            .and_then(|q| decimal(q.last_trade_price.as_ref())))
    }
}
