//! Option positions, instruments, market data and order history.

use folio_sync_core::{BrokerageError, OptionInstrument, OptionMarketData, OptionOrder, OptionPosition};

use crate::client::{Host, RobinhoodClient};
use crate::types::{OneOrMany, RawOptionInstrument, RawOptionMarketData, RawOptionOrder, RawOptionPosition};

impl RobinhoodClient {
    pub(crate) async fn fetch_option_positions(
        &self,
        account: &str,
    ) -> Result<Vec<OptionPosition>, BrokerageError> {
        let raw: Vec<RawOptionPosition> = self
            .paginate(
                Host::Api,
                "/options/positions/",
                &[("nonzero", "True"), ("account_numbers", account)],
            )
            .await?;

        let total = raw.len();
        let positions: Vec<OptionPosition> = raw
            .into_iter()
            .filter_map(|p| p.into_position(account))
            .collect();
        if positions.len() < total {
            tracing::warn!(
                account,
                dropped = total - positions.len(),
                "option positions without an option id were dropped"
            );
        }
        Ok(positions)
    }

    pub(crate) async fn fetch_option_instrument(
        &self,
        option_id: &str,
    ) -> Result<OptionInstrument, BrokerageError> {
        let id = Self::validate_identifier(option_id)?;
        let raw: OneOrMany<RawOptionInstrument> = self
            .get(Host::Api, &format!("/options/instruments/{id}/"), &[])
            .await?;
        raw.into_first()
            .ok_or_else(|| BrokerageError::NotFound(format!("option instrument {option_id}")))?
            .into_instrument(option_id)
    }

    pub(crate) async fn fetch_option_market_data(
        &self,
        option_id: &str,
    ) -> Result<OptionMarketData, BrokerageError> {
        let id = Self::validate_identifier(option_id)?;
        let raw: OneOrMany<RawOptionMarketData> = self
            .get(Host::Api, &format!("/marketdata/options/{id}/"), &[])
            .await?;
        raw.into_first()
            .map(OptionMarketData::from)
            .ok_or_else(|| BrokerageError::NotFound(format!("option market data {option_id}")))
    }

    /// All option orders for one account, each tagged with that account.
    pub(crate) async fn fetch_option_orders(
        &self,
        account: &str,
    ) -> Result<Vec<OptionOrder>, BrokerageError> {
        let raw: Vec<RawOptionOrder> = self
            .paginate(
                Host::Api,
                "/options/orders/",
                &[("account_numbers", account), ("page_size", "50")],
            )
            .await?;
        Ok(raw.into_iter().map(|o| o.into_order(account)).collect())
    }
}
