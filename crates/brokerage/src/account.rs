//! Account, portfolio and unified-balance endpoints.

use folio_sync_core::{AccountProfile, BrokerAccount, BrokerageError, PortfolioSnapshot, UnifiedAccount};

use crate::client::{Host, RobinhoodClient};
use crate::types::{RawAccount, RawPortfolio, RawUnified};

impl RobinhoodClient {
    pub(crate) async fn fetch_accounts(&self) -> Result<Vec<BrokerAccount>, BrokerageError> {
        let raw: Vec<RawAccount> = self.paginate(Host::Api, "/accounts/", &[]).await?;
        Ok(raw
            .into_iter()
            .filter_map(RawAccount::into_broker_account)
            .collect())
    }

    pub(crate) async fn fetch_account_profile(
        &self,
        account: &str,
    ) -> Result<AccountProfile, BrokerageError> {
        let id = Self::validate_identifier(account)?;
        let raw: RawAccount = self
            .get(Host::Api, &format!("/accounts/{id}/"), &[])
            .await?;
        Ok(raw.into_profile(account))
    }

    pub(crate) async fn fetch_portfolio(
        &self,
        account: &str,
    ) -> Result<PortfolioSnapshot, BrokerageError> {
        let id = Self::validate_identifier(account)?;
        let raw: RawPortfolio = self
            .get(Host::Api, &format!("/portfolios/{id}/"), &[])
            .await?;
        Ok(raw.into_snapshot(account))
    }

    pub(crate) async fn fetch_unified_account(&self) -> Result<UnifiedAccount, BrokerageError> {
        let raw: RawUnified = self.get(Host::Phoenix, "/accounts/unified", &[]).await?;
        Ok(raw.into())
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{RobinhoodClient, RobinhoodConfig};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RobinhoodClient {
        RobinhoodClient::new(RobinhoodConfig::default().with_base_url(server.uri()))
            .unwrap()
            .with_access_token("t")
    }

    #[tokio::test]
    async fn test_account_profile_parses_cash_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/5QR111/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "account_number": "5QR111",
                "cash": "1500.25",
                "cash_held_for_options_collateral": "1000.00",
                "unsettled_funds": "0.00"
            })))
            .mount(&server)
            .await;

        let profile = client(&server).fetch_account_profile("5QR111").await.unwrap();
        assert_eq!(profile.cash, dec!(1500.25));
        assert_eq!(profile.cash_held_for_options_collateral, dec!(1000));
        assert_eq!(profile.unsettled_funds, dec!(0));
    }

    #[tokio::test]
    async fn test_list_accounts_skips_rows_without_number() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"account_number": "5QR111", "type": "margin"},
                    {"account_number": "", "type": "cash"},
                    {"account_number": "9IR222", "brokerage_account_type": "ira_roth", "type": "cash"}
                ],
                "next": null
            })))
            .mount(&server)
            .await;

        let accounts = client(&server).fetch_accounts().await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[1].kind.as_deref(), Some("ira_roth"));
    }

    #[tokio::test]
    async fn test_portfolio_and_unified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/portfolios/5QR111/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "equity": "20000.00", "extended_hours_equity": "20010.00"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/unified"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_equity": {"amount": "31000.00", "currency_code": "USD"},
                "portfolio_equity": "30000.00",
                "crypto": {"equity": {"amount": "1000.00"}}
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let snapshot = client.fetch_portfolio("5QR111").await.unwrap();
        assert_eq!(snapshot.equity, dec!(20000));

        let unified = client.fetch_unified_account().await.unwrap();
        assert_eq!(unified.total_equity, Some(dec!(31000)));
        assert_eq!(unified.portfolio_equity, Some(dec!(30000)));
        assert_eq!(unified.crypto_equity, Some(dec!(1000)));
    }
}
