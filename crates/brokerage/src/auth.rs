//! Password-grant login against the Robinhood OAuth endpoint.

use secrecy::ExposeSecret;

use folio_sync_core::BrokerageError;

use crate::client::{handle_response, transport_error, Host, RobinhoodClient};
use crate::types::RawToken;

const TOKEN_PATH: &str = "/oauth2/token/";

impl RobinhoodClient {
    /// Exchanges username and password for a session token.
    ///
    /// Interactive challenges (SMS, app approval) are not supported and
    /// surface as [`BrokerageError::Authentication`].
    pub(crate) async fn password_login(&self) -> Result<(), BrokerageError> {
        if self.config.username.trim().is_empty() {
            return Err(BrokerageError::Authentication(
                "username is not configured".to_string(),
            ));
        }

        let device_token = uuid::Uuid::new_v4().to_string();
        let expires_in = self.config.expires_in_secs.to_string();
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("expires_in", expires_in.as_str()),
            ("grant_type", "password"),
            ("password", self.config.password.expose_secret()),
            ("scope", "internal"),
            ("username", self.config.username.as_str()),
            ("device_token", device_token.as_str()),
        ];

        tracing::debug!(username = %self.config.username, "requesting session token");

        let response = self
            .http
            .post(self.url(Host::Api, TOKEN_PATH))
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;

        let token: RawToken = match handle_response(response).await {
            Ok(token) => token,
            Err(BrokerageError::Api { status_code, message }) if status_code == 400 => {
                return Err(BrokerageError::Authentication(message));
            }
            Err(e) => return Err(e),
        };

        if let Some(access) = token.access_token.filter(|t| !t.is_empty()) {
            if let Some(kind) = token.token_type.as_deref() {
                if !kind.eq_ignore_ascii_case("bearer") {
                    tracing::warn!(token_type = kind, "unexpected token type");
                }
            }
            self.set_token(access);
            tracing::info!("logged in to brokerage");
            return Ok(());
        }

        if token.mfa_required.unwrap_or(false) || token.verification_workflow.is_some() {
            return Err(BrokerageError::Authentication(
                "login requires an interactive verification challenge".to_string(),
            ));
        }

        Err(BrokerageError::Authentication(
            token
                .detail
                .unwrap_or_else(|| "login response carried no access token".to_string()),
        ))
    }
}
