use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

pub const MAX_RETRY_MULTIPLIER: f64 = 10.0;
pub const MAX_RETRY_DELAY_SECS: f64 = 3600.0;
pub const MAX_PACING_SCALE: f64 = 100.0;
/// Ten years of weekly rows.
pub const MAX_PREMIUM_WEEKS: u32 = 520;

#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub brokerage: BrokerageConfig,
    pub accounts: AccountsConfig,
    pub sheets: SheetsConfig,
    pub retry: RetryConfig,
    pub pacing: PacingConfig,
    pub report: ReportConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerageConfig {
    pub api_url: String,
    pub phoenix_url: String,
    pub nummus_url: String,
    #[serde(deserialize_with = "text")]
    pub username: String,
    #[serde(deserialize_with = "text")]
    pub password: String,
    pub client_id: String,
    /// Token lifetime requested at login (seconds).
    pub expires_in_secs: u64,
    pub timeout_secs: u64,
    /// Upper bound on pages followed for any paginated listing.
    pub max_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AccountsConfig {
    #[serde(deserialize_with = "text")]
    pub primary: String,
    #[serde(deserialize_with = "optional_text")]
    pub ira: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub third: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub api_url: String,
    pub drive_url: String,
    pub credentials_file: PathBuf,
    #[serde(deserialize_with = "text")]
    pub spreadsheet_name: String,
    pub timeout_secs: u64,
    pub balances_sheet: String,
    pub stock_positions_sheet: String,
    pub option_positions_sheet: String,
    pub options_orders_sheet: String,
    pub recent_trades_sheet: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
    pub multiplier: f64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Multiplier applied to every pacing pause; 0 disables pacing.
    pub scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub premium_weeks: u32,
    pub order_rows: usize,
    pub trade_rows: usize,
    /// IANA zone used when rendering timestamps.
    pub timezone: String,
}

/// Ids and secrets may arrive as numbers from TOML or parsed environment
/// values; they are always kept as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Flag(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Unsigned(n) => n.to_string(),
            Self::Signed(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Flag(b) => b.to_string(),
        }
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(Scalar::into_text)
}

fn optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_text))
}

impl Default for BrokerageConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.robinhood.com".to_string(),
            phoenix_url: "https://phoenix.robinhood.com".to_string(),
            nummus_url: "https://nummus.robinhood.com".to_string(),
            username: String::new(),
            password: String::new(),
            client_id: "c82SH0WZOsabOXGP2sxqcj34FxkvfnWRZBKlBjFS".to_string(),
            expires_in_secs: 86_400,
            timeout_secs: 30,
            max_pages: 10,
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://sheets.googleapis.com/v4".to_string(),
            drive_url: "https://www.googleapis.com/drive/v3".to_string(),
            credentials_file: PathBuf::from("credentials.json"),
            spreadsheet_name: String::new(),
            timeout_secs: 30,
            balances_sheet: "Account Balances".to_string(),
            stock_positions_sheet: "All Stock Positions".to_string(),
            option_positions_sheet: "Option Positions".to_string(),
            options_orders_sheet: "Options Orders".to_string(),
            recent_trades_sheet: "Recent Trades".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 0.5,
            max_delay_secs: 15.0,
            multiplier: 1.8,
            max_retries: 3,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_delay_secs.max(0.0).min(MAX_RETRY_DELAY_SECS))
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs_f64(self.max_delay_secs.max(0.0).min(MAX_RETRY_DELAY_SECS))
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            premium_weeks: 8,
            order_rows: 20,
            trade_rows: 50,
            timezone: "America/New_York".to_string(),
        }
    }
}

impl AppConfig {
    /// Checks that every value needed before touching the network is present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming every absent required setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.brokerage.username.trim().is_empty() {
            missing.push("ROBINHOOD_USER");
        }
        if self.brokerage.password.is_empty() {
            missing.push("ROBINHOOD_PASS");
        }
        if self.accounts.primary.trim().is_empty() {
            missing.push("MAIN_ACCOUNT");
        }
        if self.sheets.spreadsheet_name.trim().is_empty() {
            missing.push("SPREADSHEET_NAME");
        }

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing.join(", ")));
        }

        let retry = &self.retry;
        if !(1.0..=MAX_RETRY_MULTIPLIER).contains(&retry.multiplier) {
            return Err(ConfigError::Invalid(format!(
                "retry.multiplier must be between 1.0 and {MAX_RETRY_MULTIPLIER}, got {}",
                retry.multiplier
            )));
        }
        for (name, secs) in [
            ("retry.base_delay_secs", retry.base_delay_secs),
            ("retry.max_delay_secs", retry.max_delay_secs),
        ] {
            if !(0.0..=MAX_RETRY_DELAY_SECS).contains(&secs) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between 0 and {MAX_RETRY_DELAY_SECS}, got {secs}"
                )));
            }
        }
        if !(0.0..=MAX_PACING_SCALE).contains(&self.pacing.scale) {
            return Err(ConfigError::Invalid(format!(
                "pacing.scale must be between 0 and {MAX_PACING_SCALE}, got {}",
                self.pacing.scale
            )));
        }
        if !(1..=MAX_PREMIUM_WEEKS).contains(&self.report.premium_weeks) {
            return Err(ConfigError::Invalid(format!(
                "report.premium_weeks must be between 1 and {MAX_PREMIUM_WEEKS}, got {}",
                self.report.premium_weeks
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("brokerage", &self.brokerage)
            .field("accounts", &self.accounts)
            .field("sheets", &self.sheets)
            .field("retry", &self.retry)
            .field("pacing", &self.pacing)
            .field("report", &self.report)
            .finish()
    }
}

impl std::fmt::Debug for BrokerageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerageConfig")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> AppConfig {
        let mut config = AppConfig::default();
        config.brokerage.username = "me@example.com".to_string();
        config.brokerage.password = "hunter2".to_string();
        config.accounts.primary = "5QU00001".to_string();
        config.sheets.spreadsheet_name = "Tracker".to_string();
        config
    }

    #[test]
    fn complete_config_validates() {
        assert!(complete().validate().is_ok());
    }

    #[test]
    fn missing_values_are_all_reported() {
        let err = AppConfig::default().validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ROBINHOOD_USER"));
        assert!(msg.contains("ROBINHOOD_PASS"));
        assert!(msg.contains("MAIN_ACCOUNT"));
        assert!(msg.contains("SPREADSHEET_NAME"));
    }

    #[test]
    fn blank_primary_account_is_missing() {
        let mut config = complete();
        config.accounts.primary = "   ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("MAIN_ACCOUNT"));
        assert!(!err.to_string().contains("SPREADSHEET_NAME"));
    }

    #[test]
    fn shrinking_multiplier_is_rejected() {
        let mut config = complete();
        config.retry.multiplier = 0.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unbounded_multiplier_is_rejected() {
        for multiplier in [1e20, f64::NAN, f64::INFINITY] {
            let mut config = complete();
            config.retry.multiplier = multiplier;
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "multiplier {multiplier} accepted"
            );
        }
        let mut config = complete();
        config.retry.multiplier = MAX_RETRY_MULTIPLIER;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oversized_retry_delays_are_rejected() {
        let mut config = complete();
        config.retry.base_delay_secs = 1e30;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("retry.base_delay_secs"));

        let mut config = complete();
        config.retry.max_delay_secs = f64::NAN;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("retry.max_delay_secs"));

        let mut config = complete();
        config.retry.max_delay_secs = MAX_RETRY_DELAY_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn delay_accessors_clamp_out_of_range_values() {
        let retry = RetryConfig {
            base_delay_secs: 1e30,
            max_delay_secs: -5.0,
            ..RetryConfig::default()
        };
        assert_eq!(retry.base_delay(), Duration::from_secs(3600));
        assert_eq!(retry.max_delay(), Duration::ZERO);
    }

    #[test]
    fn premium_weeks_are_bounded() {
        let mut config = complete();
        config.report.premium_weeks = 4_000_000_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.report.premium_weeks = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.report.premium_weeks = MAX_PREMIUM_WEEKS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn negative_or_nan_pacing_scale_is_rejected() {
        for scale in [-1.0, f64::NAN] {
            let mut config = complete();
            config.pacing.scale = scale;
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn debug_output_redacts_password() {
        let rendered = format!("{:?}", complete());
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay(), Duration::from_millis(500));
        assert_eq!(config.retry.max_delay(), Duration::from_secs(15));
        assert_eq!(config.report.premium_weeks, 8);
        assert_eq!(config.sheets.options_orders_sheet, "Options Orders");
        assert_eq!(config.brokerage.max_pages, 10);
    }
}
