//! Shared collaborators handed to every stage.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::warn;

use folio_sync_core::{
    AccountRegistry, Brokerage, BrokerageError, Pacer, RateLimitHandler, ReportConfig, RetryError,
};

/// Pause between per-record option lookups.
pub const OPTION_LOOKUP_PAUSE: Duration = Duration::from_millis(300);
/// Option lookups run in batches of this size.
pub const OPTION_LOOKUP_BATCH: usize = 5;
/// Pause between option lookup batches.
pub const OPTION_BATCH_PAUSE: Duration = Duration::from_secs(1);
/// Pause between instrument lookups for held shares.
pub const HOLDING_LOOKUP_PAUSE: Duration = Duration::from_millis(200);
/// Pause between per-account listings.
pub const ACCOUNT_PAUSE: Duration = Duration::from_secs(1);

pub struct StageContext<'a> {
    pub brokerage: &'a dyn Brokerage,
    pub retry: &'a RateLimitHandler,
    pub pacer: &'a Pacer,
    pub registry: &'a AccountRegistry,
    pub report: &'a ReportConfig,
    pub tz: Tz,
    pub now: DateTime<Utc>,
}

impl StageContext<'_> {
    /// Runs a brokerage read under the rate-limit retry policy.
    pub async fn fetch<T, F, Fut>(&self, op: F) -> Result<T, RetryError<BrokerageError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BrokerageError>>,
    {
        self.retry.retry_with_backoff(op).await
    }

    pub async fn pause(&self, base: Duration) {
        self.pacer.sleep_with_jitter(base).await;
    }

    /// Unified total equity, then unified portfolio equity, then `fallback`
    /// when positive, then 1.0 so allocations never divide by zero.
    pub async fn portfolio_value(&self, fallback: Decimal) -> Decimal {
        let brokerage = self.brokerage;
        match self.fetch(move || brokerage.unified_account()).await {
            Ok(unified) => {
                if let Some(total) = unified.total_equity.or(unified.portfolio_equity) {
                    if total > Decimal::ZERO {
                        return total;
                    }
                }
            }
            Err(e) => warn!(error = %e, "unified account unavailable, estimating portfolio value"),
        }
        if fallback > Decimal::ZERO {
            fallback
        } else {
            Decimal::ONE
        }
    }
}

/// `value / total × 100`, zero when `total` is not positive.
#[must_use]
pub fn allocation(value: Decimal, total: Decimal) -> Decimal {
    if total > Decimal::ZERO {
        value / total * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    }
}
