//! Stage selection, per-stage outcomes and the run report.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use folio_sync_core::{BrokerageError, RetryError, SheetError};

/// One independently failing unit of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Balances,
    Stocks,
    Orders,
    Options,
    Trades,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Balances,
        Stage::Stocks,
        Stage::Orders,
        Stage::Options,
        Stage::Trades,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Balances => "balances",
            Self::Stocks => "stocks",
            Self::Orders => "orders",
            Self::Options => "options",
            Self::Trades => "trades",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "balances" => Ok(Self::Balances),
            "stocks" | "positions" => Ok(Self::Stocks),
            "orders" => Ok(Self::Orders),
            "options" => Ok(Self::Options),
            "trades" => Ok(Self::Trades),
            other => Err(format!(
                "unknown stage '{other}' (expected balances, stocks, orders, options or trades)"
            )),
        }
    }
}

/// Why a stage stopped before publishing.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("brokerage: {0}")]
    Brokerage(#[from] RetryError<BrokerageError>),

    #[error("spreadsheet: {0}")]
    Sheet(#[from] RetryError<SheetError>),
}

/// What a stage left in its worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    /// Data rows were published.
    Written { rows: usize },
    /// Upstream legitimately had nothing; the placeholder was published.
    Empty { placeholder: String },
    /// The stage aborted; the worksheet keeps whatever it held before.
    Failed { reason: String },
}

impl StageOutcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written { rows } => write!(f, "wrote {rows} rows"),
            Self::Empty { placeholder } => write!(f, "empty ({placeholder})"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub stage: Stage,
    #[serde(flatten)]
    pub outcome: StageOutcome,
    pub elapsed: Duration,
}

/// Outcomes of every stage attempted by one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub results: Vec<StageResult>,
    pub elapsed: Duration,
}

impl RunReport {
    #[must_use]
    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.results
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }

    pub fn failed(&self) -> impl Iterator<Item = &StageResult> {
        self.results.iter().filter(|r| r.outcome.is_failed())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    /// Logs one line per stage and the total elapsed time.
    pub fn log(&self) {
        for result in &self.results {
            if result.outcome.is_failed() {
                tracing::error!(
                    stage = %result.stage,
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    "{}",
                    result.outcome
                );
            } else {
                tracing::info!(
                    stage = %result.stage,
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    "{}",
                    result.outcome
                );
            }
        }
        tracing::info!(
            stages = self.results.len(),
            failed = self.failed().count(),
            "total execution time: {:.2}s",
            self.elapsed.as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_parse() {
        assert_eq!("Balances".parse::<Stage>(), Ok(Stage::Balances));
        assert_eq!("positions".parse::<Stage>(), Ok(Stage::Stocks));
        assert!("earnings".parse::<Stage>().is_err());
        assert_eq!(Stage::Options.to_string(), "options");
    }

    #[test]
    fn report_tracks_failures() {
        let report = RunReport {
            results: vec![
                StageResult {
                    stage: Stage::Balances,
                    outcome: StageOutcome::Written { rows: 6 },
                    elapsed: Duration::from_millis(5),
                },
                StageResult {
                    stage: Stage::Trades,
                    outcome: StageOutcome::Failed {
                        reason: "boom".to_string(),
                    },
                    elapsed: Duration::from_millis(1),
                },
            ],
            elapsed: Duration::from_millis(6),
        };
        assert!(!report.is_success());
        assert_eq!(report.failed().count(), 1);
        assert_eq!(
            report.outcome(Stage::Balances),
            Some(&StageOutcome::Written { rows: 6 })
        );
        assert_eq!(report.outcome(Stage::Orders), None);
    }

    #[test]
    fn stage_error_wraps_retry_failures() {
        let err = StageError::from(RetryError::Permanent(BrokerageError::NotFound(
            "account".to_string(),
        )));
        assert_eq!(err.to_string(), "brokerage: not found: account");
    }
}
