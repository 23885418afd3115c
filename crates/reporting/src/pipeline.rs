//! Runs report stages in order and publishes each to its worksheet.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument};

use folio_sync_core::{
    AccountRegistry, AppConfig, Brokerage, Pacer, PacingConfig, RateLimitHandler, ReportConfig,
    SheetsConfig, Sleeper, SpreadsheetBackend, TokioSleeper,
};

use crate::context::StageContext;
use crate::layout::SheetLayout;
use crate::orders::{self, OrdersLayoutOptions};
use crate::render;
use crate::types::{RunReport, Stage, StageError, StageOutcome, StageResult};
use crate::{balances, options, positions, trades};

const CLEAR_PAUSE: Duration = Duration::from_secs(2);
const WRITE_PAUSE: Duration = Duration::from_secs(2);
const FORMAT_PAUSE: Duration = Duration::from_secs(1);

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Wires the brokerage, the spreadsheet and the configuration into a run.
///
/// The caller logs in and opens the spreadsheet before [`Pipeline::run`].
pub struct Pipeline {
    brokerage: Arc<dyn Brokerage>,
    sheets: Arc<dyn SpreadsheetBackend>,
    registry: AccountRegistry,
    sheet_names: SheetsConfig,
    report: ReportConfig,
    pacing: PacingConfig,
    retry: RateLimitHandler,
    pacer: Pacer,
    clock: Clock,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("registry", &self.registry)
            .field("report", &self.report)
            .field("retry", &self.retry)
            .field("pacer", &self.pacer)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    #[must_use]
    pub fn new(
        brokerage: Arc<dyn Brokerage>,
        sheets: Arc<dyn SpreadsheetBackend>,
        config: &AppConfig,
    ) -> Self {
        let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
        Self {
            brokerage,
            sheets,
            registry: AccountRegistry::from_config(&config.accounts),
            sheet_names: config.sheets.clone(),
            report: config.report.clone(),
            pacing: config.pacing,
            retry: RateLimitHandler::new(config.retry, sleeper.clone()),
            pacer: Pacer::new(config.pacing, sleeper),
            clock: Arc::new(Utc::now),
        }
    }

    /// Routes retry backoff and pacing through `sleeper`.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.retry = RateLimitHandler::new(*self.retry.policy(), sleeper.clone());
        self.pacer = Pacer::new(self.pacing, sleeper);
        self
    }

    /// Pins the clock used for week windows and "Last Updated" stamps.
    #[must_use]
    pub fn with_fixed_time(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Arc::new(move || now);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    #[must_use]
    pub fn worksheet_title(&self, stage: Stage) -> &str {
        match stage {
            Stage::Balances => &self.sheet_names.balances_sheet,
            Stage::Stocks => &self.sheet_names.stock_positions_sheet,
            Stage::Orders => &self.sheet_names.options_orders_sheet,
            Stage::Options => &self.sheet_names.option_positions_sheet,
            Stage::Trades => &self.sheet_names.recent_trades_sheet,
        }
    }

    /// Runs `stages` in order, each isolated from the others' failures.
    /// Repeated stages run once.
    pub async fn run(&self, stages: &[Stage]) -> RunReport {
        let started = Instant::now();
        let now = (self.clock)();
        let tz = render::timezone(&self.report.timezone);
        let ctx = StageContext {
            brokerage: self.brokerage.as_ref(),
            retry: &self.retry,
            pacer: &self.pacer,
            registry: &self.registry,
            report: &self.report,
            tz,
            now,
        };

        let mut report = RunReport::default();
        let mut seen = Vec::with_capacity(stages.len());
        for &stage in stages {
            if seen.contains(&stage) {
                continue;
            }
            seen.push(stage);

            let stage_started = Instant::now();
            let outcome = match self.run_stage(stage, &ctx).await {
                Ok(layout) => match &layout.placeholder {
                    Some(message) => StageOutcome::Empty {
                        placeholder: message.clone(),
                    },
                    None => StageOutcome::Written {
                        rows: layout.data_rows,
                    },
                },
                Err(e) => {
                    error!(%stage, error = %e, "stage failed");
                    StageOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.results.push(StageResult {
                stage,
                outcome,
                elapsed: stage_started.elapsed(),
            });
        }

        report.elapsed = started.elapsed();
        report
    }

    #[instrument(skip_all, fields(stage = %stage))]
    async fn run_stage(
        &self,
        stage: Stage,
        ctx: &StageContext<'_>,
    ) -> Result<SheetLayout, StageError> {
        info!("starting stage");
        let title = self.worksheet_title(stage);
        let layout = match stage {
            Stage::Balances => {
                let summary = balances::collect(ctx).await?;
                let updated = render::local_timestamp(ctx.now, ctx.tz);
                balances::balances_layout(title, &summary, &updated)
            }
            Stage::Stocks => {
                let (rows, total) = positions::collect(ctx).await?;
                positions::positions_layout(title, &rows, total)
            }
            Stage::Orders => {
                let enriched = orders::collect(ctx).await?;
                orders::orders_layout(
                    title,
                    &enriched,
                    &OrdersLayoutOptions {
                        history_rows: self.report.order_rows,
                        premium_weeks: self.report.premium_weeks,
                        now: ctx.now,
                    },
                )
            }
            Stage::Options => {
                let (rows, total) = options::collect(ctx).await?;
                options::options_layout(title, &rows, total)
            }
            Stage::Trades => {
                let trades = trades::collect(ctx).await?;
                trades::trades_layout(title, &trades, ctx.tz)
            }
        };

        self.publish(&layout).await?;
        Ok(layout)
    }

    /// Ensure worksheet, clear, write blocks, apply formats.
    async fn publish(&self, layout: &SheetLayout) -> Result<(), StageError> {
        let sheets = self.sheets.as_ref();
        let title = layout.title.as_str();
        let (rows, cols) = layout.required_grid();

        self.retry
            .retry_with_backoff(move || sheets.ensure_worksheet(title, rows, cols))
            .await?;
        self.retry
            .retry_with_backoff(move || sheets.clear(title))
            .await?;
        self.pacer.sleep_with_jitter(CLEAR_PAUSE).await;

        for block in &layout.blocks {
            let anchor = block.anchor.as_str();
            let values = block.rows.as_slice();
            self.retry
                .retry_with_backoff(move || sheets.write(title, anchor, values))
                .await?;
            self.pacer.sleep_with_jitter(WRITE_PAUSE).await;
        }

        for (range, format) in &layout.formats {
            let range = range.as_str();
            self.retry
                .retry_with_backoff(move || sheets.format(title, range, format))
                .await?;
            self.pacer.sleep_with_jitter(FORMAT_PAUSE).await;
        }

        info!(
            title,
            blocks = layout.blocks.len(),
            rows = layout.data_rows,
            "worksheet published"
        );
        Ok(())
    }
}
