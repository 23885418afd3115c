//! Report stages for folio-sync.
//!
//! Each stage reads from a [`folio_sync_core::Brokerage`], builds a
//! [`SheetLayout`] and publishes it through a
//! [`folio_sync_core::SpreadsheetBackend`]. [`Pipeline`] runs the stages with
//! per-stage failure isolation and returns a [`RunReport`].

pub mod balances;
pub mod context;
pub mod layout;
pub mod options;
pub mod orders;
pub mod pipeline;
pub mod positions;
pub mod premium;
pub mod render;
pub mod strategy;
pub mod trades;
pub mod types;

pub use layout::{Block, SheetLayout};
pub use pipeline::Pipeline;
pub use premium::{PremiumSummary, WeeklyPremium};
pub use strategy::{classify, ClassifierInput, CollateralBook, Holding, StrategyLabel};
pub use types::{RunReport, Stage, StageError, StageOutcome, StageResult};
