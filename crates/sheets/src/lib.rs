//! Spreadsheet backends for folio-sync.
//!
//! [`GoogleSheetsClient`] talks to Google Sheets with a service account;
//! [`MemorySpreadsheet`] keeps everything in memory for dry runs and tests.

pub mod auth;
pub mod client;
pub mod memory;

pub use auth::{ServiceAccountAuth, ServiceAccountKey};
pub use client::{GoogleSheetsClient, SheetsClientConfig};
pub use memory::MemorySpreadsheet;
