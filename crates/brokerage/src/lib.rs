//! Robinhood implementation of the folio-sync [`folio_sync_core::Brokerage`]
//! collaborator.
//!
//! Read-only: the client logs in with a password grant and fetches accounts,
//! positions, quotes and order history. It never places or cancels orders.

mod account;
mod auth;
mod brokerage;
pub mod client;
mod options;
mod orders;
mod positions;
mod types;

pub use client::{RobinhoodClient, RobinhoodConfig};
