//! Quote, deposit and invoice core for the painting business backoffice.
//!
//! - [`money`]: line totals, TVA breakdown, document totals and deposit figures
//! - [`models`]: quote requests, quotes, deposits, invoices and clients
//! - [`lifecycle`]: status transitions, each audited on success
//! - [`audit`]: snapshots, diffs and the action log
//! - [`orphans`]: linking anonymous requests to accounts
//! - [`db`]: Postgres and in-memory stores

#[macro_use]
mod macros;

pub mod audit;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod money;
pub mod orphans;

pub use config::CoreConfig;
pub use error::{AppError, Result};
