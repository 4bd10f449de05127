//! Attaching anonymous quote requests to the accounts that submitted them

pub mod linker;
pub mod store;

pub use linker::{link_orphans_for_account, sweep_orphans, LinkNotifier, LinkReport, SweepLink, SweepOptions, SweepReport};
pub use store::{AccountStore, QuoteRequestStore};
