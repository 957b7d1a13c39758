//! Balance and supply accounting for a mint-only ERC777 style token on the FVM.
//!
//! [`ledger::Ledger`] holds the balances and total supply and is the only place tokens are
//! created. [`contract::TokenContract`] wraps a ledger with ownership, the ERC20 compatibility
//! switch and an event log, and reports failed mints the way a reverted message would.

pub mod config;
pub mod contract;
pub mod events;
pub mod holder;
pub mod ledger;
pub mod shared;
