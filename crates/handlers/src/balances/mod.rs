//! Balances pallet: transfers, reserves and root-set balances.

mod handler;
pub mod schemas;

pub use handler::BalancesHandler;
