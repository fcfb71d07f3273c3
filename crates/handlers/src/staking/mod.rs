//! Staking pallet: rewards, slashes and bonded stake.

mod handler;
pub mod schemas;

pub use handler::StakingHandler;
