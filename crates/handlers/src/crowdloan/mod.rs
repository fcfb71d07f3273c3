//! Crowdloan pallet: contributions to parachain auctions.

mod handler;

pub use handler::CrowdloanHandler;
