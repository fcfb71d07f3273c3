//! Archived chain data for the tally indexer.
//!
//! - [`ArchiveSource`] implements `BlockSource` over a newline-delimited
//!   JSON export of blocks, events and extrinsics
//! - [`SnapshotLookup`] implements `StakingLookup` over a JSON snapshot of
//!   staking ledgers and era boundaries

pub mod lookup;
pub mod reader;

pub use lookup::SnapshotLookup;
pub use reader::ArchiveSource;
