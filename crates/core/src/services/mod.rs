mod indexer;

pub use indexer::*;
