mod block_source;
mod handler;
mod repository;
mod staking;

pub use block_source::*;
pub use handler::*;
pub use repository::*;
pub use staking::*;
