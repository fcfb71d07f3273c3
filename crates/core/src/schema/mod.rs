//! Versioned payload decoding.
//!
//! - [`SchemaRegistry`] resolves which historical layout applies to a record
//! - [`normalize`] maps the raw payload onto a [`NormalizedEvent`]

mod normalize;
pub mod parse;
mod registry;

pub use normalize::*;
pub use registry::*;
