//! SQL text building and parameter binding for generic table operations.

pub mod builder;
pub mod params;

pub use builder::{count, insert, quoted, QueryBuf};
pub use params::BindValue;
