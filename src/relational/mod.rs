//! Relational store adapter: normalized academic tables with a materialized
//! per-university active-faculty count and a faculty undo log.

pub mod schema;
mod store;

pub use store::{MAX_KEYWORD_SET, RelationalStore};

pub const STORE_NAME: &str = "relational";
