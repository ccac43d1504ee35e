//! Document store adapter: denormalized `publications` and `faculty`
//! documents queried through an aggregation pipeline.

pub mod pipeline;
pub mod schema;
mod store;

pub use pipeline::{Accumulator, Expr, Filter, Pipeline, SortKey, Stage};
pub use store::DocumentStore;

pub const STORE_NAME: &str = "document";
pub const PUBLICATIONS: &str = "publications";
pub const FACULTY: &str = "faculty";
