//! Federated access to academic data held in relational, document and graph
//! stores, each embedded in SQLite.
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod document;
pub mod dual_read;
pub mod errors;
pub mod fault_injection;
pub mod federation;
pub mod graph;
pub mod model;
pub mod pool;
pub mod relational;
pub mod safety;
pub mod synthetic;
pub mod transaction;

pub use crate::config::{FederationConfig, RelationalConfig, StoreConfig, StoreLocation};
pub use crate::coordinator::{
    Coordinator, FederatedResponse, FederationFailure, LogicalRequest, Payload, QueryName,
    ResultSet, Source,
};
pub use crate::dataset::Dataset;
pub use crate::document::DocumentStore;
pub use crate::errors::{ErrorKind, FederationError, FederationResult};
pub use crate::federation::Federation;
pub use crate::graph::GraphStore;
pub use crate::relational::RelationalStore;
