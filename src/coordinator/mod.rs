//! Routes logical dashboard requests to the store that serves them and
//! normalizes the answer into one result shape.

mod dispatch;
pub mod lifecycle;
pub mod request;
pub mod response;

pub use dispatch::Coordinator;
pub use lifecycle::{RequestLifecycle, RequestState};
pub use request::{LogicalRequest, Parameters, QueryName, Source};
pub use response::{
    FederatedResponse, FederationFailure, InventoryRow, LiveCounts, Payload, ResultSet, Tabular,
};
