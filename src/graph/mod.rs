//! Graph store adapter: institutes, faculty, keywords and publications as
//! nodes, with typed edges and soft-deletable keyword nodes.

pub mod schema;
mod store;
pub mod types;

pub use store::GraphStore;
pub use types::{EdgeType, GraphEdge, GraphEntity, NodeKind};

pub const STORE_NAME: &str = "graph";
