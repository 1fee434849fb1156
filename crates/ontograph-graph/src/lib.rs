//! ontograph-graph: the graph store behind the ontology layer.
//!
//! All graph reads and writes flow through the `GraphStore` trait. `GraphClient`
//! implements it against Neo4j; `MemoryGraph` implements it in process.

pub mod client;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod statement;
pub mod store;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use memory::MemoryGraph;
pub use queries::{EdgeRecord, Neighbor, Neighborhood, NodeRecord};
pub use statement::{Param, Statement};
pub use store::GraphStore;
