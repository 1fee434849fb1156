//! ontograph-core: Shared types, configuration, and error handling for the ontograph ontology layer.
//!
//! This crate provides the foundational types used across all ontograph components:
//! - Validated graph identifiers (labels, relationship types, property keys)
//! - Property typing and property maps for nodes and relationships
//! - Write statistics and operation status reporting
//! - Layered configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod ident;
pub mod types;

pub use error::CoreError;
pub use ident::{Identifier, Label, LabelSet, NodeRef, RelType};
pub use types::{keys, now_timestamp, OperationStatus, PropertyMap, PropertyType, WriteStats};
