//! ontograph-engine: Ontology management over a labeled-property graph.
//!
//! Maintains a schema of Concepts and Properties, instantiates typed
//! Instances, and enforces uniqueness, referential, and required-property
//! invariants that the underlying graph store does not provide. Inheritance is
//! resolved across the `SUBCLASS_OF` hierarchy with nearest-declaration
//! override semantics.
//!
//! All state lives in the store; every call reads what it needs.

pub mod admin;
pub mod classify;
pub mod config;
pub mod deletion;
pub mod error;
pub mod hierarchy;
pub mod inheritance;
pub mod lifecycle;
pub mod registry;
pub mod relationships;
pub mod schema;
pub mod validation;

pub use admin::OntologyAdmin;
pub use classify::PropertyClassifier;
pub use config::OntologyConfig;
pub use error::{Conflict, ErrorKind, OntologyError, Result};
pub use inheritance::InheritanceResolver;
pub use lifecycle::{InstanceLifecycleManager, InstanceOptions, InstanceOutcome};
pub use registry::NameRegistry;
pub use relationships::RelationshipManager;
pub use schema::{NodeOutcome, PropertySpec};
pub use validation::{ValidationEngine, ValidationReport};

use std::sync::Arc;

use ontograph_graph::GraphStore;

/// Entry point wiring every component to one explicitly passed store handle.
#[derive(Clone)]
pub struct OntologyService {
    store: Arc<dyn GraphStore>,
    lifecycle: InstanceLifecycleManager,
    admin: OntologyAdmin,
}

impl OntologyService {
    pub fn new(store: Arc<dyn GraphStore>, config: OntologyConfig) -> Self {
        let lifecycle = InstanceLifecycleManager::new(store.clone(), config.clone());
        let admin = OntologyAdmin::new(
            store.clone(),
            config,
            lifecycle.registry().clone(),
            lifecycle.resolver().clone(),
        );
        Self {
            store,
            lifecycle,
            admin,
        }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn lifecycle(&self) -> &InstanceLifecycleManager {
        &self.lifecycle
    }

    pub fn admin(&self) -> &OntologyAdmin {
        &self.admin
    }

    pub fn registry(&self) -> &NameRegistry {
        self.lifecycle.registry()
    }

    pub fn classifier(&self) -> &PropertyClassifier {
        self.lifecycle.classifier()
    }

    pub fn resolver(&self) -> &InheritanceResolver {
        self.lifecycle.resolver()
    }

    pub fn validator(&self) -> &ValidationEngine {
        self.lifecycle.validator()
    }

    pub fn relationships(&self) -> &RelationshipManager {
        self.lifecycle.relationships()
    }

    /// Check that the store answers.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await?;
        Ok(())
    }
}
