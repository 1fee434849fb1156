//! Instance deletion, single, batched, and Object cascades.
//!
//! Only `Instance` nodes can be deleted; schema nodes are durable. Each delete
//! detaches relationships in the same write as the node removal.

use ontograph_core::{keys, Label, NodeRef, OperationStatus, WriteStats};
use serde::Serialize;

use crate::error::{OntologyError, Result};
use crate::lifecycle::InstanceLifecycleManager;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteOutcome {
    pub name: String,
    pub status: OperationStatus,
    pub stats: WriteStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteItem {
    pub name: String,
    pub status: OperationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchDeleteReport {
    pub total: usize,
    pub processed: usize,
    pub nodes_deleted: u64,
    pub relationships_deleted: u64,
    pub results: Vec<DeleteItem>,
    pub errors: Vec<DeleteFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectDeleteOutcome {
    pub name: String,
    pub status: OperationStatus,
    pub objects_count: usize,
    pub fields_count: usize,
    pub stats: WriteStats,
}

impl InstanceLifecycleManager {
    /// Delete the Instance called `name` with all of its relationships.
    ///
    /// A missing instance is `NotFound` when `fail_if_not_found`, otherwise a
    /// soft `not_found` status. Naming a non-Instance node is always an error.
    pub async fn delete_instance(&self, name: &str, fail_if_not_found: bool) -> Result<DeleteOutcome> {
        let instance = Label::instance();
        if !self.registry.exists(name, Some(&instance)).await? {
            if self.registry.exists(name, None).await? {
                return Err(OntologyError::InvalidArgument(format!(
                    "'{name}' is not an Instance; only Instance nodes can be deleted"
                )));
            }
            if fail_if_not_found {
                return Err(OntologyError::not_found(&instance, name));
            }
            tracing::warn!(instance = name, "Instance not found, nothing deleted");
            return Ok(DeleteOutcome {
                name: name.to_string(),
                status: OperationStatus::NotFound,
                stats: WriteStats::default(),
            });
        }

        let stats = self
            .store
            .detach_delete(&instance, &[name.to_string()])
            .await?;
        tracing::info!(
            instance = name,
            nodes_deleted = stats.nodes_deleted,
            relationships_deleted = stats.relationships_deleted,
            "Deleted instance"
        );
        let status = if stats.nodes_deleted > 0 {
            OperationStatus::Deleted
        } else {
            OperationStatus::NoOp
        };
        Ok(DeleteOutcome {
            name: name.to_string(),
            status,
            stats,
        })
    }

    /// Delete each name independently. Missing names are soft `not_found`.
    pub async fn delete_instances(
        &self,
        names: &[String],
        continue_on_error: bool,
    ) -> BatchDeleteReport {
        let mut report = BatchDeleteReport {
            total: names.len(),
            ..BatchDeleteReport::default()
        };

        for name in names {
            match self.delete_instance(name, false).await {
                Ok(outcome) => {
                    report.processed += 1;
                    report.nodes_deleted += outcome.stats.nodes_deleted;
                    report.relationships_deleted += outcome.stats.relationships_deleted;
                    report.results.push(DeleteItem {
                        name: outcome.name,
                        status: outcome.status,
                    });
                }
                Err(e) => {
                    tracing::warn!(instance = %name, error = %e, "Delete failed");
                    report.errors.push(DeleteFailure {
                        name: name.clone(),
                        error: e.to_string(),
                    });
                    if !continue_on_error {
                        break;
                    }
                }
            }
        }
        report
    }

    /// Delete an Object instance together with every ObjectField instance
    /// linked to it, in one write.
    pub async fn delete_object(
        &self,
        name: &str,
        fail_if_not_found: bool,
    ) -> Result<ObjectDeleteOutcome> {
        let object = NodeRef::instance(name);
        let neighborhood = self
            .store
            .node_relationships(&object)
            .await?
            .filter(|n| n.node.get_str(keys::INSTANCE_OF) == Some(self.config.object_concept.as_str()));

        let Some(neighborhood) = neighborhood else {
            if fail_if_not_found {
                return Err(OntologyError::not_found(&self.config.object_concept, name));
            }
            tracing::warn!(object = name, "Object not found, nothing deleted");
            return Ok(ObjectDeleteOutcome {
                name: name.to_string(),
                status: OperationStatus::NotFound,
                objects_count: 0,
                fields_count: 0,
                stats: WriteStats::default(),
            });
        };

        let mut doomed: Vec<String> = neighborhood
            .incoming
            .iter()
            .filter(|n| n.edge.rel_type == self.config.object_field_relationship.as_str())
            .filter(|n| n.node.has_label(Label::instance().as_str()))
            .filter(|n| {
                n.node.get_str(keys::INSTANCE_OF) == Some(self.config.object_field_concept.as_str())
            })
            .map(|n| n.node.name().to_string())
            .collect();
        doomed.sort();
        doomed.dedup();
        let fields_count = doomed.len();
        doomed.push(name.to_string());

        let stats = self.store.detach_delete(&Label::instance(), &doomed).await?;
        tracing::info!(
            object = name,
            fields = fields_count,
            nodes_deleted = stats.nodes_deleted,
            relationships_deleted = stats.relationships_deleted,
            "Deleted object and its fields"
        );
        Ok(ObjectDeleteOutcome {
            name: name.to_string(),
            status: OperationStatus::Deleted,
            objects_count: 1,
            fields_count,
            stats,
        })
    }
}
