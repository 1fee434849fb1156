//! Idempotent relationship creation and ObjectProperty edge management.
//!
//! Existence check and create happen in one conditional write
//! (`GraphStore::merge_relationship`), so concurrent callers cannot
//! double-create the same typed edge.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ontograph_core::{
    keys, now_timestamp, Label, NodeRef, OperationStatus, PropertyMap, PropertyType, RelType,
    WriteStats,
};
use ontograph_graph::GraphStore;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Conflict, MissingTarget, OntologyError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipOutcome {
    pub status: OperationStatus,
    pub stats: WriteStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl RelationshipOutcome {
    pub fn created(&self) -> bool {
        self.status == OperationStatus::Created
    }
}

/// The value of an ObjectProperty: one target name or several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectTargets {
    One(String),
    Many(Vec<String>),
}

impl ObjectTargets {
    pub fn from_value(property: &str, value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Self::One(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(invalid_target(property, other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Many),
            other => Err(invalid_target(property, other)),
        }
    }

    pub fn names(&self) -> &[String] {
        match self {
            Self::One(name) => std::slice::from_ref(name),
            Self::Many(names) => names,
        }
    }
}

fn invalid_target(property: &str, value: &Value) -> OntologyError {
    OntologyError::InvalidArgument(format!(
        "ObjectProperty '{property}' expects an instance name or a list of names, got {value}"
    ))
}

/// Parse every ObjectProperty value in `object`.
pub fn parse_object_targets(object: &PropertyMap) -> Result<BTreeMap<String, ObjectTargets>> {
    object
        .iter()
        .map(|(property, value)| Ok((property.clone(), ObjectTargets::from_value(property, value)?)))
        .collect()
}

/// Result of linking one ObjectProperty target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetOutcome {
    pub property: String,
    pub target: String,
    pub relationship_type: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OperationStatus>,
    pub relationships_created: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct RelationshipManager {
    store: Arc<dyn GraphStore>,
    /// Existing edges are a `Conflict` instead of `already_exists`.
    strict: bool,
}

impl RelationshipManager {
    pub fn new(store: Arc<dyn GraphStore>, strict: bool) -> Self {
        Self { store, strict }
    }

    /// Create `from -[rel_type]-> to` unless it already exists.
    ///
    /// `created_at` is added to `props` when absent. A missing endpoint is
    /// `NotFound`.
    pub async fn create_relationship(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        rel_type: &RelType,
        props: &PropertyMap,
    ) -> Result<RelationshipOutcome> {
        let mut props = props.clone();
        props
            .entry(keys::CREATED_AT)
            .or_insert_with(|| now_timestamp().into());

        let Some(stats) = self
            .store
            .merge_relationship(from, to, rel_type, &props)
            .await?
        else {
            return Err(self.missing_endpoint(from, to).await?);
        };

        if stats.relationships_created == 0 {
            let warning = stats.warning.clone().unwrap_or_else(|| {
                format!("Relationship {from} -[:{rel_type}]-> {to} already exists")
            });
            if self.strict {
                return Err(Conflict::RelationshipExists(warning).into());
            }
            tracing::warn!(%from, %to, rel_type = %rel_type, "Relationship already exists, skipped");
            return Ok(RelationshipOutcome {
                status: OperationStatus::AlreadyExists,
                stats,
                warning: Some(warning),
            });
        }

        tracing::info!(%from, %to, rel_type = %rel_type, "Created relationship");
        Ok(RelationshipOutcome {
            status: OperationStatus::Created,
            stats,
            warning: None,
        })
    }

    async fn missing_endpoint(&self, from: &NodeRef, to: &NodeRef) -> Result<OntologyError> {
        for node in [from, to] {
            if self
                .store
                .find_nodes(&node.name, Some(&node.label))
                .await?
                .is_empty()
            {
                return Ok(OntologyError::not_found(&node.label, &node.name));
            }
        }
        // Both endpoints appeared between the write and the check.
        Ok(OntologyError::not_found(from.label.as_str(), &from.name))
    }

    /// Check that every ObjectProperty target exists as an Instance, reporting
    /// every missing one together.
    pub async fn verify_object_targets(
        &self,
        targets: &BTreeMap<String, ObjectTargets>,
    ) -> Result<()> {
        let wanted: BTreeSet<String> = targets
            .values()
            .flat_map(|t| t.names().iter().cloned())
            .collect();
        if wanted.is_empty() {
            return Ok(());
        }

        let lookup: Vec<String> = wanted.into_iter().collect();
        let found: BTreeSet<String> = self
            .store
            .find_nodes_by_names(&Label::instance(), &lookup)
            .await?
            .iter()
            .map(|n| n.name().to_string())
            .collect();

        let missing: Vec<MissingTarget> = targets
            .iter()
            .flat_map(|(property, t)| {
                t.names().iter().map(move |target| MissingTarget {
                    property: property.clone(),
                    target: target.clone(),
                })
            })
            .filter(|m| !found.contains(&m.target))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            tracing::warn!(missing = missing.len(), "ObjectProperty targets not found");
            Err(OntologyError::MissingTarget(missing))
        }
    }

    /// One edge per target. Failures are recorded per target and never abort
    /// the batch.
    pub async fn create_object_property_relationships(
        &self,
        instance: &str,
        targets: &BTreeMap<String, ObjectTargets>,
    ) -> Vec<TargetOutcome> {
        let source = NodeRef::instance(instance);
        let mut outcomes = Vec::new();

        for (property, t) in targets {
            let rel_type = match RelType::from_property_name(property) {
                Ok(rel_type) => rel_type,
                Err(e) => {
                    for target in t.names() {
                        outcomes.push(failed(property, target, "", e.to_string()));
                    }
                    continue;
                }
            };

            let mut props = PropertyMap::new();
            props.insert(keys::PROPERTY_NAME.into(), property.as_str().into());
            props.insert(
                keys::PROPERTY_TYPE.into(),
                PropertyType::ObjectProperty.as_str().into(),
            );

            for target in t.names() {
                let result = self
                    .create_relationship(&source, &NodeRef::instance(target), &rel_type, &props)
                    .await;
                outcomes.push(match result {
                    Ok(outcome) => TargetOutcome {
                        property: property.clone(),
                        target: target.clone(),
                        relationship_type: rel_type.to_string(),
                        success: true,
                        status: Some(outcome.status),
                        relationships_created: outcome.stats.relationships_created,
                        warning: outcome.warning,
                        error: None,
                    },
                    Err(e) => {
                        tracing::warn!(instance, property = %property, target = %target, error = %e, "ObjectProperty relationship failed");
                        failed(property, target, rel_type.as_str(), e.to_string())
                    }
                });
            }
        }
        outcomes
    }

    /// Point each given ObjectProperty at exactly the given targets. Properties
    /// not in `targets` are untouched.
    pub async fn replace_object_property_relationships(
        &self,
        instance: &str,
        targets: &BTreeMap<String, ObjectTargets>,
    ) -> Result<(WriteStats, Vec<TargetOutcome>)> {
        let source = NodeRef::instance(instance);
        let mut removed = WriteStats::default();
        for property in targets.keys() {
            let rel_type = RelType::from_property_name(property)?;
            let stats = self
                .store
                .delete_relationships(&source, &rel_type, Some(&Label::instance()))
                .await?;
            removed.merge(&stats);
        }
        tracing::debug!(
            instance,
            removed = removed.relationships_deleted,
            "Cleared ObjectProperty relationships"
        );

        let outcomes = self
            .create_object_property_relationships(instance, targets)
            .await;
        Ok((removed, outcomes))
    }
}

fn failed(property: &str, target: &str, rel_type: &str, error: String) -> TargetOutcome {
    TargetOutcome {
        property: property.to_string(),
        target: target.to_string(),
        relationship_type: rel_type.to_string(),
        success: false,
        status: None,
        relationships_created: 0,
        warning: None,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontograph_core::LabelSet;
    use ontograph_graph::MemoryGraph;
    use serde_json::json;

    use crate::error::ErrorKind;

    async fn graph_with(instances: &[&str]) -> Arc<MemoryGraph> {
        let graph = Arc::new(MemoryGraph::new());
        for name in instances {
            graph
                .merge_node(&LabelSet::new(Label::instance()), name, &PropertyMap::new())
                .await
                .unwrap();
        }
        graph
    }

    #[test]
    fn test_object_targets_from_value() {
        assert_eq!(
            ObjectTargets::from_value("p", &json!("db1")).unwrap(),
            ObjectTargets::One("db1".into())
        );
        assert_eq!(
            ObjectTargets::from_value("p", &json!(["a", "b"]))
                .unwrap()
                .names()
                .len(),
            2
        );
        assert!(ObjectTargets::from_value("p", &json!(3)).is_err());
        assert!(ObjectTargets::from_value("p", &json!(["a", 1])).is_err());
    }

    #[tokio::test]
    async fn test_strict_mode_turns_duplicate_into_conflict() {
        let graph = graph_with(&["a", "b"]).await;
        let manager = RelationshipManager::new(graph, true);
        let rel = RelType::new("LINKS").unwrap();
        let (a, b) = (NodeRef::instance("a"), NodeRef::instance("b"));

        manager
            .create_relationship(&a, &b, &rel, &PropertyMap::new())
            .await
            .unwrap();
        let err = manager
            .create_relationship(&a, &b, &rel, &PropertyMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_missing_endpoint_names_the_absent_node() {
        let graph = graph_with(&["a"]).await;
        let manager = RelationshipManager::new(graph, false);
        let err = manager
            .create_relationship(
                &NodeRef::instance("a"),
                &NodeRef::instance("ghost"),
                &RelType::new("LINKS").unwrap(),
                &PropertyMap::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OntologyError::NotFound { ref name, .. } if name == "ghost"));
    }

    #[tokio::test]
    async fn test_verify_lists_every_missing_target() {
        let graph = graph_with(&["db1"]).await;
        let manager = RelationshipManager::new(graph, false);
        let mut object = PropertyMap::new();
        object.insert("belongsTo".into(), json!(["db1", "db2", "db3"]));
        let targets = parse_object_targets(&object).unwrap();

        match manager.verify_object_targets(&targets).await {
            Err(OntologyError::MissingTarget(missing)) => {
                let names: Vec<_> = missing.iter().map(|m| m.target.as_str()).collect();
                assert_eq!(names, vec!["db2", "db3"]);
            }
            other => panic!("expected MissingTarget, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_replace_points_at_exact_targets() {
        let graph = graph_with(&["src", "x", "y", "z"]).await;
        let manager = RelationshipManager::new(graph.clone(), false);

        let mut first = PropertyMap::new();
        first.insert("uses".into(), json!(["x", "y"]));
        manager
            .create_object_property_relationships("src", &parse_object_targets(&first).unwrap())
            .await;

        let mut second = PropertyMap::new();
        second.insert("uses".into(), json!("z"));
        let (removed, outcomes) = manager
            .replace_object_property_relationships("src", &parse_object_targets(&second).unwrap())
            .await
            .unwrap();

        assert_eq!(removed.relationships_deleted, 2);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].success);

        let hood = graph
            .node_relationships(&NodeRef::instance("src"))
            .await
            .unwrap()
            .unwrap();
        let targets: Vec<_> = hood.outgoing.iter().map(|n| n.edge.target.as_str()).collect();
        assert_eq!(targets, vec!["z"]);
        assert_eq!(hood.outgoing[0].edge.rel_type, "USES");
        assert_eq!(
            hood.outgoing[0].edge.properties[keys::PROPERTY_TYPE],
            json!("ObjectProperty")
        );
    }
}
