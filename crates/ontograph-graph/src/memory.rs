//! In-process `GraphStore` with the same write semantics as the Neo4j client.
//!
//! Used for engine tests and for embedding the ontology layer without a server.
//! Declared uniqueness constraints are enforced on create, rename, and property
//! updates that touch `name`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use ontograph_core::{
    keys, Identifier, Label, LabelSet, NodeRef, PropertyMap, RelType, WriteStats,
};

use crate::client::GraphError;
use crate::mutations::constraint_name;
use crate::queries::{EdgeRecord, Neighbor, Neighborhood, NodeRecord};
use crate::store::{soften_constraint, GraphStore, Result};

type NodeId = u64;

#[derive(Debug, Clone)]
struct MemNode {
    labels: Vec<String>,
    properties: PropertyMap,
}

impl MemNode {
    fn name(&self) -> &str {
        self.properties
            .get(keys::NAME)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    fn record(&self) -> NodeRecord {
        NodeRecord {
            labels: self.labels.clone(),
            properties: self.properties.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct MemEdge {
    rel_type: String,
    from: NodeId,
    to: NodeId,
    properties: PropertyMap,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<NodeId, MemNode>,
    edges: BTreeMap<u64, MemEdge>,
    next_id: u64,
    /// (label, field) pairs declared unique.
    constraints: BTreeSet<(String, String)>,
}

impl State {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn find(&self, label: &str, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, n)| n.has_label(label) && n.name() == name)
            .map(|(id, _)| *id)
    }

    /// Reject `name` for a node carrying `labels` if a unique constraint on one
    /// of those labels is already satisfied by a different node.
    fn check_unique(
        &self,
        labels: &[String],
        name: &str,
        except: Option<NodeId>,
    ) -> std::result::Result<(), GraphError> {
        for label in labels {
            if !self
                .constraints
                .contains(&(label.clone(), keys::NAME.to_string()))
            {
                continue;
            }
            let clash = self.nodes.iter().any(|(id, n)| {
                Some(*id) != except && n.has_label(label) && n.name() == name
            });
            if clash {
                return Err(GraphError::ConstraintViolation {
                    message: format!(
                        "ConstraintValidationFailed: node with label `{label}` and property `name` = '{name}' already exists"
                    ),
                    cypher: String::new(),
                });
            }
        }
        Ok(())
    }

    fn edge_record(&self, edge: &MemEdge) -> EdgeRecord {
        let name_of = |id: NodeId| {
            self.nodes
                .get(&id)
                .map(|n| n.name().to_string())
                .unwrap_or_default()
        };
        EdgeRecord {
            rel_type: edge.rel_type.clone(),
            source: name_of(edge.from),
            target: name_of(edge.to),
            properties: edge.properties.clone(),
        }
    }
}

/// A `GraphStore` held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: RwLock<State>,
    writes: AtomicU64,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write operations issued so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state.read().edges.len()
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn sorted(mut nodes: Vec<NodeRecord>) -> Vec<NodeRecord> {
        nodes.sort_by(|a, b| a.name().cmp(b.name()));
        nodes
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn find_nodes(&self, name: &str, label: Option<&Label>) -> Result<Vec<NodeRecord>> {
        let state = self.state.read();
        Ok(state
            .nodes
            .values()
            .filter(|n| n.name() == name && label.map_or(true, |l| n.has_label(l.as_str())))
            .map(MemNode::record)
            .collect())
    }

    async fn find_nodes_by_names(
        &self,
        label: &Label,
        names: &[String],
    ) -> Result<Vec<NodeRecord>> {
        let state = self.state.read();
        let wanted: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        let found = state
            .nodes
            .values()
            .filter(|n| n.has_label(label.as_str()) && wanted.contains(n.name()))
            .map(MemNode::record)
            .collect();
        Ok(Self::sorted(found))
    }

    async fn list_nodes(&self, label: &Label) -> Result<Vec<NodeRecord>> {
        let state = self.state.read();
        let found = state
            .nodes
            .values()
            .filter(|n| n.has_label(label.as_str()))
            .map(MemNode::record)
            .collect();
        Ok(Self::sorted(found))
    }

    async fn search_nodes(
        &self,
        term: &str,
        label: Option<&Label>,
        limit: usize,
    ) -> Result<Vec<NodeRecord>> {
        let state = self.state.read();
        let found = state
            .nodes
            .values()
            .filter(|n| n.name().contains(term))
            .filter(|n| label.map_or(true, |l| n.has_label(l.as_str())))
            .map(MemNode::record)
            .collect();
        let mut found = Self::sorted(found);
        found.truncate(limit);
        Ok(found)
    }

    async fn relationships(&self, rel_type: &RelType) -> Result<Vec<EdgeRecord>> {
        let state = self.state.read();
        let mut edges: Vec<EdgeRecord> = state
            .edges
            .values()
            .filter(|e| e.rel_type == rel_type.as_str())
            .map(|e| state.edge_record(e))
            .collect();
        edges.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));
        Ok(edges)
    }

    async fn node_relationships(&self, node: &NodeRef) -> Result<Option<Neighborhood>> {
        let state = self.state.read();
        let Some(id) = state.find(node.label.as_str(), &node.name) else {
            return Ok(None);
        };

        let mut neighborhood = Neighborhood {
            node: state.nodes[&id].record(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        };
        for edge in state.edges.values() {
            if edge.from == id {
                if let Some(other) = state.nodes.get(&edge.to) {
                    neighborhood.outgoing.push(Neighbor {
                        edge: state.edge_record(edge),
                        node: other.record(),
                    });
                }
            }
            if edge.to == id {
                if let Some(other) = state.nodes.get(&edge.from) {
                    neighborhood.incoming.push(Neighbor {
                        edge: state.edge_record(edge),
                        node: other.record(),
                    });
                }
            }
        }

        let order = |a: &Neighbor, b: &Neighbor| {
            (&a.edge.rel_type, a.node.name()).cmp(&(&b.edge.rel_type, b.node.name()))
        };
        neighborhood.outgoing.sort_by(order);
        neighborhood.incoming.sort_by(order);
        Ok(Some(neighborhood))
    }

    async fn count_nodes(&self, label: Option<&Label>) -> Result<u64> {
        let state = self.state.read();
        Ok(state
            .nodes
            .values()
            .filter(|n| label.map_or(true, |l| n.has_label(l.as_str())))
            .count() as u64)
    }

    async fn count_relationships(&self) -> Result<u64> {
        Ok(self.state.read().edges.len() as u64)
    }

    async fn label_counts(&self) -> Result<BTreeMap<String, u64>> {
        let state = self.state.read();
        let mut counts = BTreeMap::new();
        for label in state.nodes.values().flat_map(|n| n.labels.iter()) {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn relationship_type_counts(&self) -> Result<BTreeMap<String, u64>> {
        let state = self.state.read();
        let mut counts = BTreeMap::new();
        for edge in state.edges.values() {
            *counts.entry(edge.rel_type.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn orphan_nodes(&self) -> Result<Vec<NodeRecord>> {
        let state = self.state.read();
        let connected: BTreeSet<NodeId> = state
            .edges
            .values()
            .flat_map(|e| [e.from, e.to])
            .collect();
        let found = state
            .nodes
            .iter()
            .filter(|(id, _)| !connected.contains(id))
            .map(|(_, n)| n.record())
            .collect();
        Ok(Self::sorted(found))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn merge_node(
        &self,
        labels: &LabelSet,
        name: &str,
        props: &PropertyMap,
    ) -> Result<WriteStats> {
        self.record_write();
        let mut state = self.state.write();
        if state.find(labels.primary().as_str(), name).is_some() {
            return Ok(WriteStats::skipped(format!(
                "{} '{name}' already exists",
                labels.primary()
            )));
        }

        let label_names: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        if let Err(e) = state.check_unique(&label_names, name, None) {
            return soften_constraint(Err(e));
        }

        let mut properties = props.clone();
        let name_counted = u64::from(!properties.contains_key(keys::NAME));
        properties.insert(keys::NAME.to_string(), name.into());

        let id = state.allocate();
        state.nodes.insert(
            id,
            MemNode {
                labels: label_names,
                properties,
            },
        );

        Ok(WriteStats {
            nodes_created: 1,
            labels_added: labels.len() as u64,
            properties_set: props.len() as u64 + name_counted,
            ..WriteStats::default()
        })
    }

    async fn set_node_properties(
        &self,
        node: &NodeRef,
        props: &PropertyMap,
    ) -> Result<WriteStats> {
        self.record_write();
        let mut state = self.state.write();
        let id = state
            .find(node.label.as_str(), &node.name)
            .ok_or_else(|| not_found(node))?;

        if let Some(new_name) = props.get(keys::NAME).and_then(|v| v.as_str()) {
            let labels = state.nodes[&id].labels.clone();
            state.check_unique(&labels, new_name, Some(id))?;
        }

        if let Some(target) = state.nodes.get_mut(&id) {
            for (k, v) in props {
                target.properties.insert(k.clone(), v.clone());
            }
        }
        Ok(WriteStats {
            properties_set: props.len() as u64,
            ..WriteStats::default()
        })
    }

    async fn rename_node(&self, node: &NodeRef, new_name: &str) -> Result<WriteStats> {
        self.record_write();
        let mut state = self.state.write();
        let id = state
            .find(node.label.as_str(), &node.name)
            .ok_or_else(|| not_found(node))?;

        let labels = state.nodes[&id].labels.clone();
        state.check_unique(&labels, new_name, Some(id))?;

        if let Some(target) = state.nodes.get_mut(&id) {
            target
                .properties
                .insert(keys::NAME.to_string(), new_name.into());
        }
        Ok(WriteStats {
            properties_set: 1,
            ..WriteStats::default()
        })
    }

    async fn merge_relationship(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        rel_type: &RelType,
        props: &PropertyMap,
    ) -> Result<Option<WriteStats>> {
        self.record_write();
        let mut state = self.state.write();
        let (Some(a), Some(b)) = (
            state.find(from.label.as_str(), &from.name),
            state.find(to.label.as_str(), &to.name),
        ) else {
            return Ok(None);
        };

        let exists = state
            .edges
            .values()
            .any(|e| e.from == a && e.to == b && e.rel_type == rel_type.as_str());
        if exists {
            return Ok(Some(WriteStats::skipped(format!(
                "Relationship {from} -[:{rel_type}]-> {to} already exists"
            ))));
        }

        let id = state.allocate();
        state.edges.insert(
            id,
            MemEdge {
                rel_type: rel_type.to_string(),
                from: a,
                to: b,
                properties: props.clone(),
            },
        );
        Ok(Some(WriteStats {
            relationships_created: 1,
            properties_set: props.len() as u64,
            ..WriteStats::default()
        }))
    }

    async fn delete_relationships(
        &self,
        from: &NodeRef,
        rel_type: &RelType,
        target_label: Option<&Label>,
    ) -> Result<WriteStats> {
        self.record_write();
        let mut state = self.state.write();
        let Some(a) = state.find(from.label.as_str(), &from.name) else {
            return Ok(WriteStats::default());
        };

        let doomed: Vec<u64> = state
            .edges
            .iter()
            .filter(|(_, e)| e.from == a && e.rel_type == rel_type.as_str())
            .filter(|(_, e)| {
                target_label.map_or(true, |l| {
                    state
                        .nodes
                        .get(&e.to)
                        .is_some_and(|n| n.has_label(l.as_str()))
                })
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &doomed {
            state.edges.remove(id);
        }
        Ok(WriteStats {
            relationships_deleted: doomed.len() as u64,
            ..WriteStats::default()
        })
    }

    async fn detach_delete(&self, label: &Label, names: &[String]) -> Result<WriteStats> {
        self.record_write();
        let mut state = self.state.write();
        let wanted: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        let nodes: BTreeSet<NodeId> = state
            .nodes
            .iter()
            .filter(|(_, n)| n.has_label(label.as_str()) && wanted.contains(n.name()))
            .map(|(id, _)| *id)
            .collect();

        let before = state.edges.len();
        state
            .edges
            .retain(|_, e| !nodes.contains(&e.from) && !nodes.contains(&e.to));
        let relationships_deleted = (before - state.edges.len()) as u64;

        for id in &nodes {
            state.nodes.remove(id);
        }
        Ok(WriteStats {
            nodes_deleted: nodes.len() as u64,
            relationships_deleted,
            ..WriteStats::default()
        })
    }

    async fn declare_unique_constraint(
        &self,
        label: &Label,
        field: &Identifier,
    ) -> Result<WriteStats> {
        self.record_write();
        let mut state = self.state.write();
        let key = (label.to_string(), field.to_string());
        let name = constraint_name(label, field);
        if state.constraints.contains(&key) {
            return Ok(WriteStats::skipped(format!("Constraint {name} already exists")));
        }

        let mut seen = BTreeSet::new();
        let duplicated = state
            .nodes
            .values()
            .filter(|n| n.has_label(label.as_str()))
            .filter_map(|n| n.properties.get(field.as_str()))
            .any(|v| !seen.insert(v.to_string()));
        if duplicated {
            return Err(GraphError::ConstraintViolation {
                message: format!("Constraint {name} cannot be created: duplicate values"),
                cypher: String::new(),
            });
        }

        state.constraints.insert(key);
        Ok(WriteStats {
            constraints_added: 1,
            ..WriteStats::default()
        })
    }

    async fn drop_unique_constraint(
        &self,
        label: &Label,
        field: &Identifier,
    ) -> Result<WriteStats> {
        self.record_write();
        let mut state = self.state.write();
        let key = (label.to_string(), field.to_string());
        if !state.constraints.remove(&key) {
            return Ok(WriteStats::skipped(format!(
                "Constraint {} does not exist",
                constraint_name(label, field)
            )));
        }
        Ok(WriteStats {
            constraints_removed: 1,
            ..WriteStats::default()
        })
    }
}

fn not_found(node: &NodeRef) -> GraphError {
    GraphError::NotFound {
        label: node.label.to_string(),
        name: node.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(pairs: &[(&str, serde_json::Value)]) -> PropertyMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_merge_node_is_create_if_absent() {
        let graph = MemoryGraph::new();
        let labels = LabelSet::new(Label::instance()).with(Label::new("Table").unwrap());

        let first = graph
            .merge_node(&labels, "t1", &props(&[("rows", json!(3))]))
            .await
            .unwrap();
        assert_eq!(first.nodes_created, 1);
        assert_eq!(first.labels_added, 2);
        assert_eq!(first.properties_set, 2);

        let second = graph
            .merge_node(&labels, "t1", &props(&[("rows", json!(9))]))
            .await
            .unwrap();
        assert!(second.skipped);
        assert_eq!(second.nodes_created, 0);

        let found = graph.find_nodes("t1", None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].properties["rows"], json!(3));
    }

    #[tokio::test]
    async fn test_constraint_on_secondary_label_softens_to_skip() {
        let graph = MemoryGraph::new();
        graph
            .declare_unique_constraint(&Label::class(), &Identifier::name())
            .await
            .unwrap();
        graph
            .merge_node(&LabelSet::new(Label::class()), "Thing", &PropertyMap::new())
            .await
            .unwrap();

        let labels = LabelSet::new(Label::concept()).with(Label::class());
        let stats = graph
            .merge_node(&labels, "Thing", &PropertyMap::new())
            .await
            .unwrap();
        assert!(stats.skipped);
        assert_eq!(graph.node_count(), 1);
    }

    #[tokio::test]
    async fn test_merge_relationship_requires_endpoints_and_dedups() {
        let graph = MemoryGraph::new();
        let a = NodeRef::instance("a");
        let b = NodeRef::instance("b");
        let rel = RelType::new("LINKS_TO").unwrap();

        let missing = graph
            .merge_relationship(&a, &b, &rel, &PropertyMap::new())
            .await
            .unwrap();
        assert!(missing.is_none());

        for name in ["a", "b"] {
            graph
                .merge_node(&LabelSet::new(Label::instance()), name, &PropertyMap::new())
                .await
                .unwrap();
        }

        let created = graph
            .merge_relationship(&a, &b, &rel, &PropertyMap::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.relationships_created, 1);

        let again = graph
            .merge_relationship(&a, &b, &rel, &PropertyMap::new())
            .await
            .unwrap()
            .unwrap();
        assert!(again.skipped);
        assert_eq!(again.relationships_created, 0);
        assert_eq!(graph.edge_count(), 1);
    }

    #[tokio::test]
    async fn test_rename_respects_constraint() {
        let graph = MemoryGraph::new();
        graph
            .declare_unique_constraint(&Label::instance(), &Identifier::name())
            .await
            .unwrap();
        for name in ["a", "b"] {
            graph
                .merge_node(&LabelSet::new(Label::instance()), name, &PropertyMap::new())
                .await
                .unwrap();
        }

        let err = graph
            .rename_node(&NodeRef::instance("a"), "b")
            .await
            .unwrap_err();
        assert!(err.is_already_exists());

        graph
            .rename_node(&NodeRef::instance("a"), "c")
            .await
            .unwrap();
        assert!(graph.find_nodes("a", None).await.unwrap().is_empty());
        assert_eq!(graph.find_nodes("c", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_detach_delete_counts_incident_edges_once() {
        let graph = MemoryGraph::new();
        for name in ["a", "b", "c"] {
            graph
                .merge_node(&LabelSet::new(Label::instance()), name, &PropertyMap::new())
                .await
                .unwrap();
        }
        let rel = RelType::new("LINKS_TO").unwrap();
        for (from, to) in [("a", "b"), ("b", "c"), ("c", "a")] {
            graph
                .merge_relationship(
                    &NodeRef::instance(from),
                    &NodeRef::instance(to),
                    &rel,
                    &PropertyMap::new(),
                )
                .await
                .unwrap();
        }

        let stats = graph
            .detach_delete(&Label::instance(), &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(stats.nodes_deleted, 2);
        assert_eq!(stats.relationships_deleted, 3);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[tokio::test]
    async fn test_write_count_tracks_writes_only() {
        let graph = MemoryGraph::new();
        graph.find_nodes("x", None).await.unwrap();
        graph.count_nodes(None).await.unwrap();
        assert_eq!(graph.write_count(), 0);

        graph
            .merge_node(&LabelSet::new(Label::concept()), "X", &PropertyMap::new())
            .await
            .unwrap();
        assert_eq!(graph.write_count(), 1);
    }
}
