//! Read operations and record types for the ontology graph.
//!
//! Statements return whole `neo4rs::Node` / `neo4rs::Relation` values; every
//! property key is decoded into a `serde_json::Value`.

use std::collections::BTreeMap;

use ontograph_core::{keys, Label, NodeRef, PropertyMap, RelType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{GraphClient, GraphError};
use crate::statement::Statement;

/// A node as seen by the ontology layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

impl NodeRecord {
    pub fn name(&self) -> &str {
        self.get_str(keys::NAME).unwrap_or_default()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }
}

/// A directed relationship between two named nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub rel_type: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

/// The node at the other end of a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub edge: EdgeRecord,
    pub node: NodeRecord,
}

/// A node with all of its incident relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighborhood {
    pub node: NodeRecord,
    pub outgoing: Vec<Neighbor>,
    pub incoming: Vec<Neighbor>,
}

fn label_clause(label: Option<&Label>) -> String {
    label.map(|l| format!(":{l}")).unwrap_or_default()
}

impl GraphClient {
    // ── Node Lookups ─────────────────────────────────────────────

    /// All nodes called `name`, optionally restricted to one label.
    pub async fn find_nodes(
        &self,
        name: &str,
        label: Option<&Label>,
    ) -> Result<Vec<NodeRecord>, GraphError> {
        let stmt = Statement::new(format!(
            "MATCH (n{} {{name: $name}})
             RETURN n",
            label_clause(label)
        ))
        .param("name", name);

        self.node_rows(&stmt).await
    }

    /// Nodes of `label` whose name is in `names`, ordered by name.
    pub async fn find_nodes_by_names(
        &self,
        label: &Label,
        names: &[String],
    ) -> Result<Vec<NodeRecord>, GraphError> {
        let stmt = Statement::new(format!(
            "MATCH (n:{label})
             WHERE n.name IN $names
             RETURN n
             ORDER BY n.name"
        ))
        .param("names", names);

        self.node_rows(&stmt).await
    }

    /// Every node carrying `label`, ordered by name.
    pub async fn list_nodes(&self, label: &Label) -> Result<Vec<NodeRecord>, GraphError> {
        let stmt = Statement::new(format!(
            "MATCH (n:{label})
             RETURN n
             ORDER BY n.name"
        ));

        self.node_rows(&stmt).await
    }

    /// Nodes whose name contains `term` (case-sensitive).
    pub async fn search_nodes(
        &self,
        term: &str,
        label: Option<&Label>,
        limit: usize,
    ) -> Result<Vec<NodeRecord>, GraphError> {
        let stmt = Statement::new(format!(
            "MATCH (n{})
             WHERE n.name CONTAINS $term
             RETURN n
             ORDER BY n.name
             LIMIT $limit",
            label_clause(label)
        ))
        .param("term", term)
        .param("limit", limit as i64);

        self.node_rows(&stmt).await
    }

    /// Nodes with no relationships at all.
    pub async fn orphan_nodes(&self) -> Result<Vec<NodeRecord>, GraphError> {
        let stmt = Statement::new(
            "MATCH (n)
             WHERE NOT (n)--()
             RETURN n
             ORDER BY n.name",
        );

        self.node_rows(&stmt).await
    }

    // ── Relationship Queries ─────────────────────────────────────

    /// Every relationship of `rel_type`, by endpoint name.
    pub async fn relationships(&self, rel_type: &RelType) -> Result<Vec<EdgeRecord>, GraphError> {
        let stmt = Statement::new(format!(
            "MATCH (a)-[r:{rel_type}]->(b)
             RETURN a.name AS source, b.name AS target, r
             ORDER BY source, target"
        ));

        let rows = self.query_rows(&stmt).await?;
        let mut edges = Vec::with_capacity(rows.len());
        for row in rows {
            edges.push(EdgeRecord {
                rel_type: rel_type.to_string(),
                source: row.get::<String>("source").unwrap_or_default(),
                target: row.get::<String>("target").unwrap_or_default(),
                properties: relation_column(&row)?,
            });
        }
        Ok(edges)
    }

    /// A node with its incoming and outgoing relationships, or `None` if absent.
    pub async fn node_relationships(
        &self,
        node: &NodeRef,
    ) -> Result<Option<Neighborhood>, GraphError> {
        let label = &node.label;
        let found = self.find_nodes(&node.name, Some(label)).await?;
        let Some(record) = found.into_iter().next() else {
            return Ok(None);
        };

        let outgoing = Statement::new(format!(
            "MATCH (m:{label} {{name: $name}})-[r]->(n)
             RETURN type(r) AS rel_type, r, n
             ORDER BY rel_type, n.name"
        ))
        .param("name", node.name.as_str());

        let incoming = Statement::new(format!(
            "MATCH (m:{label} {{name: $name}})<-[r]-(n)
             RETURN type(r) AS rel_type, r, n
             ORDER BY rel_type, n.name"
        ))
        .param("name", node.name.as_str());

        let mut neighborhood = Neighborhood {
            node: record,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        };

        for row in self.query_rows(&outgoing).await? {
            let other = node_columns(&row)?;
            neighborhood.outgoing.push(Neighbor {
                edge: EdgeRecord {
                    rel_type: row.get::<String>("rel_type").unwrap_or_default(),
                    source: node.name.clone(),
                    target: other.name().to_string(),
                    properties: relation_column(&row)?,
                },
                node: other,
            });
        }

        for row in self.query_rows(&incoming).await? {
            let other = node_columns(&row)?;
            neighborhood.incoming.push(Neighbor {
                edge: EdgeRecord {
                    rel_type: row.get::<String>("rel_type").unwrap_or_default(),
                    source: other.name().to_string(),
                    target: node.name.clone(),
                    properties: relation_column(&row)?,
                },
                node: other,
            });
        }

        Ok(Some(neighborhood))
    }

    // ── Counts ───────────────────────────────────────────────────

    /// Count nodes, optionally of one label.
    pub async fn count_nodes(&self, label: Option<&Label>) -> Result<u64, GraphError> {
        let stmt = Statement::new(format!(
            "MATCH (n{})
             RETURN count(n) AS cnt",
            label_clause(label)
        ));
        self.count(&stmt).await
    }

    pub async fn count_relationships(&self) -> Result<u64, GraphError> {
        let stmt = Statement::new("MATCH ()-[r]->() RETURN count(r) AS cnt");
        self.count(&stmt).await
    }

    /// Node count per label.
    pub async fn label_counts(&self) -> Result<BTreeMap<String, u64>, GraphError> {
        let stmt = Statement::new(
            "MATCH (n)
             UNWIND labels(n) AS key
             RETURN key, count(*) AS cnt",
        );
        self.keyed_counts(&stmt).await
    }

    /// Relationship count per relationship type.
    pub async fn relationship_type_counts(&self) -> Result<BTreeMap<String, u64>, GraphError> {
        let stmt = Statement::new(
            "MATCH ()-[r]->()
             RETURN type(r) AS key, count(r) AS cnt",
        );
        self.keyed_counts(&stmt).await
    }

    /// Round-trip to the server.
    pub async fn ping(&self) -> Result<(), GraphError> {
        self.run(&Statement::new("RETURN 1 AS ok")).await
    }

    // ── Helpers ──────────────────────────────────────────────────

    async fn node_rows(&self, stmt: &Statement) -> Result<Vec<NodeRecord>, GraphError> {
        let rows = self.query_rows(stmt).await?;
        rows.iter().map(node_columns).collect()
    }

    async fn count(&self, stmt: &Statement) -> Result<u64, GraphError> {
        match self.query_one(stmt).await? {
            Some(row) => Ok(row.get::<i64>("cnt").unwrap_or(0).max(0) as u64),
            None => Ok(0),
        }
    }

    async fn keyed_counts(&self, stmt: &Statement) -> Result<BTreeMap<String, u64>, GraphError> {
        let rows = self.query_rows(stmt).await?;
        let mut counts = BTreeMap::new();
        for row in rows {
            let key: String = row.get("key").unwrap_or_default();
            let cnt = row.get::<i64>("cnt").unwrap_or(0).max(0) as u64;
            if !key.is_empty() {
                counts.insert(key, cnt);
            }
        }
        Ok(counts)
    }
}

/// Decode the node returned as `n`.
fn node_columns(row: &neo4rs::Row) -> Result<NodeRecord, GraphError> {
    let node: neo4rs::Node = row
        .get("n")
        .map_err(|e| GraphError::Serialization(format!("Failed to read node: {e}")))?;
    neo4j_node_to_record(&node)
}

/// Convert a neo4rs::Node into a NodeRecord carrying every property.
fn neo4j_node_to_record(node: &neo4rs::Node) -> Result<NodeRecord, GraphError> {
    let mut properties = PropertyMap::new();
    for key in node.keys() {
        let value: Value = node
            .get(key)
            .map_err(|e| GraphError::Serialization(format!("Failed to read node property {key}: {e}")))?;
        properties.insert(key.to_string(), value);
    }
    Ok(NodeRecord {
        labels: node.labels().into_iter().map(str::to_string).collect(),
        properties,
    })
}

/// Properties of the relationship returned as `r`.
fn relation_column(row: &neo4rs::Row) -> Result<PropertyMap, GraphError> {
    let rel: neo4rs::Relation = row
        .get("r")
        .map_err(|e| GraphError::Serialization(format!("Failed to read relationship: {e}")))?;
    let mut properties = PropertyMap::new();
    for key in rel.keys() {
        let value: Value = rel.get(key).map_err(|e| {
            GraphError::Serialization(format!("Failed to read relationship property {key}: {e}"))
        })?;
        properties.insert(key.to_string(), value);
    }
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_record_accessors() {
        let mut properties = PropertyMap::new();
        properties.insert("name".into(), json!("t1"));
        properties.insert("rows".into(), json!(3));
        let node = NodeRecord {
            labels: vec!["Instance".into(), "Table".into()],
            properties,
        };

        assert_eq!(node.name(), "t1");
        assert!(node.has_label("Table"));
        assert!(!node.has_label("Concept"));
        assert_eq!(node.get_str("rows"), None);
    }

    #[test]
    fn test_label_clause() {
        assert_eq!(label_clause(None), "");
        assert_eq!(label_clause(Some(&Label::concept())), ":Concept");
    }
}
