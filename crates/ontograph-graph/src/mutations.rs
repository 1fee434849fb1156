//! Write operations for the ontology graph.
//!
//! Nodes are identified by (primary label, name). Neo4rs does not surface the
//! server's write counters, so each statement returns the counts it needs and
//! `WriteStats` is assembled from them.

use ontograph_core::{Identifier, Label, LabelSet, NodeRef, PropertyMap, RelType, WriteStats};

use crate::client::{GraphClient, GraphError};
use crate::statement::Statement;

/// Marker set on create and removed in the same statement to tell MERGE's
/// create branch from its match branch.
const NEW_MARKER: &str = "__ontograph_new";

/// Name of the uniqueness constraint on `label.field`.
pub fn constraint_name(label: &Label, field: &Identifier) -> String {
    format!("unique_{}_{}", label.as_str().to_lowercase(), field)
}

impl GraphClient {
    // ── Nodes ────────────────────────────────────────────────────

    /// Create `(n:Primary:Secondary {name})` with `props` unless a node with the
    /// primary label and name already exists. Existing nodes are left untouched.
    pub async fn merge_node(
        &self,
        labels: &LabelSet,
        name: &str,
        props: &PropertyMap,
    ) -> Result<WriteStats, GraphError> {
        let extra_labels: String = labels
            .secondary()
            .iter()
            .map(|l| format!(":{l}"))
            .collect();
        let set_extra = if extra_labels.is_empty() {
            String::new()
        } else {
            format!("FOREACH (_ IN CASE WHEN created THEN [1] ELSE [] END | SET n{extra_labels})")
        };

        let stmt = Statement::new(format!(
            "MERGE (n:{primary} {{name: $name}})
             ON CREATE SET n += $props, n.{NEW_MARKER} = true
             WITH n, coalesce(n.{NEW_MARKER}, false) AS created
             REMOVE n.{NEW_MARKER}
             {set_extra}
             RETURN created",
            primary = labels.primary()
        ))
        .param("name", name)
        .param("props", props);

        let created = match self.query_one(&stmt).await? {
            Some(row) => row.get::<bool>("created").unwrap_or(false),
            None => false,
        };

        if !created {
            return Ok(WriteStats::skipped(format!(
                "{} '{name}' already exists",
                labels.primary()
            )));
        }

        let name_counted = u64::from(!props.contains_key("name"));
        Ok(WriteStats {
            nodes_created: 1,
            labels_added: labels.len() as u64,
            properties_set: props.len() as u64 + name_counted,
            ..WriteStats::default()
        })
    }

    /// Merge `props` onto an existing node.
    pub async fn set_node_properties(
        &self,
        node: &NodeRef,
        props: &PropertyMap,
    ) -> Result<WriteStats, GraphError> {
        let stmt = Statement::new(format!(
            "MATCH (n:{label} {{name: $name}})
             SET n += $props
             RETURN count(n) AS matched",
            label = node.label
        ))
        .param("name", node.name.as_str())
        .param("props", props);

        self.expect_match(&stmt, node).await?;
        Ok(WriteStats {
            properties_set: props.len() as u64,
            ..WriteStats::default()
        })
    }

    /// Change a node's `name`; relationships stay attached to the same node.
    pub async fn rename_node(
        &self,
        node: &NodeRef,
        new_name: &str,
    ) -> Result<WriteStats, GraphError> {
        let stmt = Statement::new(format!(
            "MATCH (n:{label} {{name: $name}})
             SET n.name = $new_name
             RETURN count(n) AS matched",
            label = node.label
        ))
        .param("name", node.name.as_str())
        .param("new_name", new_name);

        self.expect_match(&stmt, node).await?;
        Ok(WriteStats {
            properties_set: 1,
            ..WriteStats::default()
        })
    }

    /// Delete the named nodes of `label` and every relationship touching them,
    /// in one statement.
    pub async fn detach_delete(
        &self,
        label: &Label,
        names: &[String],
    ) -> Result<WriteStats, GraphError> {
        let stmt = Statement::new(format!(
            "MATCH (n:{label})
             WHERE n.name IN $names
             OPTIONAL MATCH (n)-[r]-()
             WITH collect(DISTINCT n) AS nodes, collect(DISTINCT r) AS rels
             FOREACH (x IN rels | DELETE x)
             FOREACH (x IN nodes | DELETE x)
             RETURN size(nodes) AS nodes_deleted, size(rels) AS rels_deleted"
        ))
        .param("names", names);

        let (nodes, rels) = match self.query_one(&stmt).await? {
            Some(row) => (
                row.get::<i64>("nodes_deleted").unwrap_or(0),
                row.get::<i64>("rels_deleted").unwrap_or(0),
            ),
            None => (0, 0),
        };

        Ok(WriteStats {
            nodes_deleted: nodes.max(0) as u64,
            relationships_deleted: rels.max(0) as u64,
            ..WriteStats::default()
        })
    }

    // ── Relationships ────────────────────────────────────────────

    /// Create `(from)-[:rel_type]->(to)` unless one already exists.
    ///
    /// Returns `None` when either endpoint is missing. An existing relationship
    /// is reported as a skipped write, not an error.
    pub async fn merge_relationship(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        rel_type: &RelType,
        props: &PropertyMap,
    ) -> Result<Option<WriteStats>, GraphError> {
        let stmt = Statement::new(format!(
            "MATCH (a:{from_label} {{name: $from_name}})
             MATCH (b:{to_label} {{name: $to_name}})
             MERGE (a)-[r:{rel_type}]->(b)
             ON CREATE SET r += $props, r.{NEW_MARKER} = true
             WITH r, coalesce(r.{NEW_MARKER}, false) AS created
             REMOVE r.{NEW_MARKER}
             RETURN created",
            from_label = from.label,
            to_label = to.label,
        ))
        .param("from_name", from.name.as_str())
        .param("to_name", to.name.as_str())
        .param("props", props);

        let rows = self.query_rows(&stmt).await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let created = rows
            .iter()
            .filter(|row| row.get::<bool>("created").unwrap_or(false))
            .count() as u64;

        if created == 0 {
            return Ok(Some(WriteStats::skipped(format!(
                "Relationship {from} -[:{rel_type}]-> {to} already exists"
            ))));
        }

        Ok(Some(WriteStats {
            relationships_created: created,
            properties_set: created * props.len() as u64,
            ..WriteStats::default()
        }))
    }

    /// Delete outgoing `rel_type` relationships of `from`, optionally only
    /// those ending at nodes with `target_label`.
    pub async fn delete_relationships(
        &self,
        from: &NodeRef,
        rel_type: &RelType,
        target_label: Option<&Label>,
    ) -> Result<WriteStats, GraphError> {
        let target = target_label.map(|l| format!(":{l}")).unwrap_or_default();
        let stmt = Statement::new(format!(
            "MATCH (a:{label} {{name: $name}})-[r:{rel_type}]->(b{target})
             DELETE r
             RETURN count(r) AS cnt",
            label = from.label
        ))
        .param("name", from.name.as_str());

        let deleted = match self.query_one(&stmt).await? {
            Some(row) => row.get::<i64>("cnt").unwrap_or(0).max(0) as u64,
            None => 0,
        };

        Ok(WriteStats {
            relationships_deleted: deleted,
            ..WriteStats::default()
        })
    }

    // ── Constraints ──────────────────────────────────────────────

    /// Declare `label.field` unique. An existing constraint is a skipped write.
    pub async fn declare_unique_constraint(
        &self,
        label: &Label,
        field: &Identifier,
    ) -> Result<WriteStats, GraphError> {
        let name = constraint_name(label, field);
        if self.constraint_exists(&name).await? {
            return Ok(WriteStats::skipped(format!("Constraint {name} already exists")));
        }

        let stmt = Statement::new(format!(
            "CREATE CONSTRAINT {name} IF NOT EXISTS
             FOR (n:{label}) REQUIRE n.{field} IS UNIQUE"
        ));
        self.run(&stmt).await?;

        tracing::info!(constraint = %name, "Created uniqueness constraint");
        Ok(WriteStats {
            constraints_added: 1,
            ..WriteStats::default()
        })
    }

    /// Drop the uniqueness constraint on `label.field`, if present.
    pub async fn drop_unique_constraint(
        &self,
        label: &Label,
        field: &Identifier,
    ) -> Result<WriteStats, GraphError> {
        let name = constraint_name(label, field);
        if !self.constraint_exists(&name).await? {
            return Ok(WriteStats::skipped(format!("Constraint {name} does not exist")));
        }

        self.run(&Statement::new(format!("DROP CONSTRAINT {name} IF EXISTS")))
            .await?;

        tracing::info!(constraint = %name, "Dropped uniqueness constraint");
        Ok(WriteStats {
            constraints_removed: 1,
            ..WriteStats::default()
        })
    }

    // ── Helpers ──────────────────────────────────────────────────

    async fn constraint_exists(&self, name: &str) -> Result<bool, GraphError> {
        let stmt = Statement::new(
            "SHOW CONSTRAINTS YIELD name
             WHERE name = $name
             RETURN count(*) AS cnt",
        )
        .param("name", name);

        Ok(match self.query_one(&stmt).await? {
            Some(row) => row.get::<i64>("cnt").unwrap_or(0) > 0,
            None => false,
        })
    }

    async fn expect_match(&self, stmt: &Statement, node: &NodeRef) -> Result<(), GraphError> {
        let matched = match self.query_one(stmt).await? {
            Some(row) => row.get::<i64>("matched").unwrap_or(0),
            None => 0,
        };
        if matched == 0 {
            return Err(GraphError::NotFound {
                label: node.label.to_string(),
                name: node.name.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_name() {
        let name = constraint_name(&Label::concept(), &Identifier::name());
        assert_eq!(name, "unique_concept_name");
    }
}
