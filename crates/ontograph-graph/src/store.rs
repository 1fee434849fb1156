//! The `GraphStore` seam consumed by the ontology engine.
//!
//! Labels and relationship types enter through validated identifier types;
//! names and property values are always bound as parameters.

use std::collections::BTreeMap;

use async_trait::async_trait;

use ontograph_core::{Identifier, Label, LabelSet, NodeRef, PropertyMap, RelType, WriteStats};

use crate::client::{GraphClient, GraphError};
use crate::queries::{EdgeRecord, Neighborhood, NodeRecord};

pub type Result<T> = std::result::Result<T, GraphError>;

/// Typed access to a labeled-property graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ── Reads ────────────────────────────────────────────────────

    async fn find_nodes(&self, name: &str, label: Option<&Label>) -> Result<Vec<NodeRecord>>;

    async fn find_nodes_by_names(&self, label: &Label, names: &[String])
        -> Result<Vec<NodeRecord>>;

    async fn list_nodes(&self, label: &Label) -> Result<Vec<NodeRecord>>;

    async fn search_nodes(
        &self,
        term: &str,
        label: Option<&Label>,
        limit: usize,
    ) -> Result<Vec<NodeRecord>>;

    async fn relationships(&self, rel_type: &RelType) -> Result<Vec<EdgeRecord>>;

    async fn node_relationships(&self, node: &NodeRef) -> Result<Option<Neighborhood>>;

    async fn count_nodes(&self, label: Option<&Label>) -> Result<u64>;

    async fn count_relationships(&self) -> Result<u64>;

    async fn label_counts(&self) -> Result<BTreeMap<String, u64>>;

    async fn relationship_type_counts(&self) -> Result<BTreeMap<String, u64>>;

    async fn orphan_nodes(&self) -> Result<Vec<NodeRecord>>;

    async fn ping(&self) -> Result<()>;

    // ── Writes ───────────────────────────────────────────────────

    async fn merge_node(
        &self,
        labels: &LabelSet,
        name: &str,
        props: &PropertyMap,
    ) -> Result<WriteStats>;

    async fn set_node_properties(&self, node: &NodeRef, props: &PropertyMap)
        -> Result<WriteStats>;

    async fn rename_node(&self, node: &NodeRef, new_name: &str) -> Result<WriteStats>;

    async fn merge_relationship(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        rel_type: &RelType,
        props: &PropertyMap,
    ) -> Result<Option<WriteStats>>;

    async fn delete_relationships(
        &self,
        from: &NodeRef,
        rel_type: &RelType,
        target_label: Option<&Label>,
    ) -> Result<WriteStats>;

    async fn detach_delete(&self, label: &Label, names: &[String]) -> Result<WriteStats>;

    async fn declare_unique_constraint(&self, label: &Label, field: &Identifier)
        -> Result<WriteStats>;

    async fn drop_unique_constraint(&self, label: &Label, field: &Identifier)
        -> Result<WriteStats>;
}

/// Turn an "already exists" constraint violation into a skipped write.
pub fn soften_constraint(result: Result<WriteStats>) -> Result<WriteStats> {
    match result {
        Err(e) if e.is_already_exists() => {
            tracing::warn!(error = %e, "Write skipped: target already exists");
            Ok(WriteStats::skipped(e.to_string()))
        }
        other => other,
    }
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn find_nodes(&self, name: &str, label: Option<&Label>) -> Result<Vec<NodeRecord>> {
        GraphClient::find_nodes(self, name, label).await
    }

    async fn find_nodes_by_names(
        &self,
        label: &Label,
        names: &[String],
    ) -> Result<Vec<NodeRecord>> {
        GraphClient::find_nodes_by_names(self, label, names).await
    }

    async fn list_nodes(&self, label: &Label) -> Result<Vec<NodeRecord>> {
        GraphClient::list_nodes(self, label).await
    }

    async fn search_nodes(
        &self,
        term: &str,
        label: Option<&Label>,
        limit: usize,
    ) -> Result<Vec<NodeRecord>> {
        GraphClient::search_nodes(self, term, label, limit).await
    }

    async fn relationships(&self, rel_type: &RelType) -> Result<Vec<EdgeRecord>> {
        GraphClient::relationships(self, rel_type).await
    }

    async fn node_relationships(&self, node: &NodeRef) -> Result<Option<Neighborhood>> {
        GraphClient::node_relationships(self, node).await
    }

    async fn count_nodes(&self, label: Option<&Label>) -> Result<u64> {
        GraphClient::count_nodes(self, label).await
    }

    async fn count_relationships(&self) -> Result<u64> {
        GraphClient::count_relationships(self).await
    }

    async fn label_counts(&self) -> Result<BTreeMap<String, u64>> {
        GraphClient::label_counts(self).await
    }

    async fn relationship_type_counts(&self) -> Result<BTreeMap<String, u64>> {
        GraphClient::relationship_type_counts(self).await
    }

    async fn orphan_nodes(&self) -> Result<Vec<NodeRecord>> {
        GraphClient::orphan_nodes(self).await
    }

    async fn ping(&self) -> Result<()> {
        GraphClient::ping(self).await
    }

    async fn merge_node(
        &self,
        labels: &LabelSet,
        name: &str,
        props: &PropertyMap,
    ) -> Result<WriteStats> {
        soften_constraint(GraphClient::merge_node(self, labels, name, props).await)
    }

    async fn set_node_properties(
        &self,
        node: &NodeRef,
        props: &PropertyMap,
    ) -> Result<WriteStats> {
        GraphClient::set_node_properties(self, node, props).await
    }

    async fn rename_node(&self, node: &NodeRef, new_name: &str) -> Result<WriteStats> {
        GraphClient::rename_node(self, node, new_name).await
    }

    async fn merge_relationship(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        rel_type: &RelType,
        props: &PropertyMap,
    ) -> Result<Option<WriteStats>> {
        match GraphClient::merge_relationship(self, from, to, rel_type, props).await {
            Err(e) if e.is_already_exists() => soften_constraint(Err(e)).map(Some),
            other => other,
        }
    }

    async fn delete_relationships(
        &self,
        from: &NodeRef,
        rel_type: &RelType,
        target_label: Option<&Label>,
    ) -> Result<WriteStats> {
        GraphClient::delete_relationships(self, from, rel_type, target_label).await
    }

    async fn detach_delete(&self, label: &Label, names: &[String]) -> Result<WriteStats> {
        GraphClient::detach_delete(self, label, names).await
    }

    async fn declare_unique_constraint(
        &self,
        label: &Label,
        field: &Identifier,
    ) -> Result<WriteStats> {
        soften_constraint(GraphClient::declare_unique_constraint(self, label, field).await)
    }

    async fn drop_unique_constraint(
        &self,
        label: &Label,
        field: &Identifier,
    ) -> Result<WriteStats> {
        GraphClient::drop_unique_constraint(self, label, field).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soften_constraint_only_catches_already_exists() {
        let dup = Err(GraphError::ConstraintViolation {
            message: "Node(7) already exists with label `Instance`".into(),
            cypher: "MERGE ...".into(),
        });
        let stats = soften_constraint(dup).unwrap();
        assert!(stats.skipped);
        assert!(stats.warning.unwrap().contains("already exists"));

        let other = Err(GraphError::Serialization("bad json".into()));
        assert!(soften_constraint(other).is_err());
    }
}
