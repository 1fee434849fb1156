//! Name lookup and label detection.
//!
//! Names are unique per label, not globally, so a bare name can resolve to
//! several nodes. Absence is a normal result here; only `detect_label` turns
//! it into an error.

use std::sync::Arc;

use ontograph_core::Label;
use ontograph_graph::{GraphStore, NodeRecord};

use crate::error::{Conflict, OntologyError, Result};

#[derive(Clone)]
pub struct NameRegistry {
    store: Arc<dyn GraphStore>,
    /// Labels checked in order when choosing a node's most specific label.
    label_priority: Vec<Label>,
}

impl NameRegistry {
    pub fn new(store: Arc<dyn GraphStore>, label_priority: Vec<Label>) -> Self {
        Self {
            store,
            label_priority,
        }
    }

    pub async fn exists(&self, name: &str, label: Option<&Label>) -> Result<bool> {
        Ok(!self.store.find_nodes(name, label).await?.is_empty())
    }

    /// The node called `name`. Without a label the first match is returned.
    pub async fn get(&self, name: &str, label: Option<&Label>) -> Result<Option<NodeRecord>> {
        Ok(self.store.find_nodes(name, label).await?.into_iter().next())
    }

    /// Work out the schema label of the single node called `name`.
    pub async fn detect_label(&self, name: &str) -> Result<Label> {
        let mut nodes = self.store.find_nodes(name, None).await?;
        match nodes.len() {
            0 => Err(OntologyError::not_found("node", name)),
            1 => {
                let node = nodes.remove(0);
                let label = self.primary_label(&node)?;
                tracing::debug!(name, label = %label, "Detected node label");
                Ok(label)
            }
            _ => {
                let mut candidates: Vec<String> =
                    nodes.iter().map(|n| n.labels.join(":")).collect();
                candidates.sort();
                Err(Conflict::AmbiguousName {
                    name: name.to_string(),
                    candidates,
                }
                .into())
            }
        }
    }

    /// Use `explicit` when given, otherwise detect it.
    pub async fn resolve_label(&self, name: &str, explicit: Option<&Label>) -> Result<Label> {
        match explicit {
            Some(label) => Ok(label.clone()),
            None => self.detect_label(name).await,
        }
    }

    /// Fail with `Conflict::NameTaken` if `name` is already used under `label`.
    pub async fn ensure_available(&self, name: &str, label: &Label) -> Result<()> {
        if self.exists(name, Some(label)).await? {
            return Err(Conflict::NameTaken {
                label: label.to_string(),
                name: name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn primary_label(&self, node: &NodeRecord) -> Result<Label> {
        if let Some(label) = self
            .label_priority
            .iter()
            .find(|l| node.has_label(l.as_str()))
        {
            return Ok(label.clone());
        }
        match node.labels.first() {
            Some(first) => Ok(Label::new(first.as_str())?),
            None => Err(OntologyError::InvalidArgument(format!(
                "node '{}' carries no labels",
                node.name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontograph_core::{LabelSet, PropertyMap};
    use ontograph_graph::MemoryGraph;

    use crate::error::ErrorKind;

    async fn registry_with(nodes: &[(LabelSet, &str)]) -> NameRegistry {
        let graph = Arc::new(MemoryGraph::new());
        for (labels, name) in nodes {
            graph
                .merge_node(labels, name, &PropertyMap::new())
                .await
                .unwrap();
        }
        NameRegistry::new(graph, vec![Label::concept(), Label::instance(), Label::class()])
    }

    #[tokio::test]
    async fn test_detect_label_prefers_priority_order() {
        let labels = LabelSet::new(Label::new("Thing").unwrap())
            .with(Label::class())
            .with(Label::concept());
        let registry = registry_with(&[(labels, "Vehicle")]).await;

        assert_eq!(registry.detect_label("Vehicle").await.unwrap(), Label::concept());
    }

    #[tokio::test]
    async fn test_detect_label_falls_back_to_first_label() {
        let registry =
            registry_with(&[(LabelSet::new(Label::new("Thing").unwrap()), "Widget")]).await;
        assert_eq!(
            registry.detect_label("Widget").await.unwrap().as_str(),
            "Thing"
        );
    }

    #[tokio::test]
    async fn test_detect_label_errors() {
        let registry = registry_with(&[
            (LabelSet::new(Label::concept()), "Table"),
            (LabelSet::new(Label::instance()), "Table"),
        ])
        .await;

        let missing = registry.detect_label("Nope").await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let ambiguous = registry.detect_label("Table").await.unwrap_err();
        assert_eq!(ambiguous.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_absence_is_not_an_error() {
        let registry = registry_with(&[]).await;
        assert!(!registry.exists("ghost", None).await.unwrap());
        assert!(registry.get("ghost", Some(&Label::instance())).await.unwrap().is_none());
        assert!(registry
            .ensure_available("ghost", &Label::instance())
            .await
            .is_ok());
    }
}
