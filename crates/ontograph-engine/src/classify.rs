//! DataProperty / ObjectProperty classification of incoming property maps.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ontograph_core::{keys, Label, PropertyMap, PropertyType};
use ontograph_graph::GraphStore;

use crate::error::Result;

/// Properties split by how they are stored. `name` is never part of either bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitProperties {
    pub data: PropertyMap,
    pub object: PropertyMap,
}

#[derive(Clone)]
pub struct PropertyClassifier {
    store: Arc<dyn GraphStore>,
}

impl PropertyClassifier {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Look up the declared type of each property in one round-trip.
    ///
    /// Names without a Property node, or with an unrecognized `property_type`,
    /// default to `DataProperty`.
    pub async fn classify<I, S>(&self, names: I) -> Result<BTreeMap<String, PropertyType>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let wanted: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if wanted.is_empty() {
            return Ok(BTreeMap::new());
        }

        let lookup: Vec<String> = wanted.iter().cloned().collect();
        let found = self
            .store
            .find_nodes_by_names(&Label::property(), &lookup)
            .await?;

        let mut types = BTreeMap::new();
        for node in &found {
            let declared = node.get_str(keys::PROPERTY_TYPE).unwrap_or_default();
            let kind = declared.parse::<PropertyType>().unwrap_or_else(|_| {
                tracing::warn!(
                    property = node.name(),
                    declared,
                    "Unrecognized property_type, treating as DataProperty"
                );
                PropertyType::DataProperty
            });
            types.insert(node.name().to_string(), kind);
        }

        for name in wanted {
            if !types.contains_key(&name) {
                tracing::warn!(property = %name, "Property not declared, defaulting to DataProperty");
                types.insert(name, PropertyType::DataProperty);
            }
        }
        Ok(types)
    }

    /// Split `props` into data and object buckets, dropping the `name` key.
    pub async fn split(&self, props: &PropertyMap) -> Result<SplitProperties> {
        let types = self
            .classify(props.keys().filter(|k| k.as_str() != keys::NAME).cloned())
            .await?;

        let mut split = SplitProperties::default();
        for (key, value) in props {
            match types.get(key) {
                Some(PropertyType::ObjectProperty) => {
                    split.object.insert(key.clone(), value.clone());
                }
                Some(PropertyType::DataProperty) => {
                    split.data.insert(key.clone(), value.clone());
                }
                None => {}
            }
        }

        tracing::debug!(
            data = split.data.len(),
            object = split.object.len(),
            "Split properties"
        );
        Ok(split)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontograph_core::LabelSet;
    use ontograph_graph::MemoryGraph;
    use serde_json::json;

    async fn classifier() -> PropertyClassifier {
        let graph = Arc::new(MemoryGraph::new());
        for (name, kind) in [("rows", "DataProperty"), ("belongsTo", "ObjectProperty")] {
            let mut props = PropertyMap::new();
            props.insert(keys::PROPERTY_TYPE.into(), json!(kind));
            graph
                .merge_node(&LabelSet::new(Label::property()), name, &props)
                .await
                .unwrap();
        }
        PropertyClassifier::new(graph)
    }

    #[tokio::test]
    async fn test_classify_defaults_unknown_to_data() {
        let types = classifier()
            .await
            .classify(["rows", "belongsTo", "mystery"])
            .await
            .unwrap();

        assert_eq!(types["rows"], PropertyType::DataProperty);
        assert_eq!(types["belongsTo"], PropertyType::ObjectProperty);
        assert_eq!(types["mystery"], PropertyType::DataProperty);
    }

    #[tokio::test]
    async fn test_split_excludes_name() {
        let mut props = PropertyMap::new();
        props.insert("name".into(), json!("t2"));
        props.insert("rows".into(), json!(10));
        props.insert("belongsTo".into(), json!(["db1", "db2"]));

        let split = classifier().await.split(&props).await.unwrap();
        assert_eq!(split.data.len(), 1);
        assert_eq!(split.data["rows"], json!(10));
        assert_eq!(split.object.len(), 1);
        assert!(!split.data.contains_key("name"));
    }
}
