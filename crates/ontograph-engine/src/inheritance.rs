//! Property inheritance through the `SUBCLASS_OF` hierarchy.
//!
//! A property name resolves to its nearest declaring concept: distance 0 is a
//! direct declaration, and equal distances go to the smallest concept name.
//! Required properties resolve the same way over required declarations only,
//! so a direct optional declaration never hides an inherited requirement.

use std::collections::BTreeSet;
use std::sync::Arc;

use ontograph_core::{keys, Label, PropertyMap, PropertyType};
use ontograph_graph::GraphStore;
use serde::Serialize;
use serde_json::Value;

use crate::error::{OntologyError, Result};
use crate::hierarchy::{Resolved, SchemaGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritanceKind {
    Direct,
    Inherited,
}

/// A property as seen from one concept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub property_type: PropertyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip_serializing_if = "PropertyMap::is_empty")]
    pub constraints: PropertyMap,
    pub inheritance: InheritanceKind,
    /// Concept whose `HAS_PROPERTY` edge supplied this property.
    pub source_concept: String,
    /// `SUBCLASS_OF` hops from the queried concept to `source_concept`.
    pub distance: usize,
}

impl PropertyDescriptor {
    fn build(schema: &SchemaGraph, resolved: Resolved<'_>) -> Self {
        let decl = resolved.declaration;
        let node = schema.property(&decl.property);
        let text = |key: &str| {
            node.and_then(|p| p.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Self {
            name: decl.property.clone(),
            property_type: text(keys::PROPERTY_TYPE)
                .and_then(|t| t.parse().ok())
                .unwrap_or(PropertyType::DataProperty),
            range: text(keys::RANGE),
            comment: text(keys::COMMENT),
            tag: text(keys::TAG),
            required: decl.required,
            default_value: decl.default_value.clone(),
            constraints: decl.attributes.clone(),
            inheritance: if resolved.distance == 0 {
                InheritanceKind::Direct
            } else {
                InheritanceKind::Inherited
            },
            source_concept: decl.concept.clone(),
            distance: resolved.distance,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.inheritance == InheritanceKind::Direct
    }
}

/// A superclass property that the subclass redeclares on its own path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverriddenProperty {
    #[serde(flatten)]
    pub property: PropertyDescriptor,
    pub override_source: String,
}

/// What a subclass takes from one of its superclasses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InheritanceDiff {
    pub subclass: String,
    pub superclass: String,
    pub inheritance_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Superclass properties that reach the subclass unchanged. Distances and
    /// direct/inherited tags are relative to the superclass.
    pub inherited: Vec<PropertyDescriptor>,
    pub overridden: Vec<OverriddenProperty>,
    pub total_available_from_superclass: usize,
}

/// Every property visible from `concept`: direct ones first by name, then
/// inherited ones by (distance, source concept, name).
pub fn resolve_available(
    schema: &SchemaGraph,
    concept: &str,
    include_inherited: bool,
) -> Vec<PropertyDescriptor> {
    let mut lineage = schema.lineage(concept);
    if !include_inherited {
        lineage.truncate(1);
    }

    let mut found: Vec<PropertyDescriptor> = schema
        .effective(&lineage)
        .into_values()
        .map(|resolved| PropertyDescriptor::build(schema, resolved))
        .collect();
    found.sort_by(|a, b| {
        (a.distance, &a.source_concept, &a.name).cmp(&(b.distance, &b.source_concept, &b.name))
    });
    found
}

/// Direct required properties plus, when `include_inherited`, the nearest
/// required declaration of every other name among the ancestors.
pub fn resolve_required(
    schema: &SchemaGraph,
    concept: &str,
    include_inherited: bool,
) -> Vec<PropertyDescriptor> {
    let mut lineage = schema.lineage(concept);
    if !include_inherited {
        lineage.truncate(1);
    }

    let mut found: Vec<PropertyDescriptor> = schema
        .effective_where(&lineage, |d| d.required)
        .into_values()
        .map(|resolved| PropertyDescriptor::build(schema, resolved))
        .collect();
    found.sort_by(|a, b| {
        (a.distance, &a.source_concept, &a.name).cmp(&(b.distance, &b.source_concept, &b.name))
    });
    found
}

/// Split the superclass's visible properties into those the subclass inherits
/// as-is and those it overrides on another path.
///
/// Overriding candidates are the subclass's lineage minus the superclass and
/// the superclass's own ancestors.
pub fn resolve_diff(schema: &SchemaGraph, subclass: &str, superclass: &str) -> InheritanceDiff {
    let mut diff = InheritanceDiff {
        subclass: subclass.to_string(),
        superclass: superclass.to_string(),
        inheritance_exists: schema.is_ancestor(superclass, subclass),
        message: None,
        inherited: Vec::new(),
        overridden: Vec::new(),
        total_available_from_superclass: 0,
    };
    if !diff.inheritance_exists {
        diff.message = Some(format!(
            "No subclass relationship between {subclass} and {superclass}"
        ));
        return diff;
    }

    let mut excluded: BTreeSet<String> = schema.ancestors(superclass);
    excluded.insert(superclass.to_string());
    let candidates: Vec<(String, usize)> = schema
        .lineage(subclass)
        .into_iter()
        .filter(|(name, _)| !excluded.contains(name))
        .collect();
    let overriders = schema.effective(&candidates);

    let from_superclass = resolve_available(schema, superclass, true);
    diff.total_available_from_superclass = from_superclass.len();
    for property in from_superclass {
        match overriders.get(property.name.as_str()) {
            Some(resolved) => diff.overridden.push(OverriddenProperty {
                override_source: resolved.declaration.concept.clone(),
                property,
            }),
            None => diff.inherited.push(property),
        }
    }
    diff
}

#[derive(Clone)]
pub struct InheritanceResolver {
    store: Arc<dyn GraphStore>,
    concept_labels: Vec<Label>,
}

impl InheritanceResolver {
    pub fn new(store: Arc<dyn GraphStore>, concept_labels: Vec<Label>) -> Self {
        Self {
            store,
            concept_labels,
        }
    }

    /// Fetch the current schema. Nothing is cached between calls.
    pub async fn load_schema(&self) -> Result<SchemaGraph> {
        let schema = SchemaGraph::load(self.store.as_ref(), &self.concept_labels).await?;
        for cycle in schema.cycles() {
            tracing::warn!(cycle = %cycle.join(" -> "), "Circular SUBCLASS_OF chain");
        }
        Ok(schema)
    }

    /// Required properties of `concept`. An unknown concept has none.
    pub async fn required_properties(
        &self,
        concept: &str,
        include_inherited: bool,
    ) -> Result<Vec<PropertyDescriptor>> {
        let schema = self.load_schema().await?;
        let found = resolve_required(&schema, concept, include_inherited);
        tracing::debug!(concept, required = found.len(), "Resolved required properties");
        Ok(found)
    }

    /// Required and optional properties of `concept`.
    pub async fn available_properties(
        &self,
        concept: &str,
        include_inherited: bool,
    ) -> Result<Vec<PropertyDescriptor>> {
        let schema = self.load_schema().await?;
        if !schema.contains(concept) {
            return Err(OntologyError::not_found("concept", concept));
        }
        Ok(resolve_available(&schema, concept, include_inherited))
    }

    pub async fn diff_inheritance(&self, subclass: &str, superclass: &str) -> Result<InheritanceDiff> {
        let schema = self.load_schema().await?;
        for concept in [subclass, superclass] {
            if !schema.contains(concept) {
                return Err(OntologyError::not_found("concept", concept));
            }
        }
        let diff = resolve_diff(&schema, subclass, superclass);
        tracing::debug!(
            subclass,
            superclass,
            inherited = diff.inherited.len(),
            overridden = diff.overridden.len(),
            "Computed inheritance diff"
        );
        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontograph_graph::{EdgeRecord, NodeRecord};
    use serde_json::json;

    fn node(label: &str, name: &str, extra: Value) -> NodeRecord {
        let mut properties = extra.as_object().cloned().unwrap_or_default();
        properties.insert("name".into(), json!(name));
        NodeRecord {
            labels: vec![label.into()],
            properties,
        }
    }

    fn edge(rel: &str, from: &str, to: &str, required: bool) -> EdgeRecord {
        EdgeRecord {
            rel_type: rel.into(),
            source: from.into(),
            target: to.into(),
            properties: json!({"required": required}).as_object().cloned().unwrap_or_default(),
        }
    }

    /// Resource <- Document <- Report, with Report also under Audited.
    fn schema() -> SchemaGraph {
        let concepts: Vec<NodeRecord> = ["Audited", "Document", "Report", "Resource"]
            .into_iter()
            .map(|c| node("Concept", c, json!({})))
            .collect();
        let properties = vec![
            node("Property", "title", json!({"property_type": "DataProperty", "range": "string"})),
            node("Property", "author", json!({"property_type": "ObjectProperty"})),
            node("Property", "uri", json!({"property_type": "DataProperty"})),
            node("Property", "auditor", json!({"property_type": "DataProperty"})),
        ];
        SchemaGraph::from_records(
            &concepts,
            &properties,
            &[
                edge("SUBCLASS_OF", "Document", "Resource", false),
                edge("SUBCLASS_OF", "Report", "Document", false),
                edge("SUBCLASS_OF", "Report", "Audited", false),
            ],
            &[
                edge("HAS_PROPERTY", "Resource", "uri", true),
                edge("HAS_PROPERTY", "Resource", "title", true),
                edge("HAS_PROPERTY", "Document", "author", true),
                edge("HAS_PROPERTY", "Report", "title", true),
                edge("HAS_PROPERTY", "Audited", "auditor", true),
            ],
        )
    }

    #[test]
    fn test_direct_declaration_wins_over_inherited() {
        let required = resolve_required(&schema(), "Report", true);
        let titles: Vec<_> = required.iter().filter(|p| p.name == "title").collect();

        assert_eq!(titles.len(), 1);
        assert!(titles[0].is_direct());
        assert_eq!(titles[0].source_concept, "Report");
        assert_eq!(titles[0].range.as_deref(), Some("string"));
    }

    #[test]
    fn test_ordering_direct_then_by_distance() {
        let names: Vec<String> = resolve_required(&schema(), "Report", true)
            .into_iter()
            .map(|p| format!("{}@{}", p.name, p.source_concept))
            .collect();
        assert_eq!(
            names,
            vec!["title@Report", "auditor@Audited", "author@Document", "uri@Resource"]
        );
    }

    #[test]
    fn test_direct_optional_keeps_inherited_requirement() {
        let concepts = vec![node("Concept", "Resource", json!({})), node("Concept", "Memo", json!({}))];
        let properties = vec![node("Property", "uri", json!({"property_type": "DataProperty"}))];
        let schema = SchemaGraph::from_records(
            &concepts,
            &properties,
            &[edge("SUBCLASS_OF", "Memo", "Resource", false)],
            &[
                edge("HAS_PROPERTY", "Resource", "uri", true),
                edge("HAS_PROPERTY", "Memo", "uri", false),
            ],
        );

        let required = resolve_required(&schema, "Memo", true);
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].source_concept, "Resource");
        assert!(!required[0].is_direct());
        assert!(resolve_required(&schema, "Memo", false).is_empty());

        let available = resolve_available(&schema, "Memo", true);
        assert!(available[0].is_direct() && !available[0].required);
    }

    #[test]
    fn test_without_inheritance_only_direct() {
        let direct = resolve_required(&schema(), "Report", false);
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].name, "title");
    }

    #[test]
    fn test_property_type_comes_from_property_node() {
        let available = resolve_available(&schema(), "Document", true);
        let author = available.iter().find(|p| p.name == "author").unwrap();
        assert_eq!(author.property_type, PropertyType::ObjectProperty);
    }

    #[test]
    fn test_diff_reports_override_source() {
        let diff = resolve_diff(&schema(), "Report", "Resource");
        assert!(diff.inheritance_exists);
        assert_eq!(diff.total_available_from_superclass, 2);

        assert_eq!(diff.overridden.len(), 1);
        assert_eq!(diff.overridden[0].property.name, "title");
        assert_eq!(diff.overridden[0].override_source, "Report");
        assert_eq!(diff.inherited.len(), 1);
        assert_eq!(diff.inherited[0].name, "uri");
    }

    #[test]
    fn test_diff_without_relationship() {
        let diff = resolve_diff(&schema(), "Resource", "Report");
        assert!(!diff.inheritance_exists);
        assert!(diff.message.is_some());
        assert!(diff.inherited.is_empty());
    }
}
