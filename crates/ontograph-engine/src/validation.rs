//! Required-property completeness checks.

use std::collections::BTreeSet;
use std::fmt;

use ontograph_core::{keys, PropertyMap, PropertyType};
use serde::Serialize;
use serde_json::Value;

use crate::error::{OntologyError, Result};
use crate::hierarchy::SchemaGraph;
use crate::inheritance::{resolve_required, InheritanceKind, InheritanceResolver, PropertyDescriptor};

/// A required property absent from the provided set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingProperty {
    pub name: String,
    pub property_type: PropertyType,
    pub inheritance: InheritanceKind,
    pub source_concept: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl From<&PropertyDescriptor> for MissingProperty {
    fn from(p: &PropertyDescriptor) -> Self {
        Self {
            name: p.name.clone(),
            property_type: p.property_type,
            inheritance: p.inheritance,
            source_concept: p.source_concept.clone(),
            default_value: p.default_value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub concept: String,
    pub valid: bool,
    pub total_required: usize,
    pub direct_required: usize,
    pub inherited_required: usize,
    /// Provided keys considered, `name` excluded.
    pub provided_count: usize,
    pub missing: Vec<MissingProperty>,
    pub required: Vec<PropertyDescriptor>,
    pub inheritance_enabled: bool,
    /// Subclass cycles touching the concept's lineage.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<Vec<String>>,
}

impl ValidationReport {
    pub fn missing_names(&self) -> Vec<&str> {
        self.missing.iter().map(|m| m.name.as_str()).collect()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            return write!(
                f,
                "Concept '{}': all {} required properties provided",
                self.concept, self.total_required
            );
        }
        write!(
            f,
            "Validation failed for concept '{}': {} of {} required properties missing",
            self.concept,
            self.missing.len(),
            self.total_required
        )?;
        for m in &self.missing {
            let default = m
                .default_value
                .as_ref()
                .map_or_else(|| "none".to_string(), Value::to_string);
            let origin = match m.inheritance {
                InheritanceKind::Direct => "direct",
                InheritanceKind::Inherited => "inherited",
            };
            write!(
                f,
                "\n  - {} ({}, {origin} from '{}', default: {default})",
                m.name, m.property_type, m.source_concept
            )?;
        }
        Ok(())
    }
}

/// Check `provided` against the required properties of `concept`. Every gap is
/// collected; nothing short-circuits.
pub fn check(
    schema: &SchemaGraph,
    concept: &str,
    provided: &PropertyMap,
    include_inherited: bool,
) -> ValidationReport {
    let required = resolve_required(schema, concept, include_inherited);
    let provided_keys: BTreeSet<&str> = provided
        .keys()
        .map(String::as_str)
        .filter(|k| *k != keys::NAME)
        .collect();

    let missing: Vec<MissingProperty> = required
        .iter()
        .filter(|p| !provided_keys.contains(p.name.as_str()))
        .map(MissingProperty::from)
        .collect();

    let lineage: BTreeSet<String> = schema
        .lineage(concept)
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    let cycles = schema
        .cycles()
        .into_iter()
        .filter(|cycle| cycle.iter().any(|c| lineage.contains(c)))
        .collect();

    let direct_required = required.iter().filter(|p| p.is_direct()).count();
    ValidationReport {
        concept: concept.to_string(),
        valid: missing.is_empty(),
        total_required: required.len(),
        direct_required,
        inherited_required: required.len() - direct_required,
        provided_count: provided_keys.len(),
        missing,
        required,
        inheritance_enabled: include_inherited,
        cycles,
    }
}

#[derive(Clone)]
pub struct ValidationEngine {
    resolver: InheritanceResolver,
}

impl ValidationEngine {
    pub fn new(resolver: InheritanceResolver) -> Self {
        Self { resolver }
    }

    pub async fn validate(
        &self,
        concept: &str,
        provided: &PropertyMap,
        include_inherited: bool,
    ) -> Result<ValidationReport> {
        let schema = self.resolver.load_schema().await?;
        let report = check(&schema, concept, provided, include_inherited);
        if report.valid {
            tracing::debug!(concept, required = report.total_required, "Validation passed");
        } else {
            tracing::info!(
                concept,
                missing = ?report.missing_names(),
                "Validation failed"
            );
        }
        Ok(report)
    }

    /// Like [`validate`](Self::validate) but an incomplete set is an error.
    pub async fn require_valid(
        &self,
        concept: &str,
        provided: &PropertyMap,
        include_inherited: bool,
    ) -> Result<ValidationReport> {
        let report = self.validate(concept, provided, include_inherited).await?;
        if report.valid {
            Ok(report)
        } else {
            Err(OntologyError::Validation(Box::new(report)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontograph_graph::{EdgeRecord, NodeRecord};
    use serde_json::json;

    fn schema(required: &[(&str, bool)]) -> SchemaGraph {
        let concept = NodeRecord {
            labels: vec!["Concept".into()],
            properties: json!({"name": "Table"}).as_object().cloned().unwrap_or_default(),
        };
        let edges: Vec<EdgeRecord> = required
            .iter()
            .map(|(name, req)| EdgeRecord {
                rel_type: "HAS_PROPERTY".into(),
                source: "Table".into(),
                target: (*name).into(),
                properties: json!({"required": req, "default_value": if *name == "c" { json!(0) } else { Value::Null }})
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();
        SchemaGraph::from_records(&[concept], &[], &[], &edges)
    }

    fn provided(pairs: Value) -> PropertyMap {
        pairs.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_reports_all_gaps_at_once() {
        let schema = schema(&[("a", true), ("b", true), ("c", true), ("d", false)]);
        let report = check(&schema, "Table", &provided(json!({"a": 1})), true);

        assert!(!report.valid);
        assert_eq!(report.missing_names(), vec!["b", "c"]);
        assert_eq!(report.total_required, 3);
        assert_eq!(report.provided_count, 1);
    }

    #[test]
    fn test_name_key_never_counts() {
        let schema = schema(&[("name", true)]);
        let report = check(&schema, "Table", &provided(json!({"name": "t1"})), true);
        assert!(!report.valid);
        assert_eq!(report.provided_count, 0);
    }

    #[test]
    fn test_display_lists_source_and_default() {
        let schema = schema(&[("b", true), ("c", true)]);
        let report = check(&schema, "Table", &PropertyMap::new(), true);
        let msg = report.to_string();

        assert!(msg.contains("2 of 2 required properties missing"));
        assert!(msg.contains("- b (DataProperty, direct from 'Table', default: none)"));
        assert!(msg.contains("- c (DataProperty, direct from 'Table', default: 0)"));
    }

    #[test]
    fn test_unknown_concept_is_trivially_valid() {
        let report = check(&SchemaGraph::default(), "Ghost", &PropertyMap::new(), true);
        assert!(report.valid);
        assert_eq!(report.total_required, 0);
    }
}
