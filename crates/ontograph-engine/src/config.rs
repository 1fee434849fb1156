//! Configuration for the ontology engine.

use serde::Deserialize;

use ontograph_core::{Label, RelType};

/// Ontology behaviour settings.
///
/// Loaded from the `[ontology]` section of `ontograph.toml` or
/// `ONTOGRAPH_ONTOLOGY__` environment variables. Labels are validated on load.
#[derive(Debug, Clone, Deserialize)]
pub struct OntologyConfig {
    /// Labels that get a uniqueness constraint on `name`. Also the priority
    /// order used when detecting a node's label from its name.
    #[serde(default = "default_labels_to_constrain")]
    pub labels_to_constrain: Vec<Label>,

    /// Labels whose nodes are schema concepts.
    #[serde(default = "default_concept_labels")]
    pub concept_labels: Vec<Label>,

    /// Label used for new concepts and for relationship endpoints when the
    /// caller gives none.
    #[serde(default = "default_concept_label")]
    pub default_concept_label: Label,

    /// Whether validation walks `SUBCLASS_OF` ancestors by default.
    #[serde(default = "default_true")]
    pub include_inherited: bool,

    /// Treat an existing relationship as a conflict instead of a soft skip.
    #[serde(default)]
    pub strict: bool,

    /// `instance_of` value identifying Object instances.
    #[serde(default = "default_object_concept")]
    pub object_concept: String,

    /// `instance_of` value identifying ObjectField instances.
    #[serde(default = "default_object_field_concept")]
    pub object_field_concept: String,

    /// Relationship from an ObjectField to its Object.
    #[serde(default = "default_object_field_relationship")]
    pub object_field_relationship: RelType,
}

fn default_labels_to_constrain() -> Vec<Label> {
    vec![
        Label::concept(),
        Label::instance(),
        Label::property(),
        Label::class(),
        Label::individual(),
    ]
}

fn default_concept_labels() -> Vec<Label> {
    vec![Label::concept(), Label::class()]
}

fn default_concept_label() -> Label {
    Label::concept()
}

fn default_true() -> bool {
    true
}

fn default_object_concept() -> String {
    "Object".to_string()
}

fn default_object_field_concept() -> String {
    "ObjectField".to_string()
}

fn default_object_field_relationship() -> RelType {
    RelType::is_object_field_of()
}

impl Default for OntologyConfig {
    fn default() -> Self {
        Self {
            labels_to_constrain: default_labels_to_constrain(),
            concept_labels: default_concept_labels(),
            default_concept_label: default_concept_label(),
            include_inherited: default_true(),
            strict: false,
            object_concept: default_object_concept(),
            object_field_concept: default_object_field_concept(),
            object_field_relationship: default_object_field_relationship(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = OntologyConfig::default();
        assert_eq!(cfg.labels_to_constrain.len(), 5);
        assert_eq!(cfg.labels_to_constrain[0], Label::concept());
        assert_eq!(cfg.object_field_relationship.as_str(), "ISOBJECTFIELDOF");
        assert!(cfg.include_inherited);
        assert!(!cfg.strict);
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let cfg: OntologyConfig =
            serde_json::from_str(r#"{"strict": true, "concept_labels": ["Class"]}"#).unwrap();
        assert!(cfg.strict);
        assert_eq!(cfg.concept_labels, vec![Label::class()]);
        assert_eq!(cfg.default_concept_label, Label::concept());
    }

    #[test]
    fn test_invalid_label_rejected() {
        let cfg: Result<OntologyConfig, _> =
            serde_json::from_str(r#"{"concept_labels": ["Bad Label"]}"#);
        assert!(cfg.is_err());
    }
}
