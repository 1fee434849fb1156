//! Concept, Property and custom node creation plus typed edges
//! (`HAS_PROPERTY`, `SUBCLASS_OF`, `INSTANCE_OF`, property, semantic and
//! custom relationships).

use ontograph_core::{
    keys, Label, LabelSet, NodeRef, OperationStatus, PropertyMap, PropertyType, RelType,
    WriteStats,
};
use ontograph_graph::NodeRecord;
use serde::Serialize;
use serde_json::Value;

use crate::error::{OntologyError, Result};
use crate::lifecycle::{add_common_properties, InstanceLifecycleManager};
use crate::relationships::RelationshipOutcome;

/// Default `confidence` and `weight` of a semantic relationship.
const DEFAULT_SEMANTIC_SCORE: f64 = 1.0;

#[derive(Debug, Clone, Serialize)]
pub struct NodeOutcome {
    pub name: String,
    pub label: Label,
    pub status: OperationStatus,
    pub stats: WriteStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<NodeRecord>,
}

/// Definition of a new Property node.
#[derive(Debug, Clone)]
pub struct PropertySpec {
    pub property_type: PropertyType,
    /// Concept the property applies to.
    pub domain: Option<String>,
    /// Label of the domain concept. Detected when absent.
    pub domain_label: Option<Label>,
    pub range: Option<String>,
    /// Used for the `HAS_PROPERTY` edge to the domain.
    pub required: bool,
    pub default_value: Option<Value>,
    /// Extra attributes stored on the Property node.
    pub attributes: PropertyMap,
    /// Require the domain to exist and link it with `HAS_PROPERTY`.
    pub link_domain: bool,
}

impl Default for PropertySpec {
    fn default() -> Self {
        Self {
            property_type: PropertyType::DataProperty,
            domain: None,
            domain_label: None,
            range: None,
            required: false,
            default_value: None,
            attributes: PropertyMap::new(),
            link_domain: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyOutcome {
    pub name: String,
    pub property_type: PropertyType,
    pub status: OperationStatus,
    pub stats: WriteStats,
    pub auto_relationship_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_error: Option<String>,
    pub total_operations: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubclassOutcome {
    #[serde(flatten)]
    pub relationship: RelationshipOutcome,
    /// The edge closes a `SUBCLASS_OF` cycle.
    pub creates_cycle: bool,
}

impl InstanceLifecycleManager {
    /// Create a concept under the default concept label, or update it when
    /// `allow_update` is set and properties are given.
    pub async fn create_concept(
        &self,
        name: &str,
        properties: &PropertyMap,
        additional_labels: &[Label],
        allow_update: bool,
    ) -> Result<NodeOutcome> {
        if name.is_empty() {
            return Err(OntologyError::InvalidArgument(
                "concept name must not be empty".into(),
            ));
        }
        let label = self.config.default_concept_label.clone();
        let mut outcome = NodeOutcome {
            name: name.to_string(),
            label: label.clone(),
            status: OperationStatus::AlreadyExists,
            stats: WriteStats::default(),
            existing: None,
        };

        if let Some(node) = self.registry.get(name, Some(&label)).await? {
            let mut update: PropertyMap = properties
                .iter()
                .filter(|(k, _)| k.as_str() != keys::NAME)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if !allow_update || update.is_empty() {
                tracing::info!(concept = name, "Concept already exists, returning it unchanged");
                outcome.existing = Some(node);
                return Ok(outcome);
            }
            update.insert(keys::UPDATED_AT.into(), ontograph_core::now_timestamp().into());
            outcome.stats = self
                .store
                .set_node_properties(&NodeRef::new(label, name), &update)
                .await?;
            outcome.status = OperationStatus::Updated;
            tracing::info!(concept = name, "Updated concept");
            return Ok(outcome);
        }

        let mut props = properties.clone();
        props.insert(keys::NAME.into(), name.into());
        add_common_properties(&mut props);
        let labels = LabelSet::new(label).with_all(additional_labels.iter().cloned());

        outcome.stats = self.store.merge_node(&labels, name, &props).await?;
        if !outcome.stats.skipped {
            outcome.status = OperationStatus::Created;
            tracing::info!(concept = name, labels = %labels.cypher(), "Created concept");
        }
        Ok(outcome)
    }

    /// Create a Property node labeled `Property` and its property type, and
    /// link it to its domain when one is given.
    ///
    /// An ObjectProperty name must map to a valid relationship type.
    pub async fn create_property(&self, name: &str, spec: &PropertySpec) -> Result<PropertyOutcome> {
        if name.is_empty() {
            return Err(OntologyError::InvalidArgument(
                "property name must not be empty".into(),
            ));
        }
        if spec.property_type == PropertyType::ObjectProperty {
            RelType::from_property_name(name)?;
        }
        let domain_label = match (&spec.domain, spec.link_domain) {
            (Some(domain), true) => Some(
                self.require_concept(domain, spec.domain_label.as_ref(), name)
                    .await?,
            ),
            _ => spec.domain_label.clone(),
        };

        let mut outcome = PropertyOutcome {
            name: name.to_string(),
            property_type: spec.property_type,
            status: OperationStatus::AlreadyExists,
            stats: WriteStats::default(),
            auto_relationship_created: false,
            relationship_error: None,
            total_operations: 0,
        };
        if self.registry.exists(name, Some(&Label::property())).await? {
            tracing::info!(property = name, "Property already exists");
            return Ok(outcome);
        }

        let mut props = spec.attributes.clone();
        props.insert(keys::NAME.into(), name.into());
        props.insert(keys::PROPERTY_TYPE.into(), spec.property_type.as_str().into());
        if let Some(domain) = &spec.domain {
            props.insert(keys::DOMAIN.into(), domain.as_str().into());
        }
        if let Some(range) = &spec.range {
            props.insert(keys::RANGE.into(), range.as_str().into());
        }
        add_common_properties(&mut props);

        let labels = LabelSet::new(Label::property()).with(Label::new(spec.property_type.as_str())?);
        outcome.stats = self.store.merge_node(&labels, name, &props).await?;
        if outcome.stats.skipped {
            return Ok(outcome);
        }
        outcome.status = OperationStatus::Created;
        outcome.total_operations = 1;
        tracing::info!(property = name, property_type = %spec.property_type, "Created property");

        if let (Some(domain), Some(label), true) = (&spec.domain, &domain_label, spec.link_domain) {
            let link = self
                .assign_property_to_concept(
                    domain,
                    name,
                    spec.required,
                    spec.default_value.clone(),
                    &PropertyMap::new(),
                    Some(label),
                )
                .await;
            match link {
                Ok(link) => {
                    outcome.auto_relationship_created = true;
                    outcome.total_operations += 1;
                    outcome.stats.merge(&link.stats);
                }
                Err(e) => {
                    tracing::warn!(property = name, domain = %domain, error = %e, "Property created without HAS_PROPERTY");
                    outcome.relationship_error = Some(e.to_string());
                }
            }
        }
        Ok(outcome)
    }

    /// Declare `property` on `concept` via an idempotent `HAS_PROPERTY` edge.
    pub async fn assign_property_to_concept(
        &self,
        concept: &str,
        property: &str,
        required: bool,
        default_value: Option<Value>,
        constraints: &PropertyMap,
        concept_label: Option<&Label>,
    ) -> Result<RelationshipOutcome> {
        let label = self.registry.resolve_label(concept, concept_label).await?;

        let mut props = constraints.clone();
        props.insert(keys::REQUIRED.into(), required.into());
        props.insert(keys::ASSIGNMENT_TYPE.into(), "direct".into());
        if let Some(default_value) = default_value {
            props.insert(keys::DEFAULT_VALUE.into(), default_value);
        }

        let outcome = self
            .relationships
            .create_relationship(
                &NodeRef::new(label, concept),
                &NodeRef::new(Label::property(), property),
                &RelType::has_property(),
                &props,
            )
            .await?;
        tracing::info!(concept, property, required, status = %outcome.status, "Assigned property");
        Ok(outcome)
    }

    /// Idempotent `SUBCLASS_OF` edge from `subclass` to `superclass`.
    pub async fn create_subclass_relationship(
        &self,
        subclass: &str,
        superclass: &str,
        properties: &PropertyMap,
        subclass_label: Option<&Label>,
        superclass_label: Option<&Label>,
    ) -> Result<SubclassOutcome> {
        let schema = self.resolver.load_schema().await?;
        let creates_cycle = schema
            .lineage(superclass)
            .iter()
            .any(|(name, _)| name == subclass);

        let default = &self.config.default_concept_label;
        let relationship = self
            .relationships
            .create_relationship(
                &NodeRef::new(subclass_label.unwrap_or(default).clone(), subclass),
                &NodeRef::new(superclass_label.unwrap_or(default).clone(), superclass),
                &RelType::subclass_of(),
                properties,
            )
            .await?;

        if creates_cycle && relationship.created() {
            tracing::warn!(subclass, superclass, "SUBCLASS_OF edge closes a cycle");
        }
        Ok(SubclassOutcome {
            relationship,
            creates_cycle,
        })
    }

    /// Idempotent edge of any validated type between two named nodes.
    pub async fn create_custom_relationship(
        &self,
        from: &str,
        to: &str,
        rel_type: &str,
        properties: &PropertyMap,
        from_label: Option<&Label>,
        to_label: Option<&Label>,
    ) -> Result<RelationshipOutcome> {
        let rel_type = RelType::new(rel_type)?;
        let default = &self.config.default_concept_label;
        self.relationships
            .create_relationship(
                &NodeRef::new(from_label.unwrap_or(default).clone(), from),
                &NodeRef::new(to_label.unwrap_or(default).clone(), to),
                &rel_type,
                properties,
            )
            .await
    }

    /// Create a node under any label. A name already used under that label is
    /// `Conflict::NameTaken`.
    pub async fn create_custom_node(
        &self,
        label: &Label,
        name: &str,
        properties: &PropertyMap,
        additional_labels: &[Label],
    ) -> Result<NodeOutcome> {
        if name.is_empty() {
            return Err(OntologyError::InvalidArgument(
                "node name must not be empty".into(),
            ));
        }
        self.registry.ensure_available(name, label).await?;

        let mut props = properties.clone();
        props.insert(keys::NAME.into(), name.into());
        add_common_properties(&mut props);
        let labels = LabelSet::new(label.clone()).with_all(additional_labels.iter().cloned());

        let stats = self.store.merge_node(&labels, name, &props).await?;
        let status = if stats.skipped {
            OperationStatus::AlreadyExists
        } else {
            tracing::info!(node = name, labels = %labels.cypher(), "Created custom node");
            OperationStatus::Created
        };
        Ok(NodeOutcome {
            name: name.to_string(),
            label: label.clone(),
            status,
            stats,
            existing: None,
        })
    }

    /// Idempotent `INSTANCE_OF` edge from an instance to a concept.
    pub async fn create_instance_relationship(
        &self,
        instance: &str,
        concept: &str,
        properties: &PropertyMap,
        instance_label: Option<&Label>,
        concept_label: Option<&Label>,
    ) -> Result<RelationshipOutcome> {
        let instance_label = instance_label.cloned().unwrap_or_else(Label::instance);
        let concept_label = concept_label.unwrap_or(&self.config.default_concept_label);
        self.relationships
            .create_relationship(
                &NodeRef::new(instance_label, instance),
                &NodeRef::new(concept_label.clone(), concept),
                &RelType::instance_of(),
                properties,
            )
            .await
    }

    /// Idempotent edge typed after `property`, carrying the property name.
    /// Both endpoints default to `Instance`.
    pub async fn create_property_relationship(
        &self,
        subject: &str,
        property: &str,
        object: &str,
        properties: &PropertyMap,
        subject_label: Option<&Label>,
        object_label: Option<&Label>,
    ) -> Result<RelationshipOutcome> {
        let rel_type = RelType::from_property_name(property)?;
        let mut props = properties.clone();
        props.insert(keys::PROPERTY.into(), property.into());

        let subject_label = subject_label.cloned().unwrap_or_else(Label::instance);
        let object_label = object_label.cloned().unwrap_or_else(Label::instance);
        self.relationships
            .create_relationship(
                &NodeRef::new(subject_label, subject),
                &NodeRef::new(object_label, object),
                &rel_type,
                &props,
            )
            .await
    }

    /// Custom relationship tagged with `semantic_type`. `confidence` and
    /// `weight` default to 1.0 when not given.
    pub async fn create_semantic_relationship(
        &self,
        from: &str,
        to: &str,
        rel_type: &str,
        properties: &PropertyMap,
        from_label: Option<&Label>,
        to_label: Option<&Label>,
    ) -> Result<RelationshipOutcome> {
        let mut props = properties.clone();
        props.insert(keys::SEMANTIC_TYPE.into(), rel_type.into());
        for key in [keys::CONFIDENCE, keys::WEIGHT] {
            props
                .entry(key)
                .or_insert_with(|| DEFAULT_SEMANTIC_SCORE.into());
        }
        self.create_custom_relationship(from, to, rel_type, &props, from_label, to_label)
            .await
    }
}
