//! Instance creation, update, and rename.
//!
//! Every precondition (concept exists, required properties, ObjectProperty
//! targets) is checked before the first write. Edges created after the node
//! are best effort: their failures degrade the outcome and never roll the
//! node back.

use std::collections::BTreeMap;
use std::sync::Arc;

use ontograph_core::{
    keys, now_timestamp, Label, LabelSet, NodeRef, OperationStatus, PropertyMap, RelType,
    WriteStats,
};
use ontograph_graph::{GraphStore, NodeRecord};
use serde::Serialize;

use crate::classify::PropertyClassifier;
use crate::config::OntologyConfig;
use crate::error::{Conflict, OntologyError, Result};
use crate::inheritance::InheritanceResolver;
use crate::registry::NameRegistry;
use crate::relationships::{parse_object_targets, ObjectTargets, RelationshipManager, TargetOutcome};
use crate::schema::NodeOutcome;
use crate::validation::ValidationEngine;

/// Knobs for [`InstanceLifecycleManager::create_instance`].
#[derive(Debug, Clone)]
pub struct InstanceOptions {
    /// Labels added next to `Instance` on creation.
    pub additional_labels: Vec<Label>,
    /// Update an existing instance instead of returning it unchanged.
    pub allow_update: bool,
    /// Check required properties before writing.
    pub validate: bool,
    /// Label of the concept node. Detected from the name when absent.
    pub concept_label: Option<Label>,
    /// Require the concept to exist and link the instance with `IS_INSTANCE_OF`.
    pub classify: bool,
    /// Materialize ObjectProperty values as relationships.
    pub link_object_properties: bool,
    /// Overrides the configured `include_inherited`.
    pub include_inherited: Option<bool>,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            additional_labels: Vec::new(),
            allow_update: false,
            validate: true,
            concept_label: None,
            classify: true,
            link_object_properties: true,
            include_inherited: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceOutcome {
    pub name: String,
    pub concept: String,
    pub status: OperationStatus,
    pub stats: WriteStats,
    pub auto_relationship_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub object_property_relationships: Vec<TargetOutcome>,
    pub object_properties_created: usize,
    pub object_properties_failed: usize,
    pub total_operations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<String>,
    /// The stored node when nothing was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<NodeRecord>,
}

impl InstanceOutcome {
    fn new(name: &str, concept: &str, status: OperationStatus) -> Self {
        Self {
            name: name.to_string(),
            concept: concept.to_string(),
            status,
            stats: WriteStats::default(),
            auto_relationship_created: false,
            relationship_error: None,
            object_property_relationships: Vec::new(),
            object_properties_created: 0,
            object_properties_failed: 0,
            total_operations: 0,
            renamed_from: None,
            existing: None,
        }
    }

    fn record_targets(&mut self, outcomes: Vec<TargetOutcome>) {
        for outcome in &outcomes {
            if outcome.success {
                self.object_properties_created += 1;
                self.stats.relationships_created += outcome.relationships_created;
            } else {
                self.object_properties_failed += 1;
            }
        }
        self.object_property_relationships = outcomes;
    }
}

/// Set `comment`/`tag` defaults and stamp `created_at`/`updated_at`.
pub(crate) fn add_common_properties(props: &mut PropertyMap) {
    for key in [keys::COMMENT, keys::TAG] {
        props.entry(key).or_insert_with(|| "".into());
    }
    let now = now_timestamp();
    props.insert(keys::CREATED_AT.into(), now.clone().into());
    props.insert(keys::UPDATED_AT.into(), now.into());
}

#[derive(Clone)]
pub struct InstanceLifecycleManager {
    pub(crate) store: Arc<dyn GraphStore>,
    pub(crate) config: OntologyConfig,
    pub(crate) registry: NameRegistry,
    pub(crate) classifier: PropertyClassifier,
    pub(crate) resolver: InheritanceResolver,
    pub(crate) validator: ValidationEngine,
    pub(crate) relationships: RelationshipManager,
}

impl InstanceLifecycleManager {
    pub fn new(store: Arc<dyn GraphStore>, config: OntologyConfig) -> Self {
        let registry = NameRegistry::new(store.clone(), config.labels_to_constrain.clone());
        let resolver = InheritanceResolver::new(store.clone(), config.concept_labels.clone());
        Self {
            registry,
            classifier: PropertyClassifier::new(store.clone()),
            validator: ValidationEngine::new(resolver.clone()),
            resolver,
            relationships: RelationshipManager::new(store.clone(), config.strict),
            store,
            config,
        }
    }

    pub fn registry(&self) -> &NameRegistry {
        &self.registry
    }

    pub fn classifier(&self) -> &PropertyClassifier {
        &self.classifier
    }

    pub fn resolver(&self) -> &InheritanceResolver {
        &self.resolver
    }

    pub fn validator(&self) -> &ValidationEngine {
        &self.validator
    }

    pub fn relationships(&self) -> &RelationshipManager {
        &self.relationships
    }

    /// Label of an existing concept, or `MissingConcept` naming `dependent`.
    pub(crate) async fn require_concept(
        &self,
        concept: &str,
        explicit: Option<&Label>,
        dependent: &str,
    ) -> Result<Label> {
        let missing = |label: &str| OntologyError::MissingConcept {
            concept: concept.to_string(),
            label: label.to_string(),
            dependent: dependent.to_string(),
        };

        let label = match self.registry.resolve_label(concept, explicit).await {
            Ok(label) => label,
            Err(OntologyError::NotFound { .. }) => {
                return Err(missing(self.config.default_concept_label.as_str()))
            }
            Err(e) => return Err(e),
        };
        if !self.registry.exists(concept, Some(&label)).await? {
            return Err(missing(label.as_str()));
        }
        Ok(label)
    }

    /// Create an instance of `concept`, or update it when `allow_update` is set.
    ///
    /// A string `name` key in `properties` different from `name` requests a
    /// rename (update) or sets the created node's name.
    pub async fn create_instance(
        &self,
        name: &str,
        concept: &str,
        properties: &PropertyMap,
        options: &InstanceOptions,
    ) -> Result<InstanceOutcome> {
        if name.is_empty() {
            return Err(OntologyError::InvalidArgument(
                "instance name must not be empty".into(),
            ));
        }
        let requested_name = properties
            .get(keys::NAME)
            .and_then(|v| v.as_str())
            .filter(|n| *n != name)
            .map(str::to_string);

        // 1. Concept must exist when classifying.
        let concept_label = if options.classify {
            self.require_concept(concept, options.concept_label.as_ref(), name)
                .await?
        } else {
            options
                .concept_label
                .clone()
                .unwrap_or_else(|| self.config.default_concept_label.clone())
        };

        // 2. Data / Object split.
        let split = self.classifier.split(properties).await?;
        let targets = if options.link_object_properties {
            parse_object_targets(&split.object)?
        } else {
            if !split.object.is_empty() {
                tracing::debug!(instance = name, "ObjectProperty linking disabled, ignoring object values");
            }
            BTreeMap::new()
        };

        let existing = self.registry.get(name, Some(&Label::instance())).await?;

        // 3. Required properties, against the merged view on update.
        if options.validate {
            let include_inherited = options
                .include_inherited
                .unwrap_or(self.config.include_inherited);
            let view = match &existing {
                Some(node) if options.allow_update => {
                    let mut merged = node.properties.clone();
                    merged.extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                    merged
                }
                _ => properties.clone(),
            };
            self.validator
                .require_valid(concept, &view, include_inherited)
                .await?;
        }

        // 4. ObjectProperty targets.
        self.relationships.verify_object_targets(&targets).await?;

        // 5. Existing instance.
        if let Some(node) = existing {
            if !options.allow_update {
                if let Some(new_name) = &requested_name {
                    return Err(OntologyError::InvalidArgument(format!(
                        "rename of instance '{name}' to '{new_name}' requires allow_update"
                    )));
                }
                tracing::info!(instance = name, "Instance already exists, returning it unchanged");
                let mut outcome = InstanceOutcome::new(name, concept, OperationStatus::AlreadyExists);
                outcome.existing = Some(node);
                return Ok(outcome);
            }
            return self
                .update_instance(name, concept, requested_name, &split.data, &targets)
                .await;
        }

        // 6. New instance.
        let final_name = requested_name.as_deref().unwrap_or(name);
        if final_name != name {
            self.registry
                .ensure_available(final_name, &Label::instance())
                .await?;
        }
        self.insert_instance(final_name, concept, &concept_label, split.data, &targets, options)
            .await
    }

    async fn update_instance(
        &self,
        name: &str,
        concept: &str,
        requested_name: Option<String>,
        data: &PropertyMap,
        targets: &BTreeMap<String, ObjectTargets>,
    ) -> Result<InstanceOutcome> {
        let renamed = requested_name.is_some();
        if !renamed && data.is_empty() && targets.is_empty() {
            let mut outcome = InstanceOutcome::new(name, concept, OperationStatus::NoOp);
            outcome.existing = self.registry.get(name, Some(&Label::instance())).await?;
            return Ok(outcome);
        }

        let mut stats = WriteStats::default();
        let mut current = name.to_string();
        if let Some(new_name) = requested_name {
            self.registry
                .ensure_available(&new_name, &Label::instance())
                .await?;
            stats.merge(
                &self
                    .store
                    .rename_node(&NodeRef::instance(name), &new_name)
                    .await?,
            );
            tracing::info!(from = name, to = %new_name, "Renamed instance");
            current = new_name;
        }

        let mut update = data.clone();
        update.insert(keys::UPDATED_AT.into(), now_timestamp().into());
        stats.merge(
            &self
                .store
                .set_node_properties(&NodeRef::instance(&current), &update)
                .await?,
        );

        let status = if renamed && data.is_empty() && targets.is_empty() {
            OperationStatus::Renamed
        } else {
            OperationStatus::Updated
        };
        let mut outcome = InstanceOutcome::new(&current, concept, status);
        if renamed {
            outcome.renamed_from = Some(name.to_string());
        }

        if !targets.is_empty() {
            let (removed, links) = self
                .relationships
                .replace_object_property_relationships(&current, targets)
                .await?;
            stats.merge(&removed);
            outcome.stats = stats;
            outcome.record_targets(links);
        } else {
            outcome.stats = stats;
        }
        outcome.total_operations = 1 + outcome.object_properties_created;

        tracing::info!(instance = %current, status = %outcome.status, "Updated instance");
        Ok(outcome)
    }

    async fn insert_instance(
        &self,
        name: &str,
        concept: &str,
        concept_label: &Label,
        data: PropertyMap,
        targets: &BTreeMap<String, ObjectTargets>,
        options: &InstanceOptions,
    ) -> Result<InstanceOutcome> {
        let mut props = data;
        props.insert(keys::NAME.into(), name.into());
        props.insert(keys::INSTANCE_OF.into(), concept.into());
        add_common_properties(&mut props);

        let labels =
            LabelSet::new(Label::instance()).with_all(options.additional_labels.iter().cloned());
        let stats = self.store.merge_node(&labels, name, &props).await?;
        if stats.skipped {
            // Created concurrently since the existence check.
            tracing::warn!(instance = name, "Instance appeared before insert, skipped");
            let mut outcome = InstanceOutcome::new(name, concept, OperationStatus::AlreadyExists);
            outcome.existing = self.registry.get(name, Some(&Label::instance())).await?;
            return Ok(outcome);
        }
        tracing::info!(instance = name, concept, "Created instance");

        let mut outcome = InstanceOutcome::new(name, concept, OperationStatus::Created);
        outcome.stats = stats;

        if options.classify {
            let link = self
                .relationships
                .create_relationship(
                    &NodeRef::instance(name),
                    &NodeRef::new(concept_label.clone(), concept),
                    &RelType::is_instance_of(),
                    &PropertyMap::new(),
                )
                .await;
            match link {
                Ok(link) => {
                    outcome.auto_relationship_created = true;
                    outcome.stats.merge(&link.stats);
                }
                Err(e) => {
                    tracing::warn!(instance = name, concept, error = %e, "Instance created without IS_INSTANCE_OF");
                    outcome.relationship_error = Some(e.to_string());
                }
            }
        }

        if !targets.is_empty() {
            let links = self
                .relationships
                .create_object_property_relationships(name, targets)
                .await;
            outcome.record_targets(links);
        }

        outcome.total_operations = 1
            + usize::from(outcome.auto_relationship_created)
            + outcome.object_properties_created;
        Ok(outcome)
    }

    /// Rename an instance. Relationships stay attached to the node.
    pub async fn rename_instance(&self, old_name: &str, new_name: &str) -> Result<NodeOutcome> {
        let mut outcome = NodeOutcome {
            name: new_name.to_string(),
            label: Label::instance(),
            status: OperationStatus::NoOp,
            stats: WriteStats::default(),
            existing: None,
        };
        if old_name == new_name {
            return Ok(outcome);
        }
        if new_name.is_empty() {
            return Err(OntologyError::InvalidArgument(
                "new instance name must not be empty".into(),
            ));
        }

        let instance = Label::instance();
        if !self.registry.exists(old_name, Some(&instance)).await? {
            return Err(OntologyError::not_found(&instance, old_name));
        }
        if self.registry.exists(new_name, Some(&instance)).await? {
            return Err(Conflict::NameTaken {
                label: instance.to_string(),
                name: new_name.to_string(),
            }
            .into());
        }

        outcome.stats = self
            .store
            .rename_node(&NodeRef::instance(old_name), new_name)
            .await?;
        let mut stamp = PropertyMap::new();
        stamp.insert(keys::UPDATED_AT.into(), now_timestamp().into());
        outcome.stats.merge(
            &self
                .store
                .set_node_properties(&NodeRef::instance(new_name), &stamp)
                .await?,
        );
        outcome.status = OperationStatus::Renamed;
        tracing::info!(from = old_name, to = new_name, "Renamed instance");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_properties_keep_caller_values() {
        let mut props = PropertyMap::new();
        props.insert(keys::COMMENT.into(), "main table".into());
        add_common_properties(&mut props);

        assert_eq!(props[keys::COMMENT], "main table");
        assert_eq!(props[keys::TAG], "");
        assert!(props.contains_key(keys::CREATED_AT));
        assert_eq!(props[keys::CREATED_AT], props[keys::UPDATED_AT]);
    }

    #[test]
    fn test_default_options_validate_and_link() {
        let options = InstanceOptions::default();
        assert!(options.validate && options.classify && options.link_object_properties);
        assert!(!options.allow_update);
    }
}
