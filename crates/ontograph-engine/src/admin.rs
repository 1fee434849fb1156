//! Ontology administration: uniqueness constraints, summary statistics,
//! hierarchy listing, node inspection, search, and whole-graph health checks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ontograph_core::{Identifier, Label, NodeRef, RelType};
use ontograph_graph::{GraphStore, Neighborhood, NodeRecord};
use serde::Serialize;

use crate::config::OntologyConfig;
use crate::error::{OntologyError, Result};
use crate::inheritance::InheritanceResolver;
use crate::registry::NameRegistry;

/// Names listed in a finding's `sample`.
const SAMPLE_SIZE: usize = 5;

/// Per-label result of a constraint sweep. `failed` maps label to error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstraintReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: BTreeMap<String, String>,
}

impl ConstraintReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OntologySummary {
    pub total_nodes: u64,
    pub total_relationships: u64,
    pub node_counts_by_label: BTreeMap<String, u64>,
    pub relationship_counts_by_type: BTreeMap<String, u64>,
    pub concepts_count: usize,
    pub instances_count: u64,
    pub properties_count: u64,
    pub max_hierarchy_depth: usize,
    pub subclass_cycles: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyRow {
    pub root: String,
    pub child: String,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDetails {
    pub label: Label,
    #[serde(flatten)]
    pub neighborhood: Neighborhood,
    pub total_relationships: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    OrphanedNodes,
    UntypedInstances,
    CircularSubclass,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub count: usize,
    pub message: String,
    pub sample: Vec<String>,
}

impl Finding {
    fn new(kind: FindingKind, names: Vec<String>, message: String) -> Self {
        Self {
            kind,
            count: names.len(),
            message,
            sample: names.into_iter().take(SAMPLE_SIZE).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatistics {
    pub total_nodes: u64,
    pub orphaned_nodes: usize,
    pub untyped_instances: usize,
    pub circular_references: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OntologyHealth {
    /// False when any issue was found. Warnings do not affect it.
    pub valid: bool,
    pub issues: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub statistics: HealthStatistics,
}

#[derive(Clone)]
pub struct OntologyAdmin {
    store: Arc<dyn GraphStore>,
    config: OntologyConfig,
    registry: NameRegistry,
    resolver: InheritanceResolver,
}

impl OntologyAdmin {
    pub fn new(
        store: Arc<dyn GraphStore>,
        config: OntologyConfig,
        registry: NameRegistry,
        resolver: InheritanceResolver,
    ) -> Self {
        Self {
            store,
            config,
            registry,
            resolver,
        }
    }

    // ── Constraints ──────────────────────────────────────────────

    /// Declare `name` unique on every configured label, continuing past
    /// per-label failures.
    pub async fn setup_uniqueness_constraints(&self) -> ConstraintReport {
        self.constraint_sweep(false).await
    }

    pub async fn drop_uniqueness_constraints(&self) -> ConstraintReport {
        self.constraint_sweep(true).await
    }

    async fn constraint_sweep(&self, drop: bool) -> ConstraintReport {
        let mut report = ConstraintReport::default();
        let field = Identifier::name();
        for label in &self.config.labels_to_constrain {
            let result = if drop {
                self.store.drop_unique_constraint(label, &field).await
            } else {
                self.store.declare_unique_constraint(label, &field).await
            };
            match result {
                Ok(stats) if stats.skipped => report.skipped.push(label.to_string()),
                Ok(_) => report.applied.push(label.to_string()),
                Err(e) => {
                    tracing::warn!(label = %label, drop, error = %e, "Uniqueness constraint change failed");
                    report.failed.insert(label.to_string(), e.to_string());
                }
            }
        }
        tracing::info!(
            drop,
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Uniqueness constraint sweep finished"
        );
        report
    }

    // ── Inspection ───────────────────────────────────────────────

    pub async fn summary(&self) -> Result<OntologySummary> {
        let schema = self.resolver.load_schema().await?;
        let summary = OntologySummary {
            total_nodes: self.store.count_nodes(None).await?,
            total_relationships: self.store.count_relationships().await?,
            node_counts_by_label: self.store.label_counts().await?,
            relationship_counts_by_type: self.store.relationship_type_counts().await?,
            concepts_count: schema.concept_count(),
            instances_count: self.store.count_nodes(Some(&Label::instance())).await?,
            properties_count: self.store.count_nodes(Some(&Label::property())).await?,
            max_hierarchy_depth: schema.max_depth(),
            subclass_cycles: schema.cycles().len(),
        };
        tracing::info!(nodes = summary.total_nodes, "Generated ontology summary");
        Ok(summary)
    }

    /// Every (ancestor, descendant, depth) row below `root`, or below each
    /// concept without a superclass when `root` is absent.
    pub async fn concept_hierarchy(&self, root: Option<&str>) -> Result<Vec<HierarchyRow>> {
        let schema = self.resolver.load_schema().await?;
        let roots: Vec<&str> = match root {
            Some(root) if !schema.contains(root) => {
                return Err(OntologyError::not_found("concept", root))
            }
            Some(root) => vec![root],
            None => schema.roots(),
        };

        let rows: Vec<HierarchyRow> = roots
            .into_iter()
            .flat_map(|r| {
                schema
                    .descendants(r)
                    .into_iter()
                    .map(move |(child, depth)| HierarchyRow {
                        root: r.to_string(),
                        child,
                        depth,
                    })
            })
            .collect();
        tracing::debug!(rows = rows.len(), "Retrieved concept hierarchy");
        Ok(rows)
    }

    /// A node with its incoming and outgoing relationships.
    pub async fn node_details(&self, name: &str, label: Option<&Label>) -> Result<NodeDetails> {
        let label = self.registry.resolve_label(name, label).await?;
        let neighborhood = self
            .store
            .node_relationships(&NodeRef::new(label.clone(), name))
            .await?
            .ok_or_else(|| OntologyError::not_found(&label, name))?;
        Ok(NodeDetails {
            total_relationships: neighborhood.incoming.len() + neighborhood.outgoing.len(),
            label,
            neighborhood,
        })
    }

    /// Nodes whose name contains `term`, ordered by name.
    pub async fn search_nodes(
        &self,
        term: &str,
        label: Option<&Label>,
        limit: usize,
    ) -> Result<Vec<NodeRecord>> {
        if term.is_empty() {
            return Err(OntologyError::InvalidArgument(
                "search term must not be empty".into(),
            ));
        }
        let found = self.store.search_nodes(term, label, limit.max(1)).await?;
        tracing::debug!(term, results = found.len(), "Searched nodes");
        Ok(found)
    }

    // ── Health ───────────────────────────────────────────────────

    pub async fn validate_ontology(&self) -> Result<OntologyHealth> {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        let orphans: Vec<String> = self
            .store
            .orphan_nodes()
            .await?
            .iter()
            .map(|n| n.name().to_string())
            .collect();
        let orphaned = orphans.len();
        if orphaned > 0 {
            warnings.push(Finding::new(
                FindingKind::OrphanedNodes,
                orphans,
                format!("Found {orphaned} orphaned nodes"),
            ));
        }

        let typed: BTreeSet<String> = self
            .store
            .relationships(&RelType::is_instance_of())
            .await?
            .into_iter()
            .map(|e| e.source)
            .collect();
        let untyped: Vec<String> = self
            .store
            .list_nodes(&Label::instance())
            .await?
            .iter()
            .map(|n| n.name().to_string())
            .filter(|name| !typed.contains(name))
            .collect();
        let untyped_count = untyped.len();
        if untyped_count > 0 {
            issues.push(Finding::new(
                FindingKind::UntypedInstances,
                untyped,
                format!("Found {untyped_count} instances without concept relationships"),
            ));
        }

        let cycles = self.resolver.load_schema().await?.cycles();
        let circular = cycles.len();
        if circular > 0 {
            issues.push(Finding::new(
                FindingKind::CircularSubclass,
                cycles.iter().map(|c| c.join(" -> ")).collect(),
                format!("Found {circular} circular subclass relationships"),
            ));
        }

        let health = OntologyHealth {
            valid: issues.is_empty(),
            issues,
            warnings,
            statistics: HealthStatistics {
                total_nodes: self.store.count_nodes(None).await?,
                orphaned_nodes: orphaned,
                untyped_instances: untyped_count,
                circular_references: circular,
            },
        };
        tracing::info!(valid = health.valid, "Ontology validation completed");
        Ok(health)
    }
}
