//! In-memory view of the concept schema.
//!
//! Concepts, Property nodes, `SUBCLASS_OF` and `HAS_PROPERTY` edges are fetched
//! once per call and resolved here. Every traversal is bounded by a visited set
//! so a cyclic hierarchy never loops.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use ontograph_core::{keys, Label, PropertyMap, RelType};
use ontograph_graph::{EdgeRecord, GraphStore, NodeRecord};
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Edge keys that carry assignment metadata rather than constraint attributes.
const ASSIGNMENT_KEYS: [&str; 4] = [
    keys::REQUIRED,
    keys::DEFAULT_VALUE,
    keys::ASSIGNMENT_TYPE,
    keys::CREATED_AT,
];

/// One `HAS_PROPERTY` edge: a concept declaring a property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Declaration {
    pub concept: String,
    pub property: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Extra constraint attributes stored on the edge.
    #[serde(skip_serializing_if = "PropertyMap::is_empty")]
    pub attributes: PropertyMap,
}

impl Declaration {
    fn from_edge(edge: &EdgeRecord) -> Self {
        let attributes = edge
            .properties
            .iter()
            .filter(|(k, _)| !ASSIGNMENT_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            concept: edge.source.clone(),
            property: edge.target.clone(),
            required: edge
                .properties
                .get(keys::REQUIRED)
                .is_some_and(truthy),
            default_value: edge
                .properties
                .get(keys::DEFAULT_VALUE)
                .filter(|v| !v.is_null())
                .cloned(),
            attributes,
        }
    }
}

/// `required` is normally a boolean but older writers stored strings.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

/// The winning declaration for a property name, with its distance from the
/// queried concept (0 = declared directly).
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub declaration: &'a Declaration,
    pub distance: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaGraph {
    concepts: BTreeSet<String>,
    /// concept → direct superclasses.
    parents: BTreeMap<String, BTreeSet<String>>,
    /// concept → direct subclasses.
    children: BTreeMap<String, BTreeSet<String>>,
    /// concept → declarations, ordered by property name.
    declarations: BTreeMap<String, Vec<Declaration>>,
    /// Property node attributes by property name.
    properties: BTreeMap<String, PropertyMap>,
}

impl SchemaGraph {
    /// Fetch the schema from the store.
    pub async fn load(store: &dyn GraphStore, concept_labels: &[Label]) -> Result<Self> {
        let mut concepts = Vec::new();
        for label in concept_labels {
            concepts.extend(store.list_nodes(label).await?);
        }
        let properties = store.list_nodes(&Label::property()).await?;
        let subclass = store.relationships(&RelType::subclass_of()).await?;
        let has_property = store.relationships(&RelType::has_property()).await?;

        let schema = Self::from_records(&concepts, &properties, &subclass, &has_property);
        tracing::debug!(
            concepts = schema.concepts.len(),
            properties = schema.properties.len(),
            "Loaded concept schema"
        );
        Ok(schema)
    }

    /// Build from fetched records. Edges touching unknown concepts are ignored.
    pub fn from_records(
        concepts: &[NodeRecord],
        properties: &[NodeRecord],
        subclass_edges: &[EdgeRecord],
        has_property_edges: &[EdgeRecord],
    ) -> Self {
        let mut schema = Self {
            concepts: concepts.iter().map(|n| n.name().to_string()).collect(),
            properties: properties
                .iter()
                .map(|n| (n.name().to_string(), n.properties.clone()))
                .collect(),
            ..Self::default()
        };

        for edge in subclass_edges {
            if !schema.contains(&edge.source) || !schema.contains(&edge.target) {
                tracing::debug!(from = %edge.source, to = %edge.target, "Ignoring SUBCLASS_OF edge outside the schema");
                continue;
            }
            schema
                .parents
                .entry(edge.source.clone())
                .or_default()
                .insert(edge.target.clone());
            schema
                .children
                .entry(edge.target.clone())
                .or_default()
                .insert(edge.source.clone());
        }

        for edge in has_property_edges {
            if !schema.contains(&edge.source) {
                continue;
            }
            schema
                .declarations
                .entry(edge.source.clone())
                .or_default()
                .push(Declaration::from_edge(edge));
        }
        for decls in schema.declarations.values_mut() {
            decls.sort_by(|a, b| a.property.cmp(&b.property));
            decls.dedup_by(|a, b| a.property == b.property);
        }

        schema
    }

    pub fn contains(&self, concept: &str) -> bool {
        self.concepts.contains(concept)
    }

    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    pub fn declarations(&self, concept: &str) -> &[Declaration] {
        self.declarations
            .get(concept)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Attributes of the Property node called `name`.
    pub fn property(&self, name: &str) -> Option<&PropertyMap> {
        self.properties.get(name)
    }

    /// `concept` and every ancestor with its shortest `SUBCLASS_OF` distance,
    /// ordered by (distance, name). Empty for an unknown concept.
    pub fn lineage(&self, concept: &str) -> Vec<(String, usize)> {
        walk(concept, &self.parents, self.contains(concept))
    }

    /// Every concept reachable from `root` through subclasses, with its
    /// shortest depth, ordered by (depth, name). `root` itself is excluded.
    pub fn descendants(&self, root: &str) -> Vec<(String, usize)> {
        let mut found = walk(root, &self.children, self.contains(root));
        found.retain(|(_, depth)| *depth > 0);
        found
    }

    pub fn ancestors(&self, concept: &str) -> BTreeSet<String> {
        self.lineage(concept)
            .into_iter()
            .filter(|(_, distance)| *distance > 0)
            .map(|(name, _)| name)
            .collect()
    }

    /// Whether `candidate` is a proper ancestor of `concept`.
    pub fn is_ancestor(&self, candidate: &str, concept: &str) -> bool {
        candidate != concept && self.ancestors(concept).contains(candidate)
    }

    /// Nearest declaration for each property name across `lineage`.
    ///
    /// `lineage` must be ordered by (distance, name) so the first declaration
    /// seen wins.
    pub fn effective<'a>(&'a self, lineage: &[(String, usize)]) -> BTreeMap<&'a str, Resolved<'a>> {
        self.effective_where(lineage, |_| true)
    }

    /// [`Self::effective`] over the declarations accepted by `keep` only.
    pub fn effective_where<'a>(
        &'a self,
        lineage: &[(String, usize)],
        keep: impl Fn(&Declaration) -> bool,
    ) -> BTreeMap<&'a str, Resolved<'a>> {
        let mut resolved: BTreeMap<&'a str, Resolved<'a>> = BTreeMap::new();
        for (concept, distance) in lineage {
            for declaration in self.declarations(concept).iter().filter(|d| keep(*d)) {
                resolved
                    .entry(declaration.property.as_str())
                    .or_insert(Resolved {
                        declaration,
                        distance: *distance,
                    });
            }
        }
        resolved
    }

    /// Concepts without a superclass.
    pub fn roots(&self) -> Vec<&str> {
        self.concepts
            .iter()
            .filter(|c| self.parents.get(*c).map_or(true, BTreeSet::is_empty))
            .map(String::as_str)
            .collect()
    }

    /// Longest `SUBCLASS_OF` chain in edges. Edges closing a cycle do not count.
    pub fn max_depth(&self) -> usize {
        let mut memo: BTreeMap<&str, usize> = BTreeMap::new();
        let mut in_progress = BTreeSet::new();
        self.concepts
            .iter()
            .map(|c| self.depth_of(c, &mut memo, &mut in_progress))
            .max()
            .unwrap_or(0)
    }

    fn depth_of<'a>(
        &'a self,
        concept: &'a str,
        memo: &mut BTreeMap<&'a str, usize>,
        in_progress: &mut BTreeSet<&'a str>,
    ) -> usize {
        if let Some(depth) = memo.get(concept) {
            return *depth;
        }
        if !in_progress.insert(concept) {
            return 0;
        }
        let mut depth = 0;
        if let Some(parents) = self.parents.get(concept) {
            for parent in parents {
                if in_progress.contains(parent.as_str()) {
                    continue;
                }
                depth = depth.max(1 + self.depth_of(parent, memo, in_progress));
            }
        }
        in_progress.remove(concept);
        memo.insert(concept, depth);
        depth
    }

    /// Subclass cycles, each rotated to start at its smallest name.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut found = BTreeSet::new();
        let mut done = BTreeSet::new();
        for start in &self.concepts {
            if done.contains(start.as_str()) {
                continue;
            }
            let mut stack = Vec::new();
            self.find_cycles(start, &mut stack, &mut done, &mut found);
        }
        found.into_iter().collect()
    }

    fn find_cycles<'a>(
        &'a self,
        concept: &'a str,
        stack: &mut Vec<&'a str>,
        done: &mut BTreeSet<&'a str>,
        found: &mut BTreeSet<Vec<String>>,
    ) {
        stack.push(concept);
        if let Some(parents) = self.parents.get(concept) {
            for parent in parents {
                if let Some(pos) = stack.iter().position(|c| *c == parent.as_str()) {
                    found.insert(normalize_cycle(&stack[pos..]));
                } else if !done.contains(parent.as_str()) {
                    self.find_cycles(parent, stack, done, found);
                }
            }
        }
        stack.pop();
        done.insert(concept);
    }
}

/// Breadth-first walk over `edges` recording the shortest distance to each
/// reached node.
fn walk(
    start: &str,
    edges: &BTreeMap<String, BTreeSet<String>>,
    known: bool,
) -> Vec<(String, usize)> {
    if !known {
        return Vec::new();
    }
    let mut distances: BTreeMap<String, usize> = BTreeMap::new();
    let mut queue = VecDeque::new();
    distances.insert(start.to_string(), 0);
    queue.push_back((start.to_string(), 0));

    while let Some((node, distance)) = queue.pop_front() {
        let Some(next) = edges.get(&node) else {
            continue;
        };
        for neighbor in next {
            if !distances.contains_key(neighbor) {
                distances.insert(neighbor.clone(), distance + 1);
                queue.push_back((neighbor.clone(), distance + 1));
            }
        }
    }

    let mut ordered: Vec<(String, usize)> = distances.into_iter().collect();
    ordered.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));
    ordered
}

fn normalize_cycle(cycle: &[&str]) -> Vec<String> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, name)| **name)
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[start..]
        .iter()
        .chain(&cycle[..start])
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn concept(name: &str) -> NodeRecord {
        let mut properties = PropertyMap::new();
        properties.insert(keys::NAME.into(), json!(name));
        NodeRecord {
            labels: vec!["Concept".into()],
            properties,
        }
    }

    fn edge(rel: &str, from: &str, to: &str, props: Value) -> EdgeRecord {
        EdgeRecord {
            rel_type: rel.into(),
            source: from.into(),
            target: to.into(),
            properties: props.as_object().cloned().unwrap_or_default(),
        }
    }

    fn sub(from: &str, to: &str) -> EdgeRecord {
        edge("SUBCLASS_OF", from, to, json!({}))
    }

    fn has(concept: &str, property: &str, required: bool) -> EdgeRecord {
        edge(
            "HAS_PROPERTY",
            concept,
            property,
            json!({"required": required, "assignment_type": "direct", "min": 1}),
        )
    }

    /// ```text
    /// Asset <- DataAsset <- Table
    ///            ^
    /// Governed --+ (Table also SUBCLASS_OF Governed)
    /// ```
    fn build_schema() -> SchemaGraph {
        let concepts: Vec<NodeRecord> = ["Asset", "DataAsset", "Governed", "Table"]
            .into_iter()
            .map(concept)
            .collect();
        SchemaGraph::from_records(
            &concepts,
            &[],
            &[
                sub("DataAsset", "Asset"),
                sub("Table", "DataAsset"),
                sub("Table", "Governed"),
            ],
            &[
                has("Asset", "owner", true),
                has("DataAsset", "owner", false),
                has("Governed", "steward", true),
                has("Table", "rows", true),
            ],
        )
    }

    #[test]
    fn test_lineage_orders_by_distance_then_name() {
        let schema = build_schema();
        let lineage = schema.lineage("Table");
        assert_eq!(
            lineage,
            vec![
                ("Table".to_string(), 0),
                ("DataAsset".to_string(), 1),
                ("Governed".to_string(), 1),
                ("Asset".to_string(), 2),
            ]
        );
        assert!(schema.lineage("Unknown").is_empty());
    }

    #[test]
    fn test_effective_prefers_nearest_declaration() {
        let schema = build_schema();
        let effective = schema.effective(&schema.lineage("Table"));

        let owner = effective["owner"];
        assert_eq!(owner.declaration.concept, "DataAsset");
        assert!(!owner.declaration.required);
        assert_eq!(owner.distance, 1);
        assert_eq!(effective["rows"].distance, 0);
        assert_eq!(effective.len(), 3);
    }

    #[test]
    fn test_declaration_attributes_exclude_assignment_keys() {
        let schema = build_schema();
        let decl = &schema.declarations("Table")[0];
        assert_eq!(decl.attributes.len(), 1);
        assert_eq!(decl.attributes["min"], json!(1));
    }

    #[test]
    fn test_descendants_and_roots() {
        let schema = build_schema();
        assert_eq!(
            schema.descendants("Asset"),
            vec![("DataAsset".to_string(), 1), ("Table".to_string(), 2)]
        );
        assert_eq!(schema.roots(), vec!["Asset", "Governed"]);
        assert_eq!(schema.max_depth(), 2);
        assert!(schema.is_ancestor("Asset", "Table"));
        assert!(!schema.is_ancestor("Table", "Asset"));
    }

    #[test]
    fn test_cycle_detection_terminates() {
        let concepts: Vec<NodeRecord> = ["A", "B", "C"].into_iter().map(concept).collect();
        let schema = SchemaGraph::from_records(
            &concepts,
            &[],
            &[sub("A", "B"), sub("B", "C"), sub("C", "A")],
            &[has("C", "x", true)],
        );

        assert_eq!(
            schema.cycles(),
            vec![vec!["A".to_string(), "B".to_string(), "C".to_string()]]
        );
        assert_eq!(schema.lineage("A").len(), 3);
        assert!(schema.roots().is_empty());
        assert!(schema.max_depth() <= 2);
        assert!(schema.effective(&schema.lineage("B")).contains_key("x"));
    }

    #[test]
    fn test_truthy_accepts_legacy_strings() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!("True")));
        assert!(!truthy(&json!("no")));
        assert!(!truthy(&Value::Null));
    }
}
