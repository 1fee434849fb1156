//! Core value types shared by the graph store and the ontology engine.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Node and relationship properties, in insertion order as received.
pub type PropertyMap = serde_json::Map<String, serde_json::Value>;

/// Well-known property keys written by the ontology layer.
pub mod keys {
    pub const NAME: &str = "name";
    pub const COMMENT: &str = "comment";
    pub const TAG: &str = "tag";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
    pub const INSTANCE_OF: &str = "instance_of";
    pub const PROPERTY_TYPE: &str = "property_type";
    pub const PROPERTY_NAME: &str = "property_name";
    pub const DOMAIN: &str = "domain";
    pub const RANGE: &str = "range";
    pub const REQUIRED: &str = "required";
    pub const DEFAULT_VALUE: &str = "default_value";
    pub const ASSIGNMENT_TYPE: &str = "assignment_type";
    pub const PROPERTY: &str = "property";
    pub const SEMANTIC_TYPE: &str = "semantic_type";
    pub const CONFIDENCE: &str = "confidence";
    pub const WEIGHT: &str = "weight";
}

/// RFC 3339 timestamp for `created_at` / `updated_at`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

// ── Property typing ──────────────────────────────────────────────

/// How a property is realized on an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// Scalar attribute stored directly on the node.
    DataProperty,
    /// Typed relationship to another instance.
    ObjectProperty,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataProperty => "DataProperty",
            Self::ObjectProperty => "ObjectProperty",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DataProperty" => Ok(Self::DataProperty),
            "ObjectProperty" => Ok(Self::ObjectProperty),
            other => Err(CoreError::UnknownPropertyType(other.to_string())),
        }
    }
}

// ── Write statistics ─────────────────────────────────────────────

/// Summary of what a write changed in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteStats {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub properties_set: u64,
    pub labels_added: u64,
    pub labels_removed: u64,
    pub indexes_added: u64,
    pub indexes_removed: u64,
    pub constraints_added: u64,
    pub constraints_removed: u64,
    /// The write was not applied because its target already existed.
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl WriteStats {
    /// A soft "nothing written" result carrying a reason.
    pub fn skipped(warning: impl Into<String>) -> Self {
        Self {
            skipped: true,
            warning: Some(warning.into()),
            ..Self::default()
        }
    }

    /// True when the write changed nothing.
    pub fn is_noop(&self) -> bool {
        self.total_changes() == 0
    }

    pub fn total_changes(&self) -> u64 {
        self.nodes_created
            + self.nodes_deleted
            + self.relationships_created
            + self.relationships_deleted
            + self.properties_set
            + self.labels_added
            + self.labels_removed
            + self.indexes_added
            + self.indexes_removed
            + self.constraints_added
            + self.constraints_removed
    }

    /// Accumulate another write's counters. The first warning seen is kept.
    pub fn merge(&mut self, other: &WriteStats) {
        self.nodes_created += other.nodes_created;
        self.nodes_deleted += other.nodes_deleted;
        self.relationships_created += other.relationships_created;
        self.relationships_deleted += other.relationships_deleted;
        self.properties_set += other.properties_set;
        self.labels_added += other.labels_added;
        self.labels_removed += other.labels_removed;
        self.indexes_added += other.indexes_added;
        self.indexes_removed += other.indexes_removed;
        self.constraints_added += other.constraints_added;
        self.constraints_removed += other.constraints_removed;
        self.skipped |= other.skipped;
        if self.warning.is_none() {
            self.warning.clone_from(&other.warning);
        }
    }
}

// ── Operation status ─────────────────────────────────────────────

/// Terminal state of a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Created,
    Updated,
    AlreadyExists,
    Renamed,
    Deleted,
    NotFound,
    NoOp,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::AlreadyExists => "already_exists",
            Self::Renamed => "renamed",
            Self::Deleted => "deleted",
            Self::NotFound => "not_found",
            Self::NoOp => "no_op",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_type_parse() {
        assert_eq!(
            "ObjectProperty".parse::<PropertyType>().unwrap(),
            PropertyType::ObjectProperty
        );
        assert!("objectproperty".parse::<PropertyType>().is_err());
    }

    #[test]
    fn test_write_stats_merge() {
        let mut total = WriteStats {
            nodes_created: 1,
            properties_set: 4,
            ..Default::default()
        };
        total.merge(&WriteStats {
            relationships_created: 2,
            ..Default::default()
        });
        total.merge(&WriteStats::skipped("edge already exists"));

        assert_eq!(total.nodes_created, 1);
        assert_eq!(total.relationships_created, 2);
        assert_eq!(total.total_changes(), 7);
        assert!(total.skipped);
        assert_eq!(total.warning.as_deref(), Some("edge already exists"));
    }

    #[test]
    fn test_status_serde_is_snake_case() {
        let json = serde_json::to_string(&OperationStatus::AlreadyExists).unwrap();
        assert_eq!(json, "\"already_exists\"");
    }
}
