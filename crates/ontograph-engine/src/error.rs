//! Error types for the ontograph-engine crate.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::validation::ValidationReport;

/// A name or relationship clash the caller must resolve.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    #[error("name '{name}' matches several nodes ({}); pass an explicit label", .candidates.join(" | "))]
    AmbiguousName {
        name: String,
        candidates: Vec<String>,
    },

    #[error("{label} '{name}' already exists")]
    NameTaken { label: String, name: String },

    #[error("{0}")]
    RelationshipExists(String),
}

/// An ObjectProperty value naming an instance that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingTarget {
    pub property: String,
    pub target: String,
}

impl fmt::Display for MissingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' -> '{}'", self.property, self.target)
    }
}

fn list_targets(targets: &[MissingTarget]) -> String {
    targets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum OntologyError {
    #[error("{label} '{name}' not found")]
    NotFound { label: String, name: String },

    #[error("Conflict: {0}")]
    Conflict(#[from] Conflict),

    #[error("Concept '{concept}' ({label}) does not exist; cannot create '{dependent}' for it")]
    MissingConcept {
        concept: String,
        label: String,
        dependent: String,
    },

    #[error("ObjectProperty target instances not found: {}", list_targets(.0))]
    MissingTarget(Vec<MissingTarget>),

    #[error("{0}")]
    Validation(Box<ValidationReport>),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Store failure: {0}")]
    Store(#[from] ontograph_graph::GraphError),

    #[error(transparent)]
    Core(#[from] ontograph_core::CoreError),
}

/// Coarse error category, stable for callers that branch on failure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    MissingConcept,
    MissingTarget,
    Validation,
    InvalidArgument,
    StoreFailure,
}

impl OntologyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::MissingConcept { .. } => ErrorKind::MissingConcept,
            Self::MissingTarget(_) => ErrorKind::MissingTarget,
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidArgument(_) | Self::Core(_) => ErrorKind::InvalidArgument,
            Self::Store(_) => ErrorKind::StoreFailure,
        }
    }

    pub(crate) fn not_found(label: impl fmt::Display, name: &str) -> Self {
        Self::NotFound {
            label: label.to_string(),
            name: name.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OntologyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_target_lists_every_target() {
        let err = OntologyError::MissingTarget(vec![
            MissingTarget {
                property: "belongsTo".into(),
                target: "db1".into(),
            },
            MissingTarget {
                property: "belongsTo".into(),
                target: "db2".into(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("'belongsTo' -> 'db1'"));
        assert!(msg.contains("'belongsTo' -> 'db2'"));
        assert_eq!(err.kind(), ErrorKind::MissingTarget);
    }

    #[test]
    fn test_ambiguous_name_message() {
        let err: OntologyError = Conflict::AmbiguousName {
            name: "Table".into(),
            candidates: vec!["Concept".into(), "Instance".into()],
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("Concept | Instance"));
    }
}
