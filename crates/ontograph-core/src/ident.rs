//! Validated identifiers that are allowed to appear verbatim in Cypher text.
//!
//! Node names and property values always travel as query parameters. Labels,
//! relationship types, and constraint fields cannot be parameterized in Cypher,
//! so they are only ever interpolated through these types, which accept
//! `[A-Za-z_][A-Za-z0-9_]*` and nothing else.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const MAX_IDENTIFIER_LEN: usize = 128;

fn check_identifier(kind: &'static str, value: &str) -> Result<(), CoreError> {
    let reject = |reason| CoreError::InvalidIdentifier {
        kind,
        value: value.to_string(),
        reason,
    };

    if value.is_empty() {
        return Err(reject("must not be empty"));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(reject("exceeds 128 characters"));
    }

    let mut chars = value.chars();
    if let Some(first) = chars.next() {
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(reject("must start with an ASCII letter or underscore"));
        }
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(reject("may only contain ASCII letters, digits, and underscores"));
    }
    Ok(())
}

macro_rules! identifier_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap an identifier.
            pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
                let value = value.into();
                check_identifier($kind, &value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = CoreError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

identifier_type!(
    /// A node label such as `Concept` or `Instance`.
    Label,
    "label"
);

identifier_type!(
    /// A relationship type such as `SUBCLASS_OF`.
    RelType,
    "relationship type"
);

identifier_type!(
    /// A property key used in schema statements (e.g. a constraint field).
    Identifier,
    "identifier"
);

// ── Well-known ontology labels ───────────────────────────────────

impl Label {
    fn known(value: &'static str) -> Self {
        debug_assert!(check_identifier("label", value).is_ok());
        Self(value.to_string())
    }

    pub fn concept() -> Self {
        Self::known("Concept")
    }

    pub fn class() -> Self {
        Self::known("Class")
    }

    pub fn instance() -> Self {
        Self::known("Instance")
    }

    pub fn property() -> Self {
        Self::known("Property")
    }

    pub fn individual() -> Self {
        Self::known("Individual")
    }
}

// ── Well-known relationship types ────────────────────────────────

impl RelType {
    fn known(value: &'static str) -> Self {
        debug_assert!(check_identifier("relationship type", value).is_ok());
        Self(value.to_string())
    }

    pub fn subclass_of() -> Self {
        Self::known("SUBCLASS_OF")
    }

    pub fn has_property() -> Self {
        Self::known("HAS_PROPERTY")
    }

    pub fn is_instance_of() -> Self {
        Self::known("IS_INSTANCE_OF")
    }

    pub fn instance_of() -> Self {
        Self::known("INSTANCE_OF")
    }

    pub fn is_object_field_of() -> Self {
        Self::known("ISOBJECTFIELDOF")
    }

    /// Derive the relationship type that realizes an ObjectProperty.
    ///
    /// The property name is uppercased with spaces and hyphens mapped to
    /// underscores; anything else outside the identifier alphabet is rejected.
    pub fn from_property_name(property: &str) -> Result<Self, CoreError> {
        let sanitized: String = property
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();
        Self::new(sanitized)
    }
}

impl Identifier {
    pub fn name() -> Self {
        Self("name".to_string())
    }
}

// ── Label sets ───────────────────────────────────────────────────

/// A primary label plus any number of secondary labels, without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    primary: Label,
    secondary: Vec<Label>,
}

impl LabelSet {
    pub fn new(primary: Label) -> Self {
        Self {
            primary,
            secondary: Vec::new(),
        }
    }

    /// Add a secondary label; duplicates of existing labels are ignored.
    pub fn with(mut self, label: Label) -> Self {
        if label != self.primary && !self.secondary.contains(&label) {
            self.secondary.push(label);
        }
        self
    }

    pub fn with_all(self, labels: impl IntoIterator<Item = Label>) -> Self {
        labels.into_iter().fold(self, LabelSet::with)
    }

    pub fn primary(&self) -> &Label {
        &self.primary
    }

    pub fn secondary(&self) -> &[Label] {
        &self.secondary
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        std::iter::once(&self.primary).chain(self.secondary.iter())
    }

    pub fn len(&self) -> usize {
        1 + self.secondary.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Render as a Cypher label expression, e.g. `Instance:Table`.
    pub fn cypher(&self) -> String {
        self.iter()
            .map(Label::as_str)
            .collect::<Vec<_>>()
            .join(":")
    }
}

// ── Node references ──────────────────────────────────────────────

/// Identifies a node by its primary label and `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub label: Label,
    pub name: String,
}

impl NodeRef {
    pub fn new(label: Label, name: impl Into<String>) -> Self {
        Self {
            label,
            name: name.into(),
        }
    }

    pub fn instance(name: impl Into<String>) -> Self {
        Self::new(Label::instance(), name)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(:{} {{name: '{}'}})", self.label, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_accepts_identifier_alphabet() {
        assert!(Label::new("Concept").is_ok());
        assert!(Label::new("_private").is_ok());
        assert!(Label::new("Table2").is_ok());
    }

    #[test]
    fn test_label_rejects_injection() {
        assert!(Label::new("").is_err());
        assert!(Label::new("1Concept").is_err());
        assert!(Label::new("Concept) DETACH DELETE (n").is_err());
        assert!(Label::new("Concept`").is_err());
        assert!(Label::new("a".repeat(200)).is_err());
    }

    #[test]
    fn test_rel_type_from_property_name() {
        let rel = RelType::from_property_name("belongsToDataSource").unwrap();
        assert_eq!(rel.as_str(), "BELONGSTODATASOURCE");

        let rel = RelType::from_property_name("has part-of").unwrap();
        assert_eq!(rel.as_str(), "HAS_PART_OF");

        assert!(RelType::from_property_name("owns]->(x").is_err());
    }

    #[test]
    fn test_label_set_dedups_and_renders() {
        let set = LabelSet::new(Label::instance())
            .with(Label::new("Table").unwrap())
            .with(Label::instance())
            .with(Label::new("Table").unwrap());

        assert_eq!(set.len(), 2);
        assert_eq!(set.cypher(), "Instance:Table");
    }

    #[test]
    fn test_label_serde_validates() {
        let ok: Label = serde_json::from_str("\"Concept\"").unwrap();
        assert_eq!(ok, Label::concept());

        let bad: Result<Label, _> = serde_json::from_str("\"Bad Label\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_node_ref_display() {
        let node = NodeRef::instance("t1");
        assert_eq!(node.to_string(), "(:Instance {name: 't1'})");
    }
}
