//! A Cypher statement with its parameters kept inspectable.
//!
//! `neo4rs::Query` does not expose its text or parameters once built, so store
//! failures could not be reported with the query that caused them. `Statement`
//! holds both and turns into a `Query` only at execution time.

use neo4rs::{BoltList, BoltMap, BoltNull, BoltString, BoltType};
use ontograph_core::PropertyMap;
use serde_json::Value;

/// Longest parameter value rendered verbatim in diagnostics.
const MAX_PARAM_PREVIEW: usize = 80;

/// Parameter values used by ontology statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Str(String),
    Int(i64),
    Bool(bool),
    StrList(Vec<String>),
    /// Bound as a Bolt map, e.g. for `SET n += $props`.
    Map(PropertyMap),
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<&String> for Param {
    fn from(v: &String) -> Self {
        Self::Str(v.clone())
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<String>> for Param {
    fn from(v: Vec<String>) -> Self {
        Self::StrList(v)
    }
}

impl From<&[String]> for Param {
    fn from(v: &[String]) -> Self {
        Self::StrList(v.to_vec())
    }
}

impl From<&PropertyMap> for Param {
    fn from(v: &PropertyMap) -> Self {
        Self::Map(v.clone())
    }
}

impl Param {
    fn preview(&self) -> String {
        let raw = match self {
            Self::Str(s) => format!("{s:?}"),
            Self::Int(i) => i.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::StrList(items) => format!("{items:?}"),
            Self::Map(map) => Value::Object(map.clone()).to_string(),
        };
        if raw.len() <= MAX_PARAM_PREVIEW {
            raw
        } else {
            let cut = (0..=MAX_PARAM_PREVIEW)
                .rev()
                .find(|&i| raw.is_char_boundary(i))
                .unwrap_or(0);
            format!("{}... ({} bytes)", &raw[..cut], raw.len())
        }
    }
}

/// Cypher text plus named parameters.
#[derive(Debug, Clone)]
pub struct Statement {
    cypher: String,
    params: Vec<(String, Param)>,
}

impl Statement {
    pub fn new(cypher: impl Into<String>) -> Self {
        Self {
            cypher: cypher.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<Param>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    pub fn cypher(&self) -> &str {
        &self.cypher
    }

    /// `key=value` pairs for logs and error messages; long values are truncated.
    pub fn params_summary(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{k}={}", v.preview()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn to_query(&self) -> neo4rs::Query {
        self.params
            .iter()
            .fold(neo4rs::query(&self.cypher), |q, (key, value)| match value {
                Param::Str(s) => q.param(key, s.clone()),
                Param::Int(i) => q.param(key, *i),
                Param::Bool(b) => q.param(key, *b),
                Param::StrList(items) => q.param(key, items.clone()),
                Param::Map(map) => q.param(key, map_to_bolt(map)),
            })
    }
}

/// A property map as a Bolt map.
///
/// Neo4j properties hold scalars and lists only, so objects below the top
/// level are stored as their JSON text.
pub fn map_to_bolt(props: &PropertyMap) -> BoltType {
    let mut map = BoltMap::new();
    for (key, value) in props {
        map.put(BoltString::from(key.as_str()), value_to_bolt(value));
    }
    BoltType::Map(map)
}

fn value_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => BoltType::from(s.clone()),
        Value::Array(items) => {
            let mut list = BoltList::new();
            for item in items {
                list.push(value_to_bolt(item));
            }
            BoltType::List(list)
        }
        Value::Object(_) => BoltType::from(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_summary_truncates_long_values() {
        let long = "x".repeat(500);
        let stmt = Statement::new("MATCH (n {name: $name}) SET n.comment = $comment RETURN n")
            .param("name", "t1")
            .param("comment", long)
            .param("limit", 5i64);

        let summary = stmt.params_summary();
        assert!(summary.starts_with("name=\"t1\", comment=\""));
        assert!(summary.contains("(502 bytes)"));
        assert!(summary.ends_with("limit=5"));
    }

    #[test]
    fn test_map_param_preview_is_json() {
        let mut props = PropertyMap::new();
        props.insert("rows".into(), json!(12));
        let stmt = Statement::new("MATCH (n) SET n += $props").param("props", &props);
        assert_eq!(stmt.params_summary(), r#"props={"rows":12}"#);
    }

    #[test]
    fn test_map_to_bolt_keeps_scalars_and_flattens_nested_objects() {
        let mut props = PropertyMap::new();
        props.insert("rows".into(), json!(12));
        props.insert("ratio".into(), json!(0.5));
        props.insert("tags".into(), json!(["a", "b"]));
        props.insert("meta".into(), json!({"owner": "etl"}));
        props.insert("gone".into(), Value::Null);

        let BoltType::Map(map) = map_to_bolt(&props) else {
            panic!("expected a Bolt map");
        };
        let get = |key: &str| map.value.get(&BoltString::from(key)).cloned();
        assert_eq!(get("rows"), Some(BoltType::from(12i64)));
        assert_eq!(get("ratio"), Some(BoltType::from(0.5f64)));
        assert!(matches!(get("tags"), Some(BoltType::List(l)) if l.value.len() == 2));
        assert_eq!(get("meta"), Some(BoltType::from(r#"{"owner":"etl"}"#.to_string())));
        assert!(matches!(get("gone"), Some(BoltType::Null(_))));
    }
}
