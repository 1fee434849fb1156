//! Neo4j connection management and shared graph client.

use neo4rs::{ConfigBuilder, Graph};
use serde::Deserialize;

use ontograph_core::CoreError;

use crate::statement::Statement;

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Statement failed: {source} | cypher: {cypher} | params: {params}")]
    Statement {
        cypher: String,
        params: String,
        #[source]
        source: neo4rs::Error,
    },

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String, cypher: String },

    #[error("Node not found: {label} named '{name}'")]
    NotFound { label: String, name: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Identifier(#[from] CoreError),
}

impl GraphError {
    /// Wrap a driver failure with the statement that produced it.
    pub(crate) fn from_statement(stmt: &Statement, source: neo4rs::Error) -> Self {
        let message = source.to_string();
        if is_constraint_message(&message) {
            return Self::ConstraintViolation {
                message,
                cypher: stmt.cypher().to_string(),
            };
        }
        Self::Statement {
            cypher: stmt.cypher().to_string(),
            params: stmt.params_summary(),
            source,
        }
    }

    /// True for uniqueness violations of the "already exists" kind.
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::ConstraintViolation { message, .. } => is_constraint_message(message),
            _ => false,
        }
    }
}

fn is_constraint_message(message: &str) -> bool {
    message.contains("ConstraintValidationFailed") || message.contains("already exists")
}

/// Configuration for connecting to Neo4j.
///
/// Loaded from the `[graph]` section of `ontograph.toml` or
/// `ONTOGRAPH_GRAPH__*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Target database; the server default when unset.
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "ontograph-dev".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            database: None,
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

/// Thread-safe Neo4j graph client with connection pooling.
///
/// Clone is cheap (inner Arc). The pool is released when the last clone is
/// dropped or `close` is called.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let mut builder = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size);
        if let Some(db) = config.database.as_deref() {
            builder = builder.db(db);
        }
        let neo_config = builder
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Release this handle. Pooled connections close once every clone is gone.
    pub fn close(self) {
        tracing::info!("Closing Neo4j client");
        drop(self.graph);
    }

    /// Execute a statement, discarding any result rows.
    pub async fn run(&self, stmt: &Statement) -> Result<(), GraphError> {
        tracing::trace!(cypher = stmt.cypher(), "Running statement");
        self.graph
            .run(stmt.to_query())
            .await
            .map_err(|e| GraphError::from_statement(stmt, e))
    }

    /// Execute a statement and collect all rows.
    pub async fn query_rows(&self, stmt: &Statement) -> Result<Vec<neo4rs::Row>, GraphError> {
        tracing::trace!(cypher = stmt.cypher(), "Querying rows");
        let mut stream = self
            .graph
            .execute(stmt.to_query())
            .await
            .map_err(|e| GraphError::from_statement(stmt, e))?;
        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| GraphError::from_statement(stmt, e))?
        {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a statement and return the first row, if any.
    pub async fn query_one(&self, stmt: &Statement) -> Result<Option<neo4rs::Row>, GraphError> {
        let mut stream = self
            .graph
            .execute(stmt.to_query())
            .await
            .map_err(|e| GraphError::from_statement(stmt, e))?;
        stream
            .next()
            .await
            .map_err(|e| GraphError::from_statement(stmt, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_config_defaults_fill_missing_fields() {
        let cfg: GraphConfig =
            serde_json::from_str(r#"{"uri": "bolt://graph:7687"}"#).unwrap();
        assert_eq!(cfg.uri, "bolt://graph:7687");
        assert_eq!(cfg.user, "neo4j");
        assert_eq!(cfg.max_connections, 16);
        assert!(cfg.database.is_none());
    }

    #[test]
    fn test_driver_errors_carry_their_statement() {
        let stmt = Statement::new("MATCH (n {name: $name}) RETURN n").param("name", "t1");
        let driver = neo4rs::Error::from(std::io::Error::other("connection reset"));

        let err = GraphError::from_statement(&stmt, driver);
        assert!(!err.is_already_exists());
        match err {
            GraphError::Statement { cypher, params, .. } => {
                assert_eq!(cypher, stmt.cypher());
                assert_eq!(params, "name=\"t1\"");
            }
            other => panic!("expected a statement error, got {other:?}"),
        }
    }

    #[test]
    fn test_constraint_message_detection() {
        assert!(is_constraint_message(
            "Neo.ClientError.Schema.ConstraintValidationFailed: Node(12) already exists"
        ));
        assert!(!is_constraint_message("Neo.ClientError.Statement.SyntaxError"));
    }
}
