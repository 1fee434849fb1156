use thiserror::Error;

/// Errors shared by every ontograph crate.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Unknown property type: {0}")]
    UnknownPropertyType(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
