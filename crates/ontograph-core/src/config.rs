//! Configuration management for ontograph services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`ONTOGRAPH_` prefix, `__` as the section separator)
//! 2. Config file (`ontograph.toml` by default)
//! 3. Defaults provided by each section's `Default` impl

use serde::de::DeserializeOwned;

use crate::error::CoreError;

/// Environment variable prefix, e.g. `ONTOGRAPH_GRAPH__URI`.
pub const ENV_PREFIX: &str = "ONTOGRAPH";

/// Default config file prefix (resolves `ontograph.toml`, `ontograph.yaml`, ...).
pub const DEFAULT_FILE_PREFIX: &str = "ontograph";

/// Build the layered configuration source for `file_prefix`.
pub fn load_layered(file_prefix: &str) -> Result<config::Config, CoreError> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ontology.labels_to_constrain")
                .with_list_parse_key("ontology.concept_labels"),
        )
        .build()?;
    Ok(cfg)
}

/// Deserialize one `[section]` of the layered config.
///
/// An absent section yields `T::default()`; a present but malformed section is an error.
pub fn load_section<T>(cfg: &config::Config, section: &str) -> Result<T, CoreError>
where
    T: DeserializeOwned + Default,
{
    match cfg.get::<T>(section) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(section, "Config section absent, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Section {
        #[serde(default = "default_size")]
        size: usize,
    }

    fn default_size() -> usize {
        7
    }

    impl Default for Section {
        fn default() -> Self {
            Self {
                size: default_size(),
            }
        }
    }

    #[test]
    fn test_missing_section_uses_default() {
        let cfg = config::Config::builder().build().unwrap();
        let section: Section = load_section(&cfg, "absent").unwrap();
        assert_eq!(section, Section::default());
    }

    #[test]
    fn test_present_section_is_parsed() {
        let cfg = config::Config::builder()
            .set_override("demo.size", 3)
            .unwrap()
            .build()
            .unwrap();
        let section: Section = load_section(&cfg, "demo").unwrap();
        assert_eq!(section.size, 3);
    }
}
