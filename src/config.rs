//! Stack configuration files
//!
//! A TOML file tunes serializer output, lint levels and the defaults baked
//! into the shared bundles. Every table and key is optional.
//!
//! ```toml
//! [output]
//! pretty = false
//!
//! [lint]
//! unused_parameters = "deny"
//!
//! [network]
//! vpc_cidr_block = "10.0.0.0/16"
//! subnet_cidr_blocks = ["10.0.0.0/24", "10.0.1.0/24"]
//!
//! [tags]
//! default_classification = "Silver"
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::bundle::{NetworkBundle, TagBundle};
use crate::resolve::{LintLevel, ResolveOptions};
use crate::serialize::SerializeConfig;
use crate::AssembleConfig;

/// Errors that can occur when loading a stack configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Everything a stack build reads from configuration
#[derive(Debug, Clone, Default)]
pub struct StackConfig {
    pub assemble: AssembleConfig,
    pub network: NetworkBundle,
    pub tags: TagBundle,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    output: Option<TomlOutput>,
    lint: Option<TomlLint>,
    network: Option<TomlNetwork>,
    tags: Option<TomlTags>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlOutput {
    pretty: Option<bool>,
    omit_empty_sections: Option<bool>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlLint {
    unused_parameters: Option<LintLevel>,
    unused_conditions: Option<LintLevel>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlNetwork {
    vpc_cidr_block: Option<String>,
    gateway_cidr_block: Option<String>,
    subnet_cidr_blocks: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlTags {
    default_classification: Option<String>,
}

impl StackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlConfig = toml::from_str(content)?;

        let mut serialize = SerializeConfig::new();
        if let Some(output) = parsed.output {
            if let Some(pretty) = output.pretty {
                serialize = serialize.with_pretty(pretty);
            }
            if let Some(omit) = output.omit_empty_sections {
                serialize = serialize.with_omit_empty_sections(omit);
            }
        }

        let mut resolve = ResolveOptions::new();
        if let Some(lint) = parsed.lint {
            if let Some(level) = lint.unused_parameters {
                resolve = resolve.with_unused_parameters(level);
            }
            if let Some(level) = lint.unused_conditions {
                resolve = resolve.with_unused_conditions(level);
            }
        }

        let mut network = NetworkBundle::new();
        if let Some(toml_network) = parsed.network {
            if let Some(block) = toml_network.vpc_cidr_block {
                network = network.with_vpc_cidr_block(block);
            }
            if let Some(block) = toml_network.gateway_cidr_block {
                network = network.with_gateway_cidr_block(block);
            }
            if let Some(blocks) = toml_network.subnet_cidr_blocks {
                network = network.with_subnet_cidr_blocks(blocks);
            }
        }

        let mut tags = TagBundle::new();
        if let Some(classification) = parsed.tags.and_then(|t| t.default_classification) {
            tags = tags.with_default_classification(classification);
        }

        Ok(StackConfig {
            assemble: AssembleConfig::new()
                .with_resolve_options(resolve)
                .with_serialize_config(serialize),
            network,
            tags,
        })
    }

    /// Turn unused parameters and conditions into errors
    pub fn with_strict_lint(mut self) -> Self {
        self.assemble.resolve = ResolveOptions::strict();
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.assemble.serialize = self.assemble.serialize.with_pretty(pretty);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_keeps_defaults() {
        let config = StackConfig::from_str("").unwrap();
        assert!(config.assemble.serialize.pretty);
        assert!(!config.assemble.serialize.omit_empty_sections);
        assert_eq!(config.assemble.resolve.unused_parameters, LintLevel::Warn);
        assert_eq!(config.network, NetworkBundle::default());
        assert_eq!(config.tags.default_classification, "Gold");
    }

    #[test]
    fn test_parse_all_tables() {
        let toml = r#"
[output]
pretty = false
omit_empty_sections = true

[lint]
unused_parameters = "deny"
unused_conditions = "allow"

[network]
vpc_cidr_block = "10.0.0.0/16"
subnet_cidr_blocks = ["10.0.0.0/24", "10.0.1.0/24"]

[tags]
default_classification = "Silver"
"#;
        let config = StackConfig::from_str(toml).unwrap();
        assert!(!config.assemble.serialize.pretty);
        assert!(config.assemble.serialize.omit_empty_sections);
        assert_eq!(config.assemble.resolve.unused_parameters, LintLevel::Deny);
        assert_eq!(config.assemble.resolve.unused_conditions, LintLevel::Allow);
        assert_eq!(config.network.vpc_cidr_block, "10.0.0.0/16");
        assert_eq!(config.network.gateway_cidr_block, "0.0.0.0/0");
        assert_eq!(config.network.zone_count(), 2);
        assert_eq!(config.tags.default_classification, "Silver");
    }

    #[test]
    fn test_invalid_lint_level() {
        let result = StackConfig::from_str("[lint]\nunused_parameters = \"loud\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = StackConfig::from_str("[output]\nindent = 4\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = StackConfig::from_file(Path::new("/nonexistent/stack.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_strict_overrides_lint() {
        let config = StackConfig::new().with_strict_lint();
        assert_eq!(config.assemble.resolve.unused_parameters, LintLevel::Deny);
        assert_eq!(config.assemble.resolve.unused_conditions, LintLevel::Deny);
    }
}
