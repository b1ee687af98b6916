//! Stack Assembler - typed construction of provisioning templates
//!
//! Declarations (parameters, conditions, resources, outputs) are registered
//! into a [`Document`], cross-referenced through symbolic handles, resolved in
//! one pass and serialized as a deterministic JSON template.
//!
//! # Example
//!
//! ```rust
//! use stack_assembler::{assemble, attributes, Document, ParameterSpec};
//!
//! let mut doc = Document::new("One bucket");
//! let name = doc.declare_parameter("bucketName", ParameterSpec::string()).unwrap();
//! let bucket = doc
//!     .declare_resource("Bucket", "AWS::S3::Bucket", attributes! { "BucketName" => &name })
//!     .unwrap();
//! doc.declare_output("bucketArn", bucket.attribute("Arn")).unwrap();
//!
//! let json = assemble(&doc).unwrap();
//! assert!(json.contains(r#""Ref": "bucketName""#));
//! ```

pub mod bundle;
pub mod config;
pub mod document;
pub mod resolve;
pub mod serialize;
pub mod stacks;

pub use bundle::{Bundle, FactoryBundle, NetworkBundle, TagBundle};
pub use config::{ConfigError, StackConfig};
pub use document::{
    Attributes, ConditionHandle, Declaration, DeletionPolicy, Document, DocumentError, LogicalId,
    ParameterHandle, ParameterSpec, Pseudo, Reference, ResourceHandle, Section, Value,
};
pub use resolve::{Advisory, LintLevel, ResolveOptions, ResolvedDocument};
pub use serialize::{serialize, SerializeConfig, SerializeError};
pub use stacks::StackKind;

use thiserror::Error;

/// Errors that can occur during the assemble pipeline
#[derive(Debug, Error)]
pub enum AssembleError {
    /// Error while resolving references
    #[error("resolution error: {0}")]
    Document(#[from] DocumentError),

    /// Error while writing JSON
    #[error("serialization error: {0}")]
    Serialize(#[from] SerializeError),
}

/// Configuration for the complete assemble pipeline
#[derive(Debug, Clone, Default)]
pub struct AssembleConfig {
    /// Lint levels for the resolution pass
    pub resolve: ResolveOptions,
    /// JSON output configuration
    pub serialize: SerializeConfig,
}

impl AssembleConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resolution options
    pub fn with_resolve_options(mut self, options: ResolveOptions) -> Self {
        self.resolve = options;
        self
    }

    /// Set the serializer configuration
    pub fn with_serialize_config(mut self, config: SerializeConfig) -> Self {
        self.serialize = config;
        self
    }
}

/// Resolve and serialize a document with default configuration
pub fn assemble(document: &Document) -> Result<String, AssembleError> {
    assemble_with_config(document, &AssembleConfig::default())
}

/// Resolve and serialize a document with custom configuration
///
/// # Example
///
/// ```rust
/// use stack_assembler::{assemble_with_config, AssembleConfig, Document, SerializeConfig};
///
/// let doc = Document::new("Empty");
/// let config = AssembleConfig::new()
///     .with_serialize_config(SerializeConfig::new().with_pretty(false));
///
/// let json = assemble_with_config(&doc, &config).unwrap();
/// assert!(json.starts_with(r#"{"AWSTemplateFormatVersion":"2010-09-09""#));
/// ```
pub fn assemble_with_config(
    document: &Document,
    config: &AssembleConfig,
) -> Result<String, AssembleError> {
    let (json, _) = assemble_with_advisories(document, config)?;
    Ok(json)
}

/// Resolve and serialize, also returning the advisories collected on the way
///
/// Nothing is serialized when resolution fails.
pub fn assemble_with_advisories(
    document: &Document,
    config: &AssembleConfig,
) -> Result<(String, Vec<Advisory>), AssembleError> {
    let resolved = document.resolve_with(&config.resolve)?;
    let json = serialize(&resolved, &config.serialize)?;
    Ok((json, resolved.advisories().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_empty_document() {
        let json = assemble(&Document::new("Nothing yet")).unwrap();
        assert!(json.contains(r#""Description": "Nothing yet""#));
        assert!(json.contains(r#""Resources": {}"#));
    }

    #[test]
    fn test_assemble_unresolved_reference_error() {
        let mut doc = Document::new("test");
        doc.declare_output("vpcId", Value::reference("CerberusVpc")).unwrap();
        let result = assemble(&doc);
        assert!(matches!(
            result,
            Err(AssembleError::Document(DocumentError::UnresolvedReference { .. }))
        ));
    }

    #[test]
    fn test_assemble_with_advisories() {
        let mut doc = Document::new("test");
        doc.declare_parameter("unused", ParameterSpec::string()).unwrap();
        let (json, advisories) = assemble_with_advisories(&doc, &AssembleConfig::new()).unwrap();
        assert!(json.contains(r#""unused""#));
        assert_eq!(advisories.len(), 1);
        assert_eq!(advisories[0].id.as_str(), "unused");
    }

    #[test]
    fn test_assemble_strict_fails_on_unused() {
        let mut doc = Document::new("test");
        doc.declare_parameter("unused", ParameterSpec::string()).unwrap();
        let config = AssembleConfig::new().with_resolve_options(ResolveOptions::strict());
        let result = assemble_with_config(&doc, &config);
        assert!(matches!(
            result,
            Err(AssembleError::Document(DocumentError::UnusedDeclarations { .. }))
        ));
    }

    #[test]
    fn test_assemble_non_finite_number_error() {
        let mut doc = Document::new("test");
        doc.declare_resource("Bad", "Custom::Thing", attributes! { "Weight" => f64::NAN })
            .unwrap();
        let result = assemble(&doc);
        assert!(matches!(result, Err(AssembleError::Serialize(_))));
    }
}
