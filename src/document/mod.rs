//! Document registry
//!
//! A [`Document`] owns every declaration of one stack. It enforces that
//! logical ids are unique across all sections, remembers registration order
//! for deterministic output, and is the entry point of the resolution pass.
//!
//! # Example
//!
//! ```rust
//! use stack_assembler::{attributes, Document, ParameterSpec};
//!
//! let mut doc = Document::new("Creates the VPC");
//! let cidr = doc
//!     .declare_parameter("vpcCidrBlock", ParameterSpec::string().with_default("172.20.0.0/20"))
//!     .unwrap();
//! doc.declare_resource("CerberusVpc", "AWS::EC2::VPC", attributes! { "CidrBlock" => &cidr })
//!     .unwrap();
//!
//! let resolved = doc.resolve().unwrap();
//! assert_eq!(resolved.declarations().len(), 2);
//! ```

pub mod declaration;
pub mod error;
pub mod value;

use std::borrow::Borrow;
use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

pub use declaration::{Declaration, DeletionPolicy, ParameterSpec, Section, CONDITION_EXPRESSION};
pub use error::DocumentError;
pub use value::{Attributes, Number, Pseudo, Reference, Value};

use crate::resolve::{self, ResolveOptions, ResolvedDocument};

/// Template format version emitted when none is set
pub const DEFAULT_FORMAT_VERSION: &str = "2010-09-09";

/// Name of a declaration, unique within one document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty and made only of ASCII letters and digits
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LogicalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for LogicalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&LogicalId> for LogicalId {
    fn from(id: &LogicalId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for LogicalId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Handle to a registered parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterHandle {
    id: LogicalId,
}

impl ParameterHandle {
    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    /// `Ref` to the parameter value
    pub fn reference(&self) -> Value {
        Value::reference(&self.id)
    }
}

/// Handle to a registered resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    id: LogicalId,
}

impl ResourceHandle {
    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    /// `Ref` to the resource's physical id
    pub fn reference(&self) -> Value {
        Value::reference(&self.id)
    }

    /// A computed attribute such as `Arn` or `Endpoint.Address`
    pub fn attribute(&self, path: impl Into<String>) -> Value {
        Value::attribute(&self.id, path)
    }
}

/// Handle to a registered condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionHandle {
    id: LogicalId,
}

impl ConditionHandle {
    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    /// `Fn::If` over this condition
    pub fn choose(&self, then: impl Into<Value>, otherwise: impl Into<Value>) -> Value {
        Value::conditional(&self.id, then, otherwise)
    }
}

impl From<&ParameterHandle> for Value {
    fn from(handle: &ParameterHandle) -> Self {
        handle.reference()
    }
}

impl From<&ResourceHandle> for Value {
    fn from(handle: &ResourceHandle) -> Self {
        handle.reference()
    }
}

impl From<&ParameterHandle> for LogicalId {
    fn from(handle: &ParameterHandle) -> Self {
        handle.id.clone()
    }
}

impl From<&ResourceHandle> for LogicalId {
    fn from(handle: &ResourceHandle) -> Self {
        handle.id.clone()
    }
}

impl From<&ConditionHandle> for LogicalId {
    fn from(handle: &ConditionHandle) -> Self {
        handle.id.clone()
    }
}

/// The per-stack declaration registry
#[derive(Debug, Clone)]
pub struct Document {
    description: String,
    format_version: String,
    declarations: IndexMap<LogicalId, Declaration>,
}

impl Document {
    /// Create an empty document
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            format_version: DEFAULT_FORMAT_VERSION.to_string(),
            declarations: IndexMap::new(),
        }
    }

    /// Override the template format version
    pub fn with_format_version(mut self, version: impl Into<String>) -> Self {
        self.format_version = version.into();
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn format_version(&self) -> &str {
        &self.format_version
    }

    /// Register a declaration under its logical id.
    ///
    /// Returns the id unchanged so registration can be chained with reference
    /// building. Fails without touching the document if the id is malformed
    /// or already taken by a declaration of any section.
    pub fn register(&mut self, declaration: Declaration) -> Result<LogicalId, DocumentError> {
        self.check_available(declaration.id())?;
        Ok(self.insert(declaration))
    }

    /// Register several declarations as one unit.
    ///
    /// Every id is checked against the document and against the rest of the
    /// batch before anything is inserted, so a failure leaves the document
    /// exactly as it was.
    pub fn register_all(
        &mut self,
        declarations: Vec<Declaration>,
    ) -> Result<Vec<LogicalId>, DocumentError> {
        for (index, declaration) in declarations.iter().enumerate() {
            self.check_available(declaration.id())?;
            if let Some(earlier) = declarations[..index]
                .iter()
                .find(|d| d.id() == declaration.id())
            {
                return Err(DocumentError::duplicate(
                    declaration.id().clone(),
                    earlier.section(),
                ));
            }
        }
        Ok(declarations
            .into_iter()
            .map(|declaration| self.insert(declaration))
            .collect())
    }

    fn check_available(&self, id: &LogicalId) -> Result<(), DocumentError> {
        if !id.is_valid() {
            return Err(DocumentError::InvalidLogicalId { id: id.0.clone() });
        }
        if let Some(existing) = self.declarations.get(id) {
            return Err(DocumentError::duplicate(id.clone(), existing.section()));
        }
        Ok(())
    }

    fn insert(&mut self, declaration: Declaration) -> LogicalId {
        let id = declaration.id().clone();
        debug!(id = %id, section = %declaration.section(), "registered declaration");
        self.declarations.insert(id.clone(), declaration);
        id
    }

    pub fn declare_parameter(
        &mut self,
        name: impl Into<LogicalId>,
        spec: ParameterSpec,
    ) -> Result<ParameterHandle, DocumentError> {
        let id = self.register(Declaration::parameter(name, spec))?;
        Ok(ParameterHandle { id })
    }

    pub fn declare_resource(
        &mut self,
        name: impl Into<LogicalId>,
        kind: impl Into<String>,
        attributes: Attributes,
    ) -> Result<ResourceHandle, DocumentError> {
        let id = self.register(Declaration::resource(name, kind, attributes))?;
        Ok(ResourceHandle { id })
    }

    /// Register a fully built resource declaration (dependencies, policies...)
    pub fn add_resource(&mut self, declaration: Declaration) -> Result<ResourceHandle, DocumentError> {
        if declaration.section() != Section::Resource {
            return Err(DocumentError::UnexpectedSection {
                id: declaration.id().clone(),
                expected: Section::Resource,
                found: declaration.section(),
            });
        }
        let id = self.register(declaration)?;
        Ok(ResourceHandle { id })
    }

    pub fn declare_output(
        &mut self,
        name: impl Into<LogicalId>,
        value: impl Into<Value>,
    ) -> Result<(), DocumentError> {
        self.register(Declaration::output(name, value))?;
        Ok(())
    }

    pub fn declare_condition(
        &mut self,
        name: impl Into<LogicalId>,
        expression: impl Into<Value>,
    ) -> Result<ConditionHandle, DocumentError> {
        let id = self.register(Declaration::condition(name, expression))?;
        Ok(ConditionHandle { id })
    }

    pub fn get(&self, id: &str) -> Option<&Declaration> {
        self.declarations.get(id)
    }

    /// Registration index of a declaration
    pub fn position(&self, id: &str) -> Option<usize> {
        self.declarations.get_index_of(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.declarations.contains_key(id)
    }

    /// Remove a declaration, keeping the order of the others
    pub fn remove(&mut self, id: &str) -> Option<Declaration> {
        self.declarations.shift_remove(id)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// All declarations in registration order
    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }

    /// Declarations of one section in registration order
    pub fn section(&self, section: Section) -> impl Iterator<Item = &Declaration> {
        self.declarations
            .values()
            .filter(move |d| d.section() == section)
    }

    /// All logical ids in registration order
    pub fn ids(&self) -> impl Iterator<Item = &LogicalId> {
        self.declarations.keys()
    }

    /// Resolve every reference with default options
    pub fn resolve(&self) -> Result<ResolvedDocument, DocumentError> {
        resolve::resolve(self, &ResolveOptions::default())
    }

    pub fn resolve_with(&self, options: &ResolveOptions) -> Result<ResolvedDocument, DocumentError> {
        resolve::resolve(self, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes;

    #[test]
    fn test_register_returns_id() {
        let mut doc = Document::new("test");
        let id = doc
            .register(Declaration::resource("CerberusVpc", "AWS::EC2::VPC", attributes! {}))
            .expect("Should register");
        assert_eq!(id.as_str(), "CerberusVpc");
        assert!(doc.contains("CerberusVpc"));
    }

    #[test]
    fn test_duplicate_across_sections() {
        let mut doc = Document::new("test");
        doc.declare_parameter("cmsDbPort", ParameterSpec::number())
            .expect("Should register");
        let result = doc.declare_output("cmsDbPort", "3306");
        assert_eq!(
            result,
            Err(DocumentError::duplicate(LogicalId::new("cmsDbPort"), Section::Parameter))
        );
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.get("cmsDbPort").map(|d| d.section()), Some(Section::Parameter));
    }

    #[test]
    fn test_invalid_logical_id() {
        let mut doc = Document::new("test");
        let result = doc.declare_resource("bad-id", "AWS::S3::Bucket", attributes! {});
        assert!(matches!(result, Err(DocumentError::InvalidLogicalId { .. })));
        let result = doc.declare_resource("", "AWS::S3::Bucket", attributes! {});
        assert!(matches!(result, Err(DocumentError::InvalidLogicalId { .. })));
        assert!(doc.is_empty());
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut doc = Document::new("test");
        doc.declare_resource("Zebra", "T", attributes! {}).unwrap();
        doc.declare_parameter("alpha", ParameterSpec::string()).unwrap();
        doc.declare_resource("Mango", "T", attributes! {}).unwrap();
        let ids: Vec<&str> = doc.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["Zebra", "alpha", "Mango"]);
        let resources: Vec<&str> = doc
            .section(Section::Resource)
            .map(|d| d.id().as_str())
            .collect();
        assert_eq!(resources, vec!["Zebra", "Mango"]);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut doc = Document::new("test");
        for name in ["A", "B", "C"] {
            doc.declare_resource(name, "T", attributes! {}).unwrap();
        }
        assert!(doc.remove("B").is_some());
        let ids: Vec<&str> = doc.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C"]);
    }

    #[test]
    fn test_add_resource_rejects_other_sections() {
        let mut doc = Document::new("test");
        let result = doc.add_resource(Declaration::parameter("lambdaKey", ParameterSpec::string()));
        assert_eq!(
            result,
            Err(DocumentError::UnexpectedSection {
                id: LogicalId::new("lambdaKey"),
                expected: Section::Resource,
                found: Section::Parameter,
            })
        );
        assert!(doc.is_empty());
    }

    #[test]
    fn test_register_all_is_atomic() {
        let mut doc = Document::new("test");
        doc.declare_parameter("vpcCidrBlock", ParameterSpec::string()).unwrap();

        let result = doc.register_all(vec![
            Declaration::parameter("gatewayCidrBlock", ParameterSpec::string()),
            Declaration::parameter("vpcCidrBlock", ParameterSpec::string()),
        ]);
        assert!(matches!(result, Err(DocumentError::DuplicateId { .. })));
        let ids: Vec<&str> = doc.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["vpcCidrBlock"]);

        let result = doc.register_all(vec![
            Declaration::parameter("amiId", ParameterSpec::string()),
            Declaration::output("amiId", "x"),
        ]);
        assert_eq!(
            result,
            Err(DocumentError::duplicate(LogicalId::new("amiId"), Section::Parameter))
        );
        assert_eq!(doc.len(), 1);

        let ids = doc
            .register_all(vec![
                Declaration::parameter("amiId", ParameterSpec::string()),
                Declaration::parameter("instanceSize", ParameterSpec::string()),
            ])
            .unwrap();
        assert_eq!(ids, vec![LogicalId::new("amiId"), LogicalId::new("instanceSize")]);
        assert_eq!(doc.position("instanceSize"), Some(2));
    }

    #[test]
    fn test_handles_build_references() {
        let mut doc = Document::new("test");
        let role = doc
            .declare_resource("GatewayIamRole", "AWS::IAM::Role", attributes! {})
            .unwrap();
        assert_eq!(role.reference(), Value::reference("GatewayIamRole"));
        assert_eq!(role.attribute("Arn"), Value::attribute("GatewayIamRole", "Arn"));

        let cond = doc
            .declare_condition("RegionEqualsEastOne", Value::equals(Value::region(), "us-east-1"))
            .unwrap();
        assert_eq!(
            cond.choose("ec2.internal", "other"),
            Value::conditional("RegionEqualsEastOne", "ec2.internal", "other")
        );
    }
}
