//! Declarations: the named entities a document is made of

use std::fmt;

use super::value::{Attributes, Value};
use super::LogicalId;

/// Attribute key under which a condition declaration stores its expression
pub const CONDITION_EXPRESSION: &str = "Expression";

/// Document section a declaration belongs to.
///
/// All sections share one logical-id namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Parameter,
    Condition,
    Resource,
    Output,
}

impl Section {
    /// Sections in output order
    pub const ALL: [Section; 4] = [
        Section::Parameter,
        Section::Condition,
        Section::Resource,
        Section::Output,
    ];

    /// Top-level key of this section in the output document
    pub fn key(self) -> &'static str {
        match self {
            Section::Parameter => "Parameters",
            Section::Condition => "Conditions",
            Section::Resource => "Resources",
            Section::Output => "Outputs",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Parameter => write!(f, "parameter"),
            Section::Condition => write!(f, "condition"),
            Section::Resource => write!(f, "resource"),
            Section::Output => write!(f, "output"),
        }
    }
}

/// What the provisioning engine does with a resource when it leaves the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

impl DeletionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DeletionPolicy::Delete => "Delete",
            DeletionPolicy::Retain => "Retain",
            DeletionPolicy::Snapshot => "Snapshot",
        }
    }
}

/// A named, typed entity of one document section.
///
/// Declarations are built up front and handed to a [`Document`](super::Document);
/// once registered they are never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    id: LogicalId,
    section: Section,
    kind: String,
    attributes: Attributes,
    depends_on: Vec<LogicalId>,
    condition: Option<LogicalId>,
    update_policy: Option<Value>,
    deletion_policy: Option<DeletionPolicy>,
}

impl Declaration {
    fn new(id: LogicalId, section: Section, kind: String, attributes: Attributes) -> Self {
        Self {
            id,
            section,
            kind,
            attributes,
            depends_on: Vec::new(),
            condition: None,
            update_policy: None,
            deletion_policy: None,
        }
    }

    /// Create a parameter declaration; its kind is the parameter type
    pub fn parameter(id: impl Into<LogicalId>, spec: ParameterSpec) -> Self {
        let ParameterSpec {
            type_name,
            attributes,
        } = spec;
        Self::new(id.into(), Section::Parameter, type_name, attributes)
    }

    /// Create a resource declaration with an opaque type tag and its properties
    pub fn resource(id: impl Into<LogicalId>, kind: impl Into<String>, properties: Attributes) -> Self {
        Self::new(id.into(), Section::Resource, kind.into(), properties)
    }

    /// Create an output declaration exporting a single value
    pub fn output(id: impl Into<LogicalId>, value: impl Into<Value>) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert("Value".to_string(), value.into());
        Self::new(id.into(), Section::Output, String::new(), attributes)
    }

    /// Create a condition declaration from a boolean expression
    pub fn condition(id: impl Into<LogicalId>, expression: impl Into<Value>) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert(CONDITION_EXPRESSION.to_string(), expression.into());
        Self::new(id.into(), Section::Condition, String::new(), attributes)
    }

    /// Add or replace an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the human-readable description (outputs)
    pub fn with_description(self, description: impl Into<String>) -> Self {
        self.with_attribute("Description", Value::String(description.into()))
    }

    /// Export an output under a stack-independent name
    pub fn with_export(self, name: impl Into<Value>) -> Self {
        let mut export = Attributes::new();
        export.insert("Name".to_string(), name.into());
        self.with_attribute("Export", Value::Map(export))
    }

    /// Require another resource to exist before this one
    pub fn depends_on(mut self, id: impl Into<LogicalId>) -> Self {
        let id = id.into();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    /// Only create this declaration when the named condition holds
    pub fn with_condition(mut self, condition: impl Into<LogicalId>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_update_policy(mut self, policy: impl Into<Value>) -> Self {
        self.update_policy = Some(policy.into());
        self
    }

    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self
    }

    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    pub fn section(&self) -> Section {
        self.section
    }

    /// The opaque type tag: resource type, or parameter type for parameters
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Explicitly declared dependencies, in declaration order
    pub fn explicit_dependencies(&self) -> &[LogicalId] {
        &self.depends_on
    }

    pub fn condition_name(&self) -> Option<&LogicalId> {
        self.condition.as_ref()
    }

    pub fn update_policy(&self) -> Option<&Value> {
        self.update_policy.as_ref()
    }

    pub fn deletion_policy(&self) -> Option<DeletionPolicy> {
        self.deletion_policy
    }
}

/// Type and constraints of a parameter declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    type_name: String,
    attributes: Attributes,
}

impl ParameterSpec {
    /// A parameter of an arbitrary engine-defined type (e.g. `AWS::EC2::VPC::Id`)
    pub fn of_type(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn string() -> Self {
        Self::of_type("String")
    }

    pub fn number() -> Self {
        Self::of_type("Number")
    }

    fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        self.with("Description", description.into())
    }

    pub fn with_default(self, default: impl Into<Value>) -> Self {
        self.with("Default", default)
    }

    pub fn with_allowed_pattern(self, pattern: impl Into<String>) -> Self {
        self.with("AllowedPattern", pattern.into())
    }

    pub fn with_allowed_values<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with("AllowedValues", Value::list(values))
    }

    pub fn with_min_length(self, length: u32) -> Self {
        self.with("MinLength", length)
    }

    pub fn with_max_length(self, length: u32) -> Self {
        self.with("MaxLength", length)
    }

    pub fn with_min_value(self, value: i64) -> Self {
        self.with("MinValue", value)
    }

    pub fn with_max_value(self, value: i64) -> Self {
        self.with("MaxValue", value)
    }

    /// Mask the parameter value in engine consoles and logs
    pub fn with_no_echo(self) -> Self {
        self.with("NoEcho", true)
    }

    pub fn with_constraint_description(self, description: impl Into<String>) -> Self {
        self.with("ConstraintDescription", description.into())
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.attributes.get("Default")
    }
}
