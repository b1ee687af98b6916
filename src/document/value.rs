//! Attribute values and symbolic references
//!
//! A [`Value`] is the payload type of every declaration attribute. Literal
//! values pass through resolution untouched; [`Reference`] nodes are symbolic
//! pointers into the owning document that only become concrete during the
//! resolution pass.

use indexmap::IndexMap;

use super::LogicalId;

/// Ordered attribute mapping. Insertion order is the output order.
pub type Attributes = IndexMap<String, Value>;

/// Numeric literal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// An attribute value: literal, sequence, mapping or reference
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(Number),
    Bool(bool),
    List(Vec<Value>),
    Map(Attributes),
    Reference(Box<Reference>),
}

/// Pseudo parameters supplied by the provisioning engine, beyond account and region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pseudo {
    StackName,
    StackId,
    Partition,
    /// Removes the enclosing property when selected by a conditional
    NoValue,
}

impl Pseudo {
    /// Token understood by the provisioning engine
    pub fn token(self) -> &'static str {
        match self {
            Pseudo::StackName => "AWS::StackName",
            Pseudo::StackId => "AWS::StackId",
            Pseudo::Partition => "AWS::Partition",
            Pseudo::NoValue => "AWS::NoValue",
        }
    }
}

/// Token for the account id pseudo parameter
pub const ACCOUNT_ID_TOKEN: &str = "AWS::AccountId";

/// Token for the region pseudo parameter
pub const REGION_TOKEN: &str = "AWS::Region";

/// Symbolic pointer to a declared entity, a computed attribute, or a
/// composite expression over other values
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// The entity itself (parameter value or resource physical id)
    ById(LogicalId),
    /// A computed attribute of a resource, e.g. `Arn` or `Endpoint.Address`
    ByAttribute {
        target: LogicalId,
        attribute: String,
    },
    ByAccountId,
    ByRegion,
    Pseudo(Pseudo),
    /// Concatenation of parts; operand order is significant
    Join {
        separator: String,
        parts: Vec<Value>,
    },
    /// Selects `then` or `otherwise` depending on a declared condition
    Conditional {
        condition: LogicalId,
        then: Value,
        otherwise: Value,
    },
    /// Equality test, used inside condition declarations
    Equals(Value, Value),
    Base64(Value),
}

impl Reference {
    /// The declaration this reference points at directly, if any.
    ///
    /// Composite references return `None`; their operands are visited
    /// separately by the resolver.
    pub fn target(&self) -> Option<&LogicalId> {
        match self {
            Reference::ById(target) => Some(target),
            Reference::ByAttribute { target, .. } => Some(target),
            Reference::Conditional { condition, .. } => Some(condition),
            _ => None,
        }
    }

    /// Short name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Reference::ById(_) => "Ref",
            Reference::ByAttribute { .. } => "Fn::GetAtt",
            Reference::ByAccountId => "AccountId",
            Reference::ByRegion => "Region",
            Reference::Pseudo(_) => "pseudo parameter",
            Reference::Join { .. } => "Fn::Join",
            Reference::Conditional { .. } => "Fn::If",
            Reference::Equals(..) => "Fn::Equals",
            Reference::Base64(_) => "Fn::Base64",
        }
    }
}

impl Value {
    /// Reference to a declared entity
    pub fn reference(target: impl Into<LogicalId>) -> Self {
        Reference::ById(target.into()).into()
    }

    /// Reference to a computed attribute of a resource
    pub fn attribute(target: impl Into<LogicalId>, attribute: impl Into<String>) -> Self {
        Reference::ByAttribute {
            target: target.into(),
            attribute: attribute.into(),
        }
        .into()
    }

    pub fn account_id() -> Self {
        Reference::ByAccountId.into()
    }

    pub fn region() -> Self {
        Reference::ByRegion.into()
    }

    pub fn pseudo(pseudo: Pseudo) -> Self {
        Reference::Pseudo(pseudo).into()
    }

    /// Join the parts with a separator, preserving their order
    pub fn join<I, V>(separator: impl Into<String>, parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Reference::Join {
            separator: separator.into(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
        .into()
    }

    /// Choose between two values based on a declared condition
    pub fn conditional(
        condition: impl Into<LogicalId>,
        then: impl Into<Value>,
        otherwise: impl Into<Value>,
    ) -> Self {
        Reference::Conditional {
            condition: condition.into(),
            then: then.into(),
            otherwise: otherwise.into(),
        }
        .into()
    }

    pub fn equals(a: impl Into<Value>, b: impl Into<Value>) -> Self {
        Reference::Equals(a.into(), b.into()).into()
    }

    pub fn base64(value: impl Into<Value>) -> Self {
        Reference::Base64(value.into()).into()
    }

    /// Build a list value from anything convertible
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Get the reference node if this value is one
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Reference> for Value {
    fn from(reference: Reference) -> Self {
        Value::Reference(Box::new(reference))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::Int(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(Number::Int(i64::from(n)))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(Number::Int(i64::from(n)))
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Number(Number::Int(i64::from(n)))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(Number::Float(n))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Attributes> for Value {
    fn from(map: Attributes) -> Self {
        Value::Map(map)
    }
}

/// Build an [`Attributes`] map from `key => value` pairs, keeping their order.
///
/// ```rust
/// use stack_assembler::{attributes, Value};
///
/// let props = attributes! {
///     "CidrBlock" => Value::reference("vpcCidrBlock"),
///     "EnableDnsSupport" => true,
/// };
/// assert_eq!(props.len(), 2);
/// ```
#[macro_export]
macro_rules! attributes {
    () => {
        $crate::Attributes::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut attrs = $crate::Attributes::new();
        $(
            attrs.insert(::std::string::String::from($key), $crate::Value::from($value));
        )+
        attrs
    }};
}
