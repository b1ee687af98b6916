//! Reference resolution
//!
//! Walks every declaration of a [`Document`] depth-first and produces a new,
//! fully resolved tree in which each [`Reference`] has been checked against
//! the namespace and replaced by its engine-readable form. The input
//! document is never modified, so resolving twice yields the same result.
//!
//! Resolution is a single pass with no fixpoint: a reference can only name a
//! declaration registered before its owner, and a declaration may not name
//! itself. Dependency edges therefore always point backwards in registration
//! order and can never form a cycle.

pub mod config;
pub mod lint;

pub use config::{LintLevel, ResolveOptions};
pub use lint::{Advisory, AdvisoryCategory};

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::document::value::{ACCOUNT_ID_TOKEN, REGION_TOKEN};
use crate::document::{
    Declaration, DeletionPolicy, Document, DocumentError, LogicalId, Number, Reference, Section,
    Value, CONDITION_EXPRESSION,
};

/// A value with every reference replaced by its resolved node
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    String(String),
    Number(Number),
    Bool(bool),
    List(Vec<ResolvedValue>),
    Map(IndexMap<String, ResolvedValue>),
    /// Logical id or pseudo-parameter token
    Ref(String),
    GetAtt {
        target: String,
        attribute: String,
    },
    Join {
        separator: String,
        parts: Vec<ResolvedValue>,
    },
    If {
        condition: String,
        then: Box<ResolvedValue>,
        otherwise: Box<ResolvedValue>,
    },
    Equals(Box<ResolvedValue>, Box<ResolvedValue>),
    Base64(Box<ResolvedValue>),
}

/// A declaration after resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDeclaration {
    pub id: LogicalId,
    pub section: Section,
    pub kind: String,
    pub attributes: IndexMap<String, ResolvedValue>,
    /// Explicit dependencies followed by those derived from references to
    /// other resources, without duplicates
    pub depends_on: Vec<LogicalId>,
    pub condition: Option<LogicalId>,
    pub update_policy: Option<ResolvedValue>,
    pub deletion_policy: Option<DeletionPolicy>,
}

impl ResolvedDeclaration {
    pub fn attribute(&self, key: &str) -> Option<&ResolvedValue> {
        self.attributes.get(key)
    }

    /// The expression of a condition declaration
    pub fn expression(&self) -> Option<&ResolvedValue> {
        self.attributes.get(CONDITION_EXPRESSION)
    }
}

/// Output of the resolution pass, ready for serialization
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDocument {
    pub description: String,
    pub format_version: String,
    declarations: Vec<ResolvedDeclaration>,
    advisories: Vec<Advisory>,
}

impl ResolvedDocument {
    /// All declarations in registration order
    pub fn declarations(&self) -> &[ResolvedDeclaration] {
        &self.declarations
    }

    pub fn section(&self, section: Section) -> impl Iterator<Item = &ResolvedDeclaration> {
        self.declarations
            .iter()
            .filter(move |d| d.section == section)
    }

    pub fn get(&self, id: &str) -> Option<&ResolvedDeclaration> {
        self.declarations.iter().find(|d| d.id.as_str() == id)
    }

    /// Advisories collected under a warn lint level
    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }
}

/// Resolve all references in a document
pub fn resolve(
    document: &Document,
    options: &ResolveOptions,
) -> Result<ResolvedDocument, DocumentError> {
    let mut referenced = HashSet::new();
    let mut declarations = Vec::with_capacity(document.len());

    for (position, decl) in document.declarations().enumerate() {
        check_shape(decl)?;
        let resolved = resolve_declaration(document, decl, position, &mut referenced)?;
        declarations.push(resolved);
    }

    let advisories = lint::check(document, &referenced, options)?;
    debug!(
        declarations = declarations.len(),
        advisories = advisories.len(),
        "resolved document"
    );

    Ok(ResolvedDocument {
        description: document.description().to_string(),
        format_version: document.format_version().to_string(),
        declarations,
        advisories,
    })
}

/// Attribute keys an output may carry
const OUTPUT_KEYS: [&str; 3] = ["Value", "Description", "Export"];

/// Reject settings the output format has no place for in the declaration's section
fn check_shape(decl: &Declaration) -> Result<(), DocumentError> {
    let unsupported = |attribute: &str| {
        Err(DocumentError::unsupported(
            decl.id().clone(),
            decl.section(),
            attribute,
        ))
    };

    if decl.section() != Section::Resource {
        if !decl.explicit_dependencies().is_empty() {
            return unsupported("DependsOn");
        }
        if decl.update_policy().is_some() {
            return unsupported("UpdatePolicy");
        }
        if decl.deletion_policy().is_some() {
            return unsupported("DeletionPolicy");
        }
    }

    match decl.section() {
        Section::Parameter | Section::Condition if decl.condition_name().is_some() => {
            unsupported("Condition")
        }
        Section::Condition => match decl
            .attributes()
            .keys()
            .find(|key| key.as_str() != CONDITION_EXPRESSION)
        {
            Some(key) => unsupported(key.as_str()),
            None => Ok(()),
        },
        Section::Output => match decl
            .attributes()
            .keys()
            .find(|key| !OUTPUT_KEYS.contains(&key.as_str()))
        {
            Some(key) => unsupported(key.as_str()),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}

fn resolve_declaration(
    document: &Document,
    decl: &Declaration,
    position: usize,
    referenced: &mut HashSet<LogicalId>,
) -> Result<ResolvedDeclaration, DocumentError> {
    let mut resolver = Resolver {
        document,
        owner: decl,
        position,
        referenced,
        derived: Vec::new(),
    };

    let mut attributes = IndexMap::with_capacity(decl.attributes().len());
    for (key, value) in decl.attributes() {
        attributes.insert(key.clone(), resolver.value(value)?);
    }

    let update_policy = decl
        .update_policy()
        .map(|policy| resolver.value(policy))
        .transpose()?;

    let condition = match decl.condition_name() {
        Some(name) => {
            resolver.lookup(name, "Condition", &[Section::Condition])?;
            resolver.mark_used(name);
            Some(name.clone())
        }
        None => None,
    };

    let mut depends_on = Vec::new();
    if decl.section() == Section::Resource {
        for dep in decl.explicit_dependencies() {
            resolver.lookup(dep, "DependsOn", &[Section::Resource])?;
            depends_on.push(dep.clone());
        }
        for dep in resolver.derived {
            if !depends_on.contains(&dep) {
                depends_on.push(dep);
            }
        }
    }

    Ok(ResolvedDeclaration {
        id: decl.id().clone(),
        section: decl.section(),
        kind: decl.kind().to_string(),
        attributes,
        depends_on,
        condition,
        update_policy,
        deletion_policy: decl.deletion_policy(),
    })
}

/// Resolution state for one declaration
struct Resolver<'a> {
    document: &'a Document,
    owner: &'a Declaration,
    /// Registration index of the owner
    position: usize,
    referenced: &'a mut HashSet<LogicalId>,
    /// Resources this declaration references, in first-seen order
    derived: Vec<LogicalId>,
}

impl Resolver<'_> {
    fn value(&mut self, value: &Value) -> Result<ResolvedValue, DocumentError> {
        match value {
            Value::String(s) => Ok(ResolvedValue::String(s.clone())),
            Value::Number(n) => Ok(ResolvedValue::Number(*n)),
            Value::Bool(b) => Ok(ResolvedValue::Bool(*b)),
            Value::List(items) => items
                .iter()
                .map(|item| self.value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(ResolvedValue::List),
            Value::Map(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, item) in entries {
                    map.insert(key.clone(), self.value(item)?);
                }
                Ok(ResolvedValue::Map(map))
            }
            Value::Reference(reference) => self.reference(reference),
        }
    }

    fn reference(&mut self, reference: &Reference) -> Result<ResolvedValue, DocumentError> {
        match reference {
            Reference::ById(target) => {
                let section = self.lookup(
                    target,
                    reference.kind_name(),
                    &[Section::Parameter, Section::Resource],
                )?;
                self.record(target, section);
                Ok(ResolvedValue::Ref(target.to_string()))
            }
            Reference::ByAttribute { target, attribute } => {
                let section = self.lookup(target, reference.kind_name(), &[Section::Resource])?;
                self.record(target, section);
                Ok(ResolvedValue::GetAtt {
                    target: target.to_string(),
                    attribute: attribute.clone(),
                })
            }
            Reference::ByAccountId => Ok(ResolvedValue::Ref(ACCOUNT_ID_TOKEN.to_string())),
            Reference::ByRegion => Ok(ResolvedValue::Ref(REGION_TOKEN.to_string())),
            Reference::Pseudo(pseudo) => Ok(ResolvedValue::Ref(pseudo.token().to_string())),
            Reference::Join { separator, parts } => {
                let parts = parts
                    .iter()
                    .map(|part| self.value(part))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ResolvedValue::Join {
                    separator: separator.clone(),
                    parts,
                })
            }
            Reference::Conditional {
                condition,
                then,
                otherwise,
            } => {
                self.lookup(condition, reference.kind_name(), &[Section::Condition])?;
                self.mark_used(condition);
                Ok(ResolvedValue::If {
                    condition: condition.to_string(),
                    then: Box::new(self.value(then)?),
                    otherwise: Box::new(self.value(otherwise)?),
                })
            }
            Reference::Equals(a, b) => Ok(ResolvedValue::Equals(
                Box::new(self.value(a)?),
                Box::new(self.value(b)?),
            )),
            Reference::Base64(inner) => Ok(ResolvedValue::Base64(Box::new(self.value(inner)?))),
        }
    }

    /// Check that `target` exists, is not the owner, lives in an allowed
    /// section and was registered before the owner
    fn lookup(
        &self,
        target: &LogicalId,
        reference: &'static str,
        allowed: &[Section],
    ) -> Result<Section, DocumentError> {
        if target == self.owner.id() {
            return Err(DocumentError::SelfReference { id: target.clone() });
        }

        let decl = self.document.get(target.as_str()).ok_or_else(|| {
            DocumentError::unresolved(
                target.clone(),
                self.owner.id().clone(),
                similar_ids(self.document, target.as_str()),
            )
        })?;

        if !allowed.contains(&decl.section()) {
            return Err(DocumentError::section_mismatch(
                self.owner.id().clone(),
                target.clone(),
                reference,
                allowed,
                decl.section(),
            ));
        }

        if self
            .document
            .position(target.as_str())
            .is_some_and(|position| position > self.position)
        {
            return Err(DocumentError::ForwardReference {
                from: self.owner.id().clone(),
                target: target.clone(),
            });
        }
        Ok(decl.section())
    }

    fn record(&mut self, target: &LogicalId, section: Section) {
        self.mark_used(target);
        if section == Section::Resource && !self.derived.contains(target) {
            self.derived.push(target.clone());
        }
    }

    /// References made from parameters do not count as uses
    fn mark_used(&mut self, target: &LogicalId) {
        if self.owner.section() != Section::Parameter {
            self.referenced.insert(target.clone());
        }
    }
}

/// Declared ids close to `name`, for error messages
fn similar_ids(document: &Document, name: &str) -> Vec<String> {
    let lowered = name.to_ascii_lowercase();
    document
        .ids()
        .filter(|id| {
            let candidate = id.as_str().to_ascii_lowercase();
            candidate == lowered
                || (lowered.len() >= 4 && candidate.starts_with(&lowered))
                || edit_distance(&candidate, &lowered) <= 2
        })
        .take(3)
        .map(|id| id.to_string())
        .collect()
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut curr = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        prev = curr;
    }
    prev[b.len()]
}
