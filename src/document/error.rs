//! Integrity errors raised while registering or resolving a document

use thiserror::Error;

use super::declaration::Section;
use super::LogicalId;

/// Errors that abort document assembly
#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    /// Two declarations registered under the same logical id
    #[error("duplicate logical id '{id}': already declared as a {existing}")]
    DuplicateId { id: LogicalId, existing: Section },

    /// Logical ids must be non-empty and ASCII alphanumeric
    #[error("invalid logical id '{id}': must be non-empty and alphanumeric")]
    InvalidLogicalId { id: String },

    /// A reference points at an id nothing in the document declares
    #[error("unresolved reference to '{target}' from '{from}'{}", format_suggestions(.suggestions))]
    UnresolvedReference {
        target: LogicalId,
        from: LogicalId,
        suggestions: Vec<String>,
    },

    /// A declaration refers to itself
    #[error("declaration '{id}' references itself")]
    SelfReference { id: LogicalId },

    /// A reference targets a declaration of a section it cannot address
    #[error("'{from}' uses {reference} on '{target}', which is a {found} (expected {})", format_sections(.expected))]
    SectionMismatch {
        from: LogicalId,
        target: LogicalId,
        reference: &'static str,
        expected: Vec<Section>,
        found: Section,
    },

    /// A reference names a declaration registered after its owner
    #[error("'{from}' references '{target}', which is registered after it")]
    ForwardReference { from: LogicalId, target: LogicalId },

    /// A declaration handed to a section-specific entry point of another section
    #[error("'{id}' is a {found}, expected a {expected}")]
    UnexpectedSection {
        id: LogicalId,
        expected: Section,
        found: Section,
    },

    /// A declaration carries something its section cannot express
    #[error("{section} '{id}' cannot carry {attribute}")]
    UnsupportedAttribute {
        id: LogicalId,
        section: Section,
        attribute: String,
    },

    /// Declared but never referenced, under a deny lint level
    #[error("unused {section} declarations: {}", format_ids(.ids))]
    UnusedDeclarations { section: Section, ids: Vec<LogicalId> },
}

impl DocumentError {
    pub fn duplicate(id: LogicalId, existing: Section) -> Self {
        Self::DuplicateId { id, existing }
    }

    pub fn unresolved(target: LogicalId, from: LogicalId, suggestions: Vec<String>) -> Self {
        Self::UnresolvedReference {
            target,
            from,
            suggestions,
        }
    }

    pub fn section_mismatch(
        from: LogicalId,
        target: LogicalId,
        reference: &'static str,
        expected: &[Section],
        found: Section,
    ) -> Self {
        Self::SectionMismatch {
            from,
            target,
            reference,
            expected: expected.to_vec(),
            found,
        }
    }

    /// The logical id the failure is about
    pub fn logical_id(&self) -> Option<&str> {
        match self {
            Self::DuplicateId { id, .. } => Some(id.as_str()),
            Self::InvalidLogicalId { id } => Some(id.as_str()),
            Self::UnresolvedReference { target, .. } => Some(target.as_str()),
            Self::SelfReference { id } => Some(id.as_str()),
            Self::SectionMismatch { target, .. } => Some(target.as_str()),
            Self::ForwardReference { target, .. } => Some(target.as_str()),
            Self::UnexpectedSection { id, .. } => Some(id.as_str()),
            Self::UnsupportedAttribute { id, .. } => Some(id.as_str()),
            Self::UnusedDeclarations { .. } => None,
        }
    }

    pub fn unsupported(id: LogicalId, section: Section, attribute: impl Into<String>) -> Self {
        Self::UnsupportedAttribute {
            id,
            section,
            attribute: attribute.into(),
        }
    }

    /// Get suggestions if available
    pub fn suggestions(&self) -> Option<&[String]> {
        match self {
            Self::UnresolvedReference { suggestions, .. } => Some(suggestions),
            _ => None,
        }
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean {}?)", suggestions.join(", "))
    }
}

fn format_sections(sections: &[Section]) -> String {
    sections
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" or ")
}

fn format_ids(ids: &[LogicalId]) -> String {
    ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
}
