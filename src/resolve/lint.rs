//! Advisory checks for declarations nothing uses.
//!
//! Unused parameters and conditions are legal in the output format, so these
//! checks only produce advisories unless the caller denies them.

use std::collections::HashSet;
use std::fmt;

use tracing::warn;

use crate::document::{Document, DocumentError, LogicalId, Section};

use super::config::{LintLevel, ResolveOptions};

/// A non-fatal note about the document
#[derive(Debug, Clone, PartialEq)]
pub struct Advisory {
    pub category: AdvisoryCategory,
    pub id: LogicalId,
    pub message: String,
}

/// Category of advisory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryCategory {
    UnusedParameter,
    UnusedCondition,
}

impl fmt::Display for AdvisoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvisoryCategory::UnusedParameter => write!(f, "unused-parameter"),
            AdvisoryCategory::UnusedCondition => write!(f, "unused-condition"),
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

/// Run all checks given the set of ids referenced during resolution.
pub fn check(
    document: &Document,
    referenced: &HashSet<LogicalId>,
    options: &ResolveOptions,
) -> Result<Vec<Advisory>, DocumentError> {
    let mut advisories = Vec::new();
    check_unused(
        document,
        referenced,
        Section::Parameter,
        options.unused_parameters,
        &mut advisories,
    )?;
    check_unused(
        document,
        referenced,
        Section::Condition,
        options.unused_conditions,
        &mut advisories,
    )?;
    Ok(advisories)
}

fn check_unused(
    document: &Document,
    referenced: &HashSet<LogicalId>,
    section: Section,
    level: LintLevel,
    advisories: &mut Vec<Advisory>,
) -> Result<(), DocumentError> {
    if level == LintLevel::Allow {
        return Ok(());
    }

    let unused: Vec<LogicalId> = document
        .section(section)
        .map(|d| d.id())
        .filter(|id| !referenced.contains(*id))
        .cloned()
        .collect();

    if unused.is_empty() {
        return Ok(());
    }

    if level == LintLevel::Deny {
        return Err(DocumentError::UnusedDeclarations {
            section,
            ids: unused,
        });
    }

    let category = match section {
        Section::Condition => AdvisoryCategory::UnusedCondition,
        _ => AdvisoryCategory::UnusedParameter,
    };
    for id in unused {
        let message = format!("{} '{}' is declared but never referenced", section, id);
        warn!(id = %id, category = %category, "{}", message);
        advisories.push(Advisory {
            category,
            id,
            message,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ParameterSpec, Value};

    fn doc_with_unused() -> Document {
        let mut doc = Document::new("test");
        doc.declare_parameter("used", ParameterSpec::string()).unwrap();
        doc.declare_parameter("stale", ParameterSpec::string()).unwrap();
        doc.declare_condition("IsProd", Value::equals(Value::reference("used"), "prod"))
            .unwrap();
        doc
    }

    #[test]
    fn test_warn_reports_unused_in_order() {
        let doc = doc_with_unused();
        let referenced: HashSet<LogicalId> = [LogicalId::new("used")].into_iter().collect();
        let advisories = check(&doc, &referenced, &ResolveOptions::default()).unwrap();
        let ids: Vec<&str> = advisories.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["stale", "IsProd"]);
        assert_eq!(advisories[0].category, AdvisoryCategory::UnusedParameter);
        assert_eq!(advisories[1].category, AdvisoryCategory::UnusedCondition);
        assert_eq!(
            advisories[0].to_string(),
            "unused-parameter: parameter 'stale' is declared but never referenced"
        );
    }

    #[test]
    fn test_allow_suppresses() {
        let doc = doc_with_unused();
        let options = ResolveOptions::new()
            .with_unused_parameters(LintLevel::Allow)
            .with_unused_conditions(LintLevel::Allow);
        let advisories = check(&doc, &HashSet::new(), &options).unwrap();
        assert!(advisories.is_empty());
    }

    #[test]
    fn test_deny_fails() {
        let doc = doc_with_unused();
        let options = ResolveOptions::new().with_unused_parameters(LintLevel::Deny);
        let result = check(&doc, &HashSet::new(), &options);
        match result {
            Err(DocumentError::UnusedDeclarations { section, ids }) => {
                assert_eq!(section, Section::Parameter);
                assert_eq!(ids, vec![LogicalId::new("used"), LogicalId::new("stale")]);
            }
            other => panic!("Expected UnusedDeclarations, got {:?}", other),
        }
    }
}
