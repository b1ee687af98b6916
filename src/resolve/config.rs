//! Options for the resolution pass

use serde::Deserialize;

/// How an advisory check is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LintLevel {
    /// Do not report
    Allow,
    /// Report as an advisory, keep going
    #[default]
    Warn,
    /// Fail resolution
    Deny,
}

/// Configuration options for reference resolution
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Parameters declared but never referenced
    pub unused_parameters: LintLevel,

    /// Conditions declared but never referenced
    pub unused_conditions: LintLevel,
}

impl ResolveOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unused_parameters(mut self, level: LintLevel) -> Self {
        self.unused_parameters = level;
        self
    }

    pub fn with_unused_conditions(mut self, level: LintLevel) -> Self {
        self.unused_conditions = level;
        self
    }

    /// Deny every advisory
    pub fn strict() -> Self {
        Self {
            unused_parameters: LintLevel::Deny,
            unused_conditions: LintLevel::Deny,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_warn() {
        let options = ResolveOptions::default();
        assert_eq!(options.unused_parameters, LintLevel::Warn);
        assert_eq!(options.unused_conditions, LintLevel::Warn);
    }

    #[test]
    fn test_builder_pattern() {
        let options = ResolveOptions::new()
            .with_unused_parameters(LintLevel::Deny)
            .with_unused_conditions(LintLevel::Allow);
        assert_eq!(options.unused_parameters, LintLevel::Deny);
        assert_eq!(options.unused_conditions, LintLevel::Allow);
    }
}
