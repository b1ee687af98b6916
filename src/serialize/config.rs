//! Configuration for document serialization

/// Configuration options for JSON output
#[derive(Debug, Clone)]
pub struct SerializeConfig {
    /// Whether to format output with indentation
    pub pretty: bool,

    /// Leave out sections that have no declarations
    pub omit_empty_sections: bool,
}

impl Default for SerializeConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            omit_empty_sections: false,
        }
    }
}

impl SerializeConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to pretty-print output
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Set whether empty sections are left out
    pub fn with_omit_empty_sections(mut self, omit: bool) -> Self {
        self.omit_empty_sections = omit;
        self
    }
}
