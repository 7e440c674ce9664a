//! Validation settings consumed by the engine

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default placeholder pattern, matching native positional parameters.
pub const DEFAULT_QUERY_PARAMETER_PATTERN: &str = r"\$[1-9][0-9]*";

/// A pattern setting that accepts either a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternList {
    One(String),
    Many(Vec<String>),
}

impl PatternList {
    /// Flatten into an ordered list of patterns.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            PatternList::One(pattern) => vec![pattern.clone()],
            PatternList::Many(patterns) => patterns.clone(),
        }
    }

}

/// Engine configuration surface.
///
/// Owned here as plain data; how it is loaded (workspace config, LSP
/// `didChangeConfiguration`, ...) is the embedding layer's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Placeholder regexes applied when no directive comment is present.
    pub query_parameter_pattern: Option<PatternList>,
    /// `{keyword}` templates for named placeholders, e.g. `:{keyword}`.
    pub keyword_query_parameter_pattern: Option<PatternList>,
    /// Regex separating statements inside one document. Absent means the
    /// whole document is validated as a single statement.
    pub statement_separator_pattern: Option<String>,
    /// Folder holding `*.up.sql` migration files to replay before validation.
    pub migrations_folder: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            query_parameter_pattern: Some(PatternList::One(
                DEFAULT_QUERY_PARAMETER_PATTERN.to_string(),
            )),
            keyword_query_parameter_pattern: None,
            statement_separator_pattern: None,
            migrations_folder: None,
        }
    }
}

impl Settings {
    /// Configured default placeholder patterns, empty entries dropped.
    pub fn default_patterns(&self) -> Vec<String> {
        self.query_parameter_pattern
            .as_ref()
            .map(|p| p.to_vec().into_iter().filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Configured keyword templates, empty entries dropped.
    pub fn keyword_patterns(&self) -> Vec<String> {
        self.keyword_query_parameter_pattern
            .as_ref()
            .map(|p| p.to_vec().into_iter().filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}
