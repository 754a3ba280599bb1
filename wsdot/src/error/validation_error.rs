//! Schema validation errors.

use std::fmt;

use strum::Display;
use thiserror::Error;
use wsdot_define::DescriptorError;

/// Which side of the pipeline a schema check ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ValidationStage {
    /// Caller-supplied parameters, checked before any network I/O.
    Input,
    /// The response body, checked after transport.
    Output,
}

/// One field-level problem, located by a JSON path such as `$[2].VesselName`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON path of the offending value.
    pub path: String,
    /// What was wrong with it.
    pub message: String,
}

impl ValidationIssue {
    /// Creates an issue at `path`.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Input or output failed its schema.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// One or more fields did not match the shape.
    #[error("{stage} validation failed: {}", join_issues(issues))]
    Schema {
        /// Input or output.
        stage: ValidationStage,
        /// Every issue found, in document order.
        issues: Vec<ValidationIssue>,
    },

    /// A string was neither a date literal nor ISO-8601.
    #[error("Invalid date literal: {value:?}")]
    InvalidDate {
        /// The rejected string.
        value: String,
    },

    /// A template token had no value in the validated input.
    ///
    /// This means the descriptor and its input schema disagree.
    #[error("Missing value for path parameter `{param}` in {template}")]
    MissingPathParam {
        /// The token name.
        param: String,
        /// The template being expanded.
        template: String,
    },

    /// The path template itself is malformed.
    #[error("Invalid path template: {0}")]
    Descriptor(#[from] DescriptorError),

    /// The expanded URL could not be parsed.
    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        /// The URL text that failed to parse.
        url: String,
        /// Parser error.
        source: url::ParseError,
    },
}

impl ValidationError {
    /// Creates a schema error with a single issue.
    pub fn single(stage: ValidationStage, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            stage,
            issues: vec![ValidationIssue::new(path, message)],
        }
    }

    /// Returns the field-level issues, if this is a schema error.
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Self::Schema { issues, .. } => issues,
            _ => &[],
        }
    }

    /// Returns `true` for descriptor/schema mismatches, which are programmer
    /// errors rather than caller errors.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingPathParam { .. } | Self::Descriptor(_) | Self::InvalidUrl { .. }
        )
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
