//! Structured configuration issues.
//!
//! Validation collects every problem instead of stopping at the first one;
//! callers print warnings and refuse to start on any error.

use std::fmt;

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A size, interval or limit that must be positive is zero
    ZeroValue { field: String },
    /// A required string is empty
    EmptyField { field: String },
    /// Two entries share an id
    DuplicateId { section: String, id: String },
    /// A topic references a role that is not defined
    UndefinedRole { topic: String, role: String },
    /// A topic uses a role in the wrong capacity
    WrongRoleKind { topic: String, role: String },
    /// Two participants of one topic share a display name
    AmbiguousName { topic: String, name: String },
    /// A topic references a document that is not defined
    UndefinedDocument { topic: String, document: String },
    /// A document has neither `path` nor `text`
    MissingDocumentSource { document: String },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Issue for a numeric field that must be positive
    pub(crate) fn zero(field: &str) -> Self {
        Self::error(
            ConfigIssueCode::ZeroValue {
                field: field.to_string(),
            },
            format!("{} must be greater than 0", field),
        )
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)
    }
}
