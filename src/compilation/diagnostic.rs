use std::fmt;

use strum::Display;

/// Severity of a front-end diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Not shown to users by default
    Hidden,
    /// Informational message
    Info,
    /// Warning, does not fail emission
    Warning,
    /// Error, emission fails
    Error,
}

/// A diagnostic reported by the front end during emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Diagnostic id, e.g. `CS0103`
    pub id: String,
    /// Severity
    pub severity: Severity,
    /// Rendered message
    pub message: String,
    /// Source location, e.g. `a.cs(3,9)`
    pub location: Option<String>,
}

impl Diagnostic {
    /// Create a diagnostic without a location
    pub fn new(id: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            severity,
            message: message.into(),
            location: None,
        }
    }

    /// Attach a source location
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// True for error-severity diagnostics
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{location}: ")?;
        }
        write!(f, "{} {}: {}", self.severity, self.id, self.message)
    }
}
