//! Diagnostics for non-fatal compiler findings
//!
//! Fatal conditions abort a compilation unit through [`crate::CssResError`].
//! Everything else (unknown classes in non-strict mode, unused accessors,
//! deprecated syntax) is collected here and returned alongside the output so
//! the host build tool can surface it.

mod renderer;

pub use renderer::{DiagnosticRenderer, OutputFormat};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in stylesheet source. Lines and columns are 1-based; a zero
/// line means the location is unknown (e.g. a node synthesized by a pass).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl Location {
    pub const fn new(line: u32, column: u32, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }

    pub const fn unknown() -> Self {
        Self {
            line: 0,
            column: 0,
            offset: 0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "<unknown>")
        }
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single reported finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// The selector, property or directive the finding is about
    pub subject: String,
    pub location: Location,
}

impl Diagnostic {
    pub fn warning(
        message: impl Into<String>,
        subject: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            subject: subject.into(),
            location,
        }
    }

    pub fn info(message: impl Into<String>, subject: impl Into<String>, location: Location) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
            subject: subject.into(),
            location,
        }
    }
}

/// Ordered collection of diagnostics for one compilation unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and mirror it to the tracing subscriber
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error | Severity::Warning => tracing::warn!(
                subject = %diagnostic.subject,
                location = %diagnostic.location,
                "{}",
                diagnostic.message
            ),
            Severity::Info => tracing::info!(
                subject = %diagnostic.subject,
                location = %diagnostic.location,
                "{}",
                diagnostic.message
            ),
        }
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new(4, 7, 52).to_string(), "4:7");
        assert_eq!(Location::unknown().to_string(), "<unknown>");
    }

    #[test]
    fn test_collector_filters_warnings() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::warning(
            "Unknown class",
            ".foo",
            Location::new(1, 1, 0),
        ));
        diagnostics.push(Diagnostic::info("Dropped empty rule", ".bar", Location::unknown()));

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.warnings().count(), 1);
        assert_eq!(diagnostics.warnings().next().unwrap().subject, ".foo");
    }
}
