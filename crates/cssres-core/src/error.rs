//! Error types and handling for stylesheet compilation

use crate::diagnostics::Location;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for stylesheet compilation
#[derive(Debug, Error)]
pub enum CssResError {
    /// Syntax errors reported by the front-end parser
    #[error("Parse error in {source_name}: {message} at {location}")]
    Parse {
        source_name: String,
        message: String,
        location: Location,
    },

    /// An `@eval`, `@url`, `value()` or `@sprite` reference that the resource
    /// provider could not resolve
    #[error("Unable to resolve {directive} symbol '{path}' at {location}")]
    UnresolvedSymbol {
        directive: &'static str,
        path: String,
        location: Location,
    },

    /// An `@sprite` block without an image property
    #[error("The @sprite rule {selectors} must specify an image property at {location}")]
    MissingSpriteImage { selectors: String, location: Location },

    /// A property-keyed `@if` naming an axis the property oracle cannot resolve
    #[error("Unknown build axis '{axis}' in @if at {location}")]
    UnknownAxis { axis: String, location: Location },

    /// Strict mode: class tokens with no declared accessor
    #[error("Unobfuscated classes present in a strict stylesheet: {}", .classes.join(", "))]
    UndeclaredClasses { classes: Vec<String> },

    /// Strict mode: declared accessors never referenced by the stylesheet
    #[error("Declared class accessors missing from the stylesheet: {}", .names.join(", "))]
    UnusedAccessors { names: Vec<String> },

    /// An accessor that names both an `@def` constant and a class
    #[error("@def shadows CSS class name: {name}. Rename the @def or the class")]
    DefShadowsClass { name: String },

    /// Configuration loading or validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File system I/O errors
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Broken internal invariants (e.g. a node visited twice in one pass)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Error kind enumeration for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Resolve,
    Obfuscation,
    Config,
    Io,
    Internal,
}

impl CssResError {
    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CssResError::Parse { .. } => ErrorKind::Parse,
            CssResError::UnresolvedSymbol { .. }
            | CssResError::MissingSpriteImage { .. }
            | CssResError::UnknownAxis { .. } => ErrorKind::Resolve,
            CssResError::UndeclaredClasses { .. }
            | CssResError::UnusedAccessors { .. }
            | CssResError::DefShadowsClass { .. } => ErrorKind::Obfuscation,
            CssResError::Config { .. } => ErrorKind::Config,
            CssResError::Io { .. } => ErrorKind::Io,
            CssResError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Check if this error only aborts its own compilation unit, so a batch
    /// driver can continue with the remaining stylesheets
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Parse | ErrorKind::Resolve | ErrorKind::Obfuscation
        )
    }

    /// Source location of the offending node, when known
    pub fn location(&self) -> Option<Location> {
        match self {
            CssResError::Parse { location, .. }
            | CssResError::UnresolvedSymbol { location, .. }
            | CssResError::MissingSpriteImage { location, .. }
            | CssResError::UnknownAxis { location, .. } => Some(*location),
            _ => None,
        }
    }

    /// Create a parse error
    pub fn parse_error(
        source_name: impl Into<String>,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
            location,
        }
    }

    /// Create an unresolved symbol error
    pub fn unresolved_symbol(
        directive: &'static str,
        path: impl Into<String>,
        location: Location,
    ) -> Self {
        Self::UnresolvedSymbol {
            directive,
            path: path.into(),
            location,
        }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an IO error with path context
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for CssResError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = CssResError::unresolved_symbol("@url", "images.logo", Location::new(3, 5, 40));
        assert_eq!(err.kind(), ErrorKind::Resolve);
        assert!(err.is_recoverable());
        assert_eq!(err.location(), Some(Location::new(3, 5, 40)));

        let err = CssResError::config_error("bad prefix");
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(!err.is_recoverable());
        assert_eq!(err.location(), None);
    }

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = CssResError::UndeclaredClasses {
            classes: vec!["foo".to_string(), "bar".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unobfuscated classes present in a strict stylesheet: foo, bar"
        );

        let err = CssResError::UnknownAxis {
            axis: "locale".to_string(),
            location: Location::new(1, 1, 0),
        };
        assert_eq!(err.to_string(), "Unknown build axis 'locale' in @if at 1:1");
    }
}
