//! Compiler configuration structure
//!
//! ## Example Configuration (cssres.toml)
//!
//! ```toml
//! strict = true
//! merge-enabled = true
//! style = "stable"
//! obfuscation-prefix = "G"
//! emit-rtl = true
//! cache-capacity = 256
//!
//! [axes]
//! locale = "fr"
//!
//! [configuration-axes]
//! theme = ["dark", "light"]
//!
//! [resources."images.logo"]
//! kind = "image"
//! width = 16
//! height = 16
//! url = "atlas.png"
//! ```

use crate::error::CssResError;
use crate::oracle::{StaticPropertyOracle, StaticResourceProvider};
use crate::result::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static VALID_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*)?$").unwrap());

/// Output formatting of the serializer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    /// Compact output, one rule per block with no whitespace
    #[default]
    Stable,
    /// One declaration per line with two-space indentation
    Pretty,
}

/// Settings that change how a stylesheet is compiled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CompilerConfig {
    /// Undeclared classes and unused accessors are fatal
    pub strict: bool,

    /// Run the split and merge canonicalization passes
    pub merge_enabled: bool,

    pub style: OutputStyle,

    /// Prepended to every generated class name
    pub obfuscation_prefix: String,

    /// Also render the right-to-left stylesheet
    pub emit_rtl: bool,

    /// Maximum number of parsed stylesheets kept by the parse cache
    pub cache_capacity: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            strict: false,
            merge_enabled: true,
            style: OutputStyle::Stable,
            obfuscation_prefix: String::new(),
            emit_rtl: true,
            cache_capacity: 256,
        }
    }
}

impl CompilerConfig {
    /// Check values that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if !is_valid_prefix(&self.obfuscation_prefix) {
            return Err(CssResError::config_error(format!(
                "obfuscation-prefix '{}' is not a valid class name start",
                self.obfuscation_prefix
            )));
        }
        if self.cache_capacity == 0 {
            return Err(CssResError::config_error(
                "cache-capacity must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn is_valid_prefix(prefix: &str) -> bool {
    VALID_PREFIX.is_match(prefix)
}

/// Contents of a configuration file: compiler settings plus the in-memory
/// collaborators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CssResConfig {
    #[serde(flatten)]
    pub compiler: CompilerConfig,

    #[serde(flatten)]
    pub oracle: StaticPropertyOracle,

    #[serde(default)]
    pub resources: StaticResourceProvider,
}

impl CssResConfig {
    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: CssResConfig = toml::from_str(content)
            .map_err(|e| CssResError::config_error(format!("Invalid TOML: {e}")))?;
        config.compiler.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{PropertyOracle, ResourceProvider};

    #[test]
    fn test_defaults() {
        let config = CssResConfig::from_toml("").unwrap();
        assert_eq!(config.compiler, CompilerConfig::default());
        assert!(config.compiler.merge_enabled);
        assert!(config.compiler.emit_rtl);
        assert_eq!(config.compiler.cache_capacity, 256);
        assert!(config.resources.is_empty());
    }

    #[test]
    fn test_full_file() {
        let config = CssResConfig::from_toml(
            r#"
strict = true
merge-enabled = false
style = "pretty"
obfuscation-prefix = "G"

[axes]
locale = "fr"

[configuration-axes]
theme = ["dark", "light"]

[resources."images.logo"]
kind = "data"
url = "logo.png"
"#,
        )
        .unwrap();

        assert!(config.compiler.strict);
        assert!(!config.compiler.merge_enabled);
        assert_eq!(config.compiler.style, OutputStyle::Pretty);
        assert_eq!(config.compiler.obfuscation_prefix, "G");
        assert_eq!(config.oracle.resolve_axis("locale").as_deref(), Some("fr"));
        assert_eq!(config.oracle.resolve_axis("theme").as_deref(), Some("dark"));
        assert!(config.resources.resolve("images.logo").is_some());
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        let err = CssResConfig::from_toml("obfuscation-prefix = \"9x\"").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: obfuscation-prefix '9x' is not a valid class name start"
        );
    }

    #[test]
    fn test_unknown_style_rejected() {
        let err = CssResConfig::from_toml("style = \"fancy\"").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }
}
