//! Collaborators consulted during compilation
//!
//! [`PropertyOracle`] answers build-axis queries for property-keyed `@if`
//! blocks. [`ResourceProvider`] resolves symbol paths named by `@eval`,
//! `@url`, `value()` and `@sprite`. Both have in-memory implementations that
//! deserialize from the configuration file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Build-axis lookups
pub trait PropertyOracle: Send + Sync {
    /// Current value of a selection axis
    fn selection_value(&self, axis: &str) -> Option<String>;

    /// Declared values of a configuration axis, in declaration order
    fn configuration_values(&self, axis: &str) -> Option<Vec<String>>;

    /// Value used to decide a property-keyed `@if`: the selection value, or
    /// the first declared value of a configuration axis
    fn resolve_axis(&self, axis: &str) -> Option<String> {
        self.selection_value(axis).or_else(|| {
            self.configuration_values(axis)
                .and_then(|values| values.into_iter().next())
        })
    }
}

/// How a sprite image tiles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatStyle {
    #[default]
    None,
    Horizontal,
    Vertical,
    Both,
}

impl RepeatStyle {
    /// CSS `background-repeat` keyword
    pub fn keyword(&self) -> &'static str {
        match self {
            RepeatStyle::None => "no-repeat",
            RepeatStyle::Horizontal => "repeat-x",
            RepeatStyle::Vertical => "repeat-y",
            RepeatStyle::Both => "repeat",
        }
    }

    pub fn repeats_horizontally(&self) -> bool {
        matches!(self, RepeatStyle::Horizontal | RepeatStyle::Both)
    }

    pub fn repeats_vertically(&self) -> bool {
        matches!(self, RepeatStyle::Vertical | RepeatStyle::Both)
    }
}

/// An image placed in an atlas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImageResource {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub left: u32,
    #[serde(default)]
    pub top: u32,
    pub url: String,
    #[serde(default)]
    pub repeat: RepeatStyle,
}

/// What a symbol path resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResourceKind {
    Image(ImageResource),
    /// A resource with a URL but no geometry
    Data { url: String },
    /// Any other symbol, evaluated by the caller
    Expression,
}

impl ResourceKind {
    pub fn url(&self) -> Option<&str> {
        match self {
            ResourceKind::Image(image) => Some(&image.url),
            ResourceKind::Data { url } => Some(url),
            ResourceKind::Expression => None,
        }
    }
}

/// Resolves symbol paths to resources
pub trait ResourceProvider: Send + Sync {
    fn resolve(&self, path: &str) -> Option<ResourceKind>;
}

/// In-memory oracle backed by the `[axes]` and `[configuration-axes]` tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StaticPropertyOracle {
    #[serde(default)]
    pub axes: BTreeMap<String, String>,
    #[serde(default)]
    pub configuration_axes: BTreeMap<String, Vec<String>>,
}

impl StaticPropertyOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_axis(mut self, axis: impl Into<String>, value: impl Into<String>) -> Self {
        self.axes.insert(axis.into(), value.into());
        self
    }

    pub fn with_configuration_axis(
        mut self,
        axis: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.configuration_axes
            .insert(axis.into(), values.into_iter().map(Into::into).collect());
        self
    }
}

impl PropertyOracle for StaticPropertyOracle {
    fn selection_value(&self, axis: &str) -> Option<String> {
        self.axes.get(axis).cloned()
    }

    fn configuration_values(&self, axis: &str) -> Option<Vec<String>> {
        self.configuration_axes.get(axis).cloned()
    }
}

/// In-memory provider backed by the `[resources.<path>]` tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticResourceProvider {
    resources: BTreeMap<String, ResourceKind>,
}

impl StaticResourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, path: impl Into<String>, resource: ResourceKind) -> Self {
        self.resources.insert(path.into(), resource);
        self
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ResourceProvider for StaticResourceProvider {
    fn resolve(&self, path: &str) -> Option<ResourceKind> {
        self.resources.get(path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_axis_uses_first_value() {
        let oracle = StaticPropertyOracle::new()
            .with_axis("locale", "fr")
            .with_configuration_axis("theme", ["dark", "light"]);

        assert_eq!(oracle.resolve_axis("locale").as_deref(), Some("fr"));
        assert_eq!(oracle.resolve_axis("theme").as_deref(), Some("dark"));
        assert_eq!(oracle.resolve_axis("missing"), None);
    }

    #[test]
    fn test_resources_deserialize_from_toml() {
        let provider: StaticResourceProvider = toml::from_str(
            r#"
            ["images.logo"]
            kind = "image"
            width = 16
            height = 8
            left = 32
            url = "atlas.png"
            repeat = "horizontal"

            ["theme.font"]
            kind = "expression"
            "#,
        )
        .unwrap();

        let Some(ResourceKind::Image(image)) = provider.resolve("images.logo") else {
            panic!("expected an image");
        };
        assert_eq!(image.left, 32);
        assert_eq!(image.top, 0);
        assert_eq!(image.repeat, RepeatStyle::Horizontal);
        assert_eq!(provider.resolve("theme.font"), Some(ResourceKind::Expression));
        assert_eq!(provider.resolve("missing"), None);
    }
}
