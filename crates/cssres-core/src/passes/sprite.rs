//! `@sprite` expansion

use crate::ast::visit::{Context, ModVisitor, accept_with_insert_remove};
use crate::ast::{Node, NodeKind, Property, Rule, Sprite, Stylesheet, Value};
use crate::diagnostics::Location;
use crate::error::CssResError;
use crate::oracle::{ImageResource, ResourceKind, ResourceProvider};
use crate::result::Result;

/// Declarations that place an atlas image as an element's background
pub fn sprite_properties(image: &ImageResource, location: Location) -> Vec<Property> {
    let mut properties = Vec::with_capacity(4);
    if !image.repeat.repeats_vertically() {
        properties.push(Property::new(
            "height",
            vec![Value::number(f64::from(image.height), "px")],
        ));
    }
    if !image.repeat.repeats_horizontally() {
        properties.push(Property::new(
            "width",
            vec![Value::number(f64::from(image.width), "px")],
        ));
    }
    properties.push(Property::new("overflow", vec![Value::ident("hidden")]));
    properties.push(Property::new(
        "background",
        vec![
            Value::ident(format!("url({})", image.url)),
            Value::number(0.0 - f64::from(image.left), "px"),
            Value::number(0.0 - f64::from(image.top), "px"),
            Value::ident(image.repeat.keyword()),
        ],
    ));
    for property in &mut properties {
        property.location = location;
    }
    properties
}

struct Expander<'a> {
    provider: &'a dyn ResourceProvider,
    expanded: usize,
}

impl Expander<'_> {
    fn expand(&self, sprite: &Sprite, location: Location) -> Result<Rule> {
        let Some(path) = sprite.image.as_deref() else {
            return Err(CssResError::MissingSpriteImage {
                selectors: sprite
                    .selectors
                    .iter()
                    .map(|s| s.text.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
                location,
            });
        };
        let Some(ResourceKind::Image(image)) = self.provider.resolve(path) else {
            return Err(CssResError::unresolved_symbol("@sprite", path, location));
        };

        let mut properties = sprite_properties(&image, location);
        properties.extend(sprite.properties.iter().cloned());
        Ok(Rule::new(sprite.selectors.clone(), properties))
    }
}

impl ModVisitor for Expander<'_> {
    fn visit(&mut self, node: &mut Node, ctx: &mut Context) -> Result<bool> {
        let NodeKind::Sprite(sprite) = &node.kind else {
            return Ok(true);
        };
        let rule = self.expand(sprite, node.location)?;
        tracing::trace!("Expanded @sprite {}", rule.selector_text());
        ctx.replace_me(Node::new(NodeKind::Rule(rule), node.location));
        self.expanded += 1;
        Ok(false)
    }
}

/// Replace every `@sprite` with an ordinary rule
pub fn expand_sprites(sheet: &mut Stylesheet, provider: &dyn ResourceProvider) -> Result<usize> {
    let mut expander = Expander {
        provider,
        expanded: 0,
    };
    accept_with_insert_remove(&mut expander, &mut sheet.nodes)?;
    tracing::debug!("Expanded {} sprites", expander.expanded);
    Ok(expander.expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{RepeatStyle, StaticResourceProvider};
    use crate::parser::parse_stylesheet;
    use crate::serialize::{RenderOptions, render};

    fn provider(repeat: RepeatStyle) -> StaticResourceProvider {
        StaticResourceProvider::new()
            .with_resource(
                "images.icon",
                ResourceKind::Image(ImageResource {
                    width: 16,
                    height: 12,
                    left: 32,
                    top: 8,
                    url: "atlas.png".into(),
                    repeat,
                }),
            )
            .with_resource(
                "images.data",
                ResourceKind::Data {
                    url: "data.bin".into(),
                },
            )
    }

    fn expand(text: &str, repeat: RepeatStyle) -> Result<String> {
        let mut sheet = parse_stylesheet("test.css", text)?.stylesheet;
        expand_sprites(&mut sheet, &provider(repeat))?;
        Ok(render(&sheet, &RenderOptions::default())?.text)
    }

    #[test]
    fn test_generated_properties_precede_author_properties() {
        let out = expand(
            "@sprite .icon { gwt-image: 'images.icon'; cursor: pointer; }",
            RepeatStyle::None,
        )
        .unwrap();
        assert_eq!(
            out,
            ".icon{height:12px;width:16px;overflow:hidden;background:url(atlas.png) -32px -8px no-repeat;cursor:pointer;}"
        );
    }

    #[test]
    fn test_repeat_drops_the_repeated_dimension() {
        let out = expand("@sprite .bar { gwt-image: 'images.icon'; }", RepeatStyle::Horizontal).unwrap();
        assert_eq!(
            out,
            ".bar{height:12px;overflow:hidden;background:url(atlas.png) -32px -8px repeat-x;}"
        );

        let out = expand("@sprite .bar { gwt-image: 'images.icon'; }", RepeatStyle::Both).unwrap();
        assert_eq!(
            out,
            ".bar{overflow:hidden;background:url(atlas.png) -32px -8px repeat;}"
        );
    }

    #[test]
    fn test_missing_or_unresolvable_image() {
        let err = expand("@sprite .a { color: red; }", RepeatStyle::None).unwrap_err();
        assert!(matches!(err, CssResError::MissingSpriteImage { .. }));

        let err = expand("@sprite .a { gwt-image: 'images.none'; }", RepeatStyle::None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to resolve @sprite symbol 'images.none' at 1:1"
        );

        let err = expand("@sprite .a { gwt-image: 'images.data'; }", RepeatStyle::None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Resolve);
    }

    #[test]
    fn test_nested_sprites_are_expanded() {
        let out = expand(
            "@media print { @sprite .icon { gwt-image: 'images.icon'; } }",
            RepeatStyle::Both,
        )
        .unwrap();
        assert_eq!(
            out,
            "@media print{.icon{overflow:hidden;background:url(atlas.png) -32px -8px repeat;}}"
        );
    }
}
