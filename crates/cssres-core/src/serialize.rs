//! Stylesheet text output
//!
//! Rendering produces the final text together with the places where the
//! caller must splice in values it computes itself: dynamic expressions from
//! `@eval`/`@url`/`value()` and `@if` chains kept for runtime evaluation.
//! Substitutions are recorded in output order with the byte offset at which
//! the computed text belongs.

use crate::ast::{Condition, DynamicExpr, If, Node, NodeKind, Property, Rule, Selector, Value};
use crate::ast::Stylesheet;
use crate::config::OutputStyle;
use crate::error::CssResError;
use crate::result::Result;
use std::fmt::Write as _;

/// Rendering options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub style: OutputStyle,
}

impl RenderOptions {
    pub fn new(style: OutputStyle) -> Self {
        Self { style }
    }
}

/// Rendered text and the substitutions it still needs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    pub text: String,
    pub substitutions: Vec<Substitution>,
}

impl Rendered {
    /// Whether the text is final, with nothing left for the caller
    pub fn is_static(&self) -> bool {
        self.substitutions.is_empty()
    }

    /// Assemble the final text, asking `resolve` for each substitution
    ///
    /// Conditionals are decided by `condition` and the chosen branch is
    /// assembled recursively.
    pub fn assemble(
        &self,
        resolve: &mut dyn FnMut(&DynamicExpr) -> String,
        condition: &mut dyn FnMut(&str) -> bool,
    ) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for substitution in &self.substitutions {
            out.push_str(&self.text[cursor..substitution.offset]);
            cursor = substitution.offset;
            match &substitution.request {
                SubstitutionRequest::Value(expr) => out.push_str(&resolve(expr)),
                SubstitutionRequest::Conditional {
                    expression,
                    then,
                    otherwise,
                } => {
                    if condition(expression) {
                        out.push_str(&then.assemble(resolve, condition));
                    } else if let Some(otherwise) = otherwise {
                        out.push_str(&otherwise.assemble(resolve, condition));
                    }
                }
            }
        }
        out.push_str(&self.text[cursor..]);
        out
    }
}

/// A point in the output where the caller must insert computed text
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    /// Byte offset into [`Rendered::text`]
    pub offset: usize,
    pub request: SubstitutionRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubstitutionRequest {
    /// A value computed by the caller
    Value(DynamicExpr),
    /// An `@if` link evaluated at runtime; `otherwise` holds the rest of the
    /// chain
    Conditional {
        expression: String,
        then: Rendered,
        otherwise: Option<Rendered>,
    },
}

struct Writer<'a> {
    options: &'a RenderOptions,
    depth: usize,
    out: Rendered,
}

impl<'a> Writer<'a> {
    fn new(options: &'a RenderOptions, depth: usize) -> Self {
        Self {
            options,
            depth,
            out: Rendered::default(),
        }
    }

    fn pretty(&self) -> bool {
        self.options.style == OutputStyle::Pretty
    }

    fn indent(&mut self) {
        if self.pretty() {
            for _ in 0..self.depth {
                self.out.text.push_str("  ");
            }
        }
    }

    fn open_block(&mut self, header: &str) {
        self.indent();
        self.out.text.push_str(header);
        self.out.text.push_str(if self.pretty() { " {\n" } else { "{" });
        self.depth += 1;
    }

    fn close_block(&mut self) {
        self.depth -= 1;
        self.indent();
        self.out.text.push_str(if self.pretty() { "}\n" } else { "}" });
    }

    fn record(&mut self, request: SubstitutionRequest) {
        self.out.substitutions.push(Substitution {
            offset: self.out.text.len(),
            request,
        });
    }

    fn nodes(&mut self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            self.node(node)?;
        }
        Ok(())
    }

    fn node(&mut self, node: &Node) -> Result<()> {
        match &node.kind {
            NodeKind::Rule(rule) => self.rule(rule),
            NodeKind::Def(_) | NodeKind::Binding(_) | NodeKind::External(_) => {}
            NodeKind::If(head) => {
                let request = self.conditional(head)?;
                self.record(request);
            }
            NodeKind::Media(media) => {
                let body = Writer::new(self.options, self.depth + 1).render(&media.nodes)?;
                if !body.text.is_empty() || !body.substitutions.is_empty() {
                    self.open_block(&format!("@media {}", media.queries.join(",")));
                    self.append(body);
                    self.close_block();
                }
            }
            NodeKind::FontFace(font_face) => {
                self.declaration_block("@font-face", &font_face.properties)
            }
            NodeKind::Page(page) => {
                let header = match &page.pseudo_page {
                    Some(pseudo) => format!("@page {pseudo}"),
                    None => "@page".to_string(),
                };
                self.declaration_block(&header, &page.properties);
            }
            NodeKind::NoFlip(no_flip) => self.nodes(&no_flip.nodes)?,
            NodeKind::Sprite(_) => {
                return Err(CssResError::internal_error(format!(
                    "{} at {} reached the serializer unexpanded",
                    node.describe(),
                    node.location
                )));
            }
            NodeKind::Unknown(unknown) => {
                self.indent();
                self.out.text.push_str(&unknown.text);
                if self.pretty() {
                    self.out.text.push('\n');
                }
            }
        }
        Ok(())
    }

    fn rule(&mut self, rule: &Rule) {
        if rule.properties.is_empty() || rule.selectors.is_empty() {
            return;
        }
        let separator = if self.pretty() { ", " } else { "," };
        let header = rule
            .selectors
            .iter()
            .map(|s: &Selector| s.text.as_str())
            .collect::<Vec<_>>()
            .join(separator);
        self.declaration_block(&header, &rule.properties);
    }

    fn declaration_block(&mut self, header: &str, properties: &[Property]) {
        if properties.is_empty() {
            return;
        }
        self.open_block(header);
        for property in properties {
            self.property(property);
        }
        self.close_block();
    }

    fn property(&mut self, property: &Property) {
        self.indent();
        self.out.text.push_str(&property.name);
        self.out.text.push_str(if self.pretty() { ": " } else { ":" });
        self.values(&property.values);
        if property.important {
            self.out.text.push_str(" !important");
        }
        self.out.text.push(';');
        if self.pretty() {
            self.out.text.push('\n');
        }
    }

    fn values(&mut self, values: &[Value]) {
        let mut tight = true;
        for value in values {
            let is_separator = matches!(value, Value::Token(t) if t == "," || t == "/");
            if !tight && !is_separator {
                self.out.text.push(' ');
            }
            self.value(value);
            tight = is_separator;
        }
    }

    fn value(&mut self, value: &Value) {
        match value {
            Value::Dynamic(expr) => self.record(SubstitutionRequest::Value(expr.clone())),
            Value::Function { name, args } if value.contains_dynamic() => {
                self.out.text.push_str(name);
                self.out.text.push('(');
                self.values(args);
                self.out.text.push(')');
            }
            Value::List(items) if value.contains_dynamic() => self.values(items),
            other => {
                let _ = write!(self.out.text, "{other}");
            }
        }
    }

    fn render(mut self, nodes: &[Node]) -> Result<Rendered> {
        self.nodes(nodes)?;
        Ok(self.out)
    }

    /// Splice output rendered by a nested writer, shifting its offsets
    fn append(&mut self, rendered: Rendered) {
        let base = self.out.text.len();
        self.out.text.push_str(&rendered.text);
        self.out
            .substitutions
            .extend(rendered.substitutions.into_iter().map(|substitution| Substitution {
                offset: base + substitution.offset,
                request: substitution.request,
            }));
    }

    fn branch(&self, nodes: &[Node]) -> Result<Rendered> {
        Writer::new(self.options, self.depth).render(nodes)
    }

    fn conditional(&self, link: &If) -> Result<SubstitutionRequest> {
        let Condition::Expression(expression) = &link.condition else {
            return Err(CssResError::internal_error(format!(
                "@if at {} must be resolved before rendering",
                link.location
            )));
        };
        let then = self.branch(&link.nodes)?;
        let otherwise = match link.else_if.as_deref() {
            None => None,
            Some(next) if next.condition == Condition::Always => Some(self.branch(&next.nodes)?),
            Some(next) => Some(Rendered {
                text: String::new(),
                substitutions: vec![Substitution {
                    offset: 0,
                    request: self.conditional(next)?,
                }],
            }),
        };
        Ok(SubstitutionRequest::Conditional {
            expression: expression.clone(),
            then,
            otherwise,
        })
    }
}

/// Render a stylesheet
pub fn render(sheet: &Stylesheet, options: &RenderOptions) -> Result<Rendered> {
    let mut writer = Writer::new(options, 0);
    writer.nodes(&sheet.nodes)?;
    tracing::debug!(
        "Rendered {} bytes with {} substitutions",
        writer.out.text.len(),
        writer.out.substitutions.len()
    );
    Ok(writer.out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_stylesheet;

    fn compact(text: &str) -> Rendered {
        let sheet = parse_stylesheet("test.css", text).unwrap().stylesheet;
        render(&sheet, &RenderOptions::default()).unwrap()
    }

    #[test]
    fn test_compact_form() {
        let out = compact(
            "@def X 1px;\n.a, .b { color: red; margin: 0 auto !important; } .empty { } @font-face { font-family: \"Foo\"; } @page :first { margin: 1in; } @charset \"utf-8\";",
        );
        assert_eq!(
            out.text,
            ".a,.b{color:red;margin:0 auto !important;}@font-face{font-family:\"Foo\";}@page :first{margin:1in;}@charset \"utf-8\";"
        );
        assert!(out.is_static());
    }

    #[test]
    fn test_pretty_form() {
        let sheet = parse_stylesheet(
            "test.css",
            ".a, .b { color: red; } @media print { .c { float: left; } }",
        )
        .unwrap()
        .stylesheet;
        let out = render(&sheet, &RenderOptions::new(OutputStyle::Pretty)).unwrap();
        insta::assert_snapshot!(out.text.trim_end(), @r"
        .a, .b {
          color: red;
        }
        @media print {
          .c {
            float: left;
          }
        }
        ");
    }

    #[test]
    fn test_dynamic_values_are_recorded_in_order() {
        let mut sheet = parse_stylesheet("test.css", ".a { color: red; }").unwrap().stylesheet;
        let NodeKind::Rule(rule) = &mut sheet.nodes[0].kind else {
            panic!("expected a rule");
        };
        rule.properties[0].values = vec![
            Value::Dynamic(DynamicExpr::Eval {
                path: "theme.color".into(),
            }),
            Value::Function {
                name: "rgba".into(),
                args: vec![Value::Dynamic(DynamicExpr::Value {
                    path: "theme.alpha".into(),
                    suffix: None,
                })],
            },
        ];

        let out = render(&sheet, &RenderOptions::default()).unwrap();
        assert_eq!(out.text, ".a{color: rgba();}");
        let offsets: Vec<usize> = out.substitutions.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![9, 15]);

        let text = out.assemble(&mut |expr| format!("<{}>", expr.path()), &mut |_| true);
        assert_eq!(text, ".a{color:<theme.color> rgba(<theme.alpha>);}");
    }

    #[test]
    fn test_runtime_conditionals() {
        let out = compact(
            ".x { color: red; } @if (a()) { .a { color: red; } } @elif (b()) { .b { color: red; } } @else { .c { color: red; } }",
        );
        assert_eq!(out.text, ".x{color:red;}");
        assert_eq!(out.substitutions.len(), 1);
        assert_eq!(out.substitutions[0].offset, 14);

        let pick = |wanted: &'static str| {
            out.assemble(&mut |_| String::new(), &mut |expr| expr == wanted)
        };
        assert_eq!(pick("(a())"), ".x{color:red;}.a{color:red;}");
        assert_eq!(pick("(b())"), ".x{color:red;}.b{color:red;}");
        assert_eq!(pick("none"), ".x{color:red;}.c{color:red;}");
    }

    #[test]
    fn test_empty_bodies_are_skipped() {
        let out = compact(
            "@media print { .a { } } @font-face { } @page :first { } @media screen { @media print { } }",
        );
        assert_eq!(out.text, "");
        assert!(out.is_static());

        let out = compact("@media print { .a { } .b { float: left; } } .c { }");
        assert_eq!(out.text, "@media print{.b{float:left;}}");
    }

    #[test]
    fn test_media_keeps_nested_substitutions() {
        let out = compact(".x { color: red; } @media print { @if (a()) { .a { color: red; } } }");
        assert_eq!(out.text, ".x{color:red;}@media print{}");
        assert_eq!(out.substitutions.len(), 1);
        assert_eq!(out.substitutions[0].offset, 27);
        assert_eq!(
            out.assemble(&mut |_| String::new(), &mut |_| true),
            ".x{color:red;}@media print{.a{color:red;}}"
        );
    }

    #[test]
    fn test_unexpanded_sprite_is_internal_error() {
        let sheet = parse_stylesheet("test.css", "@sprite .a { gwt-image: 'i'; }")
            .unwrap()
            .stylesheet;
        let err = render(&sheet, &RenderOptions::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    }
}
