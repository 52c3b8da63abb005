//! Stylesheet syntax tree
//!
//! The tree is produced once by the front-end parser and then mutated in
//! place, pass by pass. Container nodes (`@if`, `@media`, `@noflip`) own their
//! children directly; an `@if`/`@elif`/`@else` chain is a linked list of
//! [`If`] links rather than a flat node list.

pub mod visit;

use crate::diagnostics::Location;
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a node within a tree, used to detect double visits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a process-unique id
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Root of a parsed stylesheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    pub nodes: Vec<Node>,
}

impl Stylesheet {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

/// A node in a stylesheet node list
///
/// Cloning keeps the id, so a cloned tree has the same identities as its
/// original. Use [`Node::new`] for nodes synthesized by a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub location: Location,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind, location: Location) -> Self {
        Self {
            id: NodeId::fresh(),
            location,
            kind,
        }
    }

    /// Short description used in diagnostics
    pub fn describe(&self) -> String {
        match &self.kind {
            NodeKind::Rule(rule) => rule.selector_text(),
            NodeKind::Def(def) => format!("@def {}", def.key),
            NodeKind::Binding(binding) => format!("{} {}", binding.kind, binding.key),
            NodeKind::External(_) => "@external".to_string(),
            NodeKind::If(_) => "@if".to_string(),
            NodeKind::Media(media) => format!("@media {}", media.queries.join(", ")),
            NodeKind::FontFace(_) => "@font-face".to_string(),
            NodeKind::Page(_) => "@page".to_string(),
            NodeKind::NoFlip(_) => "@noflip".to_string(),
            NodeKind::Sprite(sprite) => format!("@sprite {}", join_selectors(&sprite.selectors)),
            NodeKind::Unknown(unknown) => format!("@{}", unknown.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Rule(Rule),
    Def(Def),
    Binding(Binding),
    External(ExternalSelectors),
    If(If),
    Media(MediaRule),
    FontFace(FontFace),
    Page(PageRule),
    NoFlip(NoFlip),
    Sprite(Sprite),
    Unknown(UnknownAtRule),
}

/// An ordinary style rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    pub selectors: Vec<Selector>,
    pub properties: Vec<Property>,
}

impl Rule {
    pub fn new(selectors: Vec<Selector>, properties: Vec<Property>) -> Self {
        Self {
            selectors,
            properties,
        }
    }

    pub fn selector_text(&self) -> String {
        join_selectors(&self.selectors)
    }
}

fn join_selectors(selectors: &[Selector]) -> String {
    selectors
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// A single selector. Class tokens are derived from the text on demand so
/// they cannot drift from it after renaming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    pub text: String,
}

impl Selector {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Class tokens referenced by this selector, in order of appearance
    pub fn classes(&self) -> Vec<String> {
        let mut classes = Vec::new();
        scan_classes(&self.text, |class| {
            classes.push(class.to_string());
            None
        });
        classes
    }

    /// Rewrite class tokens in place. `rename` returns the replacement for a
    /// class, or `None` to keep it.
    pub fn rename_classes(&mut self, mut rename: impl FnMut(&str) -> Option<String>) {
        self.text = scan_classes(&self.text, |class| rename(class));
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

/// Walk the class tokens of a selector, skipping attribute selectors and
/// strings, and return the text with the callback's replacements applied.
fn scan_classes(text: &str, mut on_class: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '[' => {
                out.push(c);
                let mut quote: Option<char> = None;
                for (_, c) in chars.by_ref() {
                    out.push(c);
                    match quote {
                        Some(q) if c == q => quote = None,
                        Some(_) => {}
                        None if c == '"' || c == '\'' => quote = Some(c),
                        None if c == ']' => break,
                        None => {}
                    }
                }
            }
            '"' | '\'' => {
                out.push(c);
                for (_, inner) in chars.by_ref() {
                    out.push(inner);
                    if inner == c {
                        break;
                    }
                }
            }
            '.' if chars
                .peek()
                .is_some_and(|(_, next)| is_ident_char(*next) && !next.is_ascii_digit()) =>
            {
                out.push('.');
                let start = i + 1;
                let mut end = start;
                while let Some(&(j, next)) = chars.peek() {
                    if !is_ident_char(next) {
                        break;
                    }
                    end = j + next.len_utf8();
                    chars.next();
                }
                let class = &text[start..end];
                match on_class(class) {
                    Some(renamed) => out.push_str(&renamed),
                    None => out.push_str(class),
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// A declaration: name, values and the `!important` flag
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub values: Vec<Value>,
    pub important: bool,
    pub location: Location,
}

impl Property {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
            important: false,
            location: Location::unknown(),
        }
    }

    /// Canonical text of the value list
    pub fn expression(&self) -> String {
        render_values(&self.values)
    }

    /// Content key used to compare declarations structurally
    pub fn content_key(&self) -> String {
        let mut key = format!("{}:{}", self.name, self.expression());
        if self.important {
            key.push_str("!important");
        }
        key.push(';');
        key
    }
}

/// A value in a declaration or `@def`
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Ident(String),
    /// Unquoted string content
    Str(String),
    Number { value: f64, unit: String },
    List(Vec<Value>),
    /// Operator or punctuation such as `,` or `/`
    Token(String),
    Function { name: String, args: Vec<Value> },
    /// `value('path', 'suffix')` reference to an external resource property
    SymbolPath { path: String, suffix: Option<String> },
    Dynamic(DynamicExpr),
}

impl Value {
    pub fn ident(text: impl Into<String>) -> Self {
        Value::Ident(text.into())
    }

    pub fn number(value: f64, unit: impl Into<String>) -> Self {
        Value::Number {
            value,
            unit: unit.into(),
        }
    }

    pub fn is_ident(&self, query: &str) -> bool {
        matches!(self, Value::Ident(ident) if ident.eq_ignore_ascii_case(query))
    }

    /// Whether the value is a separator rather than a component
    pub fn is_operator(&self) -> bool {
        matches!(self, Value::Token(_))
    }

    pub fn contains_dynamic(&self) -> bool {
        match self {
            Value::Dynamic(_) => true,
            Value::List(values) | Value::Function { args: values, .. } => {
                values.iter().any(Value::contains_dynamic)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Ident(ident) => f.write_str(ident),
            Value::Str(s) => {
                if s.contains('"') {
                    write!(f, "'{s}'")
                } else {
                    write!(f, "\"{s}\"")
                }
            }
            Value::Number { value, unit } => write!(f, "{}{unit}", format_number(*value)),
            Value::List(values) => f.write_str(&render_values(values)),
            Value::Token(token) => f.write_str(token),
            Value::Function { name, args } => write!(f, "{name}({})", render_values(args)),
            Value::SymbolPath { path, suffix } => match suffix {
                Some(suffix) => write!(f, "value('{path}', '{suffix}')"),
                None => write!(f, "value('{path}')"),
            },
            Value::Dynamic(expr) => write!(f, "{{{}}}", expr.expression()),
        }
    }
}

/// Format a number in its shortest round-trip form, without a trailing
/// fraction when it is integral
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{value}")
}

/// Render a value list with single spaces, keeping `,` and `/` tight
pub fn render_values(values: &[Value]) -> String {
    let mut out = String::new();
    let mut tight = true;
    for value in values {
        let is_separator = matches!(value, Value::Token(t) if t == "," || t == "/");
        if !tight && !is_separator {
            out.push(' ');
        }
        let _ = write!(out, "{value}");
        tight = is_separator;
    }
    out
}

/// A value only the caller can produce at code-generation time
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DynamicExpr {
    /// `@eval` binding: the runtime value of a symbol
    Eval { path: String },
    /// `@url` binding: a CSS `url(...)` built from a resource's URL
    Url { path: String },
    /// `value()` reference with an optional literal suffix
    Value { path: String, suffix: Option<String> },
}

impl DynamicExpr {
    pub fn path(&self) -> &str {
        match self {
            DynamicExpr::Eval { path } | DynamicExpr::Url { path } | DynamicExpr::Value { path, .. } => {
                path
            }
        }
    }

    /// Expression text handed to the code generator
    pub fn expression(&self) -> String {
        match self {
            DynamicExpr::Eval { path } => path.clone(),
            DynamicExpr::Url { path } => format!("url({path})"),
            DynamicExpr::Value { path, suffix } => match suffix {
                Some(suffix) => format!("{path} + \"{suffix}\""),
                None => path.clone(),
            },
        }
    }
}

/// `@def NAME value...;`
#[derive(Debug, Clone, PartialEq)]
pub struct Def {
    pub key: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Eval,
    Url,
}

impl BindingKind {
    pub fn directive(&self) -> &'static str {
        match self {
            BindingKind::Eval => "@eval",
            BindingKind::Url => "@url",
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directive())
    }
}

/// `@eval NAME path;` or `@url NAME path;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub kind: BindingKind,
    pub key: String,
    pub path: String,
}

/// `@external a, b*;`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalSelectors {
    pub patterns: Vec<String>,
}

/// Predicate of an `@if` link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Condition {
    /// Free-form expression left for the caller to evaluate at runtime
    Expression(String),
    /// `[!]axis value...` resolved statically against the property oracle
    Property {
        name: String,
        values: Vec<String>,
        negated: bool,
    },
    /// `@else`
    #[default]
    Always,
}

impl Condition {
    pub fn is_runtime(&self) -> bool {
        matches!(self, Condition::Expression(_))
    }
}

/// One link of an `@if`/`@elif`/`@else` chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct If {
    pub condition: Condition,
    pub location: Location,
    pub nodes: Vec<Node>,
    /// Next link, taken when this condition is false
    pub else_if: Option<Box<If>>,
}

impl If {
    pub fn new(condition: Condition, location: Location, nodes: Vec<Node>) -> Self {
        Self {
            condition,
            location,
            nodes,
            else_if: None,
        }
    }

    /// Append a link at the end of the chain
    pub fn push_link(&mut self, link: If) {
        match &mut self.else_if {
            Some(next) => next.push_link(link),
            None => self.else_if = Some(Box::new(link)),
        }
    }

    /// The last link of the chain
    pub fn last_link(&self) -> &If {
        match &self.else_if {
            Some(next) => next.last_link(),
            None => self,
        }
    }

    /// Iterate the links of the chain starting with this one
    pub fn links(&self) -> impl Iterator<Item = &If> {
        std::iter::successors(Some(self), |link| link.else_if.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaRule {
    pub queries: Vec<String>,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontFace {
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRule {
    pub pseudo_page: Option<String>,
    pub properties: Vec<Property>,
}

/// Subtree exempt from right-to-left mirroring
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoFlip {
    pub nodes: Vec<Node>,
}

/// `@sprite` block naming an image resource to compose into a rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sprite {
    pub selectors: Vec<Selector>,
    /// Symbol path of the image, taken from the `gwt-image`/`image` property
    pub image: Option<String>,
    pub properties: Vec<Property>,
}

/// An at-rule passed through verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownAtRule {
    pub name: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_classes_skip_attributes_and_strings() {
        let selector = Selector::new(r#"div.menu > a.item[title=".fake"]:hover .other"#);
        assert_eq!(selector.classes(), vec!["menu", "item", "other"]);
    }

    #[test]
    fn test_rename_classes_rewrites_only_matches() {
        let mut selector = Selector::new(".menu .item, .menu-item");
        selector.rename_classes(|class| (class == "menu").then(|| "AA".to_string()));
        assert_eq!(selector.text, ".AA .item, .menu-item");
    }

    #[test]
    fn test_render_values_keeps_separators_tight() {
        let values = vec![
            Value::ident("Arial"),
            Value::Token(",".to_string()),
            Value::ident("sans-serif"),
        ];
        assert_eq!(render_values(&values), "Arial,sans-serif");

        let values = vec![Value::number(1.5, "em"), Value::Token("/".to_string()), Value::number(2.0, "")];
        assert_eq!(render_values(&values), "1.5em/2");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(-0.0), "0");
    }

    #[test]
    fn test_format_number_keeps_every_digit() {
        assert_eq!(format_number(1.00001), "1.00001");
        assert_eq!(format_number(0.00001), "0.00001");
        assert_eq!(format_number(33.333333), "33.333333");
        assert_eq!(format_number(1e20), "100000000000000000000");
    }

    #[test]
    fn test_if_chain_links() {
        let mut head = If::new(Condition::Expression("a".into()), Location::unknown(), vec![]);
        head.push_link(If::new(Condition::Expression("b".into()), Location::unknown(), vec![]));
        head.push_link(If::new(Condition::Always, Location::unknown(), vec![]));

        assert_eq!(head.links().count(), 3);
        assert_eq!(head.last_link().condition, Condition::Always);
    }
}
