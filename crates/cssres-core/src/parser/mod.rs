//! Reference front-end parser
//!
//! Turns stylesheet text into the [`Stylesheet`] tree consumed by the
//! compiler passes. The parser does no resolution of its own: `@def` values
//! are kept as written and `@if` chains are linked but not evaluated.

pub mod lexer;

use crate::ast::{
    Binding, BindingKind, Condition, Def, ExternalSelectors, FontFace, If, MediaRule, NoFlip,
    Node, NodeKind, PageRule, Property, Rule, Selector, Sprite, Stylesheet, UnknownAtRule, Value,
};
use crate::diagnostics::{Diagnostic, Diagnostics, Location};
use crate::error::CssResError;
use crate::result::Result;
use lexer::{Token, TokenKind, lex, offset_to_line_col};
use std::path::Path;
use std::time::SystemTime;

/// One input file of a compilation unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Identity of the source, usually its path
    pub name: String,
    pub text: String,
    /// Last modification time, when known
    pub modified: Option<SystemTime>,
}

impl Source {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            modified: None,
        }
    }

    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Read a source from disk, recording its modification time
    pub fn from_path(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).map_err(|e| CssResError::io_error(path, e))?;
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok();
        Ok(Self {
            name: path.display().to_string(),
            text,
            modified,
        })
    }
}

/// Parser output: the tree plus non-fatal findings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStylesheet {
    pub stylesheet: Stylesheet,
    pub diagnostics: Diagnostics,
}

/// Parse a single stylesheet
pub fn parse_stylesheet(source_name: &str, text: &str) -> Result<ParsedStylesheet> {
    let mut parser = Parser::new(source_name, text)?;
    let nodes = parser.parse_nodes(false)?;
    tracing::debug!("Parsed {} top-level nodes from {}", nodes.len(), source_name);
    Ok(ParsedStylesheet {
        stylesheet: Stylesheet::new(nodes),
        diagnostics: parser.diagnostics,
    })
}

/// Parse several sources into one stylesheet, as though concatenated
pub fn parse_sources(sources: &[Source]) -> Result<ParsedStylesheet> {
    let mut parsed = ParsedStylesheet::default();
    for source in sources {
        let ParsedStylesheet {
            stylesheet,
            diagnostics,
        } = parse_stylesheet(&source.name, &source.text)?;
        parsed.stylesheet.nodes.extend(stylesheet.nodes);
        parsed.diagnostics.extend(diagnostics);
    }
    Ok(parsed)
}

struct Parser<'a> {
    source_name: &'a str,
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Diagnostics,
}

impl<'a> Parser<'a> {
    fn new(source_name: &'a str, source: &'a str) -> Result<Self> {
        let (tokens, errors) = lex(source);
        let parser = Self {
            source_name,
            source,
            tokens,
            pos: 0,
            diagnostics: Diagnostics::new(),
        };
        if let Some(error) = errors.into_iter().next() {
            return Err(parser.error(error.message, error.span.start));
        }
        Ok(parser)
    }

    fn location(&self, offset: usize) -> Location {
        let (line, column) = offset_to_line_col(self.source, offset);
        Location::new(line, column, offset)
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> CssResError {
        CssResError::parse_error(self.source_name, message, self.location(offset))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Offset of the current token, or the end of input
    fn offset(&self) -> usize {
        self.peek().map_or(self.source.len(), |t| t.span.start)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        match self.peek() {
            Some(token) if token.kind == kind => {}
            Some(token) => {
                return Err(self.error(
                    format!("Expected {what}, found '{}'", token.text),
                    token.span.start,
                ));
            }
            None => {
                return Err(
                    self.error(format!("Expected {what}, found end of input"), self.offset())
                );
            }
        }
        self.bump()
            .ok_or_else(|| self.error(format!("Expected {what}"), self.offset()))
    }

    fn parse_nodes(&mut self, nested: bool) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            match self.peek_kind() {
                None if nested => {
                    return Err(self.error("Expected '}' before end of input", self.offset()));
                }
                None => break,
                Some(TokenKind::RBrace) if nested => break,
                Some(TokenKind::RBrace) => return Err(self.error("Unexpected '}'", self.offset())),
                Some(TokenKind::Semicolon) => {
                    self.bump();
                }
                Some(TokenKind::AtKeyword) => nodes.push(self.parse_at_rule()?),
                Some(_) => nodes.push(self.parse_rule()?),
            }
        }
        Ok(nodes)
    }

    fn parse_block_nodes(&mut self) -> Result<Vec<Node>> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let nodes = self.parse_nodes(true)?;
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(nodes)
    }

    fn parse_rule(&mut self) -> Result<Node> {
        let location = self.location(self.offset());
        let selectors = self.parse_selectors()?;
        let properties = self.parse_declarations()?;
        Ok(Node::new(
            NodeKind::Rule(Rule::new(selectors, properties)),
            location,
        ))
    }

    /// Tokens up to (not including) the next top-level `{`
    fn prelude(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        loop {
            match self.peek_kind() {
                Some(TokenKind::LBrace) if depth == 0 => return Ok(tokens),
                Some(TokenKind::LParen | TokenKind::LBracket) => depth += 1,
                Some(TokenKind::RParen | TokenKind::RBracket) => depth = depth.saturating_sub(1),
                Some(TokenKind::Semicolon | TokenKind::RBrace) if depth == 0 => {
                    return Err(self.error("Expected '{'", self.offset()));
                }
                None => return Err(self.error("Expected '{' before end of input", self.offset())),
                Some(_) => {}
            }
            tokens.extend(self.bump());
        }
    }

    /// Tokens of a `;`-terminated statement; the `;` is consumed
    fn statement(&mut self, directive: &str) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenKind::Semicolon) => {
                    self.bump();
                    return Ok(tokens);
                }
                None => return Ok(tokens),
                Some(TokenKind::LBrace | TokenKind::RBrace) => {
                    return Err(self.error(
                        format!("Expected ';' to terminate {directive}"),
                        self.offset(),
                    ));
                }
                Some(_) => tokens.extend(self.bump()),
            }
        }
    }

    fn parse_selectors(&mut self) -> Result<Vec<Selector>> {
        let start = self.offset();
        let tokens = self.prelude()?;
        let selectors: Vec<Selector> = split_top_level(&tokens)
            .into_iter()
            .map(|part| Selector::new(tokens_text(part)))
            .collect();
        if selectors.is_empty() || selectors.iter().any(|s| s.text.is_empty()) {
            return Err(self.error("Expected a selector", start));
        }
        Ok(selectors)
    }

    fn parse_declarations(&mut self) -> Result<Vec<Property>> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut properties = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenKind::RBrace) => {
                    self.bump();
                    return Ok(properties);
                }
                Some(TokenKind::Semicolon) => {
                    self.bump();
                }
                None => return Err(self.error("Expected '}' before end of input", self.offset())),
                Some(_) => properties.push(self.parse_declaration()?),
            }
        }
    }

    fn parse_declaration(&mut self) -> Result<Property> {
        let start = self.offset();
        let mut name = String::new();
        // Accept the `*prop` hack by folding the star into the name
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Ident => {
                    name.push_str(&token.text);
                    self.bump();
                    break;
                }
                TokenKind::Delim if token.text == "*" || token.text == "_" => {
                    name.push_str(&token.text);
                    self.bump();
                }
                _ => break,
            }
        }
        if name.is_empty() {
            let found = self.peek().map_or("end of input".to_string(), |t| t.text.clone());
            return Err(self.error(format!("Expected a property name, found '{found}'"), start));
        }
        self.expect(TokenKind::Colon, "':'")?;

        let mut tokens = Vec::new();
        let mut depth = 0usize;
        loop {
            match self.peek_kind() {
                Some(TokenKind::Semicolon | TokenKind::RBrace) if depth == 0 => break,
                Some(TokenKind::LParen) => depth += 1,
                Some(TokenKind::RParen) => depth = depth.saturating_sub(1),
                None => break,
                Some(_) => {}
            }
            tokens.extend(self.bump());
        }

        let mut important = false;
        if let [.., bang, word] = tokens.as_slice()
            && bang.is_delim('!')
            && word.kind == TokenKind::Ident
            && word.text.eq_ignore_ascii_case("important")
        {
            important = true;
            tokens.truncate(tokens.len() - 2);
        }

        if tokens.is_empty() {
            return Err(self.error(format!("Expected a value for property '{name}'"), start));
        }
        let values = self.parse_values(&tokens)?;
        Ok(Property {
            name,
            values,
            important,
            location: self.location(start),
        })
    }

    fn parse_values(&self, tokens: &[Token]) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match token.kind {
                TokenKind::Ident
                    if tokens
                        .get(i + 1)
                        .is_some_and(|next| next.kind == TokenKind::LParen && !next.space_before) =>
                {
                    let close = matching_paren(tokens, i + 1)
                        .ok_or_else(|| self.error("Unbalanced '('", tokens[i + 1].span.start))?;
                    let inner = &tokens[i + 2..close];
                    values.push(self.parse_function(token, inner)?);
                    i = close + 1;
                    continue;
                }
                TokenKind::LParen => {
                    let close = matching_paren(tokens, i)
                        .ok_or_else(|| self.error("Unbalanced '('", token.span.start))?;
                    values.push(Value::Function {
                        name: String::new(),
                        args: self.parse_values(&tokens[i + 1..close])?,
                    });
                    i = close + 1;
                    continue;
                }
                TokenKind::RParen => return Err(self.error("Unbalanced ')'", token.span.start)),
                TokenKind::Ident | TokenKind::Hash | TokenKind::Url => {
                    values.push(Value::Ident(token.text.clone()));
                }
                TokenKind::Str => values.push(Value::Str(unquote(&token.text).to_string())),
                TokenKind::Number => values.push(self.parse_number(token)?),
                _ => values.push(Value::Token(token.text.clone())),
            }
            i += 1;
        }
        Ok(values)
    }

    fn parse_function(&self, name: &Token, inner: &[Token]) -> Result<Value> {
        match name.text.to_ascii_lowercase().as_str() {
            "value" => {
                let parts = split_top_level(inner);
                let text = |part: &[Token]| match part {
                    [single] if single.kind == TokenKind::Str => unquote(&single.text).to_string(),
                    _ => tokens_text(part),
                };
                match parts.as_slice() {
                    [path] if !path.is_empty() => Ok(Value::SymbolPath {
                        path: text(*path),
                        suffix: None,
                    }),
                    [path, suffix] if !path.is_empty() => Ok(Value::SymbolPath {
                        path: text(*path),
                        suffix: Some(text(*suffix)),
                    }),
                    _ => Err(self.error(
                        "value() expects a symbol path and an optional suffix",
                        name.span.start,
                    )),
                }
            }
            "literal" => match inner {
                [single] if single.kind == TokenKind::Str => {
                    Ok(Value::Ident(unquote(&single.text).to_string()))
                }
                _ => Err(self.error("literal() expects a single string", name.span.start)),
            },
            _ => Ok(Value::Function {
                name: name.text.clone(),
                args: self.parse_values(inner)?,
            }),
        }
    }

    fn parse_number(&self, token: &Token) -> Result<Value> {
        let text = token.text.as_str();
        let split = text
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
            .map_or(text.len(), |(i, _)| i);
        let (number, unit) = text.split_at(split);
        let value: f64 = number
            .parse()
            .map_err(|_| self.error(format!("Invalid number '{text}'"), token.span.start))?;
        Ok(Value::number(value, unit))
    }

    fn parse_at_rule(&mut self) -> Result<Node> {
        let start = self.offset();
        let location = self.location(start);
        let Some(keyword) = self.bump() else {
            return Err(self.error("Expected an at-rule", start));
        };

        let kind = match keyword.text.to_ascii_lowercase().as_str() {
            "def" => self.parse_def(start)?,
            "eval" => self.parse_binding(BindingKind::Eval, start)?,
            "url" => self.parse_binding(BindingKind::Url, start)?,
            "external" => self.parse_external()?,
            "if" => NodeKind::If(self.parse_if(location)?),
            "elif" | "else" => {
                return Err(self.error(
                    format!("@{} must immediately follow an @if or @elif", keyword.text),
                    start,
                ));
            }
            "noflip" => NodeKind::NoFlip(NoFlip {
                nodes: self.parse_block_nodes()?,
            }),
            "sprite" => self.parse_sprite()?,
            "media" => {
                let prelude = self.prelude()?;
                let queries = split_top_level(&prelude)
                    .into_iter()
                    .map(tokens_text)
                    .filter(|q| !q.is_empty())
                    .collect();
                NodeKind::Media(MediaRule {
                    queries,
                    nodes: self.parse_block_nodes()?,
                })
            }
            "font-face" => NodeKind::FontFace(FontFace {
                properties: self.parse_declarations()?,
            }),
            "page" => {
                let prelude = self.prelude()?;
                let pseudo_page = (!prelude.is_empty()).then(|| tokens_text(&prelude));
                NodeKind::Page(PageRule {
                    pseudo_page,
                    properties: self.parse_declarations()?,
                })
            }
            _ => self.parse_unknown(&keyword.text, start)?,
        };

        Ok(Node::new(kind, location))
    }

    fn parse_def(&mut self, start: usize) -> Result<NodeKind> {
        let tokens = self.statement("@def")?;
        match tokens.split_first() {
            Some((key, rest)) if key.kind == TokenKind::Ident && !rest.is_empty() => {
                Ok(NodeKind::Def(Def {
                    key: key.text.clone(),
                    values: self.parse_values(rest)?,
                }))
            }
            Some((key, rest)) if !rest.is_empty() => Err(self.error(
                format!("First lexical unit of @def must be an identifier, found '{}'", key.text),
                key.span.start,
            )),
            _ => Err(self.error(
                "@def rules must specify an identifier and one or more values",
                start,
            )),
        }
    }

    fn parse_binding(&mut self, kind: BindingKind, start: usize) -> Result<NodeKind> {
        let tokens = self.statement(kind.directive())?;
        let malformed = || {
            self.error(
                format!("Incorrect number of parts for {kind}, expected {kind} NAME path"),
                start,
            )
        };
        let Some((key, path)) = tokens.split_first() else {
            return Err(malformed());
        };
        if key.kind != TokenKind::Ident
            || path.is_empty()
            || path.iter().skip(1).any(|t| t.space_before)
        {
            return Err(malformed());
        }
        let path = match path {
            [single] if single.kind == TokenKind::Str => unquote(&single.text).to_string(),
            _ => path.iter().map(|t| t.text.as_str()).collect(),
        };
        Ok(NodeKind::Binding(Binding {
            kind,
            key: key.text.clone(),
            path,
        }))
    }

    fn parse_external(&mut self) -> Result<NodeKind> {
        let tokens = self.statement("@external")?;
        let mut patterns: Vec<String> = Vec::new();
        let mut current = String::new();
        for token in &tokens {
            if token.kind == TokenKind::Comma || token.space_before {
                patterns.push(std::mem::take(&mut current));
            }
            if token.kind != TokenKind::Comma {
                current.push_str(&token.text);
            }
        }
        patterns.push(current);

        let patterns = patterns
            .into_iter()
            .map(|p| p.replace('.', ""))
            .filter(|p| !p.is_empty())
            .collect();
        Ok(NodeKind::External(ExternalSelectors { patterns }))
    }

    fn parse_if(&mut self, location: Location) -> Result<If> {
        let condition = self.parse_condition(location)?;
        let mut head = If::new(condition, location, self.parse_block_nodes()?);

        while let Some(token) = self.peek().filter(|t| t.kind == TokenKind::AtKeyword) {
            let link_start = token.span.start;
            let link_location = self.location(link_start);
            match token.text.to_ascii_lowercase().as_str() {
                "elif" => {
                    self.bump();
                    let condition = self.parse_condition(link_location)?;
                    let nodes = self.parse_block_nodes()?;
                    head.push_link(If::new(condition, link_location, nodes));
                }
                "else" => {
                    self.bump();
                    let nodes = self.parse_block_nodes()?;
                    head.push_link(If::new(Condition::Always, link_location, nodes));
                    break;
                }
                _ => break,
            }
        }

        Ok(head)
    }

    fn parse_condition(&mut self, location: Location) -> Result<Condition> {
        let start = self.offset();
        let tokens = self.prelude()?;
        let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
            return Err(self.error("Incorrect format for @if predicate", start));
        };

        if first.kind == TokenKind::LParen && last.kind == TokenKind::RParen {
            let text = &self.source[first.span.start..last.span.end];
            return Ok(Condition::Expression(text.to_string()));
        }

        let words = whitespace_words(&tokens);
        match words.as_slice() {
            [] => Err(self.error("Incorrect format for @if predicate", start)),
            [word] => {
                self.diagnostics.push(Diagnostic::warning(
                    "Deprecated syntax for runtime expression detected, enclose the expression in parentheses",
                    format!("@if {word}"),
                    location,
                ));
                Ok(Condition::Expression(word.clone()))
            }
            [name, values @ ..] => {
                let (name, negated) = match name.strip_prefix('!') {
                    Some(stripped) => (stripped.to_string(), true),
                    None => (name.clone(), false),
                };
                if name.is_empty() {
                    return Err(self.error("Incorrect format for @if predicate", start));
                }
                Ok(Condition::Property {
                    name,
                    values: values.iter().map(|v| unquote(v).to_string()).collect(),
                    negated,
                })
            }
        }
    }

    fn parse_sprite(&mut self) -> Result<NodeKind> {
        let selectors = self.parse_selectors()?;
        let mut properties = self.parse_declarations()?;
        let mut image = None;
        properties.retain(|property| {
            let is_image = property.name.eq_ignore_ascii_case("gwt-image")
                || property.name.eq_ignore_ascii_case("image");
            if is_image {
                image = property.values.first().map(|value| match value {
                    Value::Str(path) | Value::Ident(path) => path.clone(),
                    Value::SymbolPath { path, .. } => path.clone(),
                    other => other.to_string(),
                });
            }
            !is_image
        });
        Ok(NodeKind::Sprite(Sprite {
            selectors,
            image,
            properties,
        }))
    }

    fn parse_unknown(&mut self, name: &str, start: usize) -> Result<NodeKind> {
        let mut depth = 0usize;
        let end = loop {
            let Some(token) = self.bump() else {
                if depth > 0 {
                    return Err(self.error(format!("Unterminated @{name} block"), start));
                }
                break self.source.len();
            };
            match token.kind {
                TokenKind::Semicolon if depth == 0 => break token.span.end,
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace if depth == 0 => {
                    return Err(self.error("Unexpected '}'", token.span.start));
                }
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        break token.span.end;
                    }
                }
                _ => {}
            }
        };
        Ok(NodeKind::Unknown(UnknownAtRule {
            name: name.to_string(),
            text: self.source[start..end].to_string(),
        }))
    }
}

/// Rebuild source-like text from tokens, with single spaces where the
/// source had whitespace
fn tokens_text(tokens: &[Token]) -> String {
    let mut text = String::new();
    for token in tokens {
        if token.space_before && !text.is_empty() {
            text.push(' ');
        }
        if token.kind == TokenKind::AtKeyword {
            text.push('@');
        }
        text.push_str(&token.text);
    }
    text
}

/// Split tokens on commas outside parentheses and brackets
fn split_top_level(tokens: &[Token]) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
            TokenKind::Comma if depth == 0 => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if !tokens.is_empty() {
        parts.push(&tokens[start..]);
    }
    parts
}

/// Group tokens into whitespace-separated words
fn whitespace_words(tokens: &[Token]) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for token in tokens {
        match words.last_mut() {
            Some(word) if !token.space_before => word.push_str(&token.text),
            _ => words.push(token.text.clone()),
        }
    }
    words
}

fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn unquote(text: &str) -> &str {
    let bytes = text.as_bytes();
    match bytes {
        [b'"', .., b'"'] | [b'\'', .., b'\''] if text.len() >= 2 => &text[1..text.len() - 1],
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<Node> {
        parse_stylesheet("test.css", text).unwrap().stylesheet.nodes
    }

    #[test]
    fn test_parse_rule_with_selector_list() {
        let nodes = parse(".a, div.b > .c:hover { color: red; margin: 0 auto !important }");
        let NodeKind::Rule(rule) = &nodes[0].kind else {
            panic!("expected a rule");
        };
        assert_eq!(rule.selector_text(), ".a,div.b > .c:hover");
        assert_eq!(rule.properties.len(), 2);
        assert_eq!(rule.properties[1].expression(), "0 auto");
        assert!(rule.properties[1].important);
        assert_eq!(nodes[0].location, Location::new(1, 1, 0));
    }

    #[test]
    fn test_parse_values() {
        let nodes = parse(
            ".a { font: 12px/1.5 \"Helvetica Neue\", Arial; background: url(x.png) rgba(0, 0, 0, .5); width: value('images.logo', 'px'); filter: literal(\"progid:DX()\"); }",
        );
        let NodeKind::Rule(rule) = &nodes[0].kind else {
            panic!("expected a rule");
        };
        assert_eq!(rule.properties[0].expression(), "12px/1.5 \"Helvetica Neue\",Arial");
        assert_eq!(rule.properties[1].expression(), "url(x.png) rgba(0,0,0,0.5)");
        assert_eq!(
            rule.properties[2].values,
            vec![Value::SymbolPath {
                path: "images.logo".into(),
                suffix: Some("px".into()),
            }]
        );
        assert_eq!(rule.properties[3].values, vec![Value::ident("progid:DX()")]);
    }

    #[test]
    fn test_parse_directives() {
        let nodes = parse(
            "@def SIZE 10px 2px;\n@eval COLOR theme.primary;\n@url LOGO images.logo;\n@external .foo, bar-*;",
        );
        assert_eq!(
            nodes[0].kind,
            NodeKind::Def(Def {
                key: "SIZE".into(),
                values: vec![Value::number(10.0, "px"), Value::number(2.0, "px")],
            })
        );
        assert_eq!(
            nodes[1].kind,
            NodeKind::Binding(Binding {
                kind: BindingKind::Eval,
                key: "COLOR".into(),
                path: "theme.primary".into(),
            })
        );
        assert_eq!(nodes[2].location, Location::new(3, 1, 47));
        assert_eq!(
            nodes[3].kind,
            NodeKind::External(ExternalSelectors {
                patterns: vec!["foo".into(), "bar-*".into()],
            })
        );
    }

    #[test]
    fn test_parse_if_chain() {
        let nodes = parse(
            "@if locale \"en\" fr { .a { color: red; } } @elif !user.agent ie6 { .b { color: green; } } @elif (isRtl()) { } @else { .c { color: blue; } }",
        );
        assert_eq!(nodes.len(), 1);
        let NodeKind::If(head) = &nodes[0].kind else {
            panic!("expected an @if");
        };
        let conditions: Vec<&Condition> = head.links().map(|l| &l.condition).collect();
        assert_eq!(
            conditions,
            vec![
                &Condition::Property {
                    name: "locale".into(),
                    values: vec!["en".into(), "fr".into()],
                    negated: false,
                },
                &Condition::Property {
                    name: "user.agent".into(),
                    values: vec!["ie6".into()],
                    negated: true,
                },
                &Condition::Expression("(isRtl())".into()),
                &Condition::Always,
            ]
        );
    }

    #[test]
    fn test_deprecated_if_predicate_warns() {
        let parsed = parse_stylesheet("test.css", "@if isRtl { .a { float: left; } }").unwrap();
        assert_eq!(parsed.diagnostics.len(), 1);
        let NodeKind::If(head) = &parsed.stylesheet.nodes[0].kind else {
            panic!("expected an @if");
        };
        assert_eq!(head.condition, Condition::Expression("isRtl".into()));
    }

    #[test]
    fn test_parse_containers() {
        let nodes = parse(
            "@media print, screen and (max-width: 100px) { .a { color: red; } }\n@font-face { font-family: X; }\n@page :first { margin: 1in; }\n@noflip { .b { float: left; } }\n@sprite .logo { gwt-image: 'images.logo'; cursor: pointer; }\n@charset \"utf-8\";",
        );
        let NodeKind::Media(media) = &nodes[0].kind else {
            panic!("expected @media");
        };
        assert_eq!(media.queries, vec!["print", "screen and (max-width: 100px)"]);
        let NodeKind::Page(page) = &nodes[2].kind else {
            panic!("expected @page");
        };
        assert_eq!(page.pseudo_page.as_deref(), Some(":first"));
        let NodeKind::Sprite(sprite) = &nodes[4].kind else {
            panic!("expected @sprite");
        };
        assert_eq!(sprite.image.as_deref(), Some("images.logo"));
        assert_eq!(sprite.properties.len(), 1);
        assert_eq!(
            nodes[5].kind,
            NodeKind::Unknown(UnknownAtRule {
                name: "charset".into(),
                text: "@charset \"utf-8\";".into(),
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_stylesheet("bad.css", "@else { .a { color: red; } }").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error in bad.css: @else must immediately follow an @if or @elif at 1:1"
        );

        let err = parse_stylesheet("bad.css", "@eval A b c;").unwrap_err();
        assert!(err.to_string().contains("Incorrect number of parts for @eval"));

        let err = parse_stylesheet("bad.css", "@def 10px;").unwrap_err();
        assert!(err.to_string().contains("one or more values"));

        let err = parse_stylesheet("bad.css", ".a { color: red;\n").unwrap_err();
        assert_eq!(err.location(), Some(Location::new(2, 1, 17)));
    }

    #[test]
    fn test_parse_sources_concatenates() {
        let sources = vec![
            Source::new("a.css", "@def C red;"),
            Source::new("b.css", ".a { color: C; }"),
        ];
        let parsed = parse_sources(&sources).unwrap();
        assert_eq!(parsed.stylesheet.nodes.len(), 2);
    }
}
