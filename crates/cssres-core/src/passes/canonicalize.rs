//! Rule canonicalization
//!
//! Multi-selector rules are split into one rule per selector, then rules are
//! merged twice: first rules with identical selectors, then rules with
//! identical declarations. A merge never moves a declaration past a rule that
//! declares a property of the same name, so the cascade is unchanged.
//! Rounds repeat until the rule layout stops changing, since a content merge
//! can remove the only rule that blocked a selector merge.
//!
//! Every `@if` link, `@media` block and `@noflip` block is its own merge
//! scope, but the document-order list used for the interference check spans
//! all scopes.

use crate::ast::visit::{Context, ModVisitor, accept_with_insert_remove};
use crate::ast::{Node, NodeKind, Rule, Stylesheet};
use crate::result::Result;
use std::collections::HashMap;

struct Splitter {
    split: usize,
}

impl ModVisitor for Splitter {
    fn visit(&mut self, node: &mut Node, ctx: &mut Context) -> Result<bool> {
        let NodeKind::Rule(rule) = &node.kind else {
            return Ok(true);
        };
        if rule.selectors.len() > 1 {
            for selector in &rule.selectors {
                let single = Rule::new(vec![selector.clone()], rule.properties.clone());
                ctx.insert_before(Node::new(NodeKind::Rule(single), node.location));
            }
            ctx.remove_me();
            self.split += 1;
        }
        Ok(false)
    }
}

/// Replace each multi-selector rule with one rule per selector
pub fn split_rules(sheet: &mut Stylesheet) -> Result<usize> {
    let mut splitter = Splitter { split: 0 };
    accept_with_insert_remove(&mut splitter, &mut sheet.nodes)?;
    tracing::debug!("Split {} multi-selector rules", splitter.split);
    Ok(splitter.split)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeKey {
    Selector,
    Content,
}

impl MergeKey {
    fn of(self, rule: &Rule) -> Option<String> {
        match self {
            MergeKey::Selector => Some(rule.selector_text()),
            MergeKey::Content if rule.properties.is_empty() => None,
            MergeKey::Content => Some(rule.properties.iter().map(|p| p.content_key()).collect()),
        }
    }
}

/// Whether two property names can affect the same computed value
fn have_common_property(a: &str, b: &str) -> bool {
    a == b || is_shorthand_of(a, b) || is_shorthand_of(b, a)
}

fn is_shorthand_of(longhand: &str, shorthand: &str) -> bool {
    longhand
        .strip_prefix(shorthand)
        .is_some_and(|rest| rest.starts_with('-'))
}

fn property_names(rule: &Rule) -> Vec<String> {
    rule.properties
        .iter()
        .map(|p| p.name.to_ascii_lowercase())
        .collect()
}

struct Merger {
    key: MergeKey,
    /// Property names of every rule seen so far, in document order
    order: Vec<Vec<String>>,
    merged: usize,
}

impl Merger {
    fn new(key: MergeKey) -> Self {
        Self {
            key,
            order: Vec::new(),
            merged: 0,
        }
    }

    fn interferes(&self, canonical: usize, names: &[String]) -> bool {
        self.order[canonical + 1..].iter().any(|between| {
            between
                .iter()
                .any(|a| names.iter().any(|b| have_common_property(a, b)))
        })
    }

    fn fold(&self, canonical: &mut Rule, later: Rule) {
        match self.key {
            MergeKey::Selector => {
                let incoming: Vec<String> =
                    later.properties.iter().map(|p| p.content_key()).collect();
                canonical
                    .properties
                    .retain(|p| !incoming.contains(&p.content_key()));
                canonical.properties.extend(later.properties);
            }
            MergeKey::Content => {
                for selector in later.selectors {
                    if !canonical.selectors.contains(&selector) {
                        canonical.selectors.push(selector);
                    }
                }
            }
        }
    }

    fn merge_scope(&mut self, nodes: &mut Vec<Node>) {
        let mut canonical: HashMap<String, (usize, usize)> = HashMap::new();
        let mut removed = vec![false; nodes.len()];

        for index in 0..nodes.len() {
            let (key, names) = match &mut nodes[index].kind {
                NodeKind::Rule(rule) => (self.key.of(rule), property_names(rule)),
                NodeKind::If(head) => {
                    let mut link = Some(head);
                    while let Some(current) = link {
                        self.merge_scope(&mut current.nodes);
                        link = current.else_if.as_deref_mut();
                    }
                    continue;
                }
                NodeKind::Media(media) => {
                    self.merge_scope(&mut media.nodes);
                    continue;
                }
                NodeKind::NoFlip(no_flip) => {
                    self.merge_scope(&mut no_flip.nodes);
                    continue;
                }
                _ => continue,
            };

            let Some(key) = key else {
                self.order.push(names);
                continue;
            };
            if let Some(&(order_index, node_index)) = canonical.get(&key) {
                if !self.interferes(order_index, &names) {
                    let later = match &mut nodes[index].kind {
                        NodeKind::Rule(rule) => std::mem::take(rule),
                        _ => continue,
                    };
                    if let NodeKind::Rule(target) = &mut nodes[node_index].kind {
                        tracing::trace!(
                            "Merged {} into {}",
                            later.selector_text(),
                            target.selector_text()
                        );
                        self.fold(target, later);
                    }
                    self.order[order_index].extend(names);
                    removed[index] = true;
                    self.merged += 1;
                    continue;
                }
            }
            canonical.insert(key, (self.order.len(), index));
            self.order.push(names);
        }

        let mut flags = removed.into_iter();
        nodes.retain(|_| !flags.next().unwrap_or(false));
    }
}

fn merge(sheet: &mut Stylesheet, key: MergeKey) -> usize {
    let mut merger = Merger::new(key);
    merger.merge_scope(&mut sheet.nodes);
    tracing::debug!("Merged {} rules by {:?}", merger.merged, key);
    merger.merged
}

/// Fold rules into an earlier rule with the same selector
pub fn merge_by_selector(sheet: &mut Stylesheet) -> usize {
    merge(sheet, MergeKey::Selector)
}

/// Fold rules into an earlier rule with the same declarations
pub fn merge_by_content(sheet: &mut Stylesheet) -> usize {
    merge(sheet, MergeKey::Content)
}

/// Selectors and declarations of every rule in document order, with scope
/// boundaries marked
fn layout(nodes: &[Node], out: &mut Vec<String>) {
    for node in nodes {
        match &node.kind {
            NodeKind::Rule(rule) => {
                let content: String = rule.properties.iter().map(|p| p.content_key()).collect();
                out.push(format!("{}{{{content}}}", rule.selector_text()));
            }
            NodeKind::If(head) => {
                for link in head.links() {
                    out.push("@if{".to_string());
                    layout(&link.nodes, out);
                    out.push("}".to_string());
                }
            }
            NodeKind::Media(media) => {
                out.push("@media{".to_string());
                layout(&media.nodes, out);
                out.push("}".to_string());
            }
            NodeKind::NoFlip(no_flip) => {
                out.push("@noflip{".to_string());
                layout(&no_flip.nodes, out);
                out.push("}".to_string());
            }
            _ => {}
        }
    }
}

fn count_rules(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match &node.kind {
            NodeKind::Rule(rule) => rule.selectors.len(),
            NodeKind::If(head) => head.links().map(|link| count_rules(&link.nodes)).sum(),
            NodeKind::Media(media) => count_rules(&media.nodes),
            NodeKind::NoFlip(no_flip) => count_rules(&no_flip.nodes),
            _ => 0,
        })
        .sum()
}

/// Split, then merge by selector, then merge by content, repeated until a
/// round leaves the rules unchanged
pub fn canonicalize(sheet: &mut Stylesheet) -> Result<()> {
    let max_rounds = count_rules(&sheet.nodes) + 2;
    let mut previous = Vec::new();
    layout(&sheet.nodes, &mut previous);

    for round in 1..=max_rounds {
        split_rules(sheet)?;
        merge_by_selector(sheet);
        merge_by_content(sheet);

        let mut current = Vec::new();
        layout(&sheet.nodes, &mut current);
        if current == previous {
            tracing::debug!("Canonical form reached after {} rounds", round);
            return Ok(());
        }
        previous = current;
    }
    tracing::warn!("Canonical form not reached after {} rounds", max_rounds);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_stylesheet;
    use crate::serialize::{RenderOptions, render};

    fn sheet(text: &str) -> Stylesheet {
        parse_stylesheet("test.css", text).unwrap().stylesheet
    }

    fn text(sheet: &Stylesheet) -> String {
        render(sheet, &RenderOptions::default()).unwrap().text
    }

    fn canonical(source: &str) -> String {
        let mut sheet = sheet(source);
        canonicalize(&mut sheet).unwrap();
        text(&sheet)
    }

    #[test]
    fn test_split_clones_properties() {
        let mut sheet = sheet(".a, .b { color: red; }");
        assert_eq!(split_rules(&mut sheet).unwrap(), 1);
        assert_eq!(text(&sheet), ".a{color:red;}.b{color:red;}");
        assert_ne!(sheet.nodes[0].id, sheet.nodes[1].id);
    }

    #[test]
    fn test_merge_by_selector() {
        assert_eq!(
            canonical(".a { color: red; } .b { width: 1px; } .a { height: 2px; }"),
            ".a{color:red;height:2px;}.b{width:1px;}"
        );
    }

    #[test]
    fn test_interference_blocks_merge() {
        assert_eq!(
            canonical(".a { color: red; } .b { color: blue; } .a { color: red; }"),
            ".a{color:red;}.b{color:blue;}.a{color:red;}"
        );
        assert_eq!(
            canonical(".a { color: red; } .b { width: 1px; } .a { color: red; }"),
            ".a{color:red;}.b{width:1px;}"
        );
    }

    #[test]
    fn test_shorthand_counts_as_interference() {
        assert_eq!(
            canonical(".a { margin-left: 1px; } .b { margin: 0; } .a { margin-left: 2px; }"),
            ".a{margin-left:1px;}.b{margin:0;}.a{margin-left:2px;}"
        );
        assert!(have_common_property("border-top-width", "border"));
        assert!(!have_common_property("border", "borders"));
        assert!(!have_common_property("color", "background-color"));
    }

    #[test]
    fn test_merge_by_content() {
        assert_eq!(
            canonical(".a { color: red; } .b { width: 1px; } .c { color: red; }"),
            ".a,.c{color:red;}.b{width:1px;}"
        );
        assert_eq!(
            canonical(".a { color: red; } .b { color: blue; } .c { color: red; }"),
            ".a{color:red;}.b{color:blue;}.c{color:red;}"
        );
    }

    #[test]
    fn test_nested_scopes_do_not_merge_across() {
        assert_eq!(
            canonical(".a { color: red; } @media print { .a { color: red; } .a { width: 1px; } }"),
            ".a{color:red;}@media print{.a{color:red;width:1px;}}"
        );
    }

    #[test]
    fn test_same_selector_middle_rule_keeps_cascade_winner() {
        assert_eq!(
            canonical(".a { color: red; } .a { color: green; } .a { color: red; }"),
            ".a{color:green;color:red;}"
        );
    }

    #[test]
    fn test_content_merge_unblocks_selector_merge() {
        assert_eq!(
            canonical(".a { x: 1; } .c { w: 1; } .b { x: 1; } .c { x: 2; }"),
            ".a,.b{x:1;}.c{w:1;x:2;}"
        );
    }

    #[test]
    fn test_canonicalize_is_a_fixed_point() {
        let sources = [
            ".a, .b { color: red; } .c { width: 1px; } .a { height: 2px; } .d { color: red; } @media print { .x, .y { float: left; } }",
            ".a { x: 1; } .c { w: 1; } .b { x: 1; } .c { x: 2; }",
            ".a { color: red; } .a { color: green; } .a { color: red; }",
            ".a { margin: 0; } .b { margin-left: 1px; } .a { color: red; } .b { color: red; } .c { margin: 0; }",
            ".p, .q { top: 0; } .q { left: 0; } .r { top: 0; } .p { left: 0; } .s { top: 0; left: 0; }",
            "@noflip { .a { float: left; } .b { float: left; } } .a { float: left; } @media print { .a { x: 1; } .b { y: 2; } .a { y: 2; } }",
            ".a { } .b { color: red; } .a { } .c { color: red; }",
        ];
        for source in sources {
            let mut sheet = sheet(source);
            canonicalize(&mut sheet).unwrap();
            let once = text(&sheet);
            canonicalize(&mut sheet).unwrap();
            assert_eq!(text(&sheet), once, "{source}");
        }
    }
}
