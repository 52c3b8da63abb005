//! `@external` collection

use crate::ast::visit::{Visitor, walk};
use crate::ast::{Node, NodeKind, Selector, Stylesheet};
use std::collections::BTreeSet;

/// Classes exempt from obfuscation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalClasses {
    /// `@external *;` was declared
    All,
    Classes(BTreeSet<String>),
}

impl Default for ExternalClasses {
    fn default() -> Self {
        ExternalClasses::Classes(BTreeSet::new())
    }
}

impl ExternalClasses {
    pub fn contains(&self, class: &str) -> bool {
        match self {
            ExternalClasses::All => true,
            ExternalClasses::Classes(classes) => classes.contains(class),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, ExternalClasses::All)
    }
}

/// Every class token used by a selector anywhere in the tree
pub fn observed_classes(sheet: &Stylesheet) -> BTreeSet<String> {
    struct ClassCollector(BTreeSet<String>);

    impl Visitor for ClassCollector {
        fn selector(&mut self, selector: &Selector) {
            self.0.extend(selector.classes());
        }
    }

    let mut collector = ClassCollector(BTreeSet::new());
    walk(&mut collector, &sheet.nodes);
    collector.0
}

fn declared_patterns(sheet: &Stylesheet) -> Vec<String> {
    struct PatternCollector(Vec<String>);

    impl Visitor for PatternCollector {
        fn enter(&mut self, node: &Node) -> bool {
            if let NodeKind::External(external) = &node.kind {
                self.0.extend(external.patterns.iter().cloned());
            }
            true
        }
    }

    let mut collector = PatternCollector(Vec::new());
    walk(&mut collector, &sheet.nodes);
    collector.0
}

/// Gather `@external` declarations, expanding glob entries against the
/// classes observed in the stylesheet
pub fn collect_externals(sheet: &Stylesheet, observed: &BTreeSet<String>) -> ExternalClasses {
    let patterns = declared_patterns(sheet);
    if patterns.iter().any(|p| p == "*") {
        tracing::debug!("@external * declared, no class is obfuscated");
        return ExternalClasses::All;
    }

    let mut classes = BTreeSet::new();
    for pattern in &patterns {
        let is_glob = pattern.contains(['*', '?', '[']);
        match glob::Pattern::new(pattern) {
            Ok(glob) if is_glob => {
                let matched: Vec<&String> = observed.iter().filter(|c| glob.matches(c)).collect();
                tracing::trace!("@external {} matched {} classes", pattern, matched.len());
                classes.extend(matched.into_iter().cloned());
            }
            _ => {
                classes.insert(pattern.clone());
            }
        }
    }

    tracing::debug!("Collected {} external classes", classes.len());
    ExternalClasses::Classes(classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_stylesheet;

    fn externals(text: &str) -> ExternalClasses {
        let sheet = parse_stylesheet("test.css", text).unwrap().stylesheet;
        let observed = observed_classes(&sheet);
        collect_externals(&sheet, &observed)
    }

    #[test]
    fn test_glob_expands_against_observed_classes() {
        let found = externals(
            "@external foo-*;\n.foo-bar { color: red; } .foo-baz .other { color: blue; }",
        );
        let expected: BTreeSet<String> = ["foo-bar", "foo-baz"].map(String::from).into();
        assert_eq!(found, ExternalClasses::Classes(expected));
    }

    #[test]
    fn test_literals_and_star() {
        let found = externals("@external .gwt-Label, unused;\n.gwt-Label { color: red; }");
        assert!(found.contains("gwt-Label"));
        assert!(found.contains("unused"));
        assert!(!found.contains("other"));

        assert!(externals("@external *;").is_all());
    }

    #[test]
    fn test_observed_classes_include_nested_blocks() {
        let sheet = parse_stylesheet(
            "test.css",
            "@media print { .a { color: red; } } @if (x) { .b { color: red; } } @else { @sprite .c { gwt-image: 'i'; } }",
        )
        .unwrap()
        .stylesheet;
        let observed: Vec<String> = observed_classes(&sheet).into_iter().collect();
        assert_eq!(observed, vec!["a", "b", "c"]);
    }
}
