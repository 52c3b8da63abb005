//! Static `@if` resolution
//!
//! Property-keyed links (`@if axis value...`) are decided against the
//! property oracle and the winning branch is spliced in place of the chain.
//! Links with a free-form expression are left for the caller; when such a
//! link heads a chain, its later links are still simplified.

use crate::ast::visit::{Context, ModVisitor, Visitor, accept_with_insert_remove, walk};
use crate::ast::{Condition, If, Node, NodeKind, Stylesheet};
use crate::error::CssResError;
use crate::oracle::PropertyOracle;
use crate::result::Result;
use std::collections::BTreeSet;

/// Build axes named by property-keyed `@if` links anywhere in the tree
pub fn required_axes(sheet: &Stylesheet) -> BTreeSet<String> {
    struct AxisCollector(BTreeSet<String>);

    impl Visitor for AxisCollector {
        fn if_link(&mut self, link: &If) {
            if let Condition::Property { name, .. } = &link.condition {
                self.0.insert(name.clone());
            }
        }
    }

    let mut collector = AxisCollector(BTreeSet::new());
    walk(&mut collector, &sheet.nodes);
    collector.0
}

/// Outcome of resolving an `@if` chain
enum Resolution {
    /// Nodes to splice in place of the chain
    Nodes(Vec<Node>),
    /// A chain that must stay for runtime evaluation
    Runtime(If),
}

enum Decision {
    Take,
    Skip,
    Keep,
}

struct Resolver<'a> {
    oracle: &'a dyn PropertyOracle,
    resolved: usize,
}

impl Resolver<'_> {
    fn resolve_chain(&mut self, mut link: If) -> Result<Resolution> {
        let decision = match &link.condition {
            Condition::Always => Decision::Take,
            Condition::Expression(_) => Decision::Keep,
            Condition::Property {
                name,
                values,
                negated,
            } => {
                let current =
                    self.oracle
                        .resolve_axis(name)
                        .ok_or_else(|| CssResError::UnknownAxis {
                            axis: name.clone(),
                            location: link.location,
                        })?;
                self.resolved += 1;
                let matched = values.contains(&current) ^ negated;
                tracing::trace!("@if {} = {}: branch taken: {}", name, current, matched);
                if matched { Decision::Take } else { Decision::Skip }
            }
        };

        match decision {
            Decision::Take => {
                accept_with_insert_remove(self, &mut link.nodes)?;
                Ok(Resolution::Nodes(link.nodes))
            }
            Decision::Skip => match link.else_if {
                Some(next) => self.resolve_chain(*next),
                None => Ok(Resolution::Nodes(Vec::new())),
            },
            Decision::Keep => {
                accept_with_insert_remove(self, &mut link.nodes)?;
                if let Some(next) = link.else_if.take() {
                    let location = next.location;
                    link.else_if = match self.resolve_chain(*next)? {
                        Resolution::Runtime(next) => Some(Box::new(next)),
                        Resolution::Nodes(nodes) if nodes.is_empty() => None,
                        Resolution::Nodes(nodes) => {
                            Some(Box::new(If::new(Condition::Always, location, nodes)))
                        }
                    };
                }
                Ok(Resolution::Runtime(link))
            }
        }
    }
}

impl ModVisitor for Resolver<'_> {
    fn visit(&mut self, node: &mut Node, ctx: &mut Context) -> Result<bool> {
        let NodeKind::If(chain) = &mut node.kind else {
            return Ok(true);
        };
        match self.resolve_chain(std::mem::take(chain))? {
            Resolution::Nodes(nodes) => {
                for resolved in nodes {
                    ctx.insert_before(resolved);
                }
                ctx.remove_me();
            }
            Resolution::Runtime(chain) => node.kind = NodeKind::If(chain),
        }
        Ok(false)
    }
}

/// Replace every statically decidable `@if` chain with its winning branch
pub fn resolve_conditionals(sheet: &mut Stylesheet, oracle: &dyn PropertyOracle) -> Result<usize> {
    let mut resolver = Resolver {
        oracle,
        resolved: 0,
    };
    accept_with_insert_remove(&mut resolver, &mut sheet.nodes)?;
    tracing::debug!("Resolved {} property-keyed @if links", resolver.resolved);
    Ok(resolver.resolved)
}
