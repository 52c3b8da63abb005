//! Tree traversal
//!
//! [`Visitor`] walks a tree read-only. [`ModVisitor`] walks node lists while
//! letting the visitor insert nodes before the current one, replace it or
//! remove it. Nodes inserted or substituted during a pass are not visited by
//! that pass; a pass that must process them runs a separate traversal over
//! the sub-list it produced.

use super::{If, Node, NodeId, NodeKind, Property, Selector};
use crate::error::CssResError;
use crate::result::Result;
use std::collections::HashSet;

/// Read-only visitor. Every hook has a no-op default.
pub trait Visitor {
    /// Called before a node's children. Returning `false` skips them.
    fn enter(&mut self, _node: &Node) -> bool {
        true
    }

    fn leave(&mut self, _node: &Node) {}

    /// Called for each link of an `@if` chain before its nodes
    fn if_link(&mut self, _link: &If) {}

    fn selector(&mut self, _selector: &Selector) {}

    fn property(&mut self, _property: &Property) {}
}

/// Walk a node list depth-first in document order
pub fn walk<V: Visitor + ?Sized>(visitor: &mut V, nodes: &[Node]) {
    for node in nodes {
        if visitor.enter(node) {
            walk_children(visitor, node);
        }
        visitor.leave(node);
    }
}

fn walk_children<V: Visitor + ?Sized>(visitor: &mut V, node: &Node) {
    match &node.kind {
        NodeKind::Rule(rule) => {
            rule.selectors.iter().for_each(|s| visitor.selector(s));
            rule.properties.iter().for_each(|p| visitor.property(p));
        }
        NodeKind::Sprite(sprite) => {
            sprite.selectors.iter().for_each(|s| visitor.selector(s));
            sprite.properties.iter().for_each(|p| visitor.property(p));
        }
        NodeKind::FontFace(font_face) => {
            font_face.properties.iter().for_each(|p| visitor.property(p));
        }
        NodeKind::Page(page) => page.properties.iter().for_each(|p| visitor.property(p)),
        NodeKind::If(head) => {
            for link in head.links() {
                visitor.if_link(link);
                walk(visitor, &link.nodes);
            }
        }
        NodeKind::Media(media) => walk(visitor, &media.nodes),
        NodeKind::NoFlip(no_flip) => walk(visitor, &no_flip.nodes),
        NodeKind::Def(_) | NodeKind::Binding(_) | NodeKind::External(_) | NodeKind::Unknown(_) => {
        }
    }
}

/// Edits requested by a [`ModVisitor`] for the node being visited
#[derive(Debug, Default)]
pub struct Context {
    inserted: Vec<Node>,
    replacement: Option<Node>,
    removed: bool,
}

impl Context {
    /// Insert a node before the current one
    pub fn insert_before(&mut self, node: Node) {
        self.inserted.push(node);
    }

    /// Replace the current node
    pub fn replace_me(&mut self, node: Node) {
        self.replacement = Some(node);
        self.removed = false;
    }

    /// Remove the current node
    pub fn remove_me(&mut self) {
        self.replacement = None;
        self.removed = true;
    }

    fn is_detached(&self) -> bool {
        self.removed || self.replacement.is_some()
    }
}

/// Tree-editing visitor
pub trait ModVisitor {
    /// Called before a node's children. Returning `false` skips the children.
    /// Children are also skipped once the node has been replaced or removed.
    fn visit(&mut self, _node: &mut Node, _ctx: &mut Context) -> Result<bool> {
        Ok(true)
    }

    /// Called after a node's children
    fn end_visit(&mut self, _node: &mut Node, _ctx: &mut Context) -> Result<()> {
        Ok(())
    }

    /// Called for each property of a rule-like node, after `visit`
    fn property(&mut self, _property: &mut Property, _node_ctx: &PropertyContext) -> Result<()> {
        Ok(())
    }
}

/// What a property hook knows about the node that owns the property
#[derive(Debug, Clone, Copy)]
pub struct PropertyContext<'a> {
    pub selectors: &'a [Selector],
}

/// Run a [`ModVisitor`] over a node list, applying requested edits
///
/// Every node is visited at most once per traversal. A node seen twice, which
/// means two list slots share an identity, is reported as an internal error.
pub fn accept_with_insert_remove<V: ModVisitor + ?Sized>(
    visitor: &mut V,
    nodes: &mut Vec<Node>,
) -> Result<()> {
    let mut seen = HashSet::new();
    accept_list(visitor, nodes, &mut seen)
}

fn accept_list<V: ModVisitor + ?Sized>(
    visitor: &mut V,
    nodes: &mut Vec<Node>,
    seen: &mut HashSet<NodeId>,
) -> Result<()> {
    let mut index = 0;
    while index < nodes.len() {
        let node = &mut nodes[index];
        if !seen.insert(node.id) {
            return Err(CssResError::internal_error(format!(
                "node '{}' at {} visited twice in one pass",
                node.describe(),
                node.location
            )));
        }

        let mut ctx = Context::default();
        let descend = visitor.visit(node, &mut ctx)?;
        if !ctx.is_detached() {
            if descend {
                accept_children(visitor, node, seen)?;
            }
            visitor.end_visit(node, &mut ctx)?;
        }

        let Context {
            inserted,
            replacement,
            removed,
        } = ctx;
        let inserted_count = inserted.len();
        let kept = match replacement {
            Some(replacement) => {
                nodes.splice(index..=index, inserted.into_iter().chain(Some(replacement)));
                1
            }
            None if removed => {
                nodes.splice(index..=index, inserted);
                0
            }
            None => {
                nodes.splice(index..index, inserted);
                1
            }
        };
        index += inserted_count + kept;
    }
    Ok(())
}

fn accept_children<V: ModVisitor + ?Sized>(
    visitor: &mut V,
    node: &mut Node,
    seen: &mut HashSet<NodeId>,
) -> Result<()> {
    match &mut node.kind {
        NodeKind::Rule(rule) => {
            let ctx = PropertyContext {
                selectors: &rule.selectors,
            };
            for property in &mut rule.properties {
                visitor.property(property, &ctx)?;
            }
        }
        NodeKind::Sprite(sprite) => {
            let ctx = PropertyContext {
                selectors: &sprite.selectors,
            };
            for property in &mut sprite.properties {
                visitor.property(property, &ctx)?;
            }
        }
        NodeKind::FontFace(font_face) => {
            for property in &mut font_face.properties {
                visitor.property(property, &PropertyContext { selectors: &[] })?;
            }
        }
        NodeKind::Page(page) => {
            for property in &mut page.properties {
                visitor.property(property, &PropertyContext { selectors: &[] })?;
            }
        }
        NodeKind::If(head) => {
            let mut link = Some(head);
            while let Some(current) = link {
                accept_list(visitor, &mut current.nodes, seen)?;
                link = current.else_if.as_deref_mut();
            }
        }
        NodeKind::Media(media) => accept_list(visitor, &mut media.nodes, seen)?,
        NodeKind::NoFlip(no_flip) => accept_list(visitor, &mut no_flip.nodes, seen)?,
        NodeKind::Def(_) | NodeKind::Binding(_) | NodeKind::External(_) | NodeKind::Unknown(_) => {
        }
    }
    Ok(())
}
