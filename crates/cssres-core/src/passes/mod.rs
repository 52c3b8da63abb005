//! Compiler passes
//!
//! Each pass is a tree-to-tree transformation over a [`crate::ast::Stylesheet`].
//! The pipeline in [`crate::compiler`] runs them in this order: bindings,
//! conditionals, externals, obfuscate, sprite, rtl (on a copy), canonicalize.

pub mod bindings;
pub mod canonicalize;
pub mod conditionals;
pub mod externals;
pub mod obfuscate;
pub mod rtl;
pub mod sprite;
