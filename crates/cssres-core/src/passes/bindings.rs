//! `@def`, `@eval` and `@url` resolution
//!
//! A forward scan records every binding. `@def` values are expanded against
//! earlier definitions at the point of definition, so a constant can never
//! refer to itself and no cycle detection is needed later. A second scan
//! substitutes identifiers in declarations: constants are spliced literally,
//! `@eval`/`@url` keys and `value()` references become dynamic expressions.

use crate::ast::visit::{Context, ModVisitor, PropertyContext, accept_with_insert_remove};
use crate::ast::{Binding, BindingKind, DynamicExpr, Node, NodeKind, Property, Stylesheet, Value};
use crate::diagnostics::{Diagnostic, Diagnostics, Location};
use crate::error::CssResError;
use crate::oracle::ResourceProvider;
use crate::result::Result;
use indexmap::IndexMap;

/// Constants and dynamic bindings of a stylesheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingTable {
    defs: IndexMap<String, Vec<Value>>,
    bindings: IndexMap<String, Binding>,
}

impl BindingTable {
    /// Expanded values of a constant
    pub fn def(&self, key: &str) -> Option<&[Value]> {
        self.defs.get(key).map(Vec::as_slice)
    }

    pub fn is_def(&self, key: &str) -> bool {
        self.defs.contains_key(key)
    }

    pub fn def_keys(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    pub fn binding(&self, key: &str) -> Option<&Binding> {
        self.bindings.get(key)
    }

    /// Splice earlier constants into a value list, top level only
    fn expand(&self, values: Vec<Value>) -> Vec<Value> {
        let mut expanded = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Value::Ident(ident) => match self.defs.get(&ident) {
                    Some(def) => expanded.extend(def.iter().cloned()),
                    None => expanded.push(Value::Ident(ident)),
                },
                other => expanded.push(other),
            }
        }
        expanded
    }
}

struct Collector<'a> {
    provider: &'a dyn ResourceProvider,
    diagnostics: &'a mut Diagnostics,
    table: BindingTable,
}

impl Collector<'_> {
    fn check_binding(&self, binding: &Binding, location: Location) -> Result<()> {
        let resolved = self.provider.resolve(&binding.path);
        let ok = match binding.kind {
            BindingKind::Eval => resolved.is_some(),
            BindingKind::Url => resolved.is_some_and(|r| r.url().is_some()),
        };
        if ok {
            Ok(())
        } else {
            Err(CssResError::unresolved_symbol(
                binding.kind.directive(),
                &binding.path,
                location,
            ))
        }
    }
}

impl ModVisitor for Collector<'_> {
    fn visit(&mut self, node: &mut Node, _ctx: &mut Context) -> Result<bool> {
        match &mut node.kind {
            NodeKind::Def(def) => {
                def.values = self.table.expand(std::mem::take(&mut def.values));
                if self.table.defs.contains_key(&def.key) {
                    self.diagnostics.push(Diagnostic::warning(
                        "Duplicate @def key, the later definition shadows the earlier one",
                        format!("@def {}", def.key),
                        node.location,
                    ));
                }
                tracing::trace!("Recorded @def {}", def.key);
                self.table.defs.insert(def.key.clone(), def.values.clone());
                Ok(false)
            }
            NodeKind::Binding(binding) => {
                self.check_binding(binding, node.location)?;
                self.table.bindings.insert(binding.key.clone(), binding.clone());
                Ok(false)
            }
            _ => Ok(true),
        }
    }
}

struct Substituter<'a> {
    provider: &'a dyn ResourceProvider,
    table: &'a BindingTable,
    substituted: usize,
}

impl Substituter<'_> {
    fn substitute(&mut self, values: Vec<Value>, location: Location) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Value::Ident(ident) => {
                    if let Some(def) = self.table.defs.get(&ident) {
                        self.substituted += 1;
                        out.extend(def.iter().cloned());
                    } else if let Some(binding) = self.table.bindings.get(&ident) {
                        self.substituted += 1;
                        out.push(Value::Dynamic(match binding.kind {
                            BindingKind::Eval => DynamicExpr::Eval {
                                path: binding.path.clone(),
                            },
                            BindingKind::Url => DynamicExpr::Url {
                                path: binding.path.clone(),
                            },
                        }));
                    } else {
                        out.push(Value::Ident(ident));
                    }
                }
                Value::SymbolPath { path, suffix } => {
                    if self.provider.resolve(&path).is_none() {
                        return Err(CssResError::unresolved_symbol("value()", path, location));
                    }
                    out.push(Value::Dynamic(DynamicExpr::Value { path, suffix }));
                }
                Value::Function { name, args } => out.push(Value::Function {
                    name,
                    args: self.substitute(args, location)?,
                }),
                Value::List(items) => out.push(Value::List(self.substitute(items, location)?)),
                other => out.push(other),
            }
        }
        Ok(out)
    }
}

impl ModVisitor for Substituter<'_> {
    fn property(&mut self, property: &mut Property, _node: &PropertyContext) -> Result<()> {
        let values = std::mem::take(&mut property.values);
        property.values = self.substitute(values, property.location)?;
        Ok(())
    }
}

/// Collect bindings and substitute them into every declaration
pub fn resolve_bindings(
    sheet: &mut Stylesheet,
    provider: &dyn ResourceProvider,
    diagnostics: &mut Diagnostics,
) -> Result<BindingTable> {
    let mut collector = Collector {
        provider,
        diagnostics,
        table: BindingTable::default(),
    };
    accept_with_insert_remove(&mut collector, &mut sheet.nodes)?;
    let table = collector.table;

    let mut substituter = Substituter {
        provider,
        table: &table,
        substituted: 0,
    };
    accept_with_insert_remove(&mut substituter, &mut sheet.nodes)?;

    tracing::debug!(
        "Resolved {} constants and {} bindings, {} substitutions",
        table.defs.len(),
        table.bindings.len(),
        substituter.substituted
    );
    Ok(table)
}
