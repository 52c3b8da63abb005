//! Class-name obfuscation
//!
//! Generated names use a length-prefixed base-26 code: the first letter
//! encodes the number of digits (`A` for one, `B` for two, ...), followed by
//! the digits of the counter least significant first. Two codes of the same
//! length differ somewhere, and codes of different lengths differ in their
//! first letter, so no generated name is a prefix of another.

use crate::ast::visit::{Context, ModVisitor, accept_with_insert_remove};
use crate::ast::{Node, NodeKind, Selector, Stylesheet};
use crate::diagnostics::{Diagnostic, Diagnostics, Location};
use crate::error::CssResError;
use crate::passes::externals::ExternalClasses;
use crate::result::Result;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Upper bound on candidates tried before giving up on the reserved set
const MAX_ATTEMPTS: u64 = 1 << 24;

/// Encode a counter value as a prefix-free uppercase code
pub fn encode(mut n: u64) -> String {
    let mut digits = Vec::new();
    loop {
        digits.push(b'A' + (n % 26) as u8);
        n /= 26;
        if n == 0 {
            break;
        }
    }
    let mut code = String::with_capacity(digits.len() + 1);
    code.push((b'A' + (digits.len() - 1) as u8) as char);
    code.extend(digits.into_iter().map(char::from));
    code
}

fn conflicts(a: &str, b: &str) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// Issues short, unique class names in a deterministic sequence
#[derive(Debug, Clone)]
pub struct NameGenerator {
    counter: u64,
    prefix: String,
    reserved: Vec<String>,
    issued: Vec<String>,
}

impl NameGenerator {
    /// Names already issued elsewhere are passed as `reserved`; empty entries
    /// are ignored since they would block every candidate. A reserved name
    /// that is a prefix of `prefix` blocks every candidate too and is rejected.
    pub fn new(
        prefix: impl Into<String>,
        reserved: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let prefix = prefix.into();
        let reserved: Vec<String> = reserved.into_iter().filter(|r| !r.is_empty()).collect();
        if let Some(blocking) = reserved.iter().find(|r| prefix.starts_with(r.as_str())) {
            return Err(CssResError::config_error(format!(
                "reserved class name '{blocking}' is a prefix of the obfuscation prefix '{prefix}'"
            )));
        }
        Ok(Self {
            counter: 0,
            prefix,
            reserved,
            issued: Vec::new(),
        })
    }

    /// Next name that is neither a prefix of nor prefixed by any reserved or
    /// previously issued name
    pub fn next_name(&mut self) -> Result<String> {
        for _ in 0..MAX_ATTEMPTS {
            let candidate = format!("{}{}", self.prefix, encode(self.counter));
            self.counter += 1;
            let clashes = self
                .reserved
                .iter()
                .chain(&self.issued)
                .any(|taken| conflicts(taken, &candidate));
            if !clashes {
                self.issued.push(candidate.clone());
                return Ok(candidate);
            }
            tracing::trace!("Skipping generated name {} reserved elsewhere", candidate);
        }
        Err(CssResError::internal_error(
            "reserved class names exhaust the obfuscation name space",
        ))
    }

    pub fn issued(&self) -> &[String] {
        &self.issued
    }
}

/// Mapping from logical class names to the names used in the output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassNameTable {
    names: IndexMap<String, String>,
}

impl ClassNameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, logical: impl Into<String>, generated: impl Into<String>) {
        self.names.insert(logical.into(), generated.into());
    }

    pub fn get(&self, logical: &str) -> Option<&str> {
        self.names.get(logical).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn generated_names(&self) -> impl Iterator<Item = &str> {
        self.names.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Read the two-column `logical<TAB>generated` form
    pub fn parse(text: &str) -> Result<Self> {
        let mut table = Self::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let Some((logical, generated)) = line.split_once('\t') else {
                return Err(CssResError::config_error(format!(
                    "class name table line {} is not of the form logical<TAB>generated",
                    index + 1
                )));
            };
            table.insert(logical, generated);
        }
        Ok(table)
    }
}

impl fmt::Display for ClassNameTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (logical, generated) in &self.names {
            writeln!(f, "{logical}\t{generated}")?;
        }
        Ok(())
    }
}

/// Class names issued by another stylesheet, referenced as `prefix-name`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedScope {
    pub prefix: String,
    pub names: ClassNameTable,
}

impl ImportedScope {
    pub fn new(prefix: impl Into<String>, names: ClassNameTable) -> Self {
        Self {
            prefix: prefix.into(),
            names,
        }
    }

    fn lookup(&self, class: &str) -> Option<&str> {
        class
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|name| self.names.get(name))
    }
}

/// Inputs of the obfuscation pass beyond the tree itself
#[derive(Debug, Clone, Copy)]
pub struct ObfuscationRequest<'a> {
    /// Declared accessor names in declaration order
    pub accessors: &'a [String],
    /// Accessor names that name `@def` constants instead of classes
    pub def_keys: &'a HashSet<String>,
    pub externals: &'a ExternalClasses,
    pub imports: &'a [ImportedScope],
    pub reserved: &'a BTreeSet<String>,
    pub prefix: &'a str,
    pub strict: bool,
}

struct Renamer<'a> {
    table: &'a ClassNameTable,
    externals: &'a ExternalClasses,
    imports: &'a [ImportedScope],
    observed: IndexSet<String>,
    unknown: IndexMap<String, Location>,
}

impl Renamer<'_> {
    fn rename(&mut self, selectors: &mut [Selector], location: Location) {
        for selector in selectors {
            selector.rename_classes(|class| {
                self.observed.insert(class.to_string());
                if self.externals.contains(class) {
                    return None;
                }
                if let Some(generated) = self.table.get(class) {
                    return Some(generated.to_string());
                }
                if let Some(imported) = self.imports.iter().find_map(|i| i.lookup(class)) {
                    return Some(imported.to_string());
                }
                self.unknown.entry(class.to_string()).or_insert(location);
                None
            });
        }
    }
}

impl ModVisitor for Renamer<'_> {
    fn visit(&mut self, node: &mut Node, _ctx: &mut Context) -> Result<bool> {
        match &mut node.kind {
            NodeKind::Rule(rule) => self.rename(&mut rule.selectors, node.location),
            NodeKind::Sprite(sprite) => self.rename(&mut sprite.selectors, node.location),
            _ => return Ok(true),
        }
        Ok(false)
    }
}

/// Assign generated names to class accessors and rewrite every selector
pub fn obfuscate(
    sheet: &mut Stylesheet,
    request: &ObfuscationRequest<'_>,
    observed: &BTreeSet<String>,
    diagnostics: &mut Diagnostics,
) -> Result<ClassNameTable> {
    let mut prefixes = HashSet::new();
    for import in request.imports {
        if !prefixes.insert(import.prefix.as_str()) {
            return Err(CssResError::config_error(format!(
                "Multiple imported scopes share the prefix '{}'",
                import.prefix
            )));
        }
    }

    if let Some(name) = request
        .accessors
        .iter()
        .find(|a| request.def_keys.contains(*a) && observed.contains(*a))
    {
        return Err(CssResError::DefShadowsClass { name: name.clone() });
    }

    let reserved = request
        .reserved
        .iter()
        .cloned()
        .chain(
            request
                .imports
                .iter()
                .flat_map(|i| i.names.generated_names().map(String::from)),
        );
    let mut generator = NameGenerator::new(request.prefix, reserved)?;

    let mut table = ClassNameTable::new();
    for accessor in request.accessors {
        if request.def_keys.contains(accessor) || table.get(accessor).is_some() {
            continue;
        }
        if request.externals.contains(accessor) {
            table.insert(accessor.clone(), accessor.clone());
        } else {
            table.insert(accessor.clone(), generator.next_name()?);
        }
    }

    let mut renamer = Renamer {
        table: &table,
        externals: request.externals,
        imports: request.imports,
        observed: IndexSet::new(),
        unknown: IndexMap::new(),
    };
    accept_with_insert_remove(&mut renamer, &mut sheet.nodes)?;
    let Renamer {
        observed: used,
        unknown,
        ..
    } = renamer;

    if !unknown.is_empty() {
        if request.strict {
            return Err(CssResError::UndeclaredClasses {
                classes: unknown.into_keys().collect(),
            });
        }
        for (class, location) in unknown {
            diagnostics.push(Diagnostic::warning(
                "Class has no declared accessor and is not @external, it will not be obfuscated",
                format!(".{class}"),
                location,
            ));
        }
    }

    let unused: Vec<String> = table
        .iter()
        .filter(|(logical, _)| !used.contains(*logical))
        .map(|(logical, _)| logical.to_string())
        .collect();
    if !unused.is_empty() {
        if request.strict {
            return Err(CssResError::UnusedAccessors { names: unused });
        }
        for name in unused {
            diagnostics.push(Diagnostic::warning(
                "Declared accessor has no matching class in the stylesheet",
                name,
                Location::unknown(),
            ));
        }
    }

    tracing::debug!(
        "Obfuscated {} classes ({} external)",
        generator.issued().len(),
        table.len() - generator.issued().len()
    );
    Ok(table)
}
