//! Compilation pipeline
//!
//! A [`StylesheetCompiler`] owns the configuration and the two collaborators
//! (property oracle and resource provider) and runs every pass over one
//! [`CompileUnit`] at a time. The parse cache is shared, so several compilers
//! or threads may reuse parsed trees; every compilation mutates its own copy.

use crate::ast::visit::{Visitor, walk};
use crate::ast::{Node, NodeKind, Stylesheet, render_values};
use crate::cache::ParseCache;
use crate::config::{CompilerConfig, CssResConfig};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::oracle::{PropertyOracle, ResourceProvider};
use crate::parser::{ParsedStylesheet, Source, parse_sources};
use crate::passes::bindings::resolve_bindings;
use crate::passes::canonicalize::canonicalize;
use crate::passes::conditionals::{required_axes, resolve_conditionals};
use crate::passes::externals::{collect_externals, observed_classes};
use crate::passes::obfuscate::{ObfuscationRequest, obfuscate};
use crate::passes::rtl::mirror;
use crate::passes::sprite::expand_sprites;
use crate::result::Result;
use crate::serialize::{RenderOptions, Rendered, render};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

pub use crate::passes::obfuscate::{ClassNameTable, ImportedScope};

/// One stylesheet to compile, with the accessors its generated code declares
#[derive(Debug, Clone, Default)]
pub struct CompileUnit {
    pub name: String,
    /// Sources parsed as one stylesheet, in order
    pub sources: Vec<Source>,
    /// Declared accessor names in declaration order
    pub accessors: Vec<String>,
    /// Names issued to related stylesheets compiled separately
    pub reserved: BTreeSet<String>,
    pub imports: Vec<ImportedScope>,
}

impl CompileUnit {
    pub fn new(name: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            name: name.into(),
            sources,
            ..Self::default()
        }
    }

    pub fn with_accessors(mut self, accessors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.accessors = accessors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reserved(mut self, reserved: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.reserved = reserved.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_import(mut self, import: ImportedScope) -> Self {
        self.imports.push(import);
        self
    }
}

/// Everything a compilation produces
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    pub ltr: Rendered,
    /// Mirrored stylesheet, when `emit-rtl` is set
    pub rtl: Option<Rendered>,
    pub class_names: ClassNameTable,
    /// Build axes the stylesheet's property-keyed `@if` links depend on
    pub required_axes: BTreeSet<String>,
    /// Rendered values of accessors that name `@def` constants
    pub def_values: IndexMap<String, String>,
    pub diagnostics: Diagnostics,
}

/// Stylesheet compiler
pub struct StylesheetCompiler {
    config: CompilerConfig,
    oracle: Arc<dyn PropertyOracle>,
    provider: Arc<dyn ResourceProvider>,
    cache: Arc<ParseCache>,
}

impl StylesheetCompiler {
    /// Create a compiler with its own parse cache
    pub fn new(
        config: CompilerConfig,
        oracle: Arc<dyn PropertyOracle>,
        provider: Arc<dyn ResourceProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(ParseCache::new(config.cache_capacity));
        Ok(Self {
            config,
            oracle,
            provider,
            cache,
        })
    }

    /// Create a compiler from a loaded configuration file
    pub fn from_config(config: CssResConfig) -> Result<Self> {
        Self::new(
            config.compiler,
            Arc::new(config.oracle),
            Arc::new(config.resources),
        )
    }

    /// Share a parse cache with other compilers
    pub fn with_cache(mut self, cache: Arc<ParseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ParseCache> {
        &self.cache
    }

    /// Run the full pipeline over one unit
    pub fn compile(&self, unit: &CompileUnit) -> Result<CompileOutput> {
        let start = Instant::now();
        let ParsedStylesheet {
            stylesheet: mut sheet,
            mut diagnostics,
        } = self.cache.get_or_parse(&unit.sources, parse_sources)?;

        let required_axes = required_axes(&sheet);
        let bindings = resolve_bindings(&mut sheet, self.provider.as_ref(), &mut diagnostics)?;
        resolve_conditionals(&mut sheet, self.oracle.as_ref())?;
        report_empty_rules(&sheet, &mut diagnostics);

        let observed = observed_classes(&sheet);
        let externals = collect_externals(&sheet, &observed);
        let def_keys: HashSet<String> = bindings.def_keys().map(String::from).collect();
        let request = ObfuscationRequest {
            accessors: &unit.accessors,
            def_keys: &def_keys,
            externals: &externals,
            imports: &unit.imports,
            reserved: &unit.reserved,
            prefix: &self.config.obfuscation_prefix,
            strict: self.config.strict,
        };
        let class_names = obfuscate(&mut sheet, &request, &observed, &mut diagnostics)?;

        let def_values = unit
            .accessors
            .iter()
            .filter_map(|accessor| {
                bindings
                    .def(accessor)
                    .map(|values| (accessor.clone(), render_values(values)))
            })
            .collect();

        expand_sprites(&mut sheet, self.provider.as_ref())?;

        let rtl = if self.config.emit_rtl {
            let mut mirrored = sheet.clone();
            mirror(&mut mirrored)?;
            Some(self.finish(mirrored)?)
        } else {
            None
        };
        let ltr = self.finish(sheet)?;

        tracing::info!(
            "Compiled {} ({} classes, {} diagnostics) in {:?}",
            unit.name,
            class_names.len(),
            diagnostics.len(),
            start.elapsed()
        );
        Ok(CompileOutput {
            ltr,
            rtl,
            class_names,
            required_axes,
            def_values,
            diagnostics,
        })
    }

    fn finish(&self, mut sheet: Stylesheet) -> Result<Rendered> {
        if self.config.merge_enabled {
            canonicalize(&mut sheet)?;
        }
        render(&sheet, &RenderOptions::new(self.config.style))
    }
}

/// Report rules that will be dropped from the output because they are empty
fn report_empty_rules(sheet: &Stylesheet, diagnostics: &mut Diagnostics) {
    struct EmptyRules<'a>(&'a mut Diagnostics);

    impl Visitor for EmptyRules<'_> {
        fn enter(&mut self, node: &Node) -> bool {
            if let NodeKind::Rule(rule) = &node.kind {
                if rule.properties.is_empty() {
                    self.0.push(Diagnostic::info(
                        "Empty rule dropped from the output",
                        rule.selector_text(),
                        node.location,
                    ));
                }
            }
            true
        }
    }

    walk(&mut EmptyRules(diagnostics), &sheet.nodes);
}

/// Compile independent units in parallel, returning results in input order
pub fn compile_batch(
    compiler: &StylesheetCompiler,
    units: &[CompileUnit],
) -> Vec<Result<CompileOutput>> {
    let start = Instant::now();
    let results: Vec<Result<CompileOutput>> =
        units.par_iter().map(|unit| compiler.compile(unit)).collect();

    let failed = results.iter().filter(|r| r.is_err()).count();
    tracing::info!(
        "Compiled {} stylesheets ({} failed) in {:?}",
        units.len(),
        failed,
        start.elapsed()
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{StaticPropertyOracle, StaticResourceProvider};

    fn compiler(config: CompilerConfig) -> StylesheetCompiler {
        StylesheetCompiler::new(
            config,
            Arc::new(StaticPropertyOracle::new().with_axis("locale", "fr")),
            Arc::new(StaticResourceProvider::new()),
        )
        .unwrap()
    }

    fn unit(text: &str, accessors: &[&str]) -> CompileUnit {
        CompileUnit::new("test", vec![Source::new("test.css", text)])
            .with_accessors(accessors.iter().copied())
    }

    #[test]
    fn test_pipeline_order() {
        let output = compiler(CompilerConfig::default())
            .compile(&unit(
                "@def GAP 4px;\n@if locale fr { .menu { float: left; margin: 0 GAP 0 0; } }\n.item { float: left; }",
                &["menu", "item", "GAP"],
            ))
            .unwrap();

        assert_eq!(
            output.ltr.text,
            ".AA{float:left;margin:0 4px 0 0;}.AB{float:left;}"
        );
        assert_eq!(
            output.rtl.unwrap().text,
            ".AA{float:right;margin:0 0 0 4px;}.AB{float:right;}"
        );
        assert_eq!(output.def_values.get("GAP").map(String::as_str), Some("4px"));
        assert_eq!(output.required_axes.into_iter().collect::<Vec<_>>(), vec!["locale"]);
    }

    #[test]
    fn test_merging_can_be_disabled() {
        let source = ".a { color: red; } .b { width: 1px; } .a { height: 1px; }";
        let config = CompilerConfig {
            merge_enabled: false,
            emit_rtl: false,
            ..CompilerConfig::default()
        };
        let output = compiler(config).compile(&unit(source, &[])).unwrap();
        assert_eq!(
            output.ltr.text,
            ".a{color:red;}.b{width:1px;}.a{height:1px;}"
        );
        assert!(output.rtl.is_none());
    }

    #[test]
    fn test_empty_rules_are_reported() {
        let output = compiler(CompilerConfig::default())
            .compile(&unit(".a { } .b { color: red; }", &["a", "b"]))
            .unwrap();
        assert_eq!(output.ltr.text, ".AB{color:red;}");
        assert!(output.diagnostics.iter().any(|d| d.subject == ".a"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = CompilerConfig {
            cache_capacity: 0,
            ..CompilerConfig::default()
        };
        let result = StylesheetCompiler::new(
            config,
            Arc::new(StaticPropertyOracle::new()),
            Arc::new(StaticResourceProvider::new()),
        );
        assert!(result.is_err());
    }
}
