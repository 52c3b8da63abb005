//! CssRes Core
//!
//! Build-time compiler for an extended stylesheet language: CSS with
//! constants, compile-time conditionals, externally resolved values,
//! right-to-left mirroring and class-name obfuscation.
//! This crate provides the AST, the reference parser, every compiler pass,
//! the serializer and the pipeline driver.

pub mod ast;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod oracle;
pub mod parser;
pub mod passes;
pub mod result;
pub mod serialize;

// Re-export commonly used types
pub use ast::{
    Binding, BindingKind, Condition, Def, DynamicExpr, ExternalSelectors, FontFace, If,
    MediaRule, NoFlip, Node, NodeId, NodeKind, PageRule, Property, Rule, Selector, Sprite,
    Stylesheet, UnknownAtRule, Value,
};
pub use cache::{CacheStats, ParseCache};
pub use compiler::{
    ClassNameTable, CompileOutput, CompileUnit, ImportedScope, StylesheetCompiler, compile_batch,
};
pub use config::{CompilerConfig, ConfigLoader, CssResConfig, OutputStyle};
pub use diagnostics::{Diagnostic, DiagnosticRenderer, Diagnostics, Location, OutputFormat, Severity};
pub use error::{CssResError, ErrorKind};
pub use oracle::{
    ImageResource, PropertyOracle, RepeatStyle, ResourceKind, ResourceProvider,
    StaticPropertyOracle, StaticResourceProvider,
};
pub use parser::{ParsedStylesheet, Source, parse_sources, parse_stylesheet};
pub use result::{Result, ResultExt};
pub use serialize::{RenderOptions, Rendered, Substitution, SubstitutionRequest, render};

/// Initialize the tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cssres=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
