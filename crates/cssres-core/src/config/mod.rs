//! Configuration system for cssres
//!
//! Configuration lives in a TOML file (`cssres.toml` or `.cssresrc.toml`)
//! discovered by walking up from the working directory. Besides the compiler
//! settings, the file can carry the build axes and resource table used by
//! the in-memory [`crate::oracle::StaticPropertyOracle`] and
//! [`crate::oracle::StaticResourceProvider`].

mod compiler_config;
mod loader;

// Re-export main types
pub use compiler_config::{CompilerConfig, CssResConfig, OutputStyle};
pub use loader::{CONFIG_FILE_NAMES, ConfigLoader};
