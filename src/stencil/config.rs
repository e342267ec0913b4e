//! Configuration loading
//!
//! `defaults/stencil.default.toml` is embedded into the crate and always forms the base layer.
//! Callers stack their own files and overrides on top through [`Loader`] and deserialize the
//! result into [`StencilConfig`], then turn it into compile options with
//! [`CompileOptions::from_config`](crate::stencil::template::CompileOptions::from_config).

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../../defaults/stencil.default.toml");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StencilConfig {
    pub delimiters: DelimitersConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DelimitersConfig {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenderConfig {
    /// Deepest allowed chain of nested includes
    pub max_include_depth: usize,
    pub escape_html: bool,
}

/// Layers user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer a configuration file that may not exist.
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer TOML text, e.g. read from somewhere other than the filesystem.
    pub fn with_toml(mut self, source: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(source, FileFormat::Toml));
        self
    }

    /// Apply a single dotted-key override such as `render.escape_html`.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<StencilConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// The built-in defaults alone
pub fn load_defaults() -> Result<StencilConfig, ConfigError> {
    Loader::new().build()
}
