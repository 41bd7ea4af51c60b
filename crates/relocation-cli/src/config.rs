//! Layered configuration for the `reloc` binary.
//!
//! `defaults/reloc.default.toml` is embedded into the binary; a user file
//! and command-line overrides are layered on top via [`Loader`] before the
//! result is deserialized into [`RelocConfig`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use relocation_core::{Concat, Externify, ExternifyRule, MemoryStore, Parser, Pipeline};
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_TOML: &str = include_str!("../defaults/reloc.default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct RelocConfig {
    pub parser: ParserConfig,
    pub pipeline: PipelineConfig,
    pub concat: ConcatConfig,
    pub externify: ExternifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    pub allow_unclosed_sections: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub processors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConcatConfig {
    pub rules: Vec<ConcatRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConcatRule {
    pub from: String,
    pub into: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternifyConfig {
    pub url_format: String,
    pub rules: BTreeMap<String, ExternifyRuleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternifyRuleConfig {
    pub reference: String,
    pub mimetype: String,
}

#[derive(Debug, Error)]
pub enum PipelineConfigError {
    #[error("unknown processor {0:?} (known: concat, externify)")]
    UnknownProcessor(String),
}

impl RelocConfig {
    pub fn parser(&self) -> Parser {
        Parser::new().allow_unclosed_sections(self.parser.allow_unclosed_sections)
    }

    /// Build the configured pipeline. Externified sections go to `store`.
    pub fn pipeline(&self, store: &Arc<MemoryStore>) -> Result<Pipeline, PipelineConfigError> {
        let mut pipeline = Pipeline::new().with_parser(self.parser());
        for name in &self.pipeline.processors {
            match name.as_str() {
                "concat" => {
                    for rule in &self.concat.rules {
                        pipeline = pipeline.with(Concat::new(&rule.from, &rule.into));
                    }
                }
                "externify" => {
                    let rules = self
                        .externify
                        .rules
                        .iter()
                        .map(|(section, rule)| {
                            (
                                section.clone(),
                                ExternifyRule::new(&rule.reference, &rule.mimetype),
                            )
                        })
                        .collect();
                    pipeline = pipeline.with(
                        Externify::new(Arc::clone(store))
                            .with_url_format(&self.externify.url_format)
                            .with_rules(rules),
                    );
                }
                other => return Err(PipelineConfigError::UnknownProcessor(other.to_string())),
            }
        }
        Ok(pipeline)
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
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

    /// Apply a single key/value override (used for command-line flags).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<RelocConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
