//! rscope_options: rscope.json parsing and compiler options.
//!
//! Options are all optional; each consumer applies its own default when a
//! field is absent. Command-line flags are layered on top with
//! [`CompilerOptions::merge`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "rscope.json";

/// Compiler and runtime options, matching the rscope.json schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    // -- Language --
    /// Treat every script as if it began with `"use strict"`.
    pub strict: Option<bool>,

    // -- Scope storage --
    /// Extra slots reserved whenever a materialized scope outgrows its
    /// value array.
    pub growth_slack: Option<u32>,
    /// Longest scope chain a walk may follow before giving up.
    pub max_scope_depth: Option<u32>,

    // -- Runtime --
    /// Live scope instances tolerated before a collection cycle.
    pub gc_threshold: Option<usize>,
}

impl CompilerOptions {
    /// Overwrite every field that `overrides` sets.
    pub fn merge(&mut self, overrides: &CompilerOptions) {
        if overrides.strict.is_some() {
            self.strict = overrides.strict;
        }
        if overrides.growth_slack.is_some() {
            self.growth_slack = overrides.growth_slack;
        }
        if overrides.max_scope_depth.is_some() {
            self.max_scope_depth = overrides.max_scope_depth;
        }
        if overrides.gc_threshold.is_some() {
            self.gc_threshold = overrides.gc_threshold;
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict.unwrap_or(false)
    }

    /// Reject values no scope chain or collector could work with.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.max_scope_depth == Some(0) {
            return Err(OptionsError::Invalid {
                field: "maxScopeDepth",
                reason: "must be at least 1",
            });
        }
        if self.gc_threshold == Some(0) {
            return Err(OptionsError::Invalid {
                field: "gcThreshold",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

/// The rscope.json file structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RscopeConfig {
    pub compiler_options: Option<CompilerOptions>,
    /// Scripts run by `rscope run` when no file is given.
    pub files: Option<Vec<String>>,
}

impl RscopeConfig {
    /// The options section, or all defaults.
    pub fn options(&self) -> CompilerOptions {
        self.compiler_options.clone().unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid rscope.json")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Parse an rscope.json file from a string.
pub fn parse_config(content: &str) -> Result<RscopeConfig, OptionsError> {
    let config: RscopeConfig = serde_json::from_str(content)?;
    if let Some(options) = &config.compiler_options {
        options.validate()?;
    }
    Ok(config)
}

/// Parse an rscope.json file from a path.
pub fn parse_config_file(path: impl AsRef<Path>) -> Result<RscopeConfig, OptionsError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| OptionsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// The file written by `rscope init`.
pub fn default_config_json() -> String {
    let config = RscopeConfig {
        compiler_options: Some(CompilerOptions {
            strict: Some(false),
            growth_slack: Some(10),
            max_scope_depth: Some(500),
            gc_threshold: Some(256),
        }),
        files: None,
    };
    // Serializing plain structs cannot fail.
    serde_json::to_string_pretty(&config).unwrap_or_default() + "\n"
}
