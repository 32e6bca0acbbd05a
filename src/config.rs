//! Configuration management

use std::{fmt, path::Path, sync::OnceLock};

use clap::ValueEnum;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Compiler configuration
    pub compiler: CompilerConfig,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or holds a value that would produce an invalid rule.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // CERTMATCH_COMPILER__RULE_PREFIX -> compiler.rule_prefix
        figment = figment.merge(Env::prefixed("CERTMATCH_").split("__"));

        let config: Self = figment.extract().map_err(|e| Error::Config(e.to_string()))?;
        config.compiler.validate()?;
        Ok(config)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Name accepted by [`crate::setup_tracing`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// Compiler configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Prepended to every generated rule name
    pub rule_prefix: String,
    /// How `compile` prints rules
    pub output: OutputFormat,
}

impl CompilerConfig {
    /// Check that `rule_prefix` keeps rule names valid identifiers.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for a prefix with characters other than ASCII
    /// letters, digits and `_`, or one starting with a digit.
    pub fn validate(&self) -> Result<()> {
        static PREFIX_RE: OnceLock<Regex> = OnceLock::new();

        let prefix_re = PREFIX_RE
            .get_or_init(|| Regex::new("^([A-Za-z_][A-Za-z0-9_]*)?$").expect("static regex"));
        if prefix_re.is_match(&self.rule_prefix) {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "compiler.rule_prefix must be empty or an identifier (was {:?})",
                self.rule_prefix
            )))
        }
    }
}

/// Rendering of compiled rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Policy-language text
    #[default]
    Rego,
    /// Serialized IR
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rego => "rego",
            Self::Json => "json",
        })
    }
}
