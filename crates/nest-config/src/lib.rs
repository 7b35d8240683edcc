//! Configuration for the nest tools: how archives are indexed, which name
//! prefixes belong to the host, and how logs are written.

use std::path::Path;
use std::sync::Once;

use nest_archive::IndexOptions;
use nest_loader::ReservedNamespaces;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::prelude::*;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` quotes the offending source line; keep only the
        // message and the byte span.
        let message = err.message().trim().to_owned();
        match err.span() {
            Some(span) => {
                ConfigError::Toml(format!("{message} (at bytes {}..{})", span.start, span.end))
            }
            None => ConfigError::Toml(message),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NestConfig {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub namespaces: NamespaceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NestConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let config: NestConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.class_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "index.class_suffix must not be empty".to_owned(),
            ));
        }
        if self.index.archive_suffixes.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid(
                "index.archive_suffixes must not contain empty suffixes".to_owned(),
            ));
        }
        let namespaces = &self.namespaces;
        if namespaces.builtin.iter().chain(&namespaces.internal).any(String::is_empty) {
            // An empty prefix would reserve every name.
            return Err(ConfigError::Invalid(
                "namespace prefixes must not be empty".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            recursive: self.index.recursive,
            class_suffix: self.index.class_suffix.clone(),
            archive_suffixes: self.index.archive_suffixes.clone(),
        }
    }

    pub fn reserved_namespaces(&self) -> ReservedNamespaces {
        ReservedNamespaces {
            builtin: self.namespaces.builtin.clone(),
            internal: self.namespaces.internal.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Index archives nested inside archives.
    #[serde(default = "IndexConfig::default_recursive")]
    pub recursive: bool,

    /// Suffix of entries holding compiled units.
    #[serde(default = "IndexConfig::default_class_suffix")]
    pub class_suffix: String,

    /// Suffixes of entries that are themselves archives.
    #[serde(default = "IndexConfig::default_archive_suffixes")]
    pub archive_suffixes: Vec<String>,
}

impl IndexConfig {
    fn default_recursive() -> bool {
        true
    }

    fn default_class_suffix() -> String {
        ".class".to_owned()
    }

    fn default_archive_suffixes() -> Vec<String> {
        vec![".jar".to_owned()]
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            recursive: Self::default_recursive(),
            class_suffix: Self::default_class_suffix(),
            archive_suffixes: Self::default_archive_suffixes(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamespaceConfig {
    /// Prefixes of the host runtime's own names.
    #[serde(default = "NamespaceConfig::default_builtin")]
    pub builtin: Vec<String>,

    /// Prefixes of names that belong to the embedding launcher.
    #[serde(default)]
    pub internal: Vec<String>,
}

impl NamespaceConfig {
    fn default_builtin() -> Vec<String> {
        ReservedNamespaces::default().builtin
    }
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            builtin: Self::default_builtin(),
            internal: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A simple level (`info`, `debug`, ...) or an `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            "off" | "none" => "off".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// The effective filter: the configured level, with `RUST_LOG` merged in
    /// when set.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

static TRACING_INIT: Once = Once::new();

/// Installs the global `tracing` subscriber writing to stderr.
///
/// Safe to call more than once; only the first call has any effect.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();
        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        // Someone else (a test harness, an embedding host) may already own the
        // global default.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
