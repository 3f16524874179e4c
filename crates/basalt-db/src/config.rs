//! Configuration for a `basalt` database.
//!
//! Options are set by name from strings and validated against a fixed
//! catalog that can be enumerated by index.

use std::collections::BTreeMap;
use std::sync::Arc;

use datafusion::execution::runtime_env::{RuntimeEnv, RuntimeEnvBuilder};
use datafusion::prelude::SessionConfig;

use crate::api::ApiError;
use crate::error::DbError;

/// A recognized configuration option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigOption {
    /// Option name as passed to [`Config::set`].
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
}

const CATALOG: &[ConfigOption] = &[
    ConfigOption {
        name: "access_mode",
        description: "Access mode of the database (AUTOMATIC, READ_ONLY or READ_WRITE)",
    },
    ConfigOption {
        name: "threads",
        description: "The number of partitions the engine plans queries with",
    },
    ConfigOption {
        name: "max_memory",
        description: "The maximum memory of the system (e.g. 1GB)",
    },
    ConfigOption {
        name: "chunk_size",
        description: "The number of rows per engine batch and per Arrow chunk",
    },
    ConfigOption {
        name: "appender_flush_rows",
        description: "The number of buffered appender rows that triggers an automatic flush",
    },
    ConfigOption {
        name: "enable_information_schema",
        description: "Expose the information_schema views (true or false)",
    },
    ConfigOption {
        name: "enable_ident_normalization",
        description: "Lower-case unquoted identifiers (true or false)",
    },
];

/// Number of options in the catalog.
#[must_use]
pub fn config_count() -> usize {
    CATALOG.len()
}

/// Catalog entry at `index`, or `None` when out of range.
#[must_use]
pub fn config_flag(index: usize) -> Option<&'static ConfigOption> {
    CATALOG.get(index)
}

fn lookup(name: &str) -> Option<&'static ConfigOption> {
    CATALOG.iter().find(|o| o.name.eq_ignore_ascii_case(name))
}

/// How the database may be modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Read-write; chosen automatically.
    #[default]
    Automatic,
    /// DDL and DML are rejected; nothing is written back on close.
    ReadOnly,
    /// Read-write.
    ReadWrite,
}

impl AccessMode {
    /// Whether modifications are rejected.
    #[must_use]
    pub fn is_read_only(self) -> bool {
        self == Self::ReadOnly
    }
}

/// Configuration for a database instance.
///
/// Consumed when the database is opened.
#[derive(Debug, Clone)]
pub struct Config {
    /// Access mode.
    pub access_mode: AccessMode,
    /// Target partitions (`None` = engine default).
    pub threads: Option<usize>,
    /// Memory limit in bytes (`None` = unbounded).
    pub max_memory: Option<usize>,
    /// Rows per batch and per Arrow chunk.
    pub chunk_size: usize,
    /// Buffered appender rows that trigger an automatic flush.
    pub appender_flush_rows: usize,
    /// Expose `information_schema`.
    pub information_schema: bool,
    /// Lower-case unquoted identifiers.
    pub ident_normalization: bool,
    raw: BTreeMap<&'static str, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_mode: AccessMode::Automatic,
            threads: None,
            max_memory: None,
            chunk_size: 2048,
            appender_flush_rows: 100_000,
            information_schema: true,
            ident_normalization: true,
            raw: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option by name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown name or an invalid
    /// value. The configuration is unchanged on error.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ApiError> {
        let option = lookup(name).ok_or_else(|| ApiError::unknown_option(name))?;
        let v = value.trim();
        match option.name {
            "access_mode" => {
                self.access_mode = match v.to_ascii_lowercase().as_str() {
                    "automatic" => AccessMode::Automatic,
                    "read_only" => AccessMode::ReadOnly,
                    "read_write" => AccessMode::ReadWrite,
                    _ => {
                        return Err(ApiError::invalid_option(
                            option.name,
                            value,
                            "AUTOMATIC, READ_ONLY or READ_WRITE",
                        ))
                    }
                };
            }
            "threads" => self.threads = Some(parse_positive(option.name, value)?),
            "max_memory" => {
                let bytes = parse_memory_limit(v)
                    .ok_or_else(|| ApiError::invalid_option(option.name, value, "a size such as 512MB"))?;
                self.max_memory = Some(bytes);
            }
            "chunk_size" => self.chunk_size = parse_positive(option.name, value)?,
            "appender_flush_rows" => self.appender_flush_rows = parse_positive(option.name, value)?,
            "enable_information_schema" => self.information_schema = parse_bool(option.name, value)?,
            "enable_ident_normalization" => {
                self.ident_normalization = parse_bool(option.name, value)?;
            }
            _ => return Err(ApiError::unknown_option(name)),
        }
        self.raw.insert(option.name, value.to_string());
        Ok(())
    }

    /// The value last set for `name` (matched case-insensitively), as given.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let option = lookup(name)?;
        self.raw.get(option.name).map(String::as_str)
    }

    /// Options explicitly set, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.raw.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub(crate) fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new()
            .with_batch_size(self.chunk_size)
            .with_information_schema(self.information_schema);
        if let Some(threads) = self.threads {
            config = config.with_target_partitions(threads);
        }
        config.options_mut().sql_parser.enable_ident_normalization = self.ident_normalization;
        config
    }

    pub(crate) fn runtime_env(&self) -> Result<Arc<RuntimeEnv>, DbError> {
        let mut builder = RuntimeEnvBuilder::new();
        if let Some(limit) = self.max_memory {
            builder = builder.with_memory_limit(limit, 1.0);
        }
        Ok(builder.build_arc()?)
    }
}

fn parse_positive(name: &str, value: &str) -> Result<usize, ApiError> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ApiError::invalid_option(name, value, "a positive integer"))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Ok(true),
        "false" | "0" | "off" => Ok(false),
        _ => Err(ApiError::invalid_option(name, value, "true or false")),
    }
}

/// Parse sizes like `1GB`, `512 MiB`, `100kb` or a plain byte count.
fn parse_memory_limit(value: &str) -> Option<usize> {
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number.parse().ok()?;
    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" | "byte" | "bytes" => 1,
        "kb" | "k" => 1_000,
        "mb" | "m" => 1_000_000,
        "gb" | "g" => 1_000_000_000,
        "tb" | "t" => 1_000_000_000_000,
        "kib" => 1 << 10,
        "mib" => 1 << 20,
        "gib" => 1 << 30,
        "tib" => 1 << 40,
        _ => return None,
    };
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let bytes = (number * multiplier as f64) as u64;
    usize::try_from(bytes).ok().filter(|b| *b > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_enumeration() {
        assert_eq!(config_count(), 7);
        let first = config_flag(0).unwrap();
        assert_eq!(first.name, "access_mode");
        assert!(!first.description.is_empty());
        assert!(config_flag(config_count()).is_none());
    }

    #[test]
    fn test_set_known_options() {
        let mut config = Config::new();
        config.set("access_mode", "READ_ONLY").unwrap();
        config.set("threads", "4").unwrap();
        config.set("max_memory", "1GB").unwrap();
        config.set("chunk_size", "16").unwrap();
        assert_eq!(config.access_mode, AccessMode::ReadOnly);
        assert_eq!(config.threads, Some(4));
        assert_eq!(config.max_memory, Some(1_000_000_000));
        assert_eq!(config.chunk_size, 16);
        assert_eq!(config.get("threads"), Some("4"));
    }

    #[test]
    fn test_unknown_option_has_no_effect() {
        let mut config = Config::new();
        let err = config.set("not_an_option", "1").unwrap_err();
        assert_eq!(err.code(), crate::api::codes::UNKNOWN_OPTION);
        assert_eq!(config.iter().count(), 0);
        assert_eq!(config_count(), 7);
    }

    #[test]
    fn test_invalid_value_has_no_effect() {
        let mut config = Config::new();
        config.set("threads", "2").unwrap();
        let err = config.set("threads", "zero").unwrap_err();
        assert_eq!(err.code(), crate::api::codes::INVALID_OPTION_VALUE);
        assert_eq!(config.threads, Some(2));
        assert!(config.set("access_mode", "sideways").is_err());
        assert_eq!(config.access_mode, AccessMode::Automatic);
    }

    #[test]
    fn test_parse_memory_limit() {
        assert_eq!(parse_memory_limit("100"), Some(100));
        assert_eq!(parse_memory_limit("2 MiB"), Some(2 * 1024 * 1024));
        assert_eq!(parse_memory_limit("1.5gb"), Some(1_500_000_000));
        assert_eq!(parse_memory_limit("12 parsecs"), None);
        assert_eq!(parse_memory_limit("0"), None);
    }

    #[test]
    fn test_get_ignores_case() {
        let mut config = Config::new();
        config.set("THREADS", "4").unwrap();
        assert_eq!(config.get("THREADS"), Some("4"));
        assert_eq!(config.get("threads"), Some("4"));
        assert_eq!(config.get("Threads"), Some("4"));
        assert_eq!(config.get("chunk_size"), None);
        assert_eq!(config.get("no_such_option"), None);
    }
}
