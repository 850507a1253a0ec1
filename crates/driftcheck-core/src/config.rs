//! Configuration schema (driftcheck.toml)

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::report::ReportFormat;

/// Canonical schema when neither the config nor the catalog names one
pub const DEFAULT_CANONICAL_SCHEMA: &str = "dbo";

/// Where the text report lands when nothing else is configured
pub const DEFAULT_REPORT_PATH: &str = "errors.txt";

/// Environment prefix of the reference ("Application") connection
pub const REFERENCE_ENV_PREFIX: &str = "DB";

/// Environment prefix of the candidate ("Test") connection
pub const CANDIDATE_ENV_PREFIX: &str = "DEV_DB";

/// Catalog backend of one connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    #[default]
    #[serde(alias = "postgresql")]
    Postgres,

    #[serde(alias = "mssql")]
    SqlServer,
}

impl DatabaseEngine {
    pub fn default_port(self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::SqlServer => 1433,
        }
    }

    /// Schema new tables land in when none is given
    pub fn default_schema(self) -> &'static str {
        match self {
            Self::Postgres => "public",
            Self::SqlServer => "dbo",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::SqlServer => "sqlserver",
        }
    }
}

impl std::fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DatabaseEngine {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            other => Err(ConfigError::ParseError(format!("unknown database engine '{}'", other))),
        }
    }
}

/// Attribute checks that can be switched off
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredErrors {
    /// Skip the `is_foreign_key` comparison
    #[serde(default)]
    pub foreign_key: bool,

    /// Skip the `is_primary_key` comparison
    #[serde(default)]
    pub primary_key: bool,
}

/// Settings of one comparison run, immutable once the run starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Schema subject to the table presence check. When unset, the
    /// candidate catalog's default schema is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_schema: Option<String>,

    /// Table or column names excluded from attribute comparison
    #[serde(default)]
    pub ignored_tables: BTreeSet<String>,

    #[serde(default)]
    pub ignored_errors: IgnoredErrors,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            canonical_schema: None,
            ignored_tables: BTreeSet::new(),
            ignored_errors: IgnoredErrors::default(),
        }
    }
}

impl ComparisonConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignored_tables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_tables.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_ignored_errors(mut self, ignored_errors: IgnoredErrors) -> Self {
        self.ignored_errors = ignored_errors;
        self
    }

    pub fn with_canonical_schema(mut self, schema: impl Into<String>) -> Self {
        self.canonical_schema = Some(schema.into());
        self
    }

    /// Fill in the canonical schema from the catalog when the config left
    /// it unset
    pub fn with_fallback_schema(&self, schema: &str) -> Self {
        let mut resolved = self.clone();
        if resolved.canonical_schema.is_none() {
            resolved.canonical_schema = Some(schema.to_string());
        }
        resolved
    }

    /// Effective canonical schema
    pub fn canonical_schema(&self) -> &str {
        self.canonical_schema.as_deref().unwrap_or(DEFAULT_CANONICAL_SCHEMA)
    }

    /// Whether a table or column name is excluded
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored_tables.contains(name)
    }
}

/// Connection parameters of one database
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub engine: DatabaseEngine,

    pub host: String,

    /// Defaults to the engine's well-known port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    pub user: String,

    #[serde(default)]
    pub password: String,

    pub database: String,

    /// Connect over TLS
    #[serde(default)]
    pub tls: bool,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("tls", &self.tls)
            .finish()
    }
}

impl ConnectionConfig {
    /// Read `{PREFIX}_HOST`, `_PORT`, `_USER`, `_PASSWORD`, `_NAME` from the
    /// process environment. `_ENGINE` picks the backend and `_TLS` turns on
    /// encryption.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            lookup(&format!("{}_{}", prefix, suffix)).filter(|v| !v.trim().is_empty())
        };
        let required = |suffix: &str| {
            var(suffix).ok_or_else(|| ConfigError::MissingSetting(format!("{}_{}", prefix, suffix)))
        };

        let engine = match var("ENGINE") {
            Some(raw) => raw.parse()?,
            None => DatabaseEngine::default(),
        };

        let port = var("PORT")
            .map(|raw| {
                raw.trim().parse().map_err(|_| {
                    ConfigError::ParseError(format!("{}_PORT is not a valid port: '{}'", prefix, raw))
                })
            })
            .transpose()?;

        let tls = var("TLS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            engine,
            host: required("HOST")?,
            port,
            user: required("USER")?,
            password: var("PASSWORD").unwrap_or_default(),
            database: required("NAME")?,
            tls,
        })
    }

    /// Configured port, or the engine's default
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.engine.default_port())
    }

    /// `host:port/database` for logs
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port(), self.database)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,

    #[serde(default)]
    pub report_format: ReportFormat,

    /// Overall deadline for one run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub comparison: ComparisonConfig,

    /// Known-good database; falls back to `DB_*` variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ConnectionConfig>,

    /// Database under test; falls back to `DEV_DB_*` variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<ConnectionConfig>,
}

fn default_report_path() -> PathBuf {
    PathBuf::from(DEFAULT_REPORT_PATH)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            report_path: default_report_path(),
            report_format: ReportFormat::default(),
            timeout_secs: None,
            comparison: ComparisonConfig::default(),
            reference: None,
            candidate: None,
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Reference connection from the config file or the environment
    pub fn reference_connection(&self) -> Result<ConnectionConfig, ConfigError> {
        match &self.reference {
            Some(conn) => Ok(conn.clone()),
            None => ConnectionConfig::from_env(REFERENCE_ENV_PREFIX),
        }
    }

    /// Candidate connection from the config file or the environment
    pub fn candidate_connection(&self) -> Result<ConnectionConfig, ConfigError> {
        match &self.candidate {
            Some(conn) => Ok(conn.clone()),
            None => ConnectionConfig::from_env(CANDIDATE_ENV_PREFIX),
        }
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Missing setting: {0}")]
    MissingSetting(String),
}
