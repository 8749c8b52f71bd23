//! Layered configuration: defaults < config file < environment < command line.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::QueryError;
use crate::logger;
use crate::parse::ParserOptions;
use crate::sql::{DialectKind, SqlOptions};

pub const CONFIG_FILE: &str = "querycast.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub dialect: Option<DialectKind>,
    pub root_alias: Option<String>,
    /// Relations the SQL backend joins instead of flattening to a bare column.
    pub joins: Option<Vec<String>>,
    /// Keys and operands holding exactly this string are skipped.
    pub ignore_value: Option<String>,
    /// Operator used for `field: value` pairs, e.g. `$eq`.
    pub default_operator: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_retention: Option<usize>,
    /// Route `querycast::sql` records to their own `sql.log`.
    pub log_sql: Option<bool>,
}

impl QueryConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, QueryError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, QueryError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Read `QUERYCAST_*` variables through `var`.
    ///
    /// # Errors
    /// Fails on an unknown `QUERYCAST_DIALECT` or a non-numeric
    /// `QUERYCAST_LOG_RETENTION`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, QueryError> {
        let flag = |s: String| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        Ok(Self {
            dialect: var("QUERYCAST_DIALECT").map(|s| s.parse()).transpose()?,
            root_alias: var("QUERYCAST_ROOT_ALIAS"),
            joins: var("QUERYCAST_JOINS").map(|s| {
                s.split(',').map(str::trim).filter(|j| !j.is_empty()).map(String::from).collect()
            }),
            ignore_value: var("QUERYCAST_IGNORE_VALUE"),
            default_operator: var("QUERYCAST_DEFAULT_OPERATOR"),
            log_dir: var("QUERYCAST_LOG_DIR").map(PathBuf::from),
            log_level: var("QUERYCAST_LOG_LEVEL"),
            log_retention: var("QUERYCAST_LOG_RETENTION")
                .map(|s| {
                    s.parse().map_err(|_| QueryError::Setting {
                        name: "QUERYCAST_LOG_RETENTION".to_string(),
                        value: s,
                    })
                })
                .transpose()?,
            log_sql: var("QUERYCAST_LOG_SQL").map(flag),
        })
    }

    pub fn from_env() -> Result<Self, QueryError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Overwrite every field that `other` sets.
    pub fn merge(&mut self, other: QueryConfig) {
        if other.dialect.is_some() { self.dialect = other.dialect; }
        if other.root_alias.is_some() { self.root_alias = other.root_alias; }
        if other.joins.is_some() { self.joins = other.joins; }
        if other.ignore_value.is_some() { self.ignore_value = other.ignore_value; }
        if other.default_operator.is_some() { self.default_operator = other.default_operator; }
        if other.log_dir.is_some() { self.log_dir = other.log_dir; }
        if other.log_level.is_some() { self.log_level = other.log_level; }
        if other.log_retention.is_some() { self.log_retention = other.log_retention; }
        if other.log_sql.is_some() { self.log_sql = other.log_sql; }
    }

    /// Resolve the effective configuration.
    ///
    /// Files are looked up at `cli_path`, then `$QUERYCAST_CONFIG`, then
    /// `./querycast.toml`; the first one found is used. An explicit `cli_path` that
    /// cannot be read is an error.
    pub fn load(cli_path: Option<&Path>, cli: QueryConfig) -> Result<Self, QueryError> {
        let mut cfg = QueryConfig::default();
        if let Some(path) = cli_path {
            cfg.merge(Self::from_file(path)?);
        } else if let Some(path) = config_paths().into_iter().find(|p| p.exists()) {
            log::debug!(target: "querycast::config", "loading {}", path.display());
            cfg.merge(Self::from_file(&path)?);
        }
        cfg.merge(Self::from_env()?);
        cfg.merge(cli);
        Ok(cfg)
    }

    pub fn dialect(&self) -> DialectKind {
        self.dialect.unwrap_or_default()
    }

    /// Mongo parser options with this configuration applied.
    pub fn parser_options(&self) -> ParserOptions {
        let mut options = crate::mongo::parser_options();
        if let Some(op) = &self.default_operator {
            options.default_operator = op.clone();
        }
        if let Some(marker) = &self.ignore_value {
            options.ignore_value = Some(bson::Bson::String(marker.clone()));
        }
        options
    }

    /// Install the rolling file logger when a log directory is configured;
    /// otherwise fall back to `./log4rs.yaml` if present. Returns whether a
    /// logger was installed.
    pub fn init_logging(&self) -> Result<bool, Box<dyn std::error::Error>> {
        if let Some(dir) = &self.log_dir {
            logger::configure_logging(
                Some(dir.as_path()),
                self.log_level.as_deref(),
                self.log_retention,
                self.log_sql.unwrap_or(false),
            )?;
            return Ok(true);
        }
        if Path::new(logger::LOG4RS_FILE).exists() {
            logger::init()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn sql_options(&self) -> SqlOptions {
        let mut options = SqlOptions::new(self.dialect().dialect());
        if let Some(alias) = &self.root_alias {
            options = options.with_root_alias(alias.clone());
        }
        if let Some(joins) = &self.joins {
            options = options.with_joins(joins.clone());
        }
        options
    }
}

fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(p) = std::env::var("QUERYCAST_CONFIG") {
        paths.push(PathBuf::from(p));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(CONFIG_FILE));
    }
    paths
}
