//! SQL dialect presets: identifier quoting, placeholders and regular expressions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::QueryError;

pub trait Dialect: Send + Sync {
    /// Human readable dialect name, e.g. "PostgreSQL".
    fn name(&self) -> &'static str;

    /// Wraps an identifier in the dialect's quotation marks.
    ///
    /// - PostgreSQL uses double quotes: `"my_column"`
    /// - MySQL uses backticks: `` `my_column` ``
    fn escape_field(&self, field: &str) -> String;

    /// Placeholder for the 1-based parameter `index`.
    fn param_placeholder(&self, index: usize) -> String;

    /// Renders a regular expression match of `field` against `placeholder`.
    ///
    /// # Errors
    /// Dialects without regular expression support return `Unsupported`.
    fn regexp(&self, field: &str, placeholder: &str, ignore_case: bool) -> Result<String, QueryError>;
}

fn posix_regex(field: &str, placeholder: &str, ignore_case: bool) -> String {
    let operator = if ignore_case { "~*" } else { "~" };
    format!("{field} {operator} {placeholder}")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn escape_field(&self, field: &str) -> String {
        format!(r#""{field}""#)
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn regexp(&self, field: &str, placeholder: &str, ignore_case: bool) -> Result<String, QueryError> {
        Ok(posix_regex(field, placeholder, ignore_case))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Oracle;

impl Dialect for Oracle {
    fn name(&self) -> &'static str {
        "Oracle"
    }

    fn escape_field(&self, field: &str) -> String {
        format!(r#""{field}""#)
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!(":{index}")
    }

    fn regexp(&self, field: &str, placeholder: &str, ignore_case: bool) -> Result<String, QueryError> {
        Ok(posix_regex(field, placeholder, ignore_case))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn escape_field(&self, field: &str) -> String {
        format!("`{field}`")
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn regexp(&self, field: &str, placeholder: &str, _ignore_case: bool) -> Result<String, QueryError> {
        Ok(format!("{field} regexp {placeholder} = 1"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn escape_field(&self, field: &str) -> String {
        MySql.escape_field(field)
    }

    fn param_placeholder(&self, index: usize) -> String {
        MySql.param_placeholder(index)
    }

    fn regexp(&self, field: &str, placeholder: &str, ignore_case: bool) -> Result<String, QueryError> {
        MySql.regexp(field, placeholder, ignore_case)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MsSql;

impl Dialect for MsSql {
    fn name(&self) -> &'static str {
        "MSSQL"
    }

    fn escape_field(&self, field: &str) -> String {
        format!("[{field}]")
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn regexp(&self, _field: &str, _placeholder: &str, _ignore_case: bool) -> Result<String, QueryError> {
        Err(QueryError::Unsupported("\"regexp\" operator is not supported in MSSQL".to_string()))
    }
}

/// Named dialect preset, as selected from configuration or the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    #[serde(alias = "postgres", alias = "postgresql")]
    Pg,
    Oracle,
    Mysql,
    Sqlite,
    Mssql,
}

impl DialectKind {
    pub fn dialect(self) -> Arc<dyn Dialect> {
        match self {
            Self::Pg => Arc::new(Postgres),
            Self::Oracle => Arc::new(Oracle),
            Self::Mysql => Arc::new(MySql),
            Self::Sqlite => Arc::new(Sqlite),
            Self::Mssql => Arc::new(MsSql),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pg => "pg",
            Self::Oracle => "oracle",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Mssql => "mssql",
        })
    }
}

impl FromStr for DialectKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pg" | "postgres" | "postgresql" => Ok(Self::Pg),
            "oracle" => Ok(Self::Oracle),
            "mysql" => Ok(Self::Mysql),
            "sqlite" => Ok(Self::Sqlite),
            "mssql" => Ok(Self::Mssql),
            other => Err(QueryError::Unsupported(format!("unknown SQL dialect \"{other}\""))),
        }
    }
}
