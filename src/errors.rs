use thiserror::Error;

use crate::parse::Level;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Unsupported operator \"{0}\"")]
    UnsupportedOperator(String),

    #[error("Unexpected {level} operator \"{operator}\" at {position} level")]
    UnexpectedLevel { operator: String, level: Level, position: Level },

    #[error("\"{0}\" operator expects to receive an array of conditions")]
    Shape(String),

    #[error("\"{operator}\" {message}")]
    Validation { operator: String, message: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error(
        "Unable to interpret \"{0}\" condition. Did you forget to register interpreter for it?"
    )]
    UnknownOperator(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("BSON: {0}")]
    Bson(#[from] bson::error::Error),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid setting {name}: {value}")]
    Setting { name: String, value: String },
}

impl QueryError {
    pub fn validation(operator: &str, message: impl Into<String>) -> Self {
        Self::Validation { operator: operator.to_string(), message: message.into() }
    }
}
