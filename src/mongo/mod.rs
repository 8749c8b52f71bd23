//! Mongo-style query language on top of the generic object parser.
mod instructions;

use bson::Document;

use crate::ast::Condition;
use crate::errors::QueryError;
use crate::parse::{ObjectQueryParser, ParserOptions};
use crate::utils::json::parse_json_document;

pub use instructions::instructions;

fn strip_prefix(key: &str) -> String {
    key.strip_prefix('$').unwrap_or(key).to_string()
}

/// Parser options for Mongo queries: `$`-prefixed operators, `$eq` by default.
pub fn parser_options() -> ParserOptions {
    ParserOptions {
        default_operator: "$eq".to_string(),
        operator_prefix: Some("$".to_string()),
        operator_name: Some(strip_prefix),
        ..ParserOptions::default()
    }
}

pub fn mongo_parser() -> ObjectQueryParser {
    ObjectQueryParser::new(instructions(), parser_options())
}

/// Parse a Mongo query document with the default catalog.
pub fn parse(query: &Document) -> Result<Condition, QueryError> {
    mongo_parser().parse(query)
}

/// Parse a Mongo query given as JSON text.
pub fn parse_json(query: &str) -> Result<Condition, QueryError> {
    mongo_parser().parse(&parse_json_document(query)?)
}
