//! Parse structured queries into a condition tree and translate that tree into SQL
//! or an in-memory predicate.
//!
//! ```ignore
//! let ast = querycast::mongo::parse_json(r#"{"age": {"$gte": 21}, "status": "active"}"#)?;
//! let out = querycast::sql::to_sql(&ast, querycast::sql::SqlOptions::default())?;
//! assert_eq!(out.sql, r#"("age" >= $1 and "status" = $2)"#);
//! ```
pub mod ast;
pub mod config;
pub mod errors;
pub mod interpret;
pub mod logger;
pub mod matcher;
pub mod mongo;
pub mod parse;
pub mod sql;
pub mod utils;

pub use ast::{Condition, Field, Operand};
pub use errors::QueryError;
pub use interpret::{InterpretationContext, Interpreter, Translation, Translator};
pub use parse::{ObjectQueryParser, ParserOptions};

include!(concat!(env!("OUT_DIR"), "/compiled_features.rs"));
