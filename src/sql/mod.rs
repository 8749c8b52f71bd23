//! Renders condition trees as parameterized SQL `where` fragments.
pub mod dialect;
pub mod operators;
mod query;

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::OnceLock;

use crate::ast::Condition;
use crate::errors::QueryError;
use crate::interpret::Interpreter;

pub use dialect::{Dialect, DialectKind, MsSql, MySql, Oracle, Postgres, Sqlite};
pub use query::{JoinRelationFn, Query, SqlOptions, SqlOutput};

/// Operator table over a shared SQL builder.
pub type SqlInterpreter = Interpreter<RefCell<Query>, ()>;

/// Every built-in SQL operator, registered under its condition name.
pub fn default_operators() -> SqlInterpreter {
    Interpreter::default()
        .with_operator("eq", operators::eq)
        .with_operator("ne", operators::ne)
        .with_operator("lt", operators::lt)
        .with_operator("lte", operators::lte)
        .with_operator("gt", operators::gt)
        .with_operator("gte", operators::gte)
        .with_operator("exists", operators::exists)
        .with_operator("in", operators::within)
        .with_operator("nin", operators::nin)
        .with_operator("mod", operators::modulo)
        .with_operator("elemMatch", operators::elem_match)
        .with_operator("regex", operators::regex)
        .with_operator("and", operators::and)
        .with_operator("or", operators::or)
        .with_operator("not", operators::not)
        .with_operator("nor", operators::nor)
}

/// Render `condition` with a custom operator table.
///
/// # Errors
/// `UnknownOperator` for unregistered operators, `Unsupported` when the dialect
/// cannot express an operator, or operand validation errors.
pub fn interpret_sql(
    interpreter: &SqlInterpreter,
    condition: &Condition,
    options: SqlOptions,
    host: Option<Rc<dyn Any>>,
) -> Result<SqlOutput, QueryError> {
    log::debug!(target: "querycast::sql", "rendering {} for {}", condition.operator(), options.dialect.name());
    let query = RefCell::new(Query::new(options, host));
    interpreter.interpret(condition, &query)?;
    Ok(query.into_inner().into_output())
}

/// Render `condition` with the built-in operators.
pub fn to_sql(condition: &Condition, options: SqlOptions) -> Result<SqlOutput, QueryError> {
    static DEFAULT: OnceLock<SqlInterpreter> = OnceLock::new();
    interpret_sql(DEFAULT.get_or_init(default_operators), condition, options, None)
}
