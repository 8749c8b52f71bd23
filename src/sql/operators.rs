use bson::Bson;
use std::cell::RefCell;

use super::query::Query;
use crate::ast::{Condition, Field, FieldCondition, Operand, Pattern};
use crate::errors::QueryError;
use crate::interpret::InterpretationContext;

pub type SqlContext<'a> = InterpretationContext<'a, RefCell<Query>, (), ()>;
type SqlResult = Result<(), QueryError>;

fn field_condition<'c>(condition: &'c Condition) -> Result<&'c FieldCondition, QueryError> {
    condition.as_field().ok_or_else(|| {
        QueryError::InvalidQuery(format!("\"{}\" expects a field condition", condition.operator()))
    })
}

fn literal<'c>(condition: &'c FieldCondition) -> Result<&'c Bson, QueryError> {
    condition
        .value()
        .as_value()
        .ok_or_else(|| QueryError::validation(condition.operator(), "expects a literal value"))
}

fn literal_array<'c>(condition: &'c FieldCondition) -> Result<&'c [Bson], QueryError> {
    condition
        .value()
        .as_array()
        .ok_or_else(|| QueryError::validation(condition.operator(), "expects an array"))
}

fn compare(condition: &Condition, query: &RefCell<Query>, operator: &str) -> SqlResult {
    let node = field_condition(condition)?;
    let value = literal(node)?.clone();
    query.borrow_mut().where_op(node.field(), operator, value)?;
    Ok(())
}

pub fn eq(condition: &Condition, query: &RefCell<Query>, _: &SqlContext<'_>) -> SqlResult {
    compare(condition, query, "=")
}

pub fn ne(condition: &Condition, query: &RefCell<Query>, _: &SqlContext<'_>) -> SqlResult {
    compare(condition, query, "<>")
}

pub fn lt(condition: &Condition, query: &RefCell<Query>, _: &SqlContext<'_>) -> SqlResult {
    compare(condition, query, "<")
}

pub fn lte(condition: &Condition, query: &RefCell<Query>, _: &SqlContext<'_>) -> SqlResult {
    compare(condition, query, "<=")
}

pub fn gt(condition: &Condition, query: &RefCell<Query>, _: &SqlContext<'_>) -> SqlResult {
    compare(condition, query, ">")
}

pub fn gte(condition: &Condition, query: &RefCell<Query>, _: &SqlContext<'_>) -> SqlResult {
    compare(condition, query, ">=")
}

pub fn exists(condition: &Condition, query: &RefCell<Query>, _: &SqlContext<'_>) -> SqlResult {
    let node = field_condition(condition)?;
    let present = matches!(literal(node)?, Bson::Boolean(true));
    let mut query = query.borrow_mut();
    let field = query.field(node.field())?;
    query.where_raw(format!("{field} is {}null", if present { "not " } else { "" }), []);
    Ok(())
}

fn many_params(condition: &Condition, query: &RefCell<Query>, function: &str) -> SqlResult {
    let node = field_condition(condition)?;
    let values = literal_array(node)?;
    let mut query = query.borrow_mut();
    let field = query.field(node.field())?;
    let placeholders = query.many_params(values.len()).join(", ");
    query.where_raw(format!("{field} {function}({placeholders})"), values.iter().cloned());
    Ok(())
}

pub fn within(condition: &Condition, query: &RefCell<Query>, _: &SqlContext<'_>) -> SqlResult {
    many_params(condition, query, "in")
}

pub fn nin(condition: &Condition, query: &RefCell<Query>, _: &SqlContext<'_>) -> SqlResult {
    many_params(condition, query, "not in")
}

pub fn modulo(condition: &Condition, query: &RefCell<Query>, _: &SqlContext<'_>) -> SqlResult {
    let node = field_condition(condition)?;
    let [divisor, remainder] = literal_array(node)? else {
        return Err(QueryError::validation(node.operator(), "expects an array with 2 numeric elements"));
    };
    let mut query = query.borrow_mut();
    let field = query.field(node.field())?;
    let params = query.many_params(2);
    let sql = format!("mod({field}, {}) = {}", params[0], params[1]);
    query.where_raw(sql, [divisor.clone(), remainder.clone()]);
    Ok(())
}

/// Interprets the nested condition with field names resolved under the matched field.
pub fn elem_match(condition: &Condition, query: &RefCell<Query>, context: &SqlContext<'_>) -> SqlResult {
    let node = field_condition(condition)?;
    let nested = node
        .value()
        .as_condition()
        .ok_or_else(|| QueryError::validation(node.operator(), "expects a nested condition"))?;

    let previous = {
        let mut query = query.borrow_mut();
        let prefix = match node.field() {
            Field::Named(name) => format!("{}{name}.", query.field_prefix()),
            Field::Itself => query.field_prefix().to_string(),
        };
        query.replace_field_prefix(prefix)
    };
    let result = context.interpret(nested, query);
    query.borrow_mut().replace_field_prefix(previous);
    result
}

pub fn regex(condition: &Condition, query: &RefCell<Query>, _: &SqlContext<'_>) -> SqlResult {
    let node = field_condition(condition)?;
    let pattern = match node.value() {
        Operand::Pattern(pattern) => pattern.clone(),
        Operand::Value(Bson::String(source)) => Pattern::new(source.as_str(), ""),
        _ => return Err(QueryError::validation(node.operator(), "expects a regular expression")),
    };
    let mut query = query.borrow_mut();
    let field = query.field(node.field())?;
    let sql = query.dialect().regexp(&field, &query.param(), pattern.ignore_case())?;
    query.where_raw(sql, [Bson::String(pattern.source)]);
    Ok(())
}

fn compound(
    condition: &Condition,
    query: &RefCell<Query>,
    context: &SqlContext<'_>,
    combinator: &str,
    inverted: bool,
) -> SqlResult {
    let node = condition.as_compound().ok_or_else(|| {
        QueryError::InvalidQuery(format!("\"{}\" expects a compound condition", condition.operator()))
    })?;
    let child = RefCell::new(query.borrow().child());
    for nested in node.children() {
        context.interpret(nested, &child)?;
    }
    query.borrow_mut().merge(child.into_inner(), combinator, inverted);
    Ok(())
}

pub fn and(condition: &Condition, query: &RefCell<Query>, context: &SqlContext<'_>) -> SqlResult {
    compound(condition, query, context, "and", false)
}

pub fn or(condition: &Condition, query: &RefCell<Query>, context: &SqlContext<'_>) -> SqlResult {
    compound(condition, query, context, "or", false)
}

pub fn not(condition: &Condition, query: &RefCell<Query>, context: &SqlContext<'_>) -> SqlResult {
    compound(condition, query, context, "and", true)
}

pub fn nor(condition: &Condition, query: &RefCell<Query>, context: &SqlContext<'_>) -> SqlResult {
    compound(condition, query, context, "or", true)
}
