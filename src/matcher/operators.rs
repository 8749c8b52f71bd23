use bson::Bson;
use std::borrow::Cow;
use std::cmp::Ordering;

use super::compare::{as_f64, compare_values, values_equal};
use super::path::{get_path, get_value};
use crate::ast::{Condition, Field, FieldCondition};
use crate::errors::QueryError;
use crate::interpret::InterpretationContext;

pub type MatchContext<'a> = InterpretationContext<'a, Bson, bool, ()>;
type MatchResult = Result<bool, QueryError>;

fn field_condition<'c>(condition: &'c Condition) -> Result<&'c FieldCondition, QueryError> {
    condition.as_field().ok_or_else(|| {
        QueryError::InvalidQuery(format!("\"{}\" expects a field condition", condition.operator()))
    })
}

fn children(condition: &Condition) -> Result<&[Condition], QueryError> {
    condition.as_compound().map(|c| c.children()).ok_or_else(|| {
        QueryError::InvalidQuery(format!("\"{}\" expects a compound condition", condition.operator()))
    })
}

fn literal<'c>(node: &'c FieldCondition) -> Result<&'c Bson, QueryError> {
    node.value()
        .as_value()
        .ok_or_else(|| QueryError::validation(node.operator(), "expects a literal value"))
}

fn literal_array<'c>(node: &'c FieldCondition) -> Result<&'c [Bson], QueryError> {
    node.value()
        .as_array()
        .ok_or_else(|| QueryError::validation(node.operator(), "expects an array"))
}

/// Missing paths compare like `null`.
fn resolve<'a>(object: &'a Bson, field: &Field) -> Cow<'a, Bson> {
    get_value(object, field).unwrap_or(Cow::Owned(Bson::Null))
}

fn includes(items: &[Bson], value: &Bson) -> bool {
    items.iter().any(|item| values_equal(item, value))
}

/// Apply `test` to the value, or to each element when the value is an array.
fn any_value(value: &Bson, test: impl Fn(&Bson) -> bool) -> bool {
    match value {
        Bson::Array(items) => items.iter().any(test),
        other => test(other),
    }
}

pub fn and(condition: &Condition, object: &Bson, context: &MatchContext<'_>) -> MatchResult {
    for child in children(condition)? {
        if !context.interpret(child, object)? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn or(condition: &Condition, object: &Bson, context: &MatchContext<'_>) -> MatchResult {
    for child in children(condition)? {
        if context.interpret(child, object)? {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn nor(condition: &Condition, object: &Bson, context: &MatchContext<'_>) -> MatchResult {
    Ok(!or(condition, object, context)?)
}

pub fn not(condition: &Condition, object: &Bson, context: &MatchContext<'_>) -> MatchResult {
    Ok(!and(condition, object, context)?)
}

pub fn eq(condition: &Condition, object: &Bson, _: &MatchContext<'_>) -> MatchResult {
    let node = field_condition(condition)?;
    let expected = literal(node)?;
    let value = resolve(object, node.field());
    if let Bson::Array(items) = value.as_ref()
        && !matches!(expected, Bson::Array(_))
    {
        return Ok(includes(items, expected));
    }
    Ok(values_equal(&value, expected))
}

pub fn ne(condition: &Condition, object: &Bson, context: &MatchContext<'_>) -> MatchResult {
    Ok(!eq(condition, object, context)?)
}

fn range(condition: &Condition, object: &Bson, accept: fn(Ordering) -> bool) -> MatchResult {
    let node = field_condition(condition)?;
    let bound = literal(node)?;
    let Some(value) = get_value(object, node.field()) else {
        return Ok(false);
    };
    Ok(any_value(&value, |v| compare_values(v, bound).is_some_and(accept)))
}

pub fn lt(condition: &Condition, object: &Bson, _: &MatchContext<'_>) -> MatchResult {
    range(condition, object, Ordering::is_lt)
}

pub fn lte(condition: &Condition, object: &Bson, _: &MatchContext<'_>) -> MatchResult {
    range(condition, object, Ordering::is_le)
}

pub fn gt(condition: &Condition, object: &Bson, _: &MatchContext<'_>) -> MatchResult {
    range(condition, object, Ordering::is_gt)
}

pub fn gte(condition: &Condition, object: &Bson, _: &MatchContext<'_>) -> MatchResult {
    range(condition, object, Ordering::is_ge)
}

pub fn within(condition: &Condition, object: &Bson, _: &MatchContext<'_>) -> MatchResult {
    let node = field_condition(condition)?;
    let candidates = literal_array(node)?;
    let value = resolve(object, node.field());
    if let Bson::Array(items) = value.as_ref() {
        return Ok(candidates.iter().any(|c| includes(items, c)));
    }
    Ok(includes(candidates, &value))
}

pub fn nin(condition: &Condition, object: &Bson, context: &MatchContext<'_>) -> MatchResult {
    Ok(!within(condition, object, context)?)
}

pub fn all(condition: &Condition, object: &Bson, _: &MatchContext<'_>) -> MatchResult {
    let node = field_condition(condition)?;
    let required = literal_array(node)?;
    match get_value(object, node.field()).as_deref() {
        Some(Bson::Array(items)) => Ok(required.iter().all(|r| includes(items, r))),
        _ => Ok(false),
    }
}

pub fn size(condition: &Condition, object: &Bson, _: &MatchContext<'_>) -> MatchResult {
    let node = field_condition(condition)?;
    let expected = as_f64(literal(node)?)
        .ok_or_else(|| QueryError::validation(node.operator(), "expects value to be a \"number\""))?;
    match get_value(object, node.field()).as_deref() {
        Some(Bson::Array(items)) => Ok(items.len() as f64 == expected),
        _ => Ok(false),
    }
}

/// Operands are truncated to integers before the remainder is taken.
pub fn modulo(condition: &Condition, object: &Bson, _: &MatchContext<'_>) -> MatchResult {
    let node = field_condition(condition)?;
    let invalid = || QueryError::validation(node.operator(), "expects an array with 2 numeric elements");
    let [divisor, remainder] = literal_array(node)? else {
        return Err(invalid());
    };
    let divisor = as_f64(divisor).ok_or_else(invalid)?.trunc();
    let remainder = as_f64(remainder).ok_or_else(invalid)?.trunc();
    if divisor == 0.0 {
        return Ok(false);
    }
    let Some(value) = get_value(object, node.field()) else {
        return Ok(false);
    };
    Ok(any_value(&value, |v| as_f64(v).is_some_and(|n| n.trunc() % divisor == remainder)))
}

/// Checks the key on the parent of the last path segment. A parent that is null or
/// missing never matches, whichever flag was requested.
fn is_falsy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => !b,
        Bson::Int32(n) => *n == 0,
        Bson::Int64(n) => *n == 0,
        Bson::Double(n) => *n == 0.0 || n.is_nan(),
        Bson::String(s) => s.is_empty(),
        _ => false,
    }
}

pub fn exists(condition: &Condition, object: &Bson, _: &MatchContext<'_>) -> MatchResult {
    let node = field_condition(condition)?;
    let expected = matches!(literal(node)?, Bson::Boolean(true));
    let Field::Named(path) = node.field() else {
        return Ok(true);
    };

    let (parent, key) = match path.rsplit_once('.') {
        Some((parent_path, key)) => (get_path(object, parent_path), key),
        None => (Some(Cow::Borrowed(object)), path.as_str()),
    };

    let present = match parent.as_deref() {
        None | Some(Bson::Null) => return Ok(false),
        Some(parent) if is_falsy(parent) => return Ok(false),
        Some(Bson::Document(doc)) => doc.contains_key(key),
        Some(Bson::Array(items)) => items.iter().any(|item| {
            matches!(item, Bson::Document(doc) if doc.contains_key(key))
        }),
        Some(_) => false,
    };
    Ok(present == expected)
}

#[cfg(feature = "regex")]
pub fn regex(condition: &Condition, object: &Bson, _: &MatchContext<'_>) -> MatchResult {
    let node = field_condition(condition)?;
    let (source, flags) = match node.value() {
        crate::ast::Operand::Pattern(p) => (p.source.as_str(), p.flags.as_str()),
        crate::ast::Operand::Value(Bson::String(s)) => (s.as_str(), ""),
        _ => return Err(QueryError::validation(node.operator(), "expects a regular expression")),
    };
    let mut builder = regex::RegexBuilder::new(source);
    builder
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'));
    let re = builder
        .build()
        .map_err(|e| QueryError::validation(node.operator(), format!("has an invalid pattern: {e}")))?;

    let Some(value) = get_value(object, node.field()) else {
        return Ok(false);
    };
    Ok(any_value(&value, |v| matches!(v, Bson::String(s) if re.is_match(s))))
}

#[cfg(not(feature = "regex"))]
pub fn regex(_: &Condition, _: &Bson, _: &MatchContext<'_>) -> MatchResult {
    Err(QueryError::Unsupported(
        "\"regex\" operator requires the `regex` feature".to_string(),
    ))
}

/// True when any array element satisfies the nested condition.
pub fn elem_match(condition: &Condition, object: &Bson, context: &MatchContext<'_>) -> MatchResult {
    let node = field_condition(condition)?;
    let nested = node
        .value()
        .as_condition()
        .ok_or_else(|| QueryError::validation(node.operator(), "expects a nested condition"))?;
    let Some(value) = get_value(object, node.field()) else {
        return Ok(false);
    };
    let Bson::Array(items) = value.as_ref() else {
        return Ok(false);
    };
    for item in items {
        if context.interpret(nested, item)? {
            return Ok(true);
        }
    }
    Ok(false)
}
