use bson::Bson;

use super::context::ParsingContext;
use super::instruction::{Instruction, Level};
use crate::ast::{CompoundCondition, Condition, DocumentCondition, FieldCondition, ITSELF};
use crate::errors::QueryError;

/// Level default used when an instruction has no custom parser.
pub fn parse_default(
    instruction: &Instruction,
    value: &Bson,
    context: &ParsingContext<'_>,
) -> Result<Option<Condition>, QueryError> {
    match instruction.level() {
        Level::Compound => parse_compound(instruction, value, context),
        Level::Field => Ok(Some(parse_field(instruction, value, context))),
        Level::Document => Ok(Some(parse_document(instruction, value))),
    }
}

/// Each element of an array (or a single document) is parsed as a nested query.
pub fn parse_compound(
    instruction: &Instruction,
    value: &Bson,
    context: &ParsingContext<'_>,
) -> Result<Option<Condition>, QueryError> {
    let conditions = match parse_sub_queries(instruction, value, context)? {
        Some(conditions) => conditions,
        None => return Ok(None),
    };
    Ok(Some(CompoundCondition::new(instruction.name(), conditions).into()))
}

/// Parse the sub-queries of a compound operator.
///
/// Returns `None` when every element was the ignore marker, so the operator
/// contributes nothing.
pub fn parse_sub_queries(
    instruction: &Instruction,
    value: &Bson,
    context: &ParsingContext<'_>,
) -> Result<Option<Vec<Condition>>, QueryError> {
    match value {
        Bson::Array(queries) => {
            let mut conditions = Vec::with_capacity(queries.len());
            for query in queries {
                if context.is_ignored(query) {
                    continue;
                }
                match query {
                    Bson::Document(doc) => conditions.push(context.parse(doc)?),
                    _ => return Err(QueryError::Shape(instruction.name().to_string())),
                }
            }
            if conditions.is_empty() && !queries.is_empty() {
                return Ok(None);
            }
            Ok(Some(conditions))
        }
        Bson::Document(doc) => Ok(Some(vec![context.parse(doc)?])),
        _ => Err(QueryError::Shape(instruction.name().to_string())),
    }
}

pub fn parse_field(instruction: &Instruction, value: &Bson, context: &ParsingContext<'_>) -> Condition {
    let field = context.field().cloned().unwrap_or(ITSELF);
    FieldCondition::new(instruction.name(), field, value.clone()).into()
}

pub fn parse_document(instruction: &Instruction, value: &Bson) -> Condition {
    DocumentCondition::new(instruction.name(), value.clone()).into()
}
