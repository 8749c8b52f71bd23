use bson::Bson;

use crate::ast::{CompoundCondition, Condition, FieldCondition, ITSELF, Pattern, optimized_compound};
use crate::errors::QueryError;
use crate::parse::{Instruction, InstructionSet, defaults};

fn is_number(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

fn ensure_array(instruction: &Instruction, value: &Bson) -> Result<(), QueryError> {
    match value {
        Bson::Array(_) => Ok(()),
        _ => Err(QueryError::validation(instruction.name(), "expects value to be an array")),
    }
}

fn ensure_non_empty_array(instruction: &Instruction, value: &Bson) -> Result<(), QueryError> {
    ensure_array(instruction, value)?;
    match value {
        Bson::Array(items) if items.is_empty() => Err(QueryError::validation(
            instruction.name(),
            "expects to have at least one element in array",
        )),
        _ => Ok(()),
    }
}

fn ensure_comparable(instruction: &Instruction, value: &Bson) -> Result<(), QueryError> {
    if is_number(value) || matches!(value, Bson::String(_) | Bson::DateTime(_)) {
        return Ok(());
    }
    Err(QueryError::validation(
        instruction.name(),
        "expects value to be comparable (i.e., string, number or date)",
    ))
}

fn ensure_number(instruction: &Instruction, value: &Bson) -> Result<(), QueryError> {
    if is_number(value) {
        return Ok(());
    }
    Err(QueryError::validation(instruction.name(), "expects value to be a \"number\""))
}

fn ensure_bool(instruction: &Instruction, value: &Bson) -> Result<(), QueryError> {
    match value {
        Bson::Boolean(_) => Ok(()),
        _ => Err(QueryError::validation(instruction.name(), "expects value to be a \"boolean\"")),
    }
}

fn and_or() -> Instruction {
    Instruction::compound().with_validator(ensure_non_empty_array).with_parser(
        |instruction, value, context| {
            let Some(conditions) = defaults::parse_sub_queries(instruction, value, context)? else {
                return Ok(None);
            };
            Ok(Some(optimized_compound(instruction.name(), conditions)))
        },
    )
}

fn pattern_of(regex: &bson::Regex) -> Pattern {
    Pattern::new(regex.pattern.as_str(), regex.options.as_str())
}

fn not() -> Instruction {
    Instruction::field()
        .with_validator(|instruction, value| match value {
            Bson::Document(_) | Bson::RegularExpression(_) => Ok(()),
            _ => Err(QueryError::validation(
                instruction.name(),
                "expects to receive either regular expression or object of field operators",
            )),
        })
        .with_parser(|instruction, value, context| {
            let field = context.field().cloned().unwrap_or(ITSELF);
            let condition: Condition = match value {
                Bson::RegularExpression(regex) => {
                    let name = context.parser().instruction("$regex").map_or("regex", |i| i.name());
                    FieldCondition::new(name, field, pattern_of(regex)).into()
                }
                Bson::Document(operators) => {
                    // nothing left to negate: the whole `$not` is vacuous
                    if !operators.is_empty() && operators.values().all(|v| context.is_ignored(v)) {
                        return Ok(None);
                    }
                    context.parse_field(&field, operators)?
                }
                _ => return Ok(None),
            };
            Ok(Some(CompoundCondition::new(instruction.name(), vec![condition]).into()))
        })
}

fn elem_match() -> Instruction {
    Instruction::field()
        .with_validator(|instruction, value| match value {
            Bson::Document(_) => Ok(()),
            _ => Err(QueryError::validation(
                instruction.name(),
                "expects to receive an object with nested query or field level operators",
            )),
        })
        .with_parser(|instruction, value, context| {
            let Bson::Document(query) = value else {
                return Ok(None);
            };
            let condition = if context.has_operators(value) {
                context.parse_field(&ITSELF, query)?
            } else {
                context.parse(query)?
            };
            let field = context.field().cloned().unwrap_or(ITSELF);
            Ok(Some(FieldCondition::new(instruction.name(), field, condition).into()))
        })
}

fn regex() -> Instruction {
    Instruction::field()
        .with_validator(|instruction, value| match value {
            Bson::String(_) | Bson::RegularExpression(_) => Ok(()),
            _ => Err(QueryError::validation(
                instruction.name(),
                "expects value to be a regular expression or a string that represents regular expression",
            )),
        })
        .with_parser(|instruction, value, context| {
            let pattern = match value {
                Bson::String(source) => {
                    let flags = context.query().get_str("$options").unwrap_or_default();
                    Pattern::new(source.as_str(), flags)
                }
                Bson::RegularExpression(regex) => pattern_of(regex),
                _ => return Ok(None),
            };
            let field = context.field().cloned().unwrap_or(ITSELF);
            Ok(Some(FieldCondition::new(instruction.name(), field, pattern).into()))
        })
}

/// The Mongo-style operator catalog, keyed by `$`-prefixed operator names.
pub fn instructions() -> InstructionSet {
    let comparable = || Instruction::field().with_validator(ensure_comparable);
    let array = || Instruction::field().with_validator(ensure_array);

    InstructionSet::new()
        .with("$and", and_or())
        .with("$or", and_or())
        .with("$nor", Instruction::compound().with_validator(ensure_non_empty_array))
        .with("$not", not())
        .with("$elemMatch", elem_match())
        .with("$size", Instruction::field().with_validator(ensure_number))
        .with("$in", array())
        .with("$nin", array())
        .with("$all", array())
        .with(
            "$mod",
            Instruction::field().with_validator(|instruction, value| match value {
                Bson::Array(items) if items.len() == 2 && items.iter().all(is_number) => Ok(()),
                _ => Err(QueryError::validation(
                    instruction.name(),
                    "expects an array with 2 numeric elements",
                )),
            }),
        )
        .with("$exists", Instruction::field().with_validator(ensure_bool))
        .with("$gt", comparable())
        .with("$gte", comparable())
        .with("$lt", comparable())
        .with("$lte", comparable())
        .with("$eq", Instruction::field())
        .with("$ne", Instruction::field())
        .with("$regex", regex())
        .with("$options", Instruction::field().with_parser(|_, _, _| Ok(None)))
}
