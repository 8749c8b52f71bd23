use bson::{Bson, Document};
use std::collections::HashMap;

use super::context::ParsingContext;
use super::defaults;
use super::instruction::{Instruction, InstructionSet, Level};
use crate::ast::{Condition, Field, optimized_compound};
use crate::errors::QueryError;

/// Default ignore marker. JSON input never produces it, so it only appears when a
/// caller places it on purpose.
pub const IGNORE: Bson = Bson::Undefined;

/// Maps a raw operator key (e.g. `$eq`) to the condition operator name (e.g. `eq`).
pub type NameMapper = fn(&str) -> String;

#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Registry key used for `field: value` pairs.
    pub default_operator: String,
    /// Reserved prefix: unregistered keys starting with it are rejected instead of
    /// being treated as field names.
    pub operator_prefix: Option<String>,
    pub operator_name: Option<NameMapper>,
    /// When set, keys and operands equal to this value are skipped.
    pub ignore_value: Option<Bson>,
    pub path_separator: String,
    pub field_context: Document,
    pub document_context: Document,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            default_operator: "eq".to_string(),
            operator_prefix: None,
            operator_name: None,
            ignore_value: None,
            path_separator: ".".to_string(),
            field_context: Document::new(),
            document_context: Document::new(),
        }
    }
}

impl ParserOptions {
    /// Enable skipping of [`IGNORE`] values.
    pub fn with_ignore(mut self) -> Self {
        self.ignore_value = Some(IGNORE);
        self
    }
}

/// Turns a structured query object into a [`Condition`] tree, guided by an
/// instruction registry resolved once at construction.
#[derive(Debug, Clone)]
pub struct ObjectQueryParser {
    instructions: HashMap<String, Instruction>,
    options: ParserOptions,
}

impl ObjectQueryParser {
    pub fn new(instructions: InstructionSet, options: ParserOptions) -> Self {
        let instructions = instructions
            .into_iter()
            .map(|(key, instruction)| {
                let name = match options.operator_name {
                    Some(map) => map(&key),
                    None => key.clone(),
                };
                (key, instruction.named(name))
            })
            .collect();
        Self { instructions, options }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn instruction(&self, key: &str) -> Option<&Instruction> {
        self.instructions.get(key)
    }

    /// A value "has operators" when it is an object with at least one key that is a
    /// registered instruction or carries the reserved operator prefix.
    pub fn has_operators(&self, value: &Bson) -> bool {
        match value {
            Bson::Document(doc) => doc.keys().any(|key| self.is_operator_key(key)),
            _ => false,
        }
    }

    pub fn is_ignored(&self, value: &Bson) -> bool {
        self.options.ignore_value.as_ref().is_some_and(|marker| marker == value)
    }

    fn is_operator_key(&self, key: &str) -> bool {
        self.instructions.contains_key(key) || self.is_reserved(key)
    }

    fn is_reserved(&self, key: &str) -> bool {
        self.options.operator_prefix.as_deref().is_some_and(|prefix| key.starts_with(prefix))
    }

    /// # Errors
    /// Returns an error for unknown operators, operators used at the wrong level and
    /// operand values rejected by an instruction validator.
    pub fn parse(&self, query: &Document) -> Result<Condition, QueryError> {
        let mut conditions = Vec::with_capacity(query.len());
        self.parse_document_into(query, None, &mut conditions)?;
        Ok(optimized_compound("and", conditions))
    }

    /// # Errors
    /// Same as [`ObjectQueryParser::parse`]; additionally rejects non-object queries.
    pub fn parse_value(&self, query: &Bson) -> Result<Condition, QueryError> {
        match query {
            Bson::Document(doc) => self.parse(doc),
            other => Err(QueryError::InvalidQuery(format!(
                "expected an object, got {:?}",
                other.element_type()
            ))),
        }
    }

    /// Parse an operator map (`{"$gt": 1, "$lt": 5}`) for `field`.
    ///
    /// # Errors
    /// Returns an error when the map holds unknown or non-field operators.
    pub fn parse_field(&self, field: &Field, operators: &Document) -> Result<Condition, QueryError> {
        let conditions = self.parse_field_operators(field, operators)?;
        Ok(optimized_compound("and", conditions))
    }

    fn parse_document_into(
        &self,
        query: &Document,
        path: Option<&str>,
        out: &mut Vec<Condition>,
    ) -> Result<(), QueryError> {
        for (key, value) in query {
            if self.is_ignored(value) {
                log::trace!(target: "querycast::parse", "skipping ignored key {key}");
                continue;
            }

            if let Some(instruction) = self.instructions.get(key) {
                if instruction.level() == Level::Field {
                    return Err(QueryError::UnexpectedLevel {
                        operator: key.clone(),
                        level: Level::Field,
                        position: Level::Document,
                    });
                }
                let context =
                    ParsingContext::new(self, None, query, &self.options.document_context);
                if let Some(condition) = self.parse_instruction(instruction, value, &context)? {
                    out.push(condition);
                }
                continue;
            }

            if self.is_reserved(key) {
                return Err(QueryError::UnsupportedOperator(key.clone()));
            }

            let field_path = match path {
                Some(parent) => format!("{parent}{}{key}", self.options.path_separator),
                None => key.clone(),
            };

            match value {
                Bson::Document(inner) if self.has_operators(value) => {
                    out.extend(self.parse_field_operators(&Field::Named(field_path), inner)?);
                }
                Bson::Document(inner) if !inner.is_empty() => {
                    self.parse_document_into(inner, Some(&field_path), out)?;
                }
                _ => {
                    let field = Field::Named(field_path);
                    let operator = self.options.default_operator.as_str();
                    if let Some(condition) = self.parse_field_operator(&field, operator, value, query)? {
                        out.push(condition);
                    }
                }
            }
        }
        Ok(())
    }

    fn parse_field_operators(
        &self,
        field: &Field,
        operators: &Document,
    ) -> Result<Vec<Condition>, QueryError> {
        let mut conditions = Vec::with_capacity(operators.len());
        for (operator, value) in operators {
            if self.is_ignored(value) {
                log::trace!(target: "querycast::parse", "skipping ignored operator {operator} on {field}");
                continue;
            }
            if let Some(condition) = self.parse_field_operator(field, operator, value, operators)? {
                conditions.push(condition);
            }
        }
        Ok(conditions)
    }

    fn parse_field_operator(
        &self,
        field: &Field,
        operator: &str,
        value: &Bson,
        parent: &Document,
    ) -> Result<Option<Condition>, QueryError> {
        let instruction = self
            .instructions
            .get(operator)
            .ok_or_else(|| QueryError::UnsupportedOperator(operator.to_string()))?;

        if instruction.level() != Level::Field {
            return Err(QueryError::UnexpectedLevel {
                operator: operator.to_string(),
                level: instruction.level(),
                position: Level::Field,
            });
        }

        let context = ParsingContext::new(self, Some(field), parent, &self.options.field_context);
        self.parse_instruction(instruction, value, &context)
    }

    fn parse_instruction(
        &self,
        instruction: &Instruction,
        value: &Bson,
        context: &ParsingContext<'_>,
    ) -> Result<Option<Condition>, QueryError> {
        if let Some(validate) = instruction.validator() {
            validate(instruction, value)?;
        }
        match instruction.parser() {
            Some(parse) => parse(instruction, value, context),
            None => defaults::parse_default(instruction, value, context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompoundCondition, DocumentCondition, FieldCondition};
    use bson::doc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> InstructionSet {
        InstructionSet::new()
            .with("eq", Instruction::field())
            .with("and", Instruction::compound())
            .with("where", Instruction::document())
    }

    #[test]
    fn throws_on_unknown_operator() {
        let parser = ObjectQueryParser::new(InstructionSet::new(), ParserOptions::default());
        let err = parser.parse(&doc! { "field": { "unknown": true } }).unwrap_err();
        // no registered key and no prefix: the object is a nested path whose default operator is missing
        assert!(matches!(err, QueryError::UnsupportedOperator(op) if op == "eq"));
    }

    #[test]
    fn unknown_key_inside_operator_map_is_unsupported() {
        let parser = ObjectQueryParser::new(registry(), ParserOptions::default());
        let err = parser.parse(&doc! { "field": { "eq": 1, "unknown": true } }).unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedOperator(op) if op == "unknown"));
    }

    #[test]
    fn field_operator_at_document_level_is_rejected() {
        let parser = ObjectQueryParser::new(registry(), ParserOptions::default());
        let err = parser.parse(&doc! { "eq": 5 }).unwrap_err();
        assert!(matches!(
            err,
            QueryError::UnexpectedLevel { ref operator, level: Level::Field, position: Level::Document }
                if operator == "eq"
        ));
    }

    #[test]
    fn compound_and_document_operators_at_field_level_are_rejected() {
        let parser = ObjectQueryParser::new(registry(), ParserOptions::default());
        let err = parser.parse(&doc! { "field": { "and": [] } }).unwrap_err();
        assert_eq!(err.to_string(), "Unexpected compound operator \"and\" at field level");
        let err = parser.parse(&doc! { "field": { "where": 1 } }).unwrap_err();
        assert_eq!(err.to_string(), "Unexpected document operator \"where\" at field level");
    }

    #[test]
    fn plain_pairs_become_and_of_default_operator() {
        let parser = ObjectQueryParser::new(registry(), ParserOptions::default());
        let ast = parser.parse(&doc! { "a": 1, "b": 2 }).unwrap();
        let expected = CompoundCondition::new(
            "and",
            vec![FieldCondition::new("eq", "a", 1).into(), FieldCondition::new("eq", "b", 2).into()],
        );
        assert_eq!(ast, expected.into());
    }

    #[test]
    fn compound_value_may_be_single_document() {
        let parser = ObjectQueryParser::new(registry(), ParserOptions::default());
        let ast = parser.parse(&doc! { "and": { "a": 1 } }).unwrap();
        let expected =
            CompoundCondition::new("and", vec![FieldCondition::new("eq", "a", 1).into()]);
        assert_eq!(ast, expected.into());
    }

    #[test]
    fn compound_value_of_wrong_shape_is_rejected() {
        let parser = ObjectQueryParser::new(registry(), ParserOptions::default());
        let err = parser.parse(&doc! { "and": 5 }).unwrap_err();
        assert!(matches!(err, QueryError::Shape(op) if op == "and"));
    }

    #[test]
    fn document_instruction_keeps_value() {
        let parser = ObjectQueryParser::new(registry(), ParserOptions::default());
        let ast = parser.parse(&doc! { "where": 1 }).unwrap();
        assert_eq!(ast, DocumentCondition::new("where", 1).into());
    }

    #[test]
    fn validator_runs_before_parsing() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let my = Instruction::field().with_validator(|instruction, value| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            assert_eq!(instruction.name(), "my");
            assert_eq!(value, &Bson::Int32(1));
            Ok(())
        });
        let parser =
            ObjectQueryParser::new(InstructionSet::new().with("my", my), ParserOptions::default());
        parser.parse(&doc! { "field": { "my": 1 } }).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn custom_parser_receives_field_context() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let my = Instruction::field().with_parser(move |instruction, value, context| {
            sink.lock().unwrap().push((
                context.field().cloned(),
                context.query().clone(),
                context.extras().get_bool("check").unwrap_or(false),
            ));
            Ok(Some(defaults::parse_field(instruction, value, context)))
        });
        let options = ParserOptions { field_context: doc! { "check": true }, ..Default::default() };
        let parser = ObjectQueryParser::new(InstructionSet::new().with("my", my), options);
        parser.parse(&doc! { "field": { "my": 1 } }).unwrap();
        let calls = seen.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Some(Field::from("field")));
        assert_eq!(calls[0].1, doc! { "my": 1 });
        assert!(calls[0].2);
    }

    #[test]
    fn reserved_prefix_rejects_unknown_top_level_operator() {
        let options = ParserOptions { operator_prefix: Some("$".into()), ..Default::default() };
        let parser = ObjectQueryParser::new(registry(), options);
        let err = parser.parse(&doc! { "$where": 1 }).unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedOperator(op) if op == "$where"));
    }

    fn strip_dollar(key: &str) -> String {
        key.trim_start_matches('$').to_string()
    }

    #[test]
    fn operator_name_mapping_names_conditions() {
        let options = ParserOptions {
            default_operator: "$eq".into(),
            operator_name: Some(strip_dollar),
            ..Default::default()
        };
        let parser =
            ObjectQueryParser::new(InstructionSet::new().with("$eq", Instruction::field()), options);
        let ast = parser.parse(&doc! { "a": 1 }).unwrap();
        assert_eq!(ast, FieldCondition::new("eq", "a", 1).into());
    }

    #[test]
    fn nested_path_uses_custom_separator() {
        let options = ParserOptions { path_separator: "/".into(), ..Default::default() };
        let parser = ObjectQueryParser::new(registry(), options);
        let ast = parser.parse(&doc! { "a": { "b": { "eq": 1 } } }).unwrap();
        assert_eq!(ast, FieldCondition::new("eq", "a/b", 1).into());
    }

    #[test]
    fn empty_object_is_compared_as_value() {
        let parser = ObjectQueryParser::new(registry(), ParserOptions::default());
        let ast = parser.parse(&doc! { "meta": {} }).unwrap();
        assert_eq!(ast, FieldCondition::new("eq", "meta", Bson::Document(doc! {})).into());
    }

    #[test]
    fn parse_value_rejects_non_objects() {
        let parser = ObjectQueryParser::new(registry(), ParserOptions::default());
        assert!(matches!(parser.parse_value(&Bson::Int32(1)), Err(QueryError::InvalidQuery(_))));
    }
}
