use bson::Bson;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::context::ParsingContext;
use crate::ast::Condition;
use crate::errors::QueryError;

/// Syntactic position an operator may appear in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Field,
    Compound,
    Document,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Field => "field",
            Self::Compound => "compound",
            Self::Document => "document",
        })
    }
}

pub type ValidateFn = Arc<dyn Fn(&Instruction, &Bson) -> Result<(), QueryError> + Send + Sync>;
pub type ParseFn = Arc<
    dyn Fn(&Instruction, &Bson, &ParsingContext<'_>) -> Result<Option<Condition>, QueryError>
        + Send
        + Sync,
>;

/// How one operator is recognized and turned into a condition.
///
/// `name` is the condition operator name; it is assigned when the instruction is
/// registered with a parser (raw key mapped through the parser's name mapping).
#[derive(Clone)]
pub struct Instruction {
    name: String,
    level: Level,
    validate: Option<ValidateFn>,
    parse: Option<ParseFn>,
}

impl Instruction {
    pub fn new(level: Level) -> Self {
        Self { name: String::new(), level, validate: None, parse: None }
    }

    pub fn field() -> Self {
        Self::new(Level::Field)
    }

    pub fn compound() -> Self {
        Self::new(Level::Compound)
    }

    pub fn document() -> Self {
        Self::new(Level::Document)
    }

    pub fn with_validator<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Instruction, &Bson) -> Result<(), QueryError> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    pub fn with_parser<F>(mut self, parse: F) -> Self
    where
        F: Fn(&Instruction, &Bson, &ParsingContext<'_>) -> Result<Option<Condition>, QueryError>
            + Send
            + Sync
            + 'static,
    {
        self.parse = Some(Arc::new(parse));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn validator(&self) -> Option<&ValidateFn> {
        self.validate.as_ref()
    }

    pub fn parser(&self) -> Option<&ParseFn> {
        self.parse.as_ref()
    }

    pub(crate) fn named(mut self, name: String) -> Self {
        self.name = name;
        self
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("validate", &self.validate.is_some())
            .field("parse", &self.parse.is_some())
            .finish()
    }
}

/// Instructions keyed by the operator name used in raw queries.
#[derive(Debug, Clone, Default)]
pub struct InstructionSet {
    entries: HashMap<String, Instruction>,
}

impl InstructionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, instruction: Instruction) -> Self {
        self.insert(key, instruction);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, instruction: Instruction) {
        self.entries.insert(key.into(), instruction);
    }

    pub fn get(&self, key: &str) -> Option<&Instruction> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl IntoIterator for InstructionSet {
    type Item = (String, Instruction);
    type IntoIter = std::collections::hash_map::IntoIter<String, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
