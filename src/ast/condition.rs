use bson::Bson;
use serde::{Serialize, Serializer};
use std::fmt;

/// Field name used when an operator tests the whole value instead of a named property.
pub const ITSELF: Field = Field::Itself;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Named(String),
    Itself,
}

impl Field {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Itself => None,
        }
    }

    pub fn is_itself(&self) -> bool {
        matches!(self, Self::Itself)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Itself => f.write_str("__itself__"),
        }
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A regular expression operand: pattern source plus option letters (`i`, `m`, `s`, `x`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pattern {
    pub source: String,
    pub flags: String,
}

impl Pattern {
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self { source: source.into(), flags: flags.into() }
    }

    pub fn ignore_case(&self) -> bool {
        self.flags.contains('i')
    }
}

/// Payload carried by field and document conditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Operand {
    Value(Bson),
    Condition(Box<Condition>),
    Pattern(Pattern),
}

impl Operand {
    pub fn as_value(&self) -> Option<&Bson> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_condition(&self) -> Option<&Condition> {
        match self {
            Self::Condition(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_pattern(&self) -> Option<&Pattern> {
        match self {
            Self::Pattern(p) => Some(p),
            _ => None,
        }
    }

    /// Elements of an array literal, or `None` for anything else.
    pub fn as_array(&self) -> Option<&[Bson]> {
        match self {
            Self::Value(Bson::Array(items)) => Some(items),
            _ => None,
        }
    }
}

impl From<Bson> for Operand {
    fn from(value: Bson) -> Self {
        Self::Value(value)
    }
}

impl From<Condition> for Operand {
    fn from(condition: Condition) -> Self {
        Self::Condition(Box::new(condition))
    }
}

impl From<Pattern> for Operand {
    fn from(pattern: Pattern) -> Self {
        Self::Pattern(pattern)
    }
}

macro_rules! operand_from_literal {
    ($($t:ty),*) => {
        $(impl From<$t> for Operand {
            fn from(value: $t) -> Self {
                Self::Value(Bson::from(value))
            }
        })*
    };
}

operand_from_literal!(bool, i32, i64, f64, &str, String, Vec<Bson>);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCondition {
    operator: String,
    field: Field,
    value: Operand,
}

impl FieldCondition {
    pub fn new(operator: impl Into<String>, field: impl Into<Field>, value: impl Into<Operand>) -> Self {
        Self { operator: operator.into(), field: field.into(), value: value.into() }
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn value(&self) -> &Operand {
        &self.value
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompoundCondition {
    operator: String,
    children: Vec<Condition>,
}

impl CompoundCondition {
    pub fn new(operator: impl Into<String>, children: Vec<Condition>) -> Self {
        Self { operator: operator.into(), children }
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn children(&self) -> &[Condition] {
        &self.children
    }

    pub fn into_children(self) -> Vec<Condition> {
        self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    // Only the optimizer appends, and only to nodes it owns.
    pub(crate) fn push(&mut self, child: Condition) {
        self.children.push(child);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentCondition {
    operator: String,
    value: Operand,
}

impl DocumentCondition {
    pub fn new(operator: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self { operator: operator.into(), value: value.into() }
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn value(&self) -> &Operand {
        &self.value
    }
}

/// One node of a parsed query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Condition {
    Field(FieldCondition),
    Compound(CompoundCondition),
    Document(DocumentCondition),
}

impl Condition {
    pub fn operator(&self) -> &str {
        match self {
            Self::Field(c) => c.operator(),
            Self::Compound(c) => c.operator(),
            Self::Document(c) => c.operator(),
        }
    }

    pub fn as_field(&self) -> Option<&FieldCondition> {
        match self {
            Self::Field(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&CompoundCondition> {
        match self {
            Self::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&DocumentCondition> {
        match self {
            Self::Document(c) => Some(c),
            _ => None,
        }
    }

    /// True when this is a compound node named `operator`.
    pub fn is_compound(&self, operator: &str) -> bool {
        matches!(self, Self::Compound(c) if c.operator() == operator)
    }
}

impl From<FieldCondition> for Condition {
    fn from(c: FieldCondition) -> Self {
        Self::Field(c)
    }
}

impl From<CompoundCondition> for Condition {
    fn from(c: CompoundCondition) -> Self {
        Self::Compound(c)
    }
}

impl From<DocumentCondition> for Condition {
    fn from(c: DocumentCondition) -> Self {
        Self::Document(c)
    }
}
