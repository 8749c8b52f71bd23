use bson::{Bson, Document};

use super::object::ObjectQueryParser;
use crate::ast::{Condition, Field};
use crate::errors::QueryError;

/// Per-call state handed to validators and custom instruction parsers.
pub struct ParsingContext<'a> {
    parser: &'a ObjectQueryParser,
    field: Option<&'a Field>,
    query: &'a Document,
    extras: &'a Document,
}

impl<'a> ParsingContext<'a> {
    pub(crate) fn new(
        parser: &'a ObjectQueryParser,
        field: Option<&'a Field>,
        query: &'a Document,
        extras: &'a Document,
    ) -> Self {
        Self { parser, field, query, extras }
    }

    /// Field being parsed; `None` for document and compound instructions.
    pub fn field(&self) -> Option<&Field> {
        self.field
    }

    /// The object the current operator was found in.
    pub fn query(&self) -> &Document {
        self.query
    }

    /// Caller-declared extras from `ParserOptions::{field_context, document_context}`.
    pub fn extras(&self) -> &Document {
        self.extras
    }

    pub fn parser(&self) -> &ObjectQueryParser {
        self.parser
    }

    pub fn parse(&self, query: &Document) -> Result<Condition, QueryError> {
        self.parser.parse(query)
    }

    pub fn parse_value(&self, query: &Bson) -> Result<Condition, QueryError> {
        self.parser.parse_value(query)
    }

    pub fn parse_field(&self, field: &Field, operators: &Document) -> Result<Condition, QueryError> {
        self.parser.parse_field(field, operators)
    }

    pub fn has_operators(&self, value: &Bson) -> bool {
        self.parser.has_operators(value)
    }

    pub fn is_ignored(&self, value: &Bson) -> bool {
        self.parser.is_ignored(value)
    }
}
