//! In-memory evaluation of condition trees against BSON values.
mod compare;
pub mod operators;
mod path;

use bson::{Bson, Document};

use crate::ast::Condition;
use crate::errors::QueryError;
use crate::interpret::{Interpreter, Translation, Translator};

pub use compare::{compare_values, values_equal};
pub use path::{MAX_PATH_DEPTH, get_path, get_value};

/// Operator table deciding whether a value satisfies a condition.
pub type Matcher = Interpreter<Bson, bool>;

pub fn default_operators() -> Matcher {
    Interpreter::default()
        .with_operator("and", operators::and)
        .with_operator("or", operators::or)
        .with_operator("nor", operators::nor)
        .with_operator("not", operators::not)
        .with_operator("eq", operators::eq)
        .with_operator("ne", operators::ne)
        .with_operator("lt", operators::lt)
        .with_operator("lte", operators::lte)
        .with_operator("gt", operators::gt)
        .with_operator("gte", operators::gte)
        .with_operator("in", operators::within)
        .with_operator("nin", operators::nin)
        .with_operator("all", operators::all)
        .with_operator("size", operators::size)
        .with_operator("mod", operators::modulo)
        .with_operator("exists", operators::exists)
        .with_operator("regex", operators::regex)
        .with_operator("elemMatch", operators::elem_match)
}

/// Mongo query in, reusable predicate out.
pub fn translator() -> Translator<Document, Bson, bool> {
    let parser = crate::mongo::mongo_parser();
    Translator::new(move |query: &Document| parser.parse(query), default_operators())
}

/// A parsed Mongo query ready to test documents.
pub struct Filter {
    translation: Translation<Bson, bool>,
}

impl Filter {
    pub fn ast(&self) -> &Condition {
        self.translation.ast()
    }

    pub fn matches(&self, value: &Bson) -> Result<bool, QueryError> {
        self.translation.evaluate(value)
    }

    pub fn matches_document(&self, doc: &Document) -> Result<bool, QueryError> {
        self.matches(&Bson::Document(doc.clone()))
    }
}

/// Build a predicate from a Mongo query document.
///
/// # Errors
/// Returns parse errors from the Mongo catalog.
pub fn filter(query: &Document) -> Result<Filter, QueryError> {
    let translation = translator().translate(query)?;
    log::debug!(target: "querycast::interpret", "compiled filter with root {}", translation.ast().operator());
    Ok(Filter { translation })
}
