// Structured-query parsing: instruction registry, parser and default instruction parsers.
mod context;
pub mod defaults;
mod instruction;
mod object;

pub use context::ParsingContext;
pub use instruction::{Instruction, InstructionSet, Level, ParseFn, ValidateFn};
pub use object::{IGNORE, NameMapper, ObjectQueryParser, ParserOptions};
