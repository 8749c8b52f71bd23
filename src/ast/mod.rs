// Condition tree produced by parsers and consumed by interpreters.
mod condition;
mod optimize;

pub use condition::{
    CompoundCondition, Condition, DocumentCondition, Field, FieldCondition, ITSELF, Operand,
    Pattern,
};
pub use optimize::{and, optimized_compound, or};
