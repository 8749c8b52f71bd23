// Operator-table interpreters over condition trees.
mod translator;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::Condition;
use crate::errors::QueryError;

pub use translator::{Translation, Translator};

/// One operator implementation: receives the node, the caller's arguments and a
/// context that can dispatch child nodes through the same table.
pub type OperatorFn<A, R, X> = Arc<
    dyn Fn(&Condition, &A, &InterpretationContext<'_, A, R, X>) -> Result<R, QueryError>
        + Send
        + Sync,
>;

/// Dispatches conditions to operator functions by operator name.
///
/// `A` carries every argument after the condition: `()` when only the node is
/// needed, a value for one argument and a tuple for more. `X` holds options shared
/// by all operators and fixed at construction.
pub struct Interpreter<A: ?Sized, R, X = ()> {
    operators: HashMap<String, OperatorFn<A, R, X>>,
    options: X,
}

impl<A: ?Sized, R, X: Default> Default for Interpreter<A, R, X> {
    fn default() -> Self {
        Self::new(X::default())
    }
}

impl<A: ?Sized, R, X> Interpreter<A, R, X> {
    pub fn new(options: X) -> Self {
        Self { operators: HashMap::new(), options }
    }

    pub fn with_operator<F>(mut self, name: impl Into<String>, operator: F) -> Self
    where
        F: Fn(&Condition, &A, &InterpretationContext<'_, A, R, X>) -> Result<R, QueryError>
            + Send
            + Sync
            + 'static,
    {
        self.operators.insert(name.into(), Arc::new(operator));
        self
    }

    /// Register (or replace) an operator on an existing interpreter.
    pub fn insert(&mut self, name: impl Into<String>, operator: OperatorFn<A, R, X>) {
        self.operators.insert(name.into(), operator);
    }

    pub fn operator(&self, name: &str) -> Option<&OperatorFn<A, R, X>> {
        self.operators.get(name)
    }

    pub fn operator_names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    pub fn options(&self) -> &X {
        &self.options
    }

    /// # Errors
    /// `UnknownOperator` when no function is registered for the node's operator, or
    /// whatever the operator itself returns.
    pub fn interpret(&self, condition: &Condition, args: &A) -> Result<R, QueryError> {
        let operator = condition.operator();
        let Some(run) = self.operators.get(operator) else {
            log::debug!(target: "querycast::interpret", "no interpreter registered for {operator}");
            return Err(QueryError::UnknownOperator(operator.to_string()));
        };
        log::trace!(target: "querycast::interpret", "interpreting {operator}");
        run(condition, args, &InterpretationContext { interpreter: self })
    }
}

impl<A: ?Sized, R, X: Clone> Clone for Interpreter<A, R, X> {
    fn clone(&self) -> Self {
        Self { operators: self.operators.clone(), options: self.options.clone() }
    }
}

impl<A: ?Sized, R, X: fmt::Debug> fmt::Debug for Interpreter<A, R, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.operator_names().collect();
        names.sort_unstable();
        f.debug_struct("Interpreter").field("operators", &names).field("options", &self.options).finish()
    }
}

/// Handle given to operator functions for recursive dispatch.
pub struct InterpretationContext<'a, A: ?Sized, R, X> {
    interpreter: &'a Interpreter<A, R, X>,
}

impl<A: ?Sized, R, X> InterpretationContext<'_, A, R, X> {
    pub fn interpret(&self, condition: &Condition, args: &A) -> Result<R, QueryError> {
        self.interpreter.interpret(condition, args)
    }

    pub fn options(&self) -> &X {
        self.interpreter.options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompoundCondition, FieldCondition};

    fn count_leaves() -> Interpreter<(), usize> {
        Interpreter::default()
            .with_operator("eq", |_, _, _| Ok(1))
            .with_operator("and", |condition, args, context| {
                let mut total = 0;
                for child in condition.as_compound().map(|c| c.children()).unwrap_or_default() {
                    total += context.interpret(child, args)?;
                }
                Ok(total)
            })
    }

    #[test]
    fn unknown_operator_is_reported_by_name() {
        let interpreter = count_leaves();
        let err = interpreter.interpret(&FieldCondition::new("gt", "a", 1).into(), &()).unwrap_err();
        assert!(matches!(err, QueryError::UnknownOperator(ref op) if op == "gt"));
        assert!(err.to_string().contains("\"gt\""));
    }

    #[test]
    fn context_dispatches_children_through_same_table() {
        let tree: Condition = CompoundCondition::new(
            "and",
            vec![
                FieldCondition::new("eq", "a", 1).into(),
                CompoundCondition::new("and", vec![FieldCondition::new("eq", "b", 2).into()]).into(),
            ],
        )
        .into();
        assert_eq!(count_leaves().interpret(&tree, &()).unwrap(), 2);
    }

    #[test]
    fn arguments_and_options_reach_operators() {
        let interpreter: Interpreter<(i32, i32), i32, i32> = Interpreter::<(i32, i32), i32, i32>::new(10)
            .with_operator("sum", |_, (a, b), context| Ok(a + b + context.options()));
        let node = FieldCondition::new("sum", "x", 0).into();
        assert_eq!(interpreter.interpret(&node, &(1, 2)).unwrap(), 13);
    }
}
