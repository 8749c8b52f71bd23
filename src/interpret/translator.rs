use std::sync::Arc;

use super::Interpreter;
use crate::ast::Condition;
use crate::errors::QueryError;

type ParseQueryFn<Q, P> = Arc<dyn Fn(&Q, &P) -> Result<Condition, QueryError> + Send + Sync>;

/// Couples a parse step with an interpreter: parse once, evaluate many times.
///
/// `P` carries extra arguments handed to the parse step on every `translate_with`
/// call; translators built with [`Translator::new`] take none.
pub struct Translator<Q: ?Sized, A: ?Sized, R, X = (), P: ?Sized = ()> {
    parse: ParseQueryFn<Q, P>,
    interpreter: Arc<Interpreter<A, R, X>>,
}

impl<Q: ?Sized, A: ?Sized, R, X> Translator<Q, A, R, X> {
    pub fn new<F>(parse: F, interpreter: Interpreter<A, R, X>) -> Self
    where
        F: Fn(&Q) -> Result<Condition, QueryError> + Send + Sync + 'static,
    {
        Self::with_parse_args(move |raw: &Q, _: &()| parse(raw), interpreter)
    }

    /// # Errors
    /// Propagates parse errors; nothing is evaluated yet.
    pub fn translate(&self, raw: &Q) -> Result<Translation<A, R, X>, QueryError> {
        self.translate_with(raw, &())
    }
}

impl<Q: ?Sized, A: ?Sized, R, X, P: ?Sized> Translator<Q, A, R, X, P> {
    pub fn with_parse_args<F>(parse: F, interpreter: Interpreter<A, R, X>) -> Self
    where
        F: Fn(&Q, &P) -> Result<Condition, QueryError> + Send + Sync + 'static,
    {
        Self { parse: Arc::new(parse), interpreter: Arc::new(interpreter) }
    }

    pub fn interpreter(&self) -> &Interpreter<A, R, X> {
        &self.interpreter
    }

    /// Parse `raw` with `args`, once.
    ///
    /// # Errors
    /// Propagates parse errors.
    pub fn translate_with(&self, raw: &Q, args: &P) -> Result<Translation<A, R, X>, QueryError> {
        let ast = (self.parse)(raw, args)?;
        Ok(Translation { ast, interpreter: Arc::clone(&self.interpreter) })
    }
}

impl<Q: ?Sized, A: ?Sized, R, X, P: ?Sized> Clone for Translator<Q, A, R, X, P> {
    fn clone(&self) -> Self {
        Self { parse: Arc::clone(&self.parse), interpreter: Arc::clone(&self.interpreter) }
    }
}

/// A parsed query bound to its interpreter.
pub struct Translation<A: ?Sized, R, X = ()> {
    ast: Condition,
    interpreter: Arc<Interpreter<A, R, X>>,
}

impl<A: ?Sized, R, X> Translation<A, R, X> {
    pub fn ast(&self) -> &Condition {
        &self.ast
    }

    pub fn into_ast(self) -> Condition {
        self.ast
    }

    pub fn evaluate(&self, args: &A) -> Result<R, QueryError> {
        self.interpreter.interpret(&self.ast, args)
    }
}
