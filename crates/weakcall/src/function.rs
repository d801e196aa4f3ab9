use std::{fmt, rc::Rc};

use crate::{
    error::CallResult,
    value::{Kwargs, Value},
};

/// Name given to anonymous functions, matching Python's `(lambda: None).__name__`.
pub const LAMBDA_NAME: &str = "<lambda>";

/// Signature of a function body: positional args (receiver first for methods) and keywords.
pub type FunctionBody = dyn Fn(&[Value], &Kwargs) -> CallResult<Value>;

/// A named function, shared behind `Rc` so that callbacks can reference it weakly.
///
/// Methods are plain functions stored in a class; binding one to a receiver passes the
/// receiver as the first positional argument.
pub struct Function {
    /// The function name (used for classification and repr).
    name: String,
    /// Qualified name (e.g., `Class.method` or `outer.<locals>.inner`).
    qualname: String,
    body: Box<FunctionBody>,
}

impl Function {
    /// Creates a function whose qualified name equals its name.
    pub fn new(name: impl Into<String>, body: impl Fn(&[Value], &Kwargs) -> CallResult<Value> + 'static) -> Rc<Self> {
        let name = name.into();
        Self::with_qualname(name.clone(), name, body)
    }

    /// Creates a function with an explicit qualified name.
    pub fn with_qualname(
        name: impl Into<String>,
        qualname: impl Into<String>,
        body: impl Fn(&[Value], &Kwargs) -> CallResult<Value> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            qualname: qualname.into(),
            body: Box::new(body),
        })
    }

    /// Creates an anonymous function named `<lambda>`.
    pub fn lambda(body: impl Fn(&[Value], &Kwargs) -> CallResult<Value> + 'static) -> Rc<Self> {
        Self::new(LAMBDA_NAME, body)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn qualname(&self) -> &str {
        &self.qualname
    }

    /// Returns true for anonymous functions.
    #[must_use]
    pub fn is_lambda(&self) -> bool {
        self.name == LAMBDA_NAME
    }

    /// Runs the function body.
    #[inline]
    pub fn call(&self, args: &[Value], kwargs: &Kwargs) -> CallResult<Value> {
        (self.body)(args, kwargs)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.qualname)
    }
}
