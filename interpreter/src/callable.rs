use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use common::{CallError, FunctionDecl, RuntimeError};
use thiserror::Error;
use tracing::trace;

use crate::environment::{Environment, SharedEnvironment};
use crate::evaluator::{Flow, Interpreter};
use crate::value::Value;

/// Why a call did not produce a value.
#[derive(Debug, Error)]
pub enum CallFailure {
  /// Raised by the callee itself; the caller attaches the call site line.
  #[error(transparent)]
  Function(#[from] CallError),
  /// A runtime error from inside a user function body, already located.
  #[error(transparent)]
  Runtime(#[from] RuntimeError),
}

/// Anything that can sit left of `(...)`.
pub trait Callable {
  fn arity(&self) -> usize;

  /// Arguments are already evaluated and their count matches `arity`.
  fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value, CallFailure>;
}

/// A user function: its declaration plus the scope it was declared in.
pub struct Function {
  pub declaration: Rc<FunctionDecl>,
  pub closure: SharedEnvironment,
}

impl Function {
  pub fn new(declaration: Rc<FunctionDecl>, closure: SharedEnvironment) -> Self {
    Function {
      declaration,
      closure,
    }
  }

  pub fn name(&self) -> &str {
    &self.declaration.name.lexeme
  }
}

impl Callable for Function {
  fn arity(&self) -> usize {
    self.declaration.params.len()
  }

  fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value, CallFailure> {
    trace!(function = self.name(), "calling");
    let mut activation = Environment::new(Some(Rc::clone(&self.closure)));
    for (param, argument) in self.declaration.params.iter().zip(arguments) {
      activation.define(&param.lexeme, argument);
    }

    let activation = Rc::new(RefCell::new(activation));
    match interpreter.execute_block(&self.declaration.body, activation)? {
      Flow::Return(value) => Ok(value),
      Flow::Normal => Ok(Value::Nil),
    }
  }
}

// The closure is left out: scopes can hold the function itself.
impl fmt::Debug for Function {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Function")
      .field("name", &self.name())
      .field("arity", &self.arity())
      .finish()
  }
}
