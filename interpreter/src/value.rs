use std::fmt;
use std::rc::Rc;

use common::Literal;

use crate::callable::{Callable, Function};
use crate::natives::NativeFunction;

#[derive(Debug, Clone)]
pub enum Value {
  Nil,
  Int(i64),
  Float(f64),
  Bool(bool),
  Str(String),
  Function(Rc<Function>),
  Native(NativeFunction),
}

impl Value {
  // nil and false are falsy, everything else (0, "", ...) is truthy
  pub fn is_truthy(&self) -> bool {
    match self {
      Value::Nil => false,
      Value::Bool(b) => *b,
      _ => true,
    }
  }

  /// Language-level `==`.
  pub fn equals(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::Nil, Value::Nil) => true,
      (Value::Int(a), Value::Int(b)) => a == b,
      (Value::Str(a), Value::Str(b)) => a == b,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Function(a), Value::Function(b)) => a.name() == b.name(),
      (Value::Native(a), Value::Native(b)) => a == b,
      _ => match (self.as_f64(), other.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
      },
    }
  }

  /// Widens any numeric value to a float.
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Value::Int(n) => Some(*n as f64),
      Value::Float(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_callable(&self) -> Option<&dyn Callable> {
    match self {
      Value::Function(function) => Some(function.as_ref()),
      Value::Native(native) => Some(native),
      _ => None,
    }
  }
}

impl From<&Literal> for Value {
  fn from(literal: &Literal) -> Self {
    match literal {
      Literal::Nil => Value::Nil,
      Literal::Int(n) => Value::Int(*n),
      Literal::Float(n) => Value::Float(*n),
      Literal::Bool(b) => Value::Bool(*b),
      Literal::Str(s) => Value::Str(s.clone()),
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Nil => write!(f, "nil"),
      Value::Int(n) => write!(f, "{n}"),
      Value::Float(n) => write!(f, "{n:.6}"),
      Value::Bool(b) => write!(f, "{b}"),
      Value::Str(s) => write!(f, "{s}"),
      Value::Function(function) => write!(f, "<fn {}>", function.name()),
      Value::Native(_) => write!(f, "<native fn>"),
    }
  }
}
