use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use common::{RuntimeError, Token};

use crate::value::Value;

pub type SharedEnvironment = Rc<RefCell<Environment>>;

/// One lexical scope. Closures and nested scopes share it through `SharedEnvironment`.
#[derive(Debug, Default)]
pub struct Environment {
  record: HashMap<String, Value>,
  constants: HashSet<String>,
  parent: Option<SharedEnvironment>,
}

impl Environment {
  pub fn new(parent: Option<SharedEnvironment>) -> Self {
    Environment {
      record: HashMap::new(),
      constants: HashSet::new(),
      parent,
    }
  }

  pub fn shared(parent: Option<SharedEnvironment>) -> SharedEnvironment {
    Rc::new(RefCell::new(Environment::new(parent)))
  }

  // var x = 10;
  pub fn define(&mut self, id: &str, value: Value) {
    self.record.insert(id.to_string(), value);
  }

  // const var x = 10;
  pub fn define_constant(&mut self, id: &str, value: Value) {
    self.define(id, value);
    self.constants.insert(id.to_string());
  }

  /// Whether `id` is bound in this scope, ignoring enclosing ones.
  pub fn contains(&self, id: &str) -> bool {
    self.record.contains_key(id)
  }

  // x
  pub fn lookup(&self, name: &Token) -> Result<Value, RuntimeError> {
    if let Some(value) = self.record.get(&name.lexeme) {
      return Ok(value.clone());
    }
    match &self.parent {
      Some(parent) => parent.borrow().lookup(name),
      None => Err(RuntimeError::undefined_variable(name)),
    }
  }

  // x = 20;
  pub fn set(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
    if self.record.contains_key(&name.lexeme) {
      if self.constants.contains(&name.lexeme) {
        return Err(RuntimeError::constant_reassignment(name));
      }
      self.record.insert(name.lexeme.clone(), value);
      return Ok(());
    }
    match &self.parent {
      Some(parent) => parent.borrow_mut().set(name, value),
      None => Err(RuntimeError::undefined_variable(name)),
    }
  }

  /// Whether `name` resolves to a constant. Only the scope that owns the binding counts.
  pub fn is_constant(&self, name: &Token) -> bool {
    if self.record.contains_key(&name.lexeme) {
      return self.constants.contains(&name.lexeme);
    }
    self
      .parent
      .as_ref()
      .is_some_and(|parent| parent.borrow().is_constant(name))
  }
}

#[cfg(test)]
mod tests {
  use common::TokenKind;

  use super::*;

  fn name(id: &str) -> Token {
    Token::new(TokenKind::Identifier, id, 1)
  }

  #[test]
  fn define_and_lookup() {
    let mut env = Environment::new(None);
    assert!(env.record.is_empty());

    env.define("x", Value::Int(10));
    assert!(env.contains("x"));
    assert!(matches!(env.lookup(&name("x")), Ok(Value::Int(10))));
  }

  #[test]
  fn lookup_undefined() {
    let env = Environment::new(None);
    assert_eq!(
      env.lookup(&name("ghost")).unwrap_err(),
      RuntimeError::UndefinedVariable {
        name: "ghost".to_string(),
        line: 1
      }
    );
  }

  #[test]
  fn set_value() {
    let mut env = Environment::new(None);
    env.define("x", Value::Int(10));
    env.set(&name("x"), Value::Int(20)).expect("x is defined");
    assert!(matches!(env.lookup(&name("x")), Ok(Value::Int(20))));
  }

  #[test]
  fn set_reaches_enclosing_scope() {
    let global = Environment::shared(None);
    global.borrow_mut().define("x", Value::Int(1));
    let mut block = Environment::new(Some(Rc::clone(&global)));

    block.set(&name("x"), Value::Int(2)).expect("x is defined outside");
    assert!(!block.contains("x"));
    assert!(matches!(global.borrow().lookup(&name("x")), Ok(Value::Int(2))));
  }

  #[test]
  fn shadowing_keeps_outer_binding() {
    let global = Environment::shared(None);
    global.borrow_mut().define("x", Value::Int(1));
    let mut block = Environment::new(Some(Rc::clone(&global)));
    block.define("x", Value::Int(5));

    assert!(matches!(block.lookup(&name("x")), Ok(Value::Int(5))));
    assert!(matches!(global.borrow().lookup(&name("x")), Ok(Value::Int(1))));
  }

  #[test]
  fn constant_in_enclosing_scope_cannot_be_set() {
    let global = Environment::shared(None);
    global.borrow_mut().define_constant("limit", Value::Int(3));
    let mut block = Environment::new(Some(Rc::clone(&global)));

    assert!(matches!(
      block.set(&name("limit"), Value::Int(4)),
      Err(RuntimeError::ConstantReassignment { .. })
    ));
    assert!(matches!(global.borrow().lookup(&name("limit")), Ok(Value::Int(3))));
  }

  #[test]
  fn set_undefined_fails() {
    let mut env = Environment::new(None);
    assert!(matches!(
      env.set(&name("nope"), Value::Nil),
      Err(RuntimeError::UndefinedVariable { .. })
    ));
  }

  #[test]
  fn is_constant_resolves_owning_scope() {
    let global = Environment::shared(None);
    global.borrow_mut().define_constant("limit", Value::Int(3));
    global.borrow_mut().define("count", Value::Int(0));

    let mut block = Environment::new(Some(Rc::clone(&global)));
    assert!(block.is_constant(&name("limit")));
    assert!(!block.is_constant(&name("count")));
    assert!(!block.is_constant(&name("ghost")));

    block.define("limit", Value::Int(9));
    assert!(!block.is_constant(&name("limit")));
  }
}
