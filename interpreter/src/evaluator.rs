use std::io::{self, BufRead, BufReader, Write};
use std::rc::Rc;

use common::stack::ensure_sufficient_stack;
use common::{Expr, RuntimeError, Stmt, Token, TokenKind};
use tracing::{debug, trace};

use crate::callable::{CallFailure, Function};
use crate::environment::{Environment, SharedEnvironment};
use crate::natives;
use crate::value::Value;

type EvalResult<T> = Result<T, RuntimeError>;

/// How a statement finished.
#[derive(Debug, Clone)]
pub enum Flow {
  Normal,
  /// A `return` on its way to the nearest enclosing call.
  Return(Value),
}

/// Tree-walking evaluator. Keep one alive to carry definitions across runs.
pub struct Interpreter {
  environment: SharedEnvironment,
  output: Box<dyn Write>,
  input: Box<dyn BufRead>,
}

// Both operands after numeric promotion.
enum Operands {
  Ints(i64, i64),
  Floats(f64, f64),
}

impl Operands {
  fn of(left: &Value, right: &Value) -> Option<Operands> {
    match (left, right) {
      (Value::Int(a), Value::Int(b)) => Some(Operands::Ints(*a, *b)),
      _ => Some(Operands::Floats(left.as_f64()?, right.as_f64()?)),
    }
  }
}

impl Interpreter {
  // Globals come preloaded with the native functions.
  pub fn new() -> Self {
    Interpreter::with_io(Box::new(io::stdout()), Box::new(BufReader::new(io::stdin())))
  }

  pub fn with_io(output: Box<dyn Write>, input: Box<dyn BufRead>) -> Self {
    let globals = Environment::shared(None);
    natives::register(&mut globals.borrow_mut());
    Interpreter {
      environment: globals,
      output,
      input,
    }
  }

  /// Runs top-level statements. A top-level `return` stops the run and is handed back.
  pub fn interpret(&mut self, statements: &[Stmt]) -> EvalResult<Flow> {
    debug!(statements = statements.len(), "interpreting");
    let flow = self.run_statements(statements);
    if let Err(err) = self.output.flush() {
      return Err(RuntimeError::Output {
        message: err.to_string(),
        line: 0,
      });
    }
    flow
  }

  pub fn execute(&mut self, statement: &Stmt) -> EvalResult<Flow> {
    ensure_sufficient_stack(|| self.execute_statement(statement))
  }

  /// Runs `statements` with `environment` as the current scope, then restores the previous one.
  pub fn execute_block(&mut self, statements: &[Stmt], environment: SharedEnvironment) -> EvalResult<Flow> {
    let previous = std::mem::replace(&mut self.environment, environment);
    let flow = self.run_statements(statements);
    self.environment = previous;
    flow
  }

  pub fn evaluate(&mut self, expr: &Expr) -> EvalResult<Value> {
    ensure_sufficient_stack(|| self.evaluate_expression(expr))
  }

  pub fn read_line(&mut self) -> io::Result<Option<String>> {
    let mut line = String::new();
    match self.input.read_line(&mut line)? {
      0 => Ok(None),
      _ => Ok(Some(line)),
    }
  }

  fn run_statements(&mut self, statements: &[Stmt]) -> EvalResult<Flow> {
    for statement in statements {
      if let Flow::Return(value) = self.execute(statement)? {
        return Ok(Flow::Return(value));
      }
    }
    Ok(Flow::Normal)
  }

  fn execute_statement(&mut self, statement: &Stmt) -> EvalResult<Flow> {
    match statement {
      Stmt::Expression(expr) => {
        self.evaluate(expr)?;
      }
      Stmt::Print(expr) => {
        let value = self.evaluate(expr)?;
        writeln!(self.output, "{value}").map_err(|err| RuntimeError::Output {
          message: err.to_string(),
          line: expr_line(expr),
        })?;
      }
      Stmt::Var {
        name,
        initializer,
        is_const,
      } => {
        if self.environment.borrow().contains(&name.lexeme) {
          return Err(RuntimeError::already_defined(name));
        }
        let value = match initializer {
          Some(initializer) => self.evaluate(initializer)?,
          None => Value::Nil,
        };
        let mut scope = self.environment.borrow_mut();
        if *is_const {
          scope.define_constant(&name.lexeme, value);
        } else {
          scope.define(&name.lexeme, value);
        }
      }
      Stmt::Block(statements) => {
        trace!(statements = statements.len(), "entering block scope");
        let block_env = Environment::shared(Some(Rc::clone(&self.environment)));
        return self.execute_block(statements, block_env);
      }
      Stmt::If(condition, then_branch, else_branch) => {
        if self.evaluate(condition)?.is_truthy() {
          return self.execute(then_branch);
        }
        if let Some(else_branch) = else_branch {
          return self.execute(else_branch);
        }
      }
      Stmt::While(condition, body) => {
        while self.evaluate(condition)?.is_truthy() {
          if let Flow::Return(value) = self.execute(body)? {
            return Ok(Flow::Return(value));
          }
        }
      }
      Stmt::Function(declaration) => {
        trace!(function = %declaration.name.lexeme, "defining");
        let function = Function::new(Rc::clone(declaration), Rc::clone(&self.environment));
        self
          .environment
          .borrow_mut()
          .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));
      }
      Stmt::Return(_, value) => {
        let value = match value {
          Some(value) => self.evaluate(value)?,
          None => Value::Nil,
        };
        return Ok(Flow::Return(value));
      }
    }
    Ok(Flow::Normal)
  }

  fn evaluate_expression(&mut self, expr: &Expr) -> EvalResult<Value> {
    match expr {
      Expr::Literal(literal) => Ok(Value::from(literal)),
      Expr::Grouping(inner) => self.evaluate(inner),
      Expr::Variable(name) => self.environment.borrow().lookup(name),
      Expr::Assign(name, value) => {
        if self.environment.borrow().is_constant(name) {
          return Err(RuntimeError::constant_reassignment(name));
        }
        let value = self.evaluate(value)?;
        self.environment.borrow_mut().set(name, value.clone())?;
        Ok(value)
      }
      Expr::Unary(operator, right) => {
        let right = self.evaluate(right)?;
        match operator.kind {
          TokenKind::Minus => match right {
            Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
            Value::Float(n) => Ok(Value::Float(-n)),
            _ => Err(RuntimeError::OperandNotNumber {
              line: operator.line,
            }),
          },
          _ => Ok(Value::Bool(!right.is_truthy())),
        }
      }
      Expr::Logical(left, operator, right) => {
        let left = self.evaluate(left)?;
        let short_circuits = match operator.kind {
          TokenKind::Or => left.is_truthy(),
          _ => !left.is_truthy(),
        };
        if short_circuits {
          return Ok(left);
        }
        self.evaluate(right)
      }
      Expr::Binary(left, operator, right) => {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        binary(&left, operator, &right)
      }
      Expr::Call(callee, paren, arguments) => self.call(callee, paren, arguments),
    }
  }

  fn call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> EvalResult<Value> {
    let callee = self.evaluate(callee)?;
    let mut values = Vec::with_capacity(arguments.len());
    for argument in arguments {
      values.push(self.evaluate(argument)?);
    }

    let callable = callee
      .as_callable()
      .ok_or(RuntimeError::NotCallable { line: paren.line })?;
    if values.len() != callable.arity() {
      return Err(RuntimeError::ArityMismatch {
        expected: callable.arity(),
        found: values.len(),
        line: paren.line,
      });
    }

    callable.call(self, values).map_err(|failure| match failure {
      CallFailure::Function(source) => RuntimeError::Function {
        source,
        line: paren.line,
      },
      CallFailure::Runtime(err) => err,
    })
  }
}

impl Default for Interpreter {
  fn default() -> Self {
    Self::new()
  }
}

fn binary(left: &Value, operator: &Token, right: &Value) -> EvalResult<Value> {
  let line = operator.line;
  match operator.kind {
    TokenKind::EqualEqual => return Ok(Value::Bool(left.equals(right))),
    TokenKind::BangEqual => return Ok(Value::Bool(!left.equals(right))),
    TokenKind::Plus => {
      if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Ok(Value::Str(format!("{a}{b}")));
      }
    }
    _ => {}
  }

  let operands = Operands::of(left, right).ok_or(match operator.kind {
    TokenKind::Plus => RuntimeError::OperandsNotAddable { line },
    _ => RuntimeError::OperandsNotNumbers { line },
  })?;

  let value = match (operator.kind, operands) {
    (TokenKind::Plus, Operands::Ints(a, b)) => Value::Int(a.wrapping_add(b)),
    (TokenKind::Plus, Operands::Floats(a, b)) => Value::Float(a + b),
    (TokenKind::Minus, Operands::Ints(a, b)) => Value::Int(a.wrapping_sub(b)),
    (TokenKind::Minus, Operands::Floats(a, b)) => Value::Float(a - b),
    (TokenKind::Star, Operands::Ints(a, b)) => Value::Int(a.wrapping_mul(b)),
    (TokenKind::Star, Operands::Floats(a, b)) => Value::Float(a * b),
    // Integer division stays integral only when it is exact.
    (TokenKind::Slash, Operands::Ints(a, b)) if b != 0 && a.wrapping_rem(b) == 0 => {
      Value::Int(a.wrapping_div(b))
    }
    (TokenKind::Slash, Operands::Ints(a, b)) => Value::Float(a as f64 / b as f64),
    (TokenKind::Slash, Operands::Floats(a, b)) => Value::Float(a / b),
    (TokenKind::Percent, Operands::Ints(a, b)) if b != 0 => Value::Int(a.wrapping_rem(b)),
    (TokenKind::Percent, Operands::Ints(a, b)) => Value::Float(a as f64 % b as f64),
    (TokenKind::Percent, Operands::Floats(a, b)) => Value::Float(a % b),
    (TokenKind::Greater, Operands::Ints(a, b)) => Value::Bool(a > b),
    (TokenKind::Greater, Operands::Floats(a, b)) => Value::Bool(a > b),
    (TokenKind::GreaterEqual, Operands::Ints(a, b)) => Value::Bool(a >= b),
    (TokenKind::GreaterEqual, Operands::Floats(a, b)) => Value::Bool(a >= b),
    (TokenKind::Less, Operands::Ints(a, b)) => Value::Bool(a < b),
    (TokenKind::Less, Operands::Floats(a, b)) => Value::Bool(a < b),
    (TokenKind::LessEqual, Operands::Ints(a, b)) => Value::Bool(a <= b),
    (TokenKind::LessEqual, Operands::Floats(a, b)) => Value::Bool(a <= b),
    _ => Value::Nil,
  };
  Ok(value)
}

// Best-effort line for errors that have no operator token at hand.
fn expr_line(expr: &Expr) -> usize {
  match expr {
    Expr::Assign(name, _) | Expr::Variable(name) => name.line,
    Expr::Binary(_, operator, _) | Expr::Logical(_, operator, _) | Expr::Unary(operator, _) => {
      operator.line
    }
    Expr::Call(_, paren, _) => paren.line,
    Expr::Grouping(inner) => expr_line(inner),
    Expr::Literal(_) => 0,
  }
}
