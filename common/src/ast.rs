use std::mem;
use std::rc::Rc;

use crate::token::Token;

/// Constant carried by a literal expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
  Nil,
  Int(i64),
  Float(f64),
  Bool(bool),
  Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Assign(Token, Box<Expr>),
  Binary(Box<Expr>, Token, Box<Expr>),
  // callee, closing paren of the call site, arguments
  Call(Box<Expr>, Token, Vec<Expr>),
  Grouping(Box<Expr>),
  Literal(Literal),
  Logical(Box<Expr>, Token, Box<Expr>),
  Unary(Token, Box<Expr>),
  Variable(Token),
}

impl Expr {
  fn is_leaf(&self) -> bool {
    matches!(self, Expr::Literal(_) | Expr::Variable(_))
  }

  // Moves boxed subexpressions into `pending`, leaving cheap leaves behind.
  fn detach_children(&mut self, pending: &mut Vec<Expr>) {
    match self {
      Expr::Assign(_, value) | Expr::Grouping(value) | Expr::Unary(_, value) => {
        detach(value, pending);
      }
      Expr::Binary(left, _, right) | Expr::Logical(left, _, right) => {
        detach(left, pending);
        detach(right, pending);
      }
      Expr::Call(callee, _, arguments) => {
        detach(callee, pending);
        pending.append(arguments);
      }
      Expr::Literal(_) | Expr::Variable(_) => {}
    }
  }

  pub fn binary(left: Expr, operator: Token, right: Expr) -> Self {
    Expr::Binary(Box::new(left), operator, Box::new(right))
  }

  pub fn logical(left: Expr, operator: Token, right: Expr) -> Self {
    Expr::Logical(Box::new(left), operator, Box::new(right))
  }
}

fn detach(slot: &mut Box<Expr>, pending: &mut Vec<Expr>) {
  if !slot.is_leaf() {
    pending.push(mem::replace(slot.as_mut(), Expr::Literal(Literal::Nil)));
  }
}

// Nesting can be arbitrarily deep, so teardown walks a work list instead of recursing.
impl Drop for Expr {
  fn drop(&mut self) {
    let mut pending = Vec::new();
    self.detach_children(&mut pending);
    while let Some(mut expr) = pending.pop() {
      expr.detach_children(&mut pending);
    }
  }
}

/// A `fun` declaration. Shared with every closure created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
  pub name: Token,
  pub params: Vec<Token>,
  pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
  Block(Vec<Stmt>),
  Expression(Expr),
  If(Expr, Box<Stmt>, Option<Box<Stmt>>),
  Print(Expr),
  While(Expr, Box<Stmt>),
  Var {
    name: Token,
    initializer: Option<Expr>,
    is_const: bool,
  },
  Function(Rc<FunctionDecl>),
  // `return` keyword, optional value
  Return(Token, Option<Expr>),
}
