use common::{Expr, Literal, Stmt};

/// Rewrites sugar forms into the core statement kinds before evaluation.
#[derive(Debug, Default)]
pub struct Transformer {}

impl Transformer {
  pub fn new() -> Self {
    Transformer {}
  }

  // for (init; cond; incr) body
  //   => { init; while (cond) { body; incr; } }
  pub fn transform_for_to_while(
    &self,
    initializer: Option<Stmt>,
    condition: Option<Expr>,
    increment: Option<Expr>,
    body: Stmt,
  ) -> Stmt {
    let body = match increment {
      Some(increment) => Stmt::Block(vec![body, Stmt::Expression(increment)]),
      None => body,
    };
    let condition = condition.unwrap_or(Expr::Literal(Literal::Bool(true)));
    let looped = Stmt::While(condition, Box::new(body));

    match initializer {
      Some(initializer) => Stmt::Block(vec![initializer, looped]),
      None => looped,
    }
  }
}
