use std::rc::Rc;

use common::stack::ensure_sufficient_stack;
use common::{Expr, FunctionDecl, Literal, ParseError, Stmt, Token, TokenKind};
use tracing::{debug, trace};
use unicode_segmentation::UnicodeSegmentation;

use crate::transformer::Transformer;

/// Upper bound on parameters of a declaration and arguments of a call.
pub const MAX_ARITY: usize = 255;

type ParseResult<T> = Result<T, ParseError>;

/// Statements recovered from a token stream, plus every syntax error reported.
#[derive(Debug, Default)]
pub struct Parsed {
  pub statements: Vec<Stmt>,
  pub errors: Vec<ParseError>,
}

impl Parsed {
  pub fn had_error(&self) -> bool {
    !self.errors.is_empty()
  }
}

pub fn parse(tokens: Vec<Token>) -> Parsed {
  Parser::new(tokens).parse()
}

/**
 * Recursive descent parser, one method per precedence level:
 *
 *   assignment -> or -> and -> equality -> comparison
 *     -> term -> factor -> unary -> call -> primary
 */
pub struct Parser {
  tokens: Vec<Token>,
  current: usize,
  errors: Vec<ParseError>,
  transformer: Transformer,
}

impl Parser {
  pub fn new(mut tokens: Vec<Token>) -> Self {
    if !tokens.last().is_some_and(Token::is_eof) {
      let line = tokens.last().map_or(1, |t| t.line);
      tokens.push(Token::eof(line));
    }
    Parser {
      tokens,
      current: 0,
      errors: Vec::new(),
      transformer: Transformer::new(),
    }
  }

  pub fn parse(mut self) -> Parsed {
    let mut statements = Vec::new();
    while !self.at_end() {
      if let Some(statement) = self.declaration() {
        statements.push(statement);
      }
    }
    debug!(
      statements = statements.len(),
      errors = self.errors.len(),
      "parsed tokens"
    );
    Parsed {
      statements,
      errors: self.errors,
    }
  }

  // A broken declaration is reported and skipped; parsing resumes at the next statement.
  fn declaration(&mut self) -> Option<Stmt> {
    match self.declaration_or_error() {
      Ok(statement) => Some(statement),
      Err(err) => {
        self.report(err);
        self.synchronize();
        None
      }
    }
  }

  fn declaration_or_error(&mut self) -> ParseResult<Stmt> {
    if self.matches(&[TokenKind::Var]) {
      self.var_declaration(false)
    } else if self.matches(&[TokenKind::Const]) {
      self.const_declaration()
    } else if self.matches(&[TokenKind::Fun]) {
      self.function()
    } else {
      self.statement()
    }
  }

  // const var NAME = expr ;
  fn const_declaration(&mut self) -> ParseResult<Stmt> {
    self.consume(TokenKind::Var, "Expect 'var' keyword after 'const'")?;
    self.var_declaration(true)
  }

  // var NAME [= expr] ;
  fn var_declaration(&mut self, is_const: bool) -> ParseResult<Stmt> {
    let name = self.consume(TokenKind::Identifier, "Expect variable name")?;

    let initializer = if is_const {
      self.consume(TokenKind::Equal, "Expect '=' after constant name")?;
      Some(self.expression()?)
    } else if self.matches(&[TokenKind::Equal]) {
      Some(self.expression()?)
    } else {
      None
    };

    self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration")?;
    Ok(Stmt::Var {
      name,
      initializer,
      is_const,
    })
  }

  fn function(&mut self) -> ParseResult<Stmt> {
    let name = self.consume(TokenKind::Identifier, "Expect function name")?;
    self.consume(TokenKind::LeftParen, "Expect '(' after function name")?;

    let mut params = Vec::new();
    if !self.check(TokenKind::RightParen) {
      loop {
        if params.len() >= MAX_ARITY {
          let err = ParseError::new(self.peek().clone(), "Can't have more than 255 parameters");
          self.report(err);
        }
        params.push(self.consume(TokenKind::Identifier, "Expect parameter name")?);
        if !self.matches(&[TokenKind::Comma]) {
          break;
        }
      }
    }
    self.consume(TokenKind::RightParen, "Expect ')' after parameters")?;

    self.consume(TokenKind::LeftBrace, "Expect '{' before function body")?;
    let body = self.block()?;
    Ok(Stmt::Function(Rc::new(FunctionDecl { name, params, body })))
  }

  fn statement(&mut self) -> ParseResult<Stmt> {
    ensure_sufficient_stack(|| self.statement_kind())
  }

  fn statement_kind(&mut self) -> ParseResult<Stmt> {
    if self.matches(&[TokenKind::Print]) {
      self.print_statement()
    } else if self.matches(&[TokenKind::LeftBrace]) {
      Ok(Stmt::Block(self.block()?))
    } else if self.matches(&[TokenKind::If]) {
      self.if_statement()
    } else if self.matches(&[TokenKind::While]) {
      self.while_statement()
    } else if self.matches(&[TokenKind::For]) {
      self.for_statement()
    } else if self.matches(&[TokenKind::Return]) {
      self.return_statement()
    } else {
      self.expression_statement()
    }
  }

  fn print_statement(&mut self) -> ParseResult<Stmt> {
    let value = self.expression()?;
    self.consume(TokenKind::Semicolon, "Expect ';' after value")?;
    Ok(Stmt::Print(value))
  }

  fn block(&mut self) -> ParseResult<Vec<Stmt>> {
    let mut statements = Vec::new();
    while !self.at_end() && !self.check(TokenKind::RightBrace) {
      if let Some(statement) = self.declaration() {
        statements.push(statement);
      }
    }
    self.consume(TokenKind::RightBrace, "Expect '}' after block")?;
    Ok(statements)
  }

  fn if_statement(&mut self) -> ParseResult<Stmt> {
    self.consume(TokenKind::LeftParen, "Expect '(' after 'if'")?;
    let condition = self.expression()?;
    self.consume(TokenKind::RightParen, "Expect ')' after if condition")?;

    let then_branch = self.statement()?;
    let else_branch = if self.matches(&[TokenKind::Else]) {
      Some(Box::new(self.statement()?))
    } else {
      None
    };
    Ok(Stmt::If(condition, Box::new(then_branch), else_branch))
  }

  fn while_statement(&mut self) -> ParseResult<Stmt> {
    self.consume(TokenKind::LeftParen, "Expect '(' after 'while'")?;
    let condition = self.expression()?;
    self.consume(TokenKind::RightParen, "Expect ')' after condition")?;
    let body = self.statement()?;
    Ok(Stmt::While(condition, Box::new(body)))
  }

  fn for_statement(&mut self) -> ParseResult<Stmt> {
    self.consume(TokenKind::LeftParen, "Expect '(' after 'for'")?;

    let initializer = if self.matches(&[TokenKind::Semicolon]) {
      None
    } else if self.matches(&[TokenKind::Const]) {
      Some(self.const_declaration()?)
    } else if self.matches(&[TokenKind::Var]) {
      Some(self.var_declaration(false)?)
    } else {
      Some(self.expression_statement()?)
    };

    let condition = if self.check(TokenKind::Semicolon) {
      None
    } else {
      Some(self.expression()?)
    };
    self.consume(TokenKind::Semicolon, "Expect ';' after loop condition")?;

    let increment = if self.check(TokenKind::RightParen) {
      None
    } else {
      Some(self.expression()?)
    };
    self.consume(TokenKind::RightParen, "Expect ')' after for clauses")?;

    let body = self.statement()?;
    Ok(self.transformer.transform_for_to_while(initializer, condition, increment, body))
  }

  fn return_statement(&mut self) -> ParseResult<Stmt> {
    let keyword = self.previous().clone();
    let value = if self.check(TokenKind::Semicolon) {
      None
    } else {
      Some(self.expression()?)
    };
    self.consume(TokenKind::Semicolon, "Expect ';' after return value")?;
    Ok(Stmt::Return(keyword, value))
  }

  fn expression_statement(&mut self) -> ParseResult<Stmt> {
    let expr = self.expression()?;
    self.consume(TokenKind::Semicolon, "Expect ';' after expression")?;
    Ok(Stmt::Expression(expr))
  }

  fn expression(&mut self) -> ParseResult<Expr> {
    ensure_sufficient_stack(|| self.assignment())
  }

  fn assignment(&mut self) -> ParseResult<Expr> {
    let expr = self.or()?;

    if self.matches(&[TokenKind::Equal]) {
      let equals = self.previous().clone();
      let value = self.assignment()?;
      return match &expr {
        Expr::Variable(name) => Ok(Expr::Assign(name.clone(), Box::new(value))),
        _ => Err(ParseError::new(equals, "Invalid assignment target")),
      };
    }
    Ok(expr)
  }

  fn or(&mut self) -> ParseResult<Expr> {
    let mut expr = self.and()?;
    while self.matches(&[TokenKind::Or]) {
      let operator = self.previous().clone();
      let right = self.and()?;
      expr = Expr::logical(expr, operator, right);
    }
    Ok(expr)
  }

  fn and(&mut self) -> ParseResult<Expr> {
    let mut expr = self.equality()?;
    while self.matches(&[TokenKind::And]) {
      let operator = self.previous().clone();
      let right = self.equality()?;
      expr = Expr::logical(expr, operator, right);
    }
    Ok(expr)
  }

  fn equality(&mut self) -> ParseResult<Expr> {
    let mut expr = self.comparison()?;
    while self.matches(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
      let operator = self.previous().clone();
      let right = self.comparison()?;
      expr = Expr::binary(expr, operator, right);
    }
    Ok(expr)
  }

  fn comparison(&mut self) -> ParseResult<Expr> {
    let mut expr = self.term()?;
    while self.matches(&[
      TokenKind::Greater,
      TokenKind::GreaterEqual,
      TokenKind::Less,
      TokenKind::LessEqual,
    ]) {
      let operator = self.previous().clone();
      let right = self.term()?;
      expr = Expr::binary(expr, operator, right);
    }
    Ok(expr)
  }

  fn term(&mut self) -> ParseResult<Expr> {
    let mut expr = self.factor()?;
    while self.matches(&[TokenKind::Minus, TokenKind::Plus]) {
      let operator = self.previous().clone();
      let right = self.factor()?;
      expr = Expr::binary(expr, operator, right);
    }
    Ok(expr)
  }

  fn factor(&mut self) -> ParseResult<Expr> {
    let mut expr = self.unary()?;
    while self.matches(&[TokenKind::Slash, TokenKind::Star, TokenKind::Percent]) {
      let operator = self.previous().clone();
      let right = self.unary()?;
      expr = Expr::binary(expr, operator, right);
    }
    Ok(expr)
  }

  fn unary(&mut self) -> ParseResult<Expr> {
    if self.matches(&[TokenKind::Bang, TokenKind::Minus]) {
      let operator = self.previous().clone();
      let right = ensure_sufficient_stack(|| self.unary())?;
      return Ok(Expr::Unary(operator, Box::new(right)));
    }
    self.call()
  }

  // f(a)(b) nests as Call(Call(f, [a]), [b])
  fn call(&mut self) -> ParseResult<Expr> {
    let mut expr = self.primary()?;
    while self.matches(&[TokenKind::LeftParen]) {
      expr = self.finish_call(expr)?;
    }
    Ok(expr)
  }

  fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
    let mut arguments = Vec::new();
    if !self.check(TokenKind::RightParen) {
      loop {
        if arguments.len() >= MAX_ARITY {
          let err = ParseError::new(self.peek().clone(), "Can't have more than 255 arguments");
          self.report(err);
        }
        arguments.push(self.expression()?);
        if !self.matches(&[TokenKind::Comma]) {
          break;
        }
      }
    }
    let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments")?;
    Ok(Expr::Call(Box::new(callee), paren, arguments))
  }

  fn primary(&mut self) -> ParseResult<Expr> {
    let token = self.peek().clone();
    let expr = match token.kind {
      TokenKind::False => Expr::Literal(Literal::Bool(false)),
      TokenKind::True => Expr::Literal(Literal::Bool(true)),
      TokenKind::Nil => Expr::Literal(Literal::Nil),
      TokenKind::String => Expr::Literal(Literal::Str(trim_quotes(&token.lexeme))),
      TokenKind::Number => Expr::Literal(number_literal(&token)?),
      TokenKind::Identifier => Expr::Variable(token),
      TokenKind::LeftParen => {
        self.advance();
        let expr = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after expression")?;
        return Ok(Expr::Grouping(Box::new(expr)));
      }
      _ => return Err(ParseError::new(token, "Expect expression")),
    };
    self.advance();
    Ok(expr)
  }

  fn matches(&mut self, kinds: &[TokenKind]) -> bool {
    if kinds.iter().any(|kind| self.check(*kind)) {
      self.advance();
      return true;
    }
    false
  }

  fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
    if self.check(kind) {
      self.advance();
      return Ok(self.previous().clone());
    }
    Err(ParseError::new(self.peek().clone(), message))
  }

  fn check(&self, kind: TokenKind) -> bool {
    !self.at_end() && self.peek().kind == kind
  }

  fn advance(&mut self) {
    if !self.at_end() {
      self.current += 1;
    }
  }

  fn at_end(&self) -> bool {
    self.peek().is_eof()
  }

  fn peek(&self) -> &Token {
    &self.tokens[self.current]
  }

  fn previous(&self) -> &Token {
    &self.tokens[self.current.saturating_sub(1)]
  }

  fn report(&mut self, err: ParseError) {
    trace!(%err, "syntax error");
    self.errors.push(err);
  }

  // Skip to just past a ';' or to a token that opens a statement.
  fn synchronize(&mut self) {
    self.advance();
    while !self.at_end() {
      if self.previous().kind == TokenKind::Semicolon || self.peek().kind.starts_statement() {
        return;
      }
      self.advance();
    }
  }
}

fn number_literal(token: &Token) -> ParseResult<Literal> {
  if let Ok(int) = token.lexeme.parse::<i64>() {
    return Ok(Literal::Int(int));
  }
  token
    .lexeme
    .parse::<f64>()
    .map(Literal::Float)
    .map_err(|_| ParseError::new(token.clone(), "Invalid number literal"))
}

fn trim_quotes(lexeme: &str) -> String {
  let graphemes: Vec<&str> = lexeme.graphemes(true).collect();
  match graphemes.as_slice() {
    [first, inner @ .., last] if *first == "\"" && *last == "\"" => inner.concat(),
    _ => lexeme.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use indoc::indoc;
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::lexer::scan_source;

  fn parse_source(source: &str) -> Parsed {
    let scanned = scan_source(source);
    assert!(!scanned.had_error(), "{:?}", scanned.errors);
    parse(scanned.tokens)
  }

  fn parse_ok(source: &str) -> Vec<Stmt> {
    let parsed = parse_source(source);
    assert!(!parsed.had_error(), "{:?}", parsed.errors);
    parsed.statements
  }

  fn ident(name: &str, line: usize) -> Token {
    Token::new(TokenKind::Identifier, name, line)
  }

  fn int(value: i64) -> Expr {
    Expr::Literal(Literal::Int(value))
  }

  fn messages(parsed: &Parsed) -> Vec<String> {
    parsed.errors.iter().map(ToString::to_string).collect()
  }

  #[test]
  fn factor_binds_tighter_than_term() {
    let statements = parse_ok("1 + 2 * 3;");
    assert_eq!(
      statements,
      vec![Stmt::Expression(Expr::binary(
        int(1),
        Token::new(TokenKind::Plus, "+", 1),
        Expr::binary(int(2), Token::new(TokenKind::Star, "*", 1), int(3)),
      ))]
    );
  }

  #[test]
  fn binary_levels_are_left_associative() {
    let statements = parse_ok("8 - 4 - 2;");
    assert_eq!(
      statements,
      vec![Stmt::Expression(Expr::binary(
        Expr::binary(int(8), Token::new(TokenKind::Minus, "-", 1), int(4)),
        Token::new(TokenKind::Minus, "-", 1),
        int(2),
      ))]
    );
  }

  #[test]
  fn assignment_is_right_associative() {
    let statements = parse_ok("a = b = 1;");
    assert_eq!(
      statements,
      vec![Stmt::Expression(Expr::Assign(
        ident("a", 1),
        Box::new(Expr::Assign(ident("b", 1), Box::new(int(1)))),
      ))]
    );
  }

  #[test]
  fn logical_or_is_looser_than_and() {
    let statements = parse_ok("a or b and c;");
    assert_eq!(
      statements,
      vec![Stmt::Expression(Expr::logical(
        Expr::Variable(ident("a", 1)),
        Token::new(TokenKind::Or, "or", 1),
        Expr::logical(
          Expr::Variable(ident("b", 1)),
          Token::new(TokenKind::And, "and", 1),
          Expr::Variable(ident("c", 1)),
        ),
      ))]
    );
  }

  #[test]
  fn chained_calls_nest() {
    let statements = parse_ok("f(1)();");
    let Stmt::Expression(Expr::Call(outer, _, outer_args)) = &statements[0] else {
      panic!("expected a call, got {:?}", statements[0]);
    };
    assert!(outer_args.is_empty());
    let Expr::Call(inner, paren, inner_args) = outer.as_ref() else {
      panic!("expected a nested call, got {outer:?}");
    };
    assert_eq!(inner.as_ref(), &Expr::Variable(ident("f", 1)));
    assert_eq!(paren.kind, TokenKind::RightParen);
    assert_eq!(inner_args, &vec![int(1)]);
  }

  #[test]
  fn literals() {
    let statements = parse_ok(r#"print "hi"; print 2.5; print nil; print false;"#);
    assert_eq!(
      statements,
      vec![
        Stmt::Print(Expr::Literal(Literal::Str("hi".to_string()))),
        Stmt::Print(Expr::Literal(Literal::Float(2.5))),
        Stmt::Print(Expr::Literal(Literal::Nil)),
        Stmt::Print(Expr::Literal(Literal::Bool(false))),
      ]
    );
  }

  #[test]
  fn oversized_integer_becomes_float() {
    let statements = parse_ok("99999999999999999999;");
    assert_eq!(
      statements,
      vec![Stmt::Expression(Expr::Literal(Literal::Float(1e20)))]
    );
  }

  #[test]
  fn const_and_var_declarations() {
    let statements = parse_ok("const var x = 1; var y;");
    assert_eq!(
      statements,
      vec![
        Stmt::Var {
          name: ident("x", 1),
          initializer: Some(int(1)),
          is_const: true,
        },
        Stmt::Var {
          name: ident("y", 1),
          initializer: None,
          is_const: false,
        },
      ]
    );
  }

  #[test]
  fn const_requires_var_keyword() {
    let parsed = parse_source("const x = 1;");
    assert_eq!(
      messages(&parsed),
      vec!["[line 1] Error at 'x': Expect 'var' keyword after 'const'."]
    );
  }

  #[test]
  fn function_declaration() {
    let statements = parse_ok(indoc! {"
      fun add(a, b) {
        return a + b;
      }
    "});
    let Stmt::Function(decl) = &statements[0] else {
      panic!("expected a function, got {:?}", statements[0]);
    };
    assert_eq!(decl.name, ident("add", 1));
    assert_eq!(decl.params, vec![ident("a", 1), ident("b", 1)]);
    assert_eq!(decl.body.len(), 1);
    assert!(matches!(&decl.body[0], Stmt::Return(keyword, Some(_)) if keyword.line == 2));
  }

  #[test]
  fn for_loop_is_desugared() {
    let statements = parse_ok("for (var i = 0; i < 3; i = i + 1) print i;");
    let Stmt::Block(parts) = &statements[0] else {
      panic!("expected a block, got {:?}", statements[0]);
    };
    assert!(matches!(&parts[0], Stmt::Var { name, .. } if name.lexeme == "i"));
    let Stmt::While(_, body) = &parts[1] else {
      panic!("expected a while, got {:?}", parts[1]);
    };
    assert!(matches!(body.as_ref(), Stmt::Block(inner) if inner.len() == 2));
  }

  #[test]
  fn invalid_assignment_target() {
    let parsed = parse_source("1 + 2 = 3;");
    assert_eq!(
      messages(&parsed),
      vec!["[line 1] Error at '=': Invalid assignment target."]
    );
  }

  #[test]
  fn missing_expression_at_end() {
    let parsed = parse_source("print");
    assert_eq!(messages(&parsed), vec!["[line 1] Error at end: Expect expression."]);
  }

  #[test]
  fn recovers_and_reports_later_errors() {
    let parsed = parse_source(indoc! {"
      var a = 1
      print a;
      var = 2;
      print 3;
    "});
    assert_eq!(
      messages(&parsed),
      vec![
        "[line 2] Error at 'print': Expect ';' after variable declaration.",
        "[line 3] Error at '=': Expect variable name.",
      ]
    );
    // Only the last statement survives recovery.
    assert_eq!(parsed.statements, vec![Stmt::Print(int(3))]);
  }

  #[test]
  fn errors_inside_blocks_do_not_lose_the_block() {
    let parsed = parse_source(indoc! {"
      {
        print ;
        print 1;
      }
    "});
    assert_eq!(messages(&parsed), vec!["[line 2] Error at ';': Expect expression."]);
    assert_eq!(parsed.statements, vec![Stmt::Block(vec![Stmt::Print(int(1))])]);
  }

  #[test]
  fn too_many_arguments_is_reported_without_aborting() {
    let args = vec!["1"; 256].join(", ");
    let parsed = parse_source(&format!("f({args});"));
    assert_eq!(
      messages(&parsed),
      vec!["[line 1] Error at '1': Can't have more than 255 arguments."]
    );
    let Stmt::Expression(Expr::Call(_, _, arguments)) = &parsed.statements[0] else {
      panic!("expected a call, got {:?}", parsed.statements[0]);
    };
    assert_eq!(arguments.len(), 256);
  }

  #[test]
  fn too_many_parameters_is_reported_without_aborting() {
    let params: Vec<String> = (0..256).map(|i| format!("p{i}")).collect();
    let parsed = parse_source(&format!("fun f({}) {{}}", params.join(", ")));
    assert_eq!(
      messages(&parsed),
      vec!["[line 1] Error at 'p255': Can't have more than 255 parameters."]
    );
    assert_eq!(parsed.statements.len(), 1);
  }

  #[test]
  fn trims_only_surrounding_quotes() {
    assert_eq!(trim_quotes(r#""héllo wörld""#), "héllo wörld");
    assert_eq!(trim_quotes(r#""""#), "");
  }

  #[test]
  fn deeply_nested_groupings() {
    let depth = 10_000;
    let source = format!("print {}1{};", "(".repeat(depth), ")".repeat(depth));
    let statements = parse_ok(&source);

    let Stmt::Print(outermost) = &statements[0] else {
      panic!("expected a print statement");
    };
    let mut expr = outermost;
    let mut levels = 0;
    while let Expr::Grouping(inner) = expr {
      levels += 1;
      expr = inner.as_ref();
    }
    assert_eq!(levels, depth);
    assert_eq!(expr, &int(1));
  }

  #[test]
  fn deeply_nested_unary_and_blocks() {
    let depth = 10_000;
    let negations = format!("print {}true;", "!".repeat(depth));
    assert_eq!(parse_ok(&negations).len(), 1);

    let blocks = format!("{}print 1;{}", "{".repeat(2_000), "}".repeat(2_000));
    assert_eq!(parse_ok(&blocks).len(), 1);
  }
}
