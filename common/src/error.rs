use thiserror::Error;

use crate::token::Token;

/// Errors raised while turning source lines into tokens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
  #[error("[line {line}] Error: Unterminated string.")]
  UnterminatedString { line: usize },
  #[error("[line {line}] Error: Number cannot have two decimals.")]
  TwoDecimals { line: usize },
  #[error("[line {line}] Error: Unknown character '{character}'.")]
  UnknownCharacter { line: usize, character: char },
}

impl LexError {
  pub fn line(&self) -> usize {
    match self {
      LexError::UnterminatedString { line }
      | LexError::TwoDecimals { line }
      | LexError::UnknownCharacter { line, .. } => *line,
    }
  }
}

/// A syntax error anchored at the token where parsing went wrong.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("[line {}] Error at {}: {}.", .token.line, .token, .message)]
pub struct ParseError {
  pub token: Token,
  pub message: String,
}

impl ParseError {
  pub fn new(token: Token, message: impl Into<String>) -> Self {
    ParseError {
      token,
      message: message.into(),
    }
  }
}

/// Failure reported by a callable itself, e.g. a native that cannot convert its input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CallError {
  pub message: String,
}

impl CallError {
  pub fn new(message: impl Into<String>) -> Self {
    CallError {
      message: message.into(),
    }
  }
}

/// Errors that abort evaluation. Every variant knows the source line it came from.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
  #[error("Undefined variable '{name}'")]
  UndefinedVariable { name: String, line: usize },
  #[error("Variable '{name}' already exists.")]
  AlreadyDefined { name: String, line: usize },
  #[error("Cannot reassign constant variable '{name}'.")]
  ConstantReassignment { name: String, line: usize },
  #[error("Operand must be a number")]
  OperandNotNumber { line: usize },
  #[error("Operands must be numbers")]
  OperandsNotNumbers { line: usize },
  #[error("Operands must be two numbers or two strings.")]
  OperandsNotAddable { line: usize },
  #[error("Can only call functions")]
  NotCallable { line: usize },
  #[error("Expected {expected} arguments but got {found}")]
  ArityMismatch {
    expected: usize,
    found: usize,
    line: usize,
  },
  #[error("{}", .source.message)]
  Function { source: CallError, line: usize },
  #[error("Could not write output: {message}.")]
  Output { message: String, line: usize },
}

impl RuntimeError {
  pub fn undefined_variable(name: &Token) -> Self {
    RuntimeError::UndefinedVariable {
      name: name.lexeme.clone(),
      line: name.line,
    }
  }

  pub fn already_defined(name: &Token) -> Self {
    RuntimeError::AlreadyDefined {
      name: name.lexeme.clone(),
      line: name.line,
    }
  }

  pub fn constant_reassignment(name: &Token) -> Self {
    RuntimeError::ConstantReassignment {
      name: name.lexeme.clone(),
      line: name.line,
    }
  }

  pub fn line(&self) -> usize {
    match self {
      RuntimeError::UndefinedVariable { line, .. }
      | RuntimeError::AlreadyDefined { line, .. }
      | RuntimeError::ConstantReassignment { line, .. }
      | RuntimeError::OperandNotNumber { line }
      | RuntimeError::OperandsNotNumbers { line }
      | RuntimeError::OperandsNotAddable { line }
      | RuntimeError::NotCallable { line }
      | RuntimeError::ArityMismatch { line, .. }
      | RuntimeError::Function { line, .. }
      | RuntimeError::Output { line, .. } => *line,
    }
  }

  /// The two-line report printed before the process exits.
  pub fn report(&self) -> String {
    format!("{}\n[line {}] ", self, self.line())
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::token::TokenKind;

  #[test]
  fn parse_error_mid_stream() {
    let err = ParseError::new(Token::new(TokenKind::Identifier, "oops", 4), "Expect ';' after value");
    assert_eq!(err.to_string(), "[line 4] Error at 'oops': Expect ';' after value.");
  }

  #[test]
  fn parse_error_at_end() {
    let err = ParseError::new(Token::eof(9), "Expect expression");
    assert_eq!(err.to_string(), "[line 9] Error at end: Expect expression.");
  }

  #[test]
  fn runtime_report_names_line() {
    let err = RuntimeError::ArityMismatch {
      expected: 2,
      found: 1,
      line: 12,
    };
    assert_eq!(err.report(), "Expected 2 arguments but got 1\n[line 12] ");
  }

  #[test]
  fn function_error_uses_callee_message() {
    let err = RuntimeError::Function {
      source: CallError::new("Cannot convert 'x' to int."),
      line: 3,
    };
    assert_eq!(err.to_string(), "Cannot convert 'x' to int.");
    assert_eq!(err.line(), 3);
  }

  #[test]
  fn lex_error_line() {
    let err = LexError::UnknownCharacter {
      line: 2,
      character: '@',
    };
    assert_eq!(err.line(), 2);
    assert_eq!(err.to_string(), "[line 2] Error: Unknown character '@'.");
  }

  #[test]
  fn runtime_messages_keep_their_punctuation() {
    let messages: Vec<String> = [
      RuntimeError::undefined_variable(&Token::new(TokenKind::Identifier, "x", 1)),
      RuntimeError::OperandNotNumber { line: 1 },
      RuntimeError::OperandsNotNumbers { line: 1 },
      RuntimeError::NotCallable { line: 1 },
      RuntimeError::already_defined(&Token::new(TokenKind::Identifier, "x", 1)),
      RuntimeError::OperandsNotAddable { line: 1 },
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    assert_eq!(
      messages,
      vec![
        "Undefined variable 'x'",
        "Operand must be a number",
        "Operands must be numbers",
        "Can only call functions",
        "Variable 'x' already exists.",
        "Operands must be two numbers or two strings.",
      ]
    );
  }
}
