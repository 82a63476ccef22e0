use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
  // Single-character punctuation.
  LeftParen,
  RightParen,
  LeftBrace,
  RightBrace,
  Comma,
  Minus,
  Plus,
  Semicolon,
  Slash,
  Star,
  Percent,

  // One or two character operators.
  Bang,
  BangEqual,
  Equal,
  EqualEqual,
  Greater,
  GreaterEqual,
  Less,
  LessEqual,

  // Literals.
  Identifier,
  String,
  Number,

  // Keywords.
  And,
  Const,
  Else,
  False,
  For,
  Fun,
  If,
  Nil,
  Or,
  Print,
  Return,
  True,
  Var,
  While,

  Eof,
}

impl TokenKind {
  /// Kinds that can open a statement; the parser resynchronizes on them.
  pub fn starts_statement(self) -> bool {
    matches!(
      self,
      TokenKind::Fun
        | TokenKind::Var
        | TokenKind::For
        | TokenKind::If
        | TokenKind::While
        | TokenKind::Print
        | TokenKind::Return
    )
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub lexeme: String,
  pub line: usize,
}

impl Token {
  pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize) -> Self {
    Token {
      kind,
      lexeme: lexeme.into(),
      line,
    }
  }

  pub fn eof(line: usize) -> Self {
    Token::new(TokenKind::Eof, "", line)
  }

  pub fn is_eof(&self) -> bool {
    self.kind == TokenKind::Eof
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_eof() {
      write!(f, "end")
    } else {
      write!(f, "'{}'", self.lexeme)
    }
  }
}
