use std::collections::HashMap;

use common::{LexError, Token, TokenKind};
use onig::Regex;
use tracing::{debug, trace};

/**
 * A macro for map literals.
 *
 * hashmap!{ 1 => "one", 2 => "two" };
 */
macro_rules! hashmap(
    { $($key:expr => $value:expr),+ $(,)? } => {
        {
            let mut m = ::std::collections::HashMap::new();
            $(
                m.insert($key, $value);
            )+
            m
        }
     };
);

lazy_static! {
  static ref PUNCTUATION: HashMap<char, TokenKind> = hashmap! {
    '(' => TokenKind::LeftParen,
    ')' => TokenKind::RightParen,
    '{' => TokenKind::LeftBrace,
    '}' => TokenKind::RightBrace,
    ',' => TokenKind::Comma,
    '-' => TokenKind::Minus,
    '+' => TokenKind::Plus,
    ';' => TokenKind::Semicolon,
    '*' => TokenKind::Star,
    '%' => TokenKind::Percent,
  };

  /**
   * Seed character => (kind alone, kind when followed by '=').
   */
  static ref OPERATORS: HashMap<char, (TokenKind, TokenKind)> = hashmap! {
    '!' => (TokenKind::Bang, TokenKind::BangEqual),
    '=' => (TokenKind::Equal, TokenKind::EqualEqual),
    '<' => (TokenKind::Less, TokenKind::LessEqual),
    '>' => (TokenKind::Greater, TokenKind::GreaterEqual),
  };

  static ref KEYWORDS: HashMap<&'static str, TokenKind> = hashmap! {
    "and" => TokenKind::And,
    "else" => TokenKind::Else,
    "false" => TokenKind::False,
    "for" => TokenKind::For,
    "fun" => TokenKind::Fun,
    "if" => TokenKind::If,
    "nil" => TokenKind::Nil,
    "or" => TokenKind::Or,
    "print" => TokenKind::Print,
    "return" => TokenKind::Return,
    "true" => TokenKind::True,
    "var" => TokenKind::Var,
    "while" => TokenKind::While,
    "const" => TokenKind::Const,
  };

  /**
   * Digits, then at most one '.' that is followed by more digits.
   */
  static ref NUMBER_RULE: Regex = Regex::new(r"\A[0-9]+(\.[0-9]+)?").expect("number rule compiles");

  static ref WORD_RULE: Regex = Regex::new(r"\A[A-Za-z][A-Za-z0-9]*").expect("word rule compiles");
}

/// Tokens of a whole source plus every lexical error met on the way.
#[derive(Debug, Default)]
pub struct Scanned {
  pub tokens: Vec<Token>,
  pub errors: Vec<LexError>,
}

impl Scanned {
  pub fn had_error(&self) -> bool {
    !self.errors.is_empty()
  }
}

/// Scans source lines (without trailing newlines) into tokens ending with `Eof`.
pub fn scan<S: AsRef<str>>(lines: &[S]) -> Scanned {
  let mut lexer = Lexer::default();
  for (index, line) in lines.iter().enumerate() {
    lexer.line = index + 1;
    lexer.scan_line(line.as_ref());
  }
  lexer.scanned.tokens.push(Token::eof(lines.len().max(1)));
  debug!(
    tokens = lexer.scanned.tokens.len(),
    errors = lexer.scanned.errors.len(),
    "scanned source"
  );
  lexer.scanned
}

pub fn scan_source(source: &str) -> Scanned {
  let lines: Vec<&str> = source.lines().collect();
  scan(&lines)
}

#[derive(Default)]
struct Lexer {
  line: usize,
  scanned: Scanned,
}

impl Lexer {
  fn scan_line(&mut self, text: &str) {
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
      match self.scan_token(c, rest) {
        Ok(consumed) => rest = &rest[consumed..],
        Err(err) => {
          // The rest of the line is abandoned, the next line starts clean.
          trace!(%err, "lexical error");
          self.scanned.errors.push(err);
          return;
        }
      }
    }
  }

  // Returns how many bytes of `rest` were consumed.
  fn scan_token(&mut self, c: char, rest: &str) -> Result<usize, LexError> {
    if let Some(kind) = PUNCTUATION.get(&c) {
      self.push(*kind, &rest[..1]);
      return Ok(1);
    }

    if let Some((single, double)) = OPERATORS.get(&c) {
      if rest[1..].starts_with('=') {
        self.push(*double, &rest[..2]);
        return Ok(2);
      }
      self.push(*single, &rest[..1]);
      return Ok(1);
    }

    match c {
      ' ' | '\t' | '\r' | '\n' => Ok(1),
      '/' => {
        if rest[1..].starts_with('/') {
          return Ok(rest.len());
        }
        self.push(TokenKind::Slash, "/");
        Ok(1)
      }
      '"' => match rest[1..].find('"') {
        Some(close) => {
          let end = close + 2;
          self.push(TokenKind::String, &rest[..end]);
          Ok(end)
        }
        None => Err(LexError::UnterminatedString { line: self.line }),
      },
      c if c.is_ascii_digit() => self.number(rest),
      c if c.is_ascii_alphabetic() => Ok(self.word(rest)),
      c => Err(LexError::UnknownCharacter {
        line: self.line,
        character: c,
      }),
    }
  }

  fn number(&mut self, rest: &str) -> Result<usize, LexError> {
    let (matched, has_fraction) = NUMBER_RULE
      .captures(rest)
      .map(|caps| (caps.at(0).unwrap_or(&rest[..1]), caps.at(1).is_some()))
      .unwrap_or((&rest[..1], false));
    if has_fraction && rest[matched.len()..].starts_with('.') {
      return Err(LexError::TwoDecimals { line: self.line });
    }
    self.push(TokenKind::Number, matched);
    Ok(matched.len())
  }

  fn word(&mut self, rest: &str) -> usize {
    let matched = WORD_RULE
      .captures(rest)
      .and_then(|caps| caps.at(0))
      .unwrap_or(&rest[..1]);
    let kind = KEYWORDS.get(matched).copied().unwrap_or(TokenKind::Identifier);
    self.push(kind, matched);
    matched.len()
  }

  fn push(&mut self, kind: TokenKind, lexeme: &str) {
    self.scanned.tokens.push(Token::new(kind, lexeme, self.line));
  }
}
