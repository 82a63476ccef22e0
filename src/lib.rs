use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Once;

use anyhow::Context;
use common::{LexError, ParseError, RuntimeError};
use interpreter::{Flow, Interpreter};
use thiserror::Error;
use tracing::{debug, warn};

pub use interpreter::OutputBuffer;

/// Exit status for bad command line usage.
pub const EX_USAGE: u8 = 64;
/// Exit status when a script fails to lex or parse.
pub const EX_DATAERR: u8 = 65;
/// Exit status for a runtime error.
pub const EX_SOFTWARE: u8 = 70;

/// Why a run stopped before finishing. Each tier keeps every diagnostic it produced.
#[derive(Debug, Error)]
pub enum RunError {
  #[error("{} lexical error(s)", .0.len())]
  Lex(Vec<LexError>),
  #[error("{} syntax error(s)", .0.len())]
  Parse(Vec<ParseError>),
  #[error(transparent)]
  Runtime(#[from] RuntimeError),
}

impl RunError {
  pub fn exit_code(&self) -> u8 {
    match self {
      RunError::Lex(_) | RunError::Parse(_) => EX_DATAERR,
      RunError::Runtime(_) => EX_SOFTWARE,
    }
  }

  /// Writes the user-facing diagnostics, one report per error.
  pub fn report(&self, out: &mut impl Write) -> io::Result<()> {
    match self {
      RunError::Lex(errors) => errors.iter().try_for_each(|err| writeln!(out, "{err}")),
      RunError::Parse(errors) => errors.iter().try_for_each(|err| writeln!(out, "{err}")),
      RunError::Runtime(err) => writeln!(out, "{}", err.report()),
    }
  }
}

static TRACING_INIT: Once = Once::new();

/// Installs a stderr log subscriber when `RUST_LOG` is set. Safe to call more than once.
pub fn init_tracing() {
  TRACING_INIT.call_once(|| {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
      tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .with(EnvFilter::from_default_env())
        .init();
    }
  });
}

/// Lexes, parses and evaluates `lines`. Evaluation is skipped if either earlier stage failed.
pub fn run_lines<S: AsRef<str>>(lines: &[S], interpreter: &mut Interpreter) -> Result<Flow, RunError> {
  let scanned = syntax::scan(lines);
  if scanned.had_error() {
    return Err(RunError::Lex(scanned.errors));
  }

  let parsed = syntax::parse(scanned.tokens);
  if parsed.had_error() {
    return Err(RunError::Parse(parsed.errors));
  }

  let flow = interpreter.interpret(&parsed.statements)?;
  if let Flow::Return(value) = &flow {
    warn!(%value, "return at top level ended the run");
  }
  Ok(flow)
}

pub fn run(source: &str, interpreter: &mut Interpreter) -> Result<Flow, RunError> {
  let lines: Vec<&str> = source.lines().collect();
  run_lines(&lines, interpreter)
}

/// Runs a whole script and returns the process exit status.
pub fn run_script(source: &str, interpreter: &mut Interpreter, errors: &mut impl Write) -> io::Result<u8> {
  match run(source, interpreter) {
    Ok(_) => Ok(0),
    Err(err) => {
      err.report(errors)?;
      Ok(err.exit_code())
    }
  }
}

pub fn run_file(path: &Path) -> anyhow::Result<u8> {
  let source = fs::read_to_string(path).with_context(|| format!("Failed opening file: {}", path.display()))?;
  debug!(path = %path.display(), bytes = source.len(), "running script");
  let mut interpreter = Interpreter::new();
  let status = run_script(&source, &mut interpreter, &mut io::stderr())?;
  Ok(status)
}

/// Interactive loop. Reads lines through the interpreter's input so `input()` and the
/// prompt share one reader. Lex and parse errors are reported and the loop goes on;
/// a runtime error ends it with `EX_SOFTWARE`.
pub fn run_prompt(
  interpreter: &mut Interpreter,
  prompt: &mut impl Write,
  errors: &mut impl Write,
) -> anyhow::Result<u8> {
  loop {
    write!(prompt, "> ")?;
    prompt.flush()?;

    let Some(line) = interpreter.read_line().context("Failed reading input")? else {
      writeln!(prompt)?;
      return Ok(0);
    };

    let line = line.trim_end_matches(['\n', '\r']);
    match run_lines(&[line], interpreter) {
      Ok(_) => {}
      Err(RunError::Runtime(err)) => {
        writeln!(errors, "{}", err.report())?;
        return Ok(EX_SOFTWARE);
      }
      Err(err) => err.report(errors)?,
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn interpreter(input: &str) -> (Interpreter, OutputBuffer) {
    let output = OutputBuffer::new();
    let interpreter = Interpreter::with_io(
      Box::new(output.clone()),
      Box::new(io::Cursor::new(input.as_bytes().to_vec())),
    );
    (interpreter, output)
  }

  #[test]
  fn exit_codes_per_tier() {
    let (mut interp, _) = interpreter("");
    assert_eq!(run("var x = @;", &mut interp).map_err(|e| e.exit_code()).err(), Some(EX_DATAERR));
    assert_eq!(run("var x = ;", &mut interp).map_err(|e| e.exit_code()).err(), Some(EX_DATAERR));
    assert_eq!(run("print y;", &mut interp).map_err(|e| e.exit_code()).err(), Some(EX_SOFTWARE));
  }

  #[test]
  fn lex_errors_skip_parsing() {
    let (mut interp, output) = interpreter("");
    let err = run("print 1;\nprint @;\nprint \"open;", &mut interp).expect_err("lex errors");
    let RunError::Lex(errors) = &err else {
      panic!("expected lexical errors, got {err:?}");
    };
    assert_eq!(errors.len(), 2);
    assert!(output.contents().is_empty());
  }

  #[test]
  fn prompt_keeps_going_after_syntax_errors() {
    let (mut interp, output) = interpreter("var a = 1;\nprint a +;\nprint a;\n");
    let mut prompt = Vec::new();
    let mut errors = Vec::new();
    let status = run_prompt(&mut interp, &mut prompt, &mut errors).expect("prompt runs");

    assert_eq!(status, 0);
    assert_eq!(output.lines(), vec!["1"]);
    assert_eq!(String::from_utf8_lossy(&prompt), "> > > > \n");
    assert_eq!(
      String::from_utf8_lossy(&errors),
      "[line 1] Error at ';': Expect expression.\n"
    );
  }

  #[test]
  fn prompt_stops_on_runtime_error() {
    let (mut interp, output) = interpreter("print 1;\nprint missing;\nprint 2;\n");
    let mut errors = Vec::new();
    let status = run_prompt(&mut interp, &mut Vec::new(), &mut errors).expect("prompt runs");

    assert_eq!(status, EX_SOFTWARE);
    assert_eq!(output.lines(), vec!["1"]);
    assert_eq!(
      String::from_utf8_lossy(&errors),
      "Undefined variable 'missing'\n[line 1] \n"
    );
  }
}
