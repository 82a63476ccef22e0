use std::env;
use std::io;
use std::path::Path;
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
  lox::init_tracing();

  let args: Vec<String> = env::args().skip(1).collect();
  let status = match args.as_slice() {
    [] => {
      let mut interpreter = interpreter::Interpreter::new();
      lox::run_prompt(&mut interpreter, &mut io::stdout(), &mut io::stderr())?
    }
    [script] => lox::run_file(Path::new(script))?,
    _ => {
      eprintln!("Usage: lox [script]");
      lox::EX_USAGE
    }
  };
  Ok(ExitCode::from(status))
}
