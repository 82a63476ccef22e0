use std::time::{SystemTime, UNIX_EPOCH};

use common::CallError;

use crate::callable::{CallFailure, Callable};
use crate::environment::Environment;
use crate::evaluator::Interpreter;
use crate::value::Value;

/// Functions every program starts with, bound in the global scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeFunction {
  Clock,
  ToString,
  Input,
  ParseString,
  IsInstance,
}

impl NativeFunction {
  pub const ALL: [NativeFunction; 5] = [
    NativeFunction::Clock,
    NativeFunction::ToString,
    NativeFunction::Input,
    NativeFunction::ParseString,
    NativeFunction::IsInstance,
  ];

  pub fn name(self) -> &'static str {
    match self {
      NativeFunction::Clock => "clock",
      NativeFunction::ToString => "toString",
      NativeFunction::Input => "input",
      NativeFunction::ParseString => "parseString",
      NativeFunction::IsInstance => "isInstance",
    }
  }
}

pub fn register(env: &mut Environment) {
  for native in NativeFunction::ALL {
    env.define(native.name(), Value::Native(native));
  }
}

impl Callable for NativeFunction {
  fn arity(&self) -> usize {
    match self {
      NativeFunction::Clock | NativeFunction::Input => 0,
      NativeFunction::ToString => 1,
      NativeFunction::ParseString | NativeFunction::IsInstance => 2,
    }
  }

  fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value, CallFailure> {
    let value = match self {
      NativeFunction::Clock => clock()?,
      NativeFunction::ToString => Value::Str(arguments[0].to_string()),
      NativeFunction::Input => input(interpreter)?,
      NativeFunction::ParseString => parse_string(&arguments[0], &arguments[1])?,
      NativeFunction::IsInstance => is_instance(&arguments[0], &arguments[1])?,
    };
    Ok(value)
  }
}

fn clock() -> Result<Value, CallError> {
  let elapsed = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map_err(|err| CallError::new(format!("Clock error: {err}.")))?;
  Ok(Value::Int(elapsed.as_secs() as i64))
}

fn input(interpreter: &mut Interpreter) -> Result<Value, CallError> {
  let line = interpreter
    .read_line()
    .map_err(|err| CallError::new(format!("Could not read input: {err}.")))?;
  let text = line
    .map(|line| line.trim_end_matches(['\n', '\r']).replace('"', ""))
    .unwrap_or_default();
  Ok(Value::Str(text))
}

// parseString("int", "42") => 42
fn parse_string(kind: &Value, text: &Value) -> Result<Value, CallError> {
  let (Value::Str(kind), Value::Str(text)) = (kind, text) else {
    return Err(CallError::new("Arguments are not strings."));
  };

  match kind.as_str() {
    "int" => text
      .parse::<i64>()
      .map(Value::Int)
      .map_err(|_| CallError::new(format!("Cannot convert '{text}' to int."))),
    "float" => text
      .parse::<f64>()
      .map(Value::Float)
      .map_err(|_| CallError::new(format!("Cannot convert '{text}' to float."))),
    "bool" => match text.as_str() {
      "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(Value::Bool(true)),
      "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(Value::Bool(false)),
      _ => Err(CallError::new(format!("Cannot convert '{text}' to boolean."))),
    },
    "string" => Ok(Value::Str(text.clone())),
    _ => Err(CallError::new(format!("Type '{kind}' is not supported."))),
  }
}

// isInstance("int", 42) => true
fn is_instance(kind: &Value, value: &Value) -> Result<Value, CallError> {
  let Value::Str(kind) = kind else {
    return Err(CallError::new("Type argument must be string."));
  };

  let matches = match kind.as_str() {
    "int" => matches!(value, Value::Int(_)),
    "float" => matches!(value, Value::Float(_)),
    "boolean" => matches!(value, Value::Bool(_)),
    "string" => matches!(value, Value::Str(_)),
    "function" => value.as_callable().is_some(),
    _ => return Err(CallError::new(format!("Type '{kind}' is not supported."))),
  };
  Ok(Value::Bool(matches))
}
