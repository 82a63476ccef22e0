pub mod callable;
pub mod environment;
pub mod evaluator;
pub mod natives;
pub mod output;
pub mod value;

pub use callable::{CallFailure, Callable, Function};
pub use environment::{Environment, SharedEnvironment};
pub use evaluator::{Flow, Interpreter};
pub use natives::NativeFunction;
pub use output::OutputBuffer;
pub use value::Value;
