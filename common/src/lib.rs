pub mod ast;
pub mod error;
pub mod stack;
pub mod token;

pub use ast::{Expr, FunctionDecl, Literal, Stmt};
pub use error::{CallError, LexError, ParseError, RuntimeError};
pub use token::{Token, TokenKind};
