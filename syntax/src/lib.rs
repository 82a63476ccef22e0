#[macro_use]
extern crate lazy_static;

pub mod lexer;
pub mod parser;
pub mod transformer;

pub use lexer::{scan, scan_source, Scanned};
pub use parser::{parse, Parsed, Parser, MAX_ARITY};
pub use transformer::Transformer;
