//! rscope_parser: Scanner and recursive descent parser.
//!
//! Covers the statement and expression forms that matter for scope analysis
//! and builds an arena-allocated AST.

mod parser;
mod scanner;

pub use parser::{ParseResult, Parser};
pub use scanner::Scanner;
