//! bahasa - a compiler for a small Indonesian-keyword language
//!
//! Source text is tokenized, parsed into an AST and lowered to a
//! register-based IR. The IR can be printed, evaluated in process or
//! emitted as C and linked into a native executable.

pub mod backend;
pub mod frontend;
pub mod middle;
pub mod utils;

pub use utils::{Error, Result};

use frontend::ast::Program;
use middle::ir::IRModule;
use middle::ir_gen::IRGenerator;

/// Tokenize and parse source text
pub fn parse_source(source: &str) -> Result<Program> {
    let tokens = frontend::lexer::tokenize(source)?;
    frontend::parser::parse(tokens)
}

/// Compile source text to an IR module
///
/// The module takes the declared `modul` name, falling back to
/// `default_name` when the program has none.
pub fn compile_source(source: &str, default_name: &str) -> Result<IRModule> {
    let program = parse_source(source)?;
    let name = program.module_name.clone().unwrap_or_else(|| default_name.to_string());
    IRGenerator::new(&name).generate(&program)
}
