//! Backend module - Code generation and linking

pub mod codegen;

// C Backend
pub mod c;

pub mod linker;

pub use c::CCodeGen;
pub use codegen::CodeGen;
pub use linker::Linker;
