//! C Backend - Generate C code from bahasa IR
//!
//! Output is plain C99 that any hosted C compiler accepts.

mod c_codegen;

pub use c_codegen::CCodeGen;
