//! Middle-end module - IR, lowering and evaluation

pub mod builtins;
pub mod eval;
pub mod ir;
pub mod ir_gen;
pub mod ir_printer;
