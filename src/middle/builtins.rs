//! Built-in functions
//!
//! `tampilkan` and `tidur` are recognized by name. Their definitions are
//! synthesized as thin wrappers around `printf` and `sleep`, and only when
//! a program calls them.

use crate::frontend::ast::{Expr, Program, Stmt};
use crate::middle::ir::*;

/// Display builtin, integer argument
pub const DISPLAY: &str = "tampilkan";
/// Display builtin, string argument
pub const DISPLAY_TEXT: &str = "tampilkan_teks";
/// Pause builtin
pub const PAUSE: &str = "tidur";
/// External target of the display wrappers
pub const PRINTF: &str = "printf";
/// External target of the pause wrapper
pub const SLEEP: &str = "sleep";

/// A builtin wrapper definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// tampilkan(format: *i8, value: i32)
    Display,
    /// tampilkan_teks(format: *i8, value: *i8)
    DisplayText,
    /// tidur(seconds: i32)
    Pause,
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Display => DISPLAY,
            Builtin::DisplayText => DISPLAY_TEXT,
            Builtin::Pause => PAUSE,
        }
    }

    /// External function the wrapper forwards to
    pub fn target(&self) -> IRExtern {
        match self {
            Builtin::Display | Builtin::DisplayText => IRExtern {
                name: PRINTF.to_string(),
                params: vec![IRType::c_str()],
                ret_type: IRType::I32,
                variadic: true,
            },
            Builtin::Pause => IRExtern {
                name: SLEEP.to_string(),
                params: vec![IRType::I32],
                ret_type: IRType::I32,
                variadic: false,
            },
        }
    }

    fn params(&self) -> Vec<(String, IRType)> {
        match self {
            Builtin::Display => vec![
                ("format".to_string(), IRType::c_str()),
                ("nilai".to_string(), IRType::I32),
            ],
            Builtin::DisplayText => vec![
                ("format".to_string(), IRType::c_str()),
                ("teks".to_string(), IRType::c_str()),
            ],
            Builtin::Pause => vec![("detik".to_string(), IRType::I32)],
        }
    }

    /// Build the wrapper: forward every parameter, return 0
    pub fn definition(&self) -> IRFunction {
        let params = self.params();
        let args = (0..params.len()).map(Value::Parameter).collect();
        let mut func = IRFunction::new(self.name(), params, IRType::I32, FunctionKind::Builtin);
        let entry = func.add_block("entry");
        func.entry_block = entry;
        if let Some(block) = func.get_block_mut(entry) {
            block.push(Instruction::Call {
                dest: Some(Register(0)),
                func: self.target().name,
                args,
            });
            block.set_terminator(Terminator::Return { value: Value::int(0) });
        }
        func
    }
}

/// Names a user function may not take: the wrappers and their externs
pub fn is_reserved(name: &str) -> bool {
    matches!(name, DISPLAY | DISPLAY_TEXT | PAUSE | PRINTF | SLEEP)
}

/// Which builtin wrappers a program needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltinUsage {
    pub display: bool,
    pub display_text: bool,
    pub pause: bool,
}

impl BuiltinUsage {
    /// Scan every function body, including nested blocks and expressions
    pub fn scan(program: &Program) -> Self {
        let mut usage = Self::default();
        for func in program.functions() {
            usage.scan_stmts(&func.body);
        }
        usage
    }

    /// Wrappers to synthesize, in a stable order
    pub fn used(&self) -> Vec<Builtin> {
        let mut used = Vec::new();
        if self.display {
            used.push(Builtin::Display);
        }
        if self.display_text {
            used.push(Builtin::DisplayText);
        }
        if self.pause {
            used.push(Builtin::Pause);
        }
        used
    }

    fn scan_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Function(func) => self.scan_stmts(&func.body),
                Stmt::VarDecl { init, .. } => self.scan_expr(init),
                Stmt::Return(value) | Stmt::Expr(value) => self.scan_expr(value),
                Stmt::If { cond, then_body } => {
                    self.scan_expr(cond);
                    self.scan_stmts(then_body);
                }
                Stmt::Try { body } => self.scan_stmts(body),
            }
        }
    }

    fn scan_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Number(_) | Expr::Str(_) | Expr::Var(_) => {}
            Expr::Binary { left, right, .. } | Expr::Comparison { left, right, .. } => {
                self.scan_expr(left);
                self.scan_expr(right);
            }
            Expr::Unary { operand, .. } => self.scan_expr(operand),
            Expr::Call { callee, args } => {
                match callee.as_str() {
                    DISPLAY => {
                        if matches!(args.get(1), Some(Expr::Str(_))) {
                            self.display_text = true;
                        } else {
                            self.display = true;
                        }
                    }
                    PAUSE => self.pause = true,
                    _ => {}
                }
                for arg in args {
                    self.scan_expr(arg);
                }
            }
            Expr::Assign { value, .. } => self.scan_expr(value),
            Expr::ArrayLit(elements) => {
                for element in elements {
                    self.scan_expr(element);
                }
            }
            Expr::Index { index, .. } => self.scan_expr(index),
        }
    }
}

/// Add the wrappers and their external targets to a module
pub fn synthesize(module: &mut IRModule, usage: &BuiltinUsage) {
    for builtin in usage.used() {
        module.add_extern(builtin.target());
        module.functions.push(builtin.definition());
    }
}
