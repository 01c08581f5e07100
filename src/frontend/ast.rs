//! Abstract Syntax Tree definitions for bahasa
//!
//! Every node is exclusively owned by its parent; the program owns all
//! top-level declarations.

use serde::Serialize;
use std::fmt;

/// A complete program (one source file)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    /// Name given by `modul <name>`, if any
    pub module_name: Option<String>,
    pub stmts: Vec<Stmt>,
}

impl Program {
    /// Iterate over top-level function declarations
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.stmts.iter().filter_map(|stmt| match stmt {
            Stmt::Function(func) => Some(func),
            _ => None,
        })
    }
}

// ==================== Types ====================

/// Declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Type {
    /// Word-sized signed integer
    Int,
    /// Fixed-size array; size 0 until resolved from the initializer
    Array(Box<Type>, usize),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Array(elem, _) => write!(f, "koleksi[{}]", elem),
        }
    }
}

// ==================== Declarations ====================

/// Function declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret_type: Type,
    pub body: Vec<Stmt>,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

// ==================== Statements ====================

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    /// fungsi name(params) -> int { body }
    Function(Function),

    /// mutasi name: type = init
    VarDecl { name: String, ty: Type, init: Expr },

    /// <- value
    Return(Expr),

    /// jika cond { then_body }
    If { cond: Expr, then_body: Vec<Stmt> },

    /// abaikan { body }
    Try { body: Vec<Stmt> },

    /// Expression statement
    Expr(Expr),
}

// ==================== Expressions ====================

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    /// Integer literal
    Number(i64),

    /// String literal
    Str(String),

    /// Variable reference
    Var(String),

    /// Arithmetic or logical operation
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Comparison
    Comparison {
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary operation
    Unary { op: UnOp, operand: Box<Expr> },

    /// Function call
    Call { callee: String, args: Vec<Expr> },

    /// target = value
    Assign { target: String, value: Box<Expr> },

    /// [a, b, c]
    ArrayLit(Vec<Expr>),

    /// array.N
    Index { array: String, index: Box<Expr> },
}

impl Expr {
    /// Atomic expressions never need parentheses when printed
    pub fn is_atomic(&self) -> bool {
        matches!(
            self,
            Expr::Number(_)
                | Expr::Str(_)
                | Expr::Var(_)
                | Expr::Call { .. }
                | Expr::ArrayLit(_)
                | Expr::Index { .. }
        )
    }
}

/// Arithmetic and logical operators (one precedence tier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "modulo",
            BinOp::And => "dan",
            BinOp::Or => "atau",
        };
        write!(f, "{}", s)
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CmpOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "adalah",
        };
        write!(f, "{}", s)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnOp {
    /// bukan
    Not,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnOp::Not => write!(f, "bukan"),
        }
    }
}
