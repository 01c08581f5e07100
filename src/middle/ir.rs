//! bahasa IR definitions
//!
//! Register-based three-address code: functions made of basic blocks,
//! stack slots via `alloca`, explicit terminators.

use std::fmt;

/// IR Module - contains all functions
#[derive(Debug, Clone, PartialEq)]
pub struct IRModule {
    pub name: String,
    pub externs: Vec<IRExtern>,
    pub functions: Vec<IRFunction>,
}

/// External function declaration
#[derive(Debug, Clone, PartialEq)]
pub struct IRExtern {
    pub name: String,
    pub params: Vec<IRType>,
    pub ret_type: IRType,
    pub variadic: bool,
}

impl IRModule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            externs: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn get_function(&self, name: &str) -> Option<&IRFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn get_extern(&self, name: &str) -> Option<&IRExtern> {
        self.externs.iter().find(|e| e.name == name)
    }

    /// Declare an external function once
    pub fn add_extern(&mut self, ext: IRExtern) {
        if self.get_extern(&ext.name).is_none() {
            self.externs.push(ext);
        }
    }
}

/// Where a function definition came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Declared in source
    User,
    /// Synthesized wrapper around an external call
    Builtin,
}

/// IR Function
#[derive(Debug, Clone, PartialEq)]
pub struct IRFunction {
    pub name: String,
    pub params: Vec<(String, IRType)>,
    pub ret_type: IRType,
    pub blocks: Vec<BasicBlock>,
    pub entry_block: BlockId,
    pub kind: FunctionKind,
}

impl IRFunction {
    pub fn new(name: &str, params: Vec<(String, IRType)>, ret_type: IRType, kind: FunctionKind) -> Self {
        Self {
            name: name.to_string(),
            params,
            ret_type,
            blocks: Vec::new(),
            entry_block: BlockId(0),
            kind,
        }
    }

    /// Add a block; repeated labels get a numeric suffix
    pub fn add_block(&mut self, label: &str) -> BlockId {
        let mut unique = label.to_string();
        let mut n = 0;
        while self.blocks.iter().any(|b| b.label == unique) {
            n += 1;
            unique = format!("{}{}", label, n);
        }
        let id = BlockId(self.blocks.len());
        self.blocks.push(BasicBlock::new(id, &unique));
        id
    }

    pub fn get_block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.0)
    }

    pub fn get_block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id.0)
    }
}

/// Basic Block - a sequence of instructions with single entry/exit
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub id: BlockId,
    pub label: String,
    pub instructions: Vec<Instruction>,
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(id: BlockId, label: &str) -> Self {
        Self {
            id,
            label: label.to_string(),
            instructions: Vec::new(),
            terminator: None,
        }
    }

    pub fn push(&mut self, inst: Instruction) {
        self.instructions.push(inst);
    }

    pub fn set_terminator(&mut self, term: Terminator) {
        self.terminator = Some(term);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}

/// Block identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

/// Virtual register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(pub usize);

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// IR Instruction (non-terminating)
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// dest = left op right
    BinOp { dest: Register, op: BinOp, left: Value, right: Value },

    /// dest = op value
    UnaryOp { dest: Register, op: UnaryOp, value: Value },

    /// dest = func(args...)
    Call { dest: Option<Register>, func: String, args: Vec<Value> },

    /// dest = alloca type
    Alloca { dest: Register, ty: IRType },

    /// dest = load ptr
    Load { dest: Register, ptr: Value, ty: IRType },

    /// store value, ptr
    Store { ptr: Value, value: Value },

    /// dest = gep ptr, index
    GetElementPtr { dest: Register, ptr: Value, index: Value, elem_ty: IRType },

    /// dest = zext value to ty
    Cast { dest: Register, value: Value, ty: IRType },
}

impl Instruction {
    /// Register written by this instruction, if any
    pub fn dest(&self) -> Option<Register> {
        match self {
            Instruction::BinOp { dest, .. }
            | Instruction::UnaryOp { dest, .. }
            | Instruction::Alloca { dest, .. }
            | Instruction::Load { dest, .. }
            | Instruction::GetElementPtr { dest, .. }
            | Instruction::Cast { dest, .. } => Some(*dest),
            Instruction::Call { dest, .. } => *dest,
            Instruction::Store { .. } => None,
        }
    }
}

/// Block terminator
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    /// ret value
    Return { value: Value },

    /// br target
    Jump { target: BlockId },

    /// br cond, then_target, else_target
    Branch { cond: Value, then_target: BlockId, else_target: BlockId },
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Return { .. } => Vec::new(),
            Terminator::Jump { target } => vec![*target],
            Terminator::Branch { then_target, else_target, .. } => vec![*then_target, *else_target],
        }
    }
}

/// IR Value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Register(Register),
    Constant(Constant),
    Parameter(usize),
}

impl Value {
    pub fn int(n: i32) -> Self {
        Value::Constant(Constant::Int(i64::from(n)))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Register(r) => write!(f, "{}", r),
            Value::Constant(c) => write!(f, "{}", c),
            Value::Parameter(i) => write!(f, "arg{}", i),
        }
    }
}

/// Constant value
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    /// NUL-terminated string constant, passed as `*i8`
    String(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(n) => write!(f, "{}", n),
            Constant::String(s) => write!(f, "\"{}\"", s.escape_default()),
        }
    }
}

/// Binary operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic (signed)
    Add, Sub, Mul, Div, Mod,
    // Comparison (signed), producing bool
    Eq, Ne, Lt, Le, Gt, Ge,
    // Logical, on bools
    And, Or,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Mod => "mod",
            BinOp::Eq => "eq",
            BinOp::Ne => "ne",
            BinOp::Lt => "lt",
            BinOp::Le => "le",
            BinOp::Gt => "gt",
            BinOp::Ge => "ge",
            BinOp::And => "and",
            BinOp::Or => "or",
        };
        write!(f, "{}", s)
    }
}

/// Unary operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Bitwise complement
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "not"),
        }
    }
}

/// IR Type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IRType {
    Bool,
    I8,
    I32,
    Ptr(Box<IRType>),
    Array(Box<IRType>, usize),
}

impl IRType {
    /// `*i8`, the type of string constants
    pub fn c_str() -> Self {
        IRType::Ptr(Box::new(IRType::I8))
    }

    /// Number of 32-bit words a stack slot of this type occupies
    pub fn size_words(&self) -> usize {
        match self {
            IRType::Array(elem, count) => elem.size_words() * count,
            _ => 1,
        }
    }
}

impl fmt::Display for IRType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IRType::Bool => write!(f, "bool"),
            IRType::I8 => write!(f, "i8"),
            IRType::I32 => write!(f, "i32"),
            IRType::Ptr(inner) => write!(f, "*{}", inner),
            IRType::Array(elem, size) => write!(f, "[{} x {}]", size, elem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_block_labels() {
        let mut func = IRFunction::new("f", Vec::new(), IRType::I32, FunctionKind::User);
        let entry = func.add_block("entry");
        let a = func.add_block("then");
        let b = func.add_block("then");
        let c = func.add_block("then");
        assert_eq!(entry, BlockId(0));
        assert_eq!(func.blocks[a.0].label, "then");
        assert_eq!(func.blocks[b.0].label, "then1");
        assert_eq!(func.blocks[c.0].label, "then2");
    }

    #[test]
    fn test_type_display() {
        assert_eq!(IRType::Array(Box::new(IRType::I32), 3).to_string(), "[3 x i32]");
        assert_eq!(IRType::c_str().to_string(), "*i8");
        assert_eq!(IRType::Array(Box::new(IRType::I32), 4).size_words(), 4);
    }

    #[test]
    fn test_extern_declared_once() {
        let mut module = IRModule::new("m");
        let printf = IRExtern {
            name: "printf".to_string(),
            params: vec![IRType::c_str()],
            ret_type: IRType::I32,
            variadic: true,
        };
        module.add_extern(printf.clone());
        module.add_extern(printf);
        assert_eq!(module.externs.len(), 1);
    }
}
