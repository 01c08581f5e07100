//! IR Generator - AST to bahasa IR
//!
//! Two passes. The first synthesizes builtin wrappers and records every user
//! function's arity so calls may refer forward. The second lowers each body
//! with a fresh [`FunctionContext`].

use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::frontend::ast::{self, BinOp, CmpOp, Expr, Program, Stmt, Type as AstType, UnOp};
use crate::middle::builtins::{self, BuiltinUsage};
use crate::middle::ir::{
    BinOp as IRBinOp, BlockId, Constant, FunctionKind, IRFunction, IRModule, IRType,
    Instruction, Register, Terminator, UnaryOp, Value,
};
use crate::utils::{Error, Result};

/// What a name is bound to inside a function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    /// One-word stack slot
    Slot(Register),
    /// Fixed-size array storage
    Array { ptr: Register, len: usize },
    /// Incoming parameter
    Param(usize),
}

/// Result of lowering an expression
#[derive(Debug, Clone, PartialEq)]
enum Lowered {
    Scalar(Value),
    Aggregate { ptr: Register, len: usize },
    Str(String),
}

/// Progress of one `abaikan` block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TryState {
    /// Lowering the body
    Normal,
    /// A recovered out-of-range access jumped to the error block
    Recovering,
    /// Both paths joined at the continuation block
    Continued,
}

/// The error block exists only once something recovers into it
#[derive(Debug, Clone)]
struct TryFrame {
    error_block: Option<BlockId>,
    state: TryState,
}

impl TryFrame {
    fn transition(&mut self, next: TryState) -> Result<()> {
        let allowed = matches!(
            (self.state, next),
            (TryState::Normal, TryState::Recovering)
                | (TryState::Recovering, TryState::Recovering)
                | (TryState::Normal, TryState::Continued)
                | (TryState::Recovering, TryState::Continued)
        );
        if !allowed {
            return Err(Error::codegen(format!(
                "abaikan block cannot move from {:?} to {:?}",
                self.state, next
            )));
        }
        trace!("abaikan block: {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Per-function lowering state
struct FunctionContext {
    func: IRFunction,
    current_block: BlockId,
    next_register: usize,
    /// Number of allocas already placed at the top of the entry block
    allocas: usize,
    scopes: Vec<HashMap<String, Binding>>,
    try_frames: Vec<TryFrame>,
}

impl FunctionContext {
    fn new(func: IRFunction, entry: BlockId) -> Self {
        Self {
            func,
            current_block: entry,
            next_register: 0,
            allocas: 0,
            scopes: vec![HashMap::new()],
            try_frames: Vec::new(),
        }
    }

    fn alloc_register(&mut self) -> Register {
        let reg = Register(self.next_register);
        self.next_register += 1;
        reg
    }

    fn add_block(&mut self, label: &str) -> BlockId {
        self.func.add_block(label)
    }

    fn switch_to(&mut self, block: BlockId) {
        self.current_block = block;
    }

    fn emit(&mut self, inst: Instruction) {
        if let Some(block) = self.func.get_block_mut(self.current_block) {
            block.push(inst);
        }
    }

    /// Emit an alloca at the top of the entry block, after earlier allocas
    fn emit_alloca(&mut self, ty: IRType) -> Register {
        let dest = self.alloc_register();
        let entry = self.func.entry_block;
        let at = self.allocas;
        if let Some(block) = self.func.get_block_mut(entry) {
            block.instructions.insert(at, Instruction::Alloca { dest, ty });
            self.allocas += 1;
        }
        dest
    }

    fn set_terminator(&mut self, term: Terminator) {
        if let Some(block) = self.func.get_block_mut(self.current_block) {
            if block.terminator.is_none() {
                block.set_terminator(term);
            }
        }
    }

    fn is_terminated(&self) -> bool {
        self.func
            .get_block(self.current_block)
            .map_or(false, |b| b.is_terminated())
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: &str, binding: Binding) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), binding);
        }
    }

    fn lookup(&self, name: &str) -> Option<Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }
}

/// IR Generator
pub struct IRGenerator {
    /// Module being built
    module: IRModule,
    /// Arity of every user function, filled by the declaration pass
    signatures: HashMap<String, usize>,
}

impl IRGenerator {
    pub fn new(module_name: &str) -> Self {
        Self {
            module: IRModule::new(module_name),
            signatures: HashMap::new(),
        }
    }

    /// Generate IR for a program
    pub fn generate(&mut self, program: &Program) -> Result<IRModule> {
        self.declare(program)?;

        for stmt in &program.stmts {
            match stmt {
                Stmt::Function(func) => {
                    let lowered = self.generate_function(func)?;
                    self.module.functions.push(lowered);
                }
                Stmt::VarDecl { name, .. } => {
                    warn!("top-level variable `{}` is not lowered", name);
                }
                other => debug!("ignoring top-level statement {:?}", other),
            }
        }

        verify(&self.module)?;
        debug!(
            "generated module `{}` with {} functions",
            self.module.name,
            self.module.functions.len()
        );
        Ok(self.module.clone())
    }

    // ==================== Pass 1 ====================

    /// Synthesize used builtins and record user function signatures
    fn declare(&mut self, program: &Program) -> Result<()> {
        let usage = BuiltinUsage::scan(program);
        builtins::synthesize(&mut self.module, &usage);
        trace!("builtin usage: {:?}", usage);

        for func in program.functions() {
            if builtins::is_reserved(&func.name) {
                return Err(Error::codegen(format!(
                    "function name `{}` is reserved for a builtin or its runtime target",
                    func.name
                )));
            }
            if self.signatures.insert(func.name.clone(), func.params.len()).is_some() {
                return Err(Error::codegen(format!("duplicate function `{}`", func.name)));
            }
        }
        Ok(())
    }

    // ==================== Pass 2 ====================

    /// Generate IR for a function
    fn generate_function(&self, func: &ast::Function) -> Result<IRFunction> {
        let params = func
            .params
            .iter()
            .map(|p| (p.name.clone(), IRType::I32))
            .collect();
        let mut ir_func = IRFunction::new(&func.name, params, IRType::I32, FunctionKind::User);
        let entry = ir_func.add_block("entry");
        ir_func.entry_block = entry;

        let mut ctx = FunctionContext::new(ir_func, entry);
        for (i, param) in func.params.iter().enumerate() {
            ctx.bind(&param.name, Binding::Param(i));
        }

        self.generate_stmts(&mut ctx, &func.body)?;

        // Falling off the end returns 0
        if !ctx.is_terminated() {
            ctx.set_terminator(Terminator::Return { value: Value::int(0) });
        }

        Ok(ctx.func)
    }

    fn generate_stmts(&self, ctx: &mut FunctionContext, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            if ctx.is_terminated() {
                // Code after a terminator still gets lowered, into a block with no predecessors
                let dead = ctx.add_block("dead");
                ctx.switch_to(dead);
            }
            self.generate_stmt(ctx, stmt)?;
        }
        Ok(())
    }

    /// Generate IR for a statement
    fn generate_stmt(&self, ctx: &mut FunctionContext, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Function(func) => Err(Error::codegen(format!(
                "nested function `{}` is not allowed",
                func.name
            ))),

            Stmt::VarDecl { name, ty, init } => self.generate_var_decl(ctx, name, ty, init),

            Stmt::Return(value) => {
                let value = self.generate_scalar(ctx, value)?;
                ctx.set_terminator(Terminator::Return { value });
                Ok(())
            }

            Stmt::If { cond, then_body } => self.generate_if(ctx, cond, then_body),

            Stmt::Try { body } => self.generate_try(ctx, body),

            Stmt::Expr(Expr::Index { array, index }) if !ctx.try_frames.is_empty() => {
                self.generate_recoverable_index(ctx, array, index)
            }

            Stmt::Expr(expr) => {
                self.generate_expr(ctx, expr)?;
                Ok(())
            }
        }
    }

    fn generate_var_decl(
        &self,
        ctx: &mut FunctionContext,
        name: &str,
        ty: &AstType,
        init: &Expr,
    ) -> Result<()> {
        match (ty, self.generate_expr(ctx, init)?) {
            (AstType::Array(_, declared), Lowered::Aggregate { ptr, len }) => {
                if *declared != 0 && *declared != len {
                    return Err(Error::codegen(format!(
                        "array `{}` declared with {} elements but initialized with {}",
                        name, declared, len
                    )));
                }
                ctx.bind(name, Binding::Array { ptr, len });
            }
            (AstType::Int, Lowered::Scalar(value)) => {
                let slot = ctx.emit_alloca(IRType::I32);
                ctx.emit(Instruction::Store {
                    ptr: Value::Register(slot),
                    value,
                });
                ctx.bind(name, Binding::Slot(slot));
            }
            (AstType::Int, Lowered::Aggregate { .. }) => {
                return Err(Error::codegen(format!(
                    "variable `{}` is declared int but initialized with an array",
                    name
                )));
            }
            (AstType::Array(..), Lowered::Scalar(_)) => {
                return Err(Error::codegen(format!(
                    "variable `{}` is declared koleksi[int] but initialized with a scalar",
                    name
                )));
            }
            (_, Lowered::Str(_)) => {
                return Err(Error::codegen(format!(
                    "variable `{}` cannot hold a string literal",
                    name
                )));
            }
        }
        Ok(())
    }

    fn generate_if(&self, ctx: &mut FunctionContext, cond: &Expr, then_body: &[Stmt]) -> Result<()> {
        let value = self.generate_scalar(ctx, cond)?;
        let flag = ctx.alloc_register();
        ctx.emit(Instruction::BinOp {
            dest: flag,
            op: IRBinOp::Ne,
            left: value,
            right: Value::int(0),
        });

        let then_block = ctx.add_block("then");
        let merge_block = ctx.add_block("ifcont");
        ctx.set_terminator(Terminator::Branch {
            cond: Value::Register(flag),
            then_target: then_block,
            else_target: merge_block,
        });

        ctx.switch_to(then_block);
        ctx.push_scope();
        let lowered = self.generate_stmts(ctx, then_body);
        ctx.pop_scope();
        lowered?;
        ctx.set_terminator(Terminator::Jump { target: merge_block });

        ctx.switch_to(merge_block);
        Ok(())
    }

    fn generate_try(&self, ctx: &mut FunctionContext, body: &[Stmt]) -> Result<()> {
        let try_block = ctx.add_block("try");
        let continue_block = ctx.add_block("try_continue");

        ctx.set_terminator(Terminator::Jump { target: try_block });
        ctx.switch_to(try_block);
        ctx.try_frames.push(TryFrame {
            error_block: None,
            state: TryState::Normal,
        });

        ctx.push_scope();
        let lowered = self.generate_stmts(ctx, body);
        ctx.pop_scope();
        lowered?;
        ctx.set_terminator(Terminator::Jump { target: continue_block });

        let mut frame = ctx
            .try_frames
            .pop()
            .ok_or_else(|| Error::codegen("abaikan block lost its frame"))?;
        // Only a recovered access reaches the error block
        if frame.state == TryState::Recovering {
            if let Some(error_block) = frame.error_block {
                ctx.switch_to(error_block);
                ctx.set_terminator(Terminator::Jump { target: continue_block });
            }
        }
        frame.transition(TryState::Continued)?;

        ctx.switch_to(continue_block);
        Ok(())
    }

    /// `xs.N` as a statement inside `abaikan`: out of range jumps to the
    /// error block instead of failing compilation
    fn generate_recoverable_index(
        &self,
        ctx: &mut FunctionContext,
        array: &str,
        index: &Expr,
    ) -> Result<()> {
        let (_, len) = self.lookup_array(ctx, array)?;
        let n = literal_index(index)?;
        if in_bounds(n, len) {
            self.generate_index(ctx, array, index)?;
            return Ok(());
        }

        debug!("index {} of `{}` (length {}) recovered by abaikan", n, array, len);
        let existing = ctx.try_frames.last().and_then(|frame| frame.error_block);
        let target = match existing {
            Some(block) => block,
            None => ctx.add_block("error"),
        };
        let frame = ctx
            .try_frames
            .last_mut()
            .ok_or_else(|| Error::codegen("recoverable index outside abaikan"))?;
        frame.error_block = Some(target);
        frame.transition(TryState::Recovering)?;
        ctx.set_terminator(Terminator::Jump { target });
        Ok(())
    }

    // ==================== Expressions ====================

    /// Lower an expression that must produce a single word
    fn generate_scalar(&self, ctx: &mut FunctionContext, expr: &Expr) -> Result<Value> {
        match self.generate_expr(ctx, expr)? {
            Lowered::Scalar(value) => Ok(value),
            Lowered::Aggregate { .. } => Err(Error::codegen(
                "array used where an integer is required",
            )),
            Lowered::Str(_) => Err(Error::codegen(
                "string literal is only allowed as a builtin argument",
            )),
        }
    }

    /// Generate IR for an expression
    fn generate_expr(&self, ctx: &mut FunctionContext, expr: &Expr) -> Result<Lowered> {
        match expr {
            Expr::Number(n) => Ok(Lowered::Scalar(Value::int(*n as i32))),

            Expr::Str(s) => Ok(Lowered::Str(s.clone())),

            Expr::Var(name) => match ctx.lookup(name) {
                Some(Binding::Slot(slot)) => {
                    let dest = ctx.alloc_register();
                    ctx.emit(Instruction::Load {
                        dest,
                        ptr: Value::Register(slot),
                        ty: IRType::I32,
                    });
                    Ok(Lowered::Scalar(Value::Register(dest)))
                }
                Some(Binding::Param(i)) => Ok(Lowered::Scalar(Value::Parameter(i))),
                Some(Binding::Array { ptr, len }) => Ok(Lowered::Aggregate { ptr, len }),
                None => Err(Error::codegen(format!("unknown variable `{}`", name))),
            },

            Expr::Binary { op, left, right } => {
                let left = self.generate_scalar(ctx, left)?;
                let right = self.generate_scalar(ctx, right)?;
                let value = match op {
                    BinOp::And => self.generate_logical(ctx, IRBinOp::And, left, right),
                    BinOp::Or => self.generate_logical(ctx, IRBinOp::Or, left, right),
                    arith => {
                        let op = match arith {
                            BinOp::Add => IRBinOp::Add,
                            BinOp::Sub => IRBinOp::Sub,
                            BinOp::Mul => IRBinOp::Mul,
                            BinOp::Div => IRBinOp::Div,
                            _ => IRBinOp::Mod,
                        };
                        emit_binop(ctx, op, left, right)
                    }
                };
                Ok(Lowered::Scalar(value))
            }

            Expr::Comparison { op, left, right } => {
                let left = self.generate_scalar(ctx, left)?;
                let right = self.generate_scalar(ctx, right)?;
                let op = match op {
                    CmpOp::Lt => IRBinOp::Lt,
                    CmpOp::Gt => IRBinOp::Gt,
                    CmpOp::Le => IRBinOp::Le,
                    CmpOp::Ge => IRBinOp::Ge,
                    CmpOp::Eq => IRBinOp::Eq,
                };
                let flag = emit_binop(ctx, op, left, right);
                Ok(Lowered::Scalar(emit_widen(ctx, flag)))
            }

            Expr::Unary { op: UnOp::Not, operand } => {
                let value = self.generate_scalar(ctx, operand)?;
                let dest = ctx.alloc_register();
                ctx.emit(Instruction::UnaryOp {
                    dest,
                    op: UnaryOp::Not,
                    value,
                });
                Ok(Lowered::Scalar(Value::Register(dest)))
            }

            Expr::Call { callee, args } => self.generate_call(ctx, callee, args),

            Expr::Assign { target, value } => {
                let slot = match ctx.lookup(target) {
                    Some(Binding::Slot(slot)) => slot,
                    Some(Binding::Param(_)) => {
                        return Err(Error::codegen(format!(
                            "cannot assign to parameter `{}`",
                            target
                        )))
                    }
                    Some(Binding::Array { .. }) => {
                        return Err(Error::codegen(format!(
                            "cannot assign to array `{}`",
                            target
                        )))
                    }
                    None => {
                        return Err(Error::codegen(format!(
                            "assignment to undeclared variable `{}`",
                            target
                        )))
                    }
                };
                let value = self.generate_scalar(ctx, value)?;
                ctx.emit(Instruction::Store {
                    ptr: Value::Register(slot),
                    value: value.clone(),
                });
                Ok(Lowered::Scalar(value))
            }

            Expr::ArrayLit(elements) => {
                let values = elements
                    .iter()
                    .map(|e| self.generate_scalar(ctx, e))
                    .collect::<Result<Vec<_>>>()?;
                let len = values.len();
                let ptr = ctx.emit_alloca(IRType::Array(Box::new(IRType::I32), len));
                for (i, value) in values.into_iter().enumerate() {
                    let elem = ctx.alloc_register();
                    ctx.emit(Instruction::GetElementPtr {
                        dest: elem,
                        ptr: Value::Register(ptr),
                        index: Value::int(i as i32),
                        elem_ty: IRType::I32,
                    });
                    ctx.emit(Instruction::Store {
                        ptr: Value::Register(elem),
                        value,
                    });
                }
                Ok(Lowered::Aggregate { ptr, len })
            }

            Expr::Index { array, index } => self.generate_index(ctx, array, index),
        }
    }

    /// `dan`/`atau`: both sides normalized to bools, combined, widened
    fn generate_logical(
        &self,
        ctx: &mut FunctionContext,
        op: IRBinOp,
        left: Value,
        right: Value,
    ) -> Value {
        let l = emit_binop(ctx, IRBinOp::Ne, left, Value::int(0));
        let r = emit_binop(ctx, IRBinOp::Ne, right, Value::int(0));
        let combined = emit_binop(ctx, op, l, r);
        emit_widen(ctx, combined)
    }

    fn lookup_array(&self, ctx: &FunctionContext, array: &str) -> Result<(Register, usize)> {
        match ctx.lookup(array) {
            Some(Binding::Array { ptr, len }) => Ok((ptr, len)),
            Some(_) => Err(Error::codegen(format!("`{}` is not an array", array))),
            None => Err(Error::codegen(format!("unknown variable `{}`", array))),
        }
    }

    fn generate_index(&self, ctx: &mut FunctionContext, array: &str, index: &Expr) -> Result<Lowered> {
        let (ptr, len) = self.lookup_array(ctx, array)?;
        let n = literal_index(index)?;
        if !in_bounds(n, len) {
            return Err(Error::codegen(format!(
                "index {} out of bounds for array `{}` of length {}",
                n, array, len
            )));
        }

        let elem = ctx.alloc_register();
        ctx.emit(Instruction::GetElementPtr {
            dest: elem,
            ptr: Value::Register(ptr),
            index: Value::int(n as i32),
            elem_ty: IRType::I32,
        });
        let dest = ctx.alloc_register();
        ctx.emit(Instruction::Load {
            dest,
            ptr: Value::Register(elem),
            ty: IRType::I32,
        });
        Ok(Lowered::Scalar(Value::Register(dest)))
    }

    fn generate_call(&self, ctx: &mut FunctionContext, callee: &str, args: &[Expr]) -> Result<Lowered> {
        match callee {
            builtins::DISPLAY => {
                if args.len() < 2 {
                    return Err(Error::codegen(format!(
                        "`tampilkan` needs a format string and a value, got {} arguments",
                        args.len()
                    )));
                }
                let format = match &args[0] {
                    Expr::Str(s) => Value::Constant(Constant::String(s.clone())),
                    _ => {
                        return Err(Error::codegen(
                            "first argument of `tampilkan` must be a string literal",
                        ))
                    }
                };
                if args.len() > 2 {
                    debug!("ignoring {} extra arguments to tampilkan", args.len() - 2);
                }
                let (wrapper, value) = match self.generate_expr(ctx, &args[1])? {
                    Lowered::Str(s) => (builtins::DISPLAY_TEXT, Value::Constant(Constant::String(s))),
                    Lowered::Scalar(v) => (builtins::DISPLAY, v),
                    Lowered::Aggregate { .. } => {
                        return Err(Error::codegen("`tampilkan` cannot display an array"))
                    }
                };
                ctx.emit(Instruction::Call {
                    dest: None,
                    func: wrapper.to_string(),
                    args: vec![format, value],
                });
                Ok(Lowered::Scalar(Value::int(0)))
            }

            builtins::PAUSE => {
                let seconds = match args.first() {
                    Some(arg) => self.generate_scalar(ctx, arg)?,
                    None => return Err(Error::codegen("`tidur` needs a duration argument")),
                };
                if args.len() > 1 {
                    debug!("ignoring {} extra arguments to tidur", args.len() - 1);
                }
                ctx.emit(Instruction::Call {
                    dest: None,
                    func: builtins::PAUSE.to_string(),
                    args: vec![seconds],
                });
                Ok(Lowered::Scalar(Value::int(0)))
            }

            _ => {
                let arity = match self.signatures.get(callee) {
                    Some(arity) => *arity,
                    None => return Err(Error::codegen(format!("unknown function `{}`", callee))),
                };
                if arity != args.len() {
                    return Err(Error::codegen(format!(
                        "function `{}` expects {} arguments, got {}",
                        callee,
                        arity,
                        args.len()
                    )));
                }
                let args = args
                    .iter()
                    .map(|arg| self.generate_scalar(ctx, arg))
                    .collect::<Result<Vec<_>>>()?;
                let dest = ctx.alloc_register();
                ctx.emit(Instruction::Call {
                    dest: Some(dest),
                    func: callee.to_string(),
                    args,
                });
                Ok(Lowered::Scalar(Value::Register(dest)))
            }
        }
    }
}

fn emit_binop(ctx: &mut FunctionContext, op: IRBinOp, left: Value, right: Value) -> Value {
    let dest = ctx.alloc_register();
    ctx.emit(Instruction::BinOp { dest, op, left, right });
    Value::Register(dest)
}

/// Zero-extend a bool to a word
fn emit_widen(ctx: &mut FunctionContext, value: Value) -> Value {
    let dest = ctx.alloc_register();
    ctx.emit(Instruction::Cast {
        dest,
        value,
        ty: IRType::I32,
    });
    Value::Register(dest)
}

fn literal_index(index: &Expr) -> Result<i64> {
    match index {
        Expr::Number(n) => Ok(*n),
        _ => Err(Error::codegen("array index must be a number literal")),
    }
}

fn in_bounds(index: i64, len: usize) -> bool {
    usize::try_from(index).map_or(false, |i| i < len)
}

/// Function and extern names must not clash, and every block must end in a
/// terminator that targets an existing block
pub fn verify(module: &IRModule) -> Result<()> {
    for func in &module.functions {
        if module.get_extern(&func.name).is_some() {
            return Err(Error::codegen(format!(
                "function `{}` clashes with an external declaration",
                func.name
            )));
        }
        for block in &func.blocks {
            let term = block.terminator.as_ref().ok_or_else(|| {
                Error::codegen(format!(
                    "block `{}` in function `{}` has no terminator",
                    block.label, func.name
                ))
            })?;
            if let Some(target) = term.successors().into_iter().find(|t| t.0 >= func.blocks.len()) {
                return Err(Error::codegen(format!(
                    "block `{}` in function `{}` jumps to missing block {}",
                    block.label, func.name, target.0
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;
    use crate::frontend::parser::parse;
    use crate::middle::ir::BasicBlock;
    use pretty_assertions::assert_eq;

    fn generate(source: &str) -> Result<IRModule> {
        let program = parse(tokenize(source)?)?;
        IRGenerator::new("test").generate(&program)
    }

    fn function<'a>(module: &'a IRModule, name: &str) -> &'a IRFunction {
        module.get_function(name).unwrap()
    }

    fn block<'a>(func: &'a IRFunction, label: &str) -> &'a BasicBlock {
        func.blocks.iter().find(|b| b.label == label).unwrap()
    }

    fn codegen_message(source: &str) -> String {
        match generate(source) {
            Err(Error::Codegen { message }) => message,
            other => panic!("expected codegen error, got {:?}", other),
        }
    }

    #[test]
    fn test_return_sum() {
        let module = generate("fungsi tambah(a: int, b: int) -> int { <- a + b }").unwrap();
        let func = function(&module, "tambah");
        assert_eq!(func.kind, FunctionKind::User);
        assert_eq!(func.params.len(), 2);
        let entry = &func.blocks[0];
        assert_eq!(
            entry.instructions,
            vec![Instruction::BinOp {
                dest: Register(0),
                op: IRBinOp::Add,
                left: Value::Parameter(0),
                right: Value::Parameter(1),
            }]
        );
        assert_eq!(
            entry.terminator,
            Some(Terminator::Return { value: Value::Register(Register(0)) })
        );
    }

    #[test]
    fn test_forward_and_mutual_calls() {
        let module = generate(
            "fungsi a(n: int) -> int { <- b(n) }
             fungsi b(n: int) -> int { jika n > 0 { <- a(n - 1) } <- 0 }",
        )
        .unwrap();
        assert!(module.get_function("a").is_some());
        assert!(module.get_function("b").is_some());
    }

    #[test]
    fn test_display_call_site() {
        let module = generate(
            r#"modul demo
            fungsi tambah(a: int, b: int) -> int { <- a + b }
            fungsi main() -> int {
                mutasi hasil: int = tambah(2, 3)
                tampilkan("%d", hasil)
                <- 0
            }"#,
        )
        .unwrap();
        let wrapper = function(&module, "tampilkan");
        assert_eq!(wrapper.kind, FunctionKind::Builtin);
        assert!(module.get_extern("printf").is_some());

        let main = function(&module, "main");
        let call = main.blocks[0]
            .instructions
            .iter()
            .find(|i| matches!(i, Instruction::Call { func, .. } if func == "tampilkan"))
            .unwrap();
        match call {
            Instruction::Call { args, .. } => {
                assert_eq!(args[0], Value::Constant(Constant::String("%d".to_string())));
                assert!(matches!(args[1], Value::Register(_)));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_var_decl_uses_entry_allocas() {
        let module = generate(
            "fungsi f() -> int {
                mutasi x: int = 1
                jika x { mutasi y: int = 2 }
                <- x
            }",
        )
        .unwrap();
        let func = function(&module, "f");
        let entry = &func.blocks[0];
        assert!(matches!(entry.instructions[0], Instruction::Alloca { ty: IRType::I32, .. }));
        assert!(matches!(entry.instructions[1], Instruction::Alloca { ty: IRType::I32, .. }));
        let then = block(func, "then");
        assert!(!then.instructions.iter().any(|i| matches!(i, Instruction::Alloca { .. })));
    }

    #[test]
    fn test_if_blocks() {
        let module = generate("fungsi f(x: int) -> int { jika x > 1 { <- 1 } <- 0 }").unwrap();
        let func = function(&module, "f");
        let labels: Vec<&str> = func.blocks.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["entry", "then", "ifcont"]);
        assert!(matches!(
            func.blocks[0].terminator,
            Some(Terminator::Branch { then_target: BlockId(1), else_target: BlockId(2), .. })
        ));
        assert_eq!(
            func.blocks[2].terminator,
            Some(Terminator::Return { value: Value::int(0) })
        );
    }

    #[test]
    fn test_if_scope_ends_with_block() {
        let message = codegen_message("fungsi f() -> int { jika 1 { mutasi y: int = 2 } <- y }");
        assert_eq!(message, "unknown variable `y`");
    }

    #[test]
    fn test_shadowing_is_allowed() {
        assert!(generate("fungsi f(x: int) -> int { mutasi x: int = x + 1 <- x }").is_ok());
    }

    #[test]
    fn test_implicit_return_zero() {
        let module = generate("fungsi f() -> int { tidur(0) }").unwrap();
        let func = function(&module, "f");
        assert_eq!(
            func.blocks.last().unwrap().terminator,
            Some(Terminator::Return { value: Value::int(0) })
        );
    }

    #[test]
    fn test_code_after_return_goes_to_dead_block() {
        let module = generate("fungsi f() -> int { <- 1 <- 2 }").unwrap();
        let func = function(&module, "f");
        assert_eq!(func.blocks.len(), 2);
        assert_eq!(func.blocks[1].label, "dead");
        assert!(func.blocks.iter().all(|b| b.is_terminated()));
    }

    #[test]
    fn test_array_literal_and_index() {
        let module = generate("fungsi f() -> int { mutasi xs: koleksi[int] = [4, 5, 6] <- xs.2 }").unwrap();
        let func = function(&module, "f");
        let entry = &func.blocks[0];
        assert!(matches!(
            entry.instructions[0],
            Instruction::Alloca { ty: IRType::Array(_, 3), .. }
        ));
        let geps = entry
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::GetElementPtr { .. }))
            .count();
        assert_eq!(geps, 4);
    }

    #[test]
    fn test_out_of_range_index_is_fatal() {
        let message = codegen_message("fungsi f() -> int { mutasi xs: koleksi[int] = [1, 2] <- xs.2 }");
        assert!(message.contains("out of bounds"));
    }

    #[test]
    fn test_out_of_range_index_recovered_in_abaikan() {
        let module = generate(
            "fungsi f() -> int {
                mutasi xs: koleksi[int] = [1, 2, 3]
                abaikan { xs.5 tidur(1) }
                <- 7
            }",
        )
        .unwrap();
        let func = function(&module, "f");
        let labels: Vec<&str> = func.blocks.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["entry", "try", "try_continue", "error", "dead"]);

        let try_block = block(func, "try");
        assert_eq!(try_block.terminator, Some(Terminator::Jump { target: BlockId(3) }));
        let error = block(func, "error");
        assert_eq!(error.terminator, Some(Terminator::Jump { target: BlockId(2) }));
        let dead = block(func, "dead");
        assert_eq!(dead.terminator, Some(Terminator::Jump { target: BlockId(2) }));
        assert_eq!(
            block(func, "try_continue").terminator,
            Some(Terminator::Return { value: Value::int(7) })
        );
    }

    #[test]
    fn test_abaikan_without_recovery_has_no_error_block() {
        let module = generate("fungsi f() -> int { abaikan { tidur(1) } <- 0 }").unwrap();
        let labels: Vec<&str> = function(&module, "f").blocks.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["entry", "try", "try_continue"]);
    }

    #[test]
    fn test_repeated_recovery_shares_error_block() {
        let module = generate(
            "fungsi f() -> int {
                mutasi xs: koleksi[int] = [1]
                abaikan { jika 1 { xs.4 } xs.9 }
                <- 0
            }",
        )
        .unwrap();
        let func = function(&module, "f");
        let errors = func.blocks.iter().filter(|b| b.label.starts_with("error")).count();
        assert_eq!(errors, 1);
        let error_id = block(func, "error").id;
        let jumps = func
            .blocks
            .iter()
            .filter(|b| b.terminator == Some(Terminator::Jump { target: error_id }))
            .count();
        assert_eq!(jumps, 2);
    }

    #[test]
    fn test_try_state_transitions() {
        let mut frame = TryFrame { error_block: None, state: TryState::Normal };
        assert!(frame.transition(TryState::Recovering).is_ok());
        assert!(frame.transition(TryState::Recovering).is_ok());
        assert!(frame.transition(TryState::Continued).is_ok());
        assert!(frame.transition(TryState::Recovering).is_err());
        assert!(frame.transition(TryState::Normal).is_err());
    }

    #[test]
    fn test_verify_rejects_function_named_like_extern() {
        let mut module = IRModule::new("m");
        builtins::synthesize(&mut module, &BuiltinUsage { display: true, display_text: false, pause: false });
        let mut func = IRFunction::new("printf", Vec::new(), IRType::I32, FunctionKind::User);
        let entry = func.add_block("entry");
        if let Some(block) = func.get_block_mut(entry) {
            block.set_terminator(Terminator::Return { value: Value::int(0) });
        }
        module.functions.push(func);
        let err = verify(&module).unwrap_err();
        assert_eq!(
            err,
            Error::codegen("function `printf` clashes with an external declaration")
        );
    }

    #[test]
    fn test_out_of_range_in_abaikan_expression_is_fatal() {
        let message = codegen_message(
            "fungsi f() -> int { mutasi xs: koleksi[int] = [1] abaikan { mutasi y: int = xs.3 } <- 0 }",
        );
        assert!(message.contains("out of bounds"));
    }

    #[test]
    fn test_logical_ops_widen() {
        let module = generate("fungsi f(a: int, b: int) -> int { <- a dan b }").unwrap();
        let ops: Vec<String> = function(&module, "f").blocks[0]
            .instructions
            .iter()
            .map(|i| match i {
                Instruction::BinOp { op, .. } => op.to_string(),
                Instruction::Cast { .. } => "zext".to_string(),
                other => format!("{:?}", other),
            })
            .collect();
        assert_eq!(ops, vec!["ne", "ne", "and", "zext"]);
    }

    #[test]
    fn test_codegen_errors() {
        assert_eq!(codegen_message("fungsi f() -> int { <- g() }"), "unknown function `g`");
        assert_eq!(
            codegen_message("fungsi g(a: int) -> int { <- a } fungsi f() -> int { <- g() }"),
            "function `g` expects 1 arguments, got 0"
        );
        assert_eq!(
            codegen_message("fungsi f() -> int { <- 0 } fungsi f() -> int { <- 1 }"),
            "duplicate function `f`"
        );
        assert!(codegen_message("fungsi tidur(a: int) -> int { <- a }").contains("reserved"));
        assert!(codegen_message(
            r#"fungsi printf(a: int) -> int { <- a } fungsi main() -> int { tampilkan("%d\n", 4) <- 0 }"#
        )
        .contains("`printf` is reserved"));
        assert!(codegen_message("fungsi sleep(a: int) -> int { <- a }").contains("`sleep` is reserved"));
        assert_eq!(
            codegen_message("fungsi f(a: int) -> int { a = 1 }"),
            "cannot assign to parameter `a`"
        );
        assert!(codegen_message(r#"fungsi f() -> int { <- "s" }"#).contains("string literal"));
        assert!(codegen_message(r#"fungsi f() -> int { tampilkan(1, 2) }"#).contains("string literal"));
        assert!(codegen_message(r#"fungsi f() -> int { tampilkan("x") }"#).contains("format"));
        assert!(codegen_message("fungsi f() -> int { tidur() }").contains("duration"));
        assert!(codegen_message("fungsi f() -> int { mutasi x: int = [1] }").contains("declared int"));
        assert!(codegen_message("fungsi f() -> int { mutasi x: int = 1 <- x.0 }").contains("not an array"));
    }

    #[test]
    fn test_display_string_argument_uses_text_wrapper() {
        let module = generate(r#"fungsi f() -> int { tampilkan("%s\n", "halo") <- 0 }"#).unwrap();
        assert!(module.get_function("tampilkan_teks").is_some());
        assert!(module.get_function("tampilkan").is_none());
    }

    #[test]
    fn test_top_level_var_is_not_lowered() {
        let module = generate("mutasi g: int = 1 fungsi f() -> int { <- 0 }").unwrap();
        assert_eq!(module.functions.len(), 1);
    }
}
