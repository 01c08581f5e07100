//! C Code Generator
//!
//! Translates bahasa IR to C99 for compilation with clang/gcc.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write;

use log::debug;

use crate::backend::codegen::CodeGen;
use crate::middle::ir::*;
use crate::utils::Result;

/// Prefix that keeps module functions clear of C keywords and libc symbols
pub const SYMBOL_PREFIX: &str = "bhs_";

/// Checked division helpers; names cannot collide with prefixed symbols
const DIVISION_HELPERS: &str = r#"static int32_t bahasa_div(int32_t a, int32_t b) {
    if (b == 0) { fputs("runtime error: division by zero\n", stderr); exit(1); }
    if (a == INT32_MIN && b == -1) return a;
    return a / b;
}

static int32_t bahasa_mod(int32_t a, int32_t b) {
    if (b == 0) { fputs("runtime error: modulo by zero\n", stderr); exit(1); }
    if (a == INT32_MIN && b == -1) return 0;
    return a % b;
}"#;

/// How a register is declared in C
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Word,
    Pointer,
    /// Pointer into a local storage array of the given length
    Storage(usize),
}

/// C code generator
pub struct CCodeGen {
    output: String,
    indent: usize,
    /// Map from block ID to label name
    block_labels: HashMap<usize, String>,
    /// Functions defined by the module being generated
    functions: HashSet<String>,
}

impl CCodeGen {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
            block_labels: HashMap::new(),
            functions: HashSet::new(),
        }
    }

    /// C name for a callee: module functions get the prefix, except `main`
    fn symbol(&self, name: &str) -> String {
        if name != "main" && self.functions.contains(name) {
            format!("{}{}", SYMBOL_PREFIX, name)
        } else {
            name.to_string()
        }
    }

    /// Write indented line
    fn writeln(&mut self, line: &str) {
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
        self.output.push_str(line);
        self.output.push('\n');
    }

    /// Convert IR type to C type
    fn ir_type_to_c(ty: &IRType) -> String {
        match ty {
            IRType::Bool | IRType::I32 => "int32_t".to_string(),
            IRType::I8 => "char".to_string(),
            IRType::Ptr(inner) if **inner == IRType::I8 => "const char*".to_string(),
            IRType::Ptr(inner) => format!("{}*", Self::ir_type_to_c(inner)),
            IRType::Array(elem, _) => format!("{}*", Self::ir_type_to_c(elem)),
        }
    }

    /// Convert binary operator to C operator
    fn binop_to_c(op: BinOp) -> &'static str {
        match op {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }

    /// Convert value to C expression
    fn value_to_c(val: &Value) -> String {
        match val {
            Value::Register(reg) => format!("_t{}", reg.0),
            Value::Constant(Constant::Int(n)) => int_literal(*n as i32),
            Value::Constant(Constant::String(s)) => format!("\"{}\"", c_escape(s)),
            Value::Parameter(i) => format!("_arg{}", i),
        }
    }

    fn signature(&self, func: &IRFunction, named: bool) -> String {
        let params: Vec<String> = func
            .params
            .iter()
            .enumerate()
            .map(|(i, (_, ty))| {
                let ty = Self::ir_type_to_c(ty);
                if named {
                    format!("{} _arg{}", ty, i)
                } else {
                    ty
                }
            })
            .collect();
        let params = if params.is_empty() { "void".to_string() } else { params.join(", ") };
        format!("{} {}({})", Self::ir_type_to_c(&func.ret_type), self.symbol(&func.name), params)
    }

    /// Collect every register a function writes, with its C declaration kind
    fn collect_slots(func: &IRFunction) -> BTreeMap<Register, Slot> {
        let mut slots = BTreeMap::new();
        for inst in func.blocks.iter().flat_map(|b| &b.instructions) {
            let slot = match inst {
                Instruction::Alloca { ty, .. } => Slot::Storage(ty.size_words().max(1)),
                Instruction::GetElementPtr { .. } => Slot::Pointer,
                _ => Slot::Word,
            };
            if let Some(dest) = inst.dest() {
                slots.insert(dest, slot);
            }
        }
        slots
    }

    /// Generate C code for a function
    fn generate_function(&mut self, func: &IRFunction) -> Result<()> {
        self.block_labels.clear();
        for (i, block) in func.blocks.iter().enumerate() {
            self.block_labels.insert(i, block.label.clone());
        }

        let signature = self.signature(func, true);
        self.writeln(&format!("{} {{", signature));
        self.indent += 1;

        // Declarations are hoisted so labels never precede one
        let slots = Self::collect_slots(func);
        for (reg, slot) in &slots {
            match slot {
                Slot::Word => self.writeln(&format!("int32_t _t{};", reg.0)),
                Slot::Pointer => self.writeln(&format!("int32_t* _t{};", reg.0)),
                Slot::Storage(len) => {
                    self.writeln(&format!("int32_t _s{}[{}] = {{0}};", reg.0, len));
                    self.writeln(&format!("int32_t* _t{};", reg.0));
                }
            }
        }
        if !slots.is_empty() {
            self.writeln("");
        }

        for (i, block) in func.blocks.iter().enumerate() {
            if i > 0 {
                self.indent -= 1;
                self.writeln(&format!("{}:", block.label));
                self.indent += 1;
            }

            for inst in &block.instructions {
                self.generate_instruction(inst)?;
            }

            if let Some(ref term) = block.terminator {
                self.generate_terminator(term)?;
            }
        }

        self.indent -= 1;
        self.writeln("}");
        Ok(())
    }

    /// Generate C code for an instruction
    fn generate_instruction(&mut self, inst: &Instruction) -> Result<()> {
        match inst {
            Instruction::BinOp { dest, op, left, right } => {
                let l = Self::value_to_c(left);
                let r = Self::value_to_c(right);
                let expr = match op {
                    // Two's complement wrap without signed overflow
                    BinOp::Add | BinOp::Sub | BinOp::Mul => format!(
                        "(int32_t)((uint32_t){} {} (uint32_t){})",
                        l,
                        Self::binop_to_c(*op),
                        r
                    ),
                    BinOp::Div => format!("bahasa_div({}, {})", l, r),
                    BinOp::Mod => format!("bahasa_mod({}, {})", l, r),
                    _ => format!("{} {} {}", l, Self::binop_to_c(*op), r),
                };
                self.writeln(&format!("_t{} = {};", dest.0, expr));
            }

            Instruction::UnaryOp { dest, op: UnaryOp::Not, value } => {
                let val = Self::value_to_c(value);
                self.writeln(&format!("_t{} = ~{};", dest.0, val));
            }

            Instruction::Call { dest, func, args } => {
                let args: Vec<String> = args.iter().map(Self::value_to_c).collect();
                let call = format!("{}({})", self.symbol(func), args.join(", "));
                match dest {
                    Some(d) => self.writeln(&format!("_t{} = {};", d.0, call)),
                    None => self.writeln(&format!("{};", call)),
                }
            }

            Instruction::Alloca { dest, .. } => {
                self.writeln(&format!("_t{0} = _s{0};", dest.0));
            }

            Instruction::Load { dest, ptr, .. } => {
                let p = Self::value_to_c(ptr);
                self.writeln(&format!("_t{} = *{};", dest.0, p));
            }

            Instruction::Store { ptr, value } => {
                let p = Self::value_to_c(ptr);
                let val = Self::value_to_c(value);
                self.writeln(&format!("*{} = {};", p, val));
            }

            Instruction::GetElementPtr { dest, ptr, index, .. } => {
                let p = Self::value_to_c(ptr);
                let idx = Self::value_to_c(index);
                self.writeln(&format!("_t{} = {} + {};", dest.0, p, idx));
            }

            Instruction::Cast { dest, value, .. } => {
                let val = Self::value_to_c(value);
                self.writeln(&format!("_t{} = (int32_t)({});", dest.0, val));
            }
        }
        Ok(())
    }

    /// Generate C code for a terminator
    fn generate_terminator(&mut self, term: &Terminator) -> Result<()> {
        match term {
            Terminator::Return { value } => {
                let v = Self::value_to_c(value);
                self.writeln(&format!("return {};", v));
            }

            Terminator::Jump { target } => {
                let label = self.label(*target);
                self.writeln(&format!("goto {};", label));
            }

            Terminator::Branch { cond, then_target, else_target } => {
                let c = Self::value_to_c(cond);
                let then_label = self.label(*then_target);
                let else_label = self.label(*else_target);
                self.writeln(&format!("if ({}) goto {}; else goto {};", c, then_label, else_label));
            }
        }
        Ok(())
    }

    fn label(&self, id: BlockId) -> String {
        self.block_labels
            .get(&id.0)
            .cloned()
            .unwrap_or_else(|| format!("bb{}", id.0))
    }

    /// Generate the complete C source file
    pub fn generate_source(&mut self, module: &IRModule) -> Result<String> {
        self.output.clear();
        self.indent = 0;
        self.functions = module.functions.iter().map(|f| f.name.clone()).collect();
        let checked_division = uses_division(module);

        self.writeln(&format!("/* bahasa module {} */", module.name));
        self.writeln("#include <stdint.h>");
        self.writeln("#include <stdio.h>");
        if checked_division {
            self.writeln("#include <stdlib.h>");
        }
        if module.get_extern("sleep").is_some() {
            self.writeln("#include <unistd.h>");
        }
        self.writeln("");

        // Externs without a system header
        for ext in &module.externs {
            if matches!(ext.name.as_str(), "printf" | "sleep") {
                continue;
            }
            let mut params: Vec<String> = ext.params.iter().map(Self::ir_type_to_c).collect();
            if ext.variadic {
                params.push("...".to_string());
            }
            let params = if params.is_empty() { "void".to_string() } else { params.join(", ") };
            let proto = format!("extern {} {}({});", Self::ir_type_to_c(&ext.ret_type), ext.name, params);
            self.writeln(&proto);
        }

        // Forward declarations
        for func in &module.functions {
            let proto = self.signature(func, false);
            self.writeln(&format!("{};", proto));
        }

        if checked_division {
            self.writeln("");
            for line in DIVISION_HELPERS.lines() {
                self.writeln(line);
            }
        }

        for func in &module.functions {
            self.writeln("");
            self.generate_function(func)?;
        }

        debug!("generated {} bytes of C for `{}`", self.output.len(), module.name);
        Ok(self.output.clone())
    }
}

impl Default for CCodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGen for CCodeGen {
    fn generate(&mut self, module: &IRModule) -> Result<String> {
        self.generate_source(module)
    }

    fn name(&self) -> &str {
        "c"
    }

    fn extension(&self) -> &str {
        "c"
    }
}

fn uses_division(module: &IRModule) -> bool {
    module
        .functions
        .iter()
        .flat_map(|f| &f.blocks)
        .flat_map(|b| &b.instructions)
        .any(|inst| matches!(inst, Instruction::BinOp { op: BinOp::Div | BinOp::Mod, .. }))
}

/// C integer literal; `INT32_MIN` has no direct spelling
fn int_literal(n: i32) -> String {
    if n == i32::MIN {
        "(-2147483647 - 1)".to_string()
    } else {
        n.to_string()
    }
}

/// Escape a string for a C string literal
fn c_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(char::from(byte)),
            _ => {
                let _ = write!(out, "\\{:03o}", byte);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;
    use crate::frontend::parser::parse;
    use crate::middle::ir_gen::IRGenerator;

    fn generate_c(source: &str) -> String {
        let program = parse(tokenize(source).unwrap()).unwrap();
        let module = IRGenerator::new("test").generate(&program).unwrap();
        CCodeGen::new().generate_source(&module).unwrap()
    }

    #[test]
    fn test_function_and_prototype() {
        let c = generate_c("fungsi tambah(a: int, b: int) -> int { <- a + b }");
        assert!(c.contains("int32_t bhs_tambah(int32_t, int32_t);"));
        assert!(c.contains("int32_t bhs_tambah(int32_t _arg0, int32_t _arg1) {"));
        assert!(c.contains("_t0 = (int32_t)((uint32_t)_arg0 + (uint32_t)_arg1);"));
        assert!(c.contains("return _t0;"));
        assert!(!c.contains("unistd.h"));
        assert!(!c.contains("bahasa_div"));
    }

    #[test]
    fn test_builtin_wrappers() {
        let c = generate_c(
            r#"fungsi main() -> int {
                tampilkan("nilai: %d\n", 7)
                tidur(1)
                <- 0
            }"#,
        );
        assert!(c.contains("#include <unistd.h>"));
        assert!(c.contains("int32_t main(void) {"));
        assert!(c.contains("int32_t bhs_tampilkan(const char* _arg0, int32_t _arg1) {"));
        assert!(c.contains("_t0 = printf(_arg0, _arg1);"));
        assert!(c.contains("_t0 = sleep(_arg0);"));
        assert!(c.contains("    bhs_tampilkan(\"nilai: %d\\n\", 7);"));
    }

    #[test]
    fn test_arrays_use_storage() {
        let c = generate_c(
            "fungsi main() -> int {
                mutasi xs: koleksi[int] = [4, 5, 6]
                <- xs.2
            }",
        );
        assert!(c.contains("int32_t _s0[3] = {0};"));
        assert!(c.contains("_t0 = _s0;"));
        assert!(c.contains("int32_t* _t1;"));
        assert!(c.contains(" = _t0 + 2;"));
    }

    #[test]
    fn test_if_uses_goto() {
        let c = generate_c("fungsi f(x: int) -> int { jika x > 1 { <- 1 } <- 0 }");
        assert!(c.contains("if (_t"));
        assert!(c.contains("goto then; else goto ifcont;"));
        assert!(c.contains("then:\n"));
        assert!(c.contains("_t0 = _arg0 > 1;"));
    }

    #[test]
    fn test_function_names_are_prefixed() {
        let c = generate_c(
            "fungsi double(a: int) -> int { <- a * 2 }
             fungsi _t0(a: int) -> int { <- a }
             fungsi main() -> int { <- double(_t0(3)) }",
        );
        assert!(c.contains("int32_t bhs_double(int32_t);"));
        assert!(c.contains("int32_t bhs__t0(int32_t _arg0) {"));
        assert!(c.contains("_t0 = bhs__t0(3);"));
        assert!(c.contains("_t1 = bhs_double(_t0);"));
        assert!(!c.contains(" double("));
    }

    #[test]
    fn test_division_is_checked() {
        let c = generate_c("fungsi f(a: int, b: int) -> int { <- a / b modulo 3 }");
        assert!(c.contains("#include <stdlib.h>"));
        assert!(c.contains("static int32_t bahasa_div(int32_t a, int32_t b) {"));
        assert!(c.contains("if (a == INT32_MIN && b == -1) return a;"));
        assert!(c.contains("_t0 = bahasa_div(_arg0, _arg1);"));
        assert!(c.contains("_t1 = bahasa_mod(_t0, 3);"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(c_escape("a\"b\\c\n"), "a\\\"b\\\\c\\n");
        assert_eq!(c_escape("é"), "\\303\\251");
        assert_eq!(int_literal(i32::MIN), "(-2147483647 - 1)");
    }
}
