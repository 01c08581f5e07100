//! IR Printer - Serialize bahasa IR to text
//!
//! One extern line per external declaration, then every function with its
//! labelled blocks. Jump targets are printed by label.

use std::fmt::{self, Write};

use crate::backend::codegen::CodeGen;
use crate::middle::ir::*;
use crate::utils::Result;

/// Pretty printer for bahasa IR
pub struct IRPrinter {
    output: String,
}

impl IRPrinter {
    pub fn new() -> Self {
        Self { output: String::new() }
    }

    /// Print an IR module to string
    pub fn print_module(&mut self, module: &IRModule) -> String {
        self.output.clear();
        // Writing into a String cannot fail
        let _ = self.write_module(module);
        self.output.clone()
    }

    fn write_module(&mut self, module: &IRModule) -> fmt::Result {
        writeln!(self.output, "; Module: {}", module.name)?;
        writeln!(self.output, "; Functions: {}", module.functions.len())?;

        if !module.externs.is_empty() {
            writeln!(self.output)?;
        }
        for ext in &module.externs {
            let mut params: Vec<String> = ext.params.iter().map(|t| t.to_string()).collect();
            if ext.variadic {
                params.push("...".to_string());
            }
            writeln!(self.output, "extern fn {}({}) -> {}", ext.name, params.join(", "), ext.ret_type)?;
        }

        for func in &module.functions {
            writeln!(self.output)?;
            self.write_function(func)?;
        }
        Ok(())
    }

    /// Print a function
    fn write_function(&mut self, func: &IRFunction) -> fmt::Result {
        if func.kind == FunctionKind::Builtin {
            writeln!(self.output, "; builtin")?;
        }
        let params: Vec<String> = func
            .params
            .iter()
            .map(|(name, ty)| format!("{}: {}", name, ty))
            .collect();
        writeln!(self.output, "fn {}({}) -> {} {{", func.name, params.join(", "), func.ret_type)?;

        for block in &func.blocks {
            writeln!(self.output, "  {}:", block.label)?;
            for inst in &block.instructions {
                write!(self.output, "    ")?;
                self.write_instruction(inst)?;
                writeln!(self.output)?;
            }
            if let Some(term) = &block.terminator {
                write!(self.output, "    ")?;
                self.write_terminator(func, term)?;
                writeln!(self.output)?;
            }
        }

        writeln!(self.output, "}}")
    }

    /// Print an instruction
    fn write_instruction(&mut self, inst: &Instruction) -> fmt::Result {
        match inst {
            Instruction::BinOp { dest, op, left, right } => {
                write!(self.output, "{} = {} {}, {}", dest, op, left, right)
            }
            Instruction::UnaryOp { dest, op, value } => {
                write!(self.output, "{} = {} {}", dest, op, value)
            }
            Instruction::Call { dest, func, args } => {
                if let Some(d) = dest {
                    write!(self.output, "{} = ", d)?;
                }
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(self.output, "call {}({})", func, args.join(", "))
            }
            Instruction::Alloca { dest, ty } => write!(self.output, "{} = alloca {}", dest, ty),
            Instruction::Load { dest, ptr, .. } => write!(self.output, "{} = load {}", dest, ptr),
            Instruction::Store { ptr, value } => write!(self.output, "store {}, {}", value, ptr),
            Instruction::GetElementPtr { dest, ptr, index, .. } => {
                write!(self.output, "{} = gep {}, {}", dest, ptr, index)
            }
            Instruction::Cast { dest, value, ty } => {
                write!(self.output, "{} = zext {} to {}", dest, value, ty)
            }
        }
    }

    /// Print a terminator
    fn write_terminator(&mut self, func: &IRFunction, term: &Terminator) -> fmt::Result {
        let label = |id: &BlockId| {
            func.get_block(*id)
                .map_or_else(|| format!("bb{}", id.0), |b| b.label.clone())
        };
        match term {
            Terminator::Return { value } => write!(self.output, "ret {}", value),
            Terminator::Jump { target } => write!(self.output, "br {}", label(target)),
            Terminator::Branch { cond, then_target, else_target } => write!(
                self.output,
                "br {}, {}, {}",
                cond,
                label(then_target),
                label(else_target)
            ),
        }
    }
}

impl Default for IRPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGen for IRPrinter {
    fn generate(&mut self, module: &IRModule) -> Result<String> {
        Ok(self.print_module(module))
    }

    fn name(&self) -> &str {
        "ir"
    }

    fn extension(&self) -> &str {
        "ir"
    }
}

/// Convenience function to print a module
pub fn print_ir(module: &IRModule) -> String {
    IRPrinter::new().print_module(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;
    use crate::frontend::parser::parse;
    use crate::middle::ir_gen::IRGenerator;
    use pretty_assertions::assert_eq;

    fn compile_and_print(source: &str) -> String {
        let program = parse(tokenize(source).unwrap()).unwrap();
        let mut gen = IRGenerator::new("test");
        let module = gen.generate(&program).unwrap();
        print_ir(&module)
    }

    #[test]
    fn test_print_function() {
        let ir = compile_and_print("fungsi tambah(a: int, b: int) -> int { <- a + b }");
        let expected = "\
; Module: test
; Functions: 1

fn tambah(a: i32, b: i32) -> i32 {
  entry:
    %0 = add arg0, arg1
    ret %0
}
";
        assert_eq!(ir, expected);
    }

    #[test]
    fn test_print_display_program() {
        let ir = compile_and_print(
            r#"fungsi tambah(a: int, b: int) -> int { <- a + b }
            fungsi main() -> int {
                mutasi hasil: int = tambah(2, 3)
                tampilkan("%d\n", hasil)
                <- 0
            }"#,
        );
        assert!(ir.contains("extern fn printf(*i8, ...) -> i32"));
        assert!(ir.contains("; builtin\nfn tampilkan(format: *i8, nilai: i32) -> i32 {"));
        assert!(ir.contains("%0 = call printf(arg0, arg1)"));
        assert!(ir.contains("%0 = call tambah(2, 3)"));
        assert!(ir.contains("%1 = alloca i32"));
        assert!(ir.contains("store %0, %1"));
        assert!(ir.contains("%2 = load %1"));
        assert!(ir.contains("call tampilkan(\"%d\\n\", %2)"));
    }

    #[test]
    fn test_print_if_and_array() {
        let ir = compile_and_print(
            "fungsi f(x: int) -> int {
                mutasi xs: koleksi[int] = [1, 2]
                jika x adalah xs.1 { <- bukan x }
                <- 0
            }",
        );
        assert!(ir.contains("alloca [2 x i32]"));
        assert!(ir.contains("gep %0, 1"));
        assert!(ir.contains("zext"));
        assert!(ir.contains("br %"));
        assert!(ir.contains(", then, ifcont"));
        assert!(ir.contains("= not arg0"));
    }
}
