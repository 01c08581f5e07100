//! AST printers
//!
//! `print_tree` renders a debugging tree; `to_source` renders source text
//! that parses back to the same tree.

use crate::frontend::ast::*;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";

/// Tree printer for the AST
pub struct AstPrinter {
    output: String,
}

impl AstPrinter {
    pub fn new() -> Self {
        Self { output: String::new() }
    }

    /// Print a program as an indented tree
    pub fn print_program(&mut self, program: &Program) -> String {
        self.output.clear();
        match &program.module_name {
            Some(name) => self.output.push_str(&format!("Module: {}\n", name)),
            None => self.output.push_str("Program\n"),
        }
        let count = program.stmts.len();
        for (i, stmt) in program.stmts.iter().enumerate() {
            self.print_stmt(stmt, "", i + 1 == count);
        }
        self.output.clone()
    }

    fn branch(&mut self, text: &str, prefix: &str, is_last: bool) {
        self.output.push_str(prefix);
        self.output.push_str(if is_last { LAST_BRANCH } else { BRANCH });
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn child_prefix(prefix: &str, is_last: bool) -> String {
        format!("{}{}", prefix, if is_last { "    " } else { "│   " })
    }

    fn print_body(&mut self, body: &[Stmt], prefix: &str) {
        for (i, stmt) in body.iter().enumerate() {
            self.print_stmt(stmt, prefix, i + 1 == body.len());
        }
    }

    fn print_stmt(&mut self, stmt: &Stmt, prefix: &str, is_last: bool) {
        let inner = Self::child_prefix(prefix, is_last);
        match stmt {
            Stmt::Function(func) => {
                self.branch(&format!("Function: {}", func.name), prefix, is_last);
                let total = func.params.len() + func.body.len();
                for (i, param) in func.params.iter().enumerate() {
                    let text = format!("Parameter: {}: {}", param.name, param.ty);
                    self.branch(&text, &inner, i + 1 == total);
                }
                for (i, stmt) in func.body.iter().enumerate() {
                    self.print_stmt(stmt, &inner, func.params.len() + i + 1 == total);
                }
            }
            Stmt::VarDecl { name, ty, init } => {
                self.branch(&format!("VarDecl: {}: {}", name, ty), prefix, is_last);
                self.print_expr(init, &inner, true);
            }
            Stmt::Return(value) => {
                self.branch("Return", prefix, is_last);
                self.print_expr(value, &inner, true);
            }
            Stmt::If { cond, then_body } => {
                self.branch("If", prefix, is_last);
                self.print_expr(cond, &inner, then_body.is_empty());
                self.print_body(then_body, &inner);
            }
            Stmt::Try { body } => {
                self.branch("Try", prefix, is_last);
                self.print_body(body, &inner);
            }
            Stmt::Expr(expr) => self.print_expr(expr, prefix, is_last),
        }
    }

    fn print_expr(&mut self, expr: &Expr, prefix: &str, is_last: bool) {
        let inner = Self::child_prefix(prefix, is_last);
        match expr {
            Expr::Number(n) => self.branch(&format!("Number: {}", n), prefix, is_last),
            Expr::Str(s) => self.branch(&format!("String: \"{}\"", escape(s)), prefix, is_last),
            Expr::Var(name) => self.branch(&format!("Variable: {}", name), prefix, is_last),
            Expr::Binary { op, left, right } => {
                self.branch(&format!("Binary: {}", op), prefix, is_last);
                self.print_expr(left, &inner, false);
                self.print_expr(right, &inner, true);
            }
            Expr::Comparison { op, left, right } => {
                self.branch(&format!("Comparison: {}", op), prefix, is_last);
                self.print_expr(left, &inner, false);
                self.print_expr(right, &inner, true);
            }
            Expr::Unary { op, operand } => {
                self.branch(&format!("Unary: {}", op), prefix, is_last);
                self.print_expr(operand, &inner, true);
            }
            Expr::Call { callee, args } => {
                self.branch(&format!("Call: {}", callee), prefix, is_last);
                for (i, arg) in args.iter().enumerate() {
                    self.print_expr(arg, &inner, i + 1 == args.len());
                }
            }
            Expr::Assign { target, value } => {
                self.branch(&format!("Assign: {}", target), prefix, is_last);
                self.print_expr(value, &inner, true);
            }
            Expr::ArrayLit(elements) => {
                self.branch("Array", prefix, is_last);
                for (i, element) in elements.iter().enumerate() {
                    self.print_expr(element, &inner, i + 1 == elements.len());
                }
            }
            Expr::Index { array, index } => {
                self.branch(&format!("Index: {}", array), prefix, is_last);
                self.print_expr(index, &inner, true);
            }
        }
    }
}

impl Default for AstPrinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to print a program tree
pub fn print_tree(program: &Program) -> String {
    AstPrinter::new().print_program(program)
}

// ==================== Source form ====================

/// Render a program back to source text
pub fn to_source(program: &Program) -> String {
    let mut out = String::new();
    if let Some(name) = &program.module_name {
        out.push_str(&format!("modul {}\n\n", name));
    }
    for stmt in &program.stmts {
        write_stmt(&mut out, stmt, 0);
    }
    out
}

fn write_body(out: &mut String, body: &[Stmt], depth: usize) {
    out.push_str("{\n");
    for stmt in body {
        write_stmt(out, stmt, depth + 1);
    }
    out.push_str(&"    ".repeat(depth));
    out.push_str("}\n");
}

fn write_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    out.push_str(&"    ".repeat(depth));
    match stmt {
        Stmt::Function(func) => {
            let params: Vec<String> = func
                .params
                .iter()
                .map(|p| format!("{}: {}", p.name, p.ty))
                .collect();
            out.push_str(&format!(
                "fungsi {}({}) -> {} ",
                func.name,
                params.join(", "),
                func.ret_type
            ));
            write_body(out, &func.body, depth);
        }
        Stmt::VarDecl { name, ty, init } => {
            out.push_str(&format!("mutasi {}: {} = {}\n", name, ty, expr_source(init)));
        }
        Stmt::Return(value) => out.push_str(&format!("<- {}\n", expr_source(value))),
        Stmt::If { cond, then_body } => {
            out.push_str(&format!("jika {} ", expr_source(cond)));
            write_body(out, then_body, depth);
        }
        Stmt::Try { body } => {
            out.push_str("abaikan ");
            write_body(out, body, depth);
        }
        Stmt::Expr(expr) => {
            out.push_str(&expr_source(expr));
            out.push('\n');
        }
    }
}

fn parens(expr: &Expr, needed: bool) -> String {
    if needed {
        format!("({})", expr_source(expr))
    } else {
        expr_source(expr)
    }
}

/// Render an expression; operands only get parentheses where the
/// grammar would otherwise regroup them
pub fn expr_source(expr: &Expr) -> String {
    match expr {
        // Wrapped values lex back to the same bits
        Expr::Number(n) => format!("{}", *n as u64),
        Expr::Str(s) => format!("\"{}\"", escape(s)),
        Expr::Var(name) => name.clone(),
        Expr::Binary { op, left, right } => {
            let left_parens = matches!(**left, Expr::Comparison { .. } | Expr::Assign { .. });
            let right_parens = !right.is_atomic() && !matches!(**right, Expr::Unary { .. });
            format!("{} {} {}", parens(left, left_parens), op, parens(right, right_parens))
        }
        Expr::Comparison { op, left, right } => {
            let left_parens = matches!(**left, Expr::Assign { .. });
            let right_parens = matches!(**right, Expr::Comparison { .. } | Expr::Assign { .. });
            format!("{} {} {}", parens(left, left_parens), op, parens(right, right_parens))
        }
        Expr::Unary { op, operand } => {
            let needed = !operand.is_atomic() && !matches!(**operand, Expr::Unary { .. });
            format!("{} {}", op, parens(operand, needed))
        }
        Expr::Call { callee, args } => {
            let args: Vec<String> = args.iter().map(expr_source).collect();
            format!("{}({})", callee, args.join(", "))
        }
        Expr::Assign { target, value } => format!("{} = {}", target, expr_source(value)),
        Expr::ArrayLit(elements) => {
            let elements: Vec<String> = elements.iter().map(expr_source).collect();
            format!("[{}]", elements.join(", "))
        }
        Expr::Index { array, index } => format!("{}.{}", array, expr_source(index)),
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;
    use crate::frontend::parser::parse;
    use pretty_assertions::assert_eq;

    fn parse_source(source: &str) -> Program {
        parse(tokenize(source).unwrap()).unwrap()
    }

    fn assert_idempotent(source: &str) {
        let first = parse_source(source);
        let printed = to_source(&first);
        let second = parse_source(&printed);
        assert_eq!(first, second, "printed source:\n{}", printed);
    }

    #[test]
    fn test_tree_output() {
        let program = parse_source("modul demo fungsi tambah(a: int, b: int) -> int { <- a + b }");
        let tree = print_tree(&program);
        let expected = "\
Module: demo
└── Function: tambah
    ├── Parameter: a: int
    ├── Parameter: b: int
    └── Return
        └── Binary: +
            ├── Variable: a
            └── Variable: b
";
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_tree_nested_blocks() {
        let program = parse_source("fungsi f() -> int { abaikan { jika 1 adalah 1 { tidur(1) } } <- 0 }");
        let tree = print_tree(&program);
        assert!(tree.contains("Try"));
        assert!(tree.contains("Comparison: adalah"));
        assert!(tree.contains("Call: tidur"));
    }

    #[test]
    fn test_source_round_trip() {
        assert_idempotent(
            r#"modul demo
            mutasi g: int = 3
            fungsi tambah(a: int, b: int) -> int { <- a + b * 2 }
            fungsi utama() -> int {
                mutasi xs: koleksi[int] = [1, 2 + 3, tambah(1, 2)]
                mutasi hasil: int = tambah(xs.0, xs.2)
                hasil = hasil modulo 7 atau bukan (1 - 2)
                jika hasil >= 2 adalah 1 { <- (hasil < 3) + 1 }
                abaikan { xs.9 tampilkan("nilai %d\n", hasil) }
                <- a = b = 4 < (5 < 6)
            }"#,
        );
    }

    #[test]
    fn test_parenthesized_right_operand() {
        let program = parse_source("fungsi f() -> int { <- 1 - (2 - 3) }");
        let printed = to_source(&program);
        assert!(printed.contains("<- 1 - (2 - 3)"));
        assert_eq!(parse_source(&printed), program);
    }

    #[test]
    fn test_wrapped_number_round_trip() {
        assert_idempotent("fungsi f() -> int { <- 18446744073709551615 }");
    }
}
