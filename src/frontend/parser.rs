//! Parser for bahasa
//!
//! Recursive descent parser. Expression precedence, lowest first:
//! assignment, comparison, one flat arithmetic/logical tier, unary, primary.

use log::debug;

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result};

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Create a new parser from a lexer
    pub fn new(mut lexer: Lexer) -> Result<Self> {
        Ok(Self::from_tokens(lexer.tokenize()?))
    }

    /// Create a parser from pre-tokenized input
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        let ends_with_eof = matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof);
        if !ends_with_eof {
            let line = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token::eof(line));
        }
        Self { tokens, pos: 0 }
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        // from_tokens guarantees a trailing Eof, so the index is always valid
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(Error::parse(message, self.current().line))
    }

    fn expect(&mut self, expected: TokenKind, context: &str) -> Result<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            self.error(format!(
                "expected '{}' {}, found {}",
                expected,
                context,
                self.current_kind()
            ))
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_ident(&mut self, context: &str) -> Result<String> {
        match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => self.error(format!("expected identifier {}, found {}", context, other)),
        }
    }

    // ==================== Parsing Methods ====================

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        let module_name = if self.consume(&TokenKind::Modul) {
            Some(self.parse_ident("after 'modul'")?)
        } else {
            None
        };

        let mut stmts = Vec::new();
        while !self.is_at_end() {
            match self.current_kind() {
                TokenKind::Fungsi => stmts.push(Stmt::Function(self.parse_function()?)),
                TokenKind::Mutasi => stmts.push(self.parse_var_decl()?),
                _ => {
                    let skipped = self.advance();
                    debug!("line {}: skipping top-level token {}", skipped.line, skipped.kind);
                }
            }
        }

        Ok(Program { module_name, stmts })
    }

    /// Parse a function definition
    fn parse_function(&mut self) -> Result<Function> {
        self.expect(TokenKind::Fungsi, "to start a function")?;
        let name = self.parse_ident("for function name")?;

        self.expect(TokenKind::LParen, "after function name")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen, "after parameters")?;

        self.expect(TokenKind::Arrow, "after parameters")?;
        self.expect(TokenKind::Int, "as return type")?;

        let body = self.parse_block("function body")?;

        Ok(Function {
            name,
            params,
            ret_type: Type::Int,
            body,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        let mut params = Vec::new();

        if self.check(&TokenKind::RParen) {
            return Ok(params);
        }

        loop {
            let name = self.parse_ident("for parameter name")?;
            self.expect(TokenKind::Colon, "after parameter name")?;
            self.expect(TokenKind::Int, "as parameter type")?;
            params.push(Param { name, ty: Type::Int });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }

        Ok(params)
    }

    /// Parse `{ stmt* }`; function, `jika` and `abaikan` bodies share it
    fn parse_block(&mut self, what: &str) -> Result<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, &format!("before {}", what))?;

        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_stmt()?);
        }

        self.expect(TokenKind::RBrace, &format!("after {}", what))?;
        Ok(stmts)
    }

    /// Parse a statement
    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.current_kind() {
            TokenKind::BackArrow => {
                self.advance();
                Ok(Stmt::Return(self.parse_expr()?))
            }
            TokenKind::Mutasi => self.parse_var_decl(),
            TokenKind::Jika => {
                self.advance();
                let cond = self.parse_expr()?;
                let then_body = self.parse_block("'jika' body")?;
                Ok(Stmt::If { cond, then_body })
            }
            TokenKind::Abaikan => {
                self.advance();
                let body = self.parse_block("'abaikan' body")?;
                Ok(Stmt::Try { body })
            }
            _ => Ok(Stmt::Expr(self.parse_expr()?)),
        }
    }

    fn parse_var_decl(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::Mutasi, "to start a declaration")?;
        let name = self.parse_ident("after 'mutasi'")?;
        self.expect(TokenKind::Colon, "after variable name")?;
        let ty = self.parse_type()?;
        self.expect(TokenKind::Assign, "after variable type")?;
        let init = self.parse_expr()?;
        Ok(Stmt::VarDecl { name, ty, init })
    }

    fn parse_type(&mut self) -> Result<Type> {
        if self.consume(&TokenKind::Koleksi) {
            self.expect(TokenKind::LBracket, "after 'koleksi'")?;
            self.expect(TokenKind::Int, "as element type")?;
            self.expect(TokenKind::RBracket, "after element type")?;
            // Size is resolved from the initializer during code generation
            return Ok(Type::Array(Box::new(Type::Int), 0));
        }
        self.expect(TokenKind::Int, "as variable type")?;
        Ok(Type::Int)
    }

    // ==================== Expressions ====================

    /// Parse an expression
    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        let line = self.current().line;
        let expr = self.parse_comparison()?;

        if self.consume(&TokenKind::Assign) {
            let target = match expr {
                Expr::Var(name) => name,
                _ => return Err(Error::parse("invalid assignment target", line)),
            };
            let value = self.parse_assignment()?;
            return Ok(Expr::Assign {
                target,
                value: Box::new(value),
            });
        }

        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut expr = self.parse_binary()?;

        while let Some(op) = Self::token_to_cmpop(self.current_kind()) {
            self.advance();
            let right = self.parse_binary()?;
            expr = Expr::Comparison {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// All arithmetic and logical operators share one left-associative tier
    fn parse_binary(&mut self) -> Result<Expr> {
        let mut expr = self.parse_unary()?;

        while let Some(op) = Self::token_to_binop(self.current_kind()) {
            self.advance();
            let right = self.parse_unary()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.consume(&TokenKind::Bukan) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.current_kind().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.consume(&TokenKind::LParen) {
                    let args = self.parse_list(&TokenKind::RParen)?;
                    self.expect(TokenKind::RParen, "after arguments")?;
                    return Ok(Expr::Call { callee: name, args });
                }
                if self.consume(&TokenKind::Dot) {
                    return self.parse_index(name);
                }
                Ok(Expr::Var(name))
            }
            TokenKind::LBracket => {
                self.advance();
                let elements = self.parse_list(&TokenKind::RBracket)?;
                self.expect(TokenKind::RBracket, "after array elements")?;
                Ok(Expr::ArrayLit(elements))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "after expression")?;
                Ok(expr)
            }
            other => self.error(format!("expected expression, found {}", other)),
        }
    }

    /// Comma-separated expressions up to (not including) `close`
    fn parse_list(&mut self, close: &TokenKind) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        if self.check(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expr()?);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn parse_index(&mut self, array: String) -> Result<Expr> {
        match self.current_kind() {
            TokenKind::Number(n) => {
                let index = *n;
                self.advance();
                Ok(Expr::Index {
                    array,
                    index: Box::new(Expr::Number(index)),
                })
            }
            _ => self.error("array index must be a number literal"),
        }
    }

    fn token_to_binop(kind: &TokenKind) -> Option<BinOp> {
        match kind {
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Sub),
            TokenKind::Star => Some(BinOp::Mul),
            TokenKind::Slash => Some(BinOp::Div),
            TokenKind::Modulo => Some(BinOp::Mod),
            TokenKind::Dan => Some(BinOp::And),
            TokenKind::Atau => Some(BinOp::Or),
            _ => None,
        }
    }

    fn token_to_cmpop(kind: &TokenKind) -> Option<CmpOp> {
        match kind {
            TokenKind::Lt => Some(CmpOp::Lt),
            TokenKind::Gt => Some(CmpOp::Gt),
            TokenKind::Le => Some(CmpOp::Le),
            TokenKind::Ge => Some(CmpOp::Ge),
            TokenKind::Adalah => Some(CmpOp::Eq),
            _ => None,
        }
    }
}

/// Convenience function to parse a token stream
pub fn parse(tokens: Vec<Token>) -> Result<Program> {
    Parser::from_tokens(tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Result<Program> {
        let mut parser = Parser::new(Lexer::new(source))?;
        parser.parse_program()
    }

    fn parse_expr(source: &str) -> Expr {
        let mut parser = Parser::new(Lexer::new(source)).unwrap();
        parser.parse_expr().unwrap()
    }

    fn num(n: i64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    #[test]
    fn test_empty_function() {
        let program = parse("fungsi utama() -> int {}").unwrap();
        assert_eq!(program.stmts.len(), 1);
        assert_eq!(program.module_name, None);
    }

    #[test]
    fn test_module_and_function() {
        let program = parse("modul demo\nfungsi tambah(a: int, b: int) -> int { <- a + b }").unwrap();
        assert_eq!(program.module_name.as_deref(), Some("demo"));
        assert_eq!(
            program.stmts[0],
            Stmt::Function(Function {
                name: "tambah".to_string(),
                params: vec![
                    Param { name: "a".to_string(), ty: Type::Int },
                    Param { name: "b".to_string(), ty: Type::Int },
                ],
                ret_type: Type::Int,
                body: vec![Stmt::Return(Expr::Binary {
                    op: BinOp::Add,
                    left: Box::new(Expr::Var("a".to_string())),
                    right: Box::new(Expr::Var("b".to_string())),
                })],
            })
        );
    }

    #[test]
    fn test_flat_binary_tier() {
        // 1 + 2 * 3 is (1 + 2) * 3
        assert_eq!(
            parse_expr("1 + 2 * 3"),
            Expr::Binary {
                op: BinOp::Mul,
                left: Box::new(Expr::Binary {
                    op: BinOp::Add,
                    left: num(1),
                    right: num(2),
                }),
                right: num(3),
            }
        );
    }

    #[test]
    fn test_comparison_binds_looser_than_arithmetic() {
        assert_eq!(
            parse_expr("1 + 2 < 4 adalah 1"),
            Expr::Comparison {
                op: CmpOp::Eq,
                left: Box::new(Expr::Comparison {
                    op: CmpOp::Lt,
                    left: Box::new(Expr::Binary {
                        op: BinOp::Add,
                        left: num(1),
                        right: num(2),
                    }),
                    right: num(4),
                }),
                right: num(1),
            }
        );
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(
            parse_expr("a = b = 3"),
            Expr::Assign {
                target: "a".to_string(),
                value: Box::new(Expr::Assign {
                    target: "b".to_string(),
                    value: num(3),
                }),
            }
        );
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse("fungsi f() -> int {\n 1 + 2 = 3 }").unwrap_err();
        assert_eq!(err, Error::parse("invalid assignment target", 2));
    }

    #[test]
    fn test_unary_bukan() {
        assert_eq!(
            parse_expr("bukan bukan 0"),
            Expr::Unary {
                op: UnOp::Not,
                operand: Box::new(Expr::Unary { op: UnOp::Not, operand: num(0) }),
            }
        );
    }

    #[test]
    fn test_call_index_and_array() {
        assert_eq!(
            parse_expr("f(xs.2, [1, 2], \"s\")"),
            Expr::Call {
                callee: "f".to_string(),
                args: vec![
                    Expr::Index { array: "xs".to_string(), index: num(2) },
                    Expr::ArrayLit(vec![Expr::Number(1), Expr::Number(2)]),
                    Expr::Str("s".to_string()),
                ],
            }
        );
    }

    #[test]
    fn test_index_requires_literal() {
        let err = parse("fungsi f() -> int { xs.i }").unwrap_err();
        assert_eq!(err, Error::parse("array index must be a number literal", 1));
    }

    #[test]
    fn test_statements() {
        let program = parse(
            "fungsi f(x: int) -> int {
                mutasi xs: koleksi[int] = [1, 2, 3]
                jika x > 0 { <- 1 }
                abaikan { xs.5 }
                <- 0
            }",
        )
        .unwrap();
        let func = program.functions().next().unwrap();
        assert_eq!(func.body.len(), 4);
        assert!(matches!(
            func.body[0],
            Stmt::VarDecl { ty: Type::Array(_, 0), .. }
        ));
        assert!(matches!(func.body[1], Stmt::If { ref then_body, .. } if then_body.len() == 1));
        assert!(matches!(func.body[2], Stmt::Try { ref body } if body.len() == 1));
        assert!(matches!(func.body[3], Stmt::Return(Expr::Number(0))));
    }

    #[test]
    fn test_nested_jika_inside_abaikan() {
        let program = parse("fungsi f() -> int { abaikan { jika 1 { tidur(1) } } <- 0 }").unwrap();
        let func = program.functions().next().unwrap();
        assert!(matches!(func.body[0], Stmt::Try { ref body } if matches!(body[0], Stmt::If { .. })));
    }

    #[test]
    fn test_top_level_recovery() {
        let program = parse("modul m ) 42 mutasi g: int = 1 fungsi f() -> int { <- g }").unwrap();
        assert_eq!(program.stmts.len(), 2);
        assert!(matches!(program.stmts[0], Stmt::VarDecl { .. }));
    }

    #[test]
    fn test_error_reports_offending_line() {
        let err = parse("fungsi f() -> int {\n\n  mutasi x: int = 5 ( }").unwrap_err();
        assert_eq!(err.line(), Some(3));
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_missing_return_type() {
        let err = parse("fungsi f() { }").unwrap_err();
        assert!(err.to_string().contains("'->'"));
    }
}
