//! Token definitions for bahasa

use serde::Serialize;
use std::fmt;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text of the token
    pub lexeme: String,
    /// 1-based source line
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize) -> Self {
        Self { kind, lexeme: lexeme.into(), line }
    }

    pub fn eof(line: usize) -> Self {
        Self { kind: TokenKind::Eof, lexeme: String::new(), line }
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenKind {
    // ============ Keywords ============
    /// fungsi
    Fungsi,
    /// int
    Int,
    /// mutasi
    Mutasi,
    /// jika
    Jika,
    /// modul
    Modul,
    /// modulo
    Modulo,
    /// adalah (equality)
    Adalah,
    /// dan
    Dan,
    /// atau
    Atau,
    /// abaikan (error-suppressing block)
    Abaikan,
    /// koleksi (array type)
    Koleksi,
    /// bukan (logical negate)
    Bukan,

    // ============ Literals ============
    /// Integer literal
    Number(i64),
    /// String literal, escapes already resolved
    Str(String),
    /// Identifier
    Ident(String),

    // ============ Operators ============
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// =
    Assign,
    /// <
    Lt,
    /// <=
    Le,
    /// >
    Gt,
    /// >=
    Ge,
    /// -> (return type)
    Arrow,
    /// <- (return statement)
    BackArrow,

    // ============ Delimiters ============
    /// (
    LParen,
    /// )
    RParen,
    /// {
    LBrace,
    /// }
    RBrace,
    /// [
    LBracket,
    /// ]
    RBracket,
    /// ,
    Comma,
    /// :
    Colon,
    /// . (array index)
    Dot,

    // ============ Special ============
    /// End of file
    Eof,
}

impl TokenKind {
    /// Check if this token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Fungsi
                | TokenKind::Int
                | TokenKind::Mutasi
                | TokenKind::Jika
                | TokenKind::Modul
                | TokenKind::Modulo
                | TokenKind::Adalah
                | TokenKind::Dan
                | TokenKind::Atau
                | TokenKind::Abaikan
                | TokenKind::Koleksi
                | TokenKind::Bukan
        )
    }

    /// Try to convert an identifier to a keyword
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        match s {
            "fungsi" => Some(TokenKind::Fungsi),
            "int" => Some(TokenKind::Int),
            "mutasi" => Some(TokenKind::Mutasi),
            "jika" => Some(TokenKind::Jika),
            "modul" => Some(TokenKind::Modul),
            "modulo" => Some(TokenKind::Modulo),
            "adalah" => Some(TokenKind::Adalah),
            "dan" => Some(TokenKind::Dan),
            "atau" => Some(TokenKind::Atau),
            "abaikan" => Some(TokenKind::Abaikan),
            "koleksi" => Some(TokenKind::Koleksi),
            "bukan" => Some(TokenKind::Bukan),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Fungsi => "fungsi",
            TokenKind::Int => "int",
            TokenKind::Mutasi => "mutasi",
            TokenKind::Jika => "jika",
            TokenKind::Modul => "modul",
            TokenKind::Modulo => "modulo",
            TokenKind::Adalah => "adalah",
            TokenKind::Dan => "dan",
            TokenKind::Atau => "atau",
            TokenKind::Abaikan => "abaikan",
            TokenKind::Koleksi => "koleksi",
            TokenKind::Bukan => "bukan",
            TokenKind::Number(n) => return write!(f, "number {}", n),
            TokenKind::Str(_) => "string literal",
            TokenKind::Ident(name) => return write!(f, "identifier `{}`", name),
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Assign => "=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Arrow => "->",
            TokenKind::BackArrow => "<-",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::Eof => "end of input",
        };
        write!(f, "{}", s)
    }
}
