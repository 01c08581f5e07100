//! Lexer for bahasa
//!
//! Converts source code into a stream of tokens.

use log::{trace, warn};

use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result};

/// The lexer state
pub struct Lexer {
    /// Source code as characters
    source: Vec<char>,
    /// Current position in source
    pos: usize,
    /// Start position of current token
    start: usize,
    /// Current line (1-based)
    line: usize,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            start: 0,
            line: 1,
        }
    }

    /// Get the current character without advancing
    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    /// Get the next character without advancing
    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    /// Advance to the next character, counting lines
    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c == Some('\n') {
            self.line += 1;
        }
        self.pos += 1;
        c
    }

    /// Check if we've reached the end of input
    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn lexeme(&self) -> String {
        self.source[self.start..self.pos.min(self.source.len())].iter().collect()
    }

    /// Create a token spanning start to current position
    fn make_token(&self, kind: TokenKind, line: usize) -> Token {
        Token::new(kind, self.lexeme(), line)
    }

    /// Skip whitespace and `--` line comments
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '-' if self.peek_next() == Some('-') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text = self.lexeme();
        let kind = TokenKind::keyword_from_str(&text).unwrap_or(TokenKind::Ident(text));
        self.make_token(kind, self.line)
    }

    /// Read a decimal integer literal; overflow wraps
    fn read_number(&mut self) -> Token {
        let mut value: i64 = 0;
        while let Some(c) = self.peek() {
            match c.to_digit(10) {
                Some(d) => {
                    value = value.wrapping_mul(10).wrapping_add(i64::from(d));
                    self.advance();
                }
                None => break,
            }
        }
        self.make_token(TokenKind::Number(value), self.line)
    }

    /// Read a string literal
    fn read_string(&mut self) -> Result<Token> {
        let open_line = self.line;
        self.advance(); // consume opening quote

        let mut value = String::new();

        loop {
            match self.peek() {
                None => return Err(Error::lex("unterminated string", open_line)),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.peek() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        None => return Err(Error::lex("unterminated string", open_line)),
                        Some(_) => {
                            return Err(Error::lex("invalid escape sequence", self.line))
                        }
                    };
                    value.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        Ok(self.make_token(TokenKind::Str(value), open_line))
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            self.skip_whitespace();
            self.start = self.pos;

            let c = match self.peek() {
                Some(c) => c,
                None => return Ok(Token::eof(self.line)),
            };

            if c.is_ascii_alphabetic() || c == '_' {
                return Ok(self.read_identifier());
            }

            if c.is_ascii_digit() {
                return Ok(self.read_number());
            }

            if c == '"' {
                return self.read_string();
            }

            self.advance();
            let kind = match c {
                '+' => TokenKind::Plus,
                '-' => {
                    if self.peek() == Some('>') {
                        self.advance();
                        TokenKind::Arrow
                    } else {
                        TokenKind::Minus
                    }
                }
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '=' => TokenKind::Assign,
                '<' => {
                    if self.peek() == Some('-') {
                        self.advance();
                        TokenKind::BackArrow
                    } else if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::Le
                    } else {
                        TokenKind::Lt
                    }
                }
                '>' => {
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                ',' => TokenKind::Comma,
                ':' => TokenKind::Colon,
                '.' => TokenKind::Dot,
                other => {
                    warn!("line {}: skipping unexpected character {:?}", self.line, other);
                    continue;
                }
            };

            return Ok(self.make_token(kind, self.line));
        }
    }

    /// Tokenize the entire source and return all tokens
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        trace!("lexed {} tokens", tokens.len());
        Ok(tokens)
    }
}

/// Convenience function to tokenize a source string
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).tokenize()
}
