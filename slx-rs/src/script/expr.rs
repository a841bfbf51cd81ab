//! Lexer, expression AST, and expression parser.
//!
//! The lexer turns source into a flat token stream in which indentation is
//! already resolved into `Indent`/`Dedent` tokens and logical line ends into
//! `Newline`.  Inside brackets, line breaks and indentation are ignored.
//!
//! Operator precedence (lowest → highest):
//!   lambda  →  conditional  →  or  →  and  →  not  →  comparison  →
//!   additive  →  multiplicative  →  unary  →  postfix  →  primary

use std::rc::Rc;

use num_bigint::BigInt;

use super::value::Value;
use crate::error::{Error, Result};

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Int(BigInt),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Ident(String),

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,

    // Comparison
    Eq, // ==
    Ne, // !=
    Lt,
    Le,
    Gt,
    Ge,

    // Assignment
    Assign,      // =
    PlusAssign,  // +=
    MinusAssign, // -=
    StarAssign,  // *=

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semi,
    Dot,

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

const KEYWORDS: &[&str] = &[
    "and", "break", "continue", "def", "elif", "else", "for", "if", "in", "lambda", "not", "or",
    "pass", "return", "None", "True", "False",
];

pub(crate) fn syntax(file: &str, line: usize, message: impl Into<String>) -> Error {
    Error::Syntax {
        file: file.to_string(),
        line,
        message: message.into(),
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

pub(crate) struct Lexer<'a> {
    file: &'a str,
    src: Vec<char>,
    pos: usize,
    line: usize,
    /// Open bracket count; layout tokens are suppressed while non-zero.
    depth: usize,
    indents: Vec<usize>,
    at_line_start: bool,
    tokens: Vec<(Token, usize)>,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(file: &'a str, src: &str) -> Self {
        Lexer {
            file,
            src: src.chars().collect(),
            pos: 0,
            line: 1,
            depth: 0,
            indents: vec![0],
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        syntax(self.file, self.line, message)
    }

    fn push(&mut self, tok: Token) {
        self.tokens.push((tok, self.line));
    }

    fn end_line(&mut self) {
        if !matches!(self.tokens.last(), None | Some((Token::Newline, _))) {
            self.push(Token::Newline);
        }
    }

    /// Measure the indentation of a new line and emit layout tokens.
    /// Returns `false` for blank and comment-only lines.
    fn indentation(&mut self) -> Result<bool> {
        let mut width = 0;
        while let Some(c) = self.peek() {
            match c {
                ' ' => width += 1,
                '\t' => width += 8 - width % 8,
                '\r' => {}
                _ => break,
            }
            self.pos += 1;
        }
        if matches!(self.peek(), None | Some('\n' | '#')) {
            return Ok(false);
        }
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(Token::Indent);
        } else {
            while width < self.indents.last().copied().unwrap_or(0) {
                self.indents.pop();
                self.push(Token::Dedent);
            }
            if width != self.indents.last().copied().unwrap_or(0) {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(true)
    }

    fn read_number(&mut self, first: char) -> Result<Token> {
        let mut s = String::from(first);
        if first == '0' && matches!(self.peek(), Some('x' | 'X')) {
            self.pos += 1;
            let mut hex = String::new();
            while let Some(c) = self.peek().filter(char::is_ascii_hexdigit) {
                hex.push(c);
                self.pos += 1;
            }
            return BigInt::parse_bytes(hex.as_bytes(), 16)
                .map(Token::Int)
                .ok_or_else(|| self.error("invalid hex literal"));
        }

        let mut is_float = first == '.';
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {}
                '.' if !is_float => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    s.push(c);
                    self.pos += 1;
                    if let Some(sign @ ('+' | '-')) = self.peek() {
                        s.push(sign);
                        self.pos += 1;
                    }
                    continue;
                }
                _ => break,
            }
            if c != '_' {
                s.push(c);
            }
            self.pos += 1;
        }

        if is_float {
            s.parse()
                .map(Token::Float)
                .map_err(|_| self.error(format!("invalid float literal {s}")))
        } else {
            BigInt::parse_bytes(s.as_bytes(), 10)
                .map(Token::Int)
                .ok_or_else(|| self.error(format!("invalid int literal {s}")))
        }
    }

    fn read_escape(&mut self, out: &mut String) -> Result<()> {
        let c = self.advance().ok_or_else(|| self.error("unterminated string"))?;
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\n' => self.line += 1,
            'x' => {
                let hex: String = (0..2).filter_map(|_| self.advance()).collect();
                let code = u8::from_str_radix(&hex, 16)
                    .map_err(|_| self.error(format!("invalid escape \\x{hex}")))?;
                out.push(char::from(code));
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn read_string(&mut self, quote: char) -> Result<String> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => return Err(self.error("unterminated string")),
                Some('\\') => self.read_escape(&mut s)?,
                Some(c) if c == quote => return Ok(s),
                Some(c) => s.push(c),
            }
        }
    }

    fn read_ident(&mut self, first: char) -> Token {
        let mut s = String::from(first);
        while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
            s.push(c);
            self.pos += 1;
        }
        Token::Ident(s)
    }

    fn either(&mut self, next: char, yes: Token, no: Token) -> Token {
        if self.eat(next) {
            yes
        } else {
            no
        }
    }

    pub(crate) fn tokenize(mut self) -> Result<Vec<(Token, usize)>> {
        loop {
            if self.at_line_start && self.depth == 0 {
                if !self.indentation()? {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.pos += 1;
                    }
                    if self.advance().is_none() {
                        break;
                    }
                    self.line += 1;
                    continue;
                }
                self.at_line_start = false;
            }

            while matches!(self.peek(), Some(' ' | '\t' | '\r')) {
                self.pos += 1;
            }
            let Some(ch) = self.advance() else { break };

            let tok = match ch {
                '#' => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.pos += 1;
                    }
                    continue;
                }
                '\n' => {
                    self.line += 1;
                    if self.depth == 0 {
                        self.end_line();
                        self.at_line_start = true;
                    }
                    continue;
                }
                '\\' if self.peek() == Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                    continue;
                }
                '0'..='9' => self.read_number(ch)?,
                '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.read_number(ch)?,
                'b' if matches!(self.peek(), Some('"' | '\'')) => {
                    let quote = self.advance().unwrap_or('"');
                    let s = self.read_string(quote)?;
                    // \xNN escapes produce chars below 256; map them back to raw bytes.
                    let bytes = s
                        .chars()
                        .flat_map(|c| match u8::try_from(c) {
                            Ok(b) => vec![b],
                            Err(_) => c.to_string().into_bytes(),
                        })
                        .collect();
                    Token::Bytes(bytes)
                }
                '"' | '\'' => Token::Str(self.read_string(ch)?),
                c if c.is_alphabetic() || c == '_' => self.read_ident(c),
                '+' => self.either('=', Token::PlusAssign, Token::Plus),
                '-' => self.either('=', Token::MinusAssign, Token::Minus),
                '*' => self.either('=', Token::StarAssign, Token::Star),
                '/' => self.either('/', Token::SlashSlash, Token::Slash),
                '%' => Token::Percent,
                '=' => self.either('=', Token::Eq, Token::Assign),
                '!' if self.eat('=') => Token::Ne,
                '<' => self.either('=', Token::Le, Token::Lt),
                '>' => self.either('=', Token::Ge, Token::Gt),
                '(' | '[' | '{' => {
                    self.depth += 1;
                    match ch {
                        '(' => Token::LParen,
                        '[' => Token::LBracket,
                        _ => Token::LBrace,
                    }
                }
                ')' | ']' | '}' => {
                    self.depth = self.depth.saturating_sub(1);
                    match ch {
                        ')' => Token::RParen,
                        ']' => Token::RBracket,
                        _ => Token::RBrace,
                    }
                }
                ',' => Token::Comma,
                ':' => Token::Colon,
                ';' => Token::Semi,
                '.' => Token::Dot,
                other => return Err(self.error(format!("unexpected character {other:?}"))),
            };
            self.push(tok);
        }

        self.end_line();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Token::Dedent);
        }
        self.push(Token::Eof);
        Ok(self.tokens)
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

/// A function parameter; defaults are evaluated once, at definition time.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Slice {
        target: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cond {
        cond: Box<Expr>,
        then: Box<Expr>,
        else_: Box<Expr>,
    },
    Lambda(Vec<Param>, Rc<Expr>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Recursive-descent parser shared by expressions and statements.
pub(crate) struct Parser<'a> {
    pub(crate) file: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(file: &'a str, src: &str) -> Result<Self> {
        let tokens = Lexer::new(file, src).tokenize()?;
        Ok(Parser {
            file,
            tokens,
            pos: 0,
        })
    }

    pub(crate) fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).map_or(&Token::Eof, |(t, _)| t)
    }

    pub(crate) fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |(_, l)| *l)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        self.pos += 1;
        t
    }

    pub(crate) fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s == kw)
    }

    pub(crate) fn eat_kw(&mut self, kw: &str) -> bool {
        if self.is_kw(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> Error {
        syntax(self.file, self.line(), message)
    }

    pub(crate) fn expect(&mut self, expected: &Token, what: &str) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, got {}", describe(self.peek()))))
        }
    }

    pub(crate) fn expect_kw(&mut self, kw: &str) -> Result<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{kw}', got {}", describe(self.peek()))))
        }
    }

    pub(crate) fn ident(&mut self) -> Result<String> {
        match self.peek().clone() {
            Token::Ident(name) if !KEYWORDS.contains(&name.as_str()) => {
                self.pos += 1;
                Ok(name)
            }
            other => Err(self.error(format!("expected identifier, got {}", describe(&other)))),
        }
    }

    /// True when the next token cannot start an expression.
    fn at_expr_end(&self) -> bool {
        match self.peek() {
            Token::Ident(s) => matches!(s.as_str(), "in" | "if" | "else" | "for" | "and" | "or"),
            Token::RParen
            | Token::RBracket
            | Token::RBrace
            | Token::Colon
            | Token::Newline
            | Token::Semi
            | Token::Eof
            | Token::Assign
            | Token::PlusAssign
            | Token::MinusAssign
            | Token::StarAssign => true,
            _ => false,
        }
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    /// `expr (',' expr)* [',']`, producing a tuple when a comma is present.
    pub(crate) fn parse_expr_list(&mut self) -> Result<Expr> {
        let first = self.parse_expr()?;
        if self.peek() != &Token::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.at_expr_end() {
                break;
            }
            items.push(self.parse_expr()?);
        }
        Ok(Expr::Tuple(items))
    }

    /// Like [`parse_expr_list`](Self::parse_expr_list) but stops before
    /// `in`, for `for` loop targets.
    pub(crate) fn parse_target_list(&mut self) -> Result<Expr> {
        let first = self.parse_postfix()?;
        if self.peek() != &Token::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.is_kw("in") {
                break;
            }
            items.push(self.parse_postfix()?);
        }
        Ok(Expr::Tuple(items))
    }

    pub(crate) fn parse_expr(&mut self) -> Result<Expr> {
        if self.eat_kw("lambda") {
            let params = self.parse_params(&Token::Colon)?;
            self.expect(&Token::Colon, "':'")?;
            let body = self.parse_expr()?;
            return Ok(Expr::Lambda(params, Rc::new(body)));
        }
        let then = self.parse_or()?;
        if !self.eat_kw("if") {
            return Ok(then);
        }
        let cond = self.parse_or()?;
        self.expect_kw("else")?;
        let else_ = self.parse_expr()?;
        Ok(Expr::Cond {
            cond: Box::new(cond),
            then: Box::new(then),
            else_: Box::new(else_),
        })
    }

    /// Parameters up to (not including) `close`.
    pub(crate) fn parse_params(&mut self, close: &Token) -> Result<Vec<Param>> {
        let mut params: Vec<Param> = Vec::new();
        while self.peek() != close {
            let name = self.ident()?;
            if params.iter().any(|p| p.name == name) {
                return Err(self.error(format!("duplicate parameter {name}")));
            }
            let default = if self.eat(&Token::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            if default.is_none() && params.iter().any(|p| p.default.is_some()) {
                return Err(self.error(format!("required parameter {name} follows optional")));
            }
            params.push(Param { name, default });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat_kw("or") {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_not()?;
        while self.eat_kw("and") {
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.eat_kw("not") {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinOp::Eq,
                Token::Ne => BinOp::Ne,
                Token::Lt => BinOp::Lt,
                Token::Le => BinOp::Le,
                Token::Gt => BinOp::Gt,
                Token::Ge => BinOp::Ge,
                Token::Ident(s) if s == "in" => BinOp::In,
                Token::Ident(s) if s == "not" && matches!(self.peek_at(1), Token::Ident(n) if n == "in") => {
                    self.pos += 1;
                    BinOp::NotIn
                }
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::SlashSlash => BinOp::FloorDiv,
                Token::Percent => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Pos,
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    pub(crate) fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.pos += 1;
                    let name = match self.advance() {
                        Token::Ident(name) => name,
                        other => {
                            return Err(self.error(format!(
                                "expected attribute name, got {}",
                                describe(&other)
                            )))
                        }
                    };
                    expr = Expr::Attr(Box::new(expr), name);
                }
                Token::LParen => {
                    self.pos += 1;
                    let mut args = Vec::new();
                    while self.peek() != &Token::RParen {
                        args.push(self.parse_expr()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RParen, "')'")?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                Token::LBracket => {
                    self.pos += 1;
                    expr = self.parse_subscript(expr)?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_subscript(&mut self, target: Expr) -> Result<Expr> {
        let bound = |p: &mut Self| -> Result<Option<Box<Expr>>> {
            if matches!(p.peek(), Token::Colon | Token::RBracket) {
                Ok(None)
            } else {
                Ok(Some(Box::new(p.parse_expr()?)))
            }
        };
        let start = bound(self)?;
        if !self.eat(&Token::Colon) {
            self.expect(&Token::RBracket, "']'")?;
            let index = start.ok_or_else(|| self.error("empty subscript"))?;
            return Ok(Expr::Index(Box::new(target), index));
        }
        let end = bound(self)?;
        let step = if self.eat(&Token::Colon) {
            bound(self)?
        } else {
            None
        };
        self.expect(&Token::RBracket, "']'")?;
        Ok(Expr::Slice {
            target: Box::new(target),
            start,
            end,
            step,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let tok = self.advance();
        Ok(match tok {
            Token::Int(n) => Expr::Literal(Value::Int(n)),
            Token::Float(x) => Expr::Literal(Value::Float(x)),
            Token::Str(mut s) => {
                // adjacent literals concatenate
                while let Token::Str(next) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Expr::Literal(Value::from(s))
            }
            Token::Bytes(b) => Expr::Literal(Value::bytes(&b)),
            Token::Ident(name) => match name.as_str() {
                "None" => Expr::Literal(Value::None),
                "True" => Expr::Literal(Value::Bool(true)),
                "False" => Expr::Literal(Value::Bool(false)),
                kw if KEYWORDS.contains(&kw) => {
                    self.pos -= 1;
                    return Err(self.error(format!("unexpected keyword '{kw}'")));
                }
                _ => Expr::Name(name),
            },
            Token::LParen => {
                if self.eat(&Token::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let inner = self.parse_expr_list()?;
                self.expect(&Token::RParen, "')'")?;
                inner
            }
            Token::LBracket => {
                let mut items = Vec::new();
                while self.peek() != &Token::RBracket {
                    items.push(self.parse_expr()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RBracket, "']'")?;
                Expr::List(items)
            }
            Token::LBrace => {
                let mut entries = Vec::new();
                while self.peek() != &Token::RBrace {
                    let k = self.parse_expr()?;
                    self.expect(&Token::Colon, "':'")?;
                    let v = self.parse_expr()?;
                    entries.push((k, v));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RBrace, "'}'")?;
                Expr::Dict(entries)
            }
            other => {
                self.pos -= 1;
                return Err(self.error(format!("unexpected {}", describe(&other))));
            }
        })
    }
}

pub(crate) fn describe(tok: &Token) -> String {
    match tok {
        Token::Int(n) => format!("int {n}"),
        Token::Float(x) => format!("float {x}"),
        Token::Str(s) => format!("string {s:?}"),
        Token::Bytes(_) => "bytes literal".to_string(),
        Token::Ident(s) => format!("'{s}'"),
        Token::Newline => "newline".to_string(),
        Token::Indent => "indent".to_string(),
        Token::Dedent => "unindent".to_string(),
        Token::Eof => "end of file".to_string(),
        other => format!("{other:?}"),
    }
}

/// Parse a standalone expression.
pub fn parse_expr(file: &str, src: &str) -> Result<Expr> {
    let mut p = Parser::new(file, src)?;
    let expr = p.parse_expr_list()?;
    p.eat(&Token::Newline);
    if p.peek() != &Token::Eof {
        return Err(p.error(format!("unexpected {} after expression", describe(p.peek()))));
    }
    Ok(expr)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        Lexer::new("t", src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn lex_operators() {
        assert_eq!(
            tokens("a // b != c"),
            vec![
                Token::Ident("a".into()),
                Token::SlashSlash,
                Token::Ident("b".into()),
                Token::Ne,
                Token::Ident("c".into()),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn lex_layout() {
        let toks = tokens("if x:\n    y\n\n  # note\nz\n");
        assert_eq!(
            toks,
            vec![
                Token::Ident("if".into()),
                Token::Ident("x".into()),
                Token::Colon,
                Token::Newline,
                Token::Indent,
                Token::Ident("y".into()),
                Token::Newline,
                Token::Dedent,
                Token::Ident("z".into()),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn brackets_join_lines() {
        let toks = tokens("[1,\n   2]\n");
        assert!(!toks[..toks.len() - 2].contains(&Token::Newline));
        assert!(!toks.contains(&Token::Indent));
    }

    #[test]
    fn lex_literals() {
        assert_eq!(tokens("0x1f")[0], Token::Int(BigInt::from(31)));
        assert_eq!(tokens("1_000")[0], Token::Int(BigInt::from(1000)));
        assert_eq!(tokens("2.5e1")[0], Token::Float(25.0));
        assert_eq!(tokens("'a\\tb'")[0], Token::Str("a\tb".into()));
        assert_eq!(tokens("b'\\xff'")[0], Token::Bytes(vec![0xff]));
    }

    #[test]
    fn bad_dedent_is_reported_with_line() {
        let err = Lexer::new("f.star", "if x:\n    a\n  b\n").tokenize().unwrap_err();
        assert!(err.to_string().starts_with("f.star:3:"), "{err}");
    }

    #[test]
    fn unterminated_string() {
        assert!(matches!(
            Lexer::new("t", "'abc").tokenize(),
            Err(Error::Syntax { line: 1, .. })
        ));
    }

    #[test]
    fn precedence() {
        let Expr::Binary(BinOp::Add, _, rhs) = parse_expr("t", "1 + 2 * 3").unwrap() else {
            panic!("expected addition at the top");
        };
        assert!(matches!(*rhs, Expr::Binary(BinOp::Mul, _, _)));

        assert!(matches!(parse_expr("t", "a not in b").unwrap(), Expr::Binary(BinOp::NotIn, _, _)));
        assert!(matches!(parse_expr("t", "not a == b").unwrap(), Expr::Unary(UnaryOp::Not, _)));
        assert!(matches!(parse_expr("t", "x if c else y").unwrap(), Expr::Cond { .. }));
    }

    #[test]
    fn postfix_chains() {
        let e = parse_expr("t", "a.b(1)[2][::-1]").unwrap();
        let Expr::Slice { target, start, end, step } = e else {
            panic!("expected slice");
        };
        assert!(start.is_none() && end.is_none() && step.is_some());
        assert!(matches!(*target, Expr::Index(..)));
    }

    #[test]
    fn tuples_and_lambdas() {
        assert!(matches!(parse_expr("t", "()").unwrap(), Expr::Tuple(v) if v.is_empty()));
        assert!(matches!(parse_expr("t", "(1,)").unwrap(), Expr::Tuple(v) if v.len() == 1));
        assert!(matches!(parse_expr("t", "1, 2").unwrap(), Expr::Tuple(v) if v.len() == 2));
        assert!(matches!(parse_expr("t", "lambda x, y=1: x").unwrap(), Expr::Lambda(p, _) if p.len() == 2));
    }

    #[test]
    fn keyword_is_not_a_name() {
        assert!(parse_expr("t", "def").is_err());
        assert!(parse_expr("t", "1 +").is_err());
        assert!(parse_expr("t", "1 2").is_err());
    }
}
