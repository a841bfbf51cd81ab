//! Statement AST and the block-structured statement parser.
//!
//! A module is a sequence of logical lines.  Compound statements (`def`,
//! `if`, `for`) own an indented block, or a single simple statement on the
//! same line after the colon.  Simple statements may be separated by `;`.

use std::rc::Rc;

use super::expr::{describe, BinOp, Expr, Param, Parser, Token};
use crate::error::Result;

/// Left-hand side of an assignment or `for` loop.
#[derive(Debug, Clone)]
pub enum Target {
    Name(String),
    Attr(Expr, String),
    Index(Expr, Expr),
    Tuple(Vec<Target>),
}

#[derive(Debug)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Rc<[Stmt]>,
}

/// A parsed statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Assign(Target, Expr),
    /// `target op= value`
    AugAssign(Target, BinOp, Expr),
    Def(Rc<FuncDef>),
    Return(Option<Expr>),
    /// `if`/`elif` arms in order, then the `else` block.
    If(Vec<(Expr, Vec<Stmt>)>, Vec<Stmt>),
    For(Target, Expr, Vec<Stmt>),
    Break,
    Continue,
    Pass,
}

/// Parse a whole module.
pub fn parse_module(file: &str, src: &str) -> Result<Vec<Stmt>> {
    let mut p = Parser::new(file, src)?;
    let mut stmts = Vec::new();
    while p.peek() != &Token::Eof {
        if p.eat(&Token::Newline) {
            continue;
        }
        stmts.extend(p.parse_statement(false)?);
    }
    Ok(stmts)
}

impl Parser<'_> {
    /// One logical line; simple statements joined by `;` yield several.
    fn parse_statement(&mut self, in_def: bool) -> Result<Vec<Stmt>> {
        let stmt = if self.eat_kw("def") {
            self.parse_def()?
        } else if self.eat_kw("if") {
            self.parse_if(in_def)?
        } else if self.eat_kw("for") {
            let target = self.parse_target_list()?;
            let target = self.to_target(target)?;
            self.expect_kw("in")?;
            let iterable = self.parse_expr_list()?;
            let body = self.parse_block(in_def)?;
            Stmt::For(target, iterable, body)
        } else {
            return self.parse_simple_line(in_def);
        };
        Ok(vec![stmt])
    }

    fn parse_simple_line(&mut self, in_def: bool) -> Result<Vec<Stmt>> {
        let mut stmts = vec![self.parse_simple(in_def)?];
        while self.eat(&Token::Semi) {
            if matches!(self.peek(), Token::Newline | Token::Eof) {
                break;
            }
            stmts.push(self.parse_simple(in_def)?);
        }
        if !self.eat(&Token::Newline) && self.peek() != &Token::Eof {
            return Err(self.error(format!("unexpected {}", describe(self.peek()))));
        }
        Ok(stmts)
    }

    fn parse_simple(&mut self, in_def: bool) -> Result<Stmt> {
        if self.eat_kw("pass") {
            return Ok(Stmt::Pass);
        }
        if self.eat_kw("break") {
            return Ok(Stmt::Break);
        }
        if self.eat_kw("continue") {
            return Ok(Stmt::Continue);
        }
        if self.is_kw("return") {
            if !in_def {
                return Err(self.error("return statement not within a function"));
            }
            self.advance();
            if matches!(self.peek(), Token::Newline | Token::Semi | Token::Eof) {
                return Ok(Stmt::Return(None));
            }
            return Ok(Stmt::Return(Some(self.parse_expr_list()?)));
        }

        let lhs = self.parse_expr_list()?;
        let op = match self.peek() {
            Token::Assign => None,
            Token::PlusAssign => Some(BinOp::Add),
            Token::MinusAssign => Some(BinOp::Sub),
            Token::StarAssign => Some(BinOp::Mul),
            _ => return Ok(Stmt::Expr(lhs)),
        };
        self.advance();
        let target = self.to_target(lhs)?;
        let rhs = self.parse_expr_list()?;
        Ok(match op {
            None => Stmt::Assign(target, rhs),
            Some(op) => {
                if matches!(target, Target::Tuple(_)) {
                    return Err(self.error("augmented assignment to a tuple"));
                }
                Stmt::AugAssign(target, op, rhs)
            }
        })
    }

    fn to_target(&self, expr: Expr) -> Result<Target> {
        Ok(match expr {
            Expr::Name(name) => Target::Name(name),
            Expr::Attr(obj, name) => Target::Attr(*obj, name),
            Expr::Index(obj, index) => Target::Index(*obj, *index),
            Expr::Tuple(items) | Expr::List(items) => Target::Tuple(
                items
                    .into_iter()
                    .map(|e| self.to_target(e))
                    .collect::<Result<_>>()?,
            ),
            other => return Err(self.error(format!("cannot assign to {}", expr_kind(&other)))),
        })
    }

    fn parse_def(&mut self) -> Result<Stmt> {
        let name = self.ident()?;
        self.expect(&Token::LParen, "'('")?;
        let params = self.parse_params(&Token::RParen)?;
        self.expect(&Token::RParen, "')'")?;
        let body = self.parse_block(true)?;
        Ok(Stmt::Def(Rc::new(FuncDef {
            name,
            params,
            body: Rc::from(body),
        })))
    }

    fn parse_if(&mut self, in_def: bool) -> Result<Stmt> {
        let mut arms = Vec::new();
        let cond = self.parse_expr()?;
        arms.push((cond, self.parse_block(in_def)?));
        let mut else_block = Vec::new();
        loop {
            if self.eat_kw("elif") {
                let cond = self.parse_expr()?;
                arms.push((cond, self.parse_block(in_def)?));
            } else if self.eat_kw("else") {
                else_block = self.parse_block(in_def)?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If(arms, else_block))
    }

    /// `':' simple_line` or `':' NEWLINE INDENT stmt+ DEDENT`.
    fn parse_block(&mut self, in_def: bool) -> Result<Vec<Stmt>> {
        self.expect(&Token::Colon, "':'")?;
        if !self.eat(&Token::Newline) {
            return self.parse_simple_line(in_def);
        }
        if !self.eat(&Token::Indent) {
            return Err(self.error("expected an indented block"));
        }
        let mut body = Vec::new();
        while !self.eat(&Token::Dedent) {
            if self.peek() == &Token::Eof {
                break;
            }
            body.extend(self.parse_statement(in_def)?);
        }
        Ok(body)
    }
}

fn expr_kind(expr: &Expr) -> &'static str {
    match expr {
        Expr::Literal(_) => "literal",
        Expr::Call(..) => "function call",
        Expr::Slice { .. } => "slice",
        Expr::Lambda(..) => "lambda",
        Expr::Dict(_) => "dict literal",
        Expr::Binary(..) | Expr::Unary(..) | Expr::And(..) | Expr::Or(..) => "operator",
        Expr::Cond { .. } => "conditional expression",
        _ => "expression",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn assignment_forms() {
        let stmts = parse_module("t", "a = 1\nb.c = 2\nd[0] = 3\ne, f = 4, 5\ng += 1\n").unwrap();
        assert!(matches!(&stmts[0], Stmt::Assign(Target::Name(n), _) if n == "a"));
        assert!(matches!(&stmts[1], Stmt::Assign(Target::Attr(_, n), _) if n == "c"));
        assert!(matches!(&stmts[2], Stmt::Assign(Target::Index(..), _)));
        assert!(matches!(&stmts[3], Stmt::Assign(Target::Tuple(t), Expr::Tuple(_)) if t.len() == 2));
        assert!(matches!(&stmts[4], Stmt::AugAssign(_, BinOp::Add, _)));
    }

    #[test]
    fn compound_statements() {
        let src = "\
def f(x, y=2):
    for i in x:
        if i: continue
        elif i == 2:
            break
        else:
            pass
    return x, y
";
        let stmts = parse_module("t", src).unwrap();
        let Stmt::Def(def) = &stmts[0] else {
            panic!("expected def");
        };
        assert_eq!(def.name, "f");
        assert_eq!(def.params.len(), 2);
        assert_eq!(def.body.len(), 2);
        let Stmt::For(_, _, body) = &def.body[0] else {
            panic!("expected for");
        };
        assert!(matches!(&body[0], Stmt::If(arms, els) if arms.len() == 2 && els.len() == 1));
        assert!(matches!(&def.body[1], Stmt::Return(Some(Expr::Tuple(_)))));
    }

    #[test]
    fn semicolons_split_simple_statements() {
        let stmts = parse_module("t", "a = 1; b = 2;\n").unwrap();
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn errors_carry_line_numbers() {
        let err = parse_module("m.star", "a = 1\n\nreturn a\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 3, .. }), "{err}");

        let err = parse_module("m.star", "x = 1\nf() = 2\n").unwrap_err();
        assert_eq!(err.to_string(), "m.star:2: cannot assign to function call");

        assert!(parse_module("t", "if x:\ny\n").is_err());
        assert!(parse_module("t", "def f(a=1, b): pass\n").is_err());
    }
}
