//! Tree-walking evaluator and the execute / evaluate / call boundary.
//!
//! Name resolution order inside a function body:
//!
//! | Scope        | Source                                          |
//! |--------------|-------------------------------------------------|
//! | locals       | parameters and assignments in the current call  |
//! | captured     | enclosing function locals at `def`/`lambda` time|
//! | globals      | top-level assignments of the module             |
//! | predeclared  | bindings passed to [`Interpreter::execute`]     |
//! | universe     | registry-wide builtins and modules              |
//! | builtins     | `len`, `str`, `range`, ...                      |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::builtins;
use super::expr::{parse_expr, BinOp, Expr, Param};
use super::ops;
use super::stmt::{parse_module, Stmt, Target};
use super::value::{Dict, Value};
use crate::error::{Error, Result};

/// Call depth allowed when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Name → value bindings, in insertion order.
pub type Bindings = IndexMap<String, Value>;

// ── Thread ────────────────────────────────────────────────────────────────────

struct ThreadState {
    name: String,
    max_depth: usize,
    depth: Cell<usize>,
}

/// An execution thread: a name for diagnostics and a call-depth budget.
/// Clones share the same depth counter.
#[derive(Clone)]
pub struct Thread(Rc<ThreadState>);

impl Thread {
    pub fn new(name: &str, max_depth: usize) -> Self {
        Thread(Rc::new(ThreadState {
            name: name.to_string(),
            max_depth,
            depth: Cell::new(0),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn max_depth(&self) -> usize {
        self.0.max_depth
    }

    /// Number of script function calls currently on the stack.
    pub fn depth(&self) -> usize {
        self.0.depth.get()
    }

    fn enter(&self, callee: &str) -> Result<DepthGuard> {
        let depth = self.0.depth.get();
        if depth >= self.0.max_depth {
            return Err(Error::script(format!(
                "{callee}: call stack depth exceeded ({})",
                self.0.max_depth
            )));
        }
        self.0.depth.set(depth + 1);
        Ok(DepthGuard(self.clone()))
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.0.name)
            .field("depth", &self.0.depth.get())
            .finish()
    }
}

struct DepthGuard(Thread);

impl Drop for DepthGuard {
    fn drop(&mut self) {
        let depth = &self.0 .0.depth;
        depth.set(depth.get().saturating_sub(1));
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Module-level state shared by every function defined in the module.
struct Scope {
    globals: RefCell<Bindings>,
    predeclared: Bindings,
    universe: Rc<Bindings>,
}

enum Body {
    Block(Rc<[Stmt]>),
    Lambda(Rc<Expr>),
}

/// A function defined by `def` or `lambda`.
pub struct Function {
    name: String,
    params: Vec<(String, Option<Value>)>,
    body: Body,
    scope: Rc<Scope>,
    captured: Rc<Bindings>,
    /// Thread the function was defined on; host callbacks re-enter through it.
    thread: Thread,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(n, _)| n.as_str())
    }

    fn call(&self, thread: &Thread, args: Vec<Value>) -> Result<Value> {
        let required = self.params.iter().filter(|(_, d)| d.is_none()).count();
        if args.len() < required || args.len() > self.params.len() {
            let short = args.len() < required;
            return Err(Error::ArgumentCount {
                name: self.name.clone(),
                expected: if short { required } else { self.params.len() },
                actual: args.len(),
                variadic: short && required < self.params.len(),
            });
        }

        let _depth = thread.enter(&self.name)?;
        trace!(function = %self.name, depth = thread.depth(), "call");

        let mut locals = Bindings::with_capacity(self.params.len());
        let mut args = args.into_iter();
        for (name, default) in &self.params {
            let value = args.next().or_else(|| default.clone()).unwrap_or_default();
            locals.insert(name.clone(), value);
        }

        let mut frame = Frame {
            thread,
            scope: &self.scope,
            captured: self.captured.clone(),
            locals: Some(locals),
        };
        match &self.body {
            Body::Lambda(expr) => frame.eval(expr),
            Body::Block(stmts) => match frame.exec(stmts)? {
                Flow::Return(v) => Ok(v),
                Flow::Normal => Ok(Value::None),
                Flow::Break | Flow::Continue => {
                    Err(Error::script(format!("{}: break or continue outside loop", self.name)))
                }
            },
        }
    }
}

/// Call a script function or builtin with positional arguments.
pub fn call(thread: &Thread, callee: &Value, args: Vec<Value>) -> Result<Value> {
    match callee {
        Value::Function(f) => f.call(thread, args),
        Value::Builtin(b) => b.call(thread, &args),
        other => Err(Error::script(format!(
            "invalid call of non-function ({})",
            other.type_name()
        ))),
    }
}

// ── Evaluation ────────────────────────────────────────────────────────────────

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

struct Frame<'a> {
    thread: &'a Thread,
    scope: &'a Rc<Scope>,
    captured: Rc<Bindings>,
    /// `None` at module level, where assignments go to globals.
    locals: Option<Bindings>,
}

impl<'a> Frame<'a> {
    fn module(thread: &'a Thread, scope: &'a Rc<Scope>) -> Self {
        Frame {
            thread,
            scope,
            captured: Rc::default(),
            locals: None,
        }
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        let found = self
            .locals
            .as_ref()
            .and_then(|l| l.get(name))
            .or_else(|| self.captured.get(name))
            .cloned()
            .or_else(|| self.scope.globals.borrow().get(name).cloned())
            .or_else(|| self.scope.predeclared.get(name).cloned())
            .or_else(|| self.scope.universe.get(name).cloned())
            .or_else(|| builtins::lookup(name));
        found.ok_or_else(|| Error::script(format!("undefined: {name}")))
    }

    fn bind(&mut self, name: &str, value: Value) {
        match &mut self.locals {
            Some(locals) => {
                locals.insert(name.to_string(), value);
            }
            None => {
                self.scope.globals.borrow_mut().insert(name.to_string(), value);
            }
        }
    }

    fn make_function(&self, name: &str, params: &[Param], body: Body) -> Result<Value> {
        let params = params
            .iter()
            .map(|p| {
                let default = p.default.as_ref().map(|d| self.eval(d)).transpose()?;
                Ok((p.name.clone(), default))
            })
            .collect::<Result<Vec<_>>>()?;
        let captured = match &self.locals {
            Some(locals) => {
                let mut env = (*self.captured).clone();
                env.extend(locals.iter().map(|(k, v)| (k.clone(), v.clone())));
                Rc::new(env)
            }
            None => self.captured.clone(),
        };
        Ok(Value::Function(Rc::new(Function {
            name: name.to_string(),
            params,
            body,
            scope: self.scope.clone(),
            captured,
            thread: self.thread.clone(),
        })))
    }

    fn eval_all(&self, exprs: &[Expr]) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval_opt(&self, expr: Option<&Expr>) -> Result<Value> {
        expr.map_or(Ok(Value::None), |e| self.eval(e))
    }

    fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => Ok(Value::list(self.eval_all(items)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(items)?)),
            Expr::Dict(entries) => {
                let pairs = entries
                    .iter()
                    .map(|(k, v)| Ok((self.eval(k)?, self.eval(v)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Dict(Rc::new(Dict::from_pairs(pairs)?)))
            }
            Expr::Attr(obj, name) => ops::get_attr(&self.eval(obj)?, name),
            Expr::Index(obj, idx) => ops::index(&self.eval(obj)?, &self.eval(idx)?),
            Expr::Slice {
                target,
                start,
                end,
                step,
            } => ops::slice(
                &self.eval(target)?,
                &self.eval_opt(start.as_deref())?,
                &self.eval_opt(end.as_deref())?,
                &self.eval_opt(step.as_deref())?,
            ),
            Expr::Call(callee, args) => {
                let callee = self.eval(callee)?;
                let args = self.eval_all(args)?;
                call(self.thread, &callee, args)
            }
            Expr::Unary(op, operand) => ops::unary(*op, &self.eval(operand)?),
            Expr::Binary(op, l, r) => ops::binary(*op, &self.eval(l)?, &self.eval(r)?),
            Expr::And(l, r) => {
                let lv = self.eval(l)?;
                if lv.truth() {
                    self.eval(r)
                } else {
                    Ok(lv)
                }
            }
            Expr::Or(l, r) => {
                let lv = self.eval(l)?;
                if lv.truth() {
                    Ok(lv)
                } else {
                    self.eval(r)
                }
            }
            Expr::Cond { cond, then, else_ } => {
                if self.eval(cond)?.truth() {
                    self.eval(then)
                } else {
                    self.eval(else_)
                }
            }
            Expr::Lambda(params, body) => {
                self.make_function("lambda", params, Body::Lambda(body.clone()))
            }
        }
    }

    fn assign(&mut self, target: &Target, value: Value) -> Result<()> {
        match target {
            Target::Name(name) => self.bind(name, value),
            Target::Attr(obj, name) => ops::set_attr(&self.eval(obj)?, name, &value)?,
            Target::Index(obj, idx) => ops::set_index(&self.eval(obj)?, &self.eval(idx)?, value)?,
            Target::Tuple(targets) => {
                let items: Vec<Value> = ops::iterate(&value)?.collect();
                if items.len() != targets.len() {
                    return Err(Error::script(format!(
                        "cannot unpack {} values into {} variables",
                        items.len(),
                        targets.len()
                    )));
                }
                for (t, v) in targets.iter().zip(items) {
                    self.assign(t, v)?;
                }
            }
        }
        Ok(())
    }

    fn aug_assign(&mut self, target: &Target, op: BinOp, rhs: &Expr) -> Result<()> {
        match target {
            Target::Name(name) => {
                let current = self.lookup(name)?;
                let value = ops::binary(op, &current, &self.eval(rhs)?)?;
                self.bind(name, value);
            }
            Target::Attr(obj, name) => {
                let obj = self.eval(obj)?;
                let current = ops::get_attr(&obj, name)?;
                let value = ops::binary(op, &current, &self.eval(rhs)?)?;
                ops::set_attr(&obj, name, &value)?;
            }
            Target::Index(obj, idx) => {
                let (obj, idx) = (self.eval(obj)?, self.eval(idx)?);
                let current = ops::index(&obj, &idx)?;
                let value = ops::binary(op, &current, &self.eval(rhs)?)?;
                ops::set_index(&obj, &idx, value)?;
            }
            Target::Tuple(_) => return Err(Error::script("augmented assignment to a tuple")),
        }
        Ok(())
    }

    fn exec(&mut self, stmts: &[Stmt]) -> Result<Flow> {
        for stmt in stmts {
            match stmt {
                Stmt::Expr(e) => {
                    self.eval(e)?;
                }
                Stmt::Assign(target, e) => {
                    let value = self.eval(e)?;
                    self.assign(target, value)?;
                }
                Stmt::AugAssign(target, op, e) => self.aug_assign(target, *op, e)?,
                Stmt::Def(def) => {
                    let f = self.make_function(&def.name, &def.params, Body::Block(def.body.clone()))?;
                    self.bind(&def.name, f);
                }
                Stmt::Return(e) => {
                    let value = match e {
                        Some(e) => self.eval(e)?,
                        None => Value::None,
                    };
                    return Ok(Flow::Return(value));
                }
                Stmt::If(arms, else_block) => {
                    let mut taken = else_block;
                    for (cond, body) in arms {
                        if self.eval(cond)?.truth() {
                            taken = body;
                            break;
                        }
                    }
                    match self.exec(taken)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Stmt::For(target, iterable, body) => {
                    let seq = self.eval(iterable)?;
                    // the iterator keeps `seq` locked against structural change
                    for item in ops::iterate(&seq)? {
                        self.assign(target, item)?;
                        match self.exec(body)? {
                            Flow::Break => break,
                            Flow::Normal | Flow::Continue => {}
                            ret @ Flow::Return(_) => return Ok(ret),
                        }
                    }
                }
                Stmt::Break => return Ok(Flow::Break),
                Stmt::Continue => return Ok(Flow::Continue),
                Stmt::Pass => {}
            }
        }
        Ok(Flow::Normal)
    }
}

// ── Interpreter ───────────────────────────────────────────────────────────────

/// Entry point for running source text.
pub struct Interpreter {
    thread: Thread,
    universe: Rc<Bindings>,
    freeze_globals: bool,
}

impl Interpreter {
    pub fn new(thread: Thread, universe: Rc<Bindings>) -> Self {
        Interpreter {
            thread,
            universe,
            freeze_globals: true,
        }
    }

    /// Whether [`execute`](Self::execute) freezes the resulting globals.
    pub fn with_freeze_globals(mut self, freeze: bool) -> Self {
        self.freeze_globals = freeze;
        self
    }

    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    /// Run a module and return its globals.
    pub fn execute(&self, filename: &str, source: &str, predeclared: Bindings) -> Result<Bindings> {
        let stmts = parse_module(filename, source)?;
        debug!(
            file = filename,
            thread = self.thread.name(),
            statements = stmts.len(),
            "executing module"
        );
        let scope = Rc::new(Scope {
            globals: RefCell::default(),
            predeclared,
            universe: self.universe.clone(),
        });
        let mut frame = Frame::module(&self.thread, &scope);
        match frame.exec(&stmts)? {
            Flow::Normal | Flow::Return(_) => {}
            Flow::Break | Flow::Continue => {
                return Err(Error::script(format!("{filename}: break or continue outside loop")))
            }
        }

        let globals = scope.globals.borrow().clone();
        if self.freeze_globals {
            globals.values().for_each(Value::freeze);
        }
        Ok(globals)
    }

    /// Evaluate a single expression against `env`.
    pub fn evaluate(&self, filename: &str, expr: &str, env: &Bindings) -> Result<Value> {
        let expr = parse_expr(filename, expr)?;
        let scope = Rc::new(Scope {
            globals: RefCell::default(),
            predeclared: env.clone(),
            universe: self.universe.clone(),
        });
        Frame::module(&self.thread, &scope).eval(&expr)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
