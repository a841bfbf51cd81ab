//! One script execution context.
//!
//! A [`Context`] owns an interpreter thread, a snapshot of a
//! [`Registry`](crate::registry::Registry), and the globals of the last
//! module it loaded.  Host code talks to it in host values only; every
//! crossing goes through [`to_value`] and [`from_value`].
//!
//! | Operation                     | Script side                                |
//! |-------------------------------|--------------------------------------------|
//! | [`load_file`](Context::load_file) / [`load_script`](Context::load_script) | execute a module, keep its globals |
//! | [`eval`](Context::eval) / [`eval_file`](Context::eval_file) | evaluate one expression |
//! | [`get_global`](Context::get_global) | read a global                  |
//! | [`call_func`](Context::call_func) | call a global function           |
//! | [`bind_func`](Context::bind_func) | wrap a global function as a host func |

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use tracing::debug;

use crate::bridge::{bind_script_func, from_value, to_value};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::host::{Signature, Value as HostValue};
use crate::registry::Registry;
use crate::script::{self, Bindings, Interpreter, Thread, Value};

/// Named host values handed to a script as predeclared variables.
pub type Vars<'a> = [(&'a str, HostValue)];

pub struct Context {
    interp: Interpreter,
    script_name: String,
    eval_name: String,
    globals: RefCell<Bindings>,
}

impl Context {
    pub fn new(registry: &Registry, config: &Config) -> Self {
        Self::with_universe(registry.universe(), config)
    }

    pub(crate) fn with_universe(universe: Rc<Bindings>, config: &Config) -> Self {
        let thread = Thread::new(&config.thread_name, config.max_call_depth);
        Context {
            interp: Interpreter::new(thread, universe).with_freeze_globals(config.freeze_globals),
            script_name: config.script_name.clone(),
            eval_name: config.eval_name.clone(),
            globals: RefCell::default(),
        }
    }

    pub fn thread(&self) -> &Thread {
        self.interp.thread()
    }

    // ── Loading ───────────────────────────────────────────────────────────

    /// Execute the module at `path`; its globals replace the current ones.
    pub fn load_file(&self, path: impl AsRef<Path>, vars: &Vars<'_>) -> Result<()> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        self.load(&path.display().to_string(), &source, vars)
    }

    /// Execute `source` as a module named after the configured script name.
    pub fn load_script(&self, source: &str, vars: &Vars<'_>) -> Result<()> {
        self.load(&self.script_name, source, vars)
    }

    fn load(&self, filename: &str, source: &str, vars: &Vars<'_>) -> Result<()> {
        let globals = self.interp.execute(filename, source, bindings(vars))?;
        debug!(file = filename, globals = globals.len(), "module loaded");
        *self.globals.borrow_mut() = globals;
        Ok(())
    }

    // ── Evaluation ────────────────────────────────────────────────────────

    /// Evaluate one expression.  Names resolve in `env` first, then in the
    /// loaded globals.
    pub fn eval(&self, expr: &str, env: &Vars<'_>) -> Result<HostValue> {
        self.evaluate(&self.eval_name, expr, env)
    }

    /// Evaluate the expression held in the file at `path`.
    pub fn eval_file(&self, path: impl AsRef<Path>, env: &Vars<'_>) -> Result<HostValue> {
        let path = path.as_ref();
        let expr = fs::read_to_string(path)?;
        self.evaluate(&path.display().to_string(), &expr, env)
    }

    fn evaluate(&self, filename: &str, expr: &str, env: &Vars<'_>) -> Result<HostValue> {
        let mut scope = self.globals.borrow().clone();
        scope.extend(bindings(env));
        let v = self.interp.evaluate(filename, expr, &scope)?;
        Ok(from_value(&v))
    }

    // ── Globals ───────────────────────────────────────────────────────────

    /// A global of the loaded module as a script value.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name).cloned()
    }

    pub fn global_names(&self) -> Vec<String> {
        self.globals.borrow().keys().cloned().collect()
    }

    /// A global of the loaded module converted to a host value.
    pub fn get_global(&self, name: &str) -> Result<HostValue> {
        self.global(name)
            .map(|v| from_value(&v))
            .ok_or_else(|| Error::script(format!("no var named {name} found")))
    }

    /// Call the global function `name` with host arguments.
    pub fn call_func(&self, name: &str, args: &[HostValue]) -> Result<HostValue> {
        let func = self.function(name)?;
        let args = args.iter().map(to_value).collect();
        let ret = script::call(self.thread(), &func, args)?;
        Ok(from_value(&ret))
    }

    /// Synthesize a host function of signature `sig` whose body calls the
    /// global function `name`.
    pub fn bind_func(&self, name: &str, sig: Signature) -> Result<HostValue> {
        let func = self.function(name)?;
        bind_script_func(&func, sig)
    }

    fn function(&self, name: &str) -> Result<Value> {
        match self.global(name) {
            Some(v @ Value::Function(_)) => Ok(v),
            Some(_) => Err(Error::script(format!("var {name} is not a function"))),
            None => Err(Error::script(format!("no var named {name} found"))),
        }
    }
}

fn bindings(vars: &Vars<'_>) -> Bindings {
    vars.iter()
        .map(|(name, v)| (name.to_string(), to_value(v)))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Type;

    fn context() -> Context {
        Context::new(&Registry::new(), &Config::default())
    }

    const LIB: &str = "\
greeting = prefix + ', world'
def add(a, b):
    return a + b
def fails():
    fail('boom')
";

    #[test]
    fn load_script_sees_vars() {
        let ctx = context();
        ctx.load_script(LIB, &[("prefix", HostValue::from("hello"))]).unwrap();
        let g = ctx.get_global("greeting").unwrap();
        assert_eq!(g.as_string().as_deref(), Some("hello, world"));
        assert_eq!(ctx.global_names(), vec!["greeting", "add", "fails"]);
    }

    #[test]
    fn missing_globals_and_non_functions() {
        let ctx = context();
        ctx.load_script(LIB, &[("prefix", HostValue::from("hi"))]).unwrap();
        let err = ctx.get_global("nope").unwrap_err();
        assert_eq!(err.to_string(), "no var named nope found");
        let err = ctx.call_func("greeting", &[]).unwrap_err();
        assert_eq!(err.to_string(), "var greeting is not a function");
    }

    #[test]
    fn syntax_errors_name_the_script() {
        let err = context().load_script("x = (\n", &[]).unwrap_err();
        assert!(matches!(&err, Error::Syntax { file, .. } if file == "load-script.star"), "{err}");
    }

    #[test]
    fn call_func_converts_both_ways() {
        let ctx = context();
        ctx.load_script(LIB, &[("prefix", HostValue::from(""))]).unwrap();
        let sum = ctx
            .call_func("add", &[HostValue::from(2i64), HostValue::from(40i64)])
            .unwrap();
        assert_eq!(sum.as_i64(), Some(42));
        let err = ctx.call_func("fails", &[]).unwrap_err();
        assert!(err.to_string().contains("boom"), "{err}");
    }

    #[test]
    fn eval_uses_env_over_globals() {
        let ctx = context();
        ctx.load_script("x = 1\ny = 2\n", &[]).unwrap();
        let v = ctx.eval("x + y", &[("y", HostValue::from(10i64))]).unwrap();
        assert_eq!(v.as_i64(), Some(11));
    }

    #[test]
    fn bind_func_synthesizes_host_func() {
        let ctx = context();
        ctx.load_script(LIB, &[("prefix", HostValue::from(""))]).unwrap();
        let sig = Signature::new(
            vec![Type::int64(), Type::int64()],
            vec![Type::int64(), Type::error()],
        );
        let f = ctx.bind_func("add", sig).unwrap();
        let out = f.call(&[HostValue::from(3i64), HostValue::from(4i64)]).unwrap();
        assert_eq!(out[0].as_i64(), Some(7));
        assert!(out[1].is_nil());

        let no_err = Signature::new(vec![], vec![Type::int64()]);
        assert!(matches!(ctx.bind_func("add", no_err), Err(Error::MissingErrorSlot(_))));
    }

    #[test]
    fn files_load_and_evaluate() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("lib.star");
        let expr = dir.path().join("expr.star");
        fs::write(&module, "base = 100\n").unwrap();
        fs::write(&expr, "base + n\n").unwrap();

        let ctx = context();
        ctx.load_file(&module, &[]).unwrap();
        let v = ctx.eval_file(&expr, &[("n", HostValue::from(5i64))]).unwrap();
        assert_eq!(v.as_i64(), Some(105));
        assert!(matches!(ctx.load_file(dir.path().join("gone.star"), &[]), Err(Error::Io(_))));
    }
}
