//! Names visible to every script before its own globals.
//!
//! A [`Registry`] is filled once by the embedder and then handed to each
//! [`Context`](crate::context::Context), which snapshots it as the
//! universe scope.  Later registrations do not reach contexts that already
//! exist.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::bridge::{HostFunction, RecordAdapter};
use crate::error::{Error, Result};
use crate::host::{Kind, Value as HostValue};
use crate::script::{Bindings, Module, Value};

#[derive(Default)]
pub struct Registry {
    members: Bindings,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind host function `func` as the builtin `name`.
    pub fn make_builtin_func(&mut self, name: &str, func: HostValue) -> Result<()> {
        check_name(name, "builtin name expected")?;
        let func = HostFunction::new(name, func)?;
        self.insert(name, func.into_value());
        Ok(())
    }

    /// Expose a host record as the module `name`.
    ///
    /// Pass a pointer to let scripts write fields back into the caller's
    /// record; a bare record is copied.
    pub fn set_module(&mut self, name: &str, record: &HostValue) -> Result<()> {
        check_name(name, "module name expected")?;
        if record.is_nil() {
            return Err(Error::Registry(format!(
                "module {name}: need a non-nil record or pointer to record"
            )));
        }
        let is_record = match record.kind() {
            Kind::Record => true,
            Kind::Pointer => record.elem().is_some_and(|r| r.kind() == Kind::Record),
            _ => false,
        };
        if !is_record {
            return Err(Error::Registry(format!(
                "module {name}: {} is not a record or pointer to record",
                record.ty()
            )));
        }
        let adapter = RecordAdapter::bind(Some(name), record)?;
        self.insert(name, Value::Record(Rc::new(adapter)));
        Ok(())
    }

    /// Group named host functions into the module `name`.
    pub fn create_module<'a>(
        &mut self,
        name: &str,
        funcs: impl IntoIterator<Item = (&'a str, HostValue)>,
    ) -> Result<()> {
        check_name(name, "module name expected")?;
        let mut members = IndexMap::new();
        for (method, func) in funcs {
            check_name(method, "blank method name found")?;
            if func.concrete().kind() != Kind::Func {
                return Err(Error::Registry(format!("func expected for method {method}")));
            }
            let f = HostFunction::new(&format!("{name}.{method}"), func)?;
            members.insert(method.to_string(), f.into_value());
        }
        if members.is_empty() {
            return Err(Error::Registry(format!("module {name}: no functions given")));
        }
        let module = Module {
            name: name.to_string(),
            members,
        };
        self.insert(name, Value::Module(Rc::new(module)));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Snapshot of the registered names for a new interpreter.
    pub fn universe(&self) -> Rc<Bindings> {
        Rc::new(self.members.clone())
    }

    fn insert(&mut self, name: &str, value: Value) {
        let kind = value.type_name();
        if self.members.insert(name.to_string(), value).is_some() {
            debug!(name, kind, "replaced registry entry");
        } else {
            debug!(name, kind, "registered");
        }
    }
}

fn check_name(name: &str, message: &str) -> Result<()> {
    if name.trim().is_empty() {
        Err(Error::Registry(message.to_string()))
    } else {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Field, Signature, Type};
    use crate::script::{Interpreter, Thread};

    fn add() -> HostValue {
        let sig = Signature::new(vec![Type::int64(), Type::int64()], vec![Type::int64()]);
        HostValue::func(sig, |args| {
            let sum = args[0].as_i64().unwrap_or(0) + args[1].as_i64().unwrap_or(0);
            vec![HostValue::from(sum)]
        })
    }

    fn eval(reg: &Registry, src: &str) -> Value {
        Interpreter::new(Thread::new("test", 32), reg.universe())
            .evaluate("expr", src, &Bindings::new())
            .unwrap()
    }

    #[test]
    fn builtin_func_is_callable() {
        let mut reg = Registry::new();
        reg.make_builtin_func("add", add()).unwrap();
        assert_eq!(eval(&reg, "add(2, 3)").to_string(), "5");
        assert!(reg.make_builtin_func("", add()).is_err());
        assert!(reg.make_builtin_func("n", HostValue::from(1i64)).is_err());
    }

    #[test]
    fn module_of_functions() {
        let mut reg = Registry::new();
        reg.create_module("math", [("add", add())]).unwrap();
        assert_eq!(eval(&reg, "math.add(1, 1)").to_string(), "2");
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["math"]);
    }

    #[test]
    fn module_validation() {
        let mut reg = Registry::new();
        let err = reg.create_module("", [("add", add())]).unwrap_err();
        assert_eq!(err.to_string(), "module name expected");
        let err = reg.create_module("m", Vec::<(&str, HostValue)>::new()).unwrap_err();
        assert_eq!(err.to_string(), "module m: no functions given");
        let err = reg.create_module("m", [(" ", add())]).unwrap_err();
        assert_eq!(err.to_string(), "blank method name found");
        let err = reg.create_module("m", [("x", HostValue::from("s"))]).unwrap_err();
        assert_eq!(err.to_string(), "func expected for method x");
        assert!(reg.is_empty());
    }

    #[test]
    fn record_module_reads_and_writes() {
        let ty = Type::named(
            "conf.Settings",
            Type::record(vec![Field::new("Port", Type::int64())]),
        );
        let settings = HostValue::pointer_to(&HostValue::record(&ty, [HostValue::from(80i64)]));
        let mut reg = Registry::new();
        reg.set_module("settings", &settings).unwrap();
        assert_eq!(eval(&reg, "settings.port").to_string(), "80");

        let universe = reg.universe();
        Interpreter::new(Thread::new("test", 32), universe)
            .with_freeze_globals(false)
            .execute("m.star", "settings.port = 8080\n", Bindings::new())
            .unwrap();
        let port = settings.elem().and_then(|r| r.field(0)).and_then(|f| f.as_i64());
        assert_eq!(port, Some(8080));
    }

    #[test]
    fn record_module_validation() {
        let mut reg = Registry::new();
        let nil = HostValue::zero(&Type::pointer(Type::record(vec![])));
        assert!(matches!(reg.set_module("m", &nil), Err(Error::Registry(_))));
        let err = reg.set_module("m", &HostValue::from(3i64)).unwrap_err();
        assert!(err.to_string().contains("not a record"), "{err}");
    }
}
