//! Function adapters in both directions.
//!
//! [`HostFunction`] lets script code call a host function: arguments are
//! coerced into typed slots, a trailing non-nil error becomes the call's
//! failure, and remaining results collapse to `None`, a single value, or a
//! tuple.  [`bind_script_func`] goes the other way and synthesizes a host
//! function of a declared signature whose body calls into the script.

use std::rc::Rc;

use tracing::{debug, trace};

use super::{assign, from_value, make_value, to_value};
use crate::error::{Error, Result};
use crate::host::{HostError, HostFn, Signature, Type, Value as HostValue};
use crate::script::{self, Builtin, Thread, Value, DEFAULT_MAX_DEPTH};

// ── Host → script ─────────────────────────────────────────────────────────────

/// A host function callable from script code.
pub struct HostFunction {
    name: String,
    func: HostValue,
    sig: Rc<Signature>,
}

impl HostFunction {
    /// Wrap a non-nil host function value.
    pub fn new(name: &str, func: HostValue) -> Result<Self> {
        let func = func.concrete();
        let Some(sig) = func.ty().signature().cloned() else {
            return Err(Error::conversion(func.ty(), "func"));
        };
        if func.is_nil() {
            return Err(Error::conversion("nil func", func.ty()));
        }
        let name = if name.is_empty() { "anonymous" } else { name };
        Ok(HostFunction {
            name: name.to_string(),
            func,
            sig,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.sig
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        let sig = &self.sig;
        let fixed = sig.fixed_arity();
        let arity_ok = if sig.variadic {
            args.len() >= fixed
        } else {
            args.len() == fixed
        };
        if !arity_ok {
            return Err(Error::ArgumentCount {
                name: self.name.clone(),
                expected: fixed,
                actual: args.len(),
                variadic: sig.variadic,
            });
        }

        let mut host_args = Vec::with_capacity(sig.params.len());
        for (arg, ty) in args.iter().zip(&sig.params[..fixed]) {
            host_args.push(coerce_arg(ty, arg)?);
        }
        if let (Some(elem), Some(slice_ty)) = (sig.variadic_elem(), sig.params.last()) {
            let rest = HostValue::new(slice_ty);
            for arg in &args[fixed..] {
                rest.push(&coerce_arg(elem, arg)?);
            }
            host_args.push(rest);
        }

        trace!(name = %self.name, argc = args.len(), "calling host function");
        let results = self.func.call(&host_args)?;
        self.convert_results(results)
    }

    fn convert_results(&self, mut results: Vec<HostValue>) -> Result<Value> {
        if results.len() != self.sig.results.len() {
            return Err(Error::Host(HostError::msg(format!(
                "{}: returned {} values, want {}",
                self.name,
                results.len(),
                self.sig.results.len()
            ))));
        }
        if self.sig.returns_error() {
            if let Some(err) = results.pop().and_then(|e| e.as_error()) {
                return Err(Error::Host(err));
            }
        }
        Ok(match results.as_slice() {
            [] => Value::None,
            [single] => to_value(single),
            many => Value::tuple(many.iter().map(to_value).collect()),
        })
    }

    /// Expose as a script builtin.
    pub fn into_value(self) -> Value {
        let name = self.name.clone();
        Value::Builtin(Rc::new(Builtin::new(name, move |_, args| self.call(args))))
    }
}

fn coerce_arg(ty: &Type, arg: &Value) -> Result<HostValue> {
    let slot = make_value(ty)?;
    assign(&slot, &from_value(arg))?;
    Ok(slot)
}

// ── Script → host ─────────────────────────────────────────────────────────────

/// A script function or builtin carried through host code as a handle.
#[derive(Clone)]
pub struct ScriptCallable {
    func: Value,
    thread: Thread,
}

impl ScriptCallable {
    /// Script functions keep their defining thread, so call depth keeps
    /// counting across script → host → script hops.
    pub fn new(func: Value) -> Self {
        let thread = match &func {
            Value::Function(f) => f.thread().clone(),
            _ => Thread::new("host-callback", DEFAULT_MAX_DEPTH),
        };
        ScriptCallable { func, thread }
    }

    pub fn value(&self) -> &Value {
        &self.func
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Value> {
        script::call(&self.thread, &self.func, args)
    }
}

/// Synthesize a host function with signature `sig` that calls `func`.
///
/// The signature must end in an error result; script failures are
/// reported there.
pub fn bind_script_func(func: &Value, sig: Signature) -> Result<HostValue> {
    if !matches!(func, Value::Function(_) | Value::Builtin(_)) {
        return Err(Error::conversion(func.type_name(), "func"));
    }
    synthesize(ScriptCallable::new(func.clone()), &Type::func(sig))
}

pub(crate) fn synthesize(callable: ScriptCallable, ty: &Type) -> Result<HostValue> {
    let Some(sig) = ty.signature().cloned() else {
        return Err(Error::conversion("script function", ty));
    };
    if !sig.returns_error() {
        return Err(Error::MissingErrorSlot(ty.to_string()));
    }
    let body: HostFn = Rc::new(move |args: &[HostValue]| invoke(&callable, &sig, args));
    Ok(HostValue::func_of_type(ty, body))
}

fn invoke(callable: &ScriptCallable, sig: &Signature, args: &[HostValue]) -> Vec<HostValue> {
    let results: Vec<HostValue> = sig.results.iter().map(HostValue::new).collect();
    let value_slots = &results[..results.len().saturating_sub(1)];
    let outcome = callable
        .call(script_args(sig, args))
        .and_then(|ret| store_results(&ret, value_slots));
    if let Err(err) = outcome {
        debug!(%err, "script callback failed");
        if let Some(slot) = results.last() {
            slot.set(&HostValue::error(HostError::new(err)));
        }
    }
    results
}

fn script_args(sig: &Signature, args: &[HostValue]) -> Vec<Value> {
    let fixed = sig.fixed_arity();
    let mut out = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        if sig.variadic && i >= fixed {
            if arg.is_nil() {
                break;
            }
            out.extend(
                (0..arg.len())
                    .filter_map(|j| arg.index(j))
                    .map(|item| to_value(&item.copied())),
            );
        } else {
            out.push(to_value(arg));
        }
    }
    out
}

/// Tuples fill value slots positionally, up to the shorter of the two;
/// any other result fills the first slot.
fn store_results(ret: &Value, slots: &[HostValue]) -> Result<()> {
    match ret {
        Value::Tuple(items) => {
            for (slot, item) in slots.iter().zip(items.iter()) {
                assign(slot, &from_value(item))?;
            }
        }
        single => {
            if let Some(slot) = slots.first() {
                assign(slot, &from_value(single))?;
            }
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::IntWidth;

    fn add() -> HostFunction {
        let sig = Signature::new(vec![Type::int64(), Type::int64()], vec![Type::int64()]);
        let f = HostValue::func(sig, |args| {
            let sum = args.iter().filter_map(HostValue::as_i64).sum::<i64>();
            vec![HostValue::from(sum)]
        });
        HostFunction::new("add", f).unwrap()
    }

    fn join() -> HostFunction {
        let sig = Signature::variadic(
            vec![Type::string(), Type::slice(Type::string())],
            vec![Type::string()],
        );
        let f = HostValue::func(sig, |args| {
            let sep = args[0].as_string().unwrap_or_default();
            let parts: Vec<String> = (0..args[1].len())
                .filter_map(|i| args[1].index(i).and_then(|v| v.as_string()))
                .collect();
            vec![HostValue::from(parts.join(&sep))]
        });
        HostFunction::new("join", f).unwrap()
    }

    fn parse() -> HostFunction {
        let sig = Signature::new(vec![Type::string()], vec![Type::int(IntWidth::Word), Type::error()]);
        let f = HostValue::func(sig, |args| {
            let text = args[0].as_string().unwrap_or_default();
            match text.parse::<isize>() {
                Ok(n) => vec![HostValue::from(n), HostValue::nil_error()],
                Err(e) => vec![HostValue::from(0isize), HostValue::error(HostError::new(e))],
            }
        });
        HostFunction::new("parse", f).unwrap()
    }

    #[test]
    fn fixed_arity_is_exact() {
        let f = add();
        assert_eq!(f.call(&[Value::from(2i64), Value::from(3i64)]).unwrap(), Value::from(5i64));
        let err = f
            .call(&[Value::from(1i64), Value::from(2i64), Value::from(3i64)])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ArgumentCount { expected: 2, actual: 3, variadic: false, .. }
        ));
    }

    #[test]
    fn variadic_requires_fixed_prefix() {
        let f = join();
        assert!(matches!(f.call(&[]), Err(Error::ArgumentCount { variadic: true, .. })));
        assert_eq!(f.call(&[Value::from("-")]).unwrap(), Value::from(""));
        let args: Vec<Value> = ["-", "a", "b", "c", "d"].into_iter().map(Value::from).collect();
        assert_eq!(f.call(&args).unwrap(), Value::from("a-b-c-d"));
    }

    #[test]
    fn arguments_are_coerced() {
        let f = add();
        assert!(f.call(&[Value::from(2.9), Value::from(true)]).is_err());
        assert_eq!(f.call(&[Value::from(2.9), Value::from(1i64)]).unwrap(), Value::from(3i64));
    }

    #[test]
    fn error_sentinel() {
        let f = parse();
        assert_eq!(f.call(&[Value::from("7")]).unwrap(), Value::from(7i64));
        let err = f.call(&[Value::from("seven")]).unwrap_err();
        let Error::Host(host) = err else {
            panic!("expected a host error");
        };
        assert!(host.downcast_ref::<std::num::ParseIntError>().is_some());
    }

    #[test]
    fn multiple_results_become_a_tuple() {
        let sig = Signature::new(vec![], vec![Type::string(), Type::bool(), Type::error()]);
        let f = HostValue::func(sig, |_| {
            vec![HostValue::from("ok"), HostValue::from(true), HostValue::nil_error()]
        });
        let out = HostFunction::new("pair", f).unwrap().call(&[]).unwrap();
        assert_eq!(out, Value::tuple(vec![Value::from("ok"), Value::from(true)]));
    }

    #[test]
    fn no_results_is_none() {
        let f = HostValue::func(Signature::new(vec![], vec![]), |_| vec![]);
        assert_eq!(HostFunction::new("", f).unwrap().call(&[]).unwrap(), Value::None);
    }

    #[test]
    fn nil_funcs_do_not_bind() {
        let nil = HostValue::zero(&Type::func(Signature::new(vec![], vec![])));
        assert!(HostFunction::new("f", nil).is_err());
        assert!(HostFunction::new("f", HostValue::from(1i64)).is_err());
    }

    fn echo_builtin() -> Value {
        Value::builtin("echo", |_, args| Ok(Value::tuple(args.to_vec())))
    }

    #[test]
    fn synthesis_requires_error_slot() {
        let sig = Signature::new(vec![], vec![Type::int64()]);
        assert!(matches!(
            bind_script_func(&echo_builtin(), sig),
            Err(Error::MissingErrorSlot(_))
        ));
    }

    #[test]
    fn synthesized_func_maps_tuple_results() {
        let sig = Signature::new(
            vec![Type::int64(), Type::string()],
            vec![Type::int64(), Type::string(), Type::error()],
        );
        let f = bind_script_func(&echo_builtin(), sig).unwrap();
        let out = f.call(&[HostValue::from(4i64), HostValue::from("x")]).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_i64(), Some(4));
        assert_eq!(out[1].as_string().as_deref(), Some("x"));
        assert!(out[2].is_nil());
    }

    #[test]
    fn synthesized_variadic_flattens() {
        let sig = Signature::variadic(
            vec![Type::int64(), Type::slice(Type::int64())],
            vec![Type::int64(), Type::error()],
        );
        let count = Value::builtin("count", |_, args| Ok(Value::from(args.len())));
        let f = bind_script_func(&count, sig).unwrap();

        let rest = HostValue::slice(Type::int64(), [HostValue::from(1i64), HostValue::from(2i64)]);
        let out = f.call(&[HostValue::from(0i64), rest]).unwrap();
        assert_eq!(out[0].as_i64(), Some(3));

        let absent = HostValue::zero(&Type::slice(Type::int64()));
        let out = f.call(&[HostValue::from(0i64), absent]).unwrap();
        assert_eq!(out[0].as_i64(), Some(1));
    }

    #[test]
    fn script_failure_lands_in_error_slot() {
        let sig = Signature::new(vec![], vec![Type::int64(), Type::error()]);
        let fail = Value::builtin("fail", |_, _| Err(Error::script("nope")));
        let out = bind_script_func(&fail, sig).unwrap().call(&[]).unwrap();
        assert_eq!(out[0].as_i64(), Some(0));
        let err = out[1].as_error().expect("error slot should be set");
        assert_eq!(err.to_string(), "nope");
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Script(_))));
    }

    #[test]
    fn result_coercion_failure_is_reported() {
        let sig = Signature::new(vec![], vec![Type::int64(), Type::error()]);
        let text = Value::builtin("text", |_, _| Ok(Value::from("not a number")));
        let out = bind_script_func(&text, sig).unwrap().call(&[]).unwrap();
        assert!(out[1].as_error().is_some());
    }

    #[test]
    fn callable_reuses_the_defining_thread() {
        let interp = crate::script::Interpreter::new(Thread::new("home", 3), Rc::default());
        let globals = interp
            .execute("m", "def f():\n    return 1\n", crate::script::Bindings::new())
            .unwrap();
        let callable = ScriptCallable::new(globals["f"].clone());
        assert_eq!(callable.thread.name(), "home");
        assert_eq!(callable.thread.max_depth(), 3);
        assert_eq!(callable.call(vec![]).unwrap(), Value::from(1i64));

        let builtin = ScriptCallable::new(Value::builtin("b", |_, _| Ok(Value::None)));
        assert_eq!(builtin.thread.max_depth(), DEFAULT_MAX_DEPTH);
    }
}
