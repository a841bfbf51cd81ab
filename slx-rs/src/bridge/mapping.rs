//! Live script view over a host map.

use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::sequence::arity;
use super::{assign, from_value, make_value, to_value};
use crate::error::{Error, Result};
use crate::host::{Kind, Type, Value as HostValue};
use crate::script::{Guarded, IterToken, MutationGuard, Value};

const WHAT: &str = "host_map";

const METHODS: [&str; 6] = ["clear", "get", "items", "keys", "pop", "values"];

/// A host map seen as a script mapping.
pub struct MappingAdapter {
    value: HostValue,
    guard: MutationGuard,
}

impl MappingAdapter {
    pub fn new(value: HostValue) -> Self {
        trace!(ty = %value.ty(), "binding mapping adapter");
        MappingAdapter {
            value,
            guard: MutationGuard::default(),
        }
    }

    pub fn host_value(&self) -> &HostValue {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn freeze(&self) {
        self.guard.freeze();
    }

    fn coerce(&self, ty: Option<&Type>, v: &Value) -> Result<HostValue> {
        let ty = ty.cloned().unwrap_or_else(Type::any);
        let slot = make_value(&ty)?;
        assign(&slot, &from_value(v))?;
        Ok(slot)
    }

    fn host_key(&self, key: &Value) -> Result<HostValue> {
        self.coerce(self.value.ty().key(), key)
    }

    /// Value under `key`; `Ok(None)` when absent.
    pub fn get(&self, key: &Value) -> Result<Option<Value>> {
        let k = self.host_key(key)?;
        Ok(self.value.map_get(&k)?.map(|v| to_value(&v.copied())))
    }

    /// Coerce `key` and `value` to the host types and store them.
    pub fn set(&self, key: &Value, value: &Value) -> Result<()> {
        self.guard.check(WHAT)?;
        let k = self.host_key(key)?;
        let v = self.coerce(self.value.ty().elem(), value)?;
        self.value.map_insert(&k, &v)
    }

    /// Remove `key`, returning its prior value if it was present.
    pub fn delete(&self, key: &Value) -> Result<Option<Value>> {
        self.guard.check(WHAT)?;
        let k = self.host_key(key)?;
        let prior = self.value.map_get(&k)?.map(|v| to_value(&v.copied()));
        self.value.map_remove(&k)?;
        Ok(prior)
    }

    pub fn clear(&self) -> Result<()> {
        self.guard.check(WHAT)?;
        self.value.map_clear();
        Ok(())
    }

    /// Eager snapshot of the keys.
    pub fn keys(&self) -> Vec<Value> {
        self.value.map_keys().iter().map(to_value).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.value
            .map_entries()
            .iter()
            .map(|(_, v)| to_value(&v.copied()))
            .collect()
    }

    /// Eager snapshot of `(key, value)` pairs.
    pub fn items(&self) -> Vec<(Value, Value)> {
        self.value
            .map_entries()
            .iter()
            .map(|(k, v)| (to_value(k), to_value(&v.copied())))
            .collect()
    }

    /// Iterate keys; structural mutation fails until the iterator drops.
    pub fn iterate(self: &Rc<Self>) -> MappingIter {
        MappingIter {
            keys: self.value.map_keys().into_iter(),
            _token: IterToken::new(self.clone()),
        }
    }

    /// Script-visible methods, then textual keys read as attributes.
    pub fn attr(self: &Rc<Self>, name: &str) -> Option<Value> {
        if let Some(method) = self.method(name) {
            return Some(method);
        }
        if self.value.ty().key().map(Type::kind) != Some(Kind::String) {
            return None;
        }
        self.get(&Value::str(name)).ok().flatten()
    }

    pub fn attr_names(&self) -> Vec<String> {
        METHODS.map(String::from).to_vec()
    }

    fn method(self: &Rc<Self>, name: &str) -> Option<Value> {
        let this = self.clone();
        let method = match name {
            "get" => Value::builtin("get", move |_, args| match args {
                [k] => Ok(this.get(k)?.unwrap_or(Value::None)),
                [k, default] => Ok(this.get(k)?.unwrap_or_else(|| default.clone())),
                _ => Err(arity("get", 1, args.len())),
            }),
            "pop" => Value::builtin("pop", move |_, args| match args {
                [k] => this
                    .delete(k)?
                    .ok_or_else(|| Error::script(format!("pop: key {} not found", k.repr()))),
                [k, default] => Ok(this.delete(k)?.unwrap_or_else(|| default.clone())),
                _ => Err(arity("pop", 1, args.len())),
            }),
            "keys" => Value::builtin("keys", move |_, args| {
                no_args("keys", args)?;
                Ok(Value::list(this.keys()))
            }),
            "values" => Value::builtin("values", move |_, args| {
                no_args("values", args)?;
                Ok(Value::list(this.values()))
            }),
            "items" => Value::builtin("items", move |_, args| {
                no_args("items", args)?;
                let pairs = this
                    .items()
                    .into_iter()
                    .map(|(k, v)| Value::tuple(vec![k, v]))
                    .collect();
                Ok(Value::list(pairs))
            }),
            "clear" => Value::builtin("clear", move |_, args| {
                no_args("clear", args)?;
                this.clear()?;
                Ok(Value::None)
            }),
            _ => return None,
        };
        Some(method)
    }
}

fn no_args(name: &str, args: &[Value]) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(arity(name, 0, args.len()))
    }
}

impl Guarded for MappingAdapter {
    fn guard(&self) -> &MutationGuard {
        &self.guard
    }
}

impl fmt::Display for MappingAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Key iterator over a [`MappingAdapter`].
pub struct MappingIter {
    keys: std::vec::IntoIter<HostValue>,
    _token: IterToken,
}

impl Iterator for MappingIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.keys.next().map(|k| to_value(&k))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
