//! Runtime values of the embedded script language.
//!
//! Native containers (`list`, `dict`, `set`) are reference types with a
//! [`MutationGuard`]; host containers surface as the adapter variants and
//! keep their storage on the host side.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero};

use super::guard::{Guarded, MutationGuard};
use super::interp::{Function, Thread};
use crate::bridge::{MappingAdapter, OpaqueAdapter, RecordAdapter, SequenceAdapter};
use crate::error::{Error, Result};

/// Signature of a native builtin.
pub type NativeFn = dyn Fn(&Thread, &[Value]) -> Result<Value>;

/// A script runtime value.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    List(Rc<List>),
    Tuple(Rc<[Value]>),
    Dict(Rc<Dict>),
    Set(Rc<Set>),
    Function(Rc<Function>),
    Builtin(Rc<Builtin>),
    Module(Rc<Module>),
    Time(SystemTime),
    Duration(Duration),
    /// Host slice or array.
    Sequence(Rc<SequenceAdapter>),
    /// Host map.
    Mapping(Rc<MappingAdapter>),
    /// Host record, viewed through a pointer.
    Record(Rc<RecordAdapter>),
    /// Host interface or error; methods only.
    Opaque(Rc<OpaqueAdapter>),
}

impl Default for Value {
    fn default() -> Self {
        Value::None
    }
}

// ── Hash keys ─────────────────────────────────────────────────────────────────

/// Hashable projection used as a `dict`/`set` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    Bool(bool),
    Int(BigInt),
    Float(u64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    Tuple(Vec<HashKey>),
    Time(SystemTime),
    Duration(Duration),
}

// ── Containers ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct List {
    items: RefCell<Vec<Value>>,
    guard: MutationGuard,
}

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        List {
            items: RefCell::new(items),
            guard: MutationGuard::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<Value> {
        self.items.borrow().get(i).cloned()
    }

    /// Snapshot of the current elements.
    pub fn items(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    pub fn set(&self, i: usize, v: Value) -> Result<()> {
        self.guard.check("list")?;
        let mut items = self.items.borrow_mut();
        let len = items.len();
        match items.get_mut(i) {
            Some(slot) => {
                *slot = v;
                Ok(())
            }
            None => Err(Error::script(format!("list index {i} out of range [0:{len}]"))),
        }
    }

    pub fn append(&self, v: Value) -> Result<()> {
        self.guard.check("list")?;
        self.items.borrow_mut().push(v);
        Ok(())
    }

    pub fn extend(&self, values: Vec<Value>) -> Result<()> {
        self.guard.check("list")?;
        self.items.borrow_mut().extend(values);
        Ok(())
    }

    pub fn pop(&self) -> Result<Value> {
        self.guard.check("list")?;
        self.items
            .borrow_mut()
            .pop()
            .ok_or_else(|| Error::script("pop from empty list"))
    }

    pub fn clear(&self) -> Result<()> {
        self.guard.check("list")?;
        self.items.borrow_mut().clear();
        Ok(())
    }

    fn freeze(&self) {
        if self.guard.is_frozen() {
            return;
        }
        self.guard.freeze();
        for v in self.items.borrow().iter() {
            v.freeze();
        }
    }
}

impl Guarded for List {
    fn guard(&self) -> &MutationGuard {
        &self.guard
    }
}

#[derive(Default)]
pub struct Dict {
    entries: RefCell<IndexMap<HashKey, (Value, Value)>>,
    guard: MutationGuard,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from key/value pairs; later duplicates overwrite earlier ones.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Result<Self> {
        let dict = Dict::new();
        for (k, v) in pairs {
            dict.insert(k, v)?;
        }
        Ok(dict)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>> {
        let k = key.hash_key()?;
        Ok(self.entries.borrow().get(&k).map(|(_, v)| v.clone()))
    }

    pub fn insert(&self, key: Value, value: Value) -> Result<()> {
        self.guard.check("dict")?;
        let k = key.hash_key()?;
        self.entries.borrow_mut().insert(k, (key, value));
        Ok(())
    }

    pub fn remove(&self, key: &Value) -> Result<Option<Value>> {
        self.guard.check("dict")?;
        let k = key.hash_key()?;
        Ok(self.entries.borrow_mut().shift_remove(&k).map(|(_, v)| v))
    }

    pub fn clear(&self) -> Result<()> {
        self.guard.check("dict")?;
        self.entries.borrow_mut().clear();
        Ok(())
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.borrow().values().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.borrow().values().map(|(_, v)| v.clone()).collect()
    }

    pub fn items(&self) -> Vec<(Value, Value)> {
        self.entries.borrow().values().cloned().collect()
    }

    fn freeze(&self) {
        if self.guard.is_frozen() {
            return;
        }
        self.guard.freeze();
        for (k, v) in self.entries.borrow().values() {
            k.freeze();
            v.freeze();
        }
    }
}

impl Guarded for Dict {
    fn guard(&self) -> &MutationGuard {
        &self.guard
    }
}

#[derive(Default)]
pub struct Set {
    items: RefCell<IndexMap<HashKey, Value>>,
    guard: MutationGuard,
}

impl Set {
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Result<Self> {
        let set = Set::default();
        for v in values {
            set.insert(v)?;
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, v: &Value) -> Result<bool> {
        Ok(self.items.borrow().contains_key(&v.hash_key()?))
    }

    pub fn insert(&self, v: Value) -> Result<()> {
        self.guard.check("set")?;
        let k = v.hash_key()?;
        self.items.borrow_mut().insert(k, v);
        Ok(())
    }

    pub fn items(&self) -> Vec<Value> {
        self.items.borrow().values().cloned().collect()
    }
}

impl Guarded for Set {
    fn guard(&self) -> &MutationGuard {
        &self.guard
    }
}

// ── Callables and modules ─────────────────────────────────────────────────────

/// A function implemented natively.
pub struct Builtin {
    name: String,
    func: Box<NativeFn>,
}

impl Builtin {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Thread, &[Value]) -> Result<Value> + 'static,
    {
        Builtin {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, thread: &Thread, args: &[Value]) -> Result<Value> {
        (self.func)(thread, args)
    }
}

/// A named bag of members reachable through attribute access.
pub struct Module {
    pub name: String,
    pub members: IndexMap<String, Value>,
}

// ── Value protocol ────────────────────────────────────────────────────────────

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(List::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::from(items))
    }

    pub fn bytes(b: &[u8]) -> Value {
        Value::Bytes(Rc::from(b))
    }

    pub fn builtin<F>(name: &str, func: F) -> Value
    where
        F: Fn(&Thread, &[Value]) -> Result<Value> + 'static,
    {
        Value::Builtin(Rc::new(Builtin::new(name, func)))
    }

    /// Name reported by `type()`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Module(_) => "module",
            Value::Time(_) => "time",
            Value::Duration(_) => "duration",
            Value::Sequence(_) => "host_list",
            Value::Mapping(_) => "host_map",
            Value::Record(_) => "host_record",
            Value::Opaque(_) => "host_value",
        }
    }

    pub fn truth(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => !n.is_zero(),
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            Value::Dict(d) => !d.is_empty(),
            Value::Set(s) => !s.is_empty(),
            Value::Duration(d) => !d.is_zero(),
            Value::Sequence(a) => a.len() > 0,
            Value::Mapping(a) => a.len() > 0,
            Value::Function(_)
            | Value::Builtin(_)
            | Value::Module(_)
            | Value::Time(_)
            | Value::Record(_)
            | Value::Opaque(_) => true,
        }
    }

    /// Make this value and everything reachable from it immutable.
    pub fn freeze(&self) {
        match self {
            Value::List(l) => l.freeze(),
            Value::Dict(d) => d.freeze(),
            Value::Set(s) => s.guard.freeze(),
            Value::Tuple(items) => items.iter().for_each(Value::freeze),
            Value::Sequence(a) => a.freeze(),
            Value::Mapping(a) => a.freeze(),
            _ => {}
        }
    }

    pub fn hash_key(&self) -> Result<HashKey> {
        Ok(match self {
            Value::None => HashKey::None,
            Value::Bool(b) => HashKey::Bool(*b),
            Value::Int(n) => HashKey::Int(n.clone()),
            Value::Float(x) => match BigInt::from_f64(*x).filter(|_| x.fract() == 0.0) {
                Some(n) => HashKey::Int(n),
                None => HashKey::Float(x.to_bits()),
            },
            Value::Str(s) => HashKey::Str(s.clone()),
            Value::Bytes(b) => HashKey::Bytes(b.clone()),
            Value::Tuple(items) => {
                HashKey::Tuple(items.iter().map(Value::hash_key).collect::<Result<_>>()?)
            }
            Value::Time(t) => HashKey::Time(*t),
            Value::Duration(d) => HashKey::Duration(*d),
            other => return Err(Error::Unhashable(other.type_name().to_string())),
        })
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_int().and_then(ToPrimitive::to_i64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Printable representation, quoting strings.
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 1e16 {
                    format!("{x:.1}")
                } else {
                    format!("{x}")
                }
            }
            Value::Str(s) => quote(s),
            Value::Bytes(b) => {
                let mut out = String::from("b\"");
                for &byte in b.iter() {
                    match byte {
                        b'"' => out.push_str("\\\""),
                        b'\\' => out.push_str("\\\\"),
                        0x20..=0x7e => out.push(byte as char),
                        _ => out.push_str(&format!("\\x{byte:02x}")),
                    }
                }
                out.push('"');
                out
            }
            Value::List(l) => format!("[{}]", join_repr(&l.items())),
            Value::Tuple(t) if t.len() == 1 => format!("({},)", t[0].repr()),
            Value::Tuple(t) => format!("({})", join_repr(t)),
            Value::Dict(d) => {
                let parts: Vec<String> = d
                    .items()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Set(s) => format!("set([{}])", join_repr(&s.items())),
            Value::Function(f) => format!("<function {}>", f.name()),
            Value::Builtin(b) => format!("<built-in function {}>", b.name()),
            Value::Module(m) => format!("<module {}>", m.name),
            Value::Time(t) => match t.duration_since(UNIX_EPOCH) {
                Ok(d) => format!("time({}.{:09})", d.as_secs(), d.subsec_nanos()),
                Err(_) => format!("{t:?}"),
            },
            Value::Duration(d) => format!("{d:?}"),
            Value::Sequence(a) => a.to_string(),
            Value::Mapping(a) => a.to_string(),
            Value::Record(a) => a.to_string(),
            Value::Opaque(a) => a.to_string(),
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn join_repr(items: &[Value]) -> String {
    items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => f.write_str(&other.repr()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                a.to_f64() == Some(*b)
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || a.items() == b.items(),
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => {
                Rc::ptr_eq(a, b)
                    || (a.len() == b.len()
                        && a.items()
                            .iter()
                            .all(|(k, v)| matches!(b.get(k), Ok(Some(w)) if *v == w)))
            }
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.items().iter().all(|v| b.contains(v).unwrap_or(false))
            }
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Sequence(a), Value::Sequence(b)) => {
                Rc::ptr_eq(a, b) || a.host_value().same_storage(b.host_value())
            }
            (Value::Mapping(a), Value::Mapping(b)) => {
                Rc::ptr_eq(a, b) || a.host_value().same_storage(b.host_value())
            }
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ── Conversions from native values ────────────────────────────────────────────

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(BigInt::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(BigInt::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Int(BigInt::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(BigInt::from(n))
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
