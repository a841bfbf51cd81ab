//! Kind-directed conversion between host and script values.

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use tracing::{debug, warn};

use super::func::{HostFunction, ScriptCallable};
use super::{MappingAdapter, OpaqueAdapter, RecordAdapter, SequenceAdapter};
use crate::error::{Error, Result};
use crate::host::value::Data;
use crate::host::{Kind, Type, Value as HostValue};
use crate::script::{Dict, Value};

/// Convert a host value into its script-facing form.  Kinds with no script
/// representation degrade to `None`.
pub fn to_value(host: &HostValue) -> Value {
    try_to_value(host).unwrap_or_else(|err| {
        debug!(%err, "host value degraded to None");
        Value::None
    })
}

/// Like [`to_value`] but reports unsupported kinds as
/// [`Error::UnsupportedHostKind`].
pub fn try_to_value(host: &HostValue) -> Result<Value> {
    let ty = host.ty();
    Ok(match ty.kind() {
        Kind::Bool
        | Kind::Int
        | Kind::Uint
        | Kind::Float
        | Kind::BigInt
        | Kind::String
        | Kind::Bytes
        | Kind::Time
        | Kind::Duration => scalar(&host.data()),
        Kind::Slice | Kind::Array => Value::Sequence(Rc::new(SequenceAdapter::new(host.clone()))),
        Kind::Map => Value::Mapping(Rc::new(MappingAdapter::new(host.clone()))),
        Kind::Record => Value::Record(Rc::new(RecordAdapter::bind(None, host)?)),
        Kind::Pointer => match host.elem() {
            None => Value::None,
            Some(pointee) if pointee.kind() == Kind::Record => {
                Value::Record(Rc::new(RecordAdapter::bind(None, host)?))
            }
            Some(pointee) => try_to_value(&pointee.copied())?,
        },
        Kind::Func => {
            if host.is_nil() {
                return Ok(Value::None);
            }
            match HostFunction::new("", host.clone()) {
                Ok(f) => f.into_value(),
                Err(err) => {
                    debug!(%err, ty = %ty, "host function not bindable");
                    Value::None
                }
            }
        }
        Kind::Interface => match host.elem() {
            None => Value::None,
            Some(inner) if ty.is_any() => try_to_value(&inner)?,
            Some(_) => Value::Opaque(Rc::new(OpaqueAdapter::new(host.clone()))),
        },
        Kind::Error => {
            if host.is_nil() {
                Value::None
            } else {
                Value::Opaque(Rc::new(OpaqueAdapter::new(host.clone())))
            }
        }
        Kind::Handle => {
            let Some(handle) = host.as_handle() else {
                return Ok(Value::None);
            };
            match handle.downcast_ref::<ScriptCallable>() {
                Some(callable) => callable.value().clone(),
                None => Value::Opaque(Rc::new(OpaqueAdapter::new(host.clone()))),
            }
        }
        Kind::Channel | Kind::UnsafePointer | Kind::Complex => {
            return Err(Error::UnsupportedHostKind(ty.to_string()))
        }
    })
}

fn scalar(data: &Data) -> Value {
    match data {
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(n) => Value::Int(BigInt::from(*n)),
        Data::Uint(n) => Value::Int(BigInt::from(*n)),
        Data::Float(x) => Value::Float(*x),
        Data::BigInt(n) => Value::Int(n.clone()),
        Data::Str(s) => Value::str(s),
        Data::Bytes(b) => Value::bytes(b),
        Data::Time(t) => Value::Time(*t),
        Data::Duration(d) => Value::Duration(*d),
        _ => Value::None,
    }
}

/// Convert a script value into an untyped host value.
///
/// Lists, tuples, and sets become `[]interface {}`; dicts become
/// `map[string]interface {}` when every key is a string and
/// `map[interface {}]interface {}` otherwise.  Adapters unwrap to the host
/// value they are bound to.
pub fn from_value(v: &Value) -> HostValue {
    match v {
        Value::None | Value::Module(_) => HostValue::nil(),
        Value::Bool(b) => HostValue::from(*b),
        Value::Int(n) => int_to_host(n),
        Value::Float(x) => HostValue::from(*x),
        Value::Str(s) => HostValue::from(&**s),
        Value::Bytes(b) => HostValue::bytes(b.to_vec()),
        Value::Time(t) => HostValue::from(*t),
        Value::Duration(d) => HostValue::from(*d),
        Value::List(l) => any_slice(&l.items()),
        Value::Tuple(items) => any_slice(items),
        Value::Set(s) => any_slice(&s.items()),
        Value::Dict(d) => dict_to_host(d),
        Value::Function(_) | Value::Builtin(_) => {
            HostValue::handle(Rc::new(ScriptCallable::new(v.clone())))
        }
        Value::Sequence(a) => a.host_value().clone(),
        Value::Mapping(a) => a.host_value().clone(),
        Value::Record(a) => a.host_value(),
        Value::Opaque(a) => a.host_value().clone(),
    }
}

fn int_to_host(n: &BigInt) -> HostValue {
    if let Some(i) = n.to_i64() {
        HostValue::from(i)
    } else if let Some(u) = n.to_u64() {
        HostValue::from(u)
    } else {
        HostValue::from(n.clone())
    }
}

fn any_slice(items: &[Value]) -> HostValue {
    HostValue::slice(Type::any(), items.iter().map(from_value))
}

fn dict_to_host(d: &Dict) -> HostValue {
    let items = d.items();
    let textual = items.iter().all(|(k, _)| matches!(k, Value::Str(_)));
    let key_ty = if textual { Type::string() } else { Type::any() };
    let map = HostValue::map(key_ty, Type::any());
    for (k, v) in &items {
        if let Err(err) = map.map_insert(&from_value(k), &from_value(v)) {
            warn!(key = %k.repr(), %err, "dict entry has no host key form");
        }
    }
    map
}

// ── Tests ─────────────────────────────────────────────────────────────────────
