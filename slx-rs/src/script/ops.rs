//! Operators, subscripts, attributes, and iteration over script values.
//!
//! Adapter values are dispatched to their bridge adapters here, so the
//! evaluator treats host containers exactly like native ones.

use std::cmp::Ordering;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use super::builtins::check_arity;
use super::expr::{BinOp, UnaryOp};
use super::guard::IterToken;
use super::value::{Dict, List, Value};
use crate::bridge::{MappingIter, SequenceIter};
use crate::error::{Error, Result};

fn symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Rem => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::In => "in",
        BinOp::NotIn => "not in",
    }
}

fn unsupported(op: BinOp, l: &Value, r: &Value) -> Error {
    Error::script(format!(
        "unsupported binary op: {} {} {}",
        l.type_name(),
        symbol(op),
        r.type_name()
    ))
}

// ── Arithmetic ────────────────────────────────────────────────────────────────

fn float_of(v: &Value) -> Option<f64> {
    match v {
        Value::Int(n) => n.to_f64(),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

/// Quotient and remainder rounded toward negative infinity.
fn floor_divmod(a: &BigInt, b: &BigInt) -> (BigInt, BigInt) {
    let q = a / b;
    let r = a % b;
    if !r.is_zero() && r.is_negative() != b.is_negative() {
        (q - 1, r + b)
    } else {
        (q, r)
    }
}

fn int_op(op: BinOp, a: &BigInt, b: &BigInt) -> Result<Value> {
    let needs_divisor = matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Rem);
    if needs_divisor && b.is_zero() {
        return Err(Error::script("integer division by zero"));
    }
    Ok(match op {
        BinOp::Add => Value::Int(a + b),
        BinOp::Sub => Value::Int(a - b),
        BinOp::Mul => Value::Int(a * b),
        BinOp::Div => Value::Float(a.to_f64().unwrap_or(f64::NAN) / b.to_f64().unwrap_or(f64::NAN)),
        BinOp::FloorDiv => Value::Int(floor_divmod(a, b).0),
        BinOp::Rem => Value::Int(floor_divmod(a, b).1),
        _ => return Err(Error::script(format!("unsupported int op {}", symbol(op)))),
    })
}

fn float_op(op: BinOp, a: f64, b: f64) -> Result<Value> {
    if matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Rem) && b == 0.0 {
        return Err(Error::script("floating-point division by zero"));
    }
    Ok(Value::Float(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Rem => {
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        _ => return Err(Error::script(format!("unsupported float op {}", symbol(op)))),
    }))
}

fn repeat(items: &[Value], n: &BigInt) -> Vec<Value> {
    let n = n.to_usize().unwrap_or(0);
    let mut out = Vec::with_capacity(items.len() * n);
    for _ in 0..n {
        out.extend_from_slice(items);
    }
    out
}

/// Apply a binary operator.  `and`/`or` short-circuit in the evaluator and
/// never reach here.
pub fn binary(op: BinOp, l: &Value, r: &Value) -> Result<Value> {
    match op {
        BinOp::Eq => return Ok(Value::Bool(l == r)),
        BinOp::Ne => return Ok(Value::Bool(l != r)),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ord = compare(l, r).map_err(|_| unsupported(op, l, r))?;
            let hit = match op {
                BinOp::Lt => ord == Some(Ordering::Less),
                BinOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
                BinOp::Gt => ord == Some(Ordering::Greater),
                _ => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            };
            return Ok(Value::Bool(hit));
        }
        BinOp::In => return contains(r, l).map(Value::Bool),
        BinOp::NotIn => return contains(r, l).map(|found| Value::Bool(!found)),
        _ => {}
    }

    match (l, r) {
        (Value::Int(a), Value::Int(b)) => return int_op(op, a, b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            if let (Some(a), Some(b)) = (float_of(l), float_of(r)) {
                return float_op(op, a, b);
            }
        }
        _ => {}
    }

    let out = match (op, l, r) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Value::from(format!("{a}{b}")),
        (BinOp::Add, Value::Bytes(a), Value::Bytes(b)) => Value::bytes(&[&a[..], &b[..]].concat()),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.items();
            items.extend(b.items());
            Value::list(items)
        }
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => Value::tuple([&a[..], &b[..]].concat()),
        (BinOp::Add, Value::Time(t), Value::Duration(d))
        | (BinOp::Add, Value::Duration(d), Value::Time(t)) => t
            .checked_add(*d)
            .map(Value::Time)
            .ok_or_else(|| Error::script("time overflow"))?,
        (BinOp::Add, Value::Duration(a), Value::Duration(b)) => a
            .checked_add(*b)
            .map(Value::Duration)
            .ok_or_else(|| Error::script("duration overflow"))?,
        (BinOp::Sub, Value::Time(a), Value::Time(b)) => a
            .duration_since(*b)
            .map(Value::Duration)
            .map_err(|_| Error::script("negative duration"))?,
        (BinOp::Sub, Value::Time(t), Value::Duration(d)) => t
            .checked_sub(*d)
            .map(Value::Time)
            .ok_or_else(|| Error::script("time overflow"))?,
        (BinOp::Sub, Value::Duration(a), Value::Duration(b)) => a
            .checked_sub(*b)
            .map(Value::Duration)
            .ok_or_else(|| Error::script("negative duration"))?,
        (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
            Value::from(s.repeat(n.to_usize().unwrap_or(0)))
        }
        (BinOp::Mul, Value::List(l), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::List(l)) => {
            Value::list(repeat(&l.items(), n))
        }
        (BinOp::Mul, Value::Tuple(t), Value::Int(n))
        | (BinOp::Mul, Value::Int(n), Value::Tuple(t)) => Value::tuple(repeat(t, n)),
        (BinOp::Mul, Value::Duration(d), Value::Int(n))
        | (BinOp::Mul, Value::Int(n), Value::Duration(d)) => n
            .to_u32()
            .and_then(|n| d.checked_mul(n))
            .map(Value::Duration)
            .ok_or_else(|| Error::script("duration overflow"))?,
        _ => return Err(unsupported(op, l, r)),
    };
    Ok(out)
}

pub fn unary(op: UnaryOp, v: &Value) -> Result<Value> {
    match (op, v) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.truth())),
        (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(-n)),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Pos, Value::Int(_) | Value::Float(_)) => Ok(v.clone()),
        (op, v) => {
            let sym = if op == UnaryOp::Neg { "-" } else { "+" };
            Err(Error::script(format!("unsupported unary op: {sym}{}", v.type_name())))
        }
    }
}

// ── Comparison ────────────────────────────────────────────────────────────────

/// Ordering of two values; `Ok(None)` for unordered floats (NaN).
pub fn compare(l: &Value, r: &Value) -> Result<Option<Ordering>> {
    Ok(match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            float_of(l).zip(float_of(r)).and_then(|(a, b)| a.partial_cmp(&b))
        }
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
        (Value::Tuple(a), Value::Tuple(b)) => compare_seq(a, b)?,
        (Value::List(a), Value::List(b)) => compare_seq(&a.items(), &b.items())?,
        _ => {
            return Err(Error::script(format!(
                "cannot compare {} with {}",
                l.type_name(),
                r.type_name()
            )))
        }
    })
}

fn compare_seq(a: &[Value], b: &[Value]) -> Result<Option<Ordering>> {
    for (x, y) in a.iter().zip(b) {
        if x != y {
            return compare(x, y);
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

/// `item in container`.
pub fn contains(container: &Value, item: &Value) -> Result<bool> {
    Ok(match container {
        Value::List(l) => l.items().contains(item),
        Value::Tuple(t) => t.contains(item),
        Value::Dict(d) => d.get(item)?.is_some(),
        Value::Set(s) => s.contains(item)?,
        Value::Str(s) => match item {
            Value::Str(sub) => s.contains(&**sub),
            other => {
                return Err(Error::script(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                )))
            }
        },
        Value::Bytes(b) => match item {
            Value::Bytes(sub) if sub.is_empty() => true,
            Value::Bytes(sub) => b.windows(sub.len()).any(|w| w == &sub[..]),
            Value::Int(n) => n.to_u8().is_some_and(|byte| b.contains(&byte)),
            other => {
                return Err(Error::script(format!(
                    "'in <bytes>' requires bytes or int as left operand, not {}",
                    other.type_name()
                )))
            }
        },
        Value::Sequence(a) => (0..a.len()).any(|i| a.get(i).is_ok_and(|v| v == *item)),
        Value::Mapping(a) => a.get(item)?.is_some(),
        other => {
            return Err(Error::script(format!(
                "unsupported 'in' operand: {}",
                other.type_name()
            )))
        }
    })
}

// ── Subscripts ────────────────────────────────────────────────────────────────

fn int_arg(v: &Value, what: &str) -> Result<i64> {
    v.as_i64()
        .ok_or_else(|| Error::script(format!("{what} must be int, not {}", v.type_name())))
}

/// Resolve a possibly negative index against `len`.
pub fn normalize_index(index: &Value, len: usize) -> Result<usize> {
    let i = int_arg(index, "index")?;
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let adjusted = if i < 0 { i + len_i } else { i };
    if (0..len_i).contains(&adjusted) {
        Ok(adjusted as usize)
    } else {
        Err(Error::script(format!("index {i} out of range [0:{len}]")))
    }
}

fn key_not_found(key: &Value) -> Error {
    Error::script(format!("key {} not found", key.repr()))
}

pub fn index(target: &Value, idx: &Value) -> Result<Value> {
    match target {
        Value::List(l) => {
            let i = normalize_index(idx, l.len())?;
            l.get(i).ok_or_else(|| Error::script(format!("index {i} out of range")))
        }
        Value::Tuple(t) => Ok(t[normalize_index(idx, t.len())?].clone()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = normalize_index(idx, chars.len())?;
            Ok(Value::from(chars[i].to_string()))
        }
        Value::Bytes(b) => Ok(Value::from(i64::from(b[normalize_index(idx, b.len())?]))),
        Value::Dict(d) => d.get(idx)?.ok_or_else(|| key_not_found(idx)),
        Value::Sequence(a) => a.get(normalize_index(idx, a.len())?),
        Value::Mapping(a) => a.get(idx)?.ok_or_else(|| key_not_found(idx)),
        other => Err(Error::script(format!("{} is not subscriptable", other.type_name()))),
    }
}

/// Resolved `[start:end:step]` bounds for a sequence of `len` elements,
/// with Python clamping rules.
pub fn slice_bounds(len: usize, start: Option<i64>, end: Option<i64>, step: i64) -> (i64, i64) {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let clamp = |x: i64, lo: i64, hi: i64| {
        let x = if x < 0 { x + len } else { x };
        x.clamp(lo, hi)
    };
    if step > 0 {
        (
            start.map_or(0, |s| clamp(s, 0, len)),
            end.map_or(len, |e| clamp(e, 0, len)),
        )
    } else {
        (
            start.map_or(len - 1, |s| clamp(s, -1, len - 1)),
            end.map_or(-1, |e| clamp(e, -1, len - 1)),
        )
    }
}

fn pick<T: Clone>(items: &[T], start: i64, end: i64, step: i64) -> Vec<T> {
    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < end) || (step < 0 && i > end) {
        if let Some(item) = usize::try_from(i).ok().and_then(|i| items.get(i)) {
            out.push(item.clone());
        }
        // a step past i64 range ends the walk
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    out
}

pub fn slice(target: &Value, start: &Value, end: &Value, step: &Value) -> Result<Value> {
    let opt = |v: &Value, what| match v {
        Value::None => Ok(None),
        v => int_arg(v, what).map(Some),
    };
    let step = opt(step, "slice step")?.unwrap_or(1);
    if step == 0 {
        return Err(Error::script("slice step cannot be zero"));
    }
    let (start, end) = (opt(start, "slice start")?, opt(end, "slice end")?);

    Ok(match target {
        Value::List(l) => {
            let items = l.items();
            let (s, e) = slice_bounds(items.len(), start, end, step);
            Value::list(pick(&items, s, e, step))
        }
        Value::Tuple(t) => {
            let (s, e) = slice_bounds(t.len(), start, end, step);
            Value::tuple(pick(t, s, e, step))
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let (s, e) = slice_bounds(chars.len(), start, end, step);
            Value::from(pick(&chars, s, e, step).into_iter().collect::<String>())
        }
        Value::Bytes(b) => {
            let (s, e) = slice_bounds(b.len(), start, end, step);
            Value::bytes(&pick(b, s, e, step))
        }
        Value::Sequence(a) => {
            let (s, e) = slice_bounds(a.len(), start, end, step);
            a.slice(s, e, step)?
        }
        other => return Err(Error::script(format!("{} is not sliceable", other.type_name()))),
    })
}

pub fn set_index(target: &Value, idx: &Value, value: Value) -> Result<()> {
    match target {
        Value::List(l) => l.set(normalize_index(idx, l.len())?, value),
        Value::Dict(d) => d.insert(idx.clone(), value),
        Value::Sequence(a) => a.set(normalize_index(idx, a.len())?, &value),
        Value::Mapping(a) => a.set(idx, &value),
        other => Err(Error::script(format!(
            "{} does not support item assignment",
            other.type_name()
        ))),
    }
}

pub fn len(v: &Value) -> Option<usize> {
    Some(match v {
        Value::Str(s) => s.chars().count(),
        Value::Bytes(b) => b.len(),
        Value::List(l) => l.len(),
        Value::Tuple(t) => t.len(),
        Value::Dict(d) => d.len(),
        Value::Set(s) => s.len(),
        Value::Sequence(a) => a.len(),
        Value::Mapping(a) => a.len(),
        _ => return None,
    })
}

// ── Attributes ────────────────────────────────────────────────────────────────

/// Attribute lookup; `None` when the value has no such attribute.
pub fn attr(v: &Value, name: &str) -> Option<Value> {
    match v {
        Value::List(l) => list_method(l, name),
        Value::Dict(d) => dict_method(d, name),
        Value::Str(s) => str_method(s, name),
        Value::Module(m) => m.members.get(name).cloned(),
        Value::Sequence(a) => a.attr(name),
        Value::Mapping(a) => a.attr(name),
        Value::Record(a) => a.attr(name),
        Value::Opaque(a) => a.attr(name),
        _ => None,
    }
}

/// Attribute read as seen by `x.name`.  Host records, maps, and opaque
/// values report a miss as `None`; everything else raises.
pub fn get_attr(v: &Value, name: &str) -> Result<Value> {
    if let Some(found) = attr(v, name) {
        return Ok(found);
    }
    match v {
        Value::Record(_) | Value::Opaque(_) | Value::Mapping(_) => Ok(Value::None),
        other => Err(Error::script(format!(
            "{} has no .{name} field or method",
            other.type_name()
        ))),
    }
}

pub fn set_attr(v: &Value, name: &str, value: &Value) -> Result<()> {
    match v {
        Value::Record(a) => a.set_field(name, value),
        other => Err(Error::script(format!(
            "can't assign to .{name} field of {}",
            other.type_name()
        ))),
    }
}

/// Names reported by `dir()`.
pub fn attr_names(v: &Value) -> Vec<String> {
    let fixed: &[&str] = match v {
        Value::List(_) => &LIST_METHODS,
        Value::Dict(_) => &DICT_METHODS,
        Value::Str(_) => &STR_METHODS,
        Value::Module(m) => return m.members.keys().cloned().collect(),
        Value::Sequence(a) => return a.attr_names(),
        Value::Mapping(a) => return a.attr_names(),
        Value::Record(a) => return a.attr_names(),
        Value::Opaque(a) => return a.attr_names(),
        _ => &[],
    };
    fixed.iter().map(|s| s.to_string()).collect()
}

const LIST_METHODS: [&str; 5] = ["append", "clear", "extend", "index", "pop"];
const DICT_METHODS: [&str; 7] = ["clear", "get", "items", "keys", "pop", "update", "values"];
const STR_METHODS: [&str; 10] = [
    "count", "endswith", "format", "join", "lower", "replace", "split", "startswith", "strip",
    "upper",
];

fn list_method(l: &Rc<List>, name: &str) -> Option<Value> {
    let l = l.clone();
    Some(match name {
        "append" => Value::builtin("append", move |_, args| {
            check_arity("append", args, 1, 1)?;
            l.append(args[0].clone())?;
            Ok(Value::None)
        }),
        "extend" => Value::builtin("extend", move |_, args| {
            check_arity("extend", args, 1, 1)?;
            let items: Vec<Value> = iterate(&args[0])?.collect();
            l.extend(items)?;
            Ok(Value::None)
        }),
        "pop" => Value::builtin("pop", move |_, args| {
            check_arity("pop", args, 0, 0)?;
            l.pop()
        }),
        "clear" => Value::builtin("clear", move |_, args| {
            check_arity("clear", args, 0, 0)?;
            l.clear()?;
            Ok(Value::None)
        }),
        "index" => Value::builtin("index", move |_, args| {
            check_arity("index", args, 1, 1)?;
            l.items()
                .iter()
                .position(|v| *v == args[0])
                .map(Value::from)
                .ok_or_else(|| Error::script(format!("index: {} not in list", args[0].repr())))
        }),
        _ => return None,
    })
}

fn dict_method(d: &Rc<Dict>, name: &str) -> Option<Value> {
    let d = d.clone();
    Some(match name {
        "get" => Value::builtin("get", move |_, args| {
            check_arity("get", args, 1, 2)?;
            let default = args.get(1).cloned().unwrap_or_default();
            Ok(d.get(&args[0])?.unwrap_or(default))
        }),
        "pop" => Value::builtin("pop", move |_, args| {
            check_arity("pop", args, 1, 2)?;
            match (d.remove(&args[0])?, args.get(1)) {
                (Some(v), _) => Ok(v),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(key_not_found(&args[0])),
            }
        }),
        "keys" => Value::builtin("keys", move |_, args| {
            check_arity("keys", args, 0, 0)?;
            Ok(Value::list(d.keys()))
        }),
        "values" => Value::builtin("values", move |_, args| {
            check_arity("values", args, 0, 0)?;
            Ok(Value::list(d.values()))
        }),
        "items" => Value::builtin("items", move |_, args| {
            check_arity("items", args, 0, 0)?;
            let pairs = d.items().into_iter().map(|(k, v)| Value::tuple(vec![k, v]));
            Ok(Value::list(pairs.collect()))
        }),
        "clear" => Value::builtin("clear", move |_, args| {
            check_arity("clear", args, 0, 0)?;
            d.clear()?;
            Ok(Value::None)
        }),
        "update" => Value::builtin("update", move |_, args| {
            check_arity("update", args, 1, 1)?;
            for (k, v) in pairs_of(&args[0])? {
                d.insert(k, v)?;
            }
            Ok(Value::None)
        }),
        _ => return None,
    })
}

fn str_arg<'v>(name: &str, v: &'v Value) -> Result<&'v str> {
    v.as_str()
        .ok_or_else(|| Error::script(format!("{name}: want string, got {}", v.type_name())))
}

fn str_method(s: &Rc<str>, name: &str) -> Option<Value> {
    let s = s.clone();
    Some(match name {
        "upper" => Value::builtin("upper", move |_, args| {
            check_arity("upper", args, 0, 0)?;
            Ok(Value::from(s.to_uppercase()))
        }),
        "lower" => Value::builtin("lower", move |_, args| {
            check_arity("lower", args, 0, 0)?;
            Ok(Value::from(s.to_lowercase()))
        }),
        "strip" => Value::builtin("strip", move |_, args| {
            check_arity("strip", args, 0, 0)?;
            Ok(Value::from(s.trim()))
        }),
        "startswith" => Value::builtin("startswith", move |_, args| {
            check_arity("startswith", args, 1, 1)?;
            Ok(Value::Bool(s.starts_with(str_arg("startswith", &args[0])?)))
        }),
        "endswith" => Value::builtin("endswith", move |_, args| {
            check_arity("endswith", args, 1, 1)?;
            Ok(Value::Bool(s.ends_with(str_arg("endswith", &args[0])?)))
        }),
        "count" => Value::builtin("count", move |_, args| {
            check_arity("count", args, 1, 1)?;
            let sub = str_arg("count", &args[0])?;
            Ok(Value::from(if sub.is_empty() { s.chars().count() + 1 } else { s.matches(sub).count() }))
        }),
        "replace" => Value::builtin("replace", move |_, args| {
            check_arity("replace", args, 2, 2)?;
            let (from, to) = (str_arg("replace", &args[0])?, str_arg("replace", &args[1])?);
            Ok(Value::from(s.replace(from, to)))
        }),
        "split" => Value::builtin("split", move |_, args| {
            check_arity("split", args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::from).collect(),
                Some(sep) => {
                    let sep = str_arg("split", sep)?;
                    if sep.is_empty() {
                        return Err(Error::script("split: empty separator"));
                    }
                    s.split(sep).map(Value::from).collect()
                }
            };
            Ok(Value::list(parts))
        }),
        "join" => Value::builtin("join", move |_, args| {
            check_arity("join", args, 1, 1)?;
            let parts = iterate(&args[0])?
                .map(|v| str_arg("join", &v).map(str::to_string))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::from(parts.join(&s[..])))
        }),
        "format" => Value::builtin("format", move |_, args| {
            let mut out = String::with_capacity(s.len());
            let mut rest = &s[..];
            let mut next = args.iter();
            while let Some(at) = rest.find("{}") {
                out.push_str(&rest[..at]);
                let arg = next
                    .next()
                    .ok_or_else(|| Error::script("format: not enough arguments"))?;
                out.push_str(&arg.to_string());
                rest = &rest[at + 2..];
            }
            out.push_str(rest);
            Ok(Value::from(out))
        }),
        _ => return None,
    })
}

/// Key/value pairs from a dict, host map, or iterable of 2-tuples.
pub fn pairs_of(v: &Value) -> Result<Vec<(Value, Value)>> {
    match v {
        Value::Dict(d) => Ok(d.items()),
        Value::Mapping(a) => Ok(a.items()),
        other => iterate(other)?
            .map(|item| {
                let pair: Vec<Value> = iterate(&item)?.collect();
                match <[Value; 2]>::try_from(pair) {
                    Ok([k, v]) => Ok((k, v)),
                    Err(pair) => Err(Error::script(format!(
                        "dictionary update element has length {}, want 2",
                        pair.len()
                    ))),
                }
            })
            .collect(),
    }
}

// ── Iteration ─────────────────────────────────────────────────────────────────

/// Iterator over any iterable value.  Guarded containers stay locked
/// against structural mutation until the iterator is dropped.
pub enum ValueIter {
    Items {
        items: std::vec::IntoIter<Value>,
        _token: Option<IterToken>,
    },
    Sequence(SequenceIter),
    Mapping(MappingIter),
}

impl ValueIter {
    fn snapshot(items: Vec<Value>, token: Option<IterToken>) -> Self {
        ValueIter::Items {
            items: items.into_iter(),
            _token: token,
        }
    }
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::Items { items, .. } => items.next(),
            ValueIter::Sequence(it) => it.next(),
            ValueIter::Mapping(it) => it.next(),
        }
    }
}

pub fn iterate(v: &Value) -> Result<ValueIter> {
    Ok(match v {
        Value::List(l) => ValueIter::snapshot(l.items(), Some(IterToken::new(l.clone()))),
        Value::Dict(d) => ValueIter::snapshot(d.keys(), Some(IterToken::new(d.clone()))),
        Value::Set(s) => ValueIter::snapshot(s.items(), Some(IterToken::new(s.clone()))),
        Value::Tuple(t) => ValueIter::snapshot(t.to_vec(), None),
        Value::Sequence(a) => ValueIter::Sequence(a.iterate()),
        Value::Mapping(a) => ValueIter::Mapping(a.iterate()),
        other => return Err(Error::script(format!("{} is not iterable", other.type_name()))),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
