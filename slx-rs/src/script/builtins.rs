//! Built-in functions available to every script.

use std::cmp::Ordering;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};
use tracing::info;

use super::interp::Thread;
use super::ops;
use super::value::{Dict, Value};
use crate::error::{Error, Result};

type BuiltinFn = fn(&Thread, &[Value]) -> Result<Value>;

const TABLE: &[(&str, BuiltinFn)] = &[
    ("bool", bool_),
    ("dict", dict),
    ("dir", dir),
    ("fail", fail),
    ("float", float),
    ("getattr", getattr),
    ("hasattr", hasattr),
    ("int", int),
    ("len", len),
    ("list", list),
    ("print", print),
    ("range", range),
    ("repr", repr),
    ("sorted", sorted),
    ("str", str_),
    ("tuple", tuple),
    ("type", type_),
];

/// The builtin named `name`, if any.
pub fn lookup(name: &str) -> Option<Value> {
    TABLE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(n, f)| Value::builtin(n, *f))
}

/// Names of all builtins, sorted.
pub fn names() -> impl Iterator<Item = &'static str> {
    TABLE.iter().map(|(n, _)| *n)
}

/// Fail unless `min <= args.len() <= max`.
pub(crate) fn check_arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    let n = args.len();
    if n < min {
        return Err(Error::ArgumentCount {
            name: name.to_string(),
            expected: min,
            actual: n,
            variadic: max > min,
        });
    }
    if n > max {
        return Err(Error::ArgumentCount {
            name: name.to_string(),
            expected: max,
            actual: n,
            variadic: false,
        });
    }
    Ok(())
}

fn type_error(name: &str, v: &Value) -> Error {
    Error::script(format!("{name}: unsupported argument of type {}", v.type_name()))
}

// ── Conversions ───────────────────────────────────────────────────────────────

fn bool_(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("bool", args, 0, 1)?;
    Ok(Value::Bool(args.first().is_some_and(Value::truth)))
}

fn int(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("int", args, 1, 2)?;
    let base = match args.get(1) {
        Some(b) => b
            .as_i64()
            .and_then(|b| u32::try_from(b).ok())
            .filter(|b| (2..=36).contains(b))
            .ok_or_else(|| Error::script("int: base must be an integer in [2, 36]"))?,
        None => 10,
    };
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.clone())),
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        Value::Float(x) => BigInt::from_f64(x.trunc())
            .map(Value::Int)
            .ok_or_else(|| Error::script(format!("int: cannot convert {x} to int"))),
        Value::Str(s) => {
            let text = s.trim();
            let digits = match base {
                16 => text.trim_start_matches("0x").trim_start_matches("0X"),
                _ => text,
            };
            BigInt::parse_bytes(digits.as_bytes(), base)
                .map(Value::Int)
                .ok_or_else(|| Error::script(format!("int: invalid literal {}", Value::Str(s.clone()).repr())))
        }
        other => Err(type_error("int", other)),
    }
}

fn float(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("float", args, 0, 1)?;
    let Some(v) = args.first() else {
        return Ok(Value::Float(0.0));
    };
    match v {
        Value::Float(x) => Ok(Value::Float(*x)),
        Value::Int(n) => Ok(Value::Float(n.to_f64().unwrap_or(f64::INFINITY))),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::Str(s) => s
            .trim()
            .parse()
            .map(Value::Float)
            .map_err(|_| Error::script(format!("float: invalid literal {}", v.repr()))),
        other => Err(type_error("float", other)),
    }
}

fn str_(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("str", args, 1, 1)?;
    Ok(match &args[0] {
        s @ Value::Str(_) => s.clone(),
        other => Value::from(other.to_string()),
    })
}

fn repr(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("repr", args, 1, 1)?;
    Ok(Value::from(args[0].repr()))
}

fn type_(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("type", args, 1, 1)?;
    Ok(Value::str(args[0].type_name()))
}

// ── Containers ────────────────────────────────────────────────────────────────

fn len(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("len", args, 1, 1)?;
    ops::len(&args[0])
        .map(Value::from)
        .ok_or_else(|| Error::script(format!("len: value of type {} has no len", args[0].type_name())))
}

fn list(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("list", args, 0, 1)?;
    match args.first() {
        Some(v) => Ok(Value::list(ops::iterate(v)?.collect())),
        None => Ok(Value::list(Vec::new())),
    }
}

fn tuple(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("tuple", args, 0, 1)?;
    match args.first() {
        Some(v @ Value::Tuple(_)) => Ok(v.clone()),
        Some(v) => Ok(Value::tuple(ops::iterate(v)?.collect())),
        None => Ok(Value::tuple(Vec::new())),
    }
}

fn dict(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("dict", args, 0, 1)?;
    let pairs = match args.first() {
        Some(v) => ops::pairs_of(v)?,
        None => Vec::new(),
    };
    Ok(Value::Dict(Rc::new(Dict::from_pairs(pairs)?)))
}

fn range(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("range", args, 1, 3)?;
    let ints = args
        .iter()
        .map(|a| a.as_i64().ok_or_else(|| type_error("range", a)))
        .collect::<Result<Vec<_>>>()?;
    let (start, stop, step) = match ints[..] {
        [stop] => (0, stop, 1),
        [start, stop] => (start, stop, 1),
        [start, stop, step] => (start, stop, step),
        _ => return Err(Error::script("range: want 1 to 3 arguments")),
    };
    if step == 0 {
        return Err(Error::script("range: step argument must not be zero"));
    }
    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        out.push(Value::from(i));
        i = match i.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(Value::list(out))
}

fn sorted(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("sorted", args, 1, 1)?;
    let mut items: Vec<Value> = ops::iterate(&args[0])?.collect();
    let mut failure = None;
    items.sort_by(|a, b| match ops::compare(a, b) {
        Ok(ord) => ord.unwrap_or(Ordering::Equal),
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(Value::list(items)),
    }
}

// ── Attributes ────────────────────────────────────────────────────────────────

fn attr_name<'v>(name: &str, v: &'v Value) -> Result<&'v str> {
    v.as_str()
        .ok_or_else(|| Error::script(format!("{name}: attribute name must be string")))
}

fn hasattr(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("hasattr", args, 2, 2)?;
    let name = attr_name("hasattr", &args[1])?;
    Ok(Value::Bool(ops::attr(&args[0], name).is_some()))
}

fn getattr(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("getattr", args, 2, 3)?;
    let name = attr_name("getattr", &args[1])?;
    match (ops::attr(&args[0], name), args.get(2)) {
        (Some(v), _) => Ok(v),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => ops::get_attr(&args[0], name),
    }
}

fn dir(_: &Thread, args: &[Value]) -> Result<Value> {
    check_arity("dir", args, 1, 1)?;
    let names = ops::attr_names(&args[0]).into_iter().map(Value::from).collect();
    Ok(Value::list(names))
}

// ── Effects ───────────────────────────────────────────────────────────────────

fn print(thread: &Thread, args: &[Value]) -> Result<Value> {
    let line: Vec<String> = args.iter().map(Value::to_string).collect();
    info!(thread = thread.name(), "{}", line.join(" "));
    Ok(Value::None)
}

fn fail(_: &Thread, args: &[Value]) -> Result<Value> {
    let parts: Vec<String> = args.iter().map(Value::to_string).collect();
    Err(Error::script(format!("fail: {}", parts.join(" "))))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value> {
        let Some(Value::Builtin(b)) = lookup(name) else {
            panic!("no builtin {name}");
        };
        b.call(&Thread::new("test", 8), args)
    }

    #[test]
    fn table_is_sorted() {
        let names: Vec<_> = names().collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn numeric_conversions() {
        assert_eq!(call("int", &[Value::from("-42")]).unwrap(), Value::from(-42i64));
        assert_eq!(call("int", &[Value::from("ff"), Value::from(16i64)]).unwrap(), Value::from(255i64));
        assert_eq!(call("int", &[Value::from(-2.7)]).unwrap(), Value::from(-2i64));
        assert!(call("int", &[Value::from("1.5")]).is_err());
        assert_eq!(call("float", &[Value::from(" 2.5 ")]).unwrap(), Value::from(2.5));
        assert_eq!(call("bool", &[]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn range_forms() {
        let r = call("range", &[Value::from(5i64), Value::from(0i64), Value::from(-2i64)]).unwrap();
        assert_eq!(r, Value::list(vec![Value::from(5i64), Value::from(3i64), Value::from(1i64)]));
        assert!(call("range", &[Value::from(1i64), Value::from(2i64), Value::from(0i64)]).is_err());
        assert!(matches!(call("range", &[]), Err(Error::ArgumentCount { .. })));
    }

    #[test]
    fn containers() {
        let pairs = Value::list(vec![Value::tuple(vec![Value::from("k"), Value::from(1i64)])]);
        let Value::Dict(d) = call("dict", &[pairs]).unwrap() else {
            panic!("expected dict");
        };
        assert_eq!(d.get(&Value::from("k")).unwrap(), Some(Value::from(1i64)));
        let t = call("tuple", &[Value::list(vec![Value::None])]).unwrap();
        assert_eq!(t, Value::tuple(vec![Value::None]));
        let s = call("sorted", &[Value::list(vec![Value::from(3i64), Value::from(1i64)])]).unwrap();
        assert_eq!(s, Value::list(vec![Value::from(1i64), Value::from(3i64)]));
        assert!(call("sorted", &[Value::list(vec![Value::from(1i64), Value::from("a")])]).is_err());
    }

    #[test]
    fn text_and_introspection() {
        assert_eq!(call("str", &[Value::from(1.0)]).unwrap(), Value::from("1.0"));
        assert_eq!(call("repr", &[Value::from("a")]).unwrap(), Value::from("\"a\""));
        assert_eq!(call("type", &[Value::None]).unwrap(), Value::from("NoneType"));
        assert_eq!(call("len", &[Value::from("héllo")]).unwrap(), Value::from(5i64));
        assert!(call("len", &[Value::from(1i64)]).is_err());
        assert_eq!(
            call("hasattr", &[Value::from("s"), Value::from("upper")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call("getattr", &[Value::from(1i64), Value::from("x"), Value::None]).unwrap(),
            Value::None
        );
    }

    #[test]
    fn fail_raises() {
        let err = call("fail", &[Value::from("bad"), Value::from(1i64)]).unwrap_err();
        assert_eq!(err.to_string(), "fail: bad 1");
    }
}
