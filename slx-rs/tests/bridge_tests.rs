//! End-to-end behaviour of the bridge as seen from script code.
//!
//! Each test registers host values, runs a short script through a
//! [`Context`], and checks the effect on the host side.

use std::fs;
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use slx::cache::ContextCache;
use slx::config::Config;
use slx::context::Context;
use slx::host::{Field, HostError, Signature, Type};
use slx::registry::Registry;
use slx::{Error, HostValue};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn context(registry: &Registry) -> Context {
    let config = Config {
        freeze_globals: false,
        ..Config::default()
    };
    Context::new(registry, &config)
}

fn ints(values: &[i64]) -> HostValue {
    HostValue::slice(Type::int64(), values.iter().map(|&n| HostValue::from(n)))
}

fn items(slice: &HostValue) -> Vec<i64> {
    (0..slice.len())
        .filter_map(|i| slice.index(i).and_then(|v| v.as_i64()))
        .collect()
}

fn server_type() -> Type {
    Type::named(
        "app.Server",
        Type::record(vec![
            Field::new("Host", Type::string()),
            Field::new("Port", Type::int64()),
        ]),
    )
}

fn server() -> HostValue {
    HostValue::record(&server_type(), [HostValue::from("localhost"), HostValue::from(80i64)])
}

/// `div(a, b) -> (int64, error)`; dividing by zero reports an error.
fn div() -> HostValue {
    let sig = Signature::new(
        vec![Type::int64(), Type::int64()],
        vec![Type::int64(), Type::error()],
    );
    HostValue::func(sig, |args| {
        let a = args[0].as_i64().unwrap_or(0);
        let b = args[1].as_i64().unwrap_or(0);
        if b == 0 {
            vec![HostValue::from(0i64), HostValue::error(HostError::msg("division by zero"))]
        } else {
            vec![HostValue::from(a / b), HostValue::nil_error()]
        }
    })
}

/// `sum(label string, n ...int64) -> int64`
fn sum() -> HostValue {
    let sig = Signature::variadic(
        vec![Type::string(), Type::slice(Type::int64())],
        vec![Type::int64()],
    );
    HostValue::func(sig, |args| {
        let total: i64 = items(&args[1]).iter().sum();
        vec![HostValue::from(total)]
    })
}

/// `apply(cb func(int64) (int64, error), n int64) -> (int64, error)` calls
/// `cb(n)` and forwards its results.
fn apply() -> HostValue {
    let cb = Type::func(Signature::new(
        vec![Type::int64()],
        vec![Type::int64(), Type::error()],
    ));
    HostValue::func(
        Signature::new(vec![cb, Type::int64()], vec![Type::int64(), Type::error()]),
        |args| match args[0].call(&[args[1].clone()]) {
            Ok(mut out) if out.len() == 2 => {
                let err = out.pop().unwrap_or_else(HostValue::nil_error);
                vec![out.remove(0), err]
            }
            Ok(_) => vec![HostValue::from(0i64), HostValue::error(HostError::msg("bad results"))],
            Err(e) => vec![HostValue::from(0i64), HostValue::error(HostError::new(e))],
        },
    )
}

// ── Sequences ─────────────────────────────────────────────────────────────────

#[test]
fn script_mutates_host_slice_in_place() {
    let ctx = context(&Registry::new());
    let xs = ints(&[1, 2, 3]);
    ctx.load_script("xs[0] = 10\nxs.append(4)\nn = len(xs)\n", &[("xs", xs.clone())])
        .unwrap();
    assert_eq!(items(&xs), vec![10, 2, 3, 4]);
    assert_eq!(ctx.get_global("n").unwrap().as_i64(), Some(4));
}

#[test]
fn appending_while_iterating_fails() {
    let ctx = context(&Registry::new());
    let xs = ints(&[1, 2]);
    let err = ctx
        .load_script("for x in xs:\n    xs.append(x)\n", &[("xs", xs.clone())])
        .unwrap_err();
    assert!(matches!(err, Error::Iterating(_)), "{err}");
    assert_eq!(items(&xs), vec![1, 2]);

    // the guard is released once the loop is gone
    ctx.load_script("xs.clear()\n", &[("xs", xs.clone())]).unwrap();
    assert!(xs.is_empty());
}

#[test]
fn huge_slice_steps_end_cleanly() {
    let ctx = context(&Registry::new());
    let list = ctx.eval("[1, 2, 3][1::9223372036854775807]", &[]).unwrap();
    assert_eq!(items(&list), vec![2]);
    let list = ctx.eval("[1, 2, 3][::-9223372036854775808]", &[]).unwrap();
    assert_eq!(items(&list), vec![3]);

    let xs = ints(&[1, 2, 3]);
    let fwd = ctx.eval("xs[1::9223372036854775807]", &[("xs", xs.clone())]).unwrap();
    assert_eq!(items(&fwd), vec![2]);
    let back = ctx.eval("xs[::-9223372036854775808]", &[("xs", xs)]).unwrap();
    assert_eq!(items(&back), vec![3]);
}

#[test]
fn arrays_refuse_to_grow() {
    let ctx = context(&Registry::new());
    let arr = HostValue::array(Type::int64(), vec![HostValue::from(1i64)]);
    let err = ctx.load_script("a.append(2)\n", &[("a", arr)]).unwrap_err();
    assert!(matches!(err, Error::FixedLength(_)), "{err}");
}

// ── Mappings ──────────────────────────────────────────────────────────────────

#[test]
fn script_reads_and_writes_host_map() {
    let ctx = context(&Registry::new());
    let m = HostValue::map(Type::string(), Type::int64());
    let src = "\
m['k'] = 1
seen = m.get('k')
m.pop('k')
gone = m.get('k', -1)
m['z'] = 26
";
    ctx.load_script(src, &[("m", m.clone())]).unwrap();
    assert_eq!(ctx.get_global("seen").unwrap().as_i64(), Some(1));
    assert_eq!(ctx.get_global("gone").unwrap().as_i64(), Some(-1));
    let z = m.map_get(&HostValue::from("z")).unwrap();
    assert_eq!(z.and_then(|v| v.as_i64()), Some(26));
    assert_eq!(m.len(), 1);
}

#[test]
fn map_values_are_coerced_to_the_element_type() {
    let ctx = context(&Registry::new());
    let m = HostValue::map(Type::string(), Type::int64());
    let err = ctx.load_script("m['k'] = 'text'\n", &[("m", m)]).unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }), "{err}");
}

#[test]
fn dicts_choose_host_key_type() {
    let ctx = context(&Registry::new());
    let textual = ctx.eval("{'a': 1, 'b': 2}", &[]).unwrap();
    assert_eq!(textual.ty().to_string(), "map[string]interface {}");
    let mixed = ctx.eval("{'a': 1, 2: 'two'}", &[]).unwrap();
    assert_eq!(mixed.ty().to_string(), "map[interface {}]interface {}");
}

// ── Records ───────────────────────────────────────────────────────────────────

#[test]
fn record_pointer_writes_back() {
    let ctx = context(&Registry::new());
    let original = HostValue::pointer_to(&server());
    ctx.load_script("srv.port = 5\nhost = srv.host\n", &[("srv", original.clone())])
        .unwrap();
    let port = original.elem().and_then(|r| r.field(1)).and_then(|f| f.as_i64());
    assert_eq!(port, Some(5));
    assert_eq!(ctx.get_global("host").unwrap().as_string().as_deref(), Some("localhost"));
}

#[test]
fn record_value_is_copied() {
    let ctx = context(&Registry::new());
    let original = server();
    ctx.load_script("srv.port = 5\n", &[("srv", original.clone())]).unwrap();
    assert_eq!(original.field(1).and_then(|f| f.as_i64()), Some(80));
}

#[test]
fn record_attribute_misses_are_soft_but_writes_are_not() {
    let ctx = context(&Registry::new());
    let srv = HostValue::pointer_to(&server());
    ctx.load_script("missing = srv.nothing\n", &[("srv", srv.clone())]).unwrap();
    assert!(ctx.get_global("missing").unwrap().is_nil());
    let err = ctx.load_script("srv.nothing = 1\n", &[("srv", srv)]).unwrap_err();
    assert!(matches!(err, Error::NoSuchField { .. }), "{err}");
}

// ── Host functions ────────────────────────────────────────────────────────────

#[test]
fn arity_is_checked() {
    let mut reg = Registry::new();
    reg.make_builtin_func("div", div()).unwrap();
    reg.make_builtin_func("sum", sum()).unwrap();
    let ctx = context(&reg);

    let err = ctx.eval("div(1, 2, 3)", &[]).unwrap_err();
    assert!(
        matches!(err, Error::ArgumentCount { expected: 2, actual: 3, variadic: false, .. }),
        "{err}"
    );
    assert!(matches!(ctx.eval("sum()", &[]), Err(Error::ArgumentCount { variadic: true, .. })));
    assert_eq!(ctx.eval("sum('a')", &[]).unwrap().as_i64(), Some(0));
    assert_eq!(ctx.eval("sum('a', 1, 2, 3, 4)", &[]).unwrap().as_i64(), Some(10));
}

#[test]
fn trailing_error_becomes_the_call_failure() {
    let mut reg = Registry::new();
    reg.create_module("calc", [("div", div())]).unwrap();
    let ctx = context(&reg);

    assert_eq!(ctx.eval("calc.div(14, 2)", &[]).unwrap().as_i64(), Some(7));
    let err = ctx.eval("calc.div(1, 0)", &[]).unwrap_err();
    assert!(matches!(&err, Error::Host(_)), "{err}");
    assert_eq!(err.to_string(), "division by zero");
}

#[test]
fn script_function_passed_to_host_callback() {
    let mut reg = Registry::new();
    reg.make_builtin_func("apply", apply()).unwrap();
    let ctx = context(&reg);

    assert_eq!(ctx.eval("apply(lambda x: x + 1, 41)", &[]).unwrap().as_i64(), Some(42));
    let err = ctx.eval("apply(lambda x: fail('nope'), 1)", &[]).unwrap_err();
    assert!(err.to_string().contains("nope"), "{err}");
}

#[test]
fn call_depth_spans_host_callbacks() {
    let mut reg = Registry::new();
    reg.make_builtin_func("apply", apply()).unwrap();
    let config = Config {
        max_call_depth: 5,
        freeze_globals: false,
        ..Config::default()
    };
    let ctx = Context::new(&reg, &config);
    let src = "\
def deep(n):
    if n > 50:
        return n
    return apply(deep, n + 1)
def shallow(n):
    if n > 2:
        return n
    return apply(shallow, n + 1)
";
    ctx.load_script(src, &[]).unwrap();

    let err = ctx.eval("deep(0)", &[]).unwrap_err();
    assert!(err.to_string().contains("call stack depth exceeded"), "{err}");
    assert_eq!(ctx.thread().depth(), 0);

    // four nested calls fit in a budget of five
    assert_eq!(ctx.eval("shallow(0)", &[]).unwrap().as_i64(), Some(3));
}

#[test]
fn bound_script_function_reports_through_error_slot() {
    let ctx = context(&Registry::new());
    ctx.load_script("def half(n):\n    if n % 2:\n        fail('odd')\n    return n // 2\n", &[])
        .unwrap();
    let sig = Signature::new(vec![Type::int64()], vec![Type::int64(), Type::error()]);
    let half = ctx.bind_func("half", sig).unwrap();

    let out = half.call(&[HostValue::from(10i64)]).unwrap();
    assert_eq!(out[0].as_i64(), Some(5));
    assert!(out[1].is_nil());

    let out = half.call(&[HostValue::from(3i64)]).unwrap();
    let err = out[1].as_error().map(|e| e.to_string()).unwrap_or_default();
    assert!(err.contains("odd"), "{err}");
}

// ── Cache ─────────────────────────────────────────────────────────────────────

#[test]
fn cache_reloads_on_any_mtime_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.star");
    fs::write(&path, "limit = base * 2\n").unwrap();

    let cache = ContextCache::new(&Registry::new(), Config::default());
    let vars = [("base", HostValue::from(5i64))];

    let (first, cached) = cache.acquire(&path, &vars).unwrap();
    assert!(!cached);
    let (again, cached) = cache.acquire(&path, &vars).unwrap();
    assert!(cached);
    assert!(Rc::ptr_eq(&first, &again));

    fs::write(&path, "limit = base * 3\n").unwrap();
    let stamp = SystemTime::now() + Duration::from_secs(5);
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(stamp)
        .unwrap();

    let (reloaded, cached) = cache.acquire(&path, &vars).unwrap();
    assert!(!cached);
    assert!(!Rc::ptr_eq(&first, &reloaded));
    assert_eq!(reloaded.get_global("limit").unwrap().as_i64(), Some(15));
}
