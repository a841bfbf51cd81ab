use criterion::{black_box, criterion_group, criterion_main, Criterion};
use slx::bridge::{assign, from_value, make_value, to_value};
use slx::config::Config;
use slx::context::Context;
use slx::host::{Field, Type};
use slx::registry::Registry;
use slx::HostValue;

fn make_slice(len: usize) -> HostValue {
    HostValue::slice(Type::int64(), (0..len as i64).map(HostValue::from))
}

fn make_record() -> HostValue {
    let ty = Type::named(
        "bench.Point",
        Type::record(vec![
            Field::new("X", Type::int64()),
            Field::new("Y", Type::int64()),
            Field::new("Label", Type::string()),
        ]),
    );
    HostValue::pointer_to(&HostValue::record(
        &ty,
        [HostValue::from(1i64), HostValue::from(2i64), HostValue::from("p")],
    ))
}

fn bench_convert(c: &mut Criterion) {
    let scalar = HostValue::from(42i32);
    let small = make_slice(16);
    let large = make_slice(4096);
    let record = make_record();
    let int8 = Type::int(slx::host::IntWidth::W8);

    let mut g = c.benchmark_group("convert");

    g.bench_function("scalar_to_value", |b| b.iter(|| to_value(black_box(&scalar))));
    g.bench_function("scalar_coerce_narrow", |b| {
        let v = to_value(&scalar);
        b.iter(|| {
            let slot = make_value(&int8).unwrap();
            assign(&slot, &from_value(black_box(&v))).unwrap();
            slot
        })
    });
    g.bench_function("slice_adapter_small", |b| b.iter(|| to_value(black_box(&small))));
    g.bench_function("slice_adapter_large", |b| b.iter(|| to_value(black_box(&large))));
    g.bench_function("record_adapter_bind", |b| b.iter(|| to_value(black_box(&record))));

    g.finish();
}

fn bench_script(c: &mut Criterion) {
    let ctx = Context::new(&Registry::new(), &Config::default());
    ctx.load_script(
        "def total(xs):\n    t = 0\n    for x in xs:\n        t += x\n    return t\n",
        &[],
    )
    .unwrap();
    let xs = make_slice(256);

    let mut g = c.benchmark_group("script");
    g.bench_function("sum_host_slice_256", |b| {
        b.iter(|| ctx.call_func("total", black_box(std::slice::from_ref(&xs))).unwrap())
    });
    g.bench_function("eval_expression", |b| {
        b.iter(|| ctx.eval(black_box("1 + 2 * 3 - 4 // 2"), &[]).unwrap())
    });
    g.finish();
}

criterion_group!(benches, bench_convert, bench_script);
criterion_main!(benches);
