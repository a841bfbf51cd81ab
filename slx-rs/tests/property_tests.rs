use std::time::{Duration, UNIX_EPOCH};

use num_bigint::BigInt;
use proptest::prelude::*;
use slx::bridge::{assign, from_value, make_value, to_value};
use slx::host::{FloatWidth, IntWidth, Type};
use slx::script::stmt::parse_module;
use slx::script::{Bindings, Interpreter, Thread};
use slx::{Error, HostValue, ScriptValue};

/// Host → script → typed host slot of the original type.
fn round_trip(host: &HostValue) -> HostValue {
    let slot = make_value(host.ty()).unwrap();
    assign(&slot, &from_value(&to_value(host))).unwrap();
    slot
}

proptest! {
    #[test]
    fn signed_ints_round_trip(a in any::<i8>(), b in any::<i16>(), c in any::<i32>(), d in any::<i64>()) {
        prop_assert_eq!(round_trip(&HostValue::from(a)).as_i64(), Some(a as i64));
        prop_assert_eq!(round_trip(&HostValue::from(b)).as_i64(), Some(b as i64));
        prop_assert_eq!(round_trip(&HostValue::from(c)).as_i64(), Some(c as i64));
        prop_assert_eq!(round_trip(&HostValue::from(d)).as_i64(), Some(d));
    }

    #[test]
    fn unsigned_ints_round_trip(a in any::<u8>(), b in any::<u32>(), c in any::<u64>()) {
        prop_assert_eq!(round_trip(&HostValue::from(a)).as_u64(), Some(a as u64));
        prop_assert_eq!(round_trip(&HostValue::from(b)).as_u64(), Some(b as u64));
        prop_assert_eq!(round_trip(&HostValue::from(c)).as_u64(), Some(c));
    }

    #[test]
    fn floats_round_trip(x in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
        prop_assert_eq!(round_trip(&HostValue::from(x)).as_f64(), Some(x));
    }

    #[test]
    fn text_and_bytes_round_trip(s in "\\PC*", b in proptest::collection::vec(any::<u8>(), 0..64)) {
        prop_assert_eq!(round_trip(&HostValue::from(s.as_str())).as_string(), Some(s));
        prop_assert_eq!(round_trip(&HostValue::bytes(b.clone())).as_bytes(), Some(b));
    }

    #[test]
    fn bool_time_duration_round_trip(flag in any::<bool>(), nanos in any::<u64>()) {
        prop_assert_eq!(round_trip(&HostValue::from(flag)).as_bool(), Some(flag));
        let t = UNIX_EPOCH + Duration::from_nanos(nanos);
        prop_assert_eq!(round_trip(&HostValue::from(t)).as_time(), Some(t));
        let d = Duration::from_nanos(nanos);
        prop_assert_eq!(round_trip(&HostValue::from(d)).as_duration(), Some(d));
    }

    /// Big integers survive the trip even past 64 bits.
    #[test]
    fn big_ints_round_trip(hi in any::<u64>(), lo in any::<u64>(), neg in any::<bool>()) {
        let mut n = (BigInt::from(hi) << 64u32) + BigInt::from(lo);
        if neg {
            n = -n;
        }
        let host = HostValue::from(n.clone());
        prop_assert_eq!(to_value(&host), ScriptValue::Int(n.clone()));
        prop_assert_eq!(round_trip(&host).as_big_int(), Some(n));
    }

    /// Narrowing accepts exactly the values that fit.
    #[test]
    fn narrowing_is_range_checked(n in any::<i64>()) {
        let slot = make_value(&Type::int(IntWidth::W8)).unwrap();
        let result = assign(&slot, &from_value(&ScriptValue::from(n)));
        if i8::try_from(n).is_ok() {
            prop_assert!(result.is_ok());
            prop_assert_eq!(slot.as_i64(), Some(n));
        } else {
            prop_assert!(matches!(result, Err(Error::Conversion { .. })), "expected Error::Conversion, got {:?}", result);
        }
    }

    #[test]
    fn f32_slots_accept_script_floats(x in -1.0e6f32..1.0e6f32) {
        let slot = make_value(&Type::float(FloatWidth::F32)).unwrap();
        assign(&slot, &from_value(&ScriptValue::from(x as f64))).unwrap();
        prop_assert_eq!(slot.as_f64(), Some(x as f64));
    }
}

proptest! {
    /// The parser returns Ok or Err on arbitrary text; it never panics.
    #[test]
    fn parser_does_not_panic(s in "\\PC*") {
        let _ = parse_module("fuzz.star", &s);
    }

    /// Integer arithmetic in scripts agrees with checked i64 arithmetic.
    #[test]
    fn script_arithmetic_matches_native(a in -10_000i64..10_000, b in -10_000i64..10_000, c in 1i64..100) {
        let interp = Interpreter::new(Thread::new("prop", 32), Default::default());
        let mut env = Bindings::new();
        env.insert("a".into(), ScriptValue::from(a));
        env.insert("b".into(), ScriptValue::from(b));
        env.insert("c".into(), ScriptValue::from(c));
        let v = interp.evaluate("prop", "a + b * c - a // c", &env).unwrap();
        prop_assert_eq!(v, ScriptValue::from(a + b * c - a.div_euclid(c)));
    }
}
