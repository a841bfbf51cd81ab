//! Type-directed coercion of dynamic host values into typed slots.
//!
//! [`assign`] tries, in order: nil → zero, assignability, conversion
//! (numeric, string ↔ bytes, identical record layouts), then structural
//! rules keyed on the destination kind.

use std::rc::Rc;
use std::time::Duration;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};
use tracing::trace;

use super::func::{synthesize, ScriptCallable};
use crate::error::{Error, Result};
use crate::host::value::Data;
use crate::host::{FloatWidth, IntWidth, Kind, Type, Value as HostValue};

/// Allocate an addressable slot of `ty`.  Maps are allocated empty and
/// pointers point at a freshly allocated pointee.
pub fn make_value(ty: &Type) -> Result<HostValue> {
    match ty.kind() {
        Kind::Channel | Kind::UnsafePointer | Kind::Complex => {
            Err(Error::UnsupportedHostKind(ty.to_string()))
        }
        Kind::Map => {
            let v = HostValue::new(ty);
            v.set_data(Data::Map(Rc::default()));
            Ok(v)
        }
        Kind::Pointer => {
            let v = HostValue::new(ty);
            if let Some(elem) = ty.elem() {
                v.point_to(&make_value(elem)?);
            }
            Ok(v)
        }
        _ => Ok(HostValue::new(ty)),
    }
}

/// Store `src` into `dest`, coercing as needed.
pub fn assign(dest: &HostValue, src: &HostValue) -> Result<()> {
    let src = src.concrete();
    if src.kind() == Kind::Interface && src.is_nil() {
        if dest.is_addressable() {
            dest.set_zero();
        }
        return Ok(());
    }

    if assignable(src.ty(), dest.ty()) {
        dest.set(&src);
        return Ok(());
    }

    if let Some(data) = convert(&src, dest.ty())? {
        dest.set_data(data);
        return Ok(());
    }

    trace!(from = %src.ty(), to = %dest.ty(), "structural coercion");
    match (src.kind(), dest.kind()) {
        (Kind::Map, Kind::Record) => map_to_record(dest, &src),
        (Kind::Map, Kind::Map) => map_to_map(dest, &src),
        (Kind::Slice | Kind::Array, Kind::Slice) => seq_to_slice(dest, &src),
        (Kind::Slice | Kind::Array, Kind::Array) => seq_to_array(dest, &src),
        (Kind::Handle, Kind::Func) => callable_to_func(dest, &src),
        (Kind::Pointer, _) => match src.elem() {
            Some(pointee) => assign(dest, &pointee.copied()),
            None => {
                if dest.is_addressable() {
                    dest.set_zero();
                }
                Ok(())
            }
        },
        (_, Kind::Pointer) => into_pointer(dest, &src),
        _ => Err(Error::conversion(src.ty(), dest.ty())),
    }
}

fn assignable(src: &Type, dest: &Type) -> bool {
    if src.identical(dest) {
        return true;
    }
    match dest.kind() {
        Kind::Interface => src.implements(dest),
        Kind::Error => src.kind() == Kind::Error,
        _ => (src.name().is_none() || dest.name().is_none()) && src.same_underlying(dest),
    }
}

// ── Conversion ────────────────────────────────────────────────────────────────

enum Num {
    I(i64),
    U(u64),
    F(f64),
    B(BigInt),
}

impl Num {
    fn of(data: &Data) -> Option<Num> {
        Some(match data {
            Data::Int(n) => Num::I(*n),
            Data::Uint(n) => Num::U(*n),
            Data::Float(x) => Num::F(*x),
            Data::BigInt(n) => Num::B(n.clone()),
            Data::Duration(d) => Num::I(i64::try_from(d.as_nanos()).ok()?),
            _ => return None,
        })
    }

    fn to_i64(&self) -> Option<i64> {
        match self {
            Num::I(n) => Some(*n),
            Num::U(n) => i64::try_from(*n).ok(),
            Num::F(x) => truncate_float(*x).and_then(|t| t.to_i64()),
            Num::B(n) => n.to_i64(),
        }
    }

    fn to_u64(&self) -> Option<u64> {
        match self {
            Num::I(n) => u64::try_from(*n).ok(),
            Num::U(n) => Some(*n),
            Num::F(x) => truncate_float(*x).and_then(|t| t.to_u64()),
            Num::B(n) => n.to_u64(),
        }
    }

    fn to_f64(&self) -> Option<f64> {
        match self {
            Num::I(n) => Some(*n as f64),
            Num::U(n) => Some(*n as f64),
            Num::F(x) => Some(*x),
            Num::B(n) => n.to_f64(),
        }
    }

    fn to_big(&self) -> Option<BigInt> {
        match self {
            Num::I(n) => Some(BigInt::from(*n)),
            Num::U(n) => Some(BigInt::from(*n)),
            Num::F(x) => truncate_float(*x),
            Num::B(n) => Some(n.clone()),
        }
    }
}

/// Truncate toward zero; `None` for NaN and infinities.
fn truncate_float(x: f64) -> Option<BigInt> {
    BigInt::from_f64(x.trunc())
}

/// `Ok(None)` when no conversion rule applies; `Err` when one applies
/// but the value does not fit.
fn convert(src: &HostValue, dest: &Type) -> Result<Option<Data>> {
    let fail = || Error::conversion(src.ty(), dest);
    let data = src.data();

    if let Some(num) = Num::of(&data) {
        let converted = match dest.kind() {
            Kind::Int => {
                let width = dest.int_width().unwrap_or(IntWidth::W64);
                num.to_i64().filter(|n| width.fits_signed(*n)).map(Data::Int)
            }
            Kind::Uint => {
                let width = dest.int_width().unwrap_or(IntWidth::W64);
                num.to_u64().filter(|n| width.fits_unsigned(*n)).map(Data::Uint)
            }
            Kind::Float => num.to_f64().map(|x| match dest.float_width() {
                Some(FloatWidth::F32) => Data::Float(f64::from(x as f32)),
                _ => Data::Float(x),
            }),
            Kind::BigInt => num.to_big().map(Data::BigInt),
            Kind::Duration => num.to_u64().map(|n| Data::Duration(Duration::from_nanos(n))),
            _ => return Ok(None),
        };
        return converted.map(Some).ok_or_else(fail);
    }

    match (&*data, dest.kind()) {
        (Data::Str(s), Kind::Bytes) => Ok(Some(Data::Bytes(s.clone().into_bytes()))),
        (Data::Bytes(b), Kind::String) => String::from_utf8(b.clone())
            .map(|s| Some(Data::Str(s)))
            .map_err(|_| fail()),
        (Data::Record(_), Kind::Record) if src.ty().same_underlying(dest) => Ok(Some(data.copy())),
        _ => Ok(None),
    }
}

// ── Structural rules ──────────────────────────────────────────────────────────

fn map_to_record(dest: &HostValue, src: &HostValue) -> Result<()> {
    for (i, field) in dest.ty().fields().iter().enumerate() {
        let key = HostValue::from(field.key());
        let Some(value) = src.map_get(&key)? else {
            continue;
        };
        if let Some(slot) = dest.field(i) {
            assign(&slot, &value)?;
        }
    }
    Ok(())
}

fn map_to_map(dest: &HostValue, src: &HostValue) -> Result<()> {
    let (Some(kt), Some(vt)) = (dest.ty().key(), dest.ty().elem()) else {
        return Err(Error::conversion(src.ty(), dest.ty()));
    };
    for (k, v) in src.map_entries() {
        let key = make_value(kt)?;
        assign(&key, &k)?;
        let val = make_value(vt)?;
        assign(&val, &v)?;
        dest.map_insert(&key, &val)?;
    }
    if dest.is_nil() {
        dest.set_data(Data::Map(Rc::default()));
    }
    Ok(())
}

fn coerced_items(elem: &Type, src: &HostValue) -> Result<Vec<HostValue>> {
    (0..src.len())
        .map(|i| {
            let item = make_value(elem)?;
            if let Some(s) = src.index(i) {
                assign(&item, &s)?;
            }
            Ok(item)
        })
        .collect()
}

fn seq_to_slice(dest: &HostValue, src: &HostValue) -> Result<()> {
    let Some(elem) = dest.ty().elem() else {
        return Err(Error::conversion(src.ty(), dest.ty()));
    };
    let items = coerced_items(elem, src)?;
    dest.set_items(&items);
    Ok(())
}

fn seq_to_array(dest: &HostValue, src: &HostValue) -> Result<()> {
    let (Some(elem), Some(len)) = (dest.ty().elem(), dest.ty().array_len()) else {
        return Err(Error::conversion(src.ty(), dest.ty()));
    };
    if src.len() != len {
        return Err(Error::conversion(
            format!("{} of length {}", src.ty(), src.len()),
            dest.ty(),
        ));
    }
    let items = coerced_items(elem, src)?;
    dest.set_items(&items);
    Ok(())
}

fn callable_to_func(dest: &HostValue, src: &HostValue) -> Result<()> {
    let handle = src.as_handle();
    let Some(callable) = handle.as_ref().and_then(|h| h.downcast_ref::<ScriptCallable>()) else {
        return Err(Error::conversion(src.ty(), dest.ty()));
    };
    let f = synthesize(callable.clone(), dest.ty())?;
    dest.set(&f);
    Ok(())
}

fn into_pointer(dest: &HostValue, src: &HostValue) -> Result<()> {
    let Some(elem) = dest.ty().elem() else {
        return Err(Error::conversion(src.ty(), dest.ty()));
    };
    let reuse = src.kind() == Kind::Map && elem.kind() == Kind::Record;
    let target = match dest.elem() {
        Some(existing) if reuse => existing,
        _ => make_value(elem)?,
    };
    assign(&target, src)?;
    dest.point_to(&target);
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
