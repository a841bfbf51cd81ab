//! Host values: typed, optionally addressable cells.
//!
//! A [`Value`] pairs a [`Type`] with a shared storage slot.  Cloning a
//! `Value` clones the *handle*; use [`Value::copied`] for a detached copy
//! that follows the host's value semantics (records and arrays are deep
//! copies, slices, maps, pointers, and functions share their referents).
//!
//! Handles obtained through [`Value::index`], [`Value::field`], and
//! [`Value::elem`] alias the parent's storage, so writes through them are
//! visible to every other holder of the same container.

use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::types::{FloatWidth, IntWidth, Kind, Receiver, Repr, Signature, Type};
use super::HostError;
use crate::error::{Error, Result};

pub(crate) type Slot = Rc<RefCell<Data>>;

/// Native body of a host function value.
pub type HostFn = Rc<dyn Fn(&[Value]) -> Vec<Value>>;

pub(crate) type Entries = IndexMap<MapKey, (Data, Slot)>;

fn slot(data: Data) -> Slot {
    Rc::new(RefCell::new(data))
}

// ── Storage ───────────────────────────────────────────────────────────────────

pub(crate) enum Data {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    BigInt(BigInt),
    Str(String),
    Bytes(Vec<u8>),
    Time(SystemTime),
    Duration(Duration),
    /// Slice: shared, growable backing.
    Seq(Rc<RefCell<Vec<Slot>>>),
    /// Array: fixed length, owned elements.
    Array(Vec<Slot>),
    Map(Rc<RefCell<Entries>>),
    Record(Vec<Slot>),
    Pointer(Slot),
    Func(HostFn),
    /// Dynamic value held by an interface.
    Dynamic(Box<Value>),
    Error(HostError),
    Handle(Rc<dyn Any>),
}

impl Data {
    pub(crate) fn zero(ty: &Type) -> Data {
        match ty.repr() {
            Repr::Bool => Data::Bool(false),
            Repr::Int(_) => Data::Int(0),
            Repr::Uint(_) => Data::Uint(0),
            Repr::Float(_) => Data::Float(0.0),
            Repr::BigInt => Data::BigInt(BigInt::default()),
            Repr::String => Data::Str(String::new()),
            Repr::Bytes => Data::Bytes(Vec::new()),
            Repr::Time => Data::Time(UNIX_EPOCH),
            Repr::Duration => Data::Duration(Duration::ZERO),
            Repr::Array(elem, n) => Data::Array((0..*n).map(|_| slot(Data::zero(elem))).collect()),
            Repr::Record(fields) => {
                Data::Record(fields.iter().map(|f| slot(Data::zero(&f.ty))).collect())
            }
            _ => Data::Nil,
        }
    }

    /// Copy with host value semantics.
    pub(crate) fn copy(&self) -> Data {
        match self {
            Data::Nil => Data::Nil,
            Data::Bool(b) => Data::Bool(*b),
            Data::Int(n) => Data::Int(*n),
            Data::Uint(n) => Data::Uint(*n),
            Data::Float(x) => Data::Float(*x),
            Data::BigInt(n) => Data::BigInt(n.clone()),
            Data::Str(s) => Data::Str(s.clone()),
            Data::Bytes(b) => Data::Bytes(b.clone()),
            Data::Time(t) => Data::Time(*t),
            Data::Duration(d) => Data::Duration(*d),
            Data::Seq(items) => Data::Seq(items.clone()),
            Data::Array(items) => Data::Array(copy_slots(items)),
            Data::Map(m) => Data::Map(m.clone()),
            Data::Record(fields) => Data::Record(copy_slots(fields)),
            Data::Pointer(p) => Data::Pointer(p.clone()),
            Data::Func(f) => Data::Func(f.clone()),
            Data::Dynamic(v) => Data::Dynamic(Box::new(v.copied())),
            Data::Error(e) => Data::Error(e.clone()),
            Data::Handle(h) => Data::Handle(h.clone()),
        }
    }
}

fn copy_slots(slots: &[Slot]) -> Vec<Slot> {
    slots.iter().map(|s| slot(s.borrow().copy())).collect()
}

/// Storage for `v` in a slot of type `ty`; concrete values stored into an
/// interface slot are boxed as its dynamic value.
fn data_for(ty: &Type, v: &Value) -> Data {
    if ty.kind() == Kind::Interface && v.kind() != Kind::Interface {
        if v.kind() == Kind::Error && v.is_nil() {
            return Data::Nil;
        }
        return Data::Dynamic(Box::new(v.copied()));
    }
    v.data().copy()
}

// ── Map keys ──────────────────────────────────────────────────────────────────

/// Hashable projection of a host value used to index maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum MapKey {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(u64),
    BigInt(BigInt),
    Str(String),
    Bytes(Vec<u8>),
    Time(SystemTime),
    Duration(Duration),
    Composite(Vec<MapKey>),
    Ref(usize),
}

impl MapKey {
    fn of(data: &Data) -> Option<MapKey> {
        Some(match data {
            Data::Nil => MapKey::Nil,
            Data::Bool(b) => MapKey::Bool(*b),
            Data::Int(n) => MapKey::Int(*n),
            Data::Uint(n) => MapKey::Uint(*n),
            Data::Float(x) => MapKey::Float(if *x == 0.0 { 0 } else { x.to_bits() }),
            Data::BigInt(n) => MapKey::BigInt(n.clone()),
            Data::Str(s) => MapKey::Str(s.clone()),
            Data::Bytes(b) => MapKey::Bytes(b.clone()),
            Data::Time(t) => MapKey::Time(*t),
            Data::Duration(d) => MapKey::Duration(*d),
            Data::Array(items) | Data::Record(items) => MapKey::Composite(
                items
                    .iter()
                    .map(|s| MapKey::of(&s.borrow()))
                    .collect::<Option<Vec<_>>>()?,
            ),
            Data::Pointer(p) => MapKey::Ref(Rc::as_ptr(p) as *const () as usize),
            Data::Handle(h) => MapKey::Ref(Rc::as_ptr(h) as *const () as usize),
            Data::Error(e) => MapKey::Ref(e.addr()),
            Data::Dynamic(v) => MapKey::of(&v.data())?,
            Data::Seq(_) | Data::Map(_) | Data::Func(_) => return None,
        })
    }
}

fn map_key(key: &Value) -> Result<MapKey> {
    MapKey::of(&key.data()).ok_or_else(|| Error::Unhashable(key.ty.to_string()))
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// A typed host value.
#[derive(Clone)]
pub struct Value {
    ty: Type,
    slot: Slot,
    addressable: bool,
}

impl Value {
    pub(crate) fn from_data(ty: Type, data: Data) -> Self {
        Value {
            ty,
            slot: slot(data),
            addressable: false,
        }
    }

    /// The nil `interface {}` value.
    pub fn nil() -> Self {
        Self::from_data(Type::any(), Data::Nil)
    }

    /// Zero value of `ty`; not addressable.
    pub fn zero(ty: &Type) -> Self {
        Self::from_data(ty.clone(), Data::zero(ty))
    }

    /// A freshly allocated, addressable zero value of `ty`.
    pub fn new(ty: &Type) -> Self {
        Value {
            addressable: true,
            ..Self::zero(ty)
        }
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Self::from_data(Type::bytes(), Data::Bytes(b.into()))
    }

    /// Box `v` as an `interface {}` value.
    pub fn boxed(v: &Value) -> Self {
        let ty = Type::any();
        let data = data_for(&ty, v);
        Self::from_data(ty, data)
    }

    /// Wrap `v` as the dynamic value of interface type `ty`.
    pub fn interface(ty: &Type, v: &Value) -> Self {
        Self::from_data(ty.clone(), data_for(ty, v))
    }

    /// A slice of `elem` holding copies of `items`.
    pub fn slice(elem: Type, items: impl IntoIterator<Item = Value>) -> Self {
        let slots = items.into_iter().map(|v| slot(data_for(&elem, &v))).collect();
        Self::from_data(Type::slice(elem), Data::Seq(Rc::new(RefCell::new(slots))))
    }

    /// An array of `elem` sized to `items`.
    pub fn array(elem: Type, items: Vec<Value>) -> Self {
        let ty = Type::array(elem.clone(), items.len());
        let slots = items.iter().map(|v| slot(data_for(&elem, v))).collect();
        Self::from_data(ty, Data::Array(slots))
    }

    /// An empty, allocated map.
    pub fn map(key: Type, elem: Type) -> Self {
        Self::from_data(Type::map(key, elem), Data::Map(Rc::default()))
    }

    /// A `map[string]elem` populated from `entries`.
    pub fn string_map<'a>(elem: Type, entries: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        let map = Self::map(Type::string(), elem.clone());
        if let Data::Map(m) = &*map.data() {
            let mut m = m.borrow_mut();
            for (k, v) in entries {
                m.insert(
                    MapKey::Str(k.to_string()),
                    (Data::Str(k.to_string()), slot(data_for(&elem, &v))),
                );
            }
        }
        map
    }

    /// A record of type `ty`; fields not covered by `values` are zero.
    pub fn record(ty: &Type, values: impl IntoIterator<Item = Value>) -> Self {
        let mut values = values.into_iter();
        let slots = ty
            .fields()
            .iter()
            .map(|f| match values.next() {
                Some(v) => slot(data_for(&f.ty, &v)),
                None => slot(Data::zero(&f.ty)),
            })
            .collect();
        Self::from_data(ty.clone(), Data::Record(slots))
    }

    /// Allocate a new cell holding a copy of `v` and point at it.
    pub fn pointer_to(v: &Value) -> Self {
        let pointee = slot(v.data().copy());
        Self::from_data(Type::pointer(v.ty.clone()), Data::Pointer(pointee))
    }

    pub fn func<F>(sig: Signature, body: F) -> Self
    where
        F: Fn(&[Value]) -> Vec<Value> + 'static,
    {
        Self::from_data(Type::func(sig), Data::Func(Rc::new(body)))
    }

    /// A function value of the existing function type `ty`.
    pub fn func_of_type(ty: &Type, body: HostFn) -> Self {
        Self::from_data(ty.clone(), Data::Func(body))
    }

    pub fn error(err: HostError) -> Self {
        Self::from_data(Type::error(), Data::Error(err))
    }

    pub fn nil_error() -> Self {
        Self::from_data(Type::error(), Data::Nil)
    }

    pub fn handle(h: Rc<dyn Any>) -> Self {
        Self::from_data(Type::handle(), Data::Handle(h))
    }

    // ── Introspection ─────────────────────────────────────────────────────

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn kind(&self) -> Kind {
        self.ty.kind()
    }

    pub fn is_addressable(&self) -> bool {
        self.addressable
    }

    /// Nil slice, map, pointer, function, interface, error, or handle.
    pub fn is_nil(&self) -> bool {
        matches!(&*self.data(), Data::Nil)
    }

    pub(crate) fn data(&self) -> Ref<'_, Data> {
        self.slot.borrow()
    }

    pub(crate) fn set_data(&self, data: Data) {
        *self.slot.borrow_mut() = data;
    }

    /// Whether `self` and `other` alias the same storage.
    pub fn same_storage(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }

    /// Strip interface layers down to the dynamic value.
    pub fn concrete(&self) -> Value {
        let inner = match &*self.data() {
            Data::Dynamic(v) => Some((**v).clone()),
            _ => None,
        };
        match inner {
            Some(v) => v.concrete(),
            None => self.clone(),
        }
    }

    /// Detached copy with host value semantics; not addressable.
    pub fn copied(&self) -> Value {
        Self::from_data(self.ty.clone(), self.data().copy())
    }

    /// Store a copy of `v` into this slot.  The caller is responsible for
    /// type compatibility; see `bridge::assign` for checked coercion.
    pub fn set(&self, v: &Value) {
        let data = data_for(&self.ty, v);
        self.set_data(data);
    }

    pub fn set_zero(&self) {
        self.set_data(Data::zero(&self.ty));
    }

    /// Point this pointer at `target`'s storage.
    pub fn point_to(&self, target: &Value) {
        self.set_data(Data::Pointer(target.slot.clone()));
    }

    /// Replace a slice's backing with copies of `items`, or overwrite an
    /// array element-wise.  Extra items beyond an array's length are dropped.
    pub fn set_items(&self, items: &[Value]) {
        let Some(elem) = self.ty.elem() else { return };
        match self.kind() {
            Kind::Slice => {
                let slots = items.iter().map(|v| slot(data_for(elem, v))).collect();
                self.set_data(Data::Seq(Rc::new(RefCell::new(slots))));
            }
            Kind::Array => {
                for (i, v) in items.iter().enumerate() {
                    if let Some(target) = self.index(i) {
                        target.set(v);
                    }
                }
            }
            _ => {}
        }
    }

    /// A slice over elements `start..end`.  The result's elements alias the
    /// source; slicing an array yields a slice of its element type.
    pub fn slice_range(&self, start: usize, end: usize) -> Option<Value> {
        let elem = self.ty.elem()?.clone();
        let ty = match self.kind() {
            Kind::Slice => self.ty.clone(),
            Kind::Array => Type::slice(elem),
            _ => return None,
        };
        let slots: Vec<Slot> = match &*self.data() {
            Data::Seq(items) => items.borrow().get(start..end)?.to_vec(),
            Data::Array(items) => items.get(start..end)?.to_vec(),
            Data::Nil if start == 0 && end == 0 => Vec::new(),
            _ => return None,
        };
        Some(Self::from_data(ty, Data::Seq(Rc::new(RefCell::new(slots)))))
    }

    // ── Scalar accessors ──────────────────────────────────────────────────

    pub fn as_bool(&self) -> Option<bool> {
        match &*self.concrete().data() {
            Data::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match &*self.concrete().data() {
            Data::Int(n) => Some(*n),
            Data::Uint(n) => i64::try_from(*n).ok(),
            Data::BigInt(n) => n.to_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match &*self.concrete().data() {
            Data::Int(n) => u64::try_from(*n).ok(),
            Data::Uint(n) => Some(*n),
            Data::BigInt(n) => n.to_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match &*self.concrete().data() {
            Data::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_big_int(&self) -> Option<BigInt> {
        match &*self.concrete().data() {
            Data::Int(n) => Some(BigInt::from(*n)),
            Data::Uint(n) => Some(BigInt::from(*n)),
            Data::BigInt(n) => Some(n.clone()),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match &*self.concrete().data() {
            Data::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match &*self.concrete().data() {
            Data::Bytes(b) => Some(b.clone()),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<SystemTime> {
        match &*self.concrete().data() {
            Data::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match &*self.concrete().data() {
            Data::Duration(d) => Some(*d),
            _ => None,
        }
    }

    /// The error carried by a non-nil error value.
    pub fn as_error(&self) -> Option<HostError> {
        match &*self.concrete().data() {
            Data::Error(e) => Some(e.clone()),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<Rc<dyn Any>> {
        match &*self.concrete().data() {
            Data::Handle(h) => Some(h.clone()),
            _ => None,
        }
    }

    // ── Containers ────────────────────────────────────────────────────────

    /// Element count of a slice, array, map, string, or byte string.
    pub fn len(&self) -> usize {
        match &*self.data() {
            Data::Seq(items) => items.borrow().len(),
            Data::Array(items) => items.len(),
            Data::Map(m) => m.borrow().len(),
            Data::Str(s) => s.len(),
            Data::Bytes(b) => b.len(),
            Data::Dynamic(v) => v.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handle to element `i` of a slice or array.  Slice elements are
    /// always addressable; array elements inherit the array's addressability.
    pub fn index(&self, i: usize) -> Option<Value> {
        let ty = self.ty.elem()?.clone();
        let (slot, addressable) = match &*self.data() {
            Data::Seq(items) => (items.borrow().get(i)?.clone(), true),
            Data::Array(items) => (items.get(i)?.clone(), self.addressable),
            _ => return None,
        };
        Some(Value {
            ty,
            slot,
            addressable,
        })
    }

    /// Append a copy of `v` to a slice, allocating a nil slice first.
    /// Does nothing for other kinds.
    pub fn push(&self, v: &Value) {
        if self.kind() != Kind::Slice {
            return;
        }
        let Some(elem) = self.ty.elem() else { return };
        let item = slot(data_for(elem, v));
        let backing = match &*self.data() {
            Data::Seq(items) => Some(items.clone()),
            _ => None,
        };
        match backing {
            Some(items) => items.borrow_mut().push(item),
            None => self.set_data(Data::Seq(Rc::new(RefCell::new(vec![item])))),
        }
    }

    /// Shorten a slice's shared backing to `len` elements.
    pub fn truncate(&self, len: usize) {
        if let Data::Seq(items) = &*self.data() {
            items.borrow_mut().truncate(len);
        }
    }

    /// Handle to field `i` of a record.
    pub fn field(&self, i: usize) -> Option<Value> {
        let ty = self.ty.fields().get(i)?.ty.clone();
        let slot = match &*self.data() {
            Data::Record(fields) => fields.get(i)?.clone(),
            _ => return None,
        };
        Some(Value {
            ty,
            slot,
            addressable: self.addressable,
        })
    }

    pub fn field_by_name(&self, name: &str) -> Option<Value> {
        self.field(self.ty.field_index(name)?)
    }

    /// The pointee of a non-nil pointer (addressable), or the dynamic
    /// value of a non-nil interface.
    pub fn elem(&self) -> Option<Value> {
        match self.kind() {
            Kind::Pointer => {
                let ty = self.ty.elem()?.clone();
                let slot = match &*self.data() {
                    Data::Pointer(p) => p.clone(),
                    _ => return None,
                };
                Some(Value {
                    ty,
                    slot,
                    addressable: true,
                })
            }
            Kind::Interface => match &*self.data() {
                Data::Dynamic(v) => Some((**v).clone()),
                _ => None,
            },
            _ => None,
        }
    }

    fn entries(&self) -> Option<Rc<RefCell<Entries>>> {
        match &*self.data() {
            Data::Map(m) => Some(m.clone()),
            _ => None,
        }
    }

    fn entries_or_alloc(&self) -> Rc<RefCell<Entries>> {
        if let Some(m) = self.entries() {
            return m;
        }
        let m: Rc<RefCell<Entries>> = Rc::default();
        self.set_data(Data::Map(m.clone()));
        m
    }

    /// Look up `key` in a map.  Misses and nil maps yield `Ok(None)`.
    pub fn map_get(&self, key: &Value) -> Result<Option<Value>> {
        let k = map_key(key)?;
        let Some(ty) = self.ty.elem().cloned() else {
            return Ok(None);
        };
        let Some(entries) = self.entries() else {
            return Ok(None);
        };
        let found = entries.borrow().get(&k).map(|(_, s)| s.clone());
        Ok(found.map(|slot| Value {
            ty,
            slot,
            addressable: false,
        }))
    }

    /// Insert or overwrite `key`, allocating a nil map first.
    pub fn map_insert(&self, key: &Value, val: &Value) -> Result<()> {
        let (Some(kt), Some(vt)) = (self.ty.key(), self.ty.elem()) else {
            return Err(Error::conversion(&self.ty, "map"));
        };
        let k = map_key(key)?;
        let kd = data_for(kt, key);
        let vd = data_for(vt, val);
        let entries = self.entries_or_alloc();
        let existing = entries.borrow().get(&k).map(|(_, s)| s.clone());
        match existing {
            Some(s) => *s.borrow_mut() = vd,
            None => {
                entries.borrow_mut().insert(k, (kd, slot(vd)));
            }
        }
        Ok(())
    }

    /// Remove `key`; returns whether it was present.
    pub fn map_remove(&self, key: &Value) -> Result<bool> {
        let k = map_key(key)?;
        Ok(match self.entries() {
            Some(entries) => entries.borrow_mut().shift_remove(&k).is_some(),
            None => false,
        })
    }

    pub fn map_clear(&self) {
        if let Some(entries) = self.entries() {
            entries.borrow_mut().clear();
        }
    }

    /// Snapshot of a map's keys, in insertion order.
    pub fn map_keys(&self) -> Vec<Value> {
        let Some(kt) = self.ty.key() else {
            return Vec::new();
        };
        let Some(entries) = self.entries() else {
            return Vec::new();
        };
        let entries = entries.borrow();
        entries
            .values()
            .map(|(k, _)| Self::from_data(kt.clone(), k.copy()))
            .collect()
    }

    /// Snapshot of a map's entries; value handles alias the map's storage.
    pub fn map_entries(&self) -> Vec<(Value, Value)> {
        let (Some(kt), Some(vt)) = (self.ty.key(), self.ty.elem()) else {
            return Vec::new();
        };
        let Some(entries) = self.entries() else {
            return Vec::new();
        };
        let entries = entries.borrow();
        entries
            .values()
            .map(|(k, s)| {
                let key = Self::from_data(kt.clone(), k.copy());
                let val = Value {
                    ty: vt.clone(),
                    slot: s.clone(),
                    addressable: false,
                };
                (key, val)
            })
            .collect()
    }

    // ── Functions and methods ─────────────────────────────────────────────

    /// Invoke a function value.
    pub fn call(&self, args: &[Value]) -> Result<Vec<Value>> {
        let target = self.concrete();
        let f = match &*target.data() {
            Data::Func(f) => f.clone(),
            _ => {
                return Err(Error::Host(HostError::msg(format!(
                    "call of nil function {}",
                    target.ty
                ))))
            }
        };
        Ok(f(args))
    }

    /// Names in this value's method set.
    pub fn method_names(&self) -> Vec<String> {
        match self.kind() {
            Kind::Interface => self.elem().map(|v| v.method_names()).unwrap_or_default(),
            Kind::Error if !self.is_nil() => vec!["Error".to_string()],
            _ => self.ty.method_set().into_iter().map(|m| m.name).collect(),
        }
    }

    /// Method `name` bound to this receiver, as a function value.
    pub fn method(&self, name: &str) -> Option<Value> {
        match self.kind() {
            Kind::Interface => return self.elem()?.method(name),
            Kind::Error => {
                let err = self.as_error().filter(|_| name == "Error")?;
                let sig = Signature::new(vec![], vec![Type::string()]);
                return Some(Self::func(sig, move |_| vec![Value::from(err.to_string())]));
            }
            _ => {}
        }
        let m = self.ty.method(name)?;
        let recv = self.clone();
        let body = m.body.clone();
        let receiver = m.receiver;
        let f: HostFn = Rc::new(move |args: &[Value]| {
            let bound = match (receiver, recv.kind()) {
                (Receiver::Value, Kind::Pointer) => match recv.elem() {
                    Some(pointee) => pointee.copied(),
                    None => return Vec::new(),
                },
                (Receiver::Value, _) => recv.copied(),
                (Receiver::Pointer, _) => recv.clone(),
            };
            body(&bound, args)
        });
        Some(Self::from_data(Type::func((*m.sig).clone()), Data::Func(f)))
    }
}

// ── Conversions from native values ────────────────────────────────────────────

macro_rules! from_native {
    ($($t:ty => $ctor:expr, $data:ident as $repr:ty;)*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::from_data($ctor, Data::$data(n as $repr))
                }
            }
        )*
    };
}

from_native! {
    i8 => Type::int(IntWidth::W8), Int as i64;
    i16 => Type::int(IntWidth::W16), Int as i64;
    i32 => Type::int(IntWidth::W32), Int as i64;
    i64 => Type::int(IntWidth::W64), Int as i64;
    isize => Type::int(IntWidth::Word), Int as i64;
    u8 => Type::uint(IntWidth::W8), Uint as u64;
    u16 => Type::uint(IntWidth::W16), Uint as u64;
    u32 => Type::uint(IntWidth::W32), Uint as u64;
    u64 => Type::uint(IntWidth::W64), Uint as u64;
    usize => Type::uint(IntWidth::Word), Uint as u64;
    f32 => Type::float(FloatWidth::F32), Float as f64;
    f64 => Type::float(FloatWidth::F64), Float as f64;
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::from_data(Type::bool(), Data::Bool(b))
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::from_data(Type::big_int(), Data::BigInt(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::from_data(Type::string(), Data::Str(s))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::from(s.to_string())
    }
}

impl From<SystemTime> for Value {
    fn from(t: SystemTime) -> Self {
        Value::from_data(Type::time(), Data::Time(t))
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Value::from_data(Type::duration(), Data::Duration(d))
    }
}

// ── Equality and display ──────────────────────────────────────────────────────

impl PartialEq for Value {
    /// Deep equality of contents; numeric kinds compare by value.
    fn eq(&self, other: &Value) -> bool {
        data_eq(&self.data(), &other.data())
    }
}

fn slots_eq(a: &[Slot], b: &[Slot]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| data_eq(&x.borrow(), &y.borrow()))
}

fn data_eq(a: &Data, b: &Data) -> bool {
    match (a, b) {
        (Data::Dynamic(x), _) => data_eq(&x.data(), b),
        (_, Data::Dynamic(y)) => data_eq(a, &y.data()),
        (Data::Nil, Data::Nil) => true,
        (Data::Bool(x), Data::Bool(y)) => x == y,
        (Data::Int(x), Data::Int(y)) => x == y,
        (Data::Uint(x), Data::Uint(y)) => x == y,
        (Data::Int(x), Data::Uint(y)) | (Data::Uint(y), Data::Int(x)) => {
            u64::try_from(*x).map_or(false, |x| x == *y)
        }
        (Data::BigInt(x), Data::BigInt(y)) => x == y,
        (Data::BigInt(x), Data::Int(y)) | (Data::Int(y), Data::BigInt(x)) => *x == BigInt::from(*y),
        (Data::BigInt(x), Data::Uint(y)) | (Data::Uint(y), Data::BigInt(x)) => {
            *x == BigInt::from(*y)
        }
        (Data::Float(x), Data::Float(y)) => x == y,
        (Data::Str(x), Data::Str(y)) => x == y,
        (Data::Bytes(x), Data::Bytes(y)) => x == y,
        (Data::Time(x), Data::Time(y)) => x == y,
        (Data::Duration(x), Data::Duration(y)) => x == y,
        (Data::Seq(x), Data::Seq(y)) => Rc::ptr_eq(x, y) || slots_eq(&x.borrow(), &y.borrow()),
        (Data::Seq(x), Data::Array(y)) | (Data::Array(y), Data::Seq(x)) => slots_eq(&x.borrow(), y),
        (Data::Array(x), Data::Array(y)) | (Data::Record(x), Data::Record(y)) => slots_eq(x, y),
        (Data::Map(x), Data::Map(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().all(|(k, (_, s))| {
                    y.get(k)
                        .map_or(false, |(_, t)| data_eq(&s.borrow(), &t.borrow()))
                })
        }
        (Data::Pointer(x), Data::Pointer(y)) => Rc::ptr_eq(x, y),
        (Data::Func(x), Data::Func(y)) => Rc::ptr_eq(x, y),
        (Data::Error(x), Data::Error(y)) => x.addr() == y.addr() || x.to_string() == y.to_string(),
        (Data::Handle(x), Data::Handle(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

fn fmt_slots(f: &mut fmt::Formatter<'_>, open: &str, slots: &[Slot], close: &str) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, s) in slots.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        fmt_data(f, &s.borrow())?;
    }
    write!(f, "{close}")
}

fn fmt_data(f: &mut fmt::Formatter<'_>, data: &Data) -> fmt::Result {
    match data {
        Data::Nil => write!(f, "<nil>"),
        Data::Bool(b) => write!(f, "{b}"),
        Data::Int(n) => write!(f, "{n}"),
        Data::Uint(n) => write!(f, "{n}"),
        Data::Float(x) => write!(f, "{x}"),
        Data::BigInt(n) => write!(f, "{n}"),
        Data::Str(s) => write!(f, "{s}"),
        Data::Bytes(b) => {
            write!(f, "[")?;
            for (i, byte) in b.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{byte}")?;
            }
            write!(f, "]")
        }
        Data::Time(t) => match t.duration_since(UNIX_EPOCH) {
            Ok(d) => write!(f, "@{}.{:09}", d.as_secs(), d.subsec_nanos()),
            Err(_) => write!(f, "{t:?}"),
        },
        Data::Duration(d) => write!(f, "{d:?}"),
        Data::Seq(items) => fmt_slots(f, "[", &items.borrow(), "]"),
        Data::Array(items) => fmt_slots(f, "[", items, "]"),
        Data::Map(m) => {
            write!(f, "map[")?;
            for (i, (k, v)) in m.borrow().values().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                fmt_data(f, k)?;
                write!(f, ":")?;
                fmt_data(f, &v.borrow())?;
            }
            write!(f, "]")
        }
        Data::Record(fields) => fmt_slots(f, "{", fields, "}"),
        Data::Pointer(p) => match &*p.borrow() {
            Data::Record(fields) => fmt_slots(f, "&{", fields, "}"),
            _ => write!(f, "{:p}", Rc::as_ptr(p)),
        },
        Data::Func(func) => write!(f, "{:p}", Rc::as_ptr(func) as *const ()),
        Data::Dynamic(v) => fmt_data(f, &v.data()),
        Data::Error(e) => write!(f, "{e}"),
        Data::Handle(h) => write!(f, "handle({:p})", Rc::as_ptr(h) as *const ()),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_data(f, &self.data())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.ty, self)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Field;

    fn point() -> Type {
        Type::named(
            "geo.Point",
            Type::record(vec![Field::new("X", Type::int64()), Field::new("Y", Type::int64())]),
        )
    }

    #[test]
    fn zero_values() {
        assert_eq!(Value::zero(&Type::int64()).as_i64(), Some(0));
        assert_eq!(Value::zero(&Type::string()).as_string().as_deref(), Some(""));
        assert!(Value::zero(&Type::slice(Type::int64())).is_nil());
        assert!(Value::zero(&Type::map(Type::string(), Type::int64())).is_nil());
        let arr = Value::zero(&Type::array(Type::bool(), 3));
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.index(2).and_then(|v| v.as_bool()), Some(false));
    }

    #[test]
    fn records_copy_slices_share() {
        let p = Value::record(&point(), [Value::from(1i64), Value::from(2i64)]);
        let q = p.copied();
        q.field(0).unwrap().set(&Value::from(9i64));
        assert_eq!(p.field(0).unwrap().as_i64(), Some(1));
        assert_eq!(q.field(0).unwrap().as_i64(), Some(9));

        let s = Value::slice(Type::int64(), [Value::from(1i64)]);
        let t = s.copied();
        t.index(0).unwrap().set(&Value::from(5i64));
        assert_eq!(s.index(0).unwrap().as_i64(), Some(5));
    }

    #[test]
    fn slice_push_allocates_nil() {
        let s = Value::new(&Type::slice(Type::string()));
        assert!(s.is_nil());
        s.push(&Value::from("a"));
        s.push(&Value::from("b"));
        assert_eq!(s.len(), 2);
        assert_eq!(s.to_string(), "[a b]");
        s.truncate(0);
        assert_eq!(s.len(), 0);
    }

    #[test]
    fn map_operations() {
        let m = Value::new(&Type::map(Type::string(), Type::int64()));
        m.map_insert(&Value::from("a"), &Value::from(1i64)).unwrap();
        m.map_insert(&Value::from("b"), &Value::from(2i64)).unwrap();
        m.map_insert(&Value::from("a"), &Value::from(3i64)).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.map_get(&Value::from("a")).unwrap().and_then(|v| v.as_i64()), Some(3));
        assert!(m.map_get(&Value::from("z")).unwrap().is_none());
        assert!(m.map_remove(&Value::from("a")).unwrap());
        assert_eq!(m.to_string(), "map[b:2]");
    }

    #[test]
    fn slices_are_unhashable_keys() {
        let m = Value::map(Type::any(), Type::int64());
        let key = Value::slice(Type::int64(), []);
        assert!(matches!(
            m.map_insert(&key, &Value::from(1i64)),
            Err(Error::Unhashable(_))
        ));
    }

    #[test]
    fn pointer_elem_writes_through() {
        let p = Value::pointer_to(&Value::record(&point(), []));
        let field = p.elem().unwrap().field_by_name("Y").unwrap();
        assert!(field.is_addressable());
        field.set(&Value::from(7i64));
        assert_eq!(p.to_string(), "&{0 7}");
    }

    #[test]
    fn interface_boxing() {
        let any = Value::boxed(&Value::from(4i64));
        assert_eq!(any.kind(), Kind::Interface);
        assert_eq!(any.concrete().kind(), Kind::Int);
        assert_eq!(any.as_i64(), Some(4));
        assert!(Value::boxed(&Value::nil()).is_nil());
    }

    #[test]
    fn methods_bind_receivers() {
        let t = point();
        t.add_method(
            "Sum",
            Receiver::Value,
            Signature::new(vec![], vec![Type::int64()]),
            |recv, _| {
                let x = recv.field(0).and_then(|v| v.as_i64()).unwrap_or(0);
                let y = recv.field(1).and_then(|v| v.as_i64()).unwrap_or(0);
                vec![Value::from(x + y)]
            },
        );
        t.add_method(
            "Shift",
            Receiver::Pointer,
            Signature::new(vec![Type::int64()], vec![]),
            |recv, args| {
                if let (Some(p), Some(d)) = (recv.elem(), args.first().and_then(|a| a.as_i64())) {
                    let x = p.field(0).and_then(|v| v.as_i64()).unwrap_or(0);
                    p.field(0).unwrap().set(&Value::from(x + d));
                }
                vec![]
            },
        );
        let v = Value::record(&t, [Value::from(1i64), Value::from(2i64)]);
        assert_eq!(v.method_names(), ["Sum"]);
        assert!(v.method("Shift").is_none());

        let p = Value::pointer_to(&v);
        p.method("Shift").unwrap().call(&[Value::from(10i64)]).unwrap();
        let sum = p.method("Sum").unwrap().call(&[]).unwrap();
        assert_eq!(sum[0].as_i64(), Some(13));
    }

    #[test]
    fn numeric_equality_ignores_width() {
        assert_eq!(Value::from(200u8), Value::from(200i64));
        assert_ne!(Value::from(-1i64), Value::from(u64::MAX));
        assert_eq!(Value::from(BigInt::from(5)), Value::from(5u32));
    }

    #[test]
    fn error_method() {
        let e = Value::error(HostError::msg("boom"));
        assert_eq!(e.method_names(), ["Error"]);
        let out = e.method("Error").unwrap().call(&[]).unwrap();
        assert_eq!(out[0].as_string().as_deref(), Some("boom"));
        assert!(Value::nil_error().method("Error").is_none());
    }
}
