//! Reified host type descriptors.
//!
//! A [`Type`] is a cheap, reference-counted handle to a type definition.
//! Unnamed types compare structurally; named types compare by identity,
//! so two `Type::named("geo.Point", ...)` calls produce distinct types.
//!
//! | Kind          | Zero value            | Value semantics |
//! |---------------|-----------------------|-----------------|
//! | scalars       | 0 / false / "" / epoch| copy            |
//! | `Slice`       | nil                   | shared backing  |
//! | `Array`       | n zero elements       | copy            |
//! | `Map`         | nil                   | shared          |
//! | `Record`      | zero fields           | copy            |
//! | `Pointer`     | nil                   | shared pointee  |
//! | `Func`        | nil                   | shared          |
//! | `Interface`   | nil                   | copy of dynamic |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::value::Value;

// ── Kinds ─────────────────────────────────────────────────────────────────────

/// Integer storage width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
    /// Platform word (`int` / `uint`).
    Word,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 | IntWidth::Word => 64,
        }
    }

    /// Whether the signed value `n` is representable at this width.
    pub fn fits_signed(self, n: i64) -> bool {
        match self {
            IntWidth::W8 => i8::try_from(n).is_ok(),
            IntWidth::W16 => i16::try_from(n).is_ok(),
            IntWidth::W32 => i32::try_from(n).is_ok(),
            IntWidth::W64 | IntWidth::Word => true,
        }
    }

    /// Whether the unsigned value `n` is representable at this width.
    pub fn fits_unsigned(self, n: u64) -> bool {
        match self {
            IntWidth::W8 => u8::try_from(n).is_ok(),
            IntWidth::W16 => u16::try_from(n).is_ok(),
            IntWidth::W32 => u32::try_from(n).is_ok(),
            IntWidth::W64 | IntWidth::Word => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

/// Coarse classification of a host type, used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    BigInt,
    String,
    Bytes,
    Time,
    Duration,
    Slice,
    Array,
    Map,
    Record,
    Pointer,
    Func,
    Interface,
    Error,
    /// Opaque foreign object carried by reference.
    Handle,
    Channel,
    UnsafePointer,
    Complex,
}

#[derive(Debug, Clone)]
pub(crate) enum Repr {
    Bool,
    Int(IntWidth),
    Uint(IntWidth),
    Float(FloatWidth),
    BigInt,
    String,
    Bytes,
    Time,
    Duration,
    Slice(Type),
    Array(Type, usize),
    Map(Type, Type),
    Record(Vec<Field>),
    Pointer(Type),
    Func(Rc<Signature>),
    /// Required method names; empty means "any".
    Interface(Vec<String>),
    Error,
    Handle,
    Channel(Type),
    UnsafePointer,
    Complex,
}

// ── Fields and signatures ─────────────────────────────────────────────────────

/// A named record field with an optional serialization tag.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub tag: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Field {
            name: name.into(),
            ty,
            tag: None,
        }
    }

    pub fn tagged(name: impl Into<String>, ty: Type, tag: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            ty,
            tag: Some(tag.into()),
        }
    }

    /// Key under which a mapping entry populates this field: the tag text
    /// before the first `,` when non-empty, else the lower-first name.
    pub fn key(&self) -> String {
        match self.tag.as_deref().and_then(|t| t.split(',').next()) {
            Some(k) if !k.is_empty() => k.to_string(),
            _ => lower_first(&self.name),
        }
    }
}

/// Parameter and result types of a host function.
#[derive(Debug, Clone)]
pub struct Signature {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
    /// The last parameter is a slice that absorbs trailing arguments.
    pub variadic: bool,
}

impl Signature {
    pub fn new(params: Vec<Type>, results: Vec<Type>) -> Self {
        Signature {
            params,
            results,
            variadic: false,
        }
    }

    /// A variadic signature; the last element of `params` must be a slice type.
    pub fn variadic(params: Vec<Type>, results: Vec<Type>) -> Self {
        let variadic = params.last().map(|t| t.kind() == Kind::Slice).unwrap_or(false);
        Signature {
            params,
            results,
            variadic,
        }
    }

    /// Number of leading non-variadic parameters.
    pub fn fixed_arity(&self) -> usize {
        self.params.len() - usize::from(self.variadic)
    }

    /// Element type of the variadic tail, if any.
    pub fn variadic_elem(&self) -> Option<&Type> {
        if self.variadic {
            self.params.last().and_then(Type::elem)
        } else {
            None
        }
    }

    /// Whether the final result is an error slot.
    pub fn returns_error(&self) -> bool {
        self.results.last().map(|t| t.kind() == Kind::Error).unwrap_or(false)
    }

    fn identical(&self, other: &Signature) -> bool {
        self.variadic == other.variadic
            && all_identical(&self.params, &other.params)
            && all_identical(&self.results, &other.results)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if self.variadic && i + 1 == self.params.len() {
                match p.elem() {
                    Some(e) => write!(f, "...{e}")?,
                    None => write!(f, "{p}")?,
                }
            } else {
                write!(f, "{p}")?;
            }
        }
        write!(f, ")")?;
        match self.results.len() {
            0 => Ok(()),
            1 => write!(f, " {}", self.results[0]),
            _ => {
                write!(f, " (")?;
                for (i, r) in self.results.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{r}")?;
                }
                write!(f, ")")
            }
        }
    }
}

fn all_identical(a: &[Type], b: &[Type]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.identical(y))
}

// ── Methods ───────────────────────────────────────────────────────────────────

/// Which receiver form a method is declared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// Callable on both `T` and `*T`.
    Value,
    /// Callable only through `*T`.
    Pointer,
}

/// Native body of a host method: receiver first, then the arguments.
pub type MethodBody = Rc<dyn Fn(&Value, &[Value]) -> Vec<Value>>;

#[derive(Clone)]
pub struct Method {
    pub name: String,
    pub receiver: Receiver,
    pub sig: Rc<Signature>,
    pub(crate) body: MethodBody,
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("receiver", &self.receiver)
            .field("sig", &self.sig.to_string())
            .finish()
    }
}

// ── Type ──────────────────────────────────────────────────────────────────────

struct TypeDef {
    name: Option<String>,
    repr: Repr,
    methods: RefCell<Vec<Method>>,
}

/// Handle to a host type definition.
#[derive(Clone)]
pub struct Type(Rc<TypeDef>);

impl Type {
    fn from_repr(name: Option<String>, repr: Repr) -> Self {
        Type(Rc::new(TypeDef {
            name,
            repr,
            methods: RefCell::new(Vec::new()),
        }))
    }

    pub fn bool() -> Self {
        Self::from_repr(None, Repr::Bool)
    }
    pub fn int(width: IntWidth) -> Self {
        Self::from_repr(None, Repr::Int(width))
    }
    pub fn uint(width: IntWidth) -> Self {
        Self::from_repr(None, Repr::Uint(width))
    }
    pub fn int64() -> Self {
        Self::int(IntWidth::W64)
    }
    pub fn uint64() -> Self {
        Self::uint(IntWidth::W64)
    }
    pub fn float(width: FloatWidth) -> Self {
        Self::from_repr(None, Repr::Float(width))
    }
    pub fn float64() -> Self {
        Self::float(FloatWidth::F64)
    }
    pub fn big_int() -> Self {
        Self::from_repr(None, Repr::BigInt)
    }
    pub fn string() -> Self {
        Self::from_repr(None, Repr::String)
    }
    pub fn bytes() -> Self {
        Self::from_repr(None, Repr::Bytes)
    }
    pub fn time() -> Self {
        Self::from_repr(None, Repr::Time)
    }
    pub fn duration() -> Self {
        Self::from_repr(None, Repr::Duration)
    }
    pub fn slice(elem: Type) -> Self {
        Self::from_repr(None, Repr::Slice(elem))
    }
    pub fn array(elem: Type, len: usize) -> Self {
        Self::from_repr(None, Repr::Array(elem, len))
    }
    pub fn map(key: Type, elem: Type) -> Self {
        Self::from_repr(None, Repr::Map(key, elem))
    }
    pub fn record(fields: Vec<Field>) -> Self {
        Self::from_repr(None, Repr::Record(fields))
    }
    pub fn pointer(elem: Type) -> Self {
        Self::from_repr(None, Repr::Pointer(elem))
    }
    pub fn func(sig: Signature) -> Self {
        Self::from_repr(None, Repr::Func(Rc::new(sig)))
    }
    /// The empty interface: every value satisfies it.
    pub fn any() -> Self {
        Self::from_repr(None, Repr::Interface(Vec::new()))
    }
    /// An interface requiring the named methods.
    pub fn interface(name: impl Into<String>, methods: &[&str]) -> Self {
        let methods = methods.iter().map(|m| m.to_string()).collect();
        Self::from_repr(Some(name.into()), Repr::Interface(methods))
    }
    pub fn error() -> Self {
        Self::from_repr(None, Repr::Error)
    }
    pub fn handle() -> Self {
        Self::from_repr(None, Repr::Handle)
    }
    pub fn channel(elem: Type) -> Self {
        Self::from_repr(None, Repr::Channel(elem))
    }
    pub fn unsafe_pointer() -> Self {
        Self::from_repr(None, Repr::UnsafePointer)
    }
    pub fn complex() -> Self {
        Self::from_repr(None, Repr::Complex)
    }

    /// Define a new named type with `underlying`'s representation and an
    /// empty method set.
    pub fn named(name: impl Into<String>, underlying: Type) -> Self {
        Self::from_repr(Some(name.into()), underlying.0.repr.clone())
    }

    /// Attach a method to this type.
    pub fn add_method<F>(&self, name: impl Into<String>, receiver: Receiver, sig: Signature, body: F)
    where
        F: Fn(&Value, &[Value]) -> Vec<Value> + 'static,
    {
        self.0.methods.borrow_mut().push(Method {
            name: name.into(),
            receiver,
            sig: Rc::new(sig),
            body: Rc::new(body),
        });
    }

    // ── Introspection ─────────────────────────────────────────────────────

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub(crate) fn repr(&self) -> &Repr {
        &self.0.repr
    }

    pub fn kind(&self) -> Kind {
        match &self.0.repr {
            Repr::Bool => Kind::Bool,
            Repr::Int(_) => Kind::Int,
            Repr::Uint(_) => Kind::Uint,
            Repr::Float(_) => Kind::Float,
            Repr::BigInt => Kind::BigInt,
            Repr::String => Kind::String,
            Repr::Bytes => Kind::Bytes,
            Repr::Time => Kind::Time,
            Repr::Duration => Kind::Duration,
            Repr::Slice(_) => Kind::Slice,
            Repr::Array(..) => Kind::Array,
            Repr::Map(..) => Kind::Map,
            Repr::Record(_) => Kind::Record,
            Repr::Pointer(_) => Kind::Pointer,
            Repr::Func(_) => Kind::Func,
            Repr::Interface(_) => Kind::Interface,
            Repr::Error => Kind::Error,
            Repr::Handle => Kind::Handle,
            Repr::Channel(_) => Kind::Channel,
            Repr::UnsafePointer => Kind::UnsafePointer,
            Repr::Complex => Kind::Complex,
        }
    }

    /// Element type of a slice, array, map, pointer, or channel.
    pub fn elem(&self) -> Option<&Type> {
        match &self.0.repr {
            Repr::Slice(e)
            | Repr::Array(e, _)
            | Repr::Map(_, e)
            | Repr::Pointer(e)
            | Repr::Channel(e) => Some(e),
            _ => None,
        }
    }

    /// Key type of a map.
    pub fn key(&self) -> Option<&Type> {
        match &self.0.repr {
            Repr::Map(k, _) => Some(k),
            _ => None,
        }
    }

    pub fn array_len(&self) -> Option<usize> {
        match &self.0.repr {
            Repr::Array(_, n) => Some(*n),
            _ => None,
        }
    }

    pub fn fields(&self) -> &[Field] {
        match &self.0.repr {
            Repr::Record(fields) => fields,
            _ => &[],
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f.name == name)
    }

    pub fn signature(&self) -> Option<&Rc<Signature>> {
        match &self.0.repr {
            Repr::Func(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn int_width(&self) -> Option<IntWidth> {
        match &self.0.repr {
            Repr::Int(w) | Repr::Uint(w) => Some(*w),
            _ => None,
        }
    }

    pub fn float_width(&self) -> Option<FloatWidth> {
        match &self.0.repr {
            Repr::Float(w) => Some(*w),
            _ => None,
        }
    }

    /// Methods an interface type requires.
    pub fn required_methods(&self) -> &[String] {
        match &self.0.repr {
            Repr::Interface(m) => m,
            _ => &[],
        }
    }

    /// True for the empty interface.
    pub fn is_any(&self) -> bool {
        matches!(&self.0.repr, Repr::Interface(m) if m.is_empty())
    }

    /// Methods declared directly on this type, in declaration order.
    pub fn declared_methods(&self) -> Vec<Method> {
        self.0.methods.borrow().clone()
    }

    /// The method set of this type: `T` sees value-receiver methods,
    /// `*T` additionally sees pointer-receiver methods of `T`.
    pub fn method_set(&self) -> Vec<Method> {
        match &self.0.repr {
            Repr::Pointer(elem) => elem.declared_methods(),
            _ => self
                .declared_methods()
                .into_iter()
                .filter(|m| m.receiver == Receiver::Value)
                .collect(),
        }
    }

    pub fn method(&self, name: &str) -> Option<Method> {
        self.method_set().into_iter().find(|m| m.name == name)
    }

    /// Whether values of this type satisfy the interface `iface`.
    pub fn implements(&self, iface: &Type) -> bool {
        let methods = self.method_set();
        iface
            .required_methods()
            .iter()
            .all(|req| methods.iter().any(|m| &m.name == req))
    }

    /// Type identity: named types by definition, unnamed types by structure.
    pub fn identical(&self, other: &Type) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        if self.0.name.is_some() || other.0.name.is_some() {
            return false;
        }
        self.same_underlying(other)
    }

    /// Structural identity of the underlying representations, ignoring
    /// the outermost names.
    pub fn same_underlying(&self, other: &Type) -> bool {
        match (&self.0.repr, &other.0.repr) {
            (Repr::Bool, Repr::Bool)
            | (Repr::BigInt, Repr::BigInt)
            | (Repr::String, Repr::String)
            | (Repr::Bytes, Repr::Bytes)
            | (Repr::Time, Repr::Time)
            | (Repr::Duration, Repr::Duration)
            | (Repr::Error, Repr::Error)
            | (Repr::Handle, Repr::Handle)
            | (Repr::UnsafePointer, Repr::UnsafePointer)
            | (Repr::Complex, Repr::Complex) => true,
            (Repr::Int(a), Repr::Int(b)) | (Repr::Uint(a), Repr::Uint(b)) => a == b,
            (Repr::Float(a), Repr::Float(b)) => a == b,
            (Repr::Slice(a), Repr::Slice(b))
            | (Repr::Pointer(a), Repr::Pointer(b))
            | (Repr::Channel(a), Repr::Channel(b)) => a.identical(b),
            (Repr::Array(a, n), Repr::Array(b, m)) => n == m && a.identical(b),
            (Repr::Map(ka, va), Repr::Map(kb, vb)) => ka.identical(kb) && va.identical(vb),
            (Repr::Record(a), Repr::Record(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| {
                        x.name == y.name && x.tag == y.tag && x.ty.identical(&y.ty)
                    })
            }
            (Repr::Func(a), Repr::Func(b)) => a.identical(b),
            (Repr::Interface(a), Repr::Interface(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({self})")
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.0.name {
            return write!(f, "{name}");
        }
        match &self.0.repr {
            Repr::Bool => write!(f, "bool"),
            Repr::Int(IntWidth::Word) => write!(f, "int"),
            Repr::Int(w) => write!(f, "int{}", w.bits()),
            Repr::Uint(IntWidth::Word) => write!(f, "uint"),
            Repr::Uint(w) => write!(f, "uint{}", w.bits()),
            Repr::Float(FloatWidth::F32) => write!(f, "float32"),
            Repr::Float(FloatWidth::F64) => write!(f, "float64"),
            Repr::BigInt => write!(f, "big.Int"),
            Repr::String => write!(f, "string"),
            Repr::Bytes => write!(f, "[]byte"),
            Repr::Time => write!(f, "time.Time"),
            Repr::Duration => write!(f, "time.Duration"),
            Repr::Slice(e) => write!(f, "[]{e}"),
            Repr::Array(e, n) => write!(f, "[{n}]{e}"),
            Repr::Map(k, v) => write!(f, "map[{k}]{v}"),
            Repr::Record(fields) => {
                write!(f, "struct {{")?;
                for (i, field) in fields.iter().enumerate() {
                    let sep = if i == 0 { " " } else { "; " };
                    write!(f, "{sep}{} {}", field.name, field.ty)?;
                }
                if fields.is_empty() {
                    write!(f, "}}")
                } else {
                    write!(f, " }}")
                }
            }
            Repr::Pointer(e) => write!(f, "*{e}"),
            Repr::Func(sig) => write!(f, "{sig}"),
            Repr::Interface(m) if m.is_empty() => write!(f, "interface {{}}"),
            Repr::Interface(m) => write!(f, "interface {{ {} }}", m.join("; ")),
            Repr::Error => write!(f, "error"),
            Repr::Handle => write!(f, "handle"),
            Repr::Channel(e) => write!(f, "chan {e}"),
            Repr::UnsafePointer => write!(f, "unsafe.Pointer"),
            Repr::Complex => write!(f, "complex128"),
        }
    }
}

// ── Name helpers ──────────────────────────────────────────────────────────────

/// `"name"` → `"Name"`.
pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `"Name"` → `"name"`.
pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
