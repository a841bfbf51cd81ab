//! Live script view over a host slice or array.

use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::{assign, from_value, make_value, to_value};
use crate::error::{Error, Result};
use crate::host::{Kind, Type, Value as HostValue};
use crate::script::{Guarded, IterToken, MutationGuard, Value};

const WHAT: &str = "host_list";

/// A host slice or array seen as a script sequence.
pub struct SequenceAdapter {
    value: HostValue,
    guard: MutationGuard,
}

impl SequenceAdapter {
    pub fn new(value: HostValue) -> Self {
        trace!(ty = %value.ty(), "binding sequence adapter");
        SequenceAdapter {
            value,
            guard: MutationGuard::default(),
        }
    }

    pub fn host_value(&self) -> &HostValue {
        &self.value
    }

    fn elem_type(&self) -> Type {
        self.value.ty().elem().cloned().unwrap_or_else(Type::any)
    }

    fn is_array(&self) -> bool {
        self.value.kind() == Kind::Array
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn freeze(&self) {
        self.guard.freeze();
    }

    pub fn is_frozen(&self) -> bool {
        self.guard.is_frozen()
    }

    fn out_of_range(&self, i: usize) -> Error {
        Error::script(format!("index {i} out of range [0:{}]", self.len()))
    }

    /// Element `i`, converted with host value semantics.
    pub fn get(&self, i: usize) -> Result<Value> {
        let item = self.value.index(i).ok_or_else(|| self.out_of_range(i))?;
        Ok(to_value(&item.copied()))
    }

    /// Coerce `v` into element `i`.
    pub fn set(&self, i: usize, v: &Value) -> Result<()> {
        self.guard.check(WHAT)?;
        let slot = self.value.index(i).ok_or_else(|| self.out_of_range(i))?;
        assign(&slot, &from_value(v))
    }

    /// Elements `start`, `start + step`, ... up to but excluding `end`,
    /// with indices already normalized by the caller.
    ///
    /// A unit step over a slice yields a slice of the same type whose
    /// elements alias this one; any other step copies into a new `[]elem`.
    pub fn slice(&self, start: i64, end: i64, step: i64) -> Result<Value> {
        if step == 0 {
            return Err(Error::script("slice step cannot be zero"));
        }
        if step == 1 {
            let (start, end) = (start.max(0) as usize, end.max(0) as usize);
            let end = end.max(start).min(self.len());
            let start = start.min(end);
            let view = self
                .value
                .slice_range(start, end)
                .ok_or_else(|| self.out_of_range(end))?;
            return Ok(Value::Sequence(Rc::new(SequenceAdapter::new(view))));
        }
        let out = HostValue::zero(&Type::slice(self.elem_type()));
        let mut i = start;
        while (step > 0 && i < end) || (step < 0 && i > end) {
            if let Some(item) = usize::try_from(i).ok().and_then(|i| self.value.index(i)) {
                out.push(&item);
            }
            // a step past i64 range ends the walk
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
        Ok(Value::Sequence(Rc::new(SequenceAdapter::new(out))))
    }

    /// Coerce `v` to the element type and append it.
    pub fn append(&self, v: &Value) -> Result<()> {
        self.guard.check(WHAT)?;
        if self.is_array() {
            return Err(Error::FixedLength(self.value.ty().to_string()));
        }
        let item = make_value(&self.elem_type())?;
        assign(&item, &from_value(v))?;
        self.value.push(&item);
        Ok(())
    }

    /// Truncate to zero length.  Other holders of the same slice observe the
    /// truncation, since the backing is shared.
    pub fn clear(&self) -> Result<()> {
        self.guard.check(WHAT)?;
        if self.is_array() {
            return Err(Error::FixedLength(self.value.ty().to_string()));
        }
        self.value.truncate(0);
        Ok(())
    }

    /// Iterate elements; structural mutation fails until the iterator drops.
    pub fn iterate(self: &Rc<Self>) -> SequenceIter {
        SequenceIter {
            adapter: self.clone(),
            index: 0,
            _token: IterToken::new(self.clone()),
        }
    }

    /// Script-visible methods.
    pub fn attr(self: &Rc<Self>, name: &str) -> Option<Value> {
        let this = self.clone();
        let method = match name {
            "append" => Value::builtin("append", move |_, args| {
                let [v] = args else {
                    return Err(arity("append", 1, args.len()));
                };
                this.append(v)?;
                Ok(Value::None)
            }),
            "extend" => Value::builtin("extend", move |_, args| {
                let [Value::List(items)] = args else {
                    return Err(Error::script("extend: want a single list argument"));
                };
                for v in items.items() {
                    this.append(&v)?;
                }
                Ok(Value::None)
            }),
            "clear" => Value::builtin("clear", move |_, args| {
                if !args.is_empty() {
                    return Err(arity("clear", 0, args.len()));
                }
                this.clear()?;
                Ok(Value::None)
            }),
            _ => return None,
        };
        Some(method)
    }

    pub fn attr_names(&self) -> Vec<String> {
        ["append", "clear", "extend"].map(String::from).to_vec()
    }
}

pub(crate) fn arity(name: &str, expected: usize, actual: usize) -> Error {
    Error::ArgumentCount {
        name: name.to_string(),
        expected,
        actual,
        variadic: false,
    }
}

impl Guarded for SequenceAdapter {
    fn guard(&self) -> &MutationGuard {
        &self.guard
    }
}

impl fmt::Display for SequenceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Iterator over a [`SequenceAdapter`]; releases the iteration guard on drop.
pub struct SequenceIter {
    adapter: Rc<SequenceAdapter>,
    index: usize,
    _token: IterToken,
}

impl Iterator for SequenceIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let v = self.adapter.get(self.index).ok()?;
        self.index += 1;
        Some(v)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
