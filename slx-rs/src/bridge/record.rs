//! Script view over a host record, used both for record values crossing
//! the boundary and for records registered as modules.

use std::fmt;

use tracing::trace;

use super::{assign, from_value, to_value, HostFunction};
use crate::error::{Error, Result};
use crate::host::{lower_first, upper_first, Kind, Type, Value as HostValue};
use crate::script::Value;

/// A host record exposed through attribute access.
///
/// The adapter always works through a pointer.  A bare record value is
/// first copied into fresh storage, so writes never reach the caller's
/// original; pass a pointer to get write-back.
pub struct RecordAdapter {
    name: String,
    pointer: HostValue,
    record: HostValue,
    copied: bool,
    fields: Vec<String>,
    methods: Vec<String>,
}

impl RecordAdapter {
    /// Bind to a record or pointer-to-record.  Without an explicit `name`
    /// the adapter is named after the type, dropping any package qualifier.
    pub fn bind(name: Option<&str>, value: &HostValue) -> Result<Self> {
        let not_record = || Error::conversion(value.ty(), "record");
        let (pointer, copied) = match value.kind() {
            Kind::Pointer => (value.clone(), false),
            Kind::Record => (HostValue::pointer_to(value), true),
            _ => return Err(not_record()),
        };
        let record = pointer
            .elem()
            .filter(|r| r.kind() == Kind::Record)
            .ok_or_else(not_record)?;

        let ty = record.ty().clone();
        let name = match name {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => short_name(&ty),
        };
        let fields = ty.fields().iter().map(|f| f.name.clone()).collect();

        // value-receiver methods first, then the pointer-only ones
        let mut methods = record.method_names();
        for m in pointer.method_names() {
            if !methods.contains(&m) {
                methods.push(m);
            }
        }

        trace!(%name, ty = %ty, copied, "binding record adapter");
        Ok(RecordAdapter {
            name,
            pointer,
            record,
            copied,
            fields,
            methods,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bound host value: the caller's pointer, or the internal copy
    /// when the adapter was bound over a bare record.
    pub fn host_value(&self) -> HostValue {
        if self.copied {
            self.record.clone()
        } else {
            self.pointer.clone()
        }
    }

    /// Method, then field; a miss yields `None` rather than an error.
    pub fn attr(&self, name: &str) -> Option<Value> {
        let name = upper_first(name);
        if self.methods.contains(&name) {
            let method = self.pointer.method(&name)?;
            return HostFunction::new(&name, method).ok().map(HostFunction::into_value);
        }
        if !self.fields.contains(&name) {
            return None;
        }
        let field = self.record.field_by_name(&name)?;
        Some(to_value(&field.copied()))
    }

    /// Coerce `value` into field `name`.
    pub fn set_field(&self, name: &str, value: &Value) -> Result<()> {
        let name = upper_first(name);
        let Some(field) = self.record.field_by_name(&name) else {
            return Err(Error::NoSuchField {
                record: self.name.clone(),
                field: name,
            });
        };
        assign(&field, &from_value(value))
    }

    /// Fields, then methods, with lower-cased first letters.
    pub fn attr_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .chain(&self.methods)
            .map(|n| lower_first(n))
            .collect()
    }
}

fn short_name(ty: &Type) -> String {
    match ty.name() {
        Some(full) => full.rsplit('.').next().unwrap_or(full).to_string(),
        None => "noname".to_string(),
    }
}

impl fmt::Display for RecordAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pointer)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
