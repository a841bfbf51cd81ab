//! Script view over a host interface, error, or foreign handle.

use std::fmt;

use super::HostFunction;
use crate::host::{lower_first, upper_first, Value as HostValue};
use crate::script::Value;

/// Exposes only the dynamic method set of the wrapped value, resolved on
/// every access.
pub struct OpaqueAdapter {
    value: HostValue,
}

impl OpaqueAdapter {
    pub fn new(value: HostValue) -> Self {
        OpaqueAdapter { value }
    }

    pub fn host_value(&self) -> &HostValue {
        &self.value
    }

    pub fn attr(&self, name: &str) -> Option<Value> {
        if name.is_empty() {
            return None;
        }
        let name = upper_first(name);
        let method = self.value.method(&name)?;
        HostFunction::new(&name, method).ok().map(HostFunction::into_value)
    }

    pub fn attr_names(&self) -> Vec<String> {
        self.value.method_names().iter().map(|n| lower_first(n)).collect()
    }
}

impl fmt::Display for OpaqueAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
