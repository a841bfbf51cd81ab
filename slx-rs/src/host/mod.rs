//! Reflective host object model.
//!
//! The bridge never sees native Rust types directly.  Host code describes
//! its data with [`Type`] descriptors and exchanges [`Value`]s, which the
//! bridge can inspect, allocate, and write through at runtime.

pub mod types;
pub mod value;

use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

pub use types::{lower_first, upper_first, Field, FloatWidth, IntWidth, Kind, Method, Receiver, Signature, Type};
pub use value::{HostFn, Value};

/// An error value produced or consumed by host functions.
#[derive(Clone)]
pub struct HostError(Rc<dyn StdError + 'static>);

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

impl HostError {
    pub fn new<E: StdError + 'static>(err: E) -> Self {
        HostError(Rc::new(err))
    }

    /// An error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    pub fn inner(&self) -> &(dyn StdError + 'static) {
        &*self.0
    }

    /// Downcast to the concrete error type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}
