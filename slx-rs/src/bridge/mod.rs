//! The value bridge between host values and script values.
//!
//! | Direction       | Entry point                      | Notes                          |
//! |-----------------|----------------------------------|--------------------------------|
//! | host → script   | [`to_value`] / [`try_to_value`]  | aggregates become adapters     |
//! | script → host   | [`from_value`]                   | untyped host shapes            |
//! | script → slot   | [`assign`]                       | type-directed coercion         |
//! | host fn → script| [`HostFunction`]                 | arity check, error sentinel    |
//! | script fn → host| [`bind_script_func`]             | signature synthesis            |

mod coerce;
mod convert;
mod func;
mod mapping;
mod opaque;
mod record;
mod sequence;

pub use coerce::{assign, make_value};
pub use convert::{from_value, to_value, try_to_value};
pub use func::{bind_script_func, HostFunction, ScriptCallable};
pub use mapping::{MappingAdapter, MappingIter};
pub use opaque::OpaqueAdapter;
pub use record::RecordAdapter;
pub use sequence::{SequenceAdapter, SequenceIter};
