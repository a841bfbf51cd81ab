//! Embedded script runtime.
//!
//! A compact, deterministic, Python-like language used on the script side
//! of the bridge:
//!
//! - `def`, `lambda`, `if`/`elif`/`else`, `for`, `break`, `continue`, `return`
//! - list, tuple, dict literals; indexing and slicing with negative steps
//! - arbitrary-precision integers, floats, strings, bytes
//! - host values surface as adapter variants of [`Value`]
//!
//! # Quick start
//!
//! ```rust
//! use std::rc::Rc;
//! use slx::script::{Bindings, Interpreter, Thread, Value};
//!
//! let interp = Interpreter::new(Thread::new("main", 64), Rc::default());
//! let globals = interp.execute("demo.star", "x = 6 * 7\n", Bindings::new()).unwrap();
//! assert_eq!(globals["x"], Value::from(42i64));
//! ```

pub mod builtins;
pub mod expr;
pub mod guard;
pub mod interp;
pub mod ops;
pub mod stmt;
pub mod value;

pub use guard::{Guarded, IterToken, MutationGuard};
pub use interp::{call, Bindings, Function, Interpreter, Thread, DEFAULT_MAX_DEPTH};
pub use value::{Builtin, Dict, HashKey, List, Module, NativeFn, Set, Value};
