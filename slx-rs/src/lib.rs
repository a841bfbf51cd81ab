//! `slx`: a value bridge between a reflective host object model and an
//! embedded Python-like script runtime.
//!
//! | Module       | Role                                                      |
//! |--------------|-----------------------------------------------------------|
//! | [`host`]     | runtime-typed host values: records, slices, maps, funcs   |
//! | [`script`]   | the script value model and a small reference interpreter  |
//! | [`bridge`]   | conversion, coercion, adapters, function adapters         |
//! | [`registry`] | builtins and modules shared by every context              |
//! | [`context`]  | load, evaluate, and call into one script                  |
//! | [`cache`]    | path-keyed contexts reloaded on file change               |
//! | [`config`]   | `key = value` settings for contexts                       |
//!
//! ```
//! use slx::config::Config;
//! use slx::context::Context;
//! use slx::registry::Registry;
//! use slx::HostValue;
//!
//! let ctx = Context::new(&Registry::new(), &Config::default());
//! ctx.load_script("def double(n):\n    return n * 2\n", &[]).unwrap();
//! let out = ctx.call_func("double", &[HostValue::from(21i64)]).unwrap();
//! assert_eq!(out.as_i64(), Some(42));
//! ```

pub mod bridge;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod registry;
pub mod script;

pub use error::{Error, Result};
pub use host::Value as HostValue;
pub use script::Value as ScriptValue;
