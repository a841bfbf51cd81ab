//! Crate-wide error type.
//!
//! Every fallible bridge, evaluator, registry, and cache operation returns
//! [`Result`].  Host errors raised by host functions travel through the
//! script runtime unchanged inside [`Error::Host`].

use thiserror::Error;

use crate::host::HostError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the value bridge and the reference evaluator.
#[derive(Debug, Error)]
pub enum Error {
    /// A call supplied the wrong number of positional arguments.
    #[error("{name}: got {actual} arguments, want {}", arity(.expected, .variadic))]
    ArgumentCount {
        name: String,
        expected: usize,
        actual: usize,
        variadic: bool,
    },

    /// A dynamic value could not be coerced into a typed host slot.
    #[error("cannot convert {from} to {to}")]
    Conversion { from: String, to: String },

    /// The host value's kind has no script representation.
    #[error("unsupported host kind: {0}")]
    UnsupportedHostKind(String),

    /// Mutation of a frozen sequence or mapping.
    #[error("cannot modify frozen {0}")]
    Frozen(&'static str),

    /// Structural mutation while an iterator is live.
    #[error("cannot modify {0} during iteration")]
    Iterating(&'static str),

    /// Mutable values (adapters, lists, dicts) cannot be hashed.
    #[error("unhashable type: {0}")]
    Unhashable(String),

    /// Write to a record field that does not exist.
    #[error("field {field} not found in {record}")]
    NoSuchField { record: String, field: String },

    /// Append/clear on a fixed-length host array.
    #[error("cannot resize fixed-length {0}")]
    FixedLength(String),

    /// A host function meant to call script code has no trailing error result.
    #[error("{0}: a host function bound to script code must return a trailing error")]
    MissingErrorSlot(String),

    /// An error value returned by a host function.
    #[error("{0}")]
    Host(HostError),

    /// A failure raised by the script runtime.
    #[error("{0}")]
    Script(String),

    /// Script source could not be parsed.
    #[error("{file}:{line}: {message}")]
    Syntax {
        file: String,
        line: usize,
        message: String,
    },

    /// Registration of a builtin or module was rejected.
    #[error("{0}")]
    Registry(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a script runtime failure.
    pub fn script(message: impl Into<String>) -> Self {
        Error::Script(message.into())
    }

    pub(crate) fn conversion(from: impl ToString, to: impl ToString) -> Self {
        Error::Conversion {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

fn arity(expected: &usize, variadic: &bool) -> String {
    if *variadic {
        format!("at least {expected}")
    } else {
        expected.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_count_message() {
        let e = Error::ArgumentCount {
            name: "add".into(),
            expected: 2,
            actual: 3,
            variadic: false,
        };
        assert_eq!(e.to_string(), "add: got 3 arguments, want 2");

        let e = Error::ArgumentCount {
            name: "join".into(),
            expected: 1,
            actual: 0,
            variadic: true,
        };
        assert_eq!(e.to_string(), "join: got 0 arguments, want at least 1");
    }

    #[test]
    fn conversion_message() {
        assert_eq!(
            Error::conversion("string", "int64").to_string(),
            "cannot convert string to int64"
        );
    }

    #[test]
    fn host_error_is_transparent() {
        let e = Error::Host(HostError::msg("disk full"));
        assert_eq!(e.to_string(), "disk full");
    }
}
