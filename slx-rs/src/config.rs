//! Execution-context configuration.
//!
//! A config file is a list of `key = value` lines:
//!
//! | Key              | Type    | Default            |
//! |------------------|---------|--------------------|
//! | `thread_name`    | string  | `slx`              |
//! | `max_call_depth` | integer | `256`              |
//! | `script_name`    | string  | `load-script.star` |
//! | `eval_name`      | string  | `eval-script`      |
//! | `freeze_globals` | bool    | `true`             |
//!
//! Lines starting with `#` or `;` are comments.  Values may be wrapped in
//! double quotes.  Bad values and unknown keys are collected as
//! [`ConfigError`]s and leave the default in place.

use std::path::Path;

use thiserror::Error;

use crate::script::DEFAULT_MAX_DEPTH;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Name given to the script thread; shows up in logs and depth errors.
    pub thread_name: String,
    pub max_call_depth: usize,
    /// Chunk name for [`Context::load_script`](crate::context::Context::load_script).
    pub script_name: String,
    /// Chunk name for [`Context::eval`](crate::context::Context::eval).
    pub eval_name: String,
    /// Freeze module globals once a load finishes.
    pub freeze_globals: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            thread_name: "slx".to_string(),
            max_call_depth: DEFAULT_MAX_DEPTH,
            script_name: "load-script.star".to_string(),
            eval_name: "eval-script".to_string(),
            freeze_globals: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config string.
    ///
    /// Returns the config and a list of errors on lines that were skipped.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                errors.push(ConfigError {
                    line: lineno,
                    message: format!("expected key = value, got {line:?}"),
                });
                continue;
            };
            let key = key.trim();
            let value = unquote(value.trim());

            if let Err(message) = config.apply(key, value) {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (config, errors)
    }

    /// Read and parse a config file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "thread_name" => self.thread_name = non_empty(key, value)?,
            "script_name" => self.script_name = non_empty(key, value)?,
            "eval_name" => self.eval_name = non_empty(key, value)?,
            "max_call_depth" => {
                self.max_call_depth = match value.parse::<usize>() {
                    Ok(0) => return Err("max_call_depth must be positive".to_string()),
                    Ok(n) => n,
                    Err(_) => return Err(format!("max_call_depth: invalid integer {value:?}")),
                }
            }
            "freeze_globals" => self.freeze_globals = parse_bool(value)
                .ok_or_else(|| format!("freeze_globals: invalid bool {value:?}"))?,
            _ => return Err(format!("unknown key {key:?}")),
        }
        Ok(())
    }
}

// ── Value parsing ─────────────────────────────────────────────────────────────

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

fn non_empty(key: &str, value: &str) -> Result<String, String> {
    if value.is_empty() {
        Err(format!("{key} must not be empty"))
    } else {
        Ok(value.to_string())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.script_name, "load-script.star");
        assert_eq!(c.eval_name, "eval-script");
        assert_eq!(c.max_call_depth, DEFAULT_MAX_DEPTH);
        assert!(c.freeze_globals);
    }

    #[test]
    fn load_all_keys() {
        let src = "\
# comment
; also a comment
thread_name = \"worker\"
max_call_depth = 32
script_name = init.star
eval_name = expr
freeze_globals = off
";
        let (c, errs) = Config::load_str(src);
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(c.thread_name, "worker");
        assert_eq!(c.max_call_depth, 32);
        assert_eq!(c.script_name, "init.star");
        assert_eq!(c.eval_name, "expr");
        assert!(!c.freeze_globals);
    }

    #[test]
    fn bad_lines_are_reported_and_skipped() {
        let src = "max_call_depth = lots\nfrobnicate = 1\nnot a pair\nmax_call_depth = 0\nthread_name = \"\"\n";
        let (c, errs) = Config::load_str(src);
        assert_eq!(c, Config::default());
        let lines: Vec<usize> = errs.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4, 5]);
        assert_eq!(errs[1].to_string(), "line 2: unknown key \"frobnicate\"");
    }

    #[test]
    fn load_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slx.conf");
        std::fs::write(&path, "thread_name = disk\n").unwrap();
        let (c, errs) = Config::load_file(&path).unwrap();
        assert!(errs.is_empty());
        assert_eq!(c.thread_name, "disk");
        assert!(Config::load_file(&dir.path().join("missing")).is_err());
    }
}
