//! Path-keyed cache of loaded contexts.
//!
//! [`ContextCache::acquire`] loads a script file once and hands back the
//! same [`Context`] until the file's modification time changes.  Any
//! change counts, not only a newer time, so restoring an older copy of a
//! file also triggers a reload.
//!
//! The map sits behind one mutex, held only while reading or writing the
//! map.  Compilation happens outside the lock; two callers racing on a
//! stale path may both compile, and the later store wins.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tracing::debug;

use crate::config::Config;
use crate::context::{Context, Vars};
use crate::error::Result;
use crate::registry::Registry;
use crate::script::Bindings;

struct Entry {
    context: Rc<Context>,
    modified: SystemTime,
}

pub struct ContextCache {
    universe: Rc<Bindings>,
    config: Config,
    entries: Mutex<HashMap<PathBuf, Entry>>,
}

impl ContextCache {
    pub fn new(registry: &Registry, config: Config) -> Self {
        ContextCache {
            universe: registry.universe(),
            config,
            entries: Mutex::default(),
        }
    }

    /// The context for the script at `path`, loading it with `vars` on a
    /// miss or after the file changed.  The flag is `true` when the cached
    /// context was returned unchanged.
    pub fn acquire(&self, path: impl AsRef<Path>, vars: &Vars<'_>) -> Result<(Rc<Context>, bool)> {
        let path = path.as_ref();
        let modified = fs::metadata(path)?.modified()?;

        let stale = match self.lock().get(path) {
            Some(entry) if entry.modified == modified => {
                debug!(path = %path.display(), "context cache hit");
                return Ok((entry.context.clone(), true));
            }
            Some(_) => true,
            None => false,
        };
        if stale {
            debug!(path = %path.display(), "script changed, reloading");
        } else {
            debug!(path = %path.display(), "context cache miss");
        }

        let context = Rc::new(Context::with_universe(self.universe.clone(), &self.config));
        context.load_file(path, vars)?;
        self.lock().insert(
            path.to_path_buf(),
            Entry {
                context: context.clone(),
                modified,
            },
        );
        Ok((context, false))
    }

    /// Drop the entry for `path`; returns whether one existed.
    pub fn evict(&self, path: impl AsRef<Path>) -> bool {
        self.lock().remove(path.as_ref()).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Value as HostValue;
    use std::time::Duration;

    fn touch(path: &Path, source: &str, at: SystemTime) {
        fs::write(path, source).unwrap();
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(at)
            .unwrap();
    }

    #[test]
    fn second_acquire_is_a_hit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.star");
        fs::write(&path, "x = n * 2\n").unwrap();

        let cache = ContextCache::new(&Registry::new(), Config::default());
        let vars = [("n", HostValue::from(21i64))];
        let (first, cached) = cache.acquire(&path, &vars).unwrap();
        assert!(!cached);
        let (second, cached) = cache.acquire(&path, &vars).unwrap();
        assert!(cached);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.get_global("x").unwrap().as_i64(), Some(42));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn changed_mtime_reloads_even_when_older() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.star");
        let now = SystemTime::now();
        touch(&path, "v = 1\n", now);

        let cache = ContextCache::new(&Registry::new(), Config::default());
        let (first, _) = cache.acquire(&path, &[]).unwrap();

        touch(&path, "v = 2\n", now - Duration::from_secs(60));
        let (second, cached) = cache.acquire(&path, &[]).unwrap();
        assert!(!cached);
        assert!(!Rc::ptr_eq(&first, &second));
        assert_eq!(second.get_global("v").unwrap().as_i64(), Some(2));
        assert_eq!(first.get_global("v").unwrap().as_i64(), Some(1));
    }

    #[test]
    fn failed_load_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.star");
        fs::write(&path, "x = (\n").unwrap();

        let cache = ContextCache::new(&Registry::new(), Config::default());
        assert!(cache.acquire(&path, &[]).is_err());
        assert!(cache.is_empty());
        assert!(cache.acquire(dir.path().join("missing.star"), &[]).is_err());
    }

    #[test]
    fn evict_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.star");
        fs::write(&path, "ok = True\n").unwrap();

        let cache = ContextCache::new(&Registry::new(), Config::default());
        cache.acquire(&path, &[]).unwrap();
        assert!(cache.evict(&path));
        assert!(!cache.evict(&path));
        let (_, cached) = cache.acquire(&path, &[]).unwrap();
        assert!(!cached);
        cache.clear();
        assert!(cache.is_empty());
    }
}
