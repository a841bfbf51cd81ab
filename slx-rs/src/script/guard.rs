//! Freeze and iteration bookkeeping shared by mutable containers.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::{Error, Result};

/// Tracks whether a container is frozen and how many iterators are live.
#[derive(Debug, Default)]
pub struct MutationGuard {
    frozen: Cell<bool>,
    iterators: Cell<usize>,
}

impl MutationGuard {
    pub fn freeze(&self) {
        self.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    pub fn live_iterators(&self) -> usize {
        self.iterators.get()
    }

    /// Fail if `what` may not be mutated right now.
    pub fn check(&self, what: &'static str) -> Result<()> {
        if self.frozen.get() {
            return Err(Error::Frozen(what));
        }
        if self.iterators.get() > 0 {
            return Err(Error::Iterating(what));
        }
        Ok(())
    }

    fn enter(&self) {
        self.iterators.set(self.iterators.get() + 1);
    }

    fn exit(&self) {
        self.iterators.set(self.iterators.get().saturating_sub(1));
    }
}

/// Anything that owns a [`MutationGuard`].
pub trait Guarded {
    fn guard(&self) -> &MutationGuard;
}

/// Holds an iteration open on a guarded container until dropped.
pub struct IterToken(Rc<dyn Guarded>);

impl IterToken {
    pub fn new(owner: Rc<dyn Guarded>) -> Self {
        owner.guard().enter();
        IterToken(owner)
    }
}

impl Drop for IterToken {
    fn drop(&mut self) {
        self.0.guard().exit();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct Owner(MutationGuard);

    impl Guarded for Owner {
        fn guard(&self) -> &MutationGuard {
            &self.0
        }
    }

    #[test]
    fn iteration_blocks_mutation_until_dropped() {
        let owner = Rc::new(Owner(MutationGuard::default()));
        assert!(owner.0.check("list").is_ok());
        let token = IterToken::new(owner.clone());
        assert!(matches!(owner.0.check("list"), Err(Error::Iterating("list"))));
        drop(token);
        assert_eq!(owner.0.live_iterators(), 0);
        assert!(owner.0.check("list").is_ok());
    }

    #[test]
    fn frozen_wins_over_iteration() {
        let owner = Rc::new(Owner(MutationGuard::default()));
        owner.0.freeze();
        let _token = IterToken::new(owner.clone());
        assert!(matches!(owner.0.check("dict"), Err(Error::Frozen("dict"))));
    }
}
