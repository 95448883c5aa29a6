//! Host contexts
//!
//! Six contexts back every invocation. Each one keeps a current state plus a
//! stack of saved states so that a nested frame can be unwound without
//! touching its caller's view. The host pushes and pops all six together, in
//! the order of [`CONTEXT_ORDER`] (pops in reverse).

pub mod bigint;
pub mod blockchain;
pub mod metering;
pub mod output;
pub mod runtime;
pub mod storage;

pub use bigint::BigIntContext;
pub use blockchain::BlockchainContext;
pub use metering::MeteringContext;
pub use output::OutputContext;
pub use runtime::RuntimeContext;
pub use storage::StorageContext;

use crate::error::{HostError, Result};

/// Order in which contexts are pushed
pub const CONTEXT_ORDER: [&str; 6] = [
    "bigint",
    "blockchain",
    "metering",
    "output",
    "runtime",
    "storage",
];

/// Frame save/restore discipline shared by every context
pub trait StateStack {
    /// Reset to an empty frame; called once per top-level invocation
    fn init_state(&mut self);

    /// Save a copy of the current state
    fn push_state(&mut self);

    /// Restore the most recently saved state, dropping the current one
    fn pop_set_active_state(&mut self) -> Result<()>;

    /// Drop the most recently saved state, keeping the current one
    fn pop_discard(&mut self) -> Result<()>;

    /// Drop every saved state
    fn clear_state_stack(&mut self);

    /// Number of saved states
    fn state_stack_depth(&self) -> usize;
}

/// Current value plus saved copies
#[derive(Debug, Default, Clone)]
pub struct Stacked<T> {
    current: T,
    saved: Vec<T>,
}

impl<T: Clone + Default> Stacked<T> {
    /// Stack holding only `current`
    pub fn new(current: T) -> Self {
        Self {
            current,
            saved: Vec::new(),
        }
    }

    /// Active state
    pub fn current(&self) -> &T {
        &self.current
    }

    /// Active state, mutable
    pub fn current_mut(&mut self) -> &mut T {
        &mut self.current
    }

    /// Reset the active state
    pub fn reset(&mut self) {
        self.current = T::default();
    }

    /// Save a copy of the active state
    pub fn push(&mut self) {
        self.saved.push(self.current.clone());
    }

    /// Restore the top saved state; returns the state it replaced
    pub fn pop_restore(&mut self) -> Result<T> {
        let previous = self.saved.pop().ok_or(HostError::StateStackUnderflow)?;
        Ok(std::mem::replace(&mut self.current, previous))
    }

    /// Drop the top saved state
    pub fn pop_discard(&mut self) -> Result<T> {
        self.saved.pop().ok_or(HostError::StateStackUnderflow)
    }

    /// Saved state right below the active one
    pub fn parent(&self) -> Option<&T> {
        self.saved.last()
    }

    /// Drop every saved state
    pub fn clear(&mut self) {
        self.saved.clear();
    }

    /// Number of saved states
    pub fn depth(&self) -> usize {
        self.saved.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_restore() {
        let mut stack = Stacked::new(1u64);
        stack.push();
        *stack.current_mut() = 2;
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.parent(), Some(&1));

        assert_eq!(stack.pop_restore().unwrap(), 2);
        assert_eq!(*stack.current(), 1);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_push_and_discard() {
        let mut stack = Stacked::new(1u64);
        stack.push();
        *stack.current_mut() = 2;

        assert_eq!(stack.pop_discard().unwrap(), 1);
        assert_eq!(*stack.current(), 2);
    }

    #[test]
    fn test_underflow_rejected() {
        let mut stack = Stacked::new(0u64);
        assert_eq!(stack.pop_restore(), Err(HostError::StateStackUnderflow));
        assert_eq!(stack.pop_discard(), Err(HostError::StateStackUnderflow));
    }
}
