//! Big-number register bank
//!
//! Contracts manipulate arbitrary-precision integers through `i32` handles.
//! Handles are frame-local: a nested frame starts with an empty bank and the
//! caller's registers come back untouched when the frame is popped.

use super::{StateStack, Stacked};
use crate::error::{HostError, Result};
use num_bigint::{BigInt, Sign};
use std::collections::BTreeMap;

/// Register handle as seen by contracts
pub type Handle = i32;

/// Handle-indexed table of big integers
#[derive(Debug, Default)]
pub struct BigIntContext {
    values: Stacked<BTreeMap<Handle, BigInt>>,
}

impl BigIntContext {
    /// Empty bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under a fresh handle, above every live one
    ///
    /// # Errors
    /// `BigIntHandlesExhausted` once a register sits at `Handle::MAX`
    pub fn put(&mut self, value: BigInt) -> Result<Handle> {
        let values = self.values.current_mut();
        let handle = match values.keys().next_back() {
            Some(last) => last.checked_add(1).ok_or(HostError::BigIntHandlesExhausted)?,
            None => 0,
        };
        values.insert(handle, value);
        Ok(handle)
    }

    /// Value under `handle`, created as zero when missing
    pub fn get_one(&mut self, handle: Handle) -> &mut BigInt {
        self.values.current_mut().entry(handle).or_default()
    }

    /// Copies of two registers
    pub fn get_two(&mut self, first: Handle, second: Handle) -> (BigInt, BigInt) {
        (self.get_one(first).clone(), self.get_one(second).clone())
    }

    /// Overwrite `handle`
    pub fn set(&mut self, handle: Handle, value: BigInt) {
        self.values.current_mut().insert(handle, value);
    }

    /// Number of live registers in the current frame
    pub fn len(&self) -> usize {
        self.values.current().len()
    }

    /// Whether the current frame has no registers
    pub fn is_empty(&self) -> bool {
        self.values.current().is_empty()
    }
}

/// Unsigned big-endian bytes; zero encodes as empty
pub fn unsigned_bytes(value: &BigInt) -> Vec<u8> {
    if value.sign() == Sign::NoSign {
        return Vec::new();
    }
    value.magnitude().to_bytes_be()
}

/// Parse unsigned big-endian bytes
pub fn from_unsigned_bytes(bytes: &[u8]) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, bytes)
}

impl StateStack for BigIntContext {
    fn init_state(&mut self) {
        self.values.reset();
    }

    fn push_state(&mut self) {
        self.values.push();
        self.values.reset();
    }

    fn pop_set_active_state(&mut self) -> Result<()> {
        self.values.pop_restore().map(|_| ())
    }

    fn pop_discard(&mut self) -> Result<()> {
        self.values.pop_discard().map(|_| ())
    }

    fn clear_state_stack(&mut self) {
        self.values.clear();
    }

    fn state_stack_depth(&self) -> usize {
        self.values.depth()
    }
}
