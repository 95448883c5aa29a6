//! Breakpoint values
//!
//! The sandboxed engine cannot unwind host call stacks, so host API calls
//! record a non-normal outcome in a single per-frame field and then make the
//! engine stop. The host reads that field once, right after the engine hands
//! control back. The field is kept in its raw engine-facing form so that a
//! corrupted value is detected instead of silently ignored.

use crate::error::HostError;

/// Outcome recorded by a host API call for the running frame
#[repr(u64)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointValue {
    /// Nothing recorded
    #[default]
    None = 0,
    /// Contract explicitly failed
    ExecutionFailed = 1,
    /// Async call registered; registry must be drained
    AsyncCall = 2,
    /// Contract signaled a user error
    SignalError = 3,
    /// Gas exhausted
    OutOfGas = 4,
}

impl From<BreakpointValue> for u64 {
    fn from(value: BreakpointValue) -> Self {
        value as u64
    }
}

impl TryFrom<u64> for BreakpointValue {
    type Error = HostError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(BreakpointValue::None),
            1 => Ok(BreakpointValue::ExecutionFailed),
            2 => Ok(BreakpointValue::AsyncCall),
            3 => Ok(BreakpointValue::SignalError),
            4 => Ok(BreakpointValue::OutOfGas),
            other => Err(HostError::UnhandledRuntimeBreakpoint(other)),
        }
    }
}
