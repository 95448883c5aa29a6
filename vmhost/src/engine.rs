//! Execution engine interface
//!
//! The host does not interpret bytecode itself. It drives an embedded engine
//! through [`Executor`] (instance factory, opcode cost table) and
//! [`Instance`] (one loaded contract). During a call the instance receives the
//! host as `&mut dyn VmHooks` and reaches back into it for every API call.

use crate::config::OpcodeCosts;
use crate::vmhooks::VmHooks;
use std::fmt;

/// Classification of a fault reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A host API call recorded a breakpoint and asked the engine to stop
    Breakpoint,
    /// Trap raised by the bytecode itself (unreachable, bad memory access)
    Trap,
    /// The engine failed to allocate; the instance must not be reused
    Allocation,
    /// Code rejected at instantiation
    InvalidCode,
    /// Requested export does not exist
    FunctionNotFound,
}

/// Fault reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFault {
    /// Fault category
    pub kind: FaultKind,
    /// Engine-provided description
    pub message: String,
}

impl EngineFault {
    /// Fault of the given kind
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Stop requested by a host API call
    pub fn breakpoint() -> Self {
        Self::new(FaultKind::Breakpoint, "breakpoint")
    }

    /// Whether this fault poisons a reused instance
    pub fn is_retriable(&self) -> bool {
        self.kind == FaultKind::Allocation
    }
}

impl fmt::Display for EngineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for EngineFault {}

/// One instantiated contract
pub trait Instance: Send {
    /// Whether the contract exports `name`
    fn has_function(&self, name: &str) -> bool;

    /// Run the exported function `name`
    ///
    /// Host API calls made by the contract go through `hooks`. A hook that
    /// records a breakpoint returns [`EngineFault::breakpoint`], which the
    /// engine must propagate unchanged.
    fn call(&mut self, name: &str, hooks: &mut dyn VmHooks) -> Result<(), EngineFault>;

    /// Bytecode this instance was built from
    fn code(&self) -> &[u8];

    /// Release native resources
    fn clean(&mut self);
}

/// Instance factory
pub trait Executor: Send + Sync {
    /// Instantiate `code`
    fn new_instance(&self, code: &[u8]) -> Result<Box<dyn Instance>, EngineFault>;

    /// Replace the instruction cost table for instances created afterwards
    fn set_opcode_costs(&self, costs: &OpcodeCosts);
}
