//! Breakpoint resolution
//!
//! Runs once per engine return. The breakpoint recorded by the hooks wins
//! over whatever the engine reported; with no breakpoint set, an engine fault
//! becomes a generic execution failure.

use super::HostCore;
use crate::breakpoint::BreakpointValue;
use crate::engine::{EngineFault, FaultKind};
use crate::error::{HostError, Result};
use log::error;

impl HostCore {
    /// Map the engine's return and the frame's breakpoint onto an outcome
    ///
    /// # Returns
    /// * `Ok(())` - the frame completed; registered async calls still need
    ///   to be dispatched
    /// * `Err(_)` - the frame must be rolled back
    pub(crate) fn handle_breakpoint_if_any(
        &mut self,
        function: &str,
        engine_result: std::result::Result<(), EngineFault>,
    ) -> Result<()> {
        if let Some(err) = self.fatal.take() {
            error!("invocation aborted in {}: {}", function, err);
            return Err(err);
        }

        let breakpoint = match self.runtime.take_runtime_breakpoint() {
            Ok(breakpoint) => breakpoint,
            Err(err) => {
                error!("{} in {}", err, function);
                return Err(err);
            }
        };

        match breakpoint {
            BreakpointValue::None => match engine_result {
                Ok(()) => Ok(()),
                Err(fault) => {
                    self.runtime.record_fault(&fault);
                    match fault.kind {
                        FaultKind::FunctionNotFound => Err(HostError::FunctionNotFound(function.to_string())),
                        _ => Err(HostError::ExecutionFailed),
                    }
                }
            },
            BreakpointValue::AsyncCall => Ok(()),
            BreakpointValue::ExecutionFailed => {
                Err(HostError::ContractFailed(self.output.return_message().to_string()))
            }
            BreakpointValue::SignalError => {
                Err(HostError::SignalError(self.output.return_message().to_string()))
            }
            BreakpointValue::OutOfGas => Err(HostError::NotEnoughGas),
        }
    }
}
