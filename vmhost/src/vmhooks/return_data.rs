//! Return data and outcome hooks
//!
//! `finish` appends to the return data of the invocation; `signal_error` and
//! `fail_execution` stop the running frame.

use super::HookResult;
use crate::breakpoint::BreakpointValue;
use crate::engine::EngineFault;
use crate::error::HostError;
use crate::host::HostCore;

/// Return data and frame outcome
pub trait ReturnDataHooks {
    /// Append `data` to the return data
    fn finish(&mut self, data: &[u8]) -> HookResult<()>;

    /// Stop the frame with a user error carrying `message`
    ///
    /// Never returns `Ok`.
    fn signal_error(&mut self, message: &str) -> HookResult<()>;

    /// Stop the frame with an execution failure carrying `message`
    ///
    /// Never returns `Ok`.
    fn fail_execution(&mut self, message: &str) -> HookResult<()>;

    /// Number of return data entries accumulated so far
    fn get_num_return_data(&mut self) -> HookResult<usize>;

    /// Return data entry at `index`
    fn get_return_data(&mut self, index: usize) -> HookResult<Vec<u8>>;
}

impl ReturnDataHooks for HostCore {
    fn finish(&mut self, data: &[u8]) -> HookResult<()> {
        let costs = self.metering.gas_cost();
        let (base, per_byte) = (costs.api_cost.finish, costs.base_operation_cost.data_copy_per_byte);
        self.charge_with_data(base, per_byte, data.len())?;

        self.output.finish(data.to_vec());
        Ok(())
    }

    fn signal_error(&mut self, message: &str) -> HookResult<()> {
        let costs = self.metering.gas_cost();
        let (base, per_byte) = (costs.api_cost.signal_error, costs.base_operation_cost.data_copy_per_byte);
        self.charge_with_data(base, per_byte, message.len())?;

        Err(self.breakpoint_from(HostError::SignalError(message.to_string())))
    }

    fn fail_execution(&mut self, message: &str) -> HookResult<()> {
        self.output.set_return_message(message);
        self.runtime.set_runtime_breakpoint(BreakpointValue::ExecutionFailed);
        Err(EngineFault::breakpoint())
    }

    fn get_num_return_data(&mut self) -> HookResult<usize> {
        Ok(self.output.return_data().len())
    }

    fn get_return_data(&mut self, index: usize) -> HookResult<Vec<u8>> {
        let data = match self.output.return_data().get(index) {
            Some(data) => data.clone(),
            None => return Err(self.breakpoint_from(HostError::ArgIndexOutOfRange)),
        };
        let per_byte = self.metering.gas_cost().base_operation_cost.data_copy_per_byte;
        self.charge_with_data(0, per_byte, data.len())?;
        Ok(data)
    }
}
