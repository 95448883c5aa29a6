//! Async call registration hooks
//!
//! Registration only records the call and reserves the callback gas; the
//! host dispatches registered calls once the running frame has returned.

use super::HookResult;
use crate::breakpoint::BreakpointValue;
use crate::config::CALLBACK_FUNCTION_NAME;
use crate::contexts::runtime::AsyncCallInfo;
use crate::engine::EngineFault;
use crate::error::HostError;
use crate::host::HostCore;
use crate::types::Address;
use num_bigint::BigInt;

/// Async call registration
pub trait AsyncCallHooks {
    /// Register a call to `destination` and stop the running frame
    ///
    /// All gas left after reserving the callback gas is forwarded to the
    /// destination; the result comes back through `callBack`.
    fn async_call(&mut self, destination: &Address, value: &BigInt, data: &[u8]) -> HookResult<()>;

    /// Register a call to `destination` and keep running
    ///
    /// # Arguments
    /// * `destination` - Contract to call
    /// * `value` - Value sent with the call
    /// * `data` - Call data, `function@hexarg@...`
    /// * `gas_limit` - Gas forwarded to the destination
    /// * `callback` - Function called back with the outcome, if any
    /// * `extra_gas_for_callback` - Gas reserved for the callback on top of
    ///   the schedule's callback lock
    fn create_async_call(
        &mut self,
        destination: &Address,
        value: &BigInt,
        data: &[u8],
        gas_limit: u64,
        callback: Option<&str>,
        extra_gas_for_callback: u64,
    ) -> HookResult<()>;
}

impl HostCore {
    fn register_async_call(
        &mut self,
        destination: &Address,
        value: &BigInt,
        data: &[u8],
        gas_limit: Option<u64>,
        callback: Option<&str>,
        extra_gas_for_callback: u64,
    ) -> HookResult<()> {
        if self.runtime.read_only() {
            return Err(self.breakpoint_from(HostError::CannotWriteOnReadOnly));
        }

        let gas_locked = match callback {
            Some(_) => self
                .metering
                .gas_cost()
                .api_cost
                .async_callback_gas_lock
                .saturating_add(extra_gas_for_callback),
            None => 0,
        };
        self.metering
            .lock_gas_for_async(gas_locked)
            .map_err(|err| self.breakpoint_from(err))?;

        let gas_limit = match gas_limit {
            Some(gas_limit) if gas_limit > self.metering.gas_left() => {
                return Err(self.breakpoint_from(HostError::NotEnoughGas));
            }
            Some(gas_limit) => gas_limit,
            None => self.metering.gas_left(),
        };

        self.runtime.add_async_call(AsyncCallInfo {
            destination: *destination,
            data: data.to_vec(),
            value: value.clone(),
            gas_limit,
            gas_locked,
            callback: callback.map(str::to_string),
        });
        Ok(())
    }
}

impl AsyncCallHooks for HostCore {
    fn async_call(&mut self, destination: &Address, value: &BigInt, data: &[u8]) -> HookResult<()> {
        let costs = self.metering.gas_cost();
        let (base, per_byte) = (costs.api_cost.async_call_step, costs.base_operation_cost.data_copy_per_byte);
        self.charge_with_data(base, per_byte, data.len())?;

        self.register_async_call(destination, value, data, None, Some(CALLBACK_FUNCTION_NAME), 0)?;
        self.runtime.set_runtime_breakpoint(BreakpointValue::AsyncCall);
        Err(EngineFault::breakpoint())
    }

    fn create_async_call(
        &mut self,
        destination: &Address,
        value: &BigInt,
        data: &[u8],
        gas_limit: u64,
        callback: Option<&str>,
        extra_gas_for_callback: u64,
    ) -> HookResult<()> {
        let costs = self.metering.gas_cost();
        let (base, per_byte) = (costs.api_cost.create_async_call, costs.base_operation_cost.data_copy_per_byte);
        self.charge_with_data(base, per_byte, data.len())?;

        self.register_async_call(destination, value, data, Some(gas_limit), callback, extra_gas_for_callback)
    }
}
