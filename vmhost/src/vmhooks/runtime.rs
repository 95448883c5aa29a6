//! Call frame hooks: gas, arguments, caller and value

use super::HookResult;
use crate::host::HostCore;
use crate::types::Address;
use num_bigint::BigInt;

/// Access to the running frame
pub trait RuntimeHooks {
    /// Charge `amount` of gas, as instructed by the engine's own metering
    fn use_gas(&mut self, amount: u64) -> HookResult<()>;

    /// Gas left to the running frame
    fn get_gas_left(&mut self) -> HookResult<u64>;

    /// Number of call arguments
    fn get_num_arguments(&mut self) -> HookResult<usize>;

    /// Call argument at `index`
    ///
    /// # Errors
    /// Breaks with `ExecutionFailed` when `index` is out of range
    fn get_argument(&mut self, index: usize) -> HookResult<Vec<u8>>;

    /// Name of the function being executed
    fn get_function(&mut self) -> HookResult<String>;

    /// Sender of the running frame
    fn get_caller(&mut self) -> HookResult<Address>;

    /// Address of the running contract
    fn get_sc_address(&mut self) -> HookResult<Address>;

    /// Value sent with the running frame
    fn get_call_value(&mut self) -> HookResult<BigInt>;
}

impl RuntimeHooks for HostCore {
    fn use_gas(&mut self, amount: u64) -> HookResult<()> {
        self.charge(amount)
    }

    fn get_gas_left(&mut self) -> HookResult<u64> {
        self.charge(self.metering.gas_cost().api_cost.get_gas_left)?;
        Ok(self.metering.gas_left())
    }

    fn get_num_arguments(&mut self) -> HookResult<usize> {
        self.charge(self.metering.gas_cost().api_cost.get_num_arguments)?;
        Ok(self.runtime.arguments().len())
    }

    fn get_argument(&mut self, index: usize) -> HookResult<Vec<u8>> {
        let argument = match self.runtime.argument(index) {
            Ok(argument) => argument.to_vec(),
            Err(err) => return Err(self.breakpoint_from(err)),
        };

        let costs = self.metering.gas_cost();
        let (base, per_byte) = (
            costs.api_cost.get_argument,
            costs.base_operation_cost.data_copy_per_byte,
        );
        self.charge_with_data(base, per_byte, argument.len())?;
        Ok(argument)
    }

    fn get_function(&mut self) -> HookResult<String> {
        self.charge(self.metering.gas_cost().api_cost.get_function)?;
        Ok(self.runtime.function().to_string())
    }

    fn get_caller(&mut self) -> HookResult<Address> {
        self.charge(self.metering.gas_cost().api_cost.get_caller)?;
        Ok(self.runtime.input().vm_input.caller)
    }

    fn get_sc_address(&mut self) -> HookResult<Address> {
        self.charge(self.metering.gas_cost().api_cost.get_sc_address)?;
        Ok(self.runtime.sc_address())
    }

    fn get_call_value(&mut self) -> HookResult<BigInt> {
        self.charge(self.metering.gas_cost().api_cost.get_call_value)?;
        Ok(self.runtime.input().vm_input.call_value.clone())
    }
}
