//! Nested execution hooks
//!
//! Both hooks run a child frame synchronously. The child receives at most
//! the gas left to the caller; whatever it does not spend comes back once it
//! completes. A failed child is rolled back and its gas is consumed.

use super::HookResult;
use crate::error::HostError;
use crate::host::HostCore;
use crate::types::{Address, CallType, CodeMetadata, ContractCallInput, ContractCreateInput, ReturnCode, VmInput};
use log::warn;
use num_bigint::BigInt;

/// Synchronous calls into other contracts
pub trait ContractHooks {
    /// Call `function` of `destination` in a child frame
    ///
    /// # Returns
    /// The child's return code. A failing child does not stop the caller;
    /// its effects are discarded.
    fn execute_on_dest_context(
        &mut self,
        gas_limit: u64,
        destination: &Address,
        value: &BigInt,
        function: &str,
        arguments: &[Vec<u8>],
    ) -> HookResult<ReturnCode>;

    /// Deploy `code` from the running contract in a child frame
    ///
    /// # Returns
    /// Address of the new contract. A failing deployment stops the caller.
    fn create_contract(
        &mut self,
        gas_limit: u64,
        value: &BigInt,
        code: &[u8],
        metadata: CodeMetadata,
        arguments: &[Vec<u8>],
    ) -> HookResult<Address>;
}

impl HostCore {
    /// Take the child's gas out of the running frame
    fn reserve_child_gas(&mut self, gas_limit: u64) -> HookResult<u64> {
        let gas = gas_limit.min(self.metering.gas_left());
        self.charge(gas)?;
        Ok(gas)
    }

    /// Build the common input of a child frame started by the running contract
    fn child_input(&self, value: &BigInt, arguments: &[Vec<u8>], gas: u64) -> VmInput {
        VmInput {
            caller: self.runtime.sc_address(),
            arguments: arguments.to_vec(),
            call_value: value.clone(),
            call_type: CallType::DirectCall,
            gas_price: self.runtime.input().vm_input.gas_price,
            gas_provided: gas,
            gas_locked: 0,
        }
    }
}

impl ContractHooks for HostCore {
    fn execute_on_dest_context(
        &mut self,
        gas_limit: u64,
        destination: &Address,
        value: &BigInt,
        function: &str,
        arguments: &[Vec<u8>],
    ) -> HookResult<ReturnCode> {
        let argument_len = arguments.iter().fold(0usize, |total, argument| total.saturating_add(argument.len()));
        let costs = self.metering.gas_cost();
        let (base, per_byte) = (costs.api_cost.execute_on_dest_context, costs.base_operation_cost.data_copy_per_byte);
        self.charge_with_data(base, per_byte, argument_len)?;

        let gas = self.reserve_child_gas(gas_limit)?;
        let input = ContractCallInput {
            vm_input: self.child_input(value, arguments, gas),
            recipient: *destination,
            function: function.to_string(),
        };

        match self.execute_on_dest_context_frame(input) {
            Ok(outcome) => {
                self.metering.restore_gas(outcome.gas_left);
                Ok(ReturnCode::Ok)
            }
            Err(err) if err.is_fatal() => Err(self.breakpoint_from(err)),
            Err(err) => {
                warn!("execute on dest context to {} failed: {}", hex::encode(destination), err);
                let code = err.return_code();
                self.runtime.add_runtime_error(err);
                Ok(code)
            }
        }
    }

    fn create_contract(
        &mut self,
        gas_limit: u64,
        value: &BigInt,
        code: &[u8],
        metadata: CodeMetadata,
        arguments: &[Vec<u8>],
    ) -> HookResult<Address> {
        let costs = self.metering.gas_cost();
        let (base, per_byte) = (costs.api_cost.create_contract, costs.base_operation_cost.data_copy_per_byte);
        self.charge_with_data(base, per_byte, code.len())?;

        if self.runtime.read_only() {
            return Err(self.breakpoint_from(HostError::CannotWriteOnReadOnly));
        }

        let gas = self.reserve_child_gas(gas_limit)?;
        let input = ContractCreateInput {
            vm_input: self.child_input(value, arguments, gas),
            contract_code: code.to_vec(),
            code_metadata: metadata,
        };

        match self.create_contract_frame(input) {
            Ok((address, outcome)) => {
                self.metering.restore_gas(outcome.gas_left);
                Ok(address)
            }
            Err(err) => Err(self.breakpoint_from(err)),
        }
    }
}
