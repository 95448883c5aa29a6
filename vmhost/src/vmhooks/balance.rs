//! Balance hooks

use super::HookResult;
use crate::error::HostError;
use crate::host::HostCore;
use crate::types::{Address, CallType, OutputTransfer};
use num_bigint::BigInt;

/// Balances and value transfers
pub trait BalanceHooks {
    /// Balance of `address`, including changes made by this invocation
    fn get_external_balance(&mut self, address: &Address) -> HookResult<BigInt>;

    /// Send `value` from the running contract to `destination`
    ///
    /// # Errors
    /// Breaks with `ExecutionFailed` when the contract cannot afford `value`
    /// or the frame is read-only
    fn transfer_value(&mut self, destination: &Address, value: &BigInt, data: &[u8]) -> HookResult<()>;
}

impl BalanceHooks for HostCore {
    fn get_external_balance(&mut self, address: &Address) -> HookResult<BigInt> {
        self.charge(self.metering.gas_cost().api_cost.get_external_balance)?;
        self.blockchain
            .get_balance(address, &self.output)
            .map_err(|err| self.breakpoint_from(err))
    }

    fn transfer_value(&mut self, destination: &Address, value: &BigInt, data: &[u8]) -> HookResult<()> {
        let costs = self.metering.gas_cost();
        let (base, per_byte) = (costs.api_cost.transfer_value, costs.base_operation_cost.data_copy_per_byte);
        self.charge_with_data(base, per_byte, data.len())?;

        if self.runtime.read_only() {
            return Err(self.breakpoint_from(HostError::CannotWriteOnReadOnly));
        }

        let sender = self.runtime.sc_address();
        let balance = self
            .blockchain
            .get_balance(&sender, &self.output)
            .map_err(|err| self.breakpoint_from(err))?;
        self.output
            .transfer(destination, &sender, &balance, value)
            .map_err(|err| self.breakpoint_from(err))?;
        self.output.add_output_transfer(
            destination,
            OutputTransfer {
                value: value.clone(),
                data: data.to_vec(),
                call_type: CallType::DirectCall,
                sender,
                ..OutputTransfer::default()
            },
        );
        Ok(())
    }
}
