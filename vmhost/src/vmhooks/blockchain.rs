//! Blockchain information hooks

use super::HookResult;
use crate::host::HostCore;
use crate::types::Address;

/// Read-only world information
pub trait BlockchainHooks {
    /// Owner of the running contract
    fn get_owner_address(&mut self) -> HookResult<Address>;

    /// Shard that owns `address`
    fn get_shard_of_address(&mut self, address: &Address) -> HookResult<u32>;

    /// Whether `address` holds code
    fn is_smart_contract(&mut self, address: &Address) -> HookResult<bool>;

    /// Current block nonce
    fn get_block_nonce(&mut self) -> HookResult<u64>;

    /// Current block round
    fn get_block_round(&mut self) -> HookResult<u64>;

    /// Current epoch
    fn get_block_epoch(&mut self) -> HookResult<u32>;

    /// Current block timestamp
    fn get_block_timestamp(&mut self) -> HookResult<u64>;
}

impl BlockchainHooks for HostCore {
    fn get_owner_address(&mut self) -> HookResult<Address> {
        self.charge(self.metering.gas_cost().api_cost.get_owner_address)?;
        let address = self.runtime.sc_address();
        self.blockchain
            .get_owner(&address, &self.output)
            .map_err(|err| self.breakpoint_from(err))
    }

    fn get_shard_of_address(&mut self, address: &Address) -> HookResult<u32> {
        self.charge(self.metering.gas_cost().api_cost.get_shard_of_address)?;
        Ok(self.blockchain.get_shard_of_address(address))
    }

    fn is_smart_contract(&mut self, address: &Address) -> HookResult<bool> {
        self.charge(self.metering.gas_cost().api_cost.is_smart_contract)?;
        self.blockchain
            .is_smart_contract(address, &self.output)
            .map_err(|err| self.breakpoint_from(err))
    }

    fn get_block_nonce(&mut self) -> HookResult<u64> {
        self.charge(self.metering.gas_cost().api_cost.get_block_info)?;
        Ok(self.blockchain.block_info().nonce)
    }

    fn get_block_round(&mut self) -> HookResult<u64> {
        self.charge(self.metering.gas_cost().api_cost.get_block_info)?;
        Ok(self.blockchain.block_info().round)
    }

    fn get_block_epoch(&mut self) -> HookResult<u32> {
        self.charge(self.metering.gas_cost().api_cost.get_block_info)?;
        Ok(self.blockchain.block_info().epoch)
    }

    fn get_block_timestamp(&mut self) -> HookResult<u64> {
        self.charge(self.metering.gas_cost().api_cost.get_block_info)?;
        Ok(self.blockchain.block_info().timestamp)
    }
}
