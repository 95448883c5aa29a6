//! World-state view
//!
//! Reads go to the [`BlockchainHook`], then get corrected with whatever the
//! current invocation already changed in the output accumulator. The saved
//! states are provider snapshot identifiers.

use super::output::OutputContext;
use super::{StateStack, Stacked};
use crate::error::{HostError, Result};
use crate::hook::{Account, BlockchainHook};
use crate::types::{Address, CodeMetadata};
use num_bigint::BigInt;
use std::sync::Arc;

/// Block information exposed to contracts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Block nonce
    pub nonce: u64,
    /// Block round
    pub round: u64,
    /// Epoch
    pub epoch: u32,
    /// Block timestamp
    pub timestamp: u64,
}

/// Blockchain context
pub struct BlockchainContext {
    hook: Arc<dyn BlockchainHook>,
    vm_type: Vec<u8>,
    snapshots: Stacked<u64>,
}

impl BlockchainContext {
    /// Context reading through `hook`
    pub fn new(hook: Arc<dyn BlockchainHook>, vm_type: Vec<u8>) -> Self {
        Self {
            hook,
            vm_type,
            snapshots: Stacked::default(),
        }
    }

    /// Underlying provider
    pub fn hook(&self) -> &Arc<dyn BlockchainHook> {
        &self.hook
    }

    /// VM type tag
    pub fn vm_type(&self) -> &[u8] {
        &self.vm_type
    }

    /// Account as stored by the provider
    pub fn account(&self, address: &Address) -> Result<Option<Account>> {
        Ok(self.hook.get_user_account(address)?)
    }

    /// Whether the provider knows `address`
    pub fn account_exists(&self, address: &Address) -> Result<bool> {
        Ok(self.account(address)?.is_some())
    }

    /// Balance including the deltas of the current invocation
    pub fn get_balance(&self, address: &Address, output: &OutputContext) -> Result<BigInt> {
        let stored = self
            .account(address)?
            .map(|account| account.balance)
            .unwrap_or_default();
        Ok(stored + output.balance_delta(address))
    }

    /// Nonce including changes made by the current invocation
    pub fn get_nonce(&self, address: &Address, output: &OutputContext) -> Result<u64> {
        if let Some(nonce) = output.output_account(address).and_then(|account| account.nonce) {
            return Ok(nonce);
        }
        Ok(self.account(address)?.map(|account| account.nonce).unwrap_or(0))
    }

    /// Bump the nonce of `address` in the output
    pub fn increase_nonce(&self, address: &Address, output: &mut OutputContext) -> Result<u64> {
        let nonce = self.get_nonce(address, output)?;
        let next = nonce.saturating_add(1);
        output.set_nonce(address, next);
        Ok(next)
    }

    /// Address of a contract deployed by `creator` at its current nonce
    pub fn new_address(&self, creator: &Address, output: &OutputContext) -> Result<Address> {
        let nonce = self.get_nonce(creator, output)?;
        Ok(self.hook.new_address(creator, nonce, &self.vm_type)?)
    }

    /// Code of `address`, preferring code deployed in this invocation
    pub fn get_code(&self, address: &Address, output: &OutputContext) -> Result<Vec<u8>> {
        if let Some(code) = output.output_account(address).and_then(|account| account.code.clone()) {
            return Ok(code);
        }
        match self.account(address)? {
            Some(account) if account.is_smart_contract() => Ok(account.code),
            _ => Err(HostError::ContractNotFound),
        }
    }

    /// Metadata of the code at `address`
    pub fn get_code_metadata(&self, address: &Address, output: &OutputContext) -> Result<CodeMetadata> {
        if let Some(metadata) = output
            .output_account(address)
            .and_then(|account| account.code_metadata)
        {
            return Ok(metadata);
        }
        match self.account(address)? {
            Some(account) if account.is_smart_contract() => Ok(account.code_metadata),
            _ => Err(HostError::ContractNotFound),
        }
    }

    /// Owner of the contract at `address`
    pub fn get_owner(&self, address: &Address, output: &OutputContext) -> Result<Address> {
        if let Some(deployer) = output
            .output_account(address)
            .and_then(|account| account.code_deployer)
        {
            return Ok(deployer);
        }
        match self.account(address)? {
            Some(account) => Ok(account.owner),
            None => Err(HostError::ContractNotFound),
        }
    }

    /// Whether `address` holds code
    pub fn is_smart_contract(&self, address: &Address, output: &OutputContext) -> Result<bool> {
        match self.get_code(address, output) {
            Ok(code) => Ok(!code.is_empty()),
            Err(HostError::ContractNotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Shard of `address`
    pub fn get_shard_of_address(&self, address: &Address) -> u32 {
        self.hook.get_shard_of_address(address)
    }

    /// Whether both addresses live in the same shard
    pub fn are_in_same_shard(&self, left: &Address, right: &Address) -> bool {
        self.get_shard_of_address(left) == self.get_shard_of_address(right)
    }

    /// Current block information
    pub fn block_info(&self) -> BlockInfo {
        BlockInfo {
            nonce: self.hook.current_nonce(),
            round: self.hook.current_round(),
            epoch: self.hook.current_epoch(),
            timestamp: self.hook.current_timestamp(),
        }
    }

    /// Drop the provider's compiled-code cache
    pub fn clear_compiled_codes(&self) {
        self.hook.clear_compiled_codes();
    }
}

impl StateStack for BlockchainContext {
    fn init_state(&mut self) {
        self.snapshots.reset();
    }

    fn push_state(&mut self) {
        *self.snapshots.current_mut() = self.hook.get_snapshot();
        self.snapshots.push();
    }

    fn pop_set_active_state(&mut self) -> Result<()> {
        self.snapshots.pop_restore()?;
        let snapshot = *self.snapshots.current();
        self.hook.revert_to_snapshot(snapshot)?;
        Ok(())
    }

    fn pop_discard(&mut self) -> Result<()> {
        self.snapshots.pop_discard().map(|_| ())
    }

    fn clear_state_stack(&mut self) {
        self.snapshots.clear();
    }

    fn state_stack_depth(&self) -> usize {
        self.snapshots.depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockWorld;

    const OWNER: Address = [1u8; 32];
    const CONTRACT: Address = [2u8; 32];

    fn context() -> BlockchainContext {
        let world = MockWorld::new();
        world.add_account(Account {
            address: OWNER,
            nonce: 4,
            balance: BigInt::from(1000),
            ..Account::default()
        });
        world.add_account(Account {
            address: CONTRACT,
            code: b"counter".to_vec(),
            owner: OWNER,
            ..Account::default()
        });
        BlockchainContext::new(Arc::new(world), vec![5, 0])
    }

    #[test]
    fn test_balance_includes_output_delta() {
        let context = context();
        let mut output = OutputContext::new();
        output.add_tx_value_to_account(&OWNER, &BigInt::from(-300));

        assert_eq!(context.get_balance(&OWNER, &output).unwrap(), BigInt::from(700));
        assert_eq!(context.get_balance(&[9u8; 32], &output).unwrap(), BigInt::default());
    }

    #[test]
    fn test_increase_nonce() {
        let context = context();
        let mut output = OutputContext::new();

        assert_eq!(context.increase_nonce(&OWNER, &mut output).unwrap(), 5);
        assert_eq!(context.get_nonce(&OWNER, &output).unwrap(), 5);
    }

    #[test]
    fn test_code_lookup() {
        let context = context();
        let output = OutputContext::new();

        assert!(context.is_smart_contract(&CONTRACT, &output).unwrap());
        assert!(!context.is_smart_contract(&OWNER, &output).unwrap());
        assert_eq!(context.get_code(&OWNER, &output), Err(HostError::ContractNotFound));
        assert_eq!(context.get_owner(&CONTRACT, &output).unwrap(), OWNER);
    }

    #[test]
    fn test_snapshot_stack_underflow() {
        let mut context = context();
        assert_eq!(context.pop_discard(), Err(HostError::StateStackUnderflow));

        context.push_state();
        assert_eq!(context.state_stack_depth(), 1);
        context.pop_set_active_state().unwrap();
        assert_eq!(context.state_stack_depth(), 0);
    }
}
