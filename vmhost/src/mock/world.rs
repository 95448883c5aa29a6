//! In-memory world state
//!
//! [`MockWorld`] serves accounts and storage from maps behind locks, so it
//! can be shared with a host as `Arc<dyn BlockchainHook>` and still be edited
//! by the test driving it. [`MockWorld::update_accounts`] plays the ledger's
//! part and applies a [`VmOutput`] to the maps.

use crate::hook::{Account, BlockchainHook, HookError};
use crate::types::{Address, VmOutput, ADDRESS_LEN};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Block fields reported by the world
#[allow(missing_docs)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MockBlock {
    pub nonce: u64,
    pub round: u64,
    pub epoch: u32,
    pub timestamp: u64,
}

/// Accounts and storage held in memory
pub struct MockWorld {
    accounts: RwLock<BTreeMap<Address, Account>>,
    storage: RwLock<BTreeMap<Address, BTreeMap<Vec<u8>, Vec<u8>>>>,
    block: RwLock<MockBlock>,
    num_shards: u32,
}

impl Default for MockWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWorld {
    /// Empty single-shard world
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(BTreeMap::new()),
            storage: RwLock::new(BTreeMap::new()),
            block: RwLock::new(MockBlock::default()),
            num_shards: 1,
        }
    }

    /// Split addresses over `num_shards` shards by their last byte
    pub fn with_shards(mut self, num_shards: u32) -> Self {
        self.num_shards = num_shards.max(1);
        self
    }

    /// Insert or replace an account
    pub fn add_account(&self, account: Account) {
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account.address, account);
    }

    /// Current copy of an account
    pub fn account(&self, address: &Address) -> Option<Account> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
    }

    /// Write a storage value directly; an empty value removes the key
    pub fn set_storage(&self, address: &Address, key: &[u8], value: &[u8]) {
        let mut storage = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        let entries = storage.entry(*address).or_default();
        if value.is_empty() {
            entries.remove(key);
        } else {
            entries.insert(key.to_vec(), value.to_vec());
        }
    }

    /// Replace the block fields
    pub fn set_block(&self, block: MockBlock) {
        *self.block.write().unwrap_or_else(PoisonError::into_inner) = block;
    }

    /// Apply the account changes of a finished invocation
    pub fn update_accounts(&self, output: &VmOutput) {
        for (address, change) in &output.output_accounts {
            {
                let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
                let account = accounts.entry(*address).or_insert_with(|| Account {
                    address: *address,
                    ..Account::default()
                });
                account.balance += &change.balance_delta;
                if let Some(nonce) = change.nonce {
                    account.nonce = nonce;
                }
                if let Some(code) = &change.code {
                    account.code = code.clone();
                }
                if let Some(metadata) = change.code_metadata {
                    account.code_metadata = metadata;
                }
                if let Some(deployer) = change.code_deployer {
                    account.owner = deployer;
                }
            }

            for update in change.storage_updates.values() {
                self.set_storage(address, &update.offset, &update.data);
            }
        }
    }
}

impl BlockchainHook for MockWorld {
    fn get_user_account(&self, address: &Address) -> Result<Option<Account>, HookError> {
        Ok(self.account(address))
    }

    fn get_storage_data(&self, address: &Address, key: &[u8]) -> Result<Vec<u8>, HookError> {
        Ok(self
            .storage
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .and_then(|entries| entries.get(key))
            .cloned()
            .unwrap_or_default())
    }

    /// Eight zero bytes, the VM type, the creator nonce, then the tail of the
    /// creator so the new contract lands in the creator's shard
    fn new_address(
        &self,
        creator: &Address,
        creator_nonce: u64,
        vm_type: &[u8],
    ) -> Result<Address, HookError> {
        if vm_type.len() != 2 {
            return Err(HookError::NewAddress(format!("bad vm type {}", hex::encode(vm_type))));
        }

        let mut address = *creator;
        address[..8].fill(0);
        address[8..10].copy_from_slice(vm_type);
        address[10..18].copy_from_slice(&creator_nonce.to_be_bytes());
        Ok(address)
    }

    fn get_shard_of_address(&self, address: &Address) -> u32 {
        u32::from(address[ADDRESS_LEN - 1])
            .checked_rem(self.num_shards)
            .unwrap_or(0)
    }

    fn clear_compiled_codes(&self) {}

    fn current_nonce(&self) -> u64 {
        self.block.read().unwrap_or_else(PoisonError::into_inner).nonce
    }

    fn current_round(&self) -> u64 {
        self.block.read().unwrap_or_else(PoisonError::into_inner).round
    }

    fn current_epoch(&self) -> u32 {
        self.block.read().unwrap_or_else(PoisonError::into_inner).epoch
    }

    fn current_timestamp(&self) -> u64 {
        self.block.read().unwrap_or_else(PoisonError::into_inner).timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OutputAccount, StorageUpdate};
    use num_bigint::BigInt;

    #[test]
    fn test_new_address_is_deterministic() {
        let world = MockWorld::new();
        let creator = [7u8; 32];

        let first = world.new_address(&creator, 1, &[5, 0]).unwrap();
        assert_eq!(first, world.new_address(&creator, 1, &[5, 0]).unwrap());
        assert_ne!(first, world.new_address(&creator, 2, &[5, 0]).unwrap());
        assert_eq!(first[31], creator[31]);
        assert!(world.new_address(&creator, 1, &[5]).is_err());
    }

    #[test]
    fn test_update_accounts() {
        let world = MockWorld::new();
        let address = [3u8; 32];
        world.add_account(Account {
            address,
            balance: BigInt::from(100),
            ..Account::default()
        });
        world.set_storage(&address, b"gone", b"x");

        let mut change = OutputAccount::new(address);
        change.balance_delta = BigInt::from(-40);
        change.nonce = Some(3);
        for (key, value) in [(b"kept".to_vec(), b"1".to_vec()), (b"gone".to_vec(), Vec::new())] {
            change.storage_updates.insert(key.clone(), StorageUpdate { offset: key, data: value });
        }
        let mut output = VmOutput::default();
        output.output_accounts.insert(address, change);

        world.update_accounts(&output);

        let account = world.account(&address).unwrap();
        assert_eq!(account.balance, BigInt::from(60));
        assert_eq!(account.nonce, 3);
        assert_eq!(world.get_storage_data(&address, b"kept").unwrap(), b"1".to_vec());
        assert!(world.get_storage_data(&address, b"gone").unwrap().is_empty());
    }

    #[test]
    fn test_shards() {
        let world = MockWorld::new().with_shards(3);
        let mut address = [0u8; 32];
        address[31] = 4;
        assert_eq!(world.get_shard_of_address(&address), 1);
        assert_eq!(MockWorld::new().get_shard_of_address(&address), 0);
    }
}
