//! Contract storage view
//!
//! Reads see the writes of the current invocation first (they live in the
//! output accumulator) and fall back to the state provider. Keys under the
//! protected prefix belong to the host and cannot be written by contracts.

use super::output::OutputContext;
use super::{StateStack, Stacked};
use crate::error::{HostError, Result};
use crate::hook::BlockchainHook;
use crate::types::Address;
use std::sync::Arc;

/// Effect of a storage write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStatus {
    /// Same value as before
    Unchanged,
    /// Existing value replaced
    Modified,
    /// New key written
    Added,
    /// Existing value removed
    Deleted,
}

/// Storage context
pub struct StorageContext {
    hook: Arc<dyn BlockchainHook>,
    protected_key_prefix: Vec<u8>,
    address: Stacked<Address>,
}

impl StorageContext {
    /// Context reading through `hook`
    pub fn new(hook: Arc<dyn BlockchainHook>, protected_key_prefix: Vec<u8>) -> Self {
        Self {
            hook,
            protected_key_prefix,
            address: Stacked::default(),
        }
    }

    /// Point the view at the storage of `address`
    pub fn set_address(&mut self, address: Address) {
        *self.address.current_mut() = address;
    }

    /// Account whose storage is in view
    pub fn address(&self) -> Address {
        *self.address.current()
    }

    /// Whether `key` falls under the protected prefix
    pub fn is_protected_key(&self, key: &[u8]) -> bool {
        key.starts_with(&self.protected_key_prefix)
    }

    /// Read `key` from the storage in view
    pub fn get_storage(&self, output: &OutputContext, key: &[u8]) -> Result<Vec<u8>> {
        self.read(output, &self.address(), key)
    }

    /// Read `key` from the storage of another account
    ///
    /// # Errors
    /// `StorageNotReadable` when the account's code metadata does not allow it
    pub fn get_storage_from_address(
        &self,
        output: &OutputContext,
        address: &Address,
        key: &[u8],
    ) -> Result<Vec<u8>> {
        if *address != self.address() {
            let readable = match self.hook.get_user_account(address)? {
                Some(account) => account.code_metadata.readable,
                None => false,
            };
            if !readable {
                return Err(HostError::StorageNotReadable);
            }
        }
        self.read(output, address, key)
    }

    fn read(&self, output: &OutputContext, address: &Address, key: &[u8]) -> Result<Vec<u8>> {
        if let Some(update) = output.storage_update(address, key) {
            return Ok(update.data.clone());
        }
        Ok(self.hook.get_storage_data(address, key)?)
    }

    /// Write `value` under `key`; an empty value deletes the key
    ///
    /// # Errors
    /// * `CannotWriteOnReadOnly` - when the frame is read-only
    /// * `StoreReservedKey` - when `key` is under the protected prefix
    pub fn set_storage(
        &self,
        output: &mut OutputContext,
        key: &[u8],
        value: &[u8],
        read_only: bool,
    ) -> Result<StorageStatus> {
        if read_only {
            return Err(HostError::CannotWriteOnReadOnly);
        }
        if self.is_protected_key(key) {
            return Err(HostError::StoreReservedKey);
        }

        let address = self.address();
        let old = self.read(output, &address, key)?;
        let status = match (old.is_empty(), value.is_empty()) {
            _ if old == value => StorageStatus::Unchanged,
            (true, _) => StorageStatus::Added,
            (false, true) => StorageStatus::Deleted,
            (false, false) => StorageStatus::Modified,
        };
        if status != StorageStatus::Unchanged {
            output.set_storage_update(&address, key, value);
        }
        Ok(status)
    }
}

impl StateStack for StorageContext {
    fn init_state(&mut self) {
        self.address.reset();
    }

    fn push_state(&mut self) {
        self.address.push();
    }

    fn pop_set_active_state(&mut self) -> Result<()> {
        self.address.pop_restore().map(|_| ())
    }

    fn pop_discard(&mut self) -> Result<()> {
        self.address.pop_discard().map(|_| ())
    }

    fn clear_state_stack(&mut self) {
        self.address.clear();
    }

    fn state_stack_depth(&self) -> usize {
        self.address.depth()
    }
}
