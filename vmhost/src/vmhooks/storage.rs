//! Storage hooks
//!
//! Writes are charged by their effect: a new key costs `StorePerByte` per
//! value byte, a rewrite costs `PersistPerByte`, and a deletion refunds
//! `ReleasePerByte` for each byte freed (never above what the frame was
//! given).

use super::HookResult;
use crate::contexts::storage::StorageStatus;
use crate::host::HostCore;
use crate::types::Address;

/// Persistent key/value storage of the running contract
pub trait StorageHooks {
    /// Write `value` under `key`; an empty value deletes the key
    fn storage_store(&mut self, key: &[u8], value: &[u8]) -> HookResult<StorageStatus>;

    /// Read `key`; empty when absent
    fn storage_load(&mut self, key: &[u8]) -> HookResult<Vec<u8>>;

    /// Read `key` from the storage of `address`
    fn storage_load_from_address(&mut self, address: &Address, key: &[u8]) -> HookResult<Vec<u8>>;
}

impl StorageHooks for HostCore {
    fn storage_store(&mut self, key: &[u8], value: &[u8]) -> HookResult<StorageStatus> {
        self.charge(self.metering.gas_cost().api_cost.storage_store)?;

        let old_len = match self.storage.get_storage(&self.output, key) {
            Ok(old) => old.len(),
            Err(err) => return Err(self.breakpoint_from(err)),
        };
        let read_only = self.runtime.read_only();
        let status = match self.storage.set_storage(&mut self.output, key, value, read_only) {
            Ok(status) => status,
            Err(err) => return Err(self.breakpoint_from(err)),
        };

        let base = self.metering.gas_cost().base_operation_cost.clone();
        match status {
            StorageStatus::Added => {
                let per_byte = base.store_per_byte;
                self.charge_with_data(0, per_byte, value.len())?;
            }
            StorageStatus::Modified => {
                let per_byte = base.persist_per_byte;
                self.charge_with_data(0, per_byte, value.len())?;
            }
            StorageStatus::Deleted => {
                let refund = base.release_per_byte.saturating_mul(old_len as u64);
                self.metering.free_gas(refund);
            }
            StorageStatus::Unchanged => {}
        }
        Ok(status)
    }

    fn storage_load(&mut self, key: &[u8]) -> HookResult<Vec<u8>> {
        self.charge(self.metering.gas_cost().api_cost.storage_load)?;

        let value = match self.storage.get_storage(&self.output, key) {
            Ok(value) => value,
            Err(err) => return Err(self.breakpoint_from(err)),
        };
        let per_byte = self.metering.gas_cost().base_operation_cost.data_copy_per_byte;
        self.charge_with_data(0, per_byte, value.len())?;
        Ok(value)
    }

    fn storage_load_from_address(&mut self, address: &Address, key: &[u8]) -> HookResult<Vec<u8>> {
        self.charge(self.metering.gas_cost().api_cost.storage_load)?;

        let value = match self.storage.get_storage_from_address(&self.output, address, key) {
            Ok(value) => value,
            Err(err) => return Err(self.breakpoint_from(err)),
        };
        let per_byte = self.metering.gas_cost().base_operation_cost.data_copy_per_byte;
        self.charge_with_data(0, per_byte, value.len())?;
        Ok(value)
    }
}
